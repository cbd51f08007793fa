//! FFI bindings for the engagement tracker
//!
//! This module provides C-compatible functions for driving a tracker from a
//! host page runtime. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `engage_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;

use crate::config::TrackerConfig;
use crate::engagement::capture::classify;
use crate::engagement::tracker::{EngagementTracker, HostEvent};
use crate::error::TrackerError;
use crate::host::RecordingHost;
use crate::reporting::RecordingSink;
use crate::types::ElementSnapshot;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value`, recording the error and returning NULL on failure
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&TrackerError::from(e).to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify an element snapshot and return `{type, category, importance}` JSON.
///
/// # Safety
/// - `element_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_classify(element_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(element_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match serde_json::from_str::<ElementSnapshot>(&json_str) {
        Ok(element) => json_to_cstr(&classify(&element)),
        Err(e) => {
            set_last_error(&TrackerError::from(e).to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Tracker API
// ============================================================================

/// Opaque handle to an EngagementTracker
pub struct EngageTrackerHandle {
    tracker: EngagementTracker<RecordingHost>,
    sink: Option<Rc<RefCell<RecordingSink>>>,
}

/// Create a new tracker.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer to a newly allocated tracker.
/// - Must be freed with `engage_tracker_free`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_new(config_json: *const c_char) -> *mut EngageTrackerHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match EngagementTracker::new(config, RecordingHost::new()) {
        Ok(tracker) => Box::into_raw(Box::new(EngageTrackerHandle {
            tracker,
            sink: None,
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_free(tracker: *mut EngageTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Deliver a host event observed at `now_ms`.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_dispatch(
    tracker: *mut EngageTrackerHandle,
    now_ms: u64,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<HostEvent>(&json_str) {
        Ok(event) => {
            handle.tracker.dispatch(now_ms, event);
            0
        }
        Err(e) => {
            set_last_error(&TrackerError::from(e).to_string());
            -1
        }
    }
}

/// Run every timer due at or before `now_ms`.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_advance(tracker: *mut EngageTrackerHandle, now_ms: u64) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    (*tracker).tracker.advance_to(now_ms);
    0
}

/// Attach an internal recording sink. Events sent to it are read back with
/// `engage_tracker_drain_events`. Attaching twice is a no-op.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_attach_sink(tracker: *mut EngageTrackerHandle) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;
    if handle.sink.is_none() {
        let sink = RecordingSink::shared();
        handle.tracker.attach_sink(sink.clone());
        handle.sink = Some(sink);
    }
    0
}

/// Take the analytics events delivered to the internal sink, as a JSON array.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_drain_events(tracker: *mut EngageTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;
    let events = match &handle.sink {
        Some(sink) => sink.borrow_mut().take_events(),
        None => Vec::new(),
    };
    json_to_cstr(&events)
}

/// Take the UI commands issued since the last drain, as a JSON array.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_drain_ui(tracker: *mut EngageTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let commands = (*tracker).tracker.host_mut().take_commands();
    json_to_cstr(&commands)
}

/// Return the analytics snapshot as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_snapshot(tracker: *mut EngageTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match (*tracker).tracker.snapshot_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by tracker functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `engage_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next tracker call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engage_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engage_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
