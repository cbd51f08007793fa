//! Engagement Tracker - Page-lifetime engagement analytics for a storefront
//!
//! The tracker observes interaction events pushed in by the host page and
//! turns them into classified click records, one-shot milestones and named
//! analytics events relayed to an injected sink. Time is virtual, so every
//! behavior can be replayed deterministically from a recorded event log.
//!
//! ## Modules
//!
//! - **Engagement**: Capture, milestones, exit intent, scoring and feedback
//! - **Reporting**: Sink injection, buffering and the local fallback store
//! - **Schema**: Recorded host event logs for replay

pub mod config;
pub mod engagement;
pub mod error;
pub mod host;
pub mod reporting;
pub mod schema;
pub mod timers;
pub mod types;

// FFI bindings for C interop, enabled with the `ffi` feature
#[cfg(feature = "ffi")]
pub mod ffi;

pub use config::TrackerConfig;
pub use engagement::{EngagementTracker, HostEvent};
pub use error::TrackerError;
pub use host::{Host, NullHost, PageElement, RecordingHost, UiCommand};
pub use reporting::{
    AnalyticsEvent, AnalyticsSink, FallbackStore, FileStore, MemoryStore, RecordingSink,
    SinkStatus,
};

// Schema exports
pub use schema::{EventLogAdapter, HostEventRecord, SCHEMA_VERSION};

/// Tracker version reported by the CLI and the C API
pub const TRACKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped on replay reports
pub const PRODUCER_NAME: &str = "engagement-tracker";
