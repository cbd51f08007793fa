//! Outbound reporting
//!
//! Relays named analytics events to an injected sink. Until a sink is
//! attached events are buffered; if none shows up before the detection
//! deadline the tracking state is written once to a fallback store and
//! further events are dropped.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::TrackerError;
use crate::types::TrackingState;

/// Category/label/value triple plus free-form custom fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    pub event_category: String,
    pub event_label: String,
    pub value: u64,
    #[serde(flatten)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// A named event bound for the analytics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub params: EventParams,
}

impl AnalyticsEvent {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        label: impl Into<String>,
        value: u64,
    ) -> Self {
        Self {
            name: name.into(),
            params: EventParams {
                event_category: category.into(),
                event_label: label.into(),
                value,
                custom: BTreeMap::new(),
            },
        }
    }

    pub fn with_custom(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.custom.insert(key.to_string(), value.into());
        self
    }
}

/// Configuration handed to a sink when it is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub measurement_id: String,
    pub custom_map: BTreeMap<String, String>,
}

impl SinkConfig {
    /// Measurement id with the tracker's custom parameter mapping
    pub fn for_measurement(measurement_id: &str) -> Self {
        let custom_map = [
            ("custom_parameter_1", "user_engagement_level"),
            ("custom_parameter_2", "scroll_depth"),
            ("custom_parameter_3", "time_on_page"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            measurement_id: measurement_id.to_string(),
            custom_map,
        }
    }
}

/// External analytics service. Fire-and-forget: delivery failures are the
/// sink's problem and are never reported back.
pub trait AnalyticsSink {
    /// Called once when the sink is attached
    fn configure(&mut self, _config: &SinkConfig) {}

    fn send(&mut self, event: &AnalyticsEvent);
}

/// In-memory sink that keeps everything it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub config: Option<SinkConfig>,
    pub events: Vec<AnalyticsEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle so the caller can inspect events after handing the sink over
    pub fn shared() -> Rc<RefCell<RecordingSink>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn take_events(&mut self) -> Vec<AnalyticsEvent> {
        std::mem::take(&mut self.events)
    }
}

impl AnalyticsSink for RecordingSink {
    fn configure(&mut self, config: &SinkConfig) {
        self.config = Some(config.clone());
    }

    fn send(&mut self, event: &AnalyticsEvent) {
        self.events.push(event.clone());
    }
}

impl<S: AnalyticsSink> AnalyticsSink for Rc<RefCell<S>> {
    fn configure(&mut self, config: &SinkConfig) {
        self.borrow_mut().configure(config);
    }

    fn send(&mut self, event: &AnalyticsEvent) {
        self.borrow_mut().send(event);
    }
}

/// Key/value persistence used when no sink is available
pub trait FallbackStore {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TrackerError>;

    fn get_item(&self, key: &str) -> Option<String>;
}

/// HashMap-backed store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<MemoryStore>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FallbackStore for MemoryStore {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }
}

/// Store that writes each key to `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl FallbackStore for FileStore {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TrackerError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TrackerError::Storage(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| TrackerError::Storage(format!("{}: {}", path.display(), e)))
    }

    fn get_item(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }
}

impl<S: FallbackStore> FallbackStore for Rc<RefCell<S>> {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.borrow_mut().set_item(key, value)
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.borrow().get_item(key)
    }
}

/// Where the reporter currently sends events
enum SinkState {
    /// No sink yet; events wait in order
    Detecting { buffer: Vec<AnalyticsEvent> },
    Attached(Box<dyn AnalyticsSink>),
    /// Deadline passed without a sink
    Unavailable,
}

/// Observable reporter status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStatus {
    Detecting,
    Attached,
    Unavailable,
}

/// Routes events to the sink, the detection buffer, or nowhere
pub struct Reporter {
    state: SinkState,
    fallback: Box<dyn FallbackStore>,
    fallback_key: String,
    fallback_written: bool,
    dropped: u64,
}

impl Reporter {
    pub fn new(fallback: Box<dyn FallbackStore>, fallback_key: impl Into<String>) -> Self {
        Self {
            state: SinkState::Detecting { buffer: Vec::new() },
            fallback,
            fallback_key: fallback_key.into(),
            fallback_written: false,
            dropped: 0,
        }
    }

    pub fn status(&self) -> SinkStatus {
        match self.state {
            SinkState::Detecting { .. } => SinkStatus::Detecting,
            SinkState::Attached(_) => SinkStatus::Attached,
            SinkState::Unavailable => SinkStatus::Unavailable,
        }
    }

    /// Number of events waiting for a sink
    pub fn buffered(&self) -> usize {
        match &self.state {
            SinkState::Detecting { buffer } => buffer.len(),
            _ => 0,
        }
    }

    /// Events discarded because no sink was available
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn fallback_written(&self) -> bool {
        self.fallback_written
    }

    pub fn report(&mut self, event: AnalyticsEvent) {
        match &mut self.state {
            SinkState::Attached(sink) => sink.send(&event),
            SinkState::Detecting { buffer } => buffer.push(event),
            SinkState::Unavailable => {
                log::debug!("Analytics sink unavailable, dropping '{}' event", event.name);
                self.dropped += 1;
            }
        }
    }

    /// Inject the sink, configure it and flush anything buffered
    pub fn attach(&mut self, mut sink: Box<dyn AnalyticsSink>, config: &SinkConfig) {
        sink.configure(config);

        let previous = std::mem::replace(&mut self.state, SinkState::Unavailable);
        if let SinkState::Detecting { buffer } = previous {
            for event in &buffer {
                sink.send(event);
            }
            if !buffer.is_empty() {
                log::info!("Flushed {} buffered analytics events", buffer.len());
            }
        }

        log::info!("Analytics sink attached ({})", config.measurement_id);
        self.state = SinkState::Attached(sink);
    }

    /// Detection deadline reached. Without a sink, persist `state` once and
    /// stop buffering. Returns whether the fallback was written.
    pub fn detection_deadline(&mut self, state: &TrackingState) -> bool {
        let SinkState::Detecting { buffer } = &self.state else {
            return false;
        };

        self.dropped += buffer.len() as u64;
        self.state = SinkState::Unavailable;
        log::info!("Analytics sink not detected, using fallback tracking");

        if self.fallback_written {
            return false;
        }

        let written = serde_json::to_string(state)
            .map_err(TrackerError::from)
            .and_then(|json| self.fallback.set_item(&self.fallback_key, &json));

        match written {
            Ok(()) => {
                self.fallback_written = true;
                true
            }
            Err(e) => {
                log::warn!("Failed to write fallback analytics data: {}", e);
                false
            }
        }
    }
}
