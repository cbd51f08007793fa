//! page.host_event.v1 record definition

use serde::{Deserialize, Serialize};

use crate::engagement::tracker::HostEvent;
use crate::types::PageGeometry;

/// Current schema version
pub const SCHEMA_VERSION: &str = "page.host_event.v1";

/// One host event stamped with the virtual time it was observed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEventRecord {
    /// Schema version (always "page.host_event.v1")
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Milliseconds since page load
    pub at_ms: u64,
    pub event: HostEvent,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl HostEventRecord {
    pub fn new(at_ms: u64, event: HostEvent) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            at_ms,
            event,
        }
    }

    /// Check the record on its own. Ordering across records is checked by
    /// `EventLogAdapter::validate_records`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        match &self.event {
            HostEvent::Click { x, y, geometry, .. } => {
                if !x.is_finite() || !y.is_finite() {
                    return Err(ValidationError::InvalidPointer { x: *x, y: *y });
                }
                check_geometry(geometry)
            }
            HostEvent::Scroll { geometry } => check_geometry(geometry),
            HostEvent::MouseLeave { y } if !y.is_finite() => {
                Err(ValidationError::InvalidPointer { x: 0.0, y: *y })
            }
            _ => Ok(()),
        }
    }
}

fn check_geometry(geometry: &PageGeometry) -> Result<(), ValidationError> {
    let fields = [
        ("scroll_y", geometry.scroll_y),
        ("document_height", geometry.document_height),
        ("viewport_height", geometry.viewport_height),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidGeometry {
                field: field.to_string(),
                value,
            });
        }
    }
    Ok(())
}

/// Validation errors for host event records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Invalid geometry: {field} is {value}")]
    InvalidGeometry { field: String, value: f64 },

    #[error("Invalid pointer position: ({x}, {y})")]
    InvalidPointer { x: f64, y: f64 },

    #[error("Timestamp goes backward: {at_ms} after {previous_ms}")]
    OutOfOrder { previous_ms: u64, at_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementSnapshot;

    #[test]
    fn test_deserialize_click_record() {
        let json = r#"{
            "schema_version": "page.host_event.v1",
            "at_ms": 1200,
            "event": {
                "type": "click",
                "element": { "tag": "A", "href": "https://wa.me/254700000000" },
                "x": 10.0,
                "y": 20.0
            }
        }"#;

        let record: HostEventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.at_ms, 1200);
        match &record.event {
            HostEvent::Click { element, geometry, .. } => {
                assert!(element.is_tag("a"));
                assert_eq!(*geometry, PageGeometry::default());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_schema_version_defaults() {
        let record: HostEventRecord =
            serde_json::from_str(r#"{"at_ms":0,"event":{"type":"dom_ready"}}"#).unwrap();
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_serialize_uses_snake_case_tags() {
        let record = HostEventRecord::new(5, HostEvent::MouseLeave { y: -1.0 });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"mouse_leave\""));
        assert!(json.contains("page.host_event.v1"));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut record = HostEventRecord::new(0, HostEvent::DomReady);
        record.schema_version = "page.host_event.v0".to_string();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_negative_geometry_rejected() {
        let record = HostEventRecord::new(
            0,
            HostEvent::Scroll {
                geometry: PageGeometry::new(-5.0, 2000.0, 800.0),
            },
        );
        assert_eq!(
            record.validate(),
            Err(ValidationError::InvalidGeometry {
                field: "scroll_y".to_string(),
                value: -5.0
            })
        );
    }

    #[test]
    fn test_non_finite_pointer_rejected() {
        let record = HostEventRecord::new(
            0,
            HostEvent::Click {
                element: ElementSnapshot::new("div"),
                x: f64::NAN,
                y: 0.0,
                geometry: PageGeometry::default(),
            },
        );
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidPointer { .. })
        ));
    }
}
