//! Event log parsing, validation and replay
//!
//! Reads recorded page.host_event.v1 logs and drives them through an
//! `EngagementTracker` in timestamp order.

use crate::engagement::tracker::EngagementTracker;
use crate::error::TrackerError;
use crate::host::Host;
use crate::reporting::AnalyticsSink;
use crate::schema::host_event::*;

/// Adapter for recorded host event logs
pub struct EventLogAdapter;

impl EventLogAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<HostEventRecord>, TrackerError> {
        let records: Vec<HostEventRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<HostEventRecord>, TrackerError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<HostEventRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse either format: a leading `[` means a JSON array
    pub fn parse(input: &str) -> Result<Vec<HostEventRecord>, TrackerError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[HostEventRecord]) -> Vec<ValidationResult> {
        let mut failures = Vec::new();
        let mut previous_ms = 0;

        for (index, record) in records.iter().enumerate() {
            let error = match record.validate() {
                Err(e) => Some(e),
                Ok(()) if record.at_ms < previous_ms => Some(ValidationError::OutOfOrder {
                    previous_ms,
                    at_ms: record.at_ms,
                }),
                Ok(()) => None,
            };
            previous_ms = previous_ms.max(record.at_ms);

            if let Some(error) = error {
                failures.push(ValidationResult {
                    index,
                    event_type: record.event.name(),
                    error,
                });
            }
        }

        failures
    }

    /// Feed `records` into `tracker`, then advance the clock to `plan.until`
    /// (or the last record).
    ///
    /// When a sink is given it is attached at `plan.sink_at`, or before the
    /// first record when no time is set. Records must already be validated.
    pub fn replay<H, S>(
        records: &[HostEventRecord],
        tracker: &mut EngagementTracker<H>,
        sink: Option<S>,
        plan: &ReplayPlan,
    ) -> Result<ReplayStats, TrackerError>
    where
        H: Host,
        S: AnalyticsSink + 'static,
    {
        let mut sink = sink;
        let mut stats = ReplayStats::default();

        if plan.sink_at.is_none() {
            if let Some(sink) = sink.take() {
                tracker.attach_sink(sink);
            }
        }

        for record in records {
            if let Some(until) = plan.until {
                if record.at_ms > until {
                    stats.skipped += 1;
                    continue;
                }
            }
            if record.at_ms < tracker.now_ms() {
                return Err(TrackerError::InvalidEvent(format!(
                    "record at {}ms is earlier than the tracker clock ({}ms)",
                    record.at_ms,
                    tracker.now_ms()
                )));
            }

            attach_when_due(tracker, &mut sink, plan.sink_at, record.at_ms);
            tracker.dispatch(record.at_ms, record.event.clone());
            stats.dispatched += 1;
        }

        let end = plan
            .until
            .unwrap_or_else(|| records.last().map_or(0, |r| r.at_ms))
            .max(tracker.now_ms());
        attach_when_due(tracker, &mut sink, plan.sink_at, end);
        tracker.advance_to(end);
        stats.ended_at_ms = tracker.now_ms();

        log::debug!(
            "Replayed {} records ({} skipped) up to {}ms",
            stats.dispatched,
            stats.skipped,
            stats.ended_at_ms
        );
        Ok(stats)
    }
}

fn attach_when_due<H, S>(
    tracker: &mut EngagementTracker<H>,
    sink: &mut Option<S>,
    sink_at: Option<u64>,
    now_ms: u64,
) where
    H: Host,
    S: AnalyticsSink + 'static,
{
    let Some(at) = sink_at else {
        return;
    };
    if sink.is_some() && at <= now_ms {
        tracker.advance_to(at);
        if let Some(sink) = sink.take() {
            tracker.attach_sink(sink);
        }
    }
}

/// When to attach the sink and where to stop the clock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayPlan {
    pub sink_at: Option<u64>,
    pub until: Option<u64>,
}

/// Counts from one replay
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReplayStats {
    pub dispatched: usize,
    /// Records past `until`
    pub skipped: usize,
    pub ended_at_ms: u64,
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_type: &'static str,
    pub error: ValidationError,
}
