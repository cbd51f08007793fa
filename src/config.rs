//! Tracker configuration
//!
//! Every threshold and duration the tracker uses lives here. The defaults are
//! the values the storefront ships with; a JSON document can override any
//! subset of them.

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Scroll-depth thresholds in percent
pub const DEFAULT_SCROLL_THRESHOLDS: [u32; 5] = [25, 50, 75, 90, 100];

/// Time-on-page thresholds in milliseconds (30s, 1m, 2m, 5m)
pub const DEFAULT_TIME_THRESHOLDS_MS: [u64; 4] = [30_000, 60_000, 120_000, 300_000];

/// Local storage key used when the analytics sink never shows up
pub const DEFAULT_FALLBACK_KEY: &str = "engagement_analytics_data";

/// Tunable constants for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Scroll-depth milestones, ascending, each in 1..=100
    pub scroll_thresholds: Vec<u32>,
    /// Scroll depth that latches `high_engagement`
    pub engaged_scroll_threshold: u32,
    /// Raw scroll depth that first reveals the engagement indicator
    pub indicator_scroll_threshold: u32,
    /// Time-on-page milestones in milliseconds, ascending
    pub time_thresholds_ms: Vec<u64>,

    /// Quiet period before a scroll position is evaluated
    pub scroll_debounce_ms: u64,
    /// Delay between a top-edge pointer exit and the retention dialog
    pub exit_intent_delay_ms: u64,
    /// Delay applied to every forwarded click event
    pub analytics_delay_ms: u64,
    /// Period of the time-on-page tick
    pub time_tick_ms: u64,
    /// How long to wait for an analytics sink before falling back
    pub sink_timeout_ms: u64,
    /// Lifetime of a click ripple
    pub ripple_lifetime_ms: u64,
    /// How long the engagement indicator stays visible
    pub indicator_lifetime_ms: u64,
    /// Delay before a mounted dialog gets its visible state
    pub dialog_enter_delay_ms: u64,
    /// Fade-out duration before the dialog is removed
    pub dialog_fade_ms: u64,

    /// Key for the one-shot fallback snapshot
    pub fallback_key: String,
    /// Measurement id passed to the sink when it is configured
    pub measurement_id: String,
    /// WhatsApp number (international format, digits only) for the dialog link
    pub whatsapp_number: String,
    /// Prefilled WhatsApp message offered from the exit dialog
    pub whatsapp_help_message: String,
    /// Native leave-confirmation text returned on before-unload
    pub leave_message: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scroll_thresholds: DEFAULT_SCROLL_THRESHOLDS.to_vec(),
            engaged_scroll_threshold: 75,
            indicator_scroll_threshold: 25,
            time_thresholds_ms: DEFAULT_TIME_THRESHOLDS_MS.to_vec(),
            scroll_debounce_ms: 150,
            exit_intent_delay_ms: 2_000,
            analytics_delay_ms: 3_000,
            time_tick_ms: 1_000,
            sink_timeout_ms: 10_000,
            ripple_lifetime_ms: 600,
            indicator_lifetime_ms: 4_000,
            dialog_enter_delay_ms: 100,
            dialog_fade_ms: 300,
            fallback_key: DEFAULT_FALLBACK_KEY.to_string(),
            measurement_id: "GA_MEASUREMENT_ID".to_string(),
            whatsapp_number: "254724275560".to_string(),
            whatsapp_help_message: "Hi Kai Electricals! I need help finding the right lights."
                .to_string(),
            leave_message:
                "Are you sure you want to leave? We have amazing lighting solutions waiting for you!"
                    .to_string(),
        }
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)
            .map_err(|e| TrackerError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the invariants the tracker relies on
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !strictly_ascending(&self.scroll_thresholds) {
            return Err(TrackerError::InvalidConfig(
                "scroll_thresholds must be strictly ascending".to_string(),
            ));
        }
        if let Some(bad) = self
            .scroll_thresholds
            .iter()
            .find(|t| **t == 0 || **t > 100)
        {
            return Err(TrackerError::InvalidConfig(format!(
                "scroll threshold {} is outside 1..=100",
                bad
            )));
        }
        for (name, value) in [
            ("engaged_scroll_threshold", self.engaged_scroll_threshold),
            ("indicator_scroll_threshold", self.indicator_scroll_threshold),
        ] {
            if value > 100 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be at most 100, got {}",
                    name, value
                )));
            }
        }
        if !strictly_ascending(&self.time_thresholds_ms) {
            return Err(TrackerError::InvalidConfig(
                "time_thresholds_ms must be strictly ascending".to_string(),
            ));
        }

        let periods = [
            ("scroll_debounce_ms", self.scroll_debounce_ms),
            ("exit_intent_delay_ms", self.exit_intent_delay_ms),
            ("time_tick_ms", self.time_tick_ms),
            ("sink_timeout_ms", self.sink_timeout_ms),
            ("ripple_lifetime_ms", self.ripple_lifetime_ms),
            ("indicator_lifetime_ms", self.indicator_lifetime_ms),
            ("dialog_fade_ms", self.dialog_fade_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, v)| *v == 0) {
            return Err(TrackerError::InvalidConfig(format!("{} must be non-zero", name)));
        }

        if self.fallback_key.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "fallback_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// WhatsApp deep link with the help message prefilled
    pub fn whatsapp_help_link(&self) -> String {
        format!(
            "https://wa.me/{}?text={}",
            self.whatsapp_number,
            percent_encode(&self.whatsapp_help_message)
        )
    }
}

fn strictly_ascending<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// Minimal `encodeURIComponent` equivalent for the prefilled message
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
