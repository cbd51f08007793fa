//! Engagement tracking
//!
//! The pieces of page-lifetime engagement tracking, tied together by
//! `EngagementTracker`.

pub mod capture;
pub mod exit_intent;
pub mod feedback;
pub mod milestones;
pub mod scoring;
pub mod tracker;

pub use capture::{capture_click, classify, engagement_signals, EngagementSignals};
pub use exit_intent::{ExitIntent, ExitIntentPhase};
pub use feedback::{DialogChoice, DialogPhase, ExitDialog};
pub use milestones::{scroll_percent, scroll_percentage, ScrollTracker};
pub use scoring::{engagement_score, recommendations, MAX_ENGAGEMENT_SCORE};
pub use tracker::{EngagementTracker, HostEvent};
