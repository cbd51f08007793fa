//! Scroll-depth and time-on-page milestones
//!
//! Each threshold fires exactly once per page view. Reached sets only grow.

use std::collections::BTreeSet;

use crate::timers::TimerId;
use crate::types::{PageGeometry, ScrollDirection};

/// Unrounded scroll depth in percent, clamped to `[0, 100]`.
///
/// A page that fits in one viewport (no scrollable distance) counts as
/// fully scrolled.
pub fn scroll_percent(geometry: &PageGeometry) -> f64 {
    let scrollable = geometry.scrollable_height();
    if scrollable <= 0.0 || !scrollable.is_finite() {
        return 100.0;
    }
    let percent = geometry.scroll_y.max(0.0) / scrollable * 100.0;
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

/// Rounded scroll depth used for milestone comparisons
pub fn scroll_percentage(geometry: &PageGeometry) -> u32 {
    scroll_percent(geometry).round() as u32
}

/// Record every threshold `percentage` has crossed for the first time,
/// returning the new ones in ascending order.
pub fn reach_scroll_milestones(
    percentage: u32,
    thresholds: &[u32],
    reached: &mut BTreeSet<u32>,
) -> Vec<u32> {
    thresholds
        .iter()
        .copied()
        .filter(|t| percentage >= *t)
        .filter(|t| reached.insert(*t))
        .collect()
}

/// Record every time threshold `elapsed_ms` has crossed for the first time
pub fn reach_time_milestones(
    elapsed_ms: u64,
    thresholds_ms: &[u64],
    reached: &mut BTreeSet<u64>,
) -> Vec<u64> {
    thresholds_ms
        .iter()
        .copied()
        .filter(|t| elapsed_ms >= *t)
        .filter(|t| reached.insert(*t))
        .collect()
}

/// Outcome of one debounced scroll evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollEvaluation {
    pub percentage: u32,
    pub position: f64,
    /// Only logged at trace level; nothing is reported or stored from it
    pub direction: ScrollDirection,
    /// Absolute distance since the previous evaluation, logged with `direction`
    pub delta: f64,
    /// Milestones crossed by this evaluation, ascending
    pub new_milestones: Vec<u32>,
}

/// Debounce bookkeeping for scroll events
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    last_position: f64,
    pending: Option<PageGeometry>,
    debounce: Option<TimerId>,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a raw scroll event. Returns the previously armed debounce timer,
    /// which the caller must cancel before arming `timer`.
    pub fn observe(&mut self, geometry: PageGeometry, timer: TimerId) -> Option<TimerId> {
        self.pending = Some(geometry);
        self.debounce.replace(timer)
    }

    /// The pending debounce timer, if any
    pub fn debounce_timer(&self) -> Option<TimerId> {
        self.debounce
    }

    /// The quiet window elapsed: evaluate the last observed position
    pub fn settle(&mut self, thresholds: &[u32], reached: &mut BTreeSet<u32>) -> Option<ScrollEvaluation> {
        self.debounce = None;
        let geometry = self.pending.take()?;

        let percentage = scroll_percentage(&geometry);
        let new_milestones = reach_scroll_milestones(percentage, thresholds, reached);

        let position = geometry.scroll_y;
        let direction = if position > self.last_position {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        };
        let delta = (position - self.last_position).abs();
        self.last_position = position;

        Some(ScrollEvaluation {
            percentage,
            position,
            direction,
            delta,
            new_milestones,
        })
    }
}
