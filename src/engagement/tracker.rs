//! Engagement tracker orchestration
//!
//! `EngagementTracker` owns the page-lifetime state and reacts to host
//! events and timer ticks. Every handler runs to completion before the next
//! event or timer, so mutations are atomic with respect to each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::engagement::capture::{capture_click, engagement_signals};
use crate::engagement::exit_intent::{ExitIntent, ExitIntentAction, ExitIntentPhase};
use crate::engagement::feedback::{progress_command, DialogChoice, DialogPhase, ExitDialog, Feedback};
use crate::engagement::milestones::{reach_time_milestones, scroll_percentage, ScrollTracker};
use crate::engagement::scoring::{engagement_score, recommendations};
use crate::error::TrackerError;
use crate::host::{Host, PageElement, UiCommand};
use crate::reporting::{
    AnalyticsEvent, AnalyticsSink, FallbackStore, MemoryStore, Reporter, SinkConfig, SinkStatus,
};
use crate::timers::{TimerId, TimerQueue};
use crate::types::{
    AnalyticsSnapshot, ClickRecord, ElementSnapshot, PageGeometry, PointerPosition, TrackingState,
};

/// Interaction events delivered by the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Document finished loading; the tracker starts here
    DomReady,
    Click {
        element: ElementSnapshot,
        x: f64,
        y: f64,
        #[serde(default)]
        geometry: PageGeometry,
    },
    Scroll {
        geometry: PageGeometry,
    },
    /// Pointer left the document at vertical coordinate `y`
    MouseLeave {
        y: f64,
    },
    MouseEnter,
    BeforeUnload,
    /// A button in the exit dialog was pressed
    DialogAction {
        choice: DialogChoice,
    },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::DomReady => "dom_ready",
            HostEvent::Click { .. } => "click",
            HostEvent::Scroll { .. } => "scroll",
            HostEvent::MouseLeave { .. } => "mouse_leave",
            HostEvent::MouseEnter => "mouse_enter",
            HostEvent::BeforeUnload => "before_unload",
            HostEvent::DialogAction { .. } => "dialog_action",
        }
    }
}

/// Deferred work on the timer queue
#[derive(Debug, Clone)]
enum Task {
    ScrollSettle,
    ExitIntentDelay,
    ForwardClick(AnalyticsEvent),
    TimeTick,
    SinkDeadline,
    RemoveRipple(u64),
    HideIndicator,
    DialogEnter,
    RemoveDialog,
}

/// The engagement tracker for one page view
pub struct EngagementTracker<H: Host> {
    config: TrackerConfig,
    session_id: String,
    started_at: DateTime<Utc>,
    ready_at: Option<u64>,
    state: TrackingState,
    timers: TimerQueue<Task>,
    /// Target of the `advance_to` call in progress
    horizon_ms: u64,
    scroll: ScrollTracker,
    exit_intent: ExitIntent,
    feedback: Feedback,
    reporter: Reporter,
    host: H,
}

impl<H: Host> EngagementTracker<H> {
    /// Create a tracker with an in-memory fallback store
    pub fn new(config: TrackerConfig, host: H) -> Result<Self, TrackerError> {
        Self::with_fallback(config, host, Box::new(MemoryStore::new()))
    }

    /// Create a tracker persisting its fallback snapshot to `fallback`
    pub fn with_fallback(
        config: TrackerConfig,
        host: H,
        fallback: Box<dyn FallbackStore>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let reporter = Reporter::new(fallback, config.fallback_key.clone());

        Ok(Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ready_at: None,
            state: TrackingState::default(),
            timers: TimerQueue::new(),
            horizon_ms: 0,
            scroll: ScrollTracker::new(),
            exit_intent: ExitIntent::new(),
            feedback: Feedback::new(),
            reporter,
            host,
        })
    }

    /// Override the wall-clock start used for click timestamps
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Override the generated session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready_at.is_some()
    }

    /// Current virtual time, milliseconds since page load
    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn sink_status(&self) -> SinkStatus {
        self.reporter.status()
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn exit_intent_phase(&self) -> ExitIntentPhase {
        self.exit_intent.phase()
    }

    pub fn dialog_phase(&self) -> DialogPhase {
        self.feedback.dialog
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Milliseconds since the tracker started
    pub fn elapsed_ms(&self) -> u64 {
        match self.ready_at {
            Some(ready_at) => self.now_ms().saturating_sub(ready_at),
            None => 0,
        }
    }

    /// Inject the analytics sink once it is known
    pub fn attach_sink<S: AnalyticsSink + 'static>(&mut self, sink: S) {
        let config = SinkConfig::for_measurement(&self.config.measurement_id);
        self.reporter.attach(Box::new(sink), &config);
    }

    /// Run every timer due at or before `now_ms`, then move the clock there
    pub fn advance_to(&mut self, now_ms: u64) {
        self.horizon_ms = self.horizon_ms.max(now_ms);
        while let Some((id, task)) = self.timers.pop_due(now_ms) {
            self.run_task(id, task);
        }
        self.timers.settle(now_ms);
    }

    /// Deliver a host event observed at `now_ms`
    pub fn dispatch(&mut self, now_ms: u64, event: HostEvent) {
        self.advance_to(now_ms);

        if !self.is_ready() && !matches!(event, HostEvent::DomReady) {
            log::debug!("Ignoring '{}' before DOM ready", event.name());
            return;
        }

        match event {
            HostEvent::DomReady => self.start(),
            HostEvent::Click {
                element,
                x,
                y,
                geometry,
            } => self.handle_click(&element, PointerPosition { x, y }, geometry),
            HostEvent::Scroll { geometry } => self.handle_scroll(geometry),
            HostEvent::MouseLeave { y } => self.handle_mouse_leave(y),
            HostEvent::MouseEnter => self.handle_mouse_enter(),
            HostEvent::BeforeUnload => self.handle_before_unload(),
            HostEvent::DialogAction { choice } => self.handle_dialog_action(choice),
        }
    }

    /// Debug view: state plus duration, score and recommendations
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            state: self.state.clone(),
            session_duration_ms: self.elapsed_ms(),
            engagement_score: engagement_score(&self.state),
            recommendations: recommendations(&self.state),
        }
    }

    pub fn snapshot_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    fn start(&mut self) {
        if self.ready_at.is_some() {
            return;
        }
        self.ready_at = Some(self.now_ms());
        self.timers.schedule(self.config.time_tick_ms, Task::TimeTick);
        self.timers.schedule(self.config.sink_timeout_ms, Task::SinkDeadline);
        log::info!("Engagement tracker initialized (session {})", self.session_id);
    }

    fn run_task(&mut self, id: TimerId, task: Task) {
        match task {
            Task::ScrollSettle => self.settle_scroll(),
            Task::ExitIntentDelay => {
                if let ExitIntentAction::Fire { .. } = self.exit_intent.delay_elapsed(id) {
                    self.fire_exit_intent();
                }
            }
            Task::ForwardClick(event) => self.reporter.report(event),
            Task::TimeTick => self.tick(),
            Task::SinkDeadline => {
                if self.reporter.detection_deadline(&self.state) {
                    log::info!(
                        "Stored fallback analytics data under '{}'",
                        self.config.fallback_key
                    );
                }
            }
            Task::RemoveRipple(ripple) => self.host.apply(UiCommand::RemoveRipple { id: ripple }),
            Task::HideIndicator => {
                if self.feedback.indicator_hidden(id) {
                    self.host.apply(UiCommand::HideIndicator);
                }
            }
            Task::DialogEnter => {
                if self.feedback.dialog == DialogPhase::Mounted {
                    self.feedback.dialog = DialogPhase::Visible;
                    self.host.apply(UiCommand::ShowExitDialog);
                }
            }
            Task::RemoveDialog => {
                if self.feedback.dialog == DialogPhase::Closing {
                    self.feedback.dialog = DialogPhase::Absent;
                    self.host.apply(UiCommand::RemoveExitDialog);
                }
            }
        }
    }

    fn handle_click(
        &mut self,
        element: &ElementSnapshot,
        pointer: PointerPosition,
        geometry: PageGeometry,
    ) {
        let record = capture_click(element, pointer, geometry, self.started_at, self.elapsed_ms());
        log::debug!(
            "Click tracked: {} {} ({})",
            record.element,
            record.click_type.as_str(),
            record.category.as_str()
        );

        self.timers
            .schedule(self.config.analytics_delay_ms, Task::ForwardClick(click_event(&record)));
        self.state.clicks.push(record);

        let signals = engagement_signals(element);
        if let Some(product) = signals.product_view {
            self.state.engagement.product_views += 1;
            self.reporter
                .report(AnalyticsEvent::new("view_item", "ecommerce", product, 1));
            self.show_indicator();
        }
        if signals.whatsapp_click {
            self.state.engagement.whatsapp_clicks += 1;
            self.reporter.report(whatsapp_event("direct_click"));
        }
        if signals.form_interaction {
            self.state.engagement.form_interactions += 1;
            self.reporter.report(AnalyticsEvent::new(
                "form_interaction",
                "engagement",
                "user_interacted_with_form",
                1,
            ));
        }

        let ripple = self.feedback.next_ripple_id();
        self.host.apply(UiCommand::SpawnRipple {
            id: ripple,
            x: pointer.x,
            y: pointer.y,
        });
        self.timers
            .schedule(self.config.ripple_lifetime_ms, Task::RemoveRipple(ripple));
    }

    fn handle_scroll(&mut self, geometry: PageGeometry) {
        if self.host.has_element(PageElement::ScrollProgressBar) {
            self.host.apply(progress_command(&geometry));
        }

        if self.host.has_element(PageElement::EngagementIndicator)
            && !self.state.engagement_shown
            && scroll_percentage(&geometry) >= self.config.indicator_scroll_threshold
        {
            self.state.engagement_shown = true;
            self.show_indicator();
        }

        let timer = self
            .timers
            .schedule(self.config.scroll_debounce_ms, Task::ScrollSettle);
        if let Some(previous) = self.scroll.observe(geometry, timer) {
            self.timers.cancel(previous);
        }
    }

    fn settle_scroll(&mut self) {
        let Some(eval) = self
            .scroll
            .settle(&self.config.scroll_thresholds, &mut self.state.scroll_milestones)
        else {
            return;
        };

        for threshold in &eval.new_milestones {
            log::info!("Scroll milestone reached: {}%", threshold);
            self.reporter.report(AnalyticsEvent::new(
                "scroll",
                "engagement",
                format!("{}%", threshold),
                u64::from(*threshold),
            ));
        }

        log::trace!(
            "Scroll settled at {}% ({:?}, delta {})",
            eval.percentage,
            eval.direction,
            eval.delta
        );

        if eval.percentage >= self.config.engaged_scroll_threshold
            && !self.state.engagement.high_engagement
        {
            self.state.engagement.high_engagement = true;
            self.reporter.report(AnalyticsEvent::new(
                "high_engagement",
                "engagement",
                "user_scrolled_75_percent",
                self.state.time_on_page_ms,
            ));
        }
    }

    fn tick(&mut self) {
        self.state.time_on_page_ms = self.state.time_on_page_ms.max(self.elapsed_ms());

        let reached = reach_time_milestones(
            self.state.time_on_page_ms,
            &self.config.time_thresholds_ms,
            &mut self.state.time_milestones,
        );
        for milestone in reached {
            let seconds = milestone / 1000;
            log::info!("Time milestone reached: {}s", seconds);
            self.reporter.report(AnalyticsEvent::new(
                "time_milestone",
                "engagement",
                format!("{}s", seconds),
                seconds,
            ));
        }

        self.schedule_next_tick();
    }

    /// Queue the next time tick on the tick grid. Ticks with nothing else
    /// due before them are collapsed into the last one the clock reaches.
    fn schedule_next_tick(&mut self) {
        let period = self.config.time_tick_ms;
        let Some(next) = self.now_ms().checked_add(period) else {
            log::debug!("Time ticks stopped: clock at {}ms", self.now_ms());
            return;
        };

        let limit = match self.timers.next_due() {
            Some(due) => self.horizon_ms.min(due.saturating_sub(1)),
            None => self.horizon_ms,
        };
        let due_at = if limit > next {
            next + (limit - next) / period * period
        } else {
            next
        };
        self.timers.schedule_at(due_at, Task::TimeTick);
    }

    fn handle_mouse_leave(&mut self, y: f64) {
        if let ExitIntentAction::Schedule = self.exit_intent.pointer_left(y) {
            let timer = self
                .timers
                .schedule(self.config.exit_intent_delay_ms, Task::ExitIntentDelay);
            self.exit_intent.arm(timer);
        }
    }

    fn handle_mouse_enter(&mut self) {
        if let ExitIntentAction::Cancel(timer) = self.exit_intent.pointer_entered() {
            self.timers.cancel(timer);
        }
    }

    fn handle_before_unload(&mut self) {
        if let ExitIntentAction::Fire { cancel } = self.exit_intent.before_unload() {
            if let Some(timer) = cancel {
                self.timers.cancel(timer);
            }
            self.fire_exit_intent();
            self.host.apply(UiCommand::ConfirmLeave {
                message: self.config.leave_message.clone(),
            });
        }
    }

    fn fire_exit_intent(&mut self) {
        if self.state.exit_intent_triggered {
            return;
        }
        self.state.exit_intent_triggered = true;
        log::info!("Exit intent detected and tracked");
        self.reporter.report(AnalyticsEvent::new(
            "exit_intent",
            "engagement",
            "user_attempting_to_leave",
            self.state.time_on_page_ms,
        ));

        if self.feedback.dialog == DialogPhase::Absent {
            self.feedback.dialog = DialogPhase::Mounted;
            self.host.apply(UiCommand::MountExitDialog {
                dialog: ExitDialog::new(&self.config),
            });
            self.timers
                .schedule(self.config.dialog_enter_delay_ms, Task::DialogEnter);
        }
    }

    fn handle_dialog_action(&mut self, choice: DialogChoice) {
        if !matches!(self.feedback.dialog, DialogPhase::Mounted | DialogPhase::Visible) {
            return;
        }

        if choice == DialogChoice::Whatsapp {
            self.reporter.report(whatsapp_event("exit_intent"));
        }

        if choice.dismisses() {
            self.feedback.dialog = DialogPhase::Closing;
            self.host.apply(UiCommand::HideExitDialog);
            self.timers
                .schedule(self.config.dialog_fade_ms, Task::RemoveDialog);
        }
    }

    fn show_indicator(&mut self) {
        if !self.host.has_element(PageElement::EngagementIndicator) {
            return;
        }
        self.host.apply(UiCommand::ShowIndicator);
        let timer = self
            .timers
            .schedule(self.config.indicator_lifetime_ms, Task::HideIndicator);
        if let Some(previous) = self.feedback.replace_indicator_timer(timer) {
            self.timers.cancel(previous);
        }
    }
}

/// Delayed click event with the element, text and time on page attached
fn click_event(record: &ClickRecord) -> AnalyticsEvent {
    AnalyticsEvent::new(
        "click",
        record.category.as_str(),
        record.click_type.as_str(),
        record.importance.weight(),
    )
    .with_custom("custom_parameter_1", record.element.clone())
    .with_custom("custom_parameter_2", record.text.clone())
    .with_custom("custom_parameter_3", record.time_on_page_ms)
}

fn whatsapp_event(source: &str) -> AnalyticsEvent {
    AnalyticsEvent::new("whatsapp_click", "conversion", source, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::reporting::RecordingSink;
    use crate::types::ClickCategory;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ready_tracker() -> (EngagementTracker<RecordingHost>, Rc<RefCell<RecordingSink>>) {
        let mut tracker = EngagementTracker::new(TrackerConfig::default(), RecordingHost::new()).unwrap();
        let sink = RecordingSink::shared();
        tracker.attach_sink(sink.clone());
        tracker.dispatch(0, HostEvent::DomReady);
        (tracker, sink)
    }

    fn geometry(percent: f64) -> PageGeometry {
        PageGeometry::new(percent * 20.0, 2800.0, 800.0)
    }

    fn click(element: ElementSnapshot) -> HostEvent {
        HostEvent::Click {
            element,
            x: 100.0,
            y: 200.0,
            geometry: geometry(0.0),
        }
    }

    #[test]
    fn test_events_before_ready_are_ignored() {
        let mut tracker = EngagementTracker::new(TrackerConfig::default(), RecordingHost::new()).unwrap();
        tracker.dispatch(10, click(ElementSnapshot::new("a")));
        assert!(tracker.state().clicks.is_empty());
        assert_eq!(tracker.pending_timers(), 0);
    }

    #[test]
    fn test_dom_ready_is_idempotent() {
        let (mut tracker, _) = ready_tracker();
        let pending = tracker.pending_timers();
        tracker.dispatch(5, HostEvent::DomReady);
        assert_eq!(tracker.pending_timers(), pending);
    }

    #[test]
    fn test_click_forwarding_is_delayed() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(1_000, click(ElementSnapshot::new("button")));
        assert_eq!(tracker.state().clicks.len(), 1);
        assert!(!sink.borrow().names().contains(&"click"));

        tracker.advance_to(3_999);
        assert!(!sink.borrow().names().contains(&"click"));

        tracker.advance_to(4_000);
        let sink = sink.borrow();
        let event = sink.events.iter().find(|e| e.name == "click").unwrap();
        assert_eq!(event.params.event_category, "general");
        assert_eq!(event.params.event_label, "button");
        assert_eq!(event.params.value, 1);
        assert_eq!(event.params.custom["custom_parameter_1"], "button");
        assert_eq!(event.params.custom["custom_parameter_3"], 1_000);
    }

    #[test]
    fn test_whatsapp_click_counts_and_reports() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(500, click(ElementSnapshot::new("a").with_href("https://wa.me/254700000000")));

        assert_eq!(tracker.state().engagement.whatsapp_clicks, 1);
        let record = &tracker.state().clicks[0];
        assert_eq!(record.category, ClickCategory::Whatsapp);

        let sink = sink.borrow();
        let event = sink.events.iter().find(|e| e.name == "whatsapp_click").unwrap();
        assert_eq!(event.params.event_category, "conversion");
        assert_eq!(event.params.event_label, "direct_click");
    }

    #[test]
    fn test_product_click_shows_indicator() {
        let (mut tracker, sink) = ready_tracker();
        let card = ElementSnapshot::new("div")
            .with_class("product-card")
            .with_heading("Warm White Curtain Lights");
        tracker.dispatch(500, click(card));

        assert_eq!(tracker.state().engagement.product_views, 1);
        assert_eq!(sink.borrow().events[0].name, "view_item");
        assert_eq!(sink.borrow().events[0].params.event_label, "Warm White Curtain Lights");
        assert!(tracker.host().commands().contains(&UiCommand::ShowIndicator));

        tracker.advance_to(4_499);
        assert!(!tracker.host().commands().contains(&UiCommand::HideIndicator));
        tracker.advance_to(4_500);
        assert!(tracker.host().commands().contains(&UiCommand::HideIndicator));
    }

    #[test]
    fn test_ripple_removed_after_lifetime() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(100, click(ElementSnapshot::new("p")));
        assert!(tracker
            .host()
            .commands()
            .contains(&UiCommand::SpawnRipple { id: 1, x: 100.0, y: 200.0 }));

        tracker.advance_to(699);
        assert!(!tracker.host().commands().contains(&UiCommand::RemoveRipple { id: 1 }));
        tracker.advance_to(700);
        assert!(tracker.host().commands().contains(&UiCommand::RemoveRipple { id: 1 }));
    }

    #[test]
    fn test_scroll_is_debounced() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(1_000, HostEvent::Scroll { geometry: geometry(30.0) });
        tracker.dispatch(1_100, HostEvent::Scroll { geometry: geometry(55.0) });
        tracker.advance_to(1_200);
        assert!(tracker.state().scroll_milestones.is_empty());

        tracker.advance_to(1_250);
        assert_eq!(
            tracker.state().scroll_milestones.iter().copied().collect::<Vec<_>>(),
            vec![25, 50]
        );
        let labels: Vec<String> = sink
            .borrow()
            .events
            .iter()
            .filter(|e| e.name == "scroll")
            .map(|e| e.params.event_label.clone())
            .collect();
        assert_eq!(labels, vec!["25%", "50%"]);
    }

    #[test]
    fn test_progress_bar_follows_raw_scroll() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(100, HostEvent::Scroll { geometry: geometry(12.5) });
        assert!(tracker
            .host()
            .commands()
            .contains(&UiCommand::SetProgressWidth { percent: 12.5 }));
    }

    #[test]
    fn test_missing_elements_are_skipped() {
        let host = RecordingHost::new()
            .without(PageElement::ScrollProgressBar)
            .without(PageElement::EngagementIndicator);
        let mut tracker = EngagementTracker::new(TrackerConfig::default(), host).unwrap();
        tracker.dispatch(0, HostEvent::DomReady);
        tracker.dispatch(100, HostEvent::Scroll { geometry: geometry(80.0) });
        tracker.dispatch(200, click(ElementSnapshot::new("div").with_class("product-card")));
        tracker.advance_to(500);

        let commands = tracker.host().commands();
        assert!(!commands.iter().any(|c| matches!(c, UiCommand::SetProgressWidth { .. })));
        assert!(!commands.contains(&UiCommand::ShowIndicator));
        assert!(!tracker.state().engagement_shown);
        assert_eq!(tracker.state().engagement.product_views, 1);
    }

    #[test]
    fn test_scroll_indicator_shown_once() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(100, HostEvent::Scroll { geometry: geometry(30.0) });
        tracker.dispatch(10_000, HostEvent::Scroll { geometry: geometry(60.0) });
        let shows = tracker
            .host()
            .commands()
            .iter()
            .filter(|c| **c == UiCommand::ShowIndicator)
            .count();
        assert_eq!(shows, 1);
        assert!(tracker.state().engagement_shown);
    }

    #[test]
    fn test_time_milestones_and_tick() {
        let (mut tracker, sink) = ready_tracker();
        tracker.advance_to(61_000);

        assert_eq!(tracker.state().time_on_page_ms, 61_000);
        assert_eq!(
            tracker.state().time_milestones.iter().copied().collect::<Vec<_>>(),
            vec![30_000, 60_000]
        );
        let labels: Vec<String> = sink
            .borrow()
            .events
            .iter()
            .filter(|e| e.name == "time_milestone")
            .map(|e| e.params.event_label.clone())
            .collect();
        assert_eq!(labels, vec!["30s", "60s"]);
    }

    #[test]
    fn test_long_idle_jump_records_each_time_milestone_once() {
        let (mut tracker, sink) = ready_tracker();
        tracker.advance_to(1_000_000_000_000);

        assert_eq!(tracker.state().time_on_page_ms, 1_000_000_000_000);
        assert_eq!(
            tracker.state().time_milestones.iter().copied().collect::<Vec<_>>(),
            vec![30_000, 60_000, 120_000, 300_000]
        );
        let labels: Vec<String> = sink
            .borrow()
            .events
            .iter()
            .filter(|e| e.name == "time_milestone")
            .map(|e| e.params.event_label.clone())
            .collect();
        assert_eq!(labels, vec!["30s", "60s", "120s", "300s"]);

        tracker.advance_to(1_000_000_001_000);
        assert_eq!(tracker.state().time_on_page_ms, 1_000_000_001_000);
        assert_eq!(tracker.state().time_milestones.len(), 4);
    }

    #[test]
    fn test_clock_at_u64_max_stops_ticking() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(u64::MAX, HostEvent::MouseEnter);

        assert_eq!(tracker.now_ms(), u64::MAX);
        assert_eq!(tracker.state().time_milestones.len(), 4);
        assert_eq!(tracker.pending_timers(), 0);
    }

    #[test]
    fn test_idle_jump_keeps_tick_grid_around_other_timers() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(500, click(ElementSnapshot::new("button")));
        tracker.advance_to(40_000);

        let sink = sink.borrow();
        let click = sink.events.iter().find(|e| e.name == "click").unwrap();
        assert_eq!(click.params.custom["custom_parameter_3"], 500);
        assert_eq!(tracker.state().time_on_page_ms, 40_000);
        assert_eq!(sink.names().iter().filter(|n| **n == "time_milestone").count(), 1);
    }

    #[test]
    fn test_exit_intent_fires_after_delay() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(5_000, HostEvent::MouseLeave { y: -2.0 });
        assert_eq!(tracker.exit_intent_phase(), ExitIntentPhase::Armed);

        tracker.advance_to(7_000);
        assert_eq!(tracker.exit_intent_phase(), ExitIntentPhase::Fired);
        assert!(tracker.state().exit_intent_triggered);
        assert_eq!(tracker.dialog_phase(), DialogPhase::Mounted);

        let event = sink
            .borrow()
            .events
            .iter()
            .find(|e| e.name == "exit_intent")
            .cloned()
            .unwrap();
        assert_eq!(event.params.event_label, "user_attempting_to_leave");
        // value is the last refreshed time on page; the 7s tick runs after the delay
        assert_eq!(event.params.value, 6_000);

        tracker.advance_to(7_100);
        assert_eq!(tracker.dialog_phase(), DialogPhase::Visible);
    }

    #[test]
    fn test_dialog_dismissal_fades_then_removes() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(0, HostEvent::BeforeUnload);
        tracker.advance_to(100);
        tracker.dispatch(1_000, HostEvent::DialogAction { choice: DialogChoice::ContinueBrowsing });
        assert_eq!(tracker.dialog_phase(), DialogPhase::Closing);

        tracker.advance_to(1_299);
        assert!(!tracker.host().commands().contains(&UiCommand::RemoveExitDialog));
        tracker.advance_to(1_300);
        assert!(tracker.host().commands().contains(&UiCommand::RemoveExitDialog));
        assert_eq!(tracker.dialog_phase(), DialogPhase::Absent);
    }

    #[test]
    fn test_dialog_whatsapp_choice_reports_source() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(0, HostEvent::BeforeUnload);
        tracker.dispatch(500, HostEvent::DialogAction { choice: DialogChoice::Whatsapp });

        let sink = sink.borrow();
        let event = sink.events.iter().find(|e| e.name == "whatsapp_click").unwrap();
        assert_eq!(event.params.event_label, "exit_intent");
        assert_eq!(tracker.dialog_phase(), DialogPhase::Visible);
        assert_eq!(tracker.state().engagement.whatsapp_clicks, 0);
    }

    #[test]
    fn test_dialog_action_without_dialog_is_ignored() {
        let (mut tracker, sink) = ready_tracker();
        tracker.dispatch(500, HostEvent::DialogAction { choice: DialogChoice::Whatsapp });
        assert!(sink.borrow().events.is_empty());
    }

    #[test]
    fn test_before_unload_prompts_once() {
        let (mut tracker, _) = ready_tracker();
        tracker.dispatch(1_000, HostEvent::BeforeUnload);
        tracker.dispatch(2_000, HostEvent::BeforeUnload);
        let prompts = tracker
            .host()
            .commands()
            .iter()
            .filter(|c| matches!(c, UiCommand::ConfirmLeave { .. }))
            .count();
        assert_eq!(prompts, 1);
    }

    #[test]
    fn test_snapshot() {
        let (mut tracker, _) = ready_tracker();
        let tracker_id = tracker.session_id().to_string();
        tracker.dispatch(2_000, click(ElementSnapshot::new("a").with_href("https://wa.me/1")));
        tracker.advance_to(5_000);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.session_id, tracker_id);
        assert_eq!(snapshot.session_duration_ms, 5_000);
        assert_eq!(snapshot.engagement_score, 22);
        assert_eq!(snapshot.recommendations.len(), 2);

        let json: serde_json::Value = serde_json::from_str(&tracker.snapshot_json().unwrap()).unwrap();
        assert_eq!(json["engagement"]["whatsapp_clicks"], 1);
        assert_eq!(json["clicks"][0]["type"], "whatsapp");
        assert_eq!(json["engagement_score"], 22);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TrackerConfig {
            scroll_thresholds: vec![50, 25],
            ..TrackerConfig::default()
        };
        assert!(EngagementTracker::new(config, RecordingHost::new()).is_err());
    }
}
