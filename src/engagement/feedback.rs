//! Presentation feedback
//!
//! Models for the transient UI the tracker drives: the exit-intent dialog,
//! click ripples, the scroll progress bar and the engagement indicator.
//! Rendering is the host's job; this module only decides what to show.

use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::engagement::milestones::scroll_percent;
use crate::host::UiCommand;
use crate::timers::TimerId;
use crate::types::PageGeometry;

/// Buttons offered by the exit dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogChoice {
    /// The close (×) button
    Close,
    /// "Yes, I found what I need"
    StayOnSite,
    ContinueBrowsing,
    /// WhatsApp help link, opens in a new tab
    Whatsapp,
}

impl DialogChoice {
    /// Whether picking this choice dismisses the dialog
    pub fn dismisses(&self) -> bool {
        !matches!(self, DialogChoice::Whatsapp)
    }
}

/// One actionable element in the dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogAction {
    pub choice: DialogChoice,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Content of the retention dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDialog {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub highlights: Vec<String>,
    pub actions: Vec<DialogAction>,
}

impl ExitDialog {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            title: "Wait! Don't go yet! ✨".to_string(),
            paragraphs: vec![
                "Did you find what you were looking for?".to_string(),
                "We have amazing lighting solutions that might interest you:".to_string(),
            ],
            highlights: vec![
                "✨ Premium decorative lights".to_string(),
                "🏠 Home & event lighting".to_string(),
                "🚚 Fast delivery across Kenya".to_string(),
                "💬 Easy WhatsApp ordering".to_string(),
            ],
            actions: vec![
                DialogAction {
                    choice: DialogChoice::Close,
                    label: "×".to_string(),
                    href: None,
                },
                DialogAction {
                    choice: DialogChoice::StayOnSite,
                    label: "Yes, I found what I need".to_string(),
                    href: None,
                },
                DialogAction {
                    choice: DialogChoice::ContinueBrowsing,
                    label: "Continue browsing".to_string(),
                    href: None,
                },
                DialogAction {
                    choice: DialogChoice::Whatsapp,
                    label: "Get Help via WhatsApp".to_string(),
                    href: Some(config.whatsapp_help_link()),
                },
            ],
        }
    }

    pub fn action(&self, choice: DialogChoice) -> Option<&DialogAction> {
        self.actions.iter().find(|a| a.choice == choice)
    }
}

/// Lifecycle of the dialog node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPhase {
    Absent,
    /// In the document, waiting for its enter transition
    Mounted,
    Visible,
    /// Fading out, removal scheduled
    Closing,
}

/// Bookkeeping for transient UI
#[derive(Debug, Clone)]
pub struct Feedback {
    pub dialog: DialogPhase,
    next_ripple: u64,
    indicator_timer: Option<TimerId>,
}

impl Default for Feedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback {
    pub fn new() -> Self {
        Self {
            dialog: DialogPhase::Absent,
            next_ripple: 1,
            indicator_timer: None,
        }
    }

    /// Allocate an id for a new ripple
    pub fn next_ripple_id(&mut self) -> u64 {
        let id = self.next_ripple;
        self.next_ripple += 1;
        id
    }

    /// Record a new indicator hide timer, returning the one it replaces
    pub fn replace_indicator_timer(&mut self, timer: TimerId) -> Option<TimerId> {
        self.indicator_timer.replace(timer)
    }

    /// The hide timer ran
    pub fn indicator_hidden(&mut self, timer: TimerId) -> bool {
        if self.indicator_timer == Some(timer) {
            self.indicator_timer = None;
            true
        } else {
            false
        }
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator_timer.is_some()
    }
}

/// Progress bar update for a raw scroll event
pub fn progress_command(geometry: &PageGeometry) -> UiCommand {
    UiCommand::SetProgressWidth {
        percent: scroll_percent(geometry).min(100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::TimerQueue;

    #[test]
    fn test_dialog_has_three_choices_and_close() {
        let dialog = ExitDialog::new(&TrackerConfig::default());
        assert_eq!(dialog.actions.len(), 4);

        let whatsapp = dialog.action(DialogChoice::Whatsapp).unwrap();
        assert!(whatsapp.href.as_deref().unwrap().starts_with("https://wa.me/254724275560?text="));
        assert!(dialog.action(DialogChoice::StayOnSite).unwrap().href.is_none());
    }

    #[test]
    fn test_dismissing_choices() {
        assert!(DialogChoice::Close.dismisses());
        assert!(DialogChoice::StayOnSite.dismisses());
        assert!(DialogChoice::ContinueBrowsing.dismisses());
        assert!(!DialogChoice::Whatsapp.dismisses());
    }

    #[test]
    fn test_choice_wire_names() {
        let json = serde_json::to_string(&DialogChoice::ContinueBrowsing).unwrap();
        assert_eq!(json, "\"continue_browsing\"");
    }

    #[test]
    fn test_ripple_ids_increase() {
        let mut feedback = Feedback::new();
        assert_eq!(feedback.next_ripple_id(), 1);
        assert_eq!(feedback.next_ripple_id(), 2);
    }

    #[test]
    fn test_indicator_timer_replacement() {
        let mut queue: TimerQueue<()> = TimerQueue::new();
        let mut feedback = Feedback::new();
        let first = queue.schedule(4_000, ());
        let second = queue.schedule(4_000, ());

        assert_eq!(feedback.replace_indicator_timer(first), None);
        assert_eq!(feedback.replace_indicator_timer(second), Some(first));
        assert!(!feedback.indicator_hidden(first));
        assert!(feedback.indicator_visible());
        assert!(feedback.indicator_hidden(second));
        assert!(!feedback.indicator_visible());
    }

    #[test]
    fn test_progress_command() {
        let command = progress_command(&PageGeometry::new(500.0, 2800.0, 800.0));
        assert_eq!(command, UiCommand::SetProgressWidth { percent: 25.0 });
    }
}
