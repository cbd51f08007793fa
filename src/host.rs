//! Host environment interface
//!
//! The tracker never touches a real document. Interaction events are pushed
//! in by the host (see `engagement::tracker`), timers are owned by the
//! tracker's `TimerQueue`, and everything visual goes back out through the
//! `Host` trait as `UiCommand`s.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::engagement::feedback::ExitDialog;

/// Pre-existing page elements the tracker drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageElement {
    /// `.scroll-progress-bar`
    ScrollProgressBar,
    /// `#engagement-indicator`
    EngagementIndicator,
}

/// Visual side effects requested by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UiCommand {
    /// Set the progress bar width, in percent
    SetProgressWidth { percent: f64 },
    ShowIndicator,
    HideIndicator,
    /// Append a click ripple at viewport coordinates
    SpawnRipple { id: u64, x: f64, y: f64 },
    RemoveRipple { id: u64 },
    /// Append the exit dialog to the document body (not yet visible)
    MountExitDialog { dialog: ExitDialog },
    /// Add the visible state to the mounted dialog
    ShowExitDialog,
    /// Remove the visible state; the dialog starts fading out
    HideExitDialog,
    RemoveExitDialog,
    /// Ask the browser for its native leave confirmation
    ConfirmLeave { message: String },
}

/// The page the tracker is attached to
pub trait Host {
    /// Whether a pre-existing element is present on the page
    fn has_element(&self, element: PageElement) -> bool;

    /// Apply a visual side effect
    fn apply(&mut self, command: UiCommand);
}

/// Host with no page elements that discards every command
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn has_element(&self, _element: PageElement) -> bool {
        false
    }

    fn apply(&mut self, _command: UiCommand) {}
}

/// Host that records commands, for tests, replays and FFI embedding.
///
/// All page elements are present unless removed with `without`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    missing: HashSet<PageElement>,
    commands: Vec<UiCommand>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a page that lacks `element`
    pub fn without(mut self, element: PageElement) -> Self {
        self.missing.insert(element);
        self
    }

    pub fn commands(&self) -> &[UiCommand] {
        &self.commands
    }

    /// Drain recorded commands
    pub fn take_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Host for RecordingHost {
    fn has_element(&self, element: PageElement) -> bool {
        !self.missing.contains(&element)
    }

    fn apply(&mut self, command: UiCommand) {
        self.commands.push(command);
    }
}

impl<H: Host + ?Sized> Host for Box<H> {
    fn has_element(&self, element: PageElement) -> bool {
        (**self).has_element(element)
    }

    fn apply(&mut self, command: UiCommand) {
        (**self).apply(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_host_elements() {
        let host = RecordingHost::new().without(PageElement::ScrollProgressBar);
        assert!(!host.has_element(PageElement::ScrollProgressBar));
        assert!(host.has_element(PageElement::EngagementIndicator));
    }

    #[test]
    fn test_recording_host_drains() {
        let mut host = RecordingHost::new();
        host.apply(UiCommand::ShowIndicator);
        host.apply(UiCommand::HideIndicator);
        assert_eq!(host.commands().len(), 2);
        assert_eq!(
            host.take_commands(),
            vec![UiCommand::ShowIndicator, UiCommand::HideIndicator]
        );
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_ui_command_wire_format() {
        let json = serde_json::to_value(UiCommand::SpawnRipple { id: 7, x: 10.0, y: 20.0 }).unwrap();
        assert_eq!(json["command"], "spawn_ripple");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_null_host_has_nothing() {
        let mut host = NullHost;
        assert!(!host.has_element(PageElement::EngagementIndicator));
        host.apply(UiCommand::ShowIndicator);
    }
}
