//! Exit-intent arbitration
//!
//! A pointer leaving through the top edge arms a delayed retention dialog.
//! Re-entering before the delay cancels it; letting it elapse fires it.
//! `Fired` is terminal for the page view, and before-unload can reach it
//! directly without passing through `Armed`.

use serde::{Deserialize, Serialize};

use crate::timers::TimerId;

/// Exit-intent phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntentState {
    Pending,
    Armed { timer: TimerId },
    Fired,
}

/// Observable phase name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitIntentPhase {
    Pending,
    Armed,
    Fired,
}

/// What the caller has to do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntentAction {
    Nothing,
    /// Schedule the delayed dialog and pass its id to `arm`
    Schedule,
    /// Cancel this pending timer
    Cancel(TimerId),
    /// Run the fired side effects, cancelling the timer if one is pending
    Fire { cancel: Option<TimerId> },
}

#[derive(Debug, Clone)]
pub struct ExitIntent {
    state: ExitIntentState,
}

impl Default for ExitIntent {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitIntent {
    pub fn new() -> Self {
        Self {
            state: ExitIntentState::Pending,
        }
    }

    pub fn state(&self) -> ExitIntentState {
        self.state
    }

    pub fn phase(&self) -> ExitIntentPhase {
        match self.state {
            ExitIntentState::Pending => ExitIntentPhase::Pending,
            ExitIntentState::Armed { .. } => ExitIntentPhase::Armed,
            ExitIntentState::Fired => ExitIntentPhase::Fired,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.state == ExitIntentState::Fired
    }

    /// Pointer left the document at vertical coordinate `y`
    pub fn pointer_left(&self, y: f64) -> ExitIntentAction {
        match self.state {
            ExitIntentState::Pending if y <= 0.0 => ExitIntentAction::Schedule,
            _ => ExitIntentAction::Nothing,
        }
    }

    /// Record the timer scheduled in response to `Schedule`
    pub fn arm(&mut self, timer: TimerId) {
        if self.state == ExitIntentState::Pending {
            self.state = ExitIntentState::Armed { timer };
        }
    }

    /// Pointer came back into the document
    pub fn pointer_entered(&mut self) -> ExitIntentAction {
        match self.state {
            ExitIntentState::Armed { timer } => {
                self.state = ExitIntentState::Pending;
                ExitIntentAction::Cancel(timer)
            }
            _ => ExitIntentAction::Nothing,
        }
    }

    /// The delayed dialog timer ran
    pub fn delay_elapsed(&mut self, timer: TimerId) -> ExitIntentAction {
        match self.state {
            ExitIntentState::Armed { timer: armed } if armed == timer => {
                self.state = ExitIntentState::Fired;
                ExitIntentAction::Fire { cancel: None }
            }
            _ => ExitIntentAction::Nothing,
        }
    }

    /// The page is about to unload
    pub fn before_unload(&mut self) -> ExitIntentAction {
        match self.state {
            ExitIntentState::Fired => ExitIntentAction::Nothing,
            ExitIntentState::Armed { timer } => {
                self.state = ExitIntentState::Fired;
                ExitIntentAction::Fire {
                    cancel: Some(timer),
                }
            }
            ExitIntentState::Pending => {
                self.state = ExitIntentState::Fired;
                ExitIntentAction::Fire { cancel: None }
            }
        }
    }
}
