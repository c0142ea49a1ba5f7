//! Session loop state types

use serde::{Deserialize, Serialize};

/// Current state of the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoopState {
    /// Between iterations
    #[default]
    Idle,

    /// Calibrating and capturing speech
    Listening,

    /// Running a turn (model calls and tool round-trips)
    Processing,

    /// Synthesizing the reply
    Speaking,

    /// Operator cancelled the loop
    Stopped,
}

impl LoopState {
    /// Check if the loop has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped)
    }

    /// Check if a transition to `next` is allowed
    ///
    /// Any non-terminal state may fall back to `Listening` (recoverable
    /// failures) or move to `Stopped` (operator interrupt).
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;

        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (_, Listening) => true,
            (Listening, Processing) => true,
            (Processing, Speaking) => true,
            (Speaking, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Idle => write!(f, "Idle"),
            LoopState::Listening => write!(f, "Listening"),
            LoopState::Processing => write!(f, "Processing"),
            LoopState::Speaking => write!(f, "Speaking"),
            LoopState::Stopped => write!(f, "Stopped"),
        }
    }
}
