//! Turn configuration

use crate::session::HistoryWindow;

use super::system_prompt::DEFAULT_SYSTEM_PROMPT;

/// Default limit on chat-completion rounds in one turn
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Configuration for a [`TurnProcessor`](super::TurnProcessor)
///
/// ```ignore
/// let config = TurnConfig::new("You are a helpful assistant")
///     .with_max_rounds(10)
///     .with_history_window(HistoryWindow::LastMessages(40));
/// ```
#[derive(Clone)]
pub struct TurnConfig {
    /// System prompt for the LLM
    pub system_prompt: String,

    /// Maximum number of chat-completion rounds per turn (prevents endless tool loops)
    pub max_rounds: usize,

    /// Portion of the transcript sent with each request
    pub history_window: HistoryWindow,
}

impl TurnConfig {
    /// Create a new turn configuration with a system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            history_window: HistoryWindow::Unbounded,
        }
    }

    /// Set maximum rounds per turn (at least 1)
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    /// Set the history window
    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history_window = window;
        self
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl std::fmt::Debug for TurnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnConfig")
            .field("system_prompt_len", &self.system_prompt.len())
            .field("max_rounds", &self.max_rounds)
            .field("history_window", &self.history_window)
            .finish()
    }
}
