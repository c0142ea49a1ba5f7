//! Bounded view of the transcript sent to the model

use crate::llm::{Message, Role};

/// How much of the stored transcript is sent with each completion request.
/// The stored transcript itself is never truncated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryWindow {
    /// Send everything
    #[default]
    Unbounded,
    /// Send roughly the last `n` messages, starting on a user message
    LastMessages(usize),
}

impl HistoryWindow {
    /// `0` means unbounded
    pub fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            Self::Unbounded
        } else {
            Self::LastMessages(limit)
        }
    }

    /// Select the messages to send.
    ///
    /// The window always starts on a user message so a tool result is never
    /// separated from the call that produced it. The cut moves forward to the
    /// first user message inside the tail, or back to the last one before it
    /// when the current turn is longer than `n`.
    pub fn apply<'a>(&self, messages: &'a [Message]) -> &'a [Message] {
        let n = match *self {
            Self::Unbounded => return messages,
            Self::LastMessages(n) => n,
        };
        if messages.len() <= n {
            return messages;
        }

        let cut = messages.len() - n;
        let is_user = |m: &Message| m.role == Role::User;
        match messages[cut..].iter().position(is_user) {
            Some(start) => &messages[cut + start..],
            None => match messages[..cut].iter().rposition(is_user) {
                Some(start) => &messages[start..],
                None => messages,
            },
        }
    }
}
