//! Bounded history windows forwarded to the language model.
//!
//! The window only limits what is sent upstream; stored history is never
//! trimmed here.

use serde::{Deserialize, Serialize};

use super::traits::Message;

/// Default number of most recent messages forwarded per turn.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 10;
/// Default aggregate character budget for a context window.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 16_000;

/// Bounds applied when building a context window. `0` disables a bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_messages: usize,
    pub max_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// The chronological slice of history handed to the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextWindow {
    /// Oldest first.
    pub messages: Vec<Message>,
    /// Number of older messages left out of the window.
    pub dropped: usize,
    pub total_chars: usize,
}

impl ContextWindow {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Derives context windows from session history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder {
    limits: ContextLimits,
}

impl ContextBuilder {
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Keep the newest messages that fit both bounds, dropping from the oldest end.
    ///
    /// The newest message is always kept even if it alone exceeds `max_chars`.
    /// Role alternation is not checked: unanswered user turns are ordinary history.
    pub fn build(&self, history: &[Message]) -> ContextWindow {
        let mut kept = 0usize;
        let mut total_chars = 0usize;

        for message in history.iter().rev() {
            if self.limits.max_messages > 0 && kept >= self.limits.max_messages {
                break;
            }
            let len = message.content.chars().count();
            if kept > 0 && self.limits.max_chars > 0 && total_chars + len > self.limits.max_chars
            {
                break;
            }
            kept += 1;
            total_chars += len;
        }

        let start = history.len() - kept;
        ContextWindow {
            messages: history[start..].to_vec(),
            dropped: start,
            total_chars,
        }
    }
}
