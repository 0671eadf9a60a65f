//! Context-window policy for turn generation.
//!
//! Every turn the acting agent is shown the conversation so far, one
//! `agentName: content` line per message in transcript order. [`ContextWindow`]
//! decides how much of the transcript that is:
//!
//! - [`ContextWindow::Unbounded`] passes the entire transcript every turn, so
//!   prompts grow linearly with the conversation.
//! - [`ContextWindow::Recent`] (the default) keeps the newest `max_messages`
//!   messages and evicts older ones oldest-first, replacing them with a single
//!   marker line that says how many were left out.
//!
//! The default cap of 50 equals the largest transcript a validated room can
//! produce (5 agents × 10 messages), so with in-bounds rooms nothing is evicted.
//!
//! ```
//! use chatroom::context_window::ContextWindow;
//! use chatroom::transcript::ChatMessage;
//!
//! let transcript = vec![
//!     ChatMessage::new("Luna", "Colors have moods."),
//!     ChatMessage::new("Smith", "Wavelengths, really."),
//!     ChatMessage::new("Luna", "Moods with wavelengths, then."),
//! ];
//!
//! let window = ContextWindow::Recent { max_messages: 2 };
//! assert_eq!(
//!     window.render(&transcript),
//!     "[1 earlier message omitted]\nSmith: Wavelengths, really.\nLuna: Moods with wavelengths, then."
//! );
//! ```

use crate::chatroom::transcript::{render_lines, ChatMessage};

/// Default number of messages a turn can see.
pub const DEFAULT_CONTEXT_MESSAGES: usize = 50;

/// How much of the transcript is passed to each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextWindow {
    /// Pass the whole transcript, however long.
    Unbounded,
    /// Pass only the newest `max_messages` messages.
    Recent { max_messages: usize },
}

impl Default for ContextWindow {
    fn default() -> Self {
        ContextWindow::Recent {
            max_messages: DEFAULT_CONTEXT_MESSAGES,
        }
    }
}

impl ContextWindow {
    /// The slice of `messages` that fits in the window, plus how many were evicted.
    pub fn select<'a>(&self, messages: &'a [ChatMessage]) -> (usize, &'a [ChatMessage]) {
        match *self {
            ContextWindow::Unbounded => (0, messages),
            ContextWindow::Recent { max_messages } => {
                let evicted = messages.len().saturating_sub(max_messages);
                (evicted, &messages[evicted..])
            }
        }
    }

    /// Render the visible part of the transcript as `agentName: content` lines.
    ///
    /// Returns an empty string for an empty transcript.
    pub fn render(&self, messages: &[ChatMessage]) -> String {
        let (evicted, visible) = self.select(messages);
        let lines = render_lines(visible);
        match evicted {
            0 => lines,
            1 => format!("[1 earlier message omitted]\n{}", lines),
            n => format!("[{} earlier messages omitted]\n{}", n, lines),
        }
    }
}
