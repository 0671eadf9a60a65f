//! Chat room event system.
//!
//! A callback-based observability layer for a [`ChatRoom`](crate::chatroom::chat_room::ChatRoom).
//! Implement [`EventHandler`] to be told about:
//!
//! - **Roster**: each created agent, or a roster loaded from a saved session
//! - **Conversation**: run start/end, round boundaries, every appended message
//! - **Results**: analysis completion and the id a session was saved under
//!
//! [`on_event`](EventHandler::on_event) has a default no-op implementation.
//! Handlers are awaited inline, so a slow handler slows the run down.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatroom::event::{ChatRoomEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_event(&self, event: &ChatRoomEvent) {
//!         if let ChatRoomEvent::MessageAppended { message, .. } = event {
//!             println!("{}: {}", message.agent_name, message.content);
//!         }
//!     }
//! }
//! ```

use crate::chatroom::agent::Agent;
use crate::chatroom::error::ResumptionMismatch;
use crate::chatroom::transcript::ChatMessage;
use async_trait::async_trait;

/// Events emitted by a chat room.
#[derive(Debug, Clone)]
pub enum ChatRoomEvent {
    /// An agent was created for roster slot `slot` (1-based).
    AgentCreated {
        slot: usize,
        agent: Agent,
        mode: &'static str,
    },
    /// A roster was taken over from a saved session.
    RosterResumed {
        session_id: String,
        agents: usize,
        mismatch: Option<ResumptionMismatch>,
    },
    ConversationStarted {
        topic: String,
        agents: usize,
        total_turns: usize,
    },
    /// Round `round` (1-based) of `total_rounds` begins.
    RoundStarted { round: usize, total_rounds: usize },
    /// A turn finished and its message is now part of the transcript.
    MessageAppended { turn: usize, message: ChatMessage },
    ConversationCompleted { messages: usize },
    AnalysisCompleted { speakers: usize },
    SessionSaved { session_id: String },
}

/// Receives [`ChatRoomEvent`]s as they happen.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, _event: &ChatRoomEvent) {}
}
