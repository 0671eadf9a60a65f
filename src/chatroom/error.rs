//! Error taxonomy shared by every component of the chat room.
//!
//! Failures carry the [`Phase`] of the run they happened in so the caller can
//! tell the user whether agent creation, a specific turn, the analysis or the
//! save went wrong. Store failures are reported as [`ChatRoomError::Persistence`]
//! and become [`ChatRoomError::SaveFailed`] once a chat room tries to save.
//!
//! ```
//! use chatroom::error::{ChatRoomError, GenerationFailure, Phase};
//!
//! let err = ChatRoomError::Generation {
//!     phase: Phase::Turn { turn: 3 },
//!     failure: GenerationFailure::EmptyContent,
//! };
//! assert_eq!(err.to_string(), "Generation failed during turn 3: empty content");
//! ```

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// The step of a chat room run in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Creating the agent in the given 1-based roster slot.
    Initialization { slot: usize },
    /// Producing the message for the given 1-based global turn.
    Turn { turn: usize },
    /// Requesting the transcript analysis.
    Analysis,
    /// Writing the finished session to the store.
    Save,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialization { slot } => write!(f, "initialization of agent {}", slot),
            Phase::Turn { turn } => write!(f, "turn {}", turn),
            Phase::Analysis => write!(f, "analysis"),
            Phase::Save => write!(f, "save"),
        }
    }
}

/// Why a request to the text generation service did not produce a usable result.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationFailure {
    /// The service or transport returned an error.
    Service(String),
    /// The request did not complete within the configured timeout.
    Timeout(Duration),
    /// The service answered with no content.
    EmptyContent,
    /// The response could not be parsed into the expected shape.
    Malformed(String),
    /// A required field was absent or empty.
    MissingField(&'static str),
    /// The analysis has no entry for an agent that spoke in the transcript.
    MissingAgentEntry(String),
    /// A score fell outside `0..=100`.
    ScoreOutOfRange { field: String, value: f64 },
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationFailure::Service(msg) => write!(f, "service error: {}", msg),
            GenerationFailure::Timeout(after) => {
                write!(f, "timed out after {:.1}s", after.as_secs_f64())
            }
            GenerationFailure::EmptyContent => write!(f, "empty content"),
            GenerationFailure::Malformed(msg) => write!(f, "malformed response: {}", msg),
            GenerationFailure::MissingField(field) => write!(f, "missing field '{}'", field),
            GenerationFailure::MissingAgentEntry(name) => {
                write!(f, "analysis has no entry for agent '{}'", name)
            }
            GenerationFailure::ScoreOutOfRange { field, value } => {
                write!(f, "score '{}' = {} is outside 0..=100", field, value)
            }
        }
    }
}

/// Errors surfaced by the chat room and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatRoomError {
    /// Input outside the declared bounds, rejected before orchestration begins.
    Configuration(String),

    /// The text generation service failed during `phase`.
    Generation {
        phase: Phase,
        failure: GenerationFailure,
    },

    /// The session store could not be read or written, or returned corrupt data.
    Persistence(String),

    /// The store rejected the session a chat room tried to save.
    SaveFailed(String),

    /// A cancellation request was honoured at the boundary before `phase`.
    Cancelled { phase: Phase },

    /// A conversation was requested before any agents were created or loaded.
    NoAgents,
}

impl ChatRoomError {
    /// The phase the failure belongs to, when it is tied to one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ChatRoomError::Generation { phase, .. } | ChatRoomError::Cancelled { phase } => {
                Some(*phase)
            }
            ChatRoomError::SaveFailed(_) => Some(Phase::Save),
            ChatRoomError::Configuration(_)
            | ChatRoomError::Persistence(_)
            | ChatRoomError::NoAgents => None,
        }
    }
}

impl fmt::Display for ChatRoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRoomError::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            ChatRoomError::Generation { phase, failure } => {
                write!(f, "Generation failed during {}: {}", phase, failure)
            }
            ChatRoomError::Persistence(msg) => write!(f, "Session store error: {}", msg),
            ChatRoomError::SaveFailed(msg) => {
                write!(f, "Session store error during {}: {}", Phase::Save, msg)
            }
            ChatRoomError::Cancelled { phase } => write!(f, "Cancelled before {}", phase),
            ChatRoomError::NoAgents => write!(f, "No agents available for conversation"),
        }
    }
}

impl Error for ChatRoomError {}

/// A resumed roster whose size differs from a newly requested agent count.
///
/// The roster wins: the count is overwritten with the roster size and this value
/// is handed back so callers can report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumptionMismatch {
    pub requested: usize,
    pub roster: usize,
}

impl fmt::Display for ResumptionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requested {} agents but the resumed roster has {}; using the roster",
            self.requested, self.roster
        )
    }
}
