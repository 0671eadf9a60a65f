//! Configuration for the chat room.
//!
//! Two values live here:
//!
//! - [`AppConfig`]: process-wide settings (model, credentials, storage location,
//!   pacing, timeouts). It is built once at start-up and handed to every component
//!   that needs it. Nothing reads settings from ambient global state.
//! - [`ChatRoomConfig`]: the per-conversation parameters, validated at construction.
//!
//! # Example
//!
//! ```rust
//! use chatroom::config::{AppConfig, ChatRoomConfig};
//! use std::time::Duration;
//!
//! let app = AppConfig {
//!     turn_delay: Duration::ZERO,
//!     ..AppConfig::default()
//! };
//! assert_eq!(app.model, "gpt-4o-mini");
//!
//! let room = ChatRoomConfig::new(3, "Do colors have a taste?", 2).unwrap();
//! assert_eq!(room.total_turns(), 6);
//! assert!(ChatRoomConfig::new(6, "too many", 2).is_err());
//! ```

use crate::chatroom::context_window::ContextWindow;
use crate::chatroom::error::{ChatRoomError, ResumptionMismatch};
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Allowed number of agents in a room.
pub const AGENT_COUNT_RANGE: RangeInclusive<usize> = 2..=5;

/// Allowed number of turns each agent takes.
pub const MESSAGES_PER_AGENT_RANGE: RangeInclusive<usize> = 1..=10;

/// Process-wide configuration.
///
/// Construct it with [`AppConfig::from_env`] or by hand; no configuration-file
/// parsing dependencies are involved.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the completion service (`OPENAI_API_KEY`).
    pub api_key: Option<String>,
    /// Model every request is sent to (`OPENAI_MODEL`).
    pub model: String,
    /// Optional OpenAI-compatible endpoint (`OPENAI_BASE_URL`).
    pub base_url: Option<String>,
    /// Directory holding one JSON file per saved session (`CHATROOM_STORAGE_DIR`).
    pub storage_dir: PathBuf,
    /// Pause between turns (`CHATROOM_TURN_DELAY_MS`). Zero disables pacing.
    pub turn_delay: Duration,
    /// Upper bound on a single completion request (`CHATROOM_REQUEST_TIMEOUT_SECS`).
    pub request_timeout: Duration,
    /// How much of the transcript each turn sees (`CHATROOM_CONTEXT_MESSAGES`, `0` = unbounded).
    pub context_window: ContextWindow,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            storage_dir: PathBuf::from("experiments"),
            turn_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(120),
            context_window: ContextWindow::default(),
        }
    }
}

impl AppConfig {
    /// Read the configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Malformed numeric values are rejected rather than silently replaced.
    pub fn from_env() -> Result<Self, ChatRoomError> {
        let mut config = AppConfig::default();

        config.api_key = non_empty_var("OPENAI_API_KEY");
        if let Some(model) = non_empty_var("OPENAI_MODEL") {
            config.model = model;
        }
        config.base_url = non_empty_var("OPENAI_BASE_URL");
        if let Some(dir) = non_empty_var("CHATROOM_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var("CHATROOM_TURN_DELAY_MS")? {
            config.turn_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var("CHATROOM_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ChatRoomError::Configuration(
                    "CHATROOM_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max_messages) = parse_var("CHATROOM_CONTEXT_MESSAGES")? {
            config.context_window = match max_messages {
                0 => ContextWindow::Unbounded,
                n => ContextWindow::Recent {
                    max_messages: n as usize,
                },
            };
        }

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var(key: &str) -> Result<Option<u64>, ChatRoomError> {
    match non_empty_var(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            ChatRoomError::Configuration(format!("{} must be a non-negative integer, got '{}'", key, raw))
        }),
    }
}

/// Per-conversation parameters.
///
/// The bounds are enforced by [`ChatRoomConfig::new`]; the chat room trusts a
/// constructed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoomConfig {
    number_of_agents: usize,
    topic: String,
    messages_per_agent: usize,
}

impl ChatRoomConfig {
    pub fn new(
        number_of_agents: usize,
        topic: impl Into<String>,
        messages_per_agent: usize,
    ) -> Result<Self, ChatRoomError> {
        let topic = topic.into().trim().to_string();

        if !AGENT_COUNT_RANGE.contains(&number_of_agents) {
            return Err(ChatRoomError::Configuration(format!(
                "number of agents must be between {} and {}, got {}",
                AGENT_COUNT_RANGE.start(),
                AGENT_COUNT_RANGE.end(),
                number_of_agents
            )));
        }
        if topic.is_empty() {
            return Err(ChatRoomError::Configuration(
                "topic must not be empty".to_string(),
            ));
        }
        if !MESSAGES_PER_AGENT_RANGE.contains(&messages_per_agent) {
            return Err(ChatRoomError::Configuration(format!(
                "messages per agent must be between {} and {}, got {}",
                MESSAGES_PER_AGENT_RANGE.start(),
                MESSAGES_PER_AGENT_RANGE.end(),
                messages_per_agent
            )));
        }

        Ok(Self {
            number_of_agents,
            topic,
            messages_per_agent,
        })
    }

    pub fn number_of_agents(&self) -> usize {
        self.number_of_agents
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn messages_per_agent(&self) -> usize {
        self.messages_per_agent
    }

    /// Turns a full conversation takes with the configured roster size.
    pub fn total_turns(&self) -> usize {
        self.number_of_agents * self.messages_per_agent
    }

    /// Make the agent count agree with a resumed roster.
    ///
    /// The roster size is authoritative. Returns the mismatch when the count had
    /// to be overwritten.
    pub fn reconcile_with_roster(&mut self, roster_size: usize) -> Option<ResumptionMismatch> {
        if roster_size == 0 || roster_size == self.number_of_agents {
            return None;
        }
        let mismatch = ResumptionMismatch {
            requested: self.number_of_agents,
            roster: roster_size,
        };
        log::warn!("ChatRoomConfig::reconcile_with_roster(...): {}", mismatch);
        self.number_of_agents = roster_size;
        Some(mismatch)
    }
}
