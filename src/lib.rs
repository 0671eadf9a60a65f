//! # chatroom
//!
//! A research toolkit for simulating conversations between LLM-backed personas.
//!
//! A [`ChatRoom`] creates a small roster of [`Agent`]s, lets them talk about a topic in
//! strict round-robin order, asks the model for a structured analysis of the transcript,
//! and saves the result as a [`Session`] that can later be resumed with the same roster.
//!
//! The crate is layered like this:
//!
//! * **Transport**: the [`ClientWrapper`] trait and the OpenAI-compatible
//!   [`clients::openai::OpenAIClient`].
//! * **Generation**: [`generator::Generator`] turns completions into agents, turn
//!   messages and validated [`analytics::ChatAnalytics`], bounded by a timeout.
//! * **Orchestration**: [`ChatRoom`] owns roster, transcript, pacing, cancellation and
//!   the context window shown to each turn.
//! * **Persistence**: [`session_store::SessionStore`] with a JSON-file implementation.
//! * **Observability**: `log` diagnostics plus an async [`EventHandler`] callback.
//!
//! ## Running a conversation
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatroom::{AppConfig, ChatRoom, ChatRoomConfig};
//! use chatroom::clients::openai::OpenAIClient;
//! use chatroom::session_store::JsonFileSessionStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     chatroom::init_logger();
//!
//!     let app = AppConfig::from_env()?;
//!     let client = Arc::new(OpenAIClient::from_config(&app)?);
//!     let store = Arc::new(JsonFileSessionStore::new(app.storage_dir.clone()));
//!
//!     let mut room = ChatRoom::from_app_config(
//!         &app,
//!         ChatRoomConfig::new(3, "Is mathematics discovered or invented?", 2)?,
//!         client,
//!         store,
//!     );
//!     room.initialize_random_agents().await?;
//!     room.run_conversation().await?;
//!
//!     let analytics = room.analyze_conversation().await?;
//!     println!("Tone: {}", analytics.summary.overall_tone);
//!     println!("Saved as {}", room.save_session().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Resuming a roster
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatroom::{AppConfig, ChatRoom, ChatRoomConfig};
//! use chatroom::clients::openai::OpenAIClient;
//! use chatroom::session_store::{JsonFileSessionStore, SessionStore};
//!
//! # async fn resume() -> Result<(), Box<dyn std::error::Error>> {
//! let app = AppConfig::from_env()?;
//! let store = Arc::new(JsonFileSessionStore::new(app.storage_dir.clone()));
//! let latest = store.get_all_sessions().await?.into_iter().next().ok_or("no sessions")?;
//!
//! let mut room = ChatRoom::from_app_config(
//!     &app,
//!     ChatRoomConfig::new(latest.agents.len(), "A new topic", 3)?,
//!     Arc::new(OpenAIClient::from_config(&app)?),
//!     store,
//! );
//! room.resume_from(&latest).await?;
//! room.run_conversation().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Verbosity follows `RUST_LOG`.
///
/// ```rust
/// chatroom::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `chatroom` module.
pub mod chatroom;

// Re-exporting key items for easier external access.
pub use chatroom::agent;
pub use chatroom::agent::{Agent, AgentSpec, CreationMode};
pub use chatroom::analytics;
pub use chatroom::chat_room;
pub use chatroom::chat_room::{AgentSlotSource, ChatRoom};
pub use chatroom::client_wrapper;
pub use chatroom::client_wrapper::{ClientWrapper, Message, OutputShape, Role, TokenUsage};
pub use chatroom::clients;
pub use chatroom::config;
pub use chatroom::config::{AppConfig, ChatRoomConfig};
pub use chatroom::context_window;
pub use chatroom::error;
pub use chatroom::error::{ChatRoomError, Phase};
pub use chatroom::event;
pub use chatroom::event::{ChatRoomEvent, EventHandler};
pub use chatroom::generator;
pub use chatroom::prompts;
pub use chatroom::session;
pub use chatroom::session::Session;
pub use chatroom::session_store;
pub use chatroom::structured;
pub use chatroom::transcript;
