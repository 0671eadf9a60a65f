//! The conversation orchestrator.
//!
//! A [`ChatRoom`] owns the agent roster and the transcript of one run and drives
//! the whole lifecycle:
//!
//! 1. **Roster**: [`initialize_agents`](ChatRoom::initialize_agents) creates one agent
//!    per slot, strictly one after another, asking an [`AgentSlotSource`] how each
//!    slot should be created. Alternatively [`resume_from`](ChatRoom::resume_from)
//!    takes the roster of a saved session and skips creation entirely.
//! 2. **Turns**: [`run_conversation`](ChatRoom::run_conversation) runs
//!    `messages_per_agent` rounds of strict round-robin. Global turn `t` (0-based)
//!    belongs to `roster[t % roster.len()]`.
//! 3. **Analysis**: [`analyze_conversation`](ChatRoom::analyze_conversation) asks for a
//!    structured analysis of the transcript.
//! 4. **Persistence**: [`save_session`](ChatRoom::save_session) writes roster,
//!    transcript and analysis through a [`SessionStore`].
//!
//! # Cancellation
//!
//! The [`CancellationToken`] is checked before every agent creation and before every
//! turn, and it interrupts the pacing delay between turns. A request in flight is
//! never interrupted, so a turn either appends its message or does not happen.
//! Whatever was appended before cancellation stays in place.
//!
//! # Failures
//!
//! A failed or empty turn aborts the run with [`ChatRoomError::Generation`] carrying
//! [`Phase::Turn`]. Messages from earlier turns are kept.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatroom::chat_room::ChatRoom;
//! use chatroom::clients::openai::OpenAIClient;
//! use chatroom::config::{AppConfig, ChatRoomConfig};
//! use chatroom::session_store::JsonFileSessionStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = AppConfig::from_env()?;
//!     let client = Arc::new(OpenAIClient::from_config(&app)?);
//!     let store = Arc::new(JsonFileSessionStore::new(app.storage_dir.clone()));
//!
//!     let config = ChatRoomConfig::new(2, "Do colors have a taste?", 2)?;
//!     let mut room = ChatRoom::from_app_config(&app, config, client, store);
//!
//!     room.initialize_random_agents().await?;
//!     room.run_conversation().await?;
//!     for message in room.messages() {
//!         println!("{}: {}", message.agent_name, message.content);
//!     }
//!     let id = room.save_session().await?;
//!     println!("saved as {}", id);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::chatroom::agent::{Agent, CreationMode};
use crate::chatroom::analytics::ChatAnalytics;
use crate::chatroom::client_wrapper::{ClientWrapper, TokenUsage};
use crate::chatroom::config::{AppConfig, ChatRoomConfig};
use crate::chatroom::context_window::ContextWindow;
use crate::chatroom::error::{ChatRoomError, Phase, ResumptionMismatch};
use crate::chatroom::event::{ChatRoomEvent, EventHandler};
use crate::chatroom::generator::Generator;
use crate::chatroom::session::{NewSession, Session};
use crate::chatroom::session_store::SessionStore;
use crate::chatroom::transcript::{ChatMessage, Transcript};

/// Decides how the agent of each roster slot is created.
///
/// Implementations may block on outside input, such as a user answering prompts.
#[async_trait]
pub trait AgentSlotSource: Send {
    /// Creation mode for `slot` (1-based) of `total`.
    async fn creation_mode(
        &mut self,
        slot: usize,
        total: usize,
    ) -> Result<CreationMode, ChatRoomError>;
}

/// Every slot is created at random.
pub struct RandomSlots;

#[async_trait]
impl AgentSlotSource for RandomSlots {
    async fn creation_mode(&mut self, _: usize, _: usize) -> Result<CreationMode, ChatRoomError> {
        Ok(CreationMode::Random)
    }
}

/// Slot `n` uses the `n`-th mode; slots past the end are random.
#[async_trait]
impl AgentSlotSource for Vec<CreationMode> {
    async fn creation_mode(
        &mut self,
        slot: usize,
        _: usize,
    ) -> Result<CreationMode, ChatRoomError> {
        Ok(self.get(slot - 1).cloned().unwrap_or(CreationMode::Random))
    }
}

pub struct ChatRoom {
    config: ChatRoomConfig,
    generator: Generator,
    store: Arc<dyn SessionStore>,
    agents: Vec<Agent>,
    transcript: Transcript,
    /// Analysis of the current transcript; cleared whenever the transcript changes.
    analytics: Option<ChatAnalytics>,
    event_handler: Option<Arc<dyn EventHandler>>,
    cancel: CancellationToken,
    turn_delay: Duration,
    context_window: ContextWindow,
}

impl ChatRoom {
    /// A room with no pacing delay and the default context window.
    pub fn new(config: ChatRoomConfig, generator: Generator, store: Arc<dyn SessionStore>) -> Self {
        ChatRoom {
            config,
            generator,
            store,
            agents: Vec::new(),
            transcript: Transcript::new(),
            analytics: None,
            event_handler: None,
            cancel: CancellationToken::new(),
            turn_delay: Duration::ZERO,
            context_window: ContextWindow::default(),
        }
    }

    /// A room configured from the process settings.
    pub fn from_app_config(
        app: &AppConfig,
        config: ChatRoomConfig,
        client: Arc<dyn ClientWrapper>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        ChatRoom::new(config, Generator::new(client, app.request_timeout), store)
            .with_turn_delay(app.turn_delay)
            .with_context_window(app.context_window)
    }

    pub fn with_turn_delay(mut self, delay: Duration) -> Self {
        self.turn_delay = delay;
        self
    }

    pub fn with_context_window(mut self, window: ContextWindow) -> Self {
        self.context_window = window;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this room at its next boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ChatRoomConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn analytics(&self) -> Option<&ChatAnalytics> {
        self.analytics.as_ref()
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.generator.token_usage()
    }

    async fn emit(&self, event: ChatRoomEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    /// Create the roster, one agent per configured slot.
    ///
    /// The previous roster and transcript are discarded first. On failure or
    /// cancellation the agents created so far remain in the roster.
    pub async fn initialize_agents(
        &mut self,
        slots: &mut dyn AgentSlotSource,
    ) -> Result<(), ChatRoomError> {
        self.agents.clear();
        self.reset_messages();

        let total = self.config.number_of_agents();
        for slot in 1..=total {
            let phase = Phase::Initialization { slot };
            if self.cancel.is_cancelled() {
                log::info!("ChatRoom::initialize_agents(...): cancelled before slot {}", slot);
                return Err(ChatRoomError::Cancelled { phase });
            }

            let mode = slots.creation_mode(slot, total).await?;
            let agent = self
                .generator
                .generate_agent(self.config.topic(), &mode)
                .await
                .map_err(|failure| {
                    log::error!(
                        "ChatRoom::initialize_agents(...): slot {} failed: {}",
                        slot,
                        failure
                    );
                    ChatRoomError::Generation { phase, failure }
                })?;

            log::debug!(
                "ChatRoom::initialize_agents(...): slot {} is {} ({})",
                slot,
                agent.name,
                mode.label()
            );
            self.agents.push(agent.clone());
            self.emit(ChatRoomEvent::AgentCreated {
                slot,
                agent,
                mode: mode.label(),
            })
            .await;
        }
        Ok(())
    }

    /// Create the whole roster at random.
    pub async fn initialize_random_agents(&mut self) -> Result<(), ChatRoomError> {
        self.initialize_agents(&mut RandomSlots).await
    }

    /// Take over the roster of a saved session. The transcript starts empty.
    ///
    /// The roster size replaces the configured agent count; the mismatch, if any,
    /// is returned.
    pub async fn resume_from(
        &mut self,
        session: &Session,
    ) -> Result<Option<ResumptionMismatch>, ChatRoomError> {
        if session.agents.is_empty() {
            return Err(ChatRoomError::NoAgents);
        }
        let mismatch = self.set_agents(session.agents.clone());
        log::info!(
            "ChatRoom::resume_from(...): resumed {} agents from {}",
            self.agents.len(),
            session.id
        );
        self.emit(ChatRoomEvent::RosterResumed {
            session_id: session.id.clone(),
            agents: self.agents.len(),
            mismatch,
        })
        .await;
        Ok(mismatch)
    }

    /// Replace the roster and start a fresh transcript.
    pub fn set_agents(&mut self, agents: Vec<Agent>) -> Option<ResumptionMismatch> {
        self.agents = agents;
        self.reset_messages();
        self.config.reconcile_with_roster(self.agents.len())
    }

    /// Replace the per-conversation parameters, keeping roster and transcript.
    ///
    /// With a roster in place its size wins over the new agent count.
    pub fn set_config(&mut self, config: ChatRoomConfig) -> Option<ResumptionMismatch> {
        self.config = config;
        self.config.reconcile_with_roster(self.agents.len())
    }

    /// Start a fresh transcript for an independent conversation.
    pub fn reset_messages(&mut self) {
        self.transcript.clear();
        self.analytics = None;
    }

    /// Run `messages_per_agent` rounds of round-robin turns over the roster.
    pub async fn run_conversation(&mut self) -> Result<(), ChatRoomError> {
        if self.agents.is_empty() {
            return Err(ChatRoomError::NoAgents);
        }

        let roster_size = self.agents.len();
        let total_rounds = self.config.messages_per_agent();
        let total_turns = roster_size * total_rounds;

        log::info!(
            "ChatRoom::run_conversation(...): {} agents, {} rounds on '{}'",
            roster_size,
            total_rounds,
            self.config.topic()
        );
        self.emit(ChatRoomEvent::ConversationStarted {
            topic: self.config.topic().to_string(),
            agents: roster_size,
            total_turns,
        })
        .await;

        for t in 0..total_turns {
            let turn = t + 1;
            if t > 0 {
                self.pause(turn).await?;
            }
            if self.cancel.is_cancelled() {
                log::info!("ChatRoom::run_conversation(...): cancelled before turn {}", turn);
                return Err(ChatRoomError::Cancelled {
                    phase: Phase::Turn { turn },
                });
            }

            if t % roster_size == 0 {
                let round = t / roster_size + 1;
                log::debug!("ChatRoom::run_conversation(...): round {}/{}", round, total_rounds);
                self.emit(ChatRoomEvent::RoundStarted {
                    round,
                    total_rounds,
                })
                .await;
            }

            let speaker = &self.agents[t % roster_size];
            let context = self.context_window.render(self.transcript.messages());
            let content = self
                .generator
                .generate_message(speaker, self.config.topic(), &context)
                .await
                .map_err(|failure| {
                    log::error!(
                        "ChatRoom::run_conversation(...): turn {} ({}) failed: {}",
                        turn,
                        speaker.name,
                        failure
                    );
                    ChatRoomError::Generation {
                        phase: Phase::Turn { turn },
                        failure,
                    }
                })?;

            log::debug!(
                "ChatRoom::run_conversation(...): turn {} by {} ({} chars)",
                turn,
                speaker.name,
                content.len()
            );
            self.transcript.push(ChatMessage::new(speaker.name.clone(), content));
            self.analytics = None;

            if let Some(message) = self.transcript.messages().last().cloned() {
                self.emit(ChatRoomEvent::MessageAppended { turn, message })
                    .await;
            }
        }

        self.emit(ChatRoomEvent::ConversationCompleted {
            messages: self.transcript.len(),
        })
        .await;
        Ok(())
    }

    /// Wait out the pacing delay before `turn`, waking early on cancellation.
    async fn pause(&self, turn: usize) -> Result<(), ChatRoomError> {
        if self.turn_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {
                log::info!("ChatRoom::pause(...): cancelled while waiting for turn {}", turn);
                Err(ChatRoomError::Cancelled { phase: Phase::Turn { turn } })
            }
            _ = tokio::time::sleep(self.turn_delay) => Ok(()),
        }
    }

    /// Request a fresh analysis of the current transcript.
    ///
    /// Every call issues a new request; the latest result is remembered for
    /// [`save_session`](ChatRoom::save_session).
    pub async fn analyze_conversation(&mut self) -> Result<ChatAnalytics, ChatRoomError> {
        let analytics = self
            .generator
            .analyze(self.transcript.messages())
            .await
            .map_err(|failure| {
                log::error!("ChatRoom::analyze_conversation(...): {}", failure);
                ChatRoomError::Generation {
                    phase: Phase::Analysis,
                    failure,
                }
            })?;

        self.analytics = Some(analytics.clone());
        self.emit(ChatRoomEvent::AnalysisCompleted {
            speakers: analytics.agent_behavior_analysis.len(),
        })
        .await;
        Ok(analytics)
    }

    /// Persist roster, transcript and analysis as a new session and return its id.
    ///
    /// The transcript is analyzed first unless it already was. A store failure is
    /// reported as [`ChatRoomError::SaveFailed`].
    pub async fn save_session(&mut self) -> Result<String, ChatRoomError> {
        let analytics = match self.analytics.clone() {
            Some(analytics) => analytics,
            None => self.analyze_conversation().await?,
        };

        let session_id = self
            .store
            .save_session(NewSession {
                topic: self.config.topic().to_string(),
                agents: self.agents.clone(),
                messages: self.transcript.messages().to_vec(),
                analytics,
            })
            .await
            .map_err(|e| {
                log::error!("ChatRoom::save_session(...): {}", e);
                match e {
                    ChatRoomError::Persistence(msg) => ChatRoomError::SaveFailed(msg),
                    other => other,
                }
            })?;

        self.emit(ChatRoomEvent::SessionSaved {
            session_id: session_id.clone(),
        })
        .await;
        Ok(session_id)
    }
}
