//! Domain-level access to the text generation service.
//!
//! [`Generator`] wraps a [`ClientWrapper`] and turns raw completions into the three
//! things the chat room needs: a new [`Agent`], the next utterance of a turn, and a
//! validated [`ChatAnalytics`]. Every request is bounded by the configured timeout
//! and every failure is reported as a [`GenerationFailure`]; nothing is silently
//! replaced with a default.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatroom::agent::CreationMode;
//! use chatroom::clients::openai::OpenAIClient;
//! use chatroom::config::AppConfig;
//! use chatroom::generator::Generator;
//! use std::sync::Arc;
//!
//! # async {
//! let config = AppConfig::from_env().unwrap();
//! let client = Arc::new(OpenAIClient::from_config(&config).unwrap());
//! let mut generator = Generator::new(client, config.request_timeout);
//!
//! let agent = generator
//!     .generate_agent("Do colors have a taste?", &CreationMode::Random)
//!     .await
//!     .unwrap();
//! println!("{} ({} tokens so far)", agent.name, generator.token_usage().total_tokens);
//! # };
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::chatroom::agent::{merge, Agent, AgentDraft, AgentSpec, CreationMode};
use crate::chatroom::analytics::ChatAnalytics;
use crate::chatroom::client_wrapper::{ClientWrapper, Message, OutputShape, TokenUsage};
use crate::chatroom::error::GenerationFailure;
use crate::chatroom::prompts;
use crate::chatroom::structured::{self, StructuredOutput};
use crate::chatroom::transcript::{distinct_speakers, render_lines, strip_speaker_prefix, ChatMessage};

pub struct Generator {
    client: Arc<dyn ClientWrapper>,
    request_timeout: Duration,
    total_usage: TokenUsage,
}

impl Generator {
    pub fn new(client: Arc<dyn ClientWrapper>, request_timeout: Duration) -> Self {
        Generator {
            client,
            request_timeout,
            total_usage: TokenUsage::default(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Tokens spent by every request made through this generator.
    pub fn token_usage(&self) -> TokenUsage {
        self.total_usage.clone()
    }

    /// Create one agent for a conversation about `topic`.
    pub async fn generate_agent(
        &mut self,
        topic: &str,
        mode: &CreationMode,
    ) -> Result<Agent, GenerationFailure> {
        let raw = self
            .request(&prompts::agent_creation(topic, mode), OutputShape::JsonObject)
            .await?;

        let draft: AgentDraft = self.conform(structured::parse(&raw), "agent")?;
        let empty = AgentSpec::default();
        merge(draft, mode.spec().unwrap_or(&empty))
    }

    /// Produce the next utterance of `agent`, with any echoed name prefix removed.
    ///
    /// `context` is the rendered conversation so far.
    pub async fn generate_message(
        &mut self,
        agent: &Agent,
        topic: &str,
        context: &str,
    ) -> Result<String, GenerationFailure> {
        let raw = self
            .request(&prompts::turn(agent, topic, context), OutputShape::FreeText)
            .await?;

        let content = strip_speaker_prefix(&agent.name, &raw);
        if content.is_empty() {
            return Err(GenerationFailure::EmptyContent);
        }
        Ok(content)
    }

    /// Analyze a transcript and check the result covers every speaker.
    pub async fn analyze(
        &mut self,
        messages: &[ChatMessage],
    ) -> Result<ChatAnalytics, GenerationFailure> {
        let speakers = distinct_speakers(messages);
        let raw = self
            .request(
                &prompts::analysis(&render_lines(messages), &speakers),
                OutputShape::JsonObject,
            )
            .await?;

        let analytics: ChatAnalytics = self.conform(structured::parse(&raw), "analysis")?;
        analytics.validate(&speakers)?;
        Ok(analytics)
    }

    fn conform<T>(&self, output: StructuredOutput<T>, what: &str) -> Result<T, GenerationFailure> {
        if let StructuredOutput::Malformed { raw, reason } = &output {
            log::error!(
                "Generator::conform(...): malformed {} response ({}): {}",
                what,
                reason,
                raw
            );
        }
        output.into_result()
    }

    async fn request(
        &mut self,
        messages: &[Message],
        shape: OutputShape,
    ) -> Result<String, GenerationFailure> {
        let outcome = tokio::time::timeout(
            self.request_timeout,
            self.client.send_message(messages, shape),
        )
        .await;

        let reply = match outcome {
            Err(_) => {
                log::warn!(
                    "Generator::request(...): {} did not answer within {:?}",
                    self.client.model_name(),
                    self.request_timeout
                );
                return Err(GenerationFailure::Timeout(self.request_timeout));
            }
            Ok(Err(e)) => {
                log::error!("Generator::request(...): {}", e);
                return Err(GenerationFailure::Service(e.to_string()));
            }
            Ok(Ok(reply)) => reply,
        };

        if let Some(usage) = self.client.get_last_usage() {
            self.total_usage.accumulate(&usage);
        }

        if reply.content.trim().is_empty() {
            return Err(GenerationFailure::EmptyContent);
        }
        Ok(reply.content)
    }
}
