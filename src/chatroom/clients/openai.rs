//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat API,
//! capturing both the assistant response and detailed token usage (input vs output)
//! so the generator can report what a conversation cost.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatroom::clients::openai::{OpenAIClient, Model};
//! use chatroom::client_wrapper::{ClientWrapper, Message, OutputShape};
//!
//! #[tokio::main]
//! async fn main() {
//!     let secret_key: String = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
//!     let client = OpenAIClient::new_with_model_enum(&secret_key, Model::GPT4oMini);
//!
//!     let resp = client
//!         .send_message(
//!             &[
//!                 Message::system("You are a terse assistant."),
//!                 Message::user("Hello!"),
//!             ],
//!             OutputShape::FreeText,
//!         )
//!         .await
//!         .unwrap();
//!     println!("Assistant: {}", resp.content);
//!
//!     if let Some(usage) = client.get_last_usage() {
//!         println!(
//!             "Tokens: input {}, output {}, total {}",
//!             usage.input_tokens, usage.output_tokens, usage.total_tokens
//!         );
//!     }
//! }
//! ```
use std::sync::Mutex;

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;

use crate::chatroom::client_wrapper::{
    ClientWrapper, Message, OutputShape, Role, SendError, TokenUsage,
};
use crate::chatroom::config::AppConfig;
use crate::chatroom::error::ChatRoomError;
use crate::clients::common::send_and_track;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

const JSON_OBJECT_DIRECTIVE: &str =
    "Respond with a single valid JSON object and nothing else. Do not wrap it in code fences.";

/// Model identifiers supported by OpenAI's Chat Completions API.
pub enum Model {
    /// `gpt-4o`: Omni model with text + image inputs.
    GPT4o,
    /// `gpt-4o-mini`: cost effective GPT-4o derivative.
    GPT4oMini,
    /// `gpt-4.1`: general availability GPT-4.1.
    GPT41,
    /// `gpt-4.1-mini`: reduced cost GPT-4.1 tier.
    GPT41Mini,
    /// `gpt-4.1-nano`: ultra low cost GPT-4.1 derivative.
    GPT41Nano,
    /// `gpt-5-mini`: fast variant of GPT-5 with balanced cost and quality.
    GPT5Mini,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT41 => "gpt-4.1".to_string(),
        Model::GPT41Mini => "gpt-4.1-mini".to_string(),
        Model::GPT41Nano => "gpt-4.1-nano".to_string(),
        Model::GPT5Mini => "gpt-5-mini".to_string(),
    }
}

/// Client wrapper for OpenAI's Chat Completions API.
///
/// The wrapper holds the selected model identifier plus an internal [`TokenUsage`] slot so
/// callers can inspect how many tokens each request consumed.
pub struct OpenAIClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Model name that will be injected into each request.
    model: String,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and [`Model`] variant.
    pub fn new_with_model_enum(secret_key: &str, model: Model) -> Self {
        Self::new_with_model_string(secret_key, &model_to_string(model))
    }

    /// Construct a new client using the provided API key and explicit model name.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new(secret_key),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Construct a client targeting a custom OpenAI compatible base URL
    /// (the URL must not include the `/v1` suffix).
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_base_url(secret_key, base_url),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    /// Build the client described by the process configuration.
    ///
    /// Fails with [`ChatRoomError::Configuration`] when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChatRoomError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            ChatRoomError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;

        Ok(match &config.base_url {
            Some(base_url) => Self::new_with_base_url(api_key, &config.model, base_url),
            None => Self::new_with_model_string(api_key, &config.model),
        })
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        shape: OutputShape,
    ) -> Result<Message, SendError> {
        // Convert the provided messages into the format expected by openai_rust
        let mut formatted_messages = Vec::with_capacity(messages.len() + 1);
        for msg in messages {
            formatted_messages.push(chat::Message {
                role: msg.role.as_str().to_owned(),
                content: msg.content.clone(),
            });
        }
        if shape == OutputShape::JsonObject {
            formatted_messages.push(chat::Message {
                role: Role::System.as_str().to_owned(),
                content: JSON_OBJECT_DIRECTIVE.to_owned(),
            });
        }

        let content = send_and_track(
            &self.client,
            &self.model,
            formatted_messages,
            Some(CHAT_COMPLETIONS_PATH.to_string()),
            &self.token_usage,
        )
        .await?;

        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
