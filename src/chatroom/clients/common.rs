use crate::client_wrapper::{SendError, TokenUsage};
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::sync::Mutex;

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, SendError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = api.create_chat(chat_arguments, url_path).await;

    match response {
        Ok(response) => {
            let usage = TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            };

            // Store it for get_last_usage()
            if let Ok(mut slot) = usage_slot.lock() {
                *slot = Some(usage);
            }

            match response.choices.first() {
                Some(choice) => Ok(choice.message.content.clone()),
                None => Err("chat completion returned no choices".into()),
            }
        }
        Err(err) => {
            log::error!(
                "chatroom::clients::common::send_and_track(...): OpenAI API Error: {}",
                err
            );
            Err(format!("OpenAI API Error: {}", err).into())
        }
    }
}
