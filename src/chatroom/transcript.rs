//! Transcript entries and the ordered transcript a conversation produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One utterance in the transcript.
///
/// `agent_name` refers to an [`Agent`](crate::chatroom::agent::Agent) by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub agent_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped with the current time.
    pub fn new(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// The `agentName: content` line used in prompts.
    pub fn render(&self) -> String {
        format!("{}: {}", self.agent_name, self.content)
    }
}

/// Render messages as `agentName: content` lines in order.
pub fn render_lines(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(ChatMessage::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct `agent_name`s in order of first appearance.
pub fn distinct_speakers(messages: &[ChatMessage]) -> Vec<String> {
    let mut speakers: Vec<String> = Vec::new();
    for message in messages {
        if !speakers.iter().any(|s| s == &message.agent_name) {
            speakers.push(message.agent_name.clone());
        }
    }
    speakers
}

/// The ordered, append-only sequence of messages of one conversation run.
///
/// Messages are never mutated once appended. Timestamps never go backwards: a
/// message stamped earlier than its predecessor (wall clock adjustments) is
/// re-stamped with the predecessor's time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut message: ChatMessage) {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Only used between independent conversations.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Distinct speaker names in order of first appearance.
    pub fn speakers(&self) -> Vec<String> {
        distinct_speakers(&self.messages)
    }

    /// The whole transcript as `agentName: content` lines.
    pub fn render(&self) -> String {
        render_lines(&self.messages)
    }
}

/// Remove a leading `"<agent_name>:"` echoed by the generator.
///
/// The name is matched case-insensitively and must end at a word boundary: the
/// next character is a colon, whitespace, or the end of the text. An optional
/// colon and any whitespace after the name are dropped as well. Text that does
/// not start with the speaker's name is only trimmed.
///
/// ```
/// use chatroom::transcript::strip_speaker_prefix;
///
/// assert_eq!(strip_speaker_prefix("Luna", "Luna: I think colors matter."), "I think colors matter.");
/// assert_eq!(strip_speaker_prefix("Luna", "LUNA:Sure."), "Sure.");
/// assert_eq!(strip_speaker_prefix("Luna", "Lunatics disagree."), "Lunatics disagree.");
/// ```
pub fn strip_speaker_prefix(agent_name: &str, raw: &str) -> String {
    let text = raw.trim_start();
    let name = agent_name.trim();
    if name.is_empty() {
        return text.trim_end().to_string();
    }

    let mut text_chars = text.char_indices();
    let mut name_end = 0;
    for expected in name.chars() {
        match text_chars.next() {
            Some((idx, actual)) if same_letter(expected, actual) => {
                name_end = idx + actual.len_utf8();
            }
            _ => return text.trim_end().to_string(),
        }
    }

    let rest = &text[name_end..];
    match rest.chars().next() {
        None => String::new(),
        Some(c) if c == ':' || c.is_whitespace() => {
            let rest = rest.trim_start();
            rest.strip_prefix(':').unwrap_or(rest).trim().to_string()
        }
        Some(_) => text.trim_end().to_string(),
    }
}

fn same_letter(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
