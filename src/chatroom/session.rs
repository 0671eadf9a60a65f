//! The persisted record of one finished conversation.

use crate::chatroom::agent::Agent;
use crate::chatroom::analytics::ChatAnalytics;
use crate::chatroom::transcript::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved conversation. Immutable once written; saving again creates a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Assigned by the [`SessionStore`](crate::chatroom::session_store::SessionStore).
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub agents: Vec<Agent>,
    pub messages: Vec<ChatMessage>,
    pub analytics: ChatAnalytics,
}

impl Session {
    /// `"<topic> (<agent names>)"`, the label used when offering sessions for resumption.
    pub fn label(&self) -> String {
        let names: Vec<&str> = self.agents.iter().map(|a| a.name.as_str()).collect();
        format!("{} ({})", self.topic, names.join(", "))
    }
}

/// Everything needed to persist a session except the id and timestamp, which the
/// store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub topic: String,
    pub agents: Vec<Agent>,
    pub messages: Vec<ChatMessage>,
    pub analytics: ChatAnalytics,
}

impl NewSession {
    pub fn into_session(self, id: String, timestamp: DateTime<Utc>) -> Session {
        Session {
            id,
            timestamp,
            topic: self.topic,
            agents: self.agents,
            messages: self.messages,
            analytics: self.analytics,
        }
    }
}
