//! Agent personas and how they are created.
//!
//! An [`Agent`] is produced once per roster slot, either by letting the model invent
//! every attribute ([`CreationMode::Random`]) or by fixing some attributes up front
//! ([`CreationMode::Guided`] with an [`AgentSpec`]). In guided mode the model only
//! fills the gaps: [`merge`] writes every user-supplied field back over whatever the
//! model returned, so a supplied value can never be replaced by generated content.
//!
//! # Example
//!
//! ```rust
//! use chatroom::agent::{merge, AgentDraft, AgentSpec};
//!
//! let spec = AgentSpec::from_profession("Dr. Smith", "physicist");
//! let draft: AgentDraft = serde_json::from_str(
//!     r#"{"name": "Someone Else", "traits": "curious", "quirks": ["hums"]}"#,
//! )
//! .unwrap();
//!
//! let agent = merge(draft, &spec).unwrap();
//! assert_eq!(agent.name, "Dr. Smith");
//! assert_eq!(agent.background, "Professional physicist");
//! assert_eq!(agent.quirks, Some(vec!["hums".to_string()]));
//! ```

use crate::chatroom::error::GenerationFailure;
use serde::{Deserialize, Deserializer, Serialize};

/// A persona taking part in the conversation.
///
/// Agents are immutable once created and are referenced from the transcript by
/// `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub name: String,
    pub personality: String,
    pub background: String,
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expertise: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beliefs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quirks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication: Option<String>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        background: impl Into<String>,
        traits: Vec<String>,
    ) -> Self {
        Agent {
            name: name.into(),
            personality: personality.into(),
            background: background.into(),
            traits,
            expertise: None,
            beliefs: None,
            quirks: None,
            communication: None,
        }
    }

    pub fn with_expertise(mut self, expertise: Vec<String>) -> Self {
        self.expertise = Some(expertise);
        self
    }

    pub fn with_beliefs(mut self, beliefs: Vec<String>) -> Self {
        self.beliefs = Some(beliefs);
        self
    }

    pub fn with_quirks(mut self, quirks: Vec<String>) -> Self {
        self.quirks = Some(quirks);
        self
    }

    pub fn with_communication(mut self, communication: impl Into<String>) -> Self {
        self.communication = Some(communication.into());
        self
    }
}

/// Attributes a user fixes before the model fills in the rest.
///
/// Every field is optional. Fields that are `Some` with non-blank content are
/// authoritative and survive generation byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beliefs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quirks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication: Option<String>,
}

impl AgentSpec {
    /// The "basic" customisation: a name plus a profession from which the
    /// background, personality and traits are derived.
    pub fn from_profession(name: impl Into<String>, profession: &str) -> Self {
        let profession = profession.trim();
        AgentSpec {
            name: Some(name.into()),
            personality: Some(format!("Professional with expertise in {}", profession)),
            background: Some(format!("Professional {}", profession)),
            traits: Some(vec![
                format!("knowledgeable about {}", profession),
                "professional".to_string(),
                "experienced".to_string(),
            ]),
            ..AgentSpec::default()
        }
    }

    /// Names of the fields the user supplied, in declaration order.
    ///
    /// Blank strings and lists without a non-blank item carry nothing and do not
    /// count as supplied.
    pub fn supplied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if supplied_text(&self.name).is_some() {
            fields.push("name");
        }
        if supplied_text(&self.personality).is_some() {
            fields.push("personality");
        }
        if supplied_text(&self.background).is_some() {
            fields.push("background");
        }
        if supplied_list(&self.traits).is_some() {
            fields.push("traits");
        }
        if supplied_list(&self.expertise).is_some() {
            fields.push("expertise");
        }
        if supplied_list(&self.beliefs).is_some() {
            fields.push("beliefs");
        }
        if supplied_list(&self.quirks).is_some() {
            fields.push("quirks");
        }
        if supplied_text(&self.communication).is_some() {
            fields.push("communication");
        }
        fields
    }

    /// A copy holding only the supplied fields, exactly as given.
    pub fn supplied(&self) -> AgentSpec {
        AgentSpec {
            name: supplied_text(&self.name).cloned(),
            personality: supplied_text(&self.personality).cloned(),
            background: supplied_text(&self.background).cloned(),
            traits: supplied_list(&self.traits).cloned(),
            expertise: supplied_list(&self.expertise).cloned(),
            beliefs: supplied_list(&self.beliefs).cloned(),
            quirks: supplied_list(&self.quirks).cloned(),
            communication: supplied_text(&self.communication).cloned(),
        }
    }

    /// True when nothing was supplied, which is the same as random creation.
    pub fn is_empty(&self) -> bool {
        self.supplied_fields().is_empty()
    }
}

fn supplied_text(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|text| !text.trim().is_empty())
}

fn supplied_list(value: &Option<Vec<String>>) -> Option<&Vec<String>> {
    value
        .as_ref()
        .filter(|items| items.iter().any(|item| !item.trim().is_empty()))
}

/// How the agent for one roster slot is created.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationMode {
    /// The model invents every attribute from the topic alone.
    Random,
    /// The model fills only the attributes the spec leaves unset.
    Guided(AgentSpec),
}

impl CreationMode {
    pub fn spec(&self) -> Option<&AgentSpec> {
        match self {
            CreationMode::Random => None,
            CreationMode::Guided(spec) => Some(spec),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreationMode::Random => "random",
            CreationMode::Guided(_) => "guided",
        }
    }
}

/// An agent as returned by the model, before merging and validation.
///
/// List-valued fields accept either a JSON array or a single string, since models
/// do not always respect the requested shape for one-element lists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub traits: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub expertise: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub beliefs: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub quirks: Option<Vec<String>>,
    #[serde(default)]
    pub communication: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|value| match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }),
    )
}

/// Combine a generated draft with the user's spec into a finished [`Agent`].
///
/// Every supplied field of `spec` is copied onto the agent exactly as given and
/// the draft's value is discarded. Only generated values are trimmed and have
/// blank list items dropped. The result must have a non-blank name and at least
/// one non-blank trait, otherwise the draft is rejected with
/// [`GenerationFailure::MissingField`].
pub fn merge(draft: AgentDraft, spec: &AgentSpec) -> Result<Agent, GenerationFailure> {
    let spec = spec.supplied();

    let name = spec
        .name
        .or_else(|| draft.name.map(|n| n.trim().to_string()))
        .filter(|n| !n.trim().is_empty())
        .ok_or(GenerationFailure::MissingField("name"))?;

    let traits = spec
        .traits
        .or_else(|| draft.traits.map(clean_list))
        .filter(|t| t.iter().any(|item| !item.trim().is_empty()))
        .ok_or(GenerationFailure::MissingField("traits"))?;

    Ok(Agent {
        name,
        personality: spec.personality.or(draft.personality).unwrap_or_default(),
        background: spec.background.or(draft.background).unwrap_or_default(),
        traits,
        expertise: spec.expertise.or_else(|| draft.expertise.map(clean_list)),
        beliefs: spec.beliefs.or_else(|| draft.beliefs.map(clean_list)),
        quirks: spec.quirks.or_else(|| draft.quirks.map(clean_list)),
        communication: spec.communication.or(draft.communication),
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profession_spec_derives_fields() {
        let spec = AgentSpec::from_profession("Ada", " engineer ");
        assert_eq!(spec.background.as_deref(), Some("Professional engineer"));
        assert_eq!(
            spec.personality.as_deref(),
            Some("Professional with expertise in engineer")
        );
        assert_eq!(
            spec.traits,
            Some(vec![
                "knowledgeable about engineer".to_string(),
                "professional".to_string(),
                "experienced".to_string()
            ])
        );
        assert_eq!(
            spec.supplied_fields(),
            vec!["name", "personality", "background", "traits"]
        );
    }

    #[test]
    fn blank_traits_are_rejected() {
        let draft = AgentDraft {
            name: Some("Luna".into()),
            traits: Some(vec!["  ".into()]),
            ..AgentDraft::default()
        };
        assert_eq!(
            merge(draft, &AgentSpec::default()),
            Err(GenerationFailure::MissingField("traits"))
        );
    }

    #[test]
    fn spec_serializes_only_supplied_fields() {
        let spec = AgentSpec {
            name: Some("Luna".into()),
            quirks: Some(vec!["hums".into()]),
            ..AgentSpec::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Luna", "quirks": ["hums"]}));
    }

    #[test]
    fn blank_supplied_fields_count_as_unset() {
        let spec = AgentSpec {
            name: Some("   ".into()),
            traits: Some(vec![]),
            quirks: Some(vec![" ".into(), "".into()]),
            communication: Some(" Terse ".into()),
            ..AgentSpec::default()
        };
        assert_eq!(spec.supplied_fields(), vec!["communication"]);
        assert_eq!(
            spec.supplied(),
            AgentSpec {
                communication: Some(" Terse ".into()),
                ..AgentSpec::default()
            }
        );
    }
}
