//! Typed shape of the transcript analysis.
//!
//! The analysis content itself is produced by the model and is not judged for
//! semantic correctness. What is enforced is the shape: every section and field
//! must be present (an empty list is fine, a missing one is not), every agent
//! that spoke must have an entry, and every score must lie in `0..=100`. See
//! [`ChatAnalytics::validate`].

use crate::chatroom::error::GenerationFailure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Behavioural analysis of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBehavior {
    pub cognitive_patterns: String,
    pub emotional_responses: String,
    pub biases_observed: Vec<String>,
    pub adaptability_score: f64,
    pub consistency_with_role: String,
    pub unique_characteristics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDynamics {
    pub power_dynamics: String,
    pub influence_patterns: Vec<String>,
    pub group_polarization: String,
    pub cognitive_alignment: String,
}

/// Aggregate scores for the whole conversation, each in `0..=100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentMetrics {
    pub idea_diversity: f64,
    pub conversation_depth: f64,
    pub emotional_intelligence: f64,
    pub logical_consistency: f64,
    pub creativity_score: f64,
}

impl ExperimentMetrics {
    /// `(field name, score)` pairs in display order.
    pub fn scores(&self) -> [(&'static str, f64); 5] {
        [
            ("ideaDiversity", self.idea_diversity),
            ("conversationDepth", self.conversation_depth),
            ("emotionalIntelligence", self.emotional_intelligence),
            ("logicalConsistency", self.logical_consistency),
            ("creativityScore", self.creativity_score),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub main_conclusions: Vec<String>,
    pub key_discussion_points: Vec<String>,
    pub agreements: Vec<String>,
    pub disagreements: Vec<String>,
    pub overall_tone: String,
    pub suggested_next_topics: Vec<String>,
}

/// The structured analysis of a finished transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnalytics {
    pub main_topics: Vec<String>,
    pub agent_behavior_analysis: BTreeMap<String, AgentBehavior>,
    pub interaction_dynamics: InteractionDynamics,
    pub experiment_metrics: ExperimentMetrics,
    pub emergent_behaviors: Vec<String>,
    pub research_implications: Vec<String>,
    pub summary: ConversationSummary,
}

impl ChatAnalytics {
    /// Check the post-conditions the analysis must satisfy for a transcript whose
    /// distinct speakers are `speakers`.
    ///
    /// Extra entries for names that never spoke are tolerated.
    pub fn validate(&self, speakers: &[String]) -> Result<(), GenerationFailure> {
        for name in speakers {
            if !self.agent_behavior_analysis.contains_key(name) {
                return Err(GenerationFailure::MissingAgentEntry(name.clone()));
            }
        }

        for (name, behavior) in &self.agent_behavior_analysis {
            check_score(
                format!("agentBehaviorAnalysis.{}.adaptabilityScore", name),
                behavior.adaptability_score,
            )?;
        }
        for (field, value) in self.experiment_metrics.scores() {
            check_score(format!("experimentMetrics.{}", field), value)?;
        }
        Ok(())
    }
}

fn check_score(field: String, value: f64) -> Result<(), GenerationFailure> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(GenerationFailure::ScoreOutOfRange { field, value })
    }
}
