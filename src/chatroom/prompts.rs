//! Prompt builders for the three kinds of requests the chat room makes.
//!
//! Each builder returns the role-tagged segments handed to a
//! [`ClientWrapper`](crate::chatroom::client_wrapper::ClientWrapper).

use crate::chatroom::agent::{Agent, CreationMode};
use crate::chatroom::client_wrapper::Message;

const AGENT_JSON_SHAPE: &str = r#"Respond with a JSON object of this shape:
{
  "name": "Full name",
  "personality": "Detailed personality description",
  "background": "Life history relevant to the topic",
  "expertise": ["Primary expertise", "Secondary expertise"],
  "beliefs": ["Core belief", "Another core belief"],
  "quirks": ["Habit", "Quirk"],
  "communication": "Communication style",
  "traits": ["trait", "trait", "trait"]
}"#;

const ANALYTICS_JSON_SHAPE: &str = r#"{
  "mainTopics": ["Topic"],
  "agentBehaviorAnalysis": {
    "<agent name>": {
      "cognitivePatterns": "Thinking patterns",
      "emotionalResponses": "Emotional reactions",
      "biasesObserved": ["Bias"],
      "adaptabilityScore": 0,
      "consistencyWithRole": "How well the agent stayed in role",
      "uniqueCharacteristics": ["Characteristic"]
    }
  },
  "interactionDynamics": {
    "powerDynamics": "Hierarchies that formed",
    "influencePatterns": ["Pattern"],
    "groupPolarization": "Polarization",
    "cognitiveAlignment": "Alignment"
  },
  "experimentMetrics": {
    "ideaDiversity": 0,
    "conversationDepth": 0,
    "emotionalIntelligence": 0,
    "logicalConsistency": 0,
    "creativityScore": 0
  },
  "emergentBehaviors": ["Behavior"],
  "researchImplications": ["Implication"],
  "summary": {
    "mainConclusions": ["Conclusion"],
    "keyDiscussionPoints": ["Point"],
    "agreements": ["Agreement"],
    "disagreements": ["Disagreement"],
    "overallTone": "Tone",
    "suggestedNextTopics": ["Topic"]
  }
}"#;

/// Request a new persona for a conversation about `topic`.
pub fn agent_creation(topic: &str, mode: &CreationMode) -> Vec<Message> {
    let mut prompt = match mode.spec().filter(|spec| !spec.is_empty()) {
        None => format!(
            "Create a distinctive participant for a conversation about \"{}\". \
             Give them relevant expertise and a layered, believable character.",
            topic
        ),
        Some(spec) => {
            let fixed = serde_json::to_string_pretty(&spec.supplied()).unwrap_or_default();
            format!(
                "Create a participant for a conversation about \"{}\".\n\
                 These fields are fixed and must be returned exactly as given: {}.\n\
                 Fixed values:\n{}\n\
                 Invent the remaining fields so they fit the fixed ones and the topic.",
                topic,
                spec.supplied_fields().join(", "),
                fixed
            )
        }
    };
    prompt.push_str("\n\n");
    prompt.push_str(AGENT_JSON_SHAPE);

    vec![Message::system(prompt)]
}

/// Request the next utterance of `agent`.
///
/// `context` is the already rendered conversation so far; when it is empty the
/// agent opens the conversation and no context segment is sent.
pub fn turn(agent: &Agent, topic: &str, context: &str) -> Vec<Message> {
    let mut persona = format!(
        "You are {}, taking part in a casual conversation about {}.\n\n\
         Who you are:\n\
         - Personality: {}\n\
         - Background: {}\n\
         - Traits: {}\n",
        agent.name,
        topic,
        agent.personality,
        agent.background,
        agent.traits.join(", ")
    );
    if let Some(expertise) = agent.expertise.as_ref().filter(|e| !e.is_empty()) {
        persona.push_str(&format!("- Expertise: {}\n", expertise.join(", ")));
    }
    if let Some(beliefs) = agent.beliefs.as_ref().filter(|b| !b.is_empty()) {
        persona.push_str(&format!("- Beliefs: {}\n", beliefs.join(", ")));
    }
    if let Some(quirks) = agent.quirks.as_ref().filter(|q| !q.is_empty()) {
        persona.push_str(&format!("- Quirks: {}\n", quirks.join(", ")));
    }
    persona.push_str(&format!(
        "- Communication style: {}\n\n\
         Rules:\n\
         1. Reply in one or two short sentences.\n\
         2. Stay in character and draw on your background when it fits.\n\
         3. React to what the others said.\n\
         4. Do not start with your own name and do not address others by name.",
        agent.communication.as_deref().unwrap_or("natural")
    ));

    let mut messages = vec![Message::system(persona)];
    if !context.is_empty() {
        messages.push(Message::user(format!("Previous conversation:\n{}", context)));
    }
    messages
}

/// Request the structured analysis of a transcript.
///
/// `speakers` lists every distinct name in the transcript; each must receive an
/// entry under `agentBehaviorAnalysis`.
pub fn analysis(transcript: &str, speakers: &[String]) -> Vec<Message> {
    let prompt = format!(
        "Analyze the conversation below. Respond with a JSON object of exactly this shape:\n\
         {}\n\n\
         All scores are numbers from 0 to 100.\n\
         \"agentBehaviorAnalysis\" must contain one entry for each of these participants, \
         keyed by their exact name: {}.\n\n\
         Conversation to analyze:\n{}",
        ANALYTICS_JSON_SHAPE,
        speakers.join(", "),
        transcript
    );
    vec![Message::system(prompt)]
}
