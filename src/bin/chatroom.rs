use std::error::Error;
use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chatroom::analytics::ChatAnalytics;
use chatroom::clients::openai::OpenAIClient;
use chatroom::config::{AGENT_COUNT_RANGE, MESSAGES_PER_AGENT_RANGE};
use chatroom::session::Session;
use chatroom::session_store::{JsonFileSessionStore, SessionStore};
use chatroom::{
    Agent, AgentSlotSource, AgentSpec, AppConfig, ChatRoom, ChatRoomConfig, ChatRoomError,
    ChatRoomEvent, ClientWrapper, CreationMode, EventHandler,
};

// Run from the root folder of the repo as follows:
// OPENAI_API_KEY=your-open-ai-key-here cargo run --bin chatroom
//
// Ctrl-C stops the current conversation at the next turn boundary.

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    chatroom::init_logger();

    let app = AppConfig::from_env()?;
    let client: Arc<dyn ClientWrapper> = Arc::new(OpenAIClient::from_config(&app)?);
    let store = Arc::new(JsonFileSessionStore::new(app.storage_dir.clone()));

    println!("Welcome to the AI agents chat room!\n");

    loop {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
        let outcome = run_once(&app, Arc::clone(&client), Arc::clone(&store), cancel).await;
        watcher.abort();

        if let Err(e) = outcome {
            // A closed stdin ends the program; everything else ends only this conversation.
            if e.downcast_ref::<io::Error>().is_some() {
                return Err(e);
            }
            eprintln!("\n{}", e);
        }

        if !ask_yes_no("\nWould you like to start another conversation?", true)? {
            break;
        }
    }

    println!("\nThanks for using the AI agents chat room!");
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        println!("\nStopping after the current request...");
        cancel.cancel();
    }
}

async fn run_once(
    app: &AppConfig,
    client: Arc<dyn ClientWrapper>,
    store: Arc<JsonFileSessionStore>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn Error>> {
    let resumed = choose_previous_session(store.as_ref()).await?;

    let topic = ask_non_empty("Enter conversation topic:")?;
    let number_of_agents = match &resumed {
        // The roster decides; the count is not asked again.
        Some(session) => session
            .agents
            .len()
            .clamp(*AGENT_COUNT_RANGE.start(), *AGENT_COUNT_RANGE.end()),
        None => ask_number("Number of agents (2-5):", AGENT_COUNT_RANGE, 2)?,
    };
    let messages_per_agent = ask_number("Messages per agent (1-10):", MESSAGES_PER_AGENT_RANGE, 3)?;
    let config = ChatRoomConfig::new(number_of_agents, topic, messages_per_agent)?;

    let mut room = ChatRoom::from_app_config(app, config, client, store)
        .with_event_handler(Arc::new(ConsolePrinter))
        .with_cancellation_token(cancel);

    match &resumed {
        Some(session) => {
            if let Some(mismatch) = room.resume_from(session).await? {
                println!("Note: {}", mismatch);
            }
            println!("Agents loaded successfully!");
        }
        None => {
            if ask_yes_no("Would you like to generate all agents randomly?", false)? {
                room.initialize_random_agents().await?;
            } else {
                room.initialize_agents(&mut InteractiveSlots).await?;
            }
        }
    }

    println!("\nAgents in the chat room:");
    for agent in room.agents() {
        println!("- {} ({})", agent.name, short_description(agent));
    }

    println!("\nStarting conversation...\n");
    room.run_conversation().await?;

    println!("\nAnalyzing conversation...");
    let analytics = room.analyze_conversation().await?;
    let session_id = room.save_session().await?;
    println!("Conversation saved with ID: {}", session_id);

    render_analytics(&analytics, room.agents());

    let usage = room.token_usage();
    println!(
        "\nTokens used: {} input, {} output, {} total",
        usage.input_tokens, usage.output_tokens, usage.total_tokens
    );
    Ok(())
}

async fn choose_previous_session(
    store: &dyn SessionStore,
) -> Result<Option<Session>, Box<dyn Error>> {
    let sessions = match store.get_all_sessions().await {
        Ok(sessions) => sessions,
        Err(e) => {
            eprintln!("Saved sessions are unavailable: {}", e);
            return Ok(None);
        }
    };
    if sessions.is_empty()
        || !ask_yes_no("Would you like to use agents from a previous conversation?", false)?
    {
        return Ok(None);
    }

    println!("Select a previous session:");
    for (i, session) in sessions.iter().enumerate() {
        println!("  {}) {}", i + 1, session.label());
    }
    let choice = ask_number("Session number:", 1..=sessions.len(), 1)?;
    let id = &sessions[choice - 1].id;

    let session = store.get_session(id).await?;
    if session.is_none() {
        println!("Session {} is no longer available; creating new agents.", id);
    }
    Ok(session)
}

fn short_description(agent: &Agent) -> &str {
    match agent.personality.split('.').next().map(str::trim) {
        Some(first) if !first.is_empty() => first,
        _ if !agent.background.is_empty() => &agent.background,
        _ => "No description",
    }
}

struct ConsolePrinter;

#[async_trait]
impl EventHandler for ConsolePrinter {
    async fn on_event(&self, event: &ChatRoomEvent) {
        match event {
            ChatRoomEvent::AgentCreated { slot, agent, .. } => {
                println!("Agent {} ready: {}", slot, agent.name);
            }
            ChatRoomEvent::MessageAppended { message, .. } => {
                println!("{}: {}\n", message.agent_name, message.content);
            }
            _ => {}
        }
    }
}

/// Asks the user how each agent should be created.
struct InteractiveSlots;

#[async_trait]
impl AgentSlotSource for InteractiveSlots {
    async fn creation_mode(
        &mut self,
        slot: usize,
        _total: usize,
    ) -> Result<CreationMode, ChatRoomError> {
        println!("\n=== Creating Agent {} ===", slot);
        prompt_creation_mode().map_err(|e| {
            ChatRoomError::Configuration(format!("cannot read agent {} settings: {}", slot, e))
        })
    }
}

fn prompt_creation_mode() -> io::Result<CreationMode> {
    println!("How would you like to create this agent?");
    println!("  1) Quick random generation");
    println!("  2) Basic customization");
    println!("  3) Advanced customization");

    match ask_number("Choice:", 1..=3, 1)? {
        1 => Ok(CreationMode::Random),
        2 => {
            let name = ask_optional("Name (Enter to randomize):")?;
            let profession = ask_optional("Profession (Enter to randomize):")?;
            let mut spec = match profession {
                Some(profession) => AgentSpec::from_profession(String::new(), &profession),
                None => AgentSpec::default(),
            };
            spec.name = name;
            Ok(CreationMode::Guided(spec))
        }
        _ => Ok(CreationMode::Guided(AgentSpec {
            name: ask_optional("Name (Enter to randomize):")?,
            personality: ask_optional("Personality (Enter to randomize):")?,
            background: ask_optional("Detailed background (Enter to randomize):")?,
            traits: ask_list("Traits, comma separated (Enter to randomize):")?,
            expertise: ask_list("Areas of expertise, comma separated (Enter to randomize):")?,
            beliefs: ask_list("Core beliefs/values, comma separated (Enter to randomize):")?,
            quirks: ask_list("Unique quirks/habits, comma separated (Enter to randomize):")?,
            communication: ask_optional("Communication style (Enter to randomize):")?,
        })),
    }
}

fn render_analytics(analytics: &ChatAnalytics, agents: &[Agent]) {
    println!("\n=== Conversation Analysis ===");

    print_list("Main Topics", &analytics.main_topics);

    println!("\nAgent Behavior Analysis:");
    for agent in agents {
        let Some(analysis) = analytics.agent_behavior_analysis.get(&agent.name) else {
            continue;
        };
        println!("\n{}:", agent.name);
        println!("Cognitive Patterns: {}", analysis.cognitive_patterns);
        println!("Emotional Responses: {}", analysis.emotional_responses);
        println!("Biases Observed: {}", analysis.biases_observed.join(", "));
        println!("Adaptability Score: {:.0}%", analysis.adaptability_score);
        println!("Role Consistency: {}", analysis.consistency_with_role);
        println!(
            "Unique Characteristics: {}",
            analysis.unique_characteristics.join(", ")
        );
    }

    let dynamics = &analytics.interaction_dynamics;
    println!("\nInteraction Dynamics:");
    println!("Power Dynamics: {}", dynamics.power_dynamics);
    println!("Influence Patterns: {}", dynamics.influence_patterns.join(", "));
    println!("Group Polarization: {}", dynamics.group_polarization);
    println!("Cognitive Alignment: {}", dynamics.cognitive_alignment);

    let metrics = &analytics.experiment_metrics;
    println!("\nExperiment Metrics:");
    println!("Idea Diversity: {:.0}%", metrics.idea_diversity);
    println!("Conversation Depth: {:.0}%", metrics.conversation_depth);
    println!("Emotional Intelligence: {:.0}%", metrics.emotional_intelligence);
    println!("Logical Consistency: {:.0}%", metrics.logical_consistency);
    println!("Creativity Score: {:.0}%", metrics.creativity_score);

    print_list("Emergent Behaviors", &analytics.emergent_behaviors);
    print_list("Research Implications", &analytics.research_implications);

    let summary = &analytics.summary;
    println!("\n=== Conversation Summary ===");
    print_list("Main Conclusions", &summary.main_conclusions);
    print_list("Key Discussion Points", &summary.key_discussion_points);
    print_list("Points of Agreement", &summary.agreements);
    print_list("Points of Disagreement", &summary.disagreements);
    println!("\nOverall Tone: {}", summary.overall_tone);
    print_list("Suggested Next Topics", &summary.suggested_next_topics);
}

fn print_list(title: &str, items: &[String]) {
    println!("\n{}:", title);
    for item in items {
        println!("- {}", item);
    }
}

fn ask(question: &str) -> io::Result<String> {
    print!("{} ", question);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim().to_string())
}

fn ask_optional(question: &str) -> io::Result<Option<String>> {
    let answer = ask(question)?;
    Ok(if answer.is_empty() { None } else { Some(answer) })
}

fn ask_list(question: &str) -> io::Result<Option<Vec<String>>> {
    Ok(ask_optional(question)?.map(|answer| {
        answer
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }))
}

fn ask_non_empty(question: &str) -> io::Result<String> {
    loop {
        let answer = ask(question)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        println!("Please enter a value.");
    }
}

fn ask_number(question: &str, range: RangeInclusive<usize>, default: usize) -> io::Result<usize> {
    loop {
        let answer = ask(&format!("{} [{}]", question, default))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<usize>() {
            Ok(n) if range.contains(&n) => return Ok(n),
            _ => println!(
                "Please enter a number between {} and {}.",
                range.start(),
                range.end()
            ),
        }
    }
}

fn ask_yes_no(question: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        match ask(&format!("{} {}", question, hint))?.to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer y or n."),
        }
    }
}
