use async_trait::async_trait;
use chatroom::agent::{Agent, AgentSpec, CreationMode};
use chatroom::chat_room::ChatRoom;
use chatroom::client_wrapper::{ClientWrapper, Message, OutputShape, Role, SendError, TokenUsage};
use chatroom::config::ChatRoomConfig;
use chatroom::context_window::ContextWindow;
use chatroom::error::{ChatRoomError, GenerationFailure, Phase};
use chatroom::event::{ChatRoomEvent, EventHandler};
use chatroom::generator::Generator;
use chatroom::session::NewSession;
use chatroom::session_store::{JsonFileSessionStore, SessionStore};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

enum Reply {
    Text(String),
    Fail(String),
    Stall,
}

struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(Vec<Message>, OutputShape)>>,
    usage: std::sync::Mutex<Option<TokenUsage>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            usage: std::sync::Mutex::new(None),
        })
    }

    fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Reply::Text(t.to_string())).collect())
    }

    async fn requests(&self) -> Vec<(Vec<Message>, OutputShape)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn send_message(
        &self,
        messages: &[Message],
        shape: OutputShape,
    ) -> Result<Message, SendError> {
        self.requests.lock().await.push((messages.to_vec(), shape));

        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Reply::Fail("script exhausted".to_string()));

        match reply {
            Reply::Text(content) => {
                *self.usage.lock().unwrap() = Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                    total_tokens: 15,
                });
                Ok(Message {
                    role: Role::Assistant,
                    content,
                })
            }
            Reply::Fail(reason) => Err(reason.into()),
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err("stalled".into())
            }
        }
    }

    fn usage_slot(&self) -> Option<&std::sync::Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}

#[derive(Default)]
struct Recorder {
    events: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl EventHandler for Recorder {
    async fn on_event(&self, event: &ChatRoomEvent) {
        let label = match event {
            ChatRoomEvent::AgentCreated { agent, .. } => format!("created:{}", agent.name),
            ChatRoomEvent::RosterResumed { agents, .. } => format!("resumed:{}", agents),
            ChatRoomEvent::ConversationStarted { total_turns, .. } => {
                format!("started:{}", total_turns)
            }
            ChatRoomEvent::RoundStarted { round, .. } => format!("round:{}", round),
            ChatRoomEvent::MessageAppended { turn, .. } => format!("turn:{}", turn),
            ChatRoomEvent::ConversationCompleted { messages } => format!("completed:{}", messages),
            ChatRoomEvent::AnalysisCompleted { .. } => "analyzed".to_string(),
            ChatRoomEvent::SessionSaved { .. } => "saved".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}

/// Cancels the room once `after` messages have been appended.
struct CancelAfter {
    token: CancellationToken,
    after: usize,
}

#[async_trait]
impl EventHandler for CancelAfter {
    async fn on_event(&self, event: &ChatRoomEvent) {
        if let ChatRoomEvent::MessageAppended { turn, .. } = event {
            if *turn == self.after {
                self.token.cancel();
            }
        }
    }
}

fn persona(name: &str) -> Agent {
    Agent::new(name, "Curious", "Researcher", vec!["inquisitive".to_string()])
}

fn agent_json(name: &str) -> String {
    json!({
        "name": name,
        "personality": "Warm and precise",
        "background": "Grew up near the sea",
        "traits": ["calm", "witty"],
        "quirks": ["hums while thinking"]
    })
    .to_string()
}

fn analytics_json(names: &[&str]) -> String {
    let behavior: serde_json::Map<String, serde_json::Value> = names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                json!({
                    "cognitivePatterns": "Analytical",
                    "emotionalResponses": "Measured",
                    "biasesObserved": ["anchoring"],
                    "adaptabilityScore": 72,
                    "consistencyWithRole": "High",
                    "uniqueCharacteristics": ["dry humour"]
                }),
            )
        })
        .collect();

    json!({
        "mainTopics": ["taste of colors"],
        "agentBehaviorAnalysis": behavior,
        "interactionDynamics": {
            "powerDynamics": "Balanced",
            "influencePatterns": ["mirroring"],
            "groupPolarization": "Low",
            "cognitiveAlignment": "Moderate"
        },
        "experimentMetrics": {
            "ideaDiversity": 80,
            "conversationDepth": 65,
            "emotionalIntelligence": 70,
            "logicalConsistency": 90,
            "creativityScore": 85.5
        },
        "emergentBehaviors": ["shared metaphors"],
        "researchImplications": ["synesthesia framing"],
        "summary": {
            "mainConclusions": ["colors evoke tastes"],
            "keyDiscussionPoints": ["red is sweet"],
            "agreements": ["blue is cold"],
            "disagreements": ["green"],
            "overallTone": "Playful",
            "suggestedNextTopics": ["smell of music"]
        }
    })
    .to_string()
}

fn room(client: Arc<ScriptedClient>, agents: usize, per_agent: usize, dir: &TempDir) -> ChatRoom {
    let config = ChatRoomConfig::new(agents, "Do colors have a taste?", per_agent).unwrap();
    let store = Arc::new(JsonFileSessionStore::new(dir.path()));
    ChatRoom::new(config, Generator::new(client, Duration::from_secs(5)), store)
}

#[tokio::test]
async fn two_agents_alternate_strictly() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["first", "AgentB: second", "third", "fourth"]);
    let mut room = room(client.clone(), 2, 2, &dir);
    room.set_agents(vec![persona("AgentA"), persona("AgentB")]);

    room.run_conversation().await.expect("conversation should complete");

    let messages = room.messages();
    let speakers: Vec<&str> = messages.iter().map(|m| m.agent_name.as_str()).collect();
    assert_eq!(speakers, vec!["AgentA", "AgentB", "AgentA", "AgentB"]);
    assert_eq!(messages[1].content, "second");
    assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn produces_roster_times_rounds_messages() {
    let dir = TempDir::new().unwrap();
    let replies: Vec<String> = (0..9).map(|i| format!("line {}", i)).collect();
    let refs: Vec<&str> = replies.iter().map(String::as_str).collect();
    let mut room = room(ScriptedClient::texts(&refs), 3, 3, &dir);
    room.set_agents(vec![persona("A"), persona("B"), persona("C")]);

    room.run_conversation().await.unwrap();

    assert_eq!(room.messages().len(), 9);
    let roster = ["A", "B", "C"];
    for (i, message) in room.messages().iter().enumerate() {
        assert_eq!(message.agent_name, roster[i % 3]);
        assert_eq!(message.content, format!("line {}", i));
    }
}

#[tokio::test]
async fn each_turn_sees_the_conversation_so_far() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["Luna: I think colors matter.", "Blue tastes cold."]);
    let mut room = room(client.clone(), 2, 1, &dir);
    room.set_agents(vec![persona("Luna"), persona("Smith")]);

    room.run_conversation().await.unwrap();
    assert_eq!(room.messages()[0].content, "I think colors matter.");

    let requests = client.requests().await;
    assert_eq!(requests.len(), 2);

    let (opening, shape) = &requests[0];
    assert_eq!(*shape, OutputShape::FreeText);
    assert_eq!(opening.len(), 1);
    assert!(opening[0].content.contains("You are Luna"));

    let (second, _) = &requests[1];
    assert!(second[0].content.contains("You are Smith"));
    assert_eq!(
        second[1].content,
        "Previous conversation:\nLuna: I think colors matter."
    );
}

#[tokio::test]
async fn bounded_window_replaces_old_messages_with_marker() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["first", "second", "third"]);
    let mut room = room(client.clone(), 3, 1, &dir)
        .with_context_window(ContextWindow::Recent { max_messages: 1 });
    room.set_agents(vec![persona("A"), persona("B"), persona("C")]);

    room.run_conversation().await.unwrap();

    let requests = client.requests().await;
    assert_eq!(
        requests[2].0[1].content,
        "Previous conversation:\n[1 earlier message omitted]\nB: second"
    );
}

#[tokio::test]
async fn failed_turn_aborts_and_keeps_earlier_messages() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::new(vec![
        Reply::Text("one".to_string()),
        Reply::Fail("upstream 503".to_string()),
        Reply::Text("never used".to_string()),
    ]);
    let mut room = room(client.clone(), 2, 2, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);

    let err = room.run_conversation().await.unwrap_err();

    match &err {
        ChatRoomError::Generation {
            phase: Phase::Turn { turn: 2 },
            failure: GenerationFailure::Service(msg),
        } => assert!(msg.contains("upstream 503")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.phase(), Some(Phase::Turn { turn: 2 }));
    assert_eq!(room.messages().len(), 1);
    assert_eq!(client.requests().await.len(), 2);
}

#[tokio::test]
async fn name_only_reply_is_empty_content() {
    let dir = TempDir::new().unwrap();
    let mut room = room(ScriptedClient::texts(&["one", "B:   "]), 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);

    let err = room.run_conversation().await.unwrap_err();
    assert_eq!(
        err,
        ChatRoomError::Generation {
            phase: Phase::Turn { turn: 2 },
            failure: GenerationFailure::EmptyContent,
        }
    );
}

#[tokio::test]
async fn stalled_request_times_out() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::new(vec![Reply::Stall]);
    let config = ChatRoomConfig::new(2, "silence", 1).unwrap();
    let timeout = Duration::from_millis(20);
    let mut room = ChatRoom::new(
        config,
        Generator::new(client, timeout),
        Arc::new(JsonFileSessionStore::new(dir.path())),
    );
    room.set_agents(vec![persona("A"), persona("B")]);

    let err = room.run_conversation().await.unwrap_err();
    assert_eq!(
        err,
        ChatRoomError::Generation {
            phase: Phase::Turn { turn: 1 },
            failure: GenerationFailure::Timeout(timeout),
        }
    );
    assert!(room.messages().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_the_pacing_delay() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["one", "two", "three", "four"]);
    let token = CancellationToken::new();
    let mut room = room(client.clone(), 2, 2, &dir)
        .with_turn_delay(Duration::from_secs(30))
        .with_cancellation_token(token.clone());
    room.set_agents(vec![persona("A"), persona("B")]);

    // Cancelling during the pause before turn 2 must cut the pause short.
    let started = tokio::time::Instant::now();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let err = room.run_conversation().await.unwrap_err();
    canceller.await.unwrap();

    assert_eq!(
        err,
        ChatRoomError::Cancelled {
            phase: Phase::Turn { turn: 2 }
        }
    );
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(room.messages().len(), 1);
    assert_eq!(client.requests().await.len(), 1);
}

#[tokio::test]
async fn cancellation_after_a_turn_stops_before_the_next() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["one", "two", "three", "four"]);
    let token = CancellationToken::new();
    let mut room = room(client.clone(), 2, 2, &dir)
        .with_cancellation_token(token.clone())
        .with_event_handler(Arc::new(CancelAfter {
            token: token.clone(),
            after: 2,
        }));
    room.set_agents(vec![persona("A"), persona("B")]);

    let err = room.run_conversation().await.unwrap_err();

    assert_eq!(
        err,
        ChatRoomError::Cancelled {
            phase: Phase::Turn { turn: 3 }
        }
    );
    assert_eq!(room.messages().len(), 2);
    assert_eq!(client.requests().await.len(), 2);
}

#[tokio::test]
async fn cancelled_room_creates_no_agents() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&[]);
    let token = CancellationToken::new();
    token.cancel();
    let mut room = room(client.clone(), 2, 1, &dir).with_cancellation_token(token);

    let err = room.initialize_random_agents().await.unwrap_err();

    assert_eq!(
        err,
        ChatRoomError::Cancelled {
            phase: Phase::Initialization { slot: 1 }
        }
    );
    assert!(room.agents().is_empty());
    assert!(client.requests().await.is_empty());
}

#[tokio::test]
async fn random_initialization_fills_every_slot() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&[agent_json("Luna").as_str(), agent_json("Smith").as_str()]);
    let recorder = Arc::new(Recorder::default());
    let mut room = room(client.clone(), 2, 1, &dir).with_event_handler(recorder.clone());

    room.initialize_random_agents().await.unwrap();

    let names: Vec<&str> = room.agents().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Luna", "Smith"]);
    assert!(room.agents().iter().all(|a| !a.traits.is_empty()));
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["created:Luna".to_string(), "created:Smith".to_string()]
    );
    for (_, shape) in client.requests().await {
        assert_eq!(shape, OutputShape::JsonObject);
    }
}

#[tokio::test]
async fn guided_fields_survive_generation() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&[agent_json("Impostor").as_str(), agent_json("Luna").as_str()]);
    let mut room = room(client.clone(), 2, 1, &dir);

    let spec = AgentSpec::from_profession("Dr. Smith", "physicist");
    let mut slots = vec![CreationMode::Guided(spec.clone()), CreationMode::Random];
    room.initialize_agents(&mut slots).await.unwrap();

    let smith = &room.agents()[0];
    assert_eq!(Some(&smith.name), spec.name.as_ref());
    assert_eq!(Some(&smith.personality), spec.personality.as_ref());
    assert_eq!(Some(&smith.background), spec.background.as_ref());
    assert_eq!(Some(&smith.traits), spec.traits.as_ref());
    assert_eq!(smith.quirks, Some(vec!["hums while thinking".to_string()]));
    assert_eq!(room.agents()[1].name, "Luna");

    let requests = client.requests().await;
    assert!(requests[0].0[0].content.contains("Dr. Smith"));
}

#[tokio::test]
async fn agent_without_traits_is_rejected() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&[agent_json("Luna").as_str(), r#"{"name": "Ghost"}"#]);
    let mut room = room(client, 2, 1, &dir);

    let err = room.initialize_random_agents().await.unwrap_err();

    assert_eq!(
        err,
        ChatRoomError::Generation {
            phase: Phase::Initialization { slot: 2 },
            failure: GenerationFailure::MissingField("traits"),
        }
    );
    assert_eq!(room.agents().len(), 1);
}

#[tokio::test]
async fn conversation_without_agents_fails() {
    let dir = TempDir::new().unwrap();
    let mut room = room(ScriptedClient::texts(&[]), 2, 1, &dir);
    assert_eq!(room.run_conversation().await, Err(ChatRoomError::NoAgents));
}

#[tokio::test]
async fn events_follow_the_run() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut room = room(
        ScriptedClient::texts(&["a1", "b1", "a2", "b2", analytics_json(&["A", "B"]).as_str()]),
        2,
        2,
        &dir,
    )
    .with_event_handler(recorder.clone());
    room.set_agents(vec![persona("A"), persona("B")]);

    room.run_conversation().await.unwrap();
    room.save_session().await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "started:4", "round:1", "turn:1", "turn:2", "round:2", "turn:3", "turn:4",
            "completed:4", "analyzed", "saved",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn save_then_get_returns_the_same_session() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["hello", "hi", analytics_json(&["A", "B"]).as_str()]);
    let mut room = room(client.clone(), 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    let id = room.save_session().await.unwrap();

    let store = JsonFileSessionStore::new(dir.path());
    let session = store.get_session(&id).await.unwrap().expect("session exists");
    assert_eq!(session.id, id);
    assert_eq!(session.topic, "Do colors have a taste?");
    assert_eq!(session.agents, room.agents());
    assert_eq!(session.messages, room.messages());
    assert_eq!(Some(&session.analytics), room.analytics());
    assert_eq!(room.token_usage().total_tokens, 45);
}

#[tokio::test]
async fn save_reuses_an_existing_analysis() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["hello", "hi", analytics_json(&["A", "B"]).as_str()]);
    let mut room = room(client.clone(), 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    let analytics = room.analyze_conversation().await.unwrap();
    let before = client.requests().await.len();
    room.save_session().await.unwrap();

    assert_eq!(client.requests().await.len(), before);
    assert_eq!(room.analytics(), Some(&analytics));
}

#[tokio::test]
async fn analysis_must_cover_every_speaker() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["hello", "hi", analytics_json(&["A"]).as_str()]);
    let mut room = room(client, 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    let err = room.save_session().await.unwrap_err();

    assert_eq!(
        err,
        ChatRoomError::Generation {
            phase: Phase::Analysis,
            failure: GenerationFailure::MissingAgentEntry("B".to_string()),
        }
    );
    let store = JsonFileSessionStore::new(dir.path());
    assert!(store.get_all_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_failure_names_the_save_step() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("experiments");
    std::fs::write(&blocker, "a file where the directory should be").unwrap();

    let client = ScriptedClient::texts(&["hello", "hi", analytics_json(&["A", "B"]).as_str()]);
    let config = ChatRoomConfig::new(2, "Do colors have a taste?", 1).unwrap();
    let store = Arc::new(JsonFileSessionStore::new(&blocker));
    let mut room = ChatRoom::new(config, Generator::new(client, Duration::from_secs(5)), store);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    let err = room.save_session().await.unwrap_err();

    assert!(matches!(err, ChatRoomError::SaveFailed(_)));
    assert_eq!(err.phase(), Some(Phase::Save));
    assert!(err.to_string().contains("during save"));
    // The analysis succeeded and stays available.
    assert!(room.analytics().is_some());
}

#[tokio::test]
async fn malformed_analysis_is_not_defaulted() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["hello", "hi", "I'd rather not."]);
    let mut room = room(client, 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    match room.analyze_conversation().await {
        Err(ChatRoomError::Generation {
            phase: Phase::Analysis,
            failure: GenerationFailure::Malformed(_),
        }) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(room.analytics().is_none());
}

#[tokio::test]
async fn resumed_roster_overrides_requested_count() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileSessionStore::new(dir.path());
    let analytics = serde_json::from_str(&analytics_json(&["Ada", "Ben", "Cy"])).unwrap();
    let id = store
        .save_session(NewSession {
            topic: "Earlier topic".to_string(),
            agents: vec![persona("Ada"), persona("Ben"), persona("Cy")],
            messages: Vec::new(),
            analytics,
        })
        .await
        .unwrap();
    let saved = store.get_session(&id).await.unwrap().unwrap();

    let client = ScriptedClient::texts(&["a", "b", "c"]);
    let recorder = Arc::new(Recorder::default());
    let mut room = room(client.clone(), 2, 1, &dir).with_event_handler(recorder.clone());

    let mismatch = room.resume_from(&saved).await.unwrap().expect("count differs");
    assert_eq!((mismatch.requested, mismatch.roster), (2, 3));
    assert_eq!(room.config().number_of_agents(), 3);

    room.run_conversation().await.unwrap();

    let speakers: Vec<&str> = room.messages().iter().map(|m| m.agent_name.as_str()).collect();
    assert_eq!(speakers, vec!["Ada", "Ben", "Cy"]);
    let requests = client.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|(_, shape)| *shape == OutputShape::FreeText));
    assert_eq!(recorder.events.lock().unwrap()[0], "resumed:3");
}

#[tokio::test]
async fn reset_starts_a_fresh_transcript_with_the_same_roster() {
    let dir = TempDir::new().unwrap();
    let client = ScriptedClient::texts(&["a", "b", "c", "d"]);
    let mut room = room(client, 2, 1, &dir);
    room.set_agents(vec![persona("A"), persona("B")]);
    room.run_conversation().await.unwrap();

    room.reset_messages();
    assert!(room.messages().is_empty());
    room.set_config(ChatRoomConfig::new(2, "Second topic", 1).unwrap());
    room.run_conversation().await.unwrap();

    assert_eq!(room.messages().len(), 2);
    assert_eq!(room.messages()[0].content, "c");
    assert_eq!(room.agents().len(), 2);
}
