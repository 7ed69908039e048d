use anyhow::{anyhow, Result};
use async_trait::async_trait;
use databot::agent::providers::MockProvider;
use databot::agent::{
    ChatMessage, ModelResponse, ResolutionState, ToolCall, TurnResolver, EMPTY_FOLLOW_UP_REPLY,
};
use databot::tools::{Tool, ToolRegistry, ToolResult};
use databot::types::Turn;
use databot::AgentError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records how often it ran and echoes the query back
struct CountingTool {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CountingTool {
    fn new(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Counts invocations"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = args["query"].as_str().unwrap_or_default();
        Ok(ToolResult::success(format!("{}: resultado para {}", self.name, query)))
    }
}

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult> {
        Err(anyhow!("connection refused"))
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Never answers in time"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ToolResult::success("demasiado tarde"))
    }
}

fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Arc::new(registry)
}

fn tool_messages(messages: &[ChatMessage]) -> Vec<(String, String)> {
    messages
        .iter()
        .filter_map(|m| match m {
            ChatMessage::Tool {
                tool_call_id,
                content,
            } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn direct_reply_uses_one_completion_and_no_tools() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::new("¡Hola! Soy DataBot.");
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let history = vec![Turn::user("Hola"), Turn::assistant("¡Hola!")];
    let resolution = resolver.resolve(&history, "¿Quién eres?").await.unwrap();

    assert_eq!(resolution.reply, "¡Hola! Soy DataBot.");
    assert_eq!(resolution.model_calls, 1);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 0);

    // The model saw system, prior turns, then the utterance
    let request = &provider.requests()[0];
    let roles: Vec<&str> = request.messages.iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, "search_knowledge_base");
}

#[tokio::test]
async fn every_request_runs_once_before_a_single_follow_up() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let (web, web_calls) = CountingTool::new("web_search");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![
                ToolCall::new("call_1", "search_knowledge_base", json!({"query": "docentes"})),
                ToolCall::new("call_2", "web_search", json!({"query": "Power BI"})),
            ],
        ),
        ModelResponse::text("Nuestros docentes son expertos en Power BI."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb), Arc::new(web)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "¿Quiénes son los docentes?").await.unwrap();

    assert_eq!(resolution.reply, "Nuestros docentes son expertos en Power BI.");
    assert_eq!(resolution.model_calls, 2);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 1);
    assert_eq!(web_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        resolution.states,
        vec![
            ResolutionState::AwaitingFirstCompletion,
            ResolutionState::AwaitingCapabilityResults,
            ResolutionState::AwaitingFollowUpCompletion,
            ResolutionState::Done,
        ]
    );

    // Results are correlated back by call id in request order
    let follow_up = &provider.requests()[1];
    let results = tool_messages(&follow_up.messages);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "call_1");
    assert!(results[0].1.contains("resultado para docentes"));
    assert_eq!(results[1].0, "call_2");

    // Only the two turns reach history
    let turns = resolution.turns("¿Quiénes son los docentes?");
    assert_eq!(turns[0], Turn::user("¿Quiénes son los docentes?"));
    assert_eq!(
        turns[1],
        Turn::assistant("Nuestros docentes son expertos en Power BI.")
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let (kb, _) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_x", "delete_database", json!({}))],
        ),
        ModelResponse::text("No puedo hacer eso."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "Borra todo").await.unwrap();
    assert_eq!(resolution.reply, "No puedo hacer eso.");
    assert_eq!(resolution.invocations.len(), 1);
    assert!(!resolution.invocations[0].success);

    let results = tool_messages(&provider.requests()[1].messages);
    assert_eq!(results[0].0, "call_x");
    assert!(results[0].1.starts_with("ERROR: unknown tool 'delete_database'"));
    assert!(results[0].1.contains("search_knowledge_base"));
}

#[tokio::test]
async fn failing_tool_does_not_stop_the_others() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![
                ToolCall::new("call_1", "broken", json!({})),
                ToolCall::new("call_2", "search_knowledge_base", json!({"query": "precios"})),
            ],
        ),
        ModelResponse::text("Los precios están en la web."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(BrokenTool), Arc::new(kb)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "¿Precios?").await.unwrap();
    assert_eq!(resolution.reply, "Los precios están en la web.");
    assert_eq!(kb_calls.load(Ordering::SeqCst), 1);

    let results = tool_messages(&provider.requests()[1].messages);
    assert_eq!(results.len(), 2);
    assert!(results[0].1.contains("capability 'broken' failed"));
    assert!(results[0].1.contains("connection refused"));
    assert!(results[1].1.contains("resultado para precios"));
}

#[tokio::test]
async fn round_cap_ignores_further_requests() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "search_knowledge_base", json!({"query": "a"}))],
        ),
        ModelResponse::with_tool_calls(
            "Según la base de conocimiento, ofrecemos tres cursos.",
            vec![ToolCall::new("call_2", "search_knowledge_base", json!({"query": "b"}))],
        ),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "¿Cursos?").await.unwrap();
    assert_eq!(
        resolution.reply,
        "Según la base de conocimiento, ofrecemos tres cursos."
    );
    assert_eq!(resolution.model_calls, 2);
    assert_eq!(resolution.ignored_tool_calls, 1);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn last_follow_up_offers_no_tools() {
    let (kb, _) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "search_knowledge_base", json!({"query": "cursos"}))],
        ),
        ModelResponse::text("Ofrecemos Power BI y Python."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    resolver.resolve(&[], "¿Qué cursos tienen?").await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 1);
    assert!(requests[1].tools.is_empty());
}

#[tokio::test]
async fn empty_follow_up_after_tools_degrades_to_a_reply() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "search_knowledge_base", json!({"query": "cursos"}))],
        ),
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_2", "search_knowledge_base", json!({"query": "precios"}))],
        ),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "¿Qué cursos tienen?").await.unwrap();
    assert_eq!(resolution.reply, EMPTY_FOLLOW_UP_REPLY);
    assert_eq!(resolution.model_calls, 2);
    assert_eq!(resolution.ignored_tool_calls, 1);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        resolution.turns("¿Qué cursos tienen?")[1],
        Turn::assistant(EMPTY_FOLLOW_UP_REPLY)
    );
}

#[tokio::test]
async fn extra_rounds_are_allowed_when_configured() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "search_knowledge_base", json!({"query": "a"}))],
        ),
        ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_2", "search_knowledge_base", json!({"query": "b"}))],
        ),
        ModelResponse::text("Listo."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    )
    .with_max_tool_rounds(2);

    let resolution = resolver.resolve(&[], "¿Cursos?").await.unwrap();
    assert_eq!(resolution.reply, "Listo.");
    let offered: Vec<usize> = provider.requests().iter().map(|r| r.tools.len()).collect();
    assert_eq!(offered, vec![1, 1, 0]);
    assert_eq!(resolution.model_calls, 3);
    assert_eq!(resolution.ignored_tool_calls, 0);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn duplicate_call_ids_run_once() {
    let (kb, kb_calls) = CountingTool::new("search_knowledge_base");
    let call = ToolCall::new("call_1", "search_knowledge_base", json!({"query": "a"}));
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls("", vec![call.clone(), call]),
        ModelResponse::text("Hecho."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let resolution = resolver.resolve(&[], "¿Cursos?").await.unwrap();
    assert_eq!(resolution.invocations.len(), 1);
    assert_eq!(kb_calls.load(Ordering::SeqCst), 1);
    assert_eq!(tool_messages(&provider.requests()[1].messages).len(), 1);
}

#[tokio::test]
async fn slow_tool_times_out_and_degrades() {
    let provider = MockProvider::with_model_responses(vec![
        ModelResponse::with_tool_calls("", vec![ToolCall::new("call_1", "slow", json!({}))]),
        ModelResponse::text("El servicio no respondió."),
    ]);
    let resolver = TurnResolver::new(
        Arc::new(provider.clone()),
        registry(vec![Arc::new(SlowTool)]),
        "Eres DataBot",
    )
    .with_tool_timeout(Duration::from_millis(20));

    let resolution = resolver.resolve(&[], "Hola").await.unwrap();
    assert_eq!(resolution.reply, "El servicio no respondió.");
    let error = resolution.invocations[0].error.clone().unwrap_or_default();
    assert!(error.contains("timed out"));
}

#[tokio::test]
async fn empty_reply_is_a_model_error() {
    let resolver = TurnResolver::new(
        Arc::new(MockProvider::new("   ")),
        registry(vec![]),
        "Eres DataBot",
    );

    match resolver.resolve(&[], "Hola").await {
        Err(AgentError::ModelInvocation(msg)) => assert!(msg.contains("empty reply")),
        other => panic!("expected model invocation error, got {:?}", other),
    }
}

#[tokio::test]
async fn follow_up_failure_surfaces_as_model_error() {
    let (kb, _) = CountingTool::new("search_knowledge_base");
    let provider = MockProvider::with_model_responses(vec![ModelResponse::with_tool_calls(
        "",
        vec![ToolCall::new("call_1", "search_knowledge_base", json!({"query": "a"}))],
    )])
    .then_fail("service unavailable");
    let resolver = TurnResolver::new(
        Arc::new(provider),
        registry(vec![Arc::new(kb)]),
        "Eres DataBot",
    );

    let err = resolver.resolve(&[], "Hola").await.unwrap_err();
    assert!(matches!(err, AgentError::ModelInvocation(_)));
}
