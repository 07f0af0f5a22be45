//! End-to-end tests for pools, agent turns, tools and history backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;

use agentpool_protocols::{
    AgentError, AgentSpec, Completion, CompletionOptions, ContextPolicy, ContextStrategy,
    ErrorPolicy, HistoryStore, Message, ModelError, ModelProvider, PoolError, Router,
    RouterDecision, RoutingError, RoutingState, SpanEvent, SpanKind, Tool, ToolCall, ToolContext,
    ToolError, ToolSpec, Usage,
};
use agentpool_runtime::{
    CostTable, FileHistoryStore, FnRouter, JsonlTraceSink, MemoryHistoryStore, MemoryTraceSink,
    ModelPrice, ModelRouter, Pool, RoundRobinRouter, SequenceRouter, ToolExecutor, ToolOutcome,
    TraceContext, parse_reply,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Model that answers per agent persona from a queue, falling back to a
/// default reply. The persona is the first line of the prompt.
struct TeamModel {
    scripts: Mutex<Vec<(String, VecDeque<String>)>>,
    calls: AtomicU32,
}

impl TeamModel {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    fn script(self, persona: &str, replies: &[&str]) -> Self {
        self.scripts.lock().push((
            persona.to_string(),
            replies.iter().map(|r| r.to_string()).collect(),
        ));
        self
    }
}

#[async_trait]
impl ModelProvider for TeamModel {
    fn model_name(&self) -> &str {
        "team-model-v1"
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.starts_with("Summarize the following conversation") {
            return Ok(Completion::new("Earlier turns covered the basics.", Usage::new(40, 8)));
        }
        let persona = prompt.lines().next().unwrap_or_default().to_string();
        let mut scripts = self.scripts.lock();
        let reply = scripts
            .iter_mut()
            .find(|(p, _)| *p == persona)
            .and_then(|(_, queue)| queue.pop_front())
            .unwrap_or_else(|| format!("{} has nothing to add.", persona));
        Ok(Completion::new(reply, Usage::new(12, 6)))
    }
}

/// Search tool that fails `failures` times before answering.
struct SearchTool {
    spec: ToolSpec,
    failures: u32,
    calls: AtomicU32,
}

impl SearchTool {
    fn new(failures: u32, max_retries: u32) -> Self {
        Self {
            spec: ToolSpec::new("search", "Search the web")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }))
                .with_max_retries(max_retries)
                .with_backoff(Duration::from_millis(10), 2.0),
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, args: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            return Err(ToolError::failed("search", "upstream 503"));
        }
        Ok(json!(format!("3 results for '{}'", args["query"].as_str().unwrap_or(""))))
    }
}

/// Tool that never returns within its timeout.
struct HangingTool {
    spec: ToolSpec,
}

#[async_trait]
impl Tool for HangingTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, _args: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

/// Counts decisions of the wrapped router.
struct CountingRouter {
    inner: Arc<dyn Router>,
    decisions: AtomicU32,
}

#[async_trait]
impl Router for CountingRouter {
    async fn decide(&self, state: &RoutingState) -> Result<RouterDecision, RoutingError> {
        self.decisions.fetch_add(1, Ordering::SeqCst);
        self.inner.decide(state).await
    }
}

fn stop_after(names: &'static [&'static str]) -> Arc<dyn Router> {
    Arc::new(FnRouter::new(move |s: &RoutingState| {
        names
            .get(s.iteration as usize)
            .map(|n| RouterDecision::next(*n))
            .unwrap_or_else(RouterDecision::stop)
    }))
}

// ============================================================================
// Pool Scenarios
// ============================================================================

#[tokio::test]
async fn test_collector_writer_pool() {
    let model = Arc::new(
        TeamModel::new()
            .script(
                "Collector",
                &[r#"{"tool": "search", "args": {"query": "tides"}}"#, "Tides follow the moon."],
            )
            .script("Writer", &["Tides are caused by the moon's gravity."]),
    );
    let search = Arc::new(SearchTool::new(0, 1));

    let pool = Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(model)
        .with_agent(AgentSpec::new("Collector", "Collector").with_tool(search.clone()))
        .unwrap()
        .with_agent(AgentSpec::new("Writer", "Writer"))
        .unwrap()
        .with_router(stop_after(&["Collector", "Writer"]))
        .with_max_iter(5);

    let outcome = pool.run("Why are there tides?").await.unwrap();

    assert_eq!(outcome.iterations, 2);
    assert!(!outcome.truncated);
    assert_eq!(outcome.last_agent.as_deref(), Some("Writer"));
    assert_eq!(
        outcome.last_output.as_deref(),
        Some("Tides are caused by the moon's gravity.")
    );
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.messages.len(), 3);
}

#[tokio::test]
async fn test_pool_terminates_within_max_iter_for_any_router() {
    let routers: Vec<Arc<dyn Router>> = vec![
        Arc::new(FnRouter::new(|_s: &RoutingState| RouterDecision::next("A"))),
        Arc::new(RoundRobinRouter::new(100)),
        Arc::new(SequenceRouter::new(["A", "B", "A"])),
        Arc::new(FnRouter::new(|s: &RoutingState| {
            if s.last_agent.as_deref() == Some("A") {
                RouterDecision::next("B")
            } else {
                RouterDecision::next("A")
            }
        })),
    ];

    for router in routers {
        let counting = Arc::new(CountingRouter {
            inner: router,
            decisions: AtomicU32::new(0),
        });
        let pool = Pool::new(Arc::new(MemoryHistoryStore::new()))
            .with_default_model(Arc::new(TeamModel::new()))
            .with_agent(AgentSpec::new("A", "A"))
            .unwrap()
            .with_agent(AgentSpec::new("B", "B"))
            .unwrap()
            .with_router(counting.clone())
            .with_max_iter(4);

        let outcome = pool.run("go").await.unwrap();
        let decisions = counting.decisions.load(Ordering::SeqCst);
        assert!(decisions <= 4);
        if outcome.truncated {
            assert_eq!(outcome.iterations, 4);
            assert_eq!(decisions, 4);
        } else {
            assert_eq!(decisions, outcome.iterations + 1);
        }
    }
}

#[tokio::test]
async fn test_model_router_pool() {
    struct RouterModel {
        replies: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl ModelProvider for RouterModel {
        fn model_name(&self) -> &str {
            "router"
        }

        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ModelError> {
            let reply = self.replies.lock().pop_front().unwrap_or("STOP");
            Ok(Completion::new(reply, Usage::new(30, 1)))
        }
    }

    let router = ModelRouter::new(Arc::new(RouterModel {
        replies: Mutex::new(VecDeque::from(["Collector", "writer", "STOP"])),
    }));
    let pool = Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(Arc::new(TeamModel::new()))
        .with_agent(AgentSpec::new("Collector", "Collector"))
        .unwrap()
        .with_agent(AgentSpec::new("Writer", "Writer"))
        .unwrap()
        .with_router(Arc::new(router));

    let outcome = pool.run("go").await.unwrap();
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.last_agent.as_deref(), Some("Writer"));
}

#[tokio::test]
async fn test_hop_limit_aborts_pool_run() {
    let call = r#"{"tool": "search", "args": {"query": "again"}}"#;
    let model = Arc::new(TeamModel::new().script("Looper", &[call, call, call, call]));
    let pool = Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(model)
        .with_agent(AgentSpec::new("Looper", "Looper").with_tool(Arc::new(SearchTool::new(0, 1))))
        .unwrap()
        .with_runtime_config(agentpool_runtime::AgentRuntimeConfig {
            max_tool_hops: 2,
            ..Default::default()
        });

    let err = pool.run("go").await.unwrap_err();
    match err {
        PoolError::Agent { agent, source } => {
            assert_eq!(agent, "Looper");
            assert!(matches!(
                source,
                AgentError::Routing(RoutingError::ToolHopLimitExceeded { limit: 2, .. })
            ));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ============================================================================
// Tool Execution
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_attempt_n() {
    let tool = SearchTool::new(3, 4);
    let call = ToolCall::new("search", json!({"query": "rust"}));

    let execution = ToolExecutor::new()
        .execute(&tool, &call, "collector", &TraceContext::disabled())
        .await
        .unwrap();

    assert!(execution.outcome.is_success());
    assert_eq!(execution.attempts, 4);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_reported_and_consumes_one_attempt() {
    let tool = HangingTool {
        spec: ToolSpec::new("hang", "Never returns")
            .with_timeout(Duration::from_secs(1))
            .with_on_error(ErrorPolicy::Raise),
    };
    let call = ToolCall::new("hang", json!({}));

    let err = ToolExecutor::new()
        .execute(&tool, &call, "a", &TraceContext::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Timeout { timeout_ms: 1000, .. }));
    assert!(matches!(AgentError::from(err), AgentError::ToolTimeout(_)));
}

#[tokio::test(start_paused = true)]
async fn test_return_none_agent_still_answers() {
    let tool = Arc::new(HangingTool {
        spec: ToolSpec::new("hang", "Never returns")
            .with_timeout(Duration::from_millis(50))
            .with_max_retries(3)
            .with_on_error(ErrorPolicy::ReturnNone),
    });
    let model = Arc::new(TeamModel::new().script(
        "Patient",
        &[r#"{"tool": "hang", "args": {}}"#, "The tool gave nothing, so here is my own answer."],
    ));
    let pool = Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(model)
        .with_agent(AgentSpec::new("Patient", "Patient").with_tool(tool))
        .unwrap();

    let outcome = pool.run("go").await.unwrap();
    assert_eq!(
        outcome.last_output.as_deref(),
        Some("The tool gave nothing, so here is my own answer.")
    );
}

#[test]
fn test_mixed_content_classification() {
    assert!(parse_reply(r#"{"tool": "search", "args": {"query": "x"}}"#).is_tool_call());
    assert!(!parse_reply(r#"Sure! {"tool": "search", "args": {"query": "x"}}"#).is_tool_call());
    assert!(!parse_reply("```json\n{\"tool\": \"search\", \"args\": {}}\n```").is_tool_call());
    assert!(!parse_reply(r#"{"tool": "search", "args": {}} and more"#).is_tool_call());
}

#[tokio::test]
async fn test_concurrent_calls_with_partial_failure() {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SearchTool::new(0, 1)),
        Arc::new(HangingTool {
            spec: ToolSpec::new("hang", "")
                .with_timeout(Duration::from_millis(20))
                .with_on_error(ErrorPolicy::ReturnError),
        }),
    ];
    let calls = vec![
        ToolCall::new("search", json!({"query": "a"})),
        ToolCall::new("hang", json!({})),
        ToolCall::new("search", json!({"query": "b"})),
    ];

    let results = ToolExecutor::new()
        .execute_all(&tools, &calls, "agent", &TraceContext::disabled())
        .await;
    let outcomes: Vec<ToolOutcome> = results.into_iter().map(|r| r.unwrap().outcome).collect();
    assert!(outcomes[0].is_success());
    assert!(matches!(&outcomes[1], ToolOutcome::Error(msg) if msg.contains("timed out")));
    assert!(outcomes[2].is_success());
}

// ============================================================================
// Context and History
// ============================================================================

#[tokio::test]
async fn test_append_then_get_round_trip_file_store() {
    let dir = TempDir::new().unwrap();
    let store = FileHistoryStore::new(dir.path());
    let thread = store.create_thread(Default::default()).await.unwrap();

    for message in [
        Message::user("hello"),
        Message::assistant("hi").with_agent("greeter"),
        Message::system("note").with_metadata("source", json!("test")),
    ] {
        store.append(&thread, message.clone()).await.unwrap();
        assert_eq!(store.get(&thread).await.unwrap().last(), Some(&message));
    }
}

#[tokio::test]
async fn test_trim_last_view_is_recent_tail() {
    let store = Arc::new(MemoryHistoryStore::new());
    let manager = agentpool_runtime::ContextManager::new(store);
    let thread = "t".to_string();
    for i in 0..12 {
        manager.append(&thread, Message::user(format!("{}", i))).await.unwrap();
    }

    for max in [1usize, 5, 12, 30] {
        let policy = ContextPolicy::new(max, ContextStrategy::TrimLast);
        let view = manager
            .view(&thread, &policy, None, &TraceContext::disabled())
            .await
            .unwrap();
        let expected: Vec<String> = (12 - max.min(12)..12).map(|i| i.to_string()).collect();
        let got: Vec<String> = view.messages.into_iter().map(|m| m.content).collect();
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn test_pool_with_summarizing_agent_on_file_store() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()));
    let thread = store.create_thread(Default::default()).await.unwrap();
    for i in 0..10 {
        store.append(&thread, Message::user(format!("old {}", i))).await.unwrap();
    }

    let pool = Pool::new(store.clone())
        .with_default_model(Arc::new(TeamModel::new()))
        .with_agent(
            AgentSpec::new("Reader", "Reader")
                .with_context_policy(ContextPolicy::new(4, ContextStrategy::Summarize)),
        )
        .unwrap();

    let outcome = pool.run_on(&thread, "What did we discuss?").await.unwrap();

    let stored = store.get(&thread).await.unwrap();
    assert!(stored[0].is_summary());
    assert!(stored[0].content.contains("Earlier turns covered the basics."));
    // summary + 3 kept + answer
    assert_eq!(stored.len(), 5);
    assert_eq!(stored.last().unwrap().agent.as_deref(), Some("Reader"));
    assert_eq!(outcome.messages, stored);
}

// ============================================================================
// Tracing
// ============================================================================

#[tokio::test]
async fn test_trace_totals_and_jsonl_sink() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("traces").join("run.jsonl");
    let jsonl = Arc::new(JsonlTraceSink::open(&path).await.unwrap());
    let memory = Arc::new(MemoryTraceSink::new());

    let model = Arc::new(
        TeamModel::new().script("Collector", &[r#"{"tool": "search", "args": {"query": "q"}}"#, "done"]),
    );
    let costs = CostTable::new().with_price("team-model", ModelPrice::new(2.0, 4.0));
    let agent = AgentSpec::new("Collector", "Collector").with_tool(Arc::new(SearchTool::new(0, 1)));

    let outcome = Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(model.clone())
        .with_agent(agent.clone())
        .unwrap()
        .with_trace_sink(memory.clone())
        .with_cost_table(costs.clone())
        .run("go")
        .await
        .unwrap();

    // 2 model calls of 12 prompt / 6 completion tokens
    let expected_cost = 2.0 * (12.0 * 2.0 + 6.0 * 4.0) / 1_000_000.0;
    let totals = memory.totals(outcome.trace_id);
    assert_eq!(totals.usage, Usage::new(24, 12));
    assert!((totals.cost - expected_cost).abs() < 1e-12);
    assert!((outcome.cost - expected_cost).abs() < 1e-12);

    let tool_span = memory
        .finished()
        .into_iter()
        .find(|s| s.kind == SpanKind::ToolCall)
        .unwrap();
    let tool = tool_span.tool.unwrap();
    assert_eq!(tool.tool, "search");
    assert_eq!(tool.arguments, json!({"query": "q"}));

    Pool::new(Arc::new(MemoryHistoryStore::new()))
        .with_default_model(model)
        .with_agent(agent)
        .unwrap()
        .with_trace_sink(jsonl)
        .with_cost_table(costs)
        .run("go again")
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<SpanEvent> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!events.is_empty());
    assert_eq!(events.len() % 2, 0);
}
