use super::*;

use agentpool_protocols::{
    AgentProfile, Completion, LastResult, Message, ModelError, PoolState, RouterUsage, Usage,
};

fn state(agents: &[&str], iteration: u32) -> RoutingState {
    RoutingState {
        view: vec![Message::user("Write a report on solar power")],
        roster: agents
            .iter()
            .map(|name| AgentProfile {
                name: name.to_string(),
                description: format!("The {} agent", name),
                tools: Vec::new(),
            })
            .collect(),
        last_agent: None,
        last_result: None,
        iteration,
        max_iter: 10,
        state: PoolState::new(),
    }
}

struct FixedReplyModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedReplyModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelProvider for FixedReplyModel {
    fn model_name(&self) -> &str {
        "router-model"
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ModelError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(Completion::new(self.reply.clone(), Usage::new(50, 2)))
    }
}

struct DownModel;

#[async_trait]
impl ModelProvider for DownModel {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn complete(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ModelError> {
        Err(ModelError::Network("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_fn_router_uses_state() {
    let router = FnRouter::new(|s: &RoutingState| match s.iteration {
        0 => RouterDecision::next("collector"),
        1 => RouterDecision::next("writer").with_instructions("Be concise"),
        _ => RouterDecision::stop(),
    });

    let first = router.decide(&state(&["collector", "writer"], 0)).await.unwrap();
    assert_eq!(first.next_agent.as_deref(), Some("collector"));
    let second = router.decide(&state(&["collector", "writer"], 1)).await.unwrap();
    assert_eq!(second.instructions, "Be concise");
    assert!(router.decide(&state(&["collector", "writer"], 2)).await.unwrap().is_stop());
}

#[tokio::test]
async fn test_fn_router_reads_pool_state() {
    let router = FnRouter::new(|s: &RoutingState| {
        if s.state.get("done").is_some() {
            RouterDecision::stop()
        } else {
            s.state.set("done", serde_json::json!(true));
            RouterDecision::next("a")
        }
    });
    let s = state(&["a"], 0);
    assert!(!router.decide(&s).await.unwrap().is_stop());
    assert!(router.decide(&s).await.unwrap().is_stop());
}

#[tokio::test]
async fn test_round_robin_single_pass() {
    let router = RoundRobinRouter::default();
    let mut names = Vec::new();
    for i in 0..4 {
        names.push(router.decide(&state(&["a", "b", "c"], i)).await.unwrap().next_agent);
    }
    assert_eq!(
        names,
        vec![Some("a".into()), Some("b".into()), Some("c".into()), None]
    );
}

#[tokio::test]
async fn test_round_robin_multiple_rounds() {
    let router = RoundRobinRouter::new(2);
    let d = router.decide(&state(&["a", "b"], 3)).await.unwrap();
    assert_eq!(d.next_agent.as_deref(), Some("b"));
    assert!(router.decide(&state(&["a", "b"], 4)).await.unwrap().is_stop());
}

#[tokio::test]
async fn test_round_robin_unbounded_rounds() {
    let router = RoundRobinRouter::new(u32::MAX);
    let d = router.decide(&state(&["a", "b", "c"], 1_000_001)).await.unwrap();
    assert_eq!(d.next_agent.as_deref(), Some("c"));
}

#[tokio::test]
async fn test_round_robin_empty_roster() {
    let err = RoundRobinRouter::default()
        .decide(&state(&[], 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::EmptyPool));
}

#[tokio::test]
async fn test_sequence_router() {
    let router = SequenceRouter::new(["collector", "writer"]);
    let s = |i| state(&["collector", "writer"], i);
    assert_eq!(router.decide(&s(0)).await.unwrap().next_agent.as_deref(), Some("collector"));
    assert_eq!(router.decide(&s(1)).await.unwrap().next_agent.as_deref(), Some("writer"));
    assert!(router.decide(&s(2)).await.unwrap().is_stop());
}

#[tokio::test]
async fn test_model_router_picks_agent() {
    let model = FixedReplyModel::new("Writer\n");
    let router = ModelRouter::new(model.clone());
    let mut s = state(&["collector", "writer"], 1);
    s.last_agent = Some("collector".to_string());
    s.last_result = Some(LastResult {
        agent: "collector".to_string(),
        output: "Found 3 sources".to_string(),
        tools_used: vec!["search".to_string()],
    });

    let decision = router.decide(&s).await.unwrap();
    assert_eq!(decision.next_agent.as_deref(), Some("writer"));
    assert_eq!(router.last_reply().as_deref(), Some("Writer\n"));
    assert_eq!(
        decision.usage,
        Some(RouterUsage {
            model: "router-model".to_string(),
            usage: Usage::new(50, 2),
        })
    );

    let prompt = model.prompts.lock()[0].clone();
    assert!(prompt.contains("- collector: The collector agent"));
    assert!(prompt.contains("The last agent to act was: collector"));
    assert!(prompt.contains("User: Write a report on solar power"));
}

#[tokio::test]
async fn test_model_router_may_repeat_agent() {
    let model = FixedReplyModel::new("collector");
    let router = ModelRouter::new(model);
    let mut s = state(&["collector", "writer"], 1);
    s.last_agent = Some("collector".to_string());
    let decision = router.decide(&s).await.unwrap();
    assert_eq!(decision.next_agent.as_deref(), Some("collector"));
}

#[tokio::test]
async fn test_model_router_stop() {
    let router = ModelRouter::new(FixedReplyModel::new("STOP"));
    assert!(router.decide(&state(&["a"], 0)).await.unwrap().is_stop());
}

#[tokio::test]
async fn test_model_router_failure() {
    let router = ModelRouter::new(Arc::new(DownModel));
    let err = router.decide(&state(&["a"], 0)).await.unwrap_err();
    assert!(matches!(err, RoutingError::RouterFailed(_)));
}

#[test]
fn test_parse_agent_choice() {
    let s = state(&["Collector", "Writer"], 0);
    assert_eq!(parse_agent_choice("writer.", &s).next_agent.as_deref(), Some("Writer"));
    assert_eq!(parse_agent_choice("\"Collector\"", &s).next_agent.as_deref(), Some("Collector"));
    assert!(parse_agent_choice("none", &s).is_stop());
    assert!(parse_agent_choice("  ", &s).is_stop());
    assert_eq!(parse_agent_choice("Editor", &s).next_agent.as_deref(), Some("Editor"));
}
