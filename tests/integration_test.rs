//! End-to-end tests: configuration, backend selection and a pool run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use agentpool::config::ConfigLoader;
use agentpool::open_history_store;
use agentpool::protocols::{
    AgentSpec, Completion, CompletionOptions, ModelError, ModelProvider, Role, Usage,
};
use agentpool::runtime::settings::context_policy;
use agentpool::runtime::{Pool, SequenceRouter};

// ============================================================================
// Helpers
// ============================================================================

struct CountingModel {
    calls: AtomicU32,
}

#[async_trait]
impl ModelProvider for CountingModel {
    fn model_name(&self) -> &str {
        "gpt-4o-mini"
    }

    async fn complete(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ModelError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Completion::new(format!("answer {}", n), Usage::new(100, 50)))
    }
}

fn config_toml(db: &str) -> String {
    format!(
        r#"
[runtime]
max_iter = 3

[context]
max_messages = 10
strategy = "trim_last"

[history]
backend = "sqlite"
path = "{}"

[pricing."gpt-4o-mini"]
prompt_per_million = 1.0
completion_per_million = 2.0
"#,
        db.replace('\\', "/")
    )
}

// ============================================================================
// Pool on a configured SQLite backend
// ============================================================================

#[tokio::test]
async fn test_configured_pool_persists_to_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("history.db");
    let config = ConfigLoader::load_str(&config_toml(&db.to_string_lossy())).unwrap();

    let store = open_history_store(&config.history).await.unwrap();
    assert_eq!(store.id(), "sqlite");

    let policy = context_policy(&config.context).unwrap();
    let model = Arc::new(CountingModel {
        calls: AtomicU32::new(0),
    });
    let pool = Pool::new(store.clone())
        .with_settings(&config)
        .with_default_model(model)
        .with_agent(AgentSpec::new("Collector", "Collect facts").with_context_policy(policy.clone()))
        .unwrap()
        .with_agent(AgentSpec::new("Writer", "Write the answer").with_context_policy(policy))
        .unwrap()
        .with_router(Arc::new(SequenceRouter::new(["Collector", "Writer"])));

    let outcome = pool.run("Summarize the Rust 2024 edition").await.unwrap();
    assert_eq!(outcome.iterations, 2);
    assert!(!outcome.truncated);
    assert_eq!(outcome.last_agent.as_deref(), Some("Writer"));
    assert_eq!(outcome.last_output.as_deref(), Some("answer 2"));
    assert_eq!(outcome.usage.total_tokens(), 300);
    assert!(outcome.cost > 0.0);

    let stored = store.get(&outcome.thread).await.unwrap();
    let roles: Vec<Role> = stored.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
    assert_eq!(stored[1].agent.as_deref(), Some("Collector"));
    assert_eq!(stored[2].agent.as_deref(), Some("Writer"));
}

#[tokio::test]
async fn test_max_iter_from_config_truncates() {
    let config = ConfigLoader::load_str("[runtime]\nmax_iter = 2\n").unwrap();
    let store = open_history_store(&config.history).await.unwrap();

    let pool = Pool::new(store)
        .with_settings(&config)
        .with_default_model(Arc::new(CountingModel {
            calls: AtomicU32::new(0),
        }))
        .with_agent(AgentSpec::new("Solo", "Keep talking"))
        .unwrap()
        .with_router(Arc::new(SequenceRouter::new(["Solo", "Solo", "Solo", "Solo"])));

    let outcome = pool.run("go").await.unwrap();
    assert_eq!(outcome.iterations, 2);
    assert!(outcome.truncated);
}
