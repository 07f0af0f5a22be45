//! Runtime types built from configuration sections.

use std::time::Duration;

use agentpool_config::{Config, ConfigError, ContextConfig, RuntimeConfig, ToolDefaults};
use agentpool_protocols::{ContextPolicy, ErrorPolicy, SchemaFailurePolicy, ToolSpec};

use crate::agent_runtime::AgentRuntimeConfig;
use crate::cost::CostTable;
use crate::pool::Pool;

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Context policy from the `[context]` section.
pub fn context_policy(config: &ContextConfig) -> Result<ContextPolicy, ConfigError> {
    let strategy = config
        .strategy
        .parse()
        .map_err(|e| invalid("context.strategy", e))?;
    Ok(ContextPolicy::new(config.max_messages, strategy)
        .with_smart_threshold(config.smart_threshold)
        .with_keep_recent(config.keep_recent))
}

/// Schema failure policy from the `[runtime]` section. `schema_retries`
/// counts re-prompts after the first answer.
pub fn schema_failure_policy(config: &RuntimeConfig) -> Result<SchemaFailurePolicy, ConfigError> {
    match config.on_schema_failure.as_str() {
        "retry" => Ok(SchemaFailurePolicy::Retry {
            max_attempts: config.schema_retries.saturating_add(1),
        }),
        "fail" => Ok(SchemaFailurePolicy::Fail),
        other => Err(invalid(
            "runtime.on_schema_failure",
            format!("expected 'retry' or 'fail', got '{}'", other),
        )),
    }
}

pub fn agent_runtime_config(config: &RuntimeConfig) -> AgentRuntimeConfig {
    AgentRuntimeConfig {
        max_tool_hops: config.max_tool_hops,
        ..Default::default()
    }
}

/// Tool spec with execution policy taken from the `[tools]` defaults.
pub fn tool_spec(
    name: impl Into<String>,
    description: impl Into<String>,
    defaults: &ToolDefaults,
) -> Result<ToolSpec, ConfigError> {
    let on_error: ErrorPolicy = defaults
        .on_error
        .parse()
        .map_err(|e| invalid("tools.on_error", e))?;

    let mut spec = ToolSpec::new(name, description)
        .with_max_retries(defaults.max_retries)
        .with_on_error(on_error)
        .with_max_backoff(Duration::from_millis(defaults.max_backoff_ms));
    if let Some(timeout_ms) = defaults.timeout_ms {
        spec = spec.with_timeout(Duration::from_millis(timeout_ms));
    }
    let base = Duration::from_millis(defaults.backoff_base_ms);
    spec = if defaults.backoff {
        spec.with_backoff(base, defaults.backoff_multiplier)
    } else {
        spec.with_retry_delay(base)
    };
    Ok(spec)
}

impl Pool {
    /// Apply `[runtime]` limits and `[pricing]`.
    pub fn with_settings(self, config: &Config) -> Self {
        self.with_max_iter(config.runtime.max_iter)
            .with_runtime_config(agent_runtime_config(&config.runtime))
            .with_cost_table(CostTable::from(&config.pricing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpool_config::ConfigLoader;
    use agentpool_protocols::ContextStrategy;

    #[test]
    fn test_context_policy_from_config() {
        let config = ConfigLoader::load_str(
            r#"
[context]
max_messages = 8
strategy = "summarize"
keep_recent = 3
"#,
        )
        .unwrap();
        let policy = context_policy(&config.context).unwrap();
        assert_eq!(policy.max_messages, 8);
        assert_eq!(policy.strategy, ContextStrategy::Summarize);
        assert_eq!(policy.keep_recent, 3);
        assert_eq!(policy.smart_threshold, 4);
    }

    #[test]
    fn test_context_policy_rejects_unknown_strategy() {
        let config = ContextConfig {
            strategy: "forget".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            context_policy(&config),
            Err(ConfigError::InvalidValue { field, .. }) if field == "context.strategy"
        ));
    }

    #[test]
    fn test_schema_failure_policy() {
        let retry = RuntimeConfig::default();
        assert_eq!(
            schema_failure_policy(&retry).unwrap(),
            SchemaFailurePolicy::Retry { max_attempts: 3 }
        );

        let fail = RuntimeConfig {
            on_schema_failure: "fail".to_string(),
            ..Default::default()
        };
        assert_eq!(schema_failure_policy(&fail).unwrap(), SchemaFailurePolicy::Fail);
    }

    #[test]
    fn test_tool_spec_from_defaults() {
        let defaults = ToolDefaults {
            timeout_ms: Some(1500),
            max_retries: 3,
            backoff: true,
            backoff_base_ms: 100,
            backoff_multiplier: 3.0,
            max_backoff_ms: 10_000,
            on_error: "raise".to_string(),
        };
        let spec = tool_spec("search", "Web search", &defaults).unwrap();
        assert_eq!(spec.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(spec.max_retries, 3);
        assert_eq!(spec.on_error, ErrorPolicy::Raise);
        assert_eq!(spec.delay_after_attempt(1), Duration::from_millis(100));
        assert_eq!(spec.delay_after_attempt(2), Duration::from_millis(300));
    }

    #[test]
    fn test_tool_spec_constant_delay() {
        let defaults = ToolDefaults {
            backoff: false,
            backoff_base_ms: 250,
            ..Default::default()
        };
        let spec = tool_spec("t", "", &defaults).unwrap();
        assert_eq!(spec.delay_after_attempt(1), spec.delay_after_attempt(4));
        assert_eq!(spec.on_error, ErrorPolicy::ReturnError);
    }
}
