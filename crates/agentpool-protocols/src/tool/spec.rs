//! Tool specification.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens once a tool call has exhausted its attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Propagate the failure to the enclosing turn.
    Raise,
    /// Feed a textual error back to the model as tool output.
    #[default]
    ReturnError,
    /// Feed an empty result back to the model as tool output.
    ReturnNone,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raise" => Ok(ErrorPolicy::Raise),
            "return_error" => Ok(ErrorPolicy::ReturnError),
            "return_none" => Ok(ErrorPolicy::ReturnNone),
            other => Err(format!("unknown error policy: {}", other)),
        }
    }
}

/// Static description and execution policy of a tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Unique tool name, used in call descriptors.
    pub name: String,

    /// Human-readable description shown to the model.
    pub description: String,

    /// JSON schema for the call arguments.
    pub input_schema: serde_json::Value,

    /// Optional JSON schema the tool result must satisfy.
    pub output_schema: Option<serde_json::Value>,

    /// Wall-clock limit for each attempt. `None` means unbounded.
    pub timeout: Option<Duration>,

    /// Total number of attempts, including the first.
    pub max_retries: u32,

    /// Grow the delay between attempts exponentially.
    pub backoff: bool,

    /// Delay before the second attempt.
    pub retry_delay: Duration,

    /// Growth factor applied per attempt when `backoff` is enabled.
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay.
    pub max_backoff: Duration,

    /// Outcome once attempts are exhausted.
    pub on_error: ErrorPolicy,
}

/// Smallest base delay accepted when backoff is enabled.
pub const MIN_BACKOFF_BASE: Duration = Duration::from_millis(1);

const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
            timeout: None,
            max_retries: 1,
            backoff: false,
            retry_delay: Duration::ZERO,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff: Duration::from_secs(60),
            on_error: ErrorPolicy::default(),
        }
    }

    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Enable exponential backoff starting from `base`.
    ///
    /// Delays must grow, so a zero base becomes [`MIN_BACKOFF_BASE`] and a
    /// multiplier that is not above 1.0 falls back to the default of 2.0.
    pub fn with_backoff(mut self, base: Duration, multiplier: f64) -> Self {
        self.backoff = true;
        self.retry_delay = base.max(MIN_BACKOFF_BASE);
        self.backoff_multiplier = if multiplier.is_finite() && multiplier > 1.0 {
            multiplier
        } else {
            DEFAULT_BACKOFF_MULTIPLIER
        };
        self
    }

    /// Use a constant delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.backoff = false;
        self.retry_delay = delay;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the next one.
    ///
    /// With backoff the delay is `retry_delay * backoff_multiplier^(attempt - 1)`,
    /// capped at `max_backoff`; otherwise it is always `retry_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.retry_delay;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let nanos = (self.retry_delay.as_nanos() as f64 * factor).round();
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// Short summary used in tool-usage prompts.
    pub fn prompt_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.input_schema,
        })
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
