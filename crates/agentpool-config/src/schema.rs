//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub tools: ToolDefaults,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Prices keyed by model name or model name prefix.
    #[serde(default)]
    pub pricing: HashMap<String, PricingConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Turn and pool loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_tool_hops")]
    pub max_tool_hops: u32,

    #[serde(default = "default_max_iter")]
    pub max_iter: u32,

    /// Total answers allowed when retrying an invalid structured output.
    #[serde(default = "default_schema_retries")]
    pub schema_retries: u32,

    /// `retry` or `fail`.
    #[serde(default = "default_on_schema_failure")]
    pub on_schema_failure: String,
}

fn default_max_tool_hops() -> u32 {
    5
}

fn default_max_iter() -> u32 {
    5
}

fn default_schema_retries() -> u32 {
    2
}

fn default_on_schema_failure() -> String {
    "retry".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_hops: default_max_tool_hops(),
            max_iter: default_max_iter(),
            schema_retries: default_schema_retries(),
            on_schema_failure: default_on_schema_failure(),
        }
    }
}

/// Context window defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// `trim_last`, `trim_first`, `summarize` or `smart`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_smart_threshold")]
    pub smart_threshold: usize,

    #[serde(default)]
    pub keep_recent: usize,
}

fn default_max_messages() -> usize {
    20
}

fn default_strategy() -> String {
    "smart".to_string()
}

fn default_smart_threshold() -> usize {
    4
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            strategy: default_strategy(),
            smart_threshold: default_smart_threshold(),
            keep_recent: 0,
        }
    }
}

/// Execution policy applied to tools that do not override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefaults {
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: bool,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// `raise`, `return_error` or `return_none`.
    #[serde(default = "default_on_error")]
    pub on_error: String,
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_on_error() -> String {
    "return_error".to_string()
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_retries: default_max_retries(),
            backoff: false,
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            on_error: default_on_error(),
        }
    }
}

/// History backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// `memory`, `file` or `sqlite`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory for `file`, database path for `sqlite`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

/// Per-model token prices in currency units per million tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Directory for rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "agentpool.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}
