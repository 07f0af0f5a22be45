//! Configuration validation.

use crate::schema::Config;

const STRATEGIES: &[&str] = &["trim_last", "trim_first", "summarize", "smart"];
const ERROR_POLICIES: &[&str] = &["raise", "return_error", "return_none"];
const BACKENDS: &[&str] = &["memory", "file", "sqlite"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_runtime(config, &mut result);
        Self::validate_context(config, &mut result);
        Self::validate_tools(config, &mut result);
        Self::validate_history(config, &mut result);
        Self::validate_pricing(config, &mut result);

        result
    }

    fn validate_runtime(config: &Config, result: &mut ValidationResult) {
        let runtime = &config.runtime;
        if runtime.max_iter == 0 {
            result.add_error(ValidationError::new(
                "runtime.max_iter",
                "max_iter must be greater than 0",
            ));
        }
        if runtime.max_iter > 100 {
            result.add_warning(ValidationWarning::new(
                "runtime.max_iter",
                "max_iter is very high (>100), pool runs may be long and costly",
            ));
        }
        if runtime.max_tool_hops == 0 {
            result.add_error(ValidationError::new(
                "runtime.max_tool_hops",
                "max_tool_hops must be greater than 0",
            ));
        }
        if !matches!(runtime.on_schema_failure.as_str(), "retry" | "fail") {
            result.add_error(ValidationError::new(
                "runtime.on_schema_failure",
                format!("expected 'retry' or 'fail', got '{}'", runtime.on_schema_failure),
            ));
        }
    }

    fn validate_context(config: &Config, result: &mut ValidationResult) {
        let context = &config.context;
        if context.max_messages == 0 {
            result.add_error(ValidationError::new(
                "context.max_messages",
                "max_messages must be greater than 0",
            ));
        } else if context.max_messages < 2 {
            result.add_warning(ValidationWarning::new(
                "context.max_messages",
                "max_messages below 2 leaves no room for a summary and the latest message",
            ));
        }
        if !STRATEGIES.contains(&context.strategy.as_str()) {
            result.add_error(ValidationError::new(
                "context.strategy",
                format!("unknown strategy '{}'", context.strategy),
            ));
        }
        if context.strategy == "smart" && context.smart_threshold == 0 {
            result.add_warning(ValidationWarning::new(
                "context.smart_threshold",
                "smart_threshold of 0 makes 'smart' always summarize",
            ));
        }
    }

    fn validate_tools(config: &Config, result: &mut ValidationResult) {
        let tools = &config.tools;
        if tools.max_retries == 0 {
            result.add_error(ValidationError::new(
                "tools.max_retries",
                "max_retries counts total attempts and must be at least 1",
            ));
        }
        if tools.timeout_ms == Some(0) {
            result.add_error(ValidationError::new(
                "tools.timeout_ms",
                "timeout_ms must be greater than 0 when set",
            ));
        }
        if !ERROR_POLICIES.contains(&tools.on_error.as_str()) {
            result.add_error(ValidationError::new(
                "tools.on_error",
                format!("unknown error policy '{}'", tools.on_error),
            ));
        }
        if tools.backoff {
            if tools.backoff_base_ms == 0 {
                result.add_error(ValidationError::new(
                    "tools.backoff_base_ms",
                    "backoff needs a non-zero base delay to grow",
                ));
            }
            if tools.backoff_multiplier <= 1.0 {
                result.add_error(ValidationError::new(
                    "tools.backoff_multiplier",
                    "backoff_multiplier must be greater than 1.0",
                ));
            }
            let retries = tools.max_retries.saturating_sub(2) as i32;
            let largest = tools.backoff_base_ms as f64 * tools.backoff_multiplier.powi(retries);
            if tools.max_retries > 2 && largest > tools.max_backoff_ms as f64 {
                result.add_error(ValidationError::new(
                    "tools.max_backoff_ms",
                    "max_backoff_ms caps delays before max_retries is reached, delays would stop growing",
                ));
            }
        }
    }

    fn validate_history(config: &Config, result: &mut ValidationResult) {
        let history = &config.history;
        if !BACKENDS.contains(&history.backend.as_str()) {
            result.add_error(ValidationError::new(
                "history.backend",
                format!("unknown backend '{}'", history.backend),
            ));
        } else if history.backend != "memory" && history.path.is_none() {
            result.add_error(ValidationError::new(
                "history.path",
                format!("backend '{}' requires a path", history.backend),
            ));
        }
    }

    fn validate_pricing(config: &Config, result: &mut ValidationResult) {
        for (model, price) in &config.pricing {
            if price.prompt_per_million < 0.0 || price.completion_per_million < 0.0 {
                result.add_error(ValidationError::new(
                    format!("pricing.{}", model),
                    "prices cannot be negative",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
