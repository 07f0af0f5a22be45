//! Token pricing.

use std::collections::HashMap;

use agentpool_config::PricingConfig;
use agentpool_protocols::Usage;

/// Price of one model in currency units per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

impl ModelPrice {
    pub fn new(prompt_per_million: f64, completion_per_million: f64) -> Self {
        Self {
            prompt_per_million,
            completion_per_million,
        }
    }

    pub fn cost(&self, usage: Usage) -> f64 {
        (usage.prompt_tokens as f64 * self.prompt_per_million
            + usage.completion_tokens as f64 * self.completion_per_million)
            / 1_000_000.0
    }
}

/// Model pricing table. Lookup is exact first, then longest matching prefix.
#[derive(Debug, Clone, Default)]
pub struct CostTable {
    prices: HashMap<String, ModelPrice>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn price_for(&self, model: &str) -> Option<&ModelPrice> {
        if let Some(price) = self.prices.get(model) {
            return Some(price);
        }
        self.prices
            .iter()
            .filter(|(key, _)| model.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, price)| price)
    }

    /// Cost of a completion. Unknown models cost nothing.
    pub fn cost(&self, model: &str, usage: Usage) -> f64 {
        self.price_for(model).map(|p| p.cost(usage)).unwrap_or(0.0)
    }
}

impl From<&HashMap<String, PricingConfig>> for CostTable {
    fn from(pricing: &HashMap<String, PricingConfig>) -> Self {
        let prices = pricing
            .iter()
            .map(|(model, p)| {
                (
                    model.clone(),
                    ModelPrice::new(p.prompt_per_million, p.completion_per_million),
                )
            })
            .collect();
        Self { prices }
    }
}
