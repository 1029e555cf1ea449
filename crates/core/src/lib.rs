use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub mod alerts;
pub mod limits;
pub mod pending;
pub mod time;

pub use alerts::{
    AlertEvent, AlertFigures, AlertKind, Evaluation, MilestoneProgress, MilestoneState, evaluate,
};
pub use limits::{
    CriticalLevel, LimitCommand, LimitError, LimitOutcome, LimitUpdate, ModelLimit, Thresholds,
    TrackingConfig, apply_command, parse_response, reply_instructions,
};
pub use pending::{PendingResponse, PendingState};
pub use time::parse_timestamp;

/// Token counts extracted from a single log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub raw_model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub timestamp: Option<String>,
}

/// Accumulated usage for one canonical model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    /// Number of records that contributed to this entry.
    pub session_count: u64,
    pub timestamps: Vec<String>,
    /// Raw identifiers seen in the logs for this model.
    pub aliases: BTreeSet<String>,
}

impl ModelUsage {
    pub fn add_record(&mut self, record: &UsageRecord) {
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens);
        self.cache_read = self.cache_read.saturating_add(record.cache_read_tokens);
        self.cache_write = self.cache_write.saturating_add(record.cache_write_tokens);
        self.session_count = self.session_count.saturating_add(1);
        if let Some(ts) = record.timestamp.as_ref() {
            self.timestamps.push(ts.clone());
        }
        if !self.aliases.contains(&record.raw_model_id) {
            self.aliases.insert(record.raw_model_id.clone());
        }
    }

    /// Billable tokens: input plus output. Cache traffic is reported but not priced.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Usage keyed by canonical model id.
pub type UsageMap = BTreeMap<String, ModelUsage>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_price_per_1k_tokens: f64,
    pub output_price_per_1k_tokens: f64,
}

/// Prices keyed by canonical model id.
pub type PriceTable = BTreeMap<String, ModelPrice>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub model_id: String,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub token_count: u64,
}

/// Per-model costs plus the unrounded grand total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub models: Vec<CostBreakdown>,
    /// Models with usage but no price entry. They never contribute to `total_cost`.
    pub unpriced_models: Vec<String>,
    pub total_cost: f64,
}

const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gpt-5.1-codex", "openai/gpt-5.1-codex"),
    (
        "claude-3-5-haiku-20241022",
        "anthropic/claude-3-5-haiku-20241022",
    ),
    (
        "anthropic/claude-3-5-haiku",
        "anthropic/claude-3-5-haiku-20241022",
    ),
    (
        "claude-3-5-sonnet-4-20250514",
        "anthropic/claude-sonnet-4-20250514",
    ),
    (
        "claude-sonnet-4-20250514",
        "anthropic/claude-sonnet-4-20250514",
    ),
];

/// Maps a raw model id to its canonical form. Unknown ids are already canonical.
pub fn normalize_model_name(raw_id: &str) -> &str {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw_id)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw_id)
}

pub fn compute_cost(
    model_id: &str,
    usage: &ModelUsage,
    prices: &PriceTable,
) -> Option<CostBreakdown> {
    let price = prices.get(model_id)?;
    let input_cost = (usage.input_tokens as f64 / 1000.0) * price.input_price_per_1k_tokens;
    let output_cost = (usage.output_tokens as f64 / 1000.0) * price.output_price_per_1k_tokens;
    Some(CostBreakdown {
        model_id: model_id.to_string(),
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
        token_count: usage.total_tokens(),
    })
}

pub fn compute_costs(usage: &UsageMap, prices: &PriceTable) -> CostReport {
    let mut report = CostReport::default();
    for (model_id, model_usage) in usage {
        match compute_cost(model_id, model_usage, prices) {
            Some(cost) => {
                report.total_cost += cost.total_cost;
                report.models.push(cost);
            }
            None => report.unpriced_models.push(model_id.clone()),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn price(input: f64, output: f64) -> ModelPrice {
        ModelPrice {
            input_price_per_1k_tokens: input,
            output_price_per_1k_tokens: output,
        }
    }

    fn usage(input_tokens: u64, output_tokens: u64) -> ModelUsage {
        ModelUsage {
            input_tokens,
            output_tokens,
            ..ModelUsage::default()
        }
    }

    #[test]
    fn normalize_maps_known_aliases() {
        assert_eq!(
            normalize_model_name("claude-sonnet-4-20250514"),
            "anthropic/claude-sonnet-4-20250514"
        );
        assert_eq!(
            normalize_model_name("anthropic/claude-3-5-haiku"),
            "anthropic/claude-3-5-haiku-20241022"
        );
    }

    #[test]
    fn normalize_passes_unknown_ids_through() {
        assert_eq!(normalize_model_name("local/llama"), "local/llama");
        assert_eq!(normalize_model_name(""), "");
    }

    #[test]
    fn compute_cost_uses_per_1k_prices() {
        let prices = PriceTable::from([("openai/gpt-5.1-codex".to_string(), price(0.5, 1.5))]);
        let cost = compute_cost("openai/gpt-5.1-codex", &usage(2_000, 1_000), &prices)
            .expect("priced model");
        assert!((cost.input_cost - 1.0).abs() < 1e-9);
        assert!((cost.output_cost - 1.5).abs() < 1e-9);
        assert!((cost.total_cost - 2.5).abs() < 1e-9);
        assert_eq!(cost.token_count, 3_000);
    }

    #[test]
    fn compute_cost_ignores_cache_tokens() {
        let prices = PriceTable::from([("m".to_string(), price(1.0, 1.0))]);
        let mut model_usage = usage(1_000, 0);
        model_usage.cache_read = 50_000;
        model_usage.cache_write = 10_000;
        let cost = compute_cost("m", &model_usage, &prices).expect("priced model");
        assert!((cost.total_cost - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unpriced_models_are_reported_but_not_costed() {
        let prices = PriceTable::from([("priced".to_string(), price(1.0, 2.0))]);
        let usage_map = UsageMap::from([
            ("priced".to_string(), usage(1_000, 1_000)),
            ("mystery".to_string(), usage(9_000_000, 9_000_000)),
        ]);
        let report = compute_costs(&usage_map, &prices);
        assert_eq!(report.models.len(), 1);
        assert_eq!(report.unpriced_models, vec!["mystery".to_string()]);
        assert!((report.total_cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn add_record_folds_aliases_and_counts() {
        let mut model_usage = ModelUsage::default();
        let record = UsageRecord {
            raw_model_id: "claude-sonnet-4-20250514".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            cache_read_tokens: 3,
            cache_write_tokens: 1,
            timestamp: Some("2025-01-01T00:00:00.000Z".to_string()),
        };
        model_usage.add_record(&record);
        model_usage.add_record(&UsageRecord {
            raw_model_id: "claude-3-5-sonnet-4-20250514".to_string(),
            timestamp: None,
            ..record.clone()
        });
        assert_eq!(model_usage.input_tokens, 20);
        assert_eq!(model_usage.output_tokens, 10);
        assert_eq!(model_usage.cache_read, 6);
        assert_eq!(model_usage.cache_write, 2);
        assert_eq!(model_usage.session_count, 2);
        assert_eq!(model_usage.timestamps.len(), 1);
        assert_eq!(model_usage.aliases.len(), 2);
    }

    proptest! {
        #[test]
        fn total_cost_is_sum_of_priced_models(
            tokens in proptest::collection::vec((0u64..5_000_000, 0u64..5_000_000), 1..8),
            unpriced in proptest::collection::vec((0u64..5_000_000, 0u64..5_000_000), 0..4),
        ) {
            let mut prices = PriceTable::new();
            let mut usage_map = UsageMap::new();
            for (index, (input, output)) in tokens.iter().enumerate() {
                let model = format!("priced-{index}");
                prices.insert(model.clone(), price(0.003 * (index + 1) as f64, 0.015));
                usage_map.insert(model, usage(*input, *output));
            }
            let priced_only = compute_costs(&usage_map, &prices);
            for (index, (input, output)) in unpriced.iter().enumerate() {
                usage_map.insert(format!("unpriced-{index}"), usage(*input, *output));
            }
            let report = compute_costs(&usage_map, &prices);

            let summed: f64 = report.models.iter().map(|cost| cost.total_cost).sum();
            prop_assert!((report.total_cost - summed).abs() < 1e-6);
            prop_assert!((report.total_cost - priced_only.total_cost).abs() < 1e-9);
            prop_assert_eq!(report.unpriced_models.len(), unpriced.len());
        }
    }
}
