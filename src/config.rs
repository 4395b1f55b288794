use std::env;

use tracing::warn;

use crate::allocator::AllocationConfig;
use crate::recommend::RecommendationConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub optimizer: OptimizerConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            optimizer: OptimizerConfig::from_env(),
            output: OutputConfig::from_env(),
        }
    }
}

/// Configuration for how responses are written.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pretty_json: bool,
}

impl OutputConfig {
    const PRETTY_JSON_VAR: &'static str = "PALLET_BUILDER_PRETTY_JSON";

    fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pretty_json = lookup(Self::PRETTY_JSON_VAR)
            .and_then(|raw| switch_setting(Self::PRETTY_JSON_VAR, &raw))
            .unwrap_or(true);
        Self { pretty_json }
    }

    /// Whether JSON responses are indented.
    pub fn pretty_json(&self) -> bool {
        self.pretty_json
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty_json: true }
    }
}

/// Configuration for allocation limits and recommendation thresholds.
#[derive(Clone, Debug, Default)]
pub struct OptimizerConfig {
    allocation: AllocationConfig,
    recommendation: RecommendationConfig,
    mixed_case_seed: Option<u64>,
}

impl OptimizerConfig {
    const MAX_WEIGHT_VAR: &'static str = "PALLET_BUILDER_MAX_WEIGHT";
    const MAX_LAYERS_VAR: &'static str = "PALLET_BUILDER_MAX_LAYERS";
    const FRAGILE_CEILING_VAR: &'static str = "PALLET_BUILDER_FRAGILE_WEIGHT_CEILING";
    const TARGET_UTILIZATION_VAR: &'static str = "PALLET_BUILDER_TARGET_UTILIZATION";
    const CONSOLIDATION_TRIGGER_VAR: &'static str = "PALLET_BUILDER_CONSOLIDATION_TRIGGER";
    const COST_PER_PALLET_VAR: &'static str = "PALLET_BUILDER_COST_PER_PALLET";
    const MIXED_CASE_SEED_VAR: &'static str = "PALLET_BUILDER_MIXED_CASE_SEED";

    /// Builds a configuration from explicit parts.
    pub fn new(
        allocation: AllocationConfig,
        recommendation: RecommendationConfig,
        mixed_case_seed: Option<u64>,
    ) -> Self {
        Self {
            allocation,
            recommendation,
            mixed_case_seed,
        }
    }

    fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    /// Resolves every pallet setting through `lookup`; unusable values fall back to defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_weight = measure_setting(
            Self::MAX_WEIGHT_VAR,
            lookup(Self::MAX_WEIGHT_VAR),
            AllocationConfig::DEFAULT_MAX_WEIGHT,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted pallet weight limit changes every allocation",
        );

        let max_layers = lookup(Self::MAX_LAYERS_VAR)
            .map(|raw| layer_setting(Self::MAX_LAYERS_VAR, &raw))
            .unwrap_or(AllocationConfig::DEFAULT_MAX_LAYERS);

        // The default ceiling never exceeds a lowered weight limit.
        let fragile_weight_ceiling = measure_setting(
            Self::FRAGILE_CEILING_VAR,
            lookup(Self::FRAGILE_CEILING_VAR),
            AllocationConfig::DEFAULT_FRAGILE_WEIGHT_CEILING.min(max_weight),
            |value| value > 0.0 && value <= max_weight,
            "must be between 0 and the pallet weight limit",
            "Warning: Adjusted fragile ceiling may put glass under heavy loads",
        );

        let target_utilization_pct = measure_setting(
            Self::TARGET_UTILIZATION_VAR,
            lookup(Self::TARGET_UTILIZATION_VAR),
            RecommendationConfig::DEFAULT_TARGET_UTILIZATION_PCT,
            is_percentage,
            "must be between 0 and 100",
            "Warning: Adjusted target utilization changes consolidation proposals",
        );

        let consolidation_trigger_pct = measure_setting(
            Self::CONSOLIDATION_TRIGGER_VAR,
            lookup(Self::CONSOLIDATION_TRIGGER_VAR),
            RecommendationConfig::DEFAULT_CONSOLIDATION_TRIGGER_PCT,
            is_percentage,
            "must be between 0 and 100",
            "Warning: Adjusted consolidation trigger changes consolidation proposals",
        );

        let cost_per_pallet = measure_setting(
            Self::COST_PER_PALLET_VAR,
            lookup(Self::COST_PER_PALLET_VAR),
            RecommendationConfig::DEFAULT_COST_PER_PALLET,
            |value| value >= 0.0,
            "must not be negative",
            "Note: Savings estimates use a custom pallet cost",
        );

        let mixed_case_seed = lookup(Self::MIXED_CASE_SEED_VAR)
            .and_then(|raw| seed_setting(Self::MIXED_CASE_SEED_VAR, &raw));

        let allocation = AllocationConfig::builder()
            .max_weight(max_weight)
            .max_layers(max_layers)
            .fragile_weight_ceiling(fragile_weight_ceiling)
            .build();

        let recommendation = RecommendationConfig {
            consolidation_trigger_pct,
            target_utilization_pct,
            cost_per_pallet,
            ..RecommendationConfig::default()
        };

        Self {
            allocation,
            recommendation,
            mixed_case_seed,
        }
    }

    /// Returns the configured pallet limits.
    pub fn allocation_config(&self) -> AllocationConfig {
        self.allocation
    }

    /// Returns the configured recommendation thresholds.
    pub fn recommendation_config(&self) -> RecommendationConfig {
        self.recommendation
    }

    /// Seed for random mixed-case weights, if randomness was requested.
    pub fn mixed_case_seed(&self) -> Option<u64> {
        self.mixed_case_seed
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn is_percentage(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

fn switch_setting(var_name: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ {} expects on/off, got '{}'. Keeping indented JSON.",
                var_name, other
            );
            None
        }
    }
}

fn layer_setting(var_name: &str, raw: &str) -> u32 {
    let fallback = AllocationConfig::DEFAULT_MAX_LAYERS;
    match raw.trim().parse::<u32>() {
        Ok(0) => {
            warn!("⚠️ {} must not be 0. Using {}.", var_name, fallback);
            fallback
        }
        Ok(layers) => layers,
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                var_name, raw, err, fallback
            );
            fallback
        }
    }
}

fn seed_setting(var_name: &str, raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|err| {
            warn!(
                "⚠️ Could not parse {} ('{}'): {}. Using fixed mixed-case weight.",
                var_name, raw, err
            )
        })
        .ok()
}

/// Parses a weight, percentage or cost; rejected values fall back to `default`.
fn measure_setting(
    var_name: &str,
    raw: Option<String>,
    default: f64,
    accept: impl Fn(f64) -> bool,
    invalid_hint: &str,
    changed_note: &str,
) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    let value = match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            return default;
        }
    };
    if !value.is_finite() || !accept(value) {
        warn!(
            "⚠️ {} rejects '{}': {}. Using {}.",
            var_name, raw, invalid_hint, default
        );
        return default;
    }
    if (value - default).abs() > default.abs().max(1.0) * 1e-9 {
        warn!("⚠️ {} ({} = {}).", changed_note, var_name, value);
    }
    value
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn pretty_json_can_be_switched_off() {
        let output = OutputConfig::from_lookup(settings(&[("PALLET_BUILDER_PRETTY_JSON", "Off")]));
        assert!(!output.pretty_json());

        let output = OutputConfig::from_lookup(settings(&[("PALLET_BUILDER_PRETTY_JSON", "maybe")]));
        assert!(output.pretty_json());
    }

    #[test]
    fn rejected_pallet_limits_fall_back_to_defaults() {
        for bad_weight in ["-5", "abc", "inf"] {
            let config = OptimizerConfig::from_lookup(settings(&[
                ("PALLET_BUILDER_MAX_WEIGHT", bad_weight),
                ("PALLET_BUILDER_MAX_LAYERS", "0"),
            ]));
            let allocation = config.allocation_config();
            assert_eq!(allocation.max_weight, 1000.0, "weight '{bad_weight}'");
            assert_eq!(allocation.max_layers, 7);
        }
    }

    #[test]
    fn fragile_ceiling_stays_within_lowered_weight_limit() {
        let config = OptimizerConfig::from_lookup(settings(&[
            ("PALLET_BUILDER_MAX_WEIGHT", "400"),
            ("PALLET_BUILDER_FRAGILE_WEIGHT_CEILING", "450"),
        ]));
        let allocation = config.allocation_config();
        assert_eq!(allocation.max_weight, 400.0);
        assert_eq!(allocation.fragile_weight_ceiling, 400.0);
    }

    #[test]
    fn valid_settings_are_applied() {
        let config = OptimizerConfig::from_lookup(settings(&[
            ("PALLET_BUILDER_MAX_LAYERS", " 5 "),
            ("PALLET_BUILDER_TARGET_UTILIZATION", "60"),
            ("PALLET_BUILDER_CONSOLIDATION_TRIGGER", "120"),
            ("PALLET_BUILDER_COST_PER_PALLET", "0"),
            ("PALLET_BUILDER_MIXED_CASE_SEED", "42"),
        ]));
        assert_eq!(config.allocation_config().max_layers, 5);
        let rules = config.recommendation_config();
        assert_eq!(rules.target_utilization_pct, 60.0);
        assert_eq!(rules.consolidation_trigger_pct, 85.0);
        assert_eq!(rules.cost_per_pallet, 0.0);
        assert_eq!(config.mixed_case_seed(), Some(42));
    }

    #[test]
    fn unparseable_seed_keeps_fixed_mixed_case_weight() {
        let config =
            OptimizerConfig::from_lookup(settings(&[("PALLET_BUILDER_MIXED_CASE_SEED", "-1")]));
        assert_eq!(config.mixed_case_seed(), None);
    }

    #[test]
    fn default_optimizer_config_matches_pallet_rules() {
        let config = OptimizerConfig::default();
        let allocation = config.allocation_config();
        assert_eq!(allocation.max_weight, 1000.0);
        assert_eq!(allocation.max_layers, 7);
        assert_eq!(allocation.fragile_weight_ceiling, 500.0);
        let rules = config.recommendation_config();
        assert_eq!(rules.target_utilization_pct, 75.0);
        assert_eq!(rules.consolidation_trigger_pct, 85.0);
        assert_eq!(rules.cost_per_pallet, 25.0);
        assert_eq!(config.mixed_case_seed(), None);
        assert_eq!(OptimizerConfig::from_lookup(settings(&[])).allocation_config(), allocation);
    }
}
