//! The two operations offered to callers: building pallets from order
//! lines, and implementing recommended actions on an existing pallet set.

use tracing::{debug, info};

use crate::allocator::{AllocationEvent, allocate_with_progress};
use crate::analyzer::analyze_with_config;
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::executor::{Implementation, MidpointWeigher, MixedCaseWeigher, SeededWeigher, apply_actions};
use crate::model::{OrderLineInput, Pallet, validate_order_lines};
use crate::recommend::{Action, Recommendation, recommend_with_config};

/// Pallets plus the insights computed for them.
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub pallets: Vec<Pallet>,
    pub insights: Recommendation,
}

/// Validates, allocates, analyzes and recommends in one pass.
pub fn build_pallets(inputs: Vec<OrderLineInput>, config: &OptimizerConfig) -> Result<BuildOutcome> {
    info!("🤖 Building pallets for {} order lines", inputs.len());
    let lines = validate_order_lines(inputs)?;

    let allocation_config = config.allocation_config();
    let allocation = allocate_with_progress(&lines, allocation_config, |event| {
        if let AllocationEvent::PalletStarted { store, pallet_type, .. } = event {
            debug!(store = %store, %pallet_type, "pallet started");
        }
    })?;
    let pallets = allocation.into_pallets();

    let analysis = analyze_with_config(&pallets, &lines, &allocation_config);
    let insights = recommend_with_config(&pallets, &lines, &analysis, &config.recommendation_config());
    info!(
        "🧠 Analysis complete: {} pallets, {:.1}% average utilization, {} implementable actions",
        pallets.len(),
        analysis.average_utilization_pct,
        insights.actions.len()
    );

    Ok(BuildOutcome { pallets, insights })
}

/// Applies actions to a copy of `pallets` using the configured mixed-case weigher.
pub fn implement_actions(
    pallets: &[Pallet],
    inputs: Vec<OrderLineInput>,
    actions: &[Action],
    config: &OptimizerConfig,
) -> Result<Implementation> {
    match config.mixed_case_seed() {
        Some(seed) => {
            implement_actions_with_weigher(pallets, inputs, actions, config, &mut SeededWeigher::new(seed))
        }
        None => implement_actions_with_weigher(pallets, inputs, actions, config, &mut MidpointWeigher),
    }
}

/// Applies actions with an explicit source for mixed-case weights.
pub fn implement_actions_with_weigher(
    pallets: &[Pallet],
    inputs: Vec<OrderLineInput>,
    actions: &[Action],
    config: &OptimizerConfig,
    weigher: &mut dyn MixedCaseWeigher,
) -> Result<Implementation> {
    let lines = validate_order_lines(inputs)?;
    Ok(apply_actions(
        pallets,
        &lines,
        actions,
        &config.allocation_config(),
        &config.recommendation_config(),
        weigher,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn input(store: &str, sku: &str, quantity: i64, weight: f64) -> OrderLineInput {
        OrderLineInput {
            sku: Some(sku.to_string()),
            name: Some(format!("Product {sku}")),
            store: Some(store.to_string()),
            quantity: Some(quantity),
            weight: Some(weight),
            ..Default::default()
        }
    }

    #[test]
    fn build_rejects_invalid_lines_before_allocating() {
        let inputs = vec![input("Store A", "OK", 12, 1.0), input("Store A", "BAD", 0, 1.0)];
        let err = build_pallets(inputs, &OptimizerConfig::default()).unwrap_err();
        match err {
            EngineError::InvalidInput(errors) => assert_eq!(errors[0].index(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn build_surfaces_unplaceable_lines() {
        let inputs = vec![input("Store A", "ANVIL", 2, 800.0)];
        let err = build_pallets(inputs, &OptimizerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "unplaceable_line");
    }

    #[test]
    fn empty_batch_builds_nothing() {
        let outcome = build_pallets(Vec::new(), &OptimizerConfig::default()).unwrap();
        assert!(outcome.pallets.is_empty());
        assert_eq!(outcome.insights.analysis.average_utilization_pct, 0.0);
        assert!(outcome.insights.actions.is_empty());
    }

    #[test]
    fn implement_runs_proposed_actions() {
        let inputs: Vec<OrderLineInput> = (0..3)
            .map(|i| input("Store A", &format!("SKU-{i}"), 1, 300.0))
            .collect();
        let config = OptimizerConfig::default();
        let built = build_pallets(inputs.clone(), &config).unwrap();
        assert_eq!(built.pallets.len(), 1);

        let implemented =
            implement_actions(&built.pallets, inputs, &built.insights.actions, &config).unwrap();
        assert_eq!(implemented.pallets.len(), 1);
        assert_eq!(implemented.insights.analysis.total_pallets, 1);
    }
}
