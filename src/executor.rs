//! Applies recommended actions to a pallet set.
//!
//! The executor always works on a copy of the caller's pallets and returns
//! the new set together with a human-readable implementation log and a
//! fresh recommendation for the result, so optimization rounds can chain.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::allocator::AllocationConfig;
use crate::analyzer::{OVERWEIGHT_THRESHOLD_PCT, analyze_with_config, has_top_heavy_risk};
use crate::model::{Category, Item, OrderLine, Pallet, PalletType};
use crate::recommend::{Action, Recommendation, RecommendationConfig, recommend_with_config};

pub const MIXED_CASE_SKU: &str = "MIXED-001";
pub const MIXED_CASE_NAME: &str = "Mixed Case (Loose Items)";
pub const MIXED_CASE_MIN_WEIGHT: f64 = 5.0;
pub const MIXED_CASE_MAX_WEIGHT: f64 = 15.0;

pub const RESTACKED_INSTRUCTION: &str = "Heavy items placed at bottom for safety";
pub const REDISTRIBUTED_INSTRUCTION: &str = "Weight redistributed for balance";
pub const MIXED_CASE_INSTRUCTION: &str = "Contains combined loose items";

/// Source of the weight of a synthetic mixed case.
pub trait MixedCaseWeigher {
    /// Returns the weight in kg of the next mixed case.
    fn next_weight(&mut self) -> f64;
}

/// Always answers the midpoint of the mixed-case weight range.
#[derive(Copy, Clone, Debug, Default)]
pub struct MidpointWeigher;

impl MixedCaseWeigher for MidpointWeigher {
    fn next_weight(&mut self) -> f64 {
        (MIXED_CASE_MIN_WEIGHT + MIXED_CASE_MAX_WEIGHT) / 2.0
    }
}

/// Draws mixed-case weights uniformly from a seeded generator.
#[derive(Clone, Debug)]
pub struct SeededWeigher {
    rng: StdRng,
}

impl SeededWeigher {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MixedCaseWeigher for SeededWeigher {
    fn next_weight(&mut self) -> f64 {
        self.rng
            .random_range(MIXED_CASE_MIN_WEIGHT..=MIXED_CASE_MAX_WEIGHT)
    }
}

/// Result of applying a list of actions.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub pallets: Vec<Pallet>,
    pub log: Vec<String>,
    pub insights: Recommendation,
}

/// Applies `actions` in order to a copy of `pallets`.
pub fn apply_actions(
    pallets: &[Pallet],
    lines: &[OrderLine],
    actions: &[Action],
    limits: &AllocationConfig,
    rules: &RecommendationConfig,
    weigher: &mut dyn MixedCaseWeigher,
) -> Implementation {
    let mut working: Vec<Pallet> = pallets.to_vec();
    let mut log = Vec::new();

    for action in actions {
        debug!(action = action.kind(), "applying action");
        match action {
            Action::Consolidate { target_pallets, .. } => {
                let before = working.len();
                working = consolidate(working, *target_pallets, limits);
                let after = working.len();
                let eliminated = before - after;
                log.push(format!("✅ Consolidated {before} pallets into {after} pallets"));
                log.push(format!(
                    "💰 Savings: ${:.0} (eliminated {eliminated} pallets)",
                    eliminated as f64 * rules.cost_per_pallet
                ));
                if after > *target_pallets {
                    log.push(format!(
                        "⚠️ Weight and layer limits stopped consolidation {} pallets short of the target of {target_pallets}",
                        after - target_pallets
                    ));
                }
            }
            Action::FixStacking { .. } => {
                let touched = fix_stacking(&mut working);
                log.push(format!("✅ Fixed stacking order in {touched} pallets"));
                log.push("🛡️ Improved safety by moving heavy items to bottom".to_string());
            }
            Action::RedistributeWeight { .. } => {
                let outcome = redistribute_weight(&mut working, limits);
                log.push(format!(
                    "✅ Redistributed weight across {} pallets ({} items moved)",
                    outcome.pallets_touched, outcome.items_moved
                ));
                if outcome.still_overweight > 0 {
                    log.push(format!(
                        "⚠️ {} pallets remain above {:.0}% capacity; no compatible pallet could take more items",
                        outcome.still_overweight, OVERWEIGHT_THRESHOLD_PCT
                    ));
                } else {
                    log.push("⚖️ Balanced weight distribution for safety".to_string());
                }
            }
            Action::CombineLoose { store, .. } => {
                match combine_loose(&mut working, store, limits, weigher) {
                    Some(weight) => {
                        log.push(format!("✅ Combined loose items for {store}"));
                        log.push(format!(
                            "📦 Created mixed case (+{weight:.1}kg) for efficient packaging"
                        ));
                    }
                    None => {
                        log.push(format!(
                            "⚠️ No pallet for {store} can take a mixed case; loose items left unchanged"
                        ));
                    }
                }
            }
            Action::SeparateFragile { fragile_items, .. } => {
                log.push(format!(
                    "ℹ️ {} fragile items flagged for separate handling; pallets left unchanged",
                    fragile_items.len()
                ));
            }
            Action::Unknown => {
                warn!("skipping unknown action type");
                log.push("⚠️ Unknown action type".to_string());
            }
        }
    }

    let analysis = analyze_with_config(&working, lines, limits);
    let insights = recommend_with_config(&working, lines, &analysis, rules);
    info!(
        "🔧 Applied {} actions: {} → {} pallets",
        actions.len(),
        pallets.len(),
        working.len()
    );

    Implementation {
        pallets: working,
        log,
        insights,
    }
}

/// Merges light pallets of the same store and type until `target` is reached.
///
/// Pallets are visited lightest first; each one joins the first already
/// kept pallet that can carry both its weight and its layers. Pallets that
/// cannot be merged are kept as they are, never dropped.
pub fn consolidate(pallets: Vec<Pallet>, target: usize, limits: &AllocationConfig) -> Vec<Pallet> {
    let mut sorted = pallets;
    sorted.sort_by(|a, b| {
        a.total_weight
            .partial_cmp(&b.total_weight)
            .unwrap_or(Ordering::Equal)
    });

    let mut remaining = sorted.len();
    let mut kept: Vec<Pallet> = Vec::with_capacity(sorted.len());

    for pallet in sorted {
        if remaining > target {
            if let Some(host) = kept.iter_mut().find(|host| can_merge(host, &pallet, limits)) {
                debug!(host = %host.id, merged = %pallet.id, "merging pallets");
                host.absorb(pallet);
                remaining -= 1;
                continue;
            }
        }
        kept.push(pallet);
    }

    kept
}

fn can_merge(host: &Pallet, guest: &Pallet, limits: &AllocationConfig) -> bool {
    host.store == guest.store
        && host.pallet_type == guest.pallet_type
        && host.total_weight + guest.total_weight <= limits.max_weight + limits.general_epsilon
        && host.layers + guest.layers <= limits.max_layers
}

/// Re-sorts every top-heavy pallet heavy-first; returns the number touched.
pub fn fix_stacking(pallets: &mut [Pallet]) -> usize {
    let mut touched = 0;
    for pallet in pallets.iter_mut().filter(|p| has_top_heavy_risk(p)) {
        pallet.items.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.handled_with_care().cmp(&b.handled_with_care()))
        });
        pallet.add_instruction(RESTACKED_INSTRUCTION);
        touched += 1;
    }
    touched
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RedistributionOutcome {
    pub pallets_touched: usize,
    pub items_moved: usize,
    pub still_overweight: usize,
}

/// Moves items off overweight pallets onto lighter compatible ones.
///
/// For each pallet above the overweight threshold the lightest item that
/// fits elsewhere is moved to the lightest pallet of the same store and
/// type, as long as the receiver stays under the threshold itself. The
/// bottom item never leaves, so no pallet is emptied.
pub fn redistribute_weight(pallets: &mut [Pallet], limits: &AllocationConfig) -> RedistributionOutcome {
    let threshold = limits.max_weight * OVERWEIGHT_THRESHOLD_PCT / 100.0;
    let mut touched = vec![false; pallets.len()];
    let mut outcome = RedistributionOutcome::default();

    for donor in 0..pallets.len() {
        while pallets[donor].total_weight > threshold + limits.general_epsilon
            && pallets[donor].items.len() > 1
        {
            let Some((item_index, receiver)) = find_move(pallets, donor, threshold, limits) else {
                break;
            };
            let item = pallets[donor].remove_item(item_index);
            debug!(
                from = %pallets[donor].id,
                to = %pallets[receiver].id,
                sku = %item.sku,
                "moving item to rebalance weight"
            );
            pallets[receiver].push_item(item);
            touched[donor] = true;
            touched[receiver] = true;
            outcome.items_moved += 1;
        }
    }

    for (pallet, was_touched) in pallets.iter_mut().zip(&touched) {
        if *was_touched {
            pallet.add_instruction(REDISTRIBUTED_INSTRUCTION);
            outcome.pallets_touched += 1;
        }
    }
    outcome.still_overweight = pallets
        .iter()
        .filter(|p| p.total_weight > threshold + limits.general_epsilon)
        .count();
    outcome
}

/// Finds the lightest movable item of `donor` and the lightest pallet that can take it.
fn find_move(
    pallets: &[Pallet],
    donor: usize,
    threshold: f64,
    limits: &AllocationConfig,
) -> Option<(usize, usize)> {
    let source = &pallets[donor];
    let mut candidates: Vec<usize> = (1..source.items.len()).collect();
    candidates.sort_by(|&a, &b| {
        source.items[a]
            .weight
            .partial_cmp(&source.items[b].weight)
            .unwrap_or(Ordering::Equal)
    });

    for item_index in candidates {
        let item = &source.items[item_index];
        let receiver = pallets
            .iter()
            .enumerate()
            .filter(|(idx, pallet)| {
                *idx != donor
                    && pallet.store == source.store
                    && pallet.pallet_type == source.pallet_type
                    && pallet.total_weight + item.weight <= threshold
                    && limits.admits(pallet, item.weight, item.layers, item.handled_with_care())
            })
            .min_by(|(_, a), (_, b)| {
                a.total_weight
                    .partial_cmp(&b.total_weight)
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(idx, _)| idx);

        if let Some(receiver) = receiver {
            return Some((item_index, receiver));
        }
    }
    None
}

/// Adds a mixed case to the first regular pallet of `store` with spare weight.
///
/// Returns the added weight, or `None` when no pallet can take it.
pub fn combine_loose(
    pallets: &mut [Pallet],
    store: &str,
    limits: &AllocationConfig,
    weigher: &mut dyn MixedCaseWeigher,
) -> Option<f64> {
    let weight = weigher.next_weight();
    let pallet = pallets.iter_mut().find(|pallet| {
        pallet.store == store
            && pallet.pallet_type == PalletType::Regular
            && pallet.total_weight + weight <= limits.max_weight + limits.general_epsilon
    })?;

    pallet.push_item(Item {
        sku: MIXED_CASE_SKU.to_string(),
        name: MIXED_CASE_NAME.to_string(),
        quantity: 1,
        weight,
        category: Category::Mixed,
        fragile: false,
        layers: 0,
    });
    pallet.add_instruction(MIXED_CASE_INSTRUCTION);
    Some(weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, quantity: u32, weight: f64) -> Item {
        Item {
            sku: sku.to_string(),
            name: sku.to_lowercase(),
            quantity,
            weight,
            category: Category::DryGoods,
            fragile: false,
            layers: 1,
        }
    }

    fn pallet(store: &str, sequence: usize, items: Vec<Item>) -> Pallet {
        let mut pallet = Pallet::new(store, PalletType::Regular, sequence);
        for item in items {
            pallet.push_item(item);
        }
        pallet
    }

    fn apply(pallets: &[Pallet], actions: &[Action]) -> Implementation {
        apply_actions(
            pallets,
            &[],
            actions,
            &AllocationConfig::default(),
            &RecommendationConfig::default(),
            &mut MidpointWeigher,
        )
    }

    fn consolidate_to(target: usize) -> Action {
        Action::Consolidate {
            description: String::new(),
            target_pallets: target,
            current_pallets: 0,
            pallet_reduction: 0,
            estimated_savings: 0.0,
        }
    }

    #[test]
    fn consolidation_merges_same_store_pallets() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("A", 12, 300.0)]),
            pallet("Store A", 1, vec![item("B", 12, 200.0)]),
            pallet("Store A", 2, vec![item("C", 12, 400.0)]),
        ];

        let result = apply(&pallets, &[consolidate_to(1)]);
        assert_eq!(result.pallets.len(), 1);
        assert_eq!(result.pallets[0].total_weight, 900.0);
        assert_eq!(result.pallets[0].layers, 3);
        // Lightest pallet hosts the merge and keeps its id
        assert_eq!(result.pallets[0].id, pallets[1].id);
        assert_eq!(result.log[0], "✅ Consolidated 3 pallets into 1 pallets");
        assert_eq!(result.log[1], "💰 Savings: $50 (eliminated 2 pallets)");
        // Caller's pallets are untouched
        assert_eq!(pallets.len(), 3);
        assert_eq!(pallets[1].total_weight, 200.0);
    }

    #[test]
    fn consolidation_respects_store_type_and_limits() {
        let mut frozen = Pallet::new("Store A", PalletType::Frozen, 0);
        frozen.push_item(item("ICE", 12, 100.0));
        let pallets = vec![
            pallet("Store A", 0, vec![item("A", 12, 100.0)]),
            pallet("Store B", 0, vec![item("B", 12, 100.0)]),
            frozen,
            pallet("Store A", 1, vec![item("C", 12, 950.0)]),
        ];

        let merged = consolidate(pallets, 1, &AllocationConfig::default());
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn consolidation_checks_layers_too() {
        let mut tall = item("TALL", 12, 50.0);
        tall.layers = 4;
        let mut tower = item("TOWER", 12, 60.0);
        tower.layers = 4;
        let pallets = vec![pallet("Store A", 0, vec![tall]), pallet("Store A", 1, vec![tower])];

        let result = apply(&pallets, &[consolidate_to(1)]);
        assert_eq!(result.pallets.len(), 2);
        assert!(result.log.iter().any(|line| line.contains("1 pallets short of the target")));
    }

    #[test]
    fn consolidation_stops_at_target() {
        let pallets: Vec<Pallet> = (0..4)
            .map(|i| pallet("Store A", i, vec![item(&format!("S{i}"), 12, 100.0)]))
            .collect();
        let merged = consolidate(pallets, 3, &AllocationConfig::default());
        assert_eq!(merged.len(), 3);
        let weight: f64 = merged.iter().map(|p| p.total_weight).sum();
        assert_eq!(weight, 400.0);
    }

    #[test]
    fn fix_stacking_moves_heavy_items_down() {
        let mut glass = item("GLASS", 10, 300.0);
        glass.fragile = true;
        let pallets = vec![
            pallet("Store A", 0, vec![item("CHIPS", 12, 12.0), item("KEGS", 10, 300.0), glass]),
            pallet("Store A", 1, vec![item("BREAD", 12, 12.0)]),
        ];

        let result = apply(
            &pallets,
            &[Action::FixStacking {
                description: String::new(),
                affected_pallets: 1,
            }],
        );
        let order: Vec<&str> = result.pallets[0].items.iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(order, vec!["KEGS", "GLASS", "CHIPS"]);
        assert_eq!(
            result.pallets[0].special_instructions.last().map(String::as_str),
            Some(RESTACKED_INSTRUCTION)
        );
        assert!(result.pallets[1].special_instructions.is_empty());
        assert_eq!(result.log[0], "✅ Fixed stacking order in 1 pallets");
    }

    #[test]
    fn redistribution_moves_real_items() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("BASE", 10, 900.0), item("TOP", 4, 80.0)]),
            pallet("Store A", 1, vec![item("LIGHT", 12, 100.0)]),
        ];

        let result = apply(
            &pallets,
            &[Action::RedistributeWeight {
                description: String::new(),
                affected_pallets: 1,
            }],
        );
        assert_eq!(result.pallets[0].total_weight, 900.0);
        assert_eq!(result.pallets[1].total_weight, 180.0);
        assert_eq!(result.pallets[1].items.last().unwrap().sku, "TOP");
        for pallet in &result.pallets {
            let sum: f64 = pallet.items.iter().map(|i| i.weight).sum();
            assert_eq!(pallet.total_weight, sum);
            assert_eq!(
                pallet.special_instructions.last().map(String::as_str),
                Some(REDISTRIBUTED_INSTRUCTION)
            );
        }
        assert_eq!(result.log[0], "✅ Redistributed weight across 2 pallets (1 items moved)");
    }

    #[test]
    fn redistribution_leaves_unmovable_pallets_and_says_so() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("BASE", 10, 900.0), item("TOP", 4, 80.0)]),
            pallet("Store B", 0, vec![item("OTHER", 12, 100.0)]),
        ];
        let mut working = pallets.clone();
        let outcome = redistribute_weight(&mut working, &AllocationConfig::default());
        assert_eq!(outcome.items_moved, 0);
        assert_eq!(outcome.still_overweight, 1);
        assert_eq!(working, pallets);
    }

    #[test]
    fn combine_loose_adds_mixed_case_to_store_pallet() {
        let pallets = vec![
            pallet("Store B", 0, vec![item("B", 12, 100.0)]),
            pallet("Store A", 0, vec![item("A", 12, 100.0)]),
        ];
        let result = apply(
            &pallets,
            &[Action::CombineLoose {
                description: String::new(),
                store: "Store A".into(),
                items: Vec::new(),
            }],
        );
        let target = &result.pallets[1];
        assert_eq!(target.total_weight, 110.0);
        let mixed = target.items.last().unwrap();
        assert_eq!(mixed.sku, MIXED_CASE_SKU);
        assert_eq!(mixed.category, Category::Mixed);
        assert_eq!(target.special_instructions, vec![MIXED_CASE_INSTRUCTION.to_string()]);
        assert_eq!(result.log[1], "📦 Created mixed case (+10.0kg) for efficient packaging");
    }

    #[test]
    fn combine_loose_without_store_pallet_is_noop() {
        let pallets = vec![pallet("Store B", 0, vec![item("B", 12, 100.0)])];
        let result = apply(
            &pallets,
            &[Action::CombineLoose {
                description: String::new(),
                store: "Store Z".into(),
                items: Vec::new(),
            }],
        );
        assert_eq!(result.pallets, pallets);
        assert!(result.log[0].contains("No pallet for Store Z"));
    }

    #[test]
    fn separate_fragile_and_unknown_actions_only_log() {
        let pallets = vec![pallet("Store A", 0, vec![item("A", 12, 100.0)])];
        let result = apply(
            &pallets,
            &[
                Action::SeparateFragile {
                    description: String::new(),
                    fragile_items: Vec::new(),
                },
                Action::Unknown,
            ],
        );
        assert_eq!(result.pallets, pallets);
        assert_eq!(result.log.len(), 2);
        assert_eq!(result.log[1], "⚠️ Unknown action type");
    }

    #[test]
    fn seeded_weigher_is_reproducible_and_in_range() {
        let mut first = SeededWeigher::new(42);
        let mut second = SeededWeigher::new(42);
        for _ in 0..20 {
            let weight = first.next_weight();
            assert_eq!(weight, second.next_weight());
            assert!((MIXED_CASE_MIN_WEIGHT..=MIXED_CASE_MAX_WEIGHT).contains(&weight));
        }
    }

    #[test]
    fn refreshed_insights_describe_new_pallets() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("A", 12, 100.0)]),
            pallet("Store A", 1, vec![item("B", 12, 100.0)]),
        ];
        let result = apply(&pallets, &[consolidate_to(1)]);
        assert_eq!(result.insights.analysis.total_pallets, 1);
        assert_eq!(result.insights.analysis.average_utilization_pct, 20.0);
    }
}
