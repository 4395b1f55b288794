//! Configuration analysis over a pallet set.
//!
//! Produces a stateless snapshot of utilization, loose units and
//! safety risks that the recommendation rules work from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::allocator::AllocationConfig;
use crate::model::{Item, OrderLine, Pallet};

/// A pallet above this utilization is flagged as an overweight risk.
pub const OVERWEIGHT_THRESHOLD_PCT: f64 = 95.0;

/// Items heavier than this per unit belong at the bottom of a pallet.
pub const TOP_HEAVY_UNIT_WEIGHT: f64 = 20.0;

/// Remainder of an order line that does not fill a whole case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LooseItem {
    pub item: String,
    pub sku: String,
    pub loose_units: u32,
    pub full_cases: u32,
    pub store: String,
}

/// Reference to a named item on a pallet (zero-based pallet index).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PalletItemRef {
    pub pallet_index: usize,
    pub item: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverweightRisk {
    pub pallet_index: usize,
    pub utilization_pct: f64,
}

/// A heavy item found above the bottom position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopHeavyRisk {
    pub pallet_index: usize,
    pub item_index: usize,
    pub item: String,
}

/// Summary statistics and risk flags for a pallet set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub total_pallets: usize,
    pub total_weight: f64,
    pub average_utilization_pct: f64,
    pub loose_items: Vec<LooseItem>,
    pub fragile_items: Vec<PalletItemRef>,
    pub frozen_items: Vec<PalletItemRef>,
    pub overweight_risks: Vec<OverweightRisk>,
    pub top_heavy_risks: Vec<TopHeavyRisk>,
}

impl AnalysisReport {
    /// Number of distinct pallets with at least one top-heavy item.
    pub fn top_heavy_pallet_count(&self) -> usize {
        self.top_heavy_risks
            .iter()
            .map(|r| r.pallet_index)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn total_loose_units(&self) -> u32 {
        self.loose_items.iter().map(|l| l.loose_units).sum()
    }
}

/// Whether an item at `index` is heavy enough to be a stacking risk there.
pub fn is_top_heavy(index: usize, item: &Item) -> bool {
    index > 0 && item.unit_weight() > TOP_HEAVY_UNIT_WEIGHT
}

/// Whether any item above the bottom position of the pallet is top-heavy.
pub fn has_top_heavy_risk(pallet: &Pallet) -> bool {
    pallet
        .items
        .iter()
        .enumerate()
        .any(|(index, item)| is_top_heavy(index, item))
}

/// Analyzes pallets against the default pallet limits.
pub fn analyze(pallets: &[Pallet], lines: &[OrderLine]) -> AnalysisReport {
    analyze_with_config(pallets, lines, &AllocationConfig::default())
}

/// Analyzes pallets against the given pallet limits.
pub fn analyze_with_config(
    pallets: &[Pallet],
    lines: &[OrderLine],
    config: &AllocationConfig,
) -> AnalysisReport {
    let mut report = AnalysisReport {
        total_pallets: pallets.len(),
        total_weight: pallets.iter().map(|p| p.total_weight).sum(),
        ..Default::default()
    };

    let mut utilization_sum = 0.0;
    for (pallet_index, pallet) in pallets.iter().enumerate() {
        let utilization = pallet.utilization_percent(config.max_weight);
        utilization_sum += utilization;

        if utilization > OVERWEIGHT_THRESHOLD_PCT {
            report.overweight_risks.push(OverweightRisk {
                pallet_index,
                utilization_pct: utilization,
            });
        }

        for (item_index, item) in pallet.items.iter().enumerate() {
            if item.handled_with_care() {
                report.fragile_items.push(PalletItemRef {
                    pallet_index,
                    item: item.name.clone(),
                });
            }
            if item.is_frozen() {
                report.frozen_items.push(PalletItemRef {
                    pallet_index,
                    item: item.name.clone(),
                });
            }
            if is_top_heavy(item_index, item) {
                report.top_heavy_risks.push(TopHeavyRisk {
                    pallet_index,
                    item_index,
                    item: item.name.clone(),
                });
            }
        }
    }

    if !pallets.is_empty() {
        report.average_utilization_pct = utilization_sum / pallets.len() as f64;
    }

    report.loose_items = lines
        .iter()
        .filter(|line| line.loose_units() > 0)
        .map(|line| LooseItem {
            item: line.name.clone(),
            sku: line.sku.clone(),
            loose_units: line.loose_units(),
            full_cases: line.full_cases(),
            store: line.store.clone(),
        })
        .collect();

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, PalletType};

    fn item(name: &str, quantity: u32, weight: f64, category: Category) -> Item {
        Item {
            sku: name.to_uppercase(),
            name: name.to_string(),
            quantity,
            weight,
            category,
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

    fn order_line(store: &str, name: &str, quantity: u32) -> OrderLine {
        OrderLine {
            sku: name.to_uppercase(),
            name: name.to_string(),
            store: store.to_string(),
            quantity,
            weight: 1.0,
            category: Category::DryGoods,
            fragile: false,
            units_per_case: 12,
            cases_per_layer: 6,
        }
    }

    #[test]
    fn empty_pallet_set_reports_zero_utilization() {
        let report = analyze(&[], &[]);
        assert_eq!(report.total_pallets, 0);
        assert_eq!(report.average_utilization_pct, 0.0);
        assert!(!report.average_utilization_pct.is_nan());
    }

    #[test]
    fn average_utilization_is_mean_over_pallets() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("flour", 10, 200.0, Category::DryGoods)]),
            pallet("Store A", 1, vec![item("sugar", 10, 600.0, Category::DryGoods)]),
        ];
        let report = analyze(&pallets, &[]);
        assert_eq!(report.total_weight, 800.0);
        assert_eq!(report.average_utilization_pct, 40.0);
    }

    #[test]
    fn flags_pallets_above_ninety_five_percent() {
        let pallets = vec![
            pallet("Store A", 0, vec![item("cement", 20, 960.0, Category::DryGoods)]),
            pallet("Store A", 1, vec![item("sand", 19, 950.0, Category::DryGoods)]),
        ];
        let report = analyze(&pallets, &[]);
        assert_eq!(report.overweight_risks.len(), 1);
        assert_eq!(report.overweight_risks[0].pallet_index, 0);
        assert_eq!(report.overweight_risks[0].utilization_pct, 96.0);
    }

    #[test]
    fn flags_heavy_units_above_bottom_position() {
        let pallets = vec![pallet(
            "Store A",
            0,
            vec![
                item("kegs", 2, 60.0, Category::DryGoods),
                item("chips", 12, 6.0, Category::DryGoods),
                item("batteries", 4, 100.0, Category::DryGoods),
            ],
        )];
        let report = analyze(&pallets, &[]);
        assert_eq!(
            report.top_heavy_risks,
            vec![TopHeavyRisk {
                pallet_index: 0,
                item_index: 2,
                item: "batteries".to_string(),
            }]
        );
        assert_eq!(report.top_heavy_pallet_count(), 1);
        assert!(has_top_heavy_risk(&pallets[0]));
    }

    #[test]
    fn top_heavy_pallets_are_counted_once_in_any_order() {
        let risk = |pallet_index, item_index| TopHeavyRisk {
            pallet_index,
            item_index,
            item: "kegs".to_string(),
        };
        let report = AnalysisReport {
            top_heavy_risks: vec![risk(0, 1), risk(3, 1), risk(0, 2), risk(3, 2), risk(1, 1)],
            ..Default::default()
        };
        assert_eq!(report.top_heavy_pallet_count(), 3);
    }

    #[test]
    fn records_fragile_and_frozen_items() {
        let mut glass = item("glass", 12, 6.0, Category::DryGoods);
        glass.fragile = true;
        let pallets = vec![
            pallet("Store A", 0, vec![item("wine", 12, 18.0, Category::Bottles), glass]),
            pallet("Store A", 1, vec![item("peas", 12, 6.0, Category::Frozen)]),
        ];
        let report = analyze(&pallets, &[]);
        assert_eq!(report.fragile_items.len(), 2);
        assert_eq!(report.fragile_items[1].item, "glass");
        assert_eq!(
            report.frozen_items,
            vec![PalletItemRef {
                pallet_index: 1,
                item: "peas".to_string(),
            }]
        );
    }

    #[test]
    fn records_loose_units_per_order_line() {
        let lines = vec![
            order_line("Store A", "rice", 24),
            order_line("Store A", "beans", 30),
            order_line("Store B", "pasta", 5),
        ];
        let report = analyze(&[], &lines);
        assert_eq!(report.loose_items.len(), 2);
        assert_eq!(report.loose_items[0].item, "beans");
        assert_eq!(report.loose_items[0].loose_units, 6);
        assert_eq!(report.loose_items[0].full_cases, 2);
        assert_eq!(report.loose_items[1].store, "Store B");
        assert_eq!(report.total_loose_units(), 11);
    }
}
