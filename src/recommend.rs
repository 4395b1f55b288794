//! Rule-based recommendations for a pallet set.
//!
//! Every rule is evaluated independently against the analysis report and
//! all that trigger contribute. The output is a pure function of its
//! inputs: no randomness, no clock, no external calls.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::analyzer::{AnalysisReport, LooseItem, PalletItemRef};
use crate::model::{OrderLine, Pallet};
use crate::types::EPSILON_GENERAL;

pub const STANDARD_LOOSE_STRATEGY: &str = "Standard case rounding applied";
pub const WELL_OPTIMIZED: &str = "Current configuration is well-optimized";
pub const LOW_UTILIZATION: &str = "Low utilization detected - consider optimizing item arrangement";

/// Thresholds used by the recommendation rules.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RecommendationConfig {
    /// Consolidation is considered below this average utilization (%)
    pub consolidation_trigger_pct: f64,
    /// Utilization the consolidated pallets should reach (%)
    pub target_utilization_pct: f64,
    /// Loose units per store needed to justify a mixed case
    pub mixed_case_units: u32,
    /// Cost of one pallet in dollars
    pub cost_per_pallet: f64,
}

impl RecommendationConfig {
    pub const DEFAULT_CONSOLIDATION_TRIGGER_PCT: f64 = 85.0;
    pub const DEFAULT_TARGET_UTILIZATION_PCT: f64 = 75.0;
    pub const DEFAULT_MIXED_CASE_UNITS: u32 = 12;
    pub const DEFAULT_COST_PER_PALLET: f64 = 25.0;
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            consolidation_trigger_pct: Self::DEFAULT_CONSOLIDATION_TRIGGER_PCT,
            target_utilization_pct: Self::DEFAULT_TARGET_UTILIZATION_PCT,
            mixed_case_units: Self::DEFAULT_MIXED_CASE_UNITS,
            cost_per_pallet: Self::DEFAULT_COST_PER_PALLET,
        }
    }
}

/// A machine-applicable proposal, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Consolidate {
        #[serde(default)]
        description: String,
        target_pallets: usize,
        #[serde(default)]
        current_pallets: usize,
        #[serde(default)]
        pallet_reduction: usize,
        #[serde(default, deserialize_with = "number_or_numeric_string")]
        estimated_savings: f64,
    },
    FixStacking {
        #[serde(default)]
        description: String,
        #[serde(default)]
        affected_pallets: usize,
    },
    RedistributeWeight {
        #[serde(default)]
        description: String,
        #[serde(default)]
        affected_pallets: usize,
    },
    CombineLoose {
        #[serde(default)]
        description: String,
        store: String,
        #[serde(default)]
        items: Vec<LooseItem>,
    },
    SeparateFragile {
        #[serde(default)]
        description: String,
        #[serde(default)]
        fragile_items: Vec<PalletItemRef>,
    },
    /// Any action type this engine does not know; skipped on execution.
    #[serde(other)]
    Unknown,
}

/// Accepts `50`, `50.0` or `"50"`; older clients send savings as text.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Consolidate { .. } => "consolidate",
            Action::FixStacking { .. } => "fixStacking",
            Action::RedistributeWeight { .. } => "redistributeWeight",
            Action::CombineLoose { .. } => "combineLoose",
            Action::SeparateFragile { .. } => "separateFragile",
            Action::Unknown => "unknown",
        }
    }
}

/// Advisories plus actions derived from one analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub loose_item_strategy: String,
    pub safety_warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub cost_savings: String,
    pub analysis: AnalysisReport,
    #[serde(rename = "implementableActions")]
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<Action>,
}

/// Outcome of the consolidation arithmetic.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConsolidationPlan {
    pub current_pallets: usize,
    pub optimal_pallets: usize,
    pub reduction: usize,
}

impl ConsolidationPlan {
    pub fn savings_percent(&self) -> f64 {
        if self.current_pallets == 0 {
            return 0.0;
        }
        self.reduction as f64 * 100.0 / self.current_pallets as f64
    }

    pub fn estimated_savings(&self, cost_per_pallet: f64) -> f64 {
        self.reduction as f64 * cost_per_pallet
    }
}

/// Computes how many pallets the load would need at the target utilization.
///
/// Returns `None` when utilization is at or above the trigger, or when
/// there are no pallets at all.
pub fn consolidation_plan(
    analysis: &AnalysisReport,
    config: &RecommendationConfig,
) -> Option<ConsolidationPlan> {
    if analysis.total_pallets == 0
        || analysis.average_utilization_pct >= config.consolidation_trigger_pct
    {
        return None;
    }

    let current = analysis.total_pallets;
    let needed = analysis.average_utilization_pct * current as f64 / config.target_utilization_pct;
    // Float noise must not round up an exact multiple
    let optimal = ((needed - EPSILON_GENERAL).ceil().max(1.0)) as usize;

    Some(ConsolidationPlan {
        current_pallets: current,
        optimal_pallets: optimal,
        reduction: current.saturating_sub(optimal),
    })
}

/// Applies the default rule thresholds.
pub fn recommend(
    pallets: &[Pallet],
    lines: &[OrderLine],
    analysis: &AnalysisReport,
) -> Recommendation {
    recommend_with_config(pallets, lines, analysis, &RecommendationConfig::default())
}

/// Evaluates every rule and accumulates advisories and actions.
pub fn recommend_with_config(
    pallets: &[Pallet],
    _lines: &[OrderLine],
    analysis: &AnalysisReport,
    config: &RecommendationConfig,
) -> Recommendation {
    let mut recommendations = Vec::new();
    let mut safety_warnings = Vec::new();
    let mut actions = Vec::new();
    let mut loose_item_strategy = STANDARD_LOOSE_STRATEGY.to_string();

    let plan = consolidation_plan(analysis, config);
    if let Some(plan) = plan {
        if plan.reduction > 0 {
            recommendations.push(format!(
                "🎯 OPTIMIZATION: Current {:.1}% utilization. Could consolidate into {} pallets for {:.1}% cost savings.",
                analysis.average_utilization_pct,
                plan.optimal_pallets,
                plan.savings_percent()
            ));
            actions.push(Action::Consolidate {
                description: "Consolidate under-utilized pallets".to_string(),
                target_pallets: plan.optimal_pallets,
                current_pallets: plan.current_pallets,
                pallet_reduction: plan.reduction,
                estimated_savings: plan.estimated_savings(config.cost_per_pallet),
            });
        } else {
            recommendations.push(format!(
                "🎯 OPTIMIZATION: Current {:.1}% utilization. Consider optimizing item arrangement.",
                analysis.average_utilization_pct
            ));
        }
    }

    let mut strategies = Vec::new();
    for (store, items) in group_loose_by_store(&analysis.loose_items) {
        let total_loose: u32 = items.iter().map(|item| item.loose_units).sum();
        if total_loose < config.mixed_case_units {
            continue;
        }
        strategies.push(format!(
            "{store}: Combine {} partial cases into 1 mixed case",
            items.len()
        ));
        actions.push(Action::CombineLoose {
            description: format!("Combine {} partial cases for {store}", items.len()),
            store: store.to_string(),
            items: items.into_iter().cloned().collect(),
        });
    }
    if !strategies.is_empty() {
        loose_item_strategy = format!("📦 SMART LOOSE MANAGEMENT: {}", strategies.join("; "));
        recommendations.push(format!(
            "💡 Loose item optimization could reduce packaging by {} partial cases",
            analysis.loose_items.len()
        ));
    }

    if !analysis.top_heavy_risks.is_empty() {
        let affected = analysis.top_heavy_pallet_count();
        safety_warnings.push(format!(
            "⚠️ TOP-HEAVY RISK: {affected} pallets have heavy items that may crush lower items"
        ));
        recommendations.push(format!(
            "🛡️ SAFETY: Rearrange {affected} pallets with heavy items at bottom"
        ));
        actions.push(Action::FixStacking {
            description: format!("Reorder items in {affected} pallets for safety"),
            affected_pallets: affected,
        });
    }

    if !analysis.overweight_risks.is_empty() {
        let affected = analysis.overweight_risks.len();
        safety_warnings.push(format!(
            "⚠️ OVERWEIGHT RISK: {affected} pallets exceed 95% capacity"
        ));
        actions.push(Action::RedistributeWeight {
            description: format!("Redistribute weight in {affected} overloaded pallets"),
            affected_pallets: affected,
        });
    }

    let fragile_in_mixed: Vec<PalletItemRef> = analysis
        .fragile_items
        .iter()
        .filter(|entry| {
            pallets
                .get(entry.pallet_index)
                .is_some_and(|pallet| pallet.items.len() > 1)
        })
        .cloned()
        .collect();
    if !fragile_in_mixed.is_empty() {
        let count = fragile_in_mixed.len();
        safety_warnings.push(format!(
            "⚠️ FRAGILE RISK: {count} fragile items mixed with other products"
        ));
        recommendations.push("🛡️ SAFETY: Consider separate handling for fragile items".to_string());
        actions.push(Action::SeparateFragile {
            description: format!("Separate {count} fragile items for safer handling"),
            fragile_items: fragile_in_mixed,
        });
    }

    let cost_savings = match plan {
        Some(plan) if plan.reduction > 0 => format!(
            "Potential savings: ${:.0} ({:.1}% reduction in pallets × ${:.0}/pallet)",
            plan.estimated_savings(config.cost_per_pallet),
            plan.savings_percent(),
            config.cost_per_pallet
        ),
        Some(_) => LOW_UTILIZATION.to_string(),
        None => WELL_OPTIMIZED.to_string(),
    };

    Recommendation {
        loose_item_strategy,
        safety_warnings,
        recommendations,
        cost_savings,
        analysis: analysis.clone(),
        actions,
    }
}

/// Groups loose items by store in first-seen order.
fn group_loose_by_store(items: &[LooseItem]) -> Vec<(&str, Vec<&LooseItem>)> {
    let mut groups: Vec<(&str, Vec<&LooseItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(store, _)| *store == item.store) {
            Some((_, group)) => group.push(item),
            None => groups.push((item.store.as_str(), vec![item])),
        }
    }
    groups
}
