//! Data models for pallet building.
//!
//! This module defines the fundamental records of the allocation pipeline:
//! - `OrderLineInput`: an unvalidated order line as it arrives from the caller
//! - `OrderLine`: a validated, immutable order line
//! - `Item`: the portion of an order line placed on a pallet
//! - `Pallet`: a unit load for exactly one store

use std::fmt;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{
    DEFAULT_CASES_PER_LAYER, DEFAULT_UNITS_PER_CASE, Layered, Weighted, div_ceil,
    utilization_percent,
};

/// Instruction appended when fragile goods or bottles are placed.
pub const FRAGILE_INSTRUCTION: &str = "Handle with care - fragile items on top";

/// Instruction appended when frozen goods are placed.
pub const FROZEN_INSTRUCTION: &str = "Keep frozen - temperature controlled";

/// Validation error for a single order line.
///
/// `index` is the zero-based position of the line in the submitted batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Order line {index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("Order line {index} ({sku}): quantity must be at least 1, got {value}")]
    InvalidQuantity { index: usize, sku: String, value: i64 },
    #[error("Order line {index} ({sku}): weight must be positive, got {value}")]
    InvalidWeight { index: usize, sku: String, value: f64 },
}

impl ValidationError {
    /// Position of the offending line in the batch.
    pub fn index(&self) -> usize {
        match self {
            ValidationError::MissingField { index, .. }
            | ValidationError::InvalidQuantity { index, .. }
            | ValidationError::InvalidWeight { index, .. } => *index,
        }
    }
}

/// Product category of an order line.
///
/// Known categories drive temperature separation and fragile handling;
/// anything else is carried through verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    DryGoods,
    Frozen,
    Bottles,
    Fragile,
    Mixed,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::DryGoods => "dry-goods",
            Category::Frozen => "frozen",
            Category::Bottles => "bottles",
            Category::Fragile => "fragile",
            Category::Mixed => "mixed",
            Category::Other(raw) => raw,
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dry-goods" | "dry_goods" | "drygoods" | "dry" => Category::DryGoods,
            "frozen" => Category::Frozen,
            "bottles" => Category::Bottles,
            "fragile" => Category::Fragile,
            "mixed" => Category::Mixed,
            _ => Category::Other(raw),
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Category::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature class of a pallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PalletType {
    #[default]
    Regular,
    Frozen,
}

impl PalletType {
    /// Temperature class required for goods of the given category.
    pub fn for_category(category: &Category) -> Self {
        if *category == Category::Frozen {
            PalletType::Frozen
        } else {
            PalletType::Regular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PalletType::Regular => "regular",
            PalletType::Frozen => "frozen",
        }
    }
}

impl fmt::Display for PalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line as submitted by the caller, before validation.
///
/// Every field is optional here so that missing values can be reported
/// per line instead of failing the whole request at parse time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "sku": "SKU-001",
        "name": "Canned Tomatoes",
        "store": "Store A",
        "quantity": 24,
        "weight": 0.5,
        "category": "dry-goods",
        "fragile": false,
        "unitsPerCase": 12,
        "casesPerLayer": 6
    })
)]
pub struct OrderLineInput {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub store: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<f64>,
    pub category: Option<String>,
    pub fragile: Option<bool>,
    pub units_per_case: Option<u32>,
    pub cases_per_layer: Option<u32>,
}

impl OrderLineInput {
    /// Validates the raw line and applies the sizing defaults.
    ///
    /// Identity fields, quantity and weight are required. Only the optional
    /// sizing fields fall back to defaults when missing or zero.
    pub fn validate(self, index: usize) -> Result<OrderLine, ValidationError> {
        let sku = required(self.sku, index, "sku")?;
        let name = required(self.name, index, "name")?;
        let store = required(self.store, index, "store")?;

        let quantity = match self.quantity {
            None => return Err(ValidationError::MissingField { index, field: "quantity" }),
            Some(value) if value < 1 || value > i64::from(u32::MAX) => {
                return Err(ValidationError::InvalidQuantity { index, sku, value });
            }
            Some(value) => value as u32,
        };

        let weight = match self.weight {
            None => return Err(ValidationError::MissingField { index, field: "weight" }),
            Some(value) if value <= 0.0 || !value.is_finite() => {
                return Err(ValidationError::InvalidWeight { index, sku, value });
            }
            Some(value) => value,
        };

        Ok(OrderLine {
            sku,
            name,
            store,
            quantity,
            weight,
            category: self.category.map(Category::from).unwrap_or_default(),
            fragile: self.fragile.unwrap_or(false),
            units_per_case: positive_or(self.units_per_case, DEFAULT_UNITS_PER_CASE),
            cases_per_layer: positive_or(self.cases_per_layer, DEFAULT_CASES_PER_LAYER),
        })
    }
}

fn required(value: Option<String>, index: usize, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField { index, field }),
    }
}

fn positive_or(value: Option<u32>, default: u32) -> u32 {
    match value {
        Some(value) if value > 0 => value,
        _ => default,
    }
}

/// Validates a whole batch, collecting every offending line.
pub fn validate_order_lines(
    inputs: Vec<OrderLineInput>,
) -> Result<Vec<OrderLine>, Vec<ValidationError>> {
    let mut lines = Vec::with_capacity(inputs.len());
    let mut errors = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        match input.validate(index) {
            Ok(line) => lines.push(line),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() { Ok(lines) } else { Err(errors) }
}

/// A validated request for one SKU to one store.
///
/// # Fields
/// * `weight` - Weight of a single unit in kg
/// * `units_per_case` - Units packed into one case
/// * `cases_per_layer` - Cases that fit into one pallet layer
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub sku: String,
    pub name: String,
    pub store: String,
    pub quantity: u32,
    pub weight: f64,
    pub category: Category,
    pub fragile: bool,
    pub units_per_case: u32,
    pub cases_per_layer: u32,
}

impl OrderLine {
    /// Number of completely filled cases.
    pub fn full_cases(&self) -> u32 {
        self.quantity / self.units_per_case
    }

    /// Units left over after the full cases.
    pub fn loose_units(&self) -> u32 {
        self.quantity % self.units_per_case
    }

    /// Total weight of the line in kg.
    pub fn line_weight(&self) -> f64 {
        self.weight * f64::from(self.quantity)
    }

    /// Pallet layers needed for the line, counting partial cases and layers as whole.
    pub fn layers_needed(&self) -> u32 {
        div_ceil(div_ceil(self.quantity, self.units_per_case), self.cases_per_layer)
    }

    /// Fragile goods and bottles travel on top and only onto light pallets.
    pub fn handled_with_care(&self) -> bool {
        self.fragile || self.category == Category::Bottles
    }

    pub fn is_frozen(&self) -> bool {
        self.category == Category::Frozen
    }

    pub fn pallet_type(&self) -> PalletType {
        PalletType::for_category(&self.category)
    }
}

impl Weighted for OrderLine {
    fn weight(&self) -> f64 {
        self.line_weight()
    }
}

impl Layered for OrderLine {
    fn layers(&self) -> u32 {
        self.layers_needed()
    }
}

/// The portion of an order line placed on a pallet.
///
/// # Fields
/// * `weight` - Total weight of this placement in kg
/// * `layers` - Layer height contributed by this placement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub weight: f64,
    #[schema(value_type = String, example = "dry-goods")]
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub layers: u32,
}

impl Item {
    /// Creates the item for placing a whole order line.
    pub fn from_line(line: &OrderLine) -> Self {
        Self {
            sku: line.sku.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            weight: line.line_weight(),
            category: line.category.clone(),
            fragile: line.fragile,
            layers: line.layers_needed(),
        }
    }

    /// Weight of one unit in kg.
    pub fn unit_weight(&self) -> f64 {
        if self.quantity == 0 {
            return self.weight;
        }
        self.weight / f64::from(self.quantity)
    }

    pub fn handled_with_care(&self) -> bool {
        self.fragile || self.category == Category::Bottles
    }

    pub fn is_frozen(&self) -> bool {
        self.category == Category::Frozen
    }
}

impl Weighted for Item {
    fn weight(&self) -> f64 {
        self.weight
    }
}

impl Layered for Item {
    fn layers(&self) -> u32 {
        self.layers
    }
}

/// A physical unit load for exactly one store.
///
/// `items` are stored bottom-to-top in stacking order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pallet {
    pub id: String,
    pub store: String,
    #[serde(rename = "type", default)]
    pub pallet_type: PalletType,
    pub items: Vec<Item>,
    pub total_weight: f64,
    pub layers: u32,
    #[serde(default)]
    pub special_instructions: Vec<String>,
}

impl Pallet {
    /// Creates an empty pallet with a deterministic id.
    ///
    /// The id is a name-based UUID over store, type and the pallet's
    /// sequence number within that store and type, so repeated runs over
    /// the same input produce identical ids.
    pub fn new(store: impl Into<String>, pallet_type: PalletType, sequence: usize) -> Self {
        let store = store.into();
        let id = pallet_id(&store, pallet_type, sequence);
        Self {
            id,
            store,
            pallet_type,
            items: Vec::new(),
            total_weight: 0.0,
            layers: 0,
            special_instructions: Vec::new(),
        }
    }

    /// Appends an item on top and updates weight and layers.
    pub fn push_item(&mut self, item: Item) {
        self.total_weight += item.weight;
        self.layers += item.layers;
        self.items.push(item);
    }

    /// Removes the item at `index` and updates weight and layers.
    pub fn remove_item(&mut self, index: usize) -> Item {
        let item = self.items.remove(index);
        self.total_weight = (self.total_weight - item.weight).max(0.0);
        self.layers = self.layers.saturating_sub(item.layers);
        item
    }

    /// Appends a handling instruction; repeats are kept until a merge.
    pub fn add_instruction(&mut self, instruction: impl Into<String>) {
        self.special_instructions.push(instruction.into());
    }

    /// Merges `other` into this pallet.
    ///
    /// Items are stacked after the existing ones and the instructions
    /// become the de-duplicated union, keeping first-seen order.
    pub fn absorb(&mut self, other: Pallet) {
        let Pallet {
            items,
            total_weight,
            layers,
            special_instructions,
            ..
        } = other;

        self.items.extend(items);
        self.total_weight += total_weight;
        self.layers += layers;

        let mut merged: Vec<String> = Vec::with_capacity(
            self.special_instructions.len() + special_instructions.len(),
        );
        for instruction in self
            .special_instructions
            .drain(..)
            .chain(special_instructions)
        {
            if !merged.contains(&instruction) {
                merged.push(instruction);
            }
        }
        self.special_instructions = merged;
    }

    pub fn utilization_percent(&self, max_weight: f64) -> f64 {
        utilization_percent(self.total_weight, max_weight)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Weighted for Pallet {
    fn weight(&self) -> f64 {
        self.total_weight
    }
}

impl Layered for Pallet {
    fn layers(&self) -> u32 {
        self.layers
    }
}

/// Builds the name-based pallet id for a store, type and sequence number.
pub fn pallet_id(store: &str, pallet_type: PalletType, sequence: usize) -> String {
    let name = format!("{store}/{pallet_type}/{sequence}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}
