//! Pallet building and optimization engine.
//!
//! Order lines are validated, packed onto pallets per store and temperature
//! class, analyzed for utilization and safety risks, and turned into
//! machine-applicable actions that can be applied to produce a new pallet set.

pub mod allocator;
pub mod analyzer;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod recommend;
pub mod types;

pub use allocator::{AllocationConfig, allocate, allocate_with_config};
pub use analyzer::{AnalysisReport, analyze};
pub use engine::{BuildOutcome, build_pallets, implement_actions};
pub use error::EngineError;
pub use executor::{Implementation, MidpointWeigher, MixedCaseWeigher, SeededWeigher, apply_actions};
pub use model::{Category, Item, OrderLine, OrderLineInput, Pallet, PalletType};
pub use recommend::{Action, Recommendation, recommend};
