use thiserror::Error;

use crate::allocator::UnplaceableLine;
use crate::model::ValidationError;

/// Errors surfaced by the pallet engine.
///
/// Validation and capacity problems are reported per offending line;
/// `Io` and `Json` only occur while reading requests.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid order lines: {}", join_lines(.0))]
    InvalidInput(Vec<ValidationError>),

    #[error("Order lines exceed pallet limits: {}", join_lines(.0))]
    Unplaceable(Vec<UnplaceableLine>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON data: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Short machine-readable category used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Unplaceable(_) => "unplaceable_line",
            EngineError::Io(_) => "io_error",
            EngineError::Json(_) => "invalid_json",
        }
    }
}

impl From<Vec<ValidationError>> for EngineError {
    fn from(errors: Vec<ValidationError>) -> Self {
        EngineError::InvalidInput(errors)
    }
}

fn join_lines<T: std::fmt::Display>(entries: &[T]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, EngineError>;
