//! Request and response records for the pallet builder.
//!
//! Mirrors the JSON shapes of the build and implement operations and
//! exposes their OpenAPI schema. Transport is left to the caller; the
//! binary reads these records from a file or stdin.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::{OpenApi, ToSchema};

use crate::analyzer::{
    AnalysisReport, LooseItem, OverweightRisk, PalletItemRef, TopHeavyRisk,
};
use crate::config::OptimizerConfig;
use crate::engine::{build_pallets, implement_actions};
use crate::error::{EngineError, Result};
use crate::model::{Item, OrderLineInput, Pallet, PalletType};
use crate::recommend::{Action, Recommendation};

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

/// Returns the OpenAPI document describing all request and response records.
pub fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for building pallets.
#[derive(Deserialize, Serialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "orderLines": [
            {
                "sku": "SKU-001",
                "name": "Canned Tomatoes",
                "store": "Store A",
                "quantity": 24,
                "weight": 0.5,
                "category": "dry-goods"
            }
        ]
    })
)]
pub struct BuildRequest {
    pub order_lines: Vec<OrderLineInput>,
}

/// Request structure for implementing recommended actions.
#[derive(Deserialize, Serialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImplementRequest {
    pub pallets: Vec<Pallet>,
    pub order_lines: Vec<OrderLineInput>,
    #[schema(value_type = Vec<Object>)]
    pub implementable_actions: Vec<Action>,
}

/// Response structure with all built pallets.
///
/// # Fields
/// * `pallets` - Pallets in store, then temperature order
/// * `llm_insights` - Advisories and implementable actions for the pallets
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub pallets: Vec<Pallet>,
    pub llm_insights: Recommendation,
}

/// Response structure after implementing actions.
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImplementResponse {
    pub success: bool,
    pub updated_pallets: Vec<Pallet>,
    pub implementation_log: Vec<String>,
    pub new_insights: Recommendation,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        let error = match err {
            EngineError::InvalidInput(_) => "Invalid input data",
            EngineError::Unplaceable(_) => "Order lines exceed pallet limits",
            EngineError::Io(_) => "Could not read request",
            EngineError::Json(_) => "Invalid JSON data",
        };
        ErrorResponse::new(error, err.to_string())
    }
}

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            BuildRequest,
            ImplementRequest,
            BuildResponse,
            ImplementResponse,
            ErrorResponse,
            OrderLineInput,
            Pallet,
            PalletType,
            Item,
            Recommendation,
            AnalysisReport,
            LooseItem,
            PalletItemRef,
            OverweightRisk,
            TopHeavyRisk
        )
    ),
    tags((name = "pallets", description = "Pallet building and optimization records"))
)]
struct ApiDoc;

/// Reads a request body from `path`, or from stdin when `path` is `None` or `-`.
pub fn read_request_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}

/// Parses and runs a build request.
pub fn handle_build(body: &str, config: &OptimizerConfig) -> Result<BuildResponse> {
    let request: BuildRequest = serde_json::from_str(body)?;
    let outcome = build_pallets(request.order_lines, config)?;
    Ok(BuildResponse {
        pallets: outcome.pallets,
        llm_insights: outcome.insights,
    })
}

/// Parses and runs an implement request.
pub fn handle_implement(body: &str, config: &OptimizerConfig) -> Result<ImplementResponse> {
    let request: ImplementRequest = serde_json::from_str(body)?;
    let implementation = implement_actions(
        &request.pallets,
        request.order_lines,
        &request.implementable_actions,
        config,
    )?;
    Ok(ImplementResponse {
        success: true,
        updated_pallets: implementation.pallets,
        implementation_log: implementation.log,
        new_insights: implementation.insights,
    })
}
