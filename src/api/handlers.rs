use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{CacheStats, SchemaDescription};
use crate::data::Dataset;
use crate::exec::{ExecutionFailure, FailureCategory};
use crate::guard::ValidationRejection;
use crate::pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineState};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Pipeline,
    pub datasets: Vec<Dataset>,
    /// Upper bound for any requested row limit
    pub max_query_rows: u64,
}

impl AppState {
    fn dataset(&self, name: &str) -> Result<&Dataset, ApiError> {
        self.datasets
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ApiError::NotFound(format!("Dataset '{}' not found", name)))
    }

    /// Requested limit, capped by the configured maximum
    fn row_ceiling(&self, requested: Option<u64>) -> Result<u64, ApiError> {
        match requested {
            Some(0) => Err(ApiError::BadRequest("row_limit must be at least 1".into())),
            Some(n) => Ok(n.min(self.max_query_rows)),
            None => Ok(self.max_query_rows),
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub datasets: usize,
    pub max_query_rows: u64,
    pub schema_cache: CacheStats,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        datasets: state.datasets.len(),
        max_query_rows: state.max_query_rows,
        schema_cache: state.pipeline.schemas().stats(),
    })
}

// ============================================================================
// Query
// ============================================================================

#[derive(Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Candidate SQL; synthesized from the question when absent
    #[serde(default)]
    pub sql: Option<String>,
    pub dataset: String,
    #[serde(default)]
    pub row_limit: Option<u64>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub sql: String,
    pub repairs: u32,
    pub executions: u32,
    pub execution_time_ms: u64,
    pub history: Vec<PipelineState>,
}

impl From<PipelineOutput> for QueryResponse {
    fn from(output: PipelineOutput) -> Self {
        let rows: Vec<Vec<serde_json::Value>> = output
            .result
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.into_json()).collect())
            .collect();

        Self {
            columns: output.result.columns,
            row_count: rows.len(),
            rows,
            sql: output.final_sql,
            repairs: output.repairs,
            executions: output.executions,
            execution_time_ms: output.result.execution_time_ms,
            history: output.history,
        }
    }
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.question.trim().is_empty() && request.sql.is_none() {
        return Err(ApiError::BadRequest("question or sql is required".into()));
    }

    let dataset = state.dataset(&request.dataset)?;
    let ceiling = state.row_ceiling(request.row_limit)?;

    let output = match &request.sql {
        Some(sql) => {
            state
                .pipeline
                .run(&request.question, sql, dataset, ceiling)
                .await?
        }
        None => state.pipeline.ask(&request.question, dataset, ceiling).await?,
    };

    Ok(Json(output.into()))
}

// ============================================================================
// Validate
// ============================================================================

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub sql: String,
    pub dataset: String,
    #[serde(default)]
    pub row_limit: Option<u64>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    /// Text that would be executed
    pub sql: String,
}

pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let dataset = state.dataset(&request.dataset)?;
    let ceiling = state.row_ceiling(request.row_limit)?;

    let prepared = state.pipeline.preview(&request.sql, dataset, ceiling).await?;

    Ok(Json(ValidateResponse {
        valid: true,
        sql: prepared.sql,
    }))
}

// ============================================================================
// Datasets
// ============================================================================

#[derive(Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<Dataset>,
}

pub async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<DatasetsResponse> {
    Json(DatasetsResponse {
        datasets: state.datasets.clone(),
    })
}

pub async fn dataset_schema(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SchemaDescription>, ApiError> {
    let dataset = state.dataset(&name)?;
    let description = state
        .pipeline
        .schemas()
        .describe(&dataset.namespace)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(Json(description.as_ref().clone()))
}

/// Drop the cached description so the next request reloads the catalog
pub async fn refresh_schema(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let dataset = state.dataset(&name)?;
    state.pipeline.schemas().invalidate(&dataset.namespace).await;
    tracing::info!(dataset = %dataset.name, "Schema description invalidated");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Policy rejection of the candidate
    Rejected(ValidationRejection),
    /// Execution failed after retries and repairs
    ExecutionFailed { failure: ExecutionFailure, repairs: u32 },
    /// A collaborator (synthesizer, catalog) could not be reached
    Unavailable(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Rejected { rejection, .. } => ApiError::Rejected(rejection),
            PipelineError::Failed {
                failure, repairs, ..
            } => ApiError::ExecutionFailed { failure, repairs },
            PipelineError::SynthesisTimeout(failure) => {
                ApiError::ExecutionFailed { failure, repairs: 0 }
            }
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::Rejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({
                    "error": rejection.detail,
                    "reason": rejection.reason.code(),
                    "subject": rejection.reason.subject(),
                }),
            ),
            ApiError::ExecutionFailed { failure, repairs } => (
                if failure.category == FailureCategory::Timeout {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                },
                serde_json::json!({
                    "error": failure.message,
                    "category": failure.category,
                    "retryable": failure.retryable,
                    "repairs": repairs,
                }),
            ),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, serde_json::json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}
