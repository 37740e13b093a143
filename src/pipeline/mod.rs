pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineConfig};

use serde::Serialize;

use crate::catalog::CatalogError;
use crate::data::ResultSet;
use crate::exec::ExecutionFailure;
use crate::guard::ValidationRejection;
use crate::synth::SynthError;

/// Steps one invocation passes through, recorded in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Sanitized,
    Validated,
    LimitApplied,
    Executing,
    AwaitingRepair,
    Succeeded,
    Failed,
}

/// A successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub result: ResultSet,
    /// The text that produced `result`
    pub final_sql: String,
    pub repairs: u32,
    /// Execution attempts, not counting local retries
    pub executions: u32,
    pub history: Vec<PipelineState>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Terminal policy rejection. Never sent for repair.
    #[error("Query rejected: {rejection}")]
    Rejected {
        rejection: ValidationRejection,
        /// Sanitized text that was rejected
        sql: String,
        repairs: u32,
        history: Vec<PipelineState>,
    },

    /// Execution kept failing; carries the most recent failure
    #[error("Query failed after {repairs} repair attempt(s): {failure}")]
    Failed {
        failure: ExecutionFailure,
        sql: String,
        repairs: u32,
        history: Vec<PipelineState>,
    },

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthError),

    /// The synthesizer missed its deadline; a retryable timeout failure
    #[error("Synthesis failed: {0}")]
    SynthesisTimeout(ExecutionFailure),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl PipelineError {
    pub fn history(&self) -> &[PipelineState] {
        match self {
            PipelineError::Rejected { history, .. } | PipelineError::Failed { history, .. } => {
                history
            }
            _ => &[],
        }
    }
}
