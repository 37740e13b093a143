pub mod classify;
pub mod executor;
pub mod memory;
pub mod postgres;
pub mod retry;

pub use classify::{classify_sqlx, FailureCategory};
pub use executor::QueryExecutor;
pub use memory::ScriptedConnector;
pub use postgres::{connect_pool, PgConnector, PoolSettings};
pub use retry::{Backoff, RetryPolicy};

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::data::{Dataset, ResultSet};

/// Success with a result set, or a classified failure
pub type ExecutionOutcome = Result<ResultSet, ExecutionFailure>;

/// A failed execution: driver message plus whether re-running may help
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
    pub retryable: bool,
    pub category: FailureCategory,
}

impl ExecutionFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: category.is_retryable(),
            category,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FailureCategory::Timeout,
            format!("Query timed out after {} ms", limit.as_millis()),
        )
    }
}

impl From<sqlx::Error> for ExecutionFailure {
    fn from(err: sqlx::Error) -> Self {
        Self::new(classify_sqlx(&err), err.to_string())
    }
}

/// Runs one statement against a dataset and materializes every row
#[async_trait]
pub trait Connector: Send + Sync {
    async fn run(&self, sql: &str, dataset: &Dataset, timeout: Duration) -> ExecutionOutcome;
}
