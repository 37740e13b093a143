use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Connector, ExecutionFailure, ExecutionOutcome, RetryPolicy};
use crate::data::Dataset;

/// Bounded execution with local retry of transient failures
#[derive(Clone)]
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute `sql` against `dataset`.
    ///
    /// Retryable failures re-run the identical text up to `max_retries` more
    /// times; fatal failures return immediately.
    pub async fn execute(&self, sql: &str, dataset: &Dataset) -> ExecutionOutcome {
        let mut retry = 0;

        loop {
            let outcome = self.attempt(sql, dataset).await;

            match outcome {
                Err(failure) if failure.retryable && retry < self.retry.max_retries => {
                    retry += 1;
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        dataset = %dataset.name,
                        category = %failure.category,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable execution failure: {}",
                        failure.message
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    tracing::warn!(
                        dataset = %dataset.name,
                        category = %failure.category,
                        retryable = failure.retryable,
                        "Query execution failed: {}",
                        failure.message
                    );
                    return Err(failure);
                }
                Ok(result) => return Ok(result),
            }
        }
    }

    async fn attempt(&self, sql: &str, dataset: &Dataset) -> ExecutionOutcome {
        let start = Instant::now();

        let mut result =
            match tokio::time::timeout(self.timeout, self.connector.run(sql, dataset, self.timeout))
                .await
            {
                Ok(outcome) => outcome?,
                Err(_) => return Err(ExecutionFailure::timeout(self.timeout)),
            };

        result.execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            dataset = %dataset.name,
            rows = result.row_count(),
            elapsed_ms = result.execution_time_ms,
            "Query executed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ResultSet, Value};
    use crate::exec::{FailureCategory, ScriptedConnector};

    fn one_row() -> ResultSet {
        ResultSet::new(vec!["n".into()], vec![vec![Value::Int64(1)]])
    }

    fn executor(connector: Arc<ScriptedConnector>) -> QueryExecutor {
        QueryExecutor::new(connector).with_retry(RetryPolicy::immediate(2))
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.push_failure(ExecutionFailure::new(
            FailureCategory::Connection,
            "connection reset",
        ));
        connector.push_failure(ExecutionFailure::new(
            FailureCategory::Deadlock,
            "deadlock detected",
        ));
        connector.push_result(one_row());

        let result = tokio_test::assert_ok!(
            executor(connector.clone())
                .execute("SELECT 1 LIMIT 10", &Dataset::named("sales"))
                .await
        );

        assert_eq!(result.rows, one_row().rows);
        assert_eq!(connector.executed().len(), 3);
        assert!(connector.executed().iter().all(|sql| sql == "SELECT 1 LIMIT 10"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let connector = Arc::new(ScriptedConnector::new());
        for _ in 0..5 {
            connector.push_failure(ExecutionFailure::new(FailureCategory::Timeout, "timeout"));
        }

        let failure = tokio_test::assert_err!(
            executor(connector.clone())
                .execute("SELECT 1", &Dataset::named("sales"))
                .await
        );

        assert!(failure.retryable);
        assert_eq!(connector.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_failure_is_not_retried() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.push_failure(ExecutionFailure::new(
            FailureCategory::UndefinedObject,
            "column \"revenue\" does not exist",
        ));

        let failure = executor(connector.clone())
            .execute("SELECT revenue FROM sales.orders", &Dataset::named("sales"))
            .await
            .unwrap_err();

        assert!(!failure.retryable);
        assert_eq!(connector.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_retryable_failure() {
        let connector = Arc::new(ScriptedConnector::new().with_delay(Duration::from_millis(200)));
        connector.push_result(one_row());

        let failure = QueryExecutor::new(connector)
            .with_retry(RetryPolicy::default().with_max_retries(0))
            .with_timeout(Duration::from_millis(20))
            .execute("SELECT 1", &Dataset::named("sales"))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Timeout);
        assert!(failure.retryable);
    }
}
