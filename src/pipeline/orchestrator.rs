//! Guarded query pipeline
//!
//! Sanitize, validate, bound and execute one candidate. An execution failure
//! may be handed to the synthesizer for repair; whatever comes back starts
//! over at the sanitizer and is validated exactly like the first candidate.

use std::sync::Arc;
use std::time::Duration;

use super::{PipelineError, PipelineOutput, PipelineState};
use crate::catalog::SchemaCache;
use crate::data::Dataset;
use crate::exec::{ExecutionFailure, FailureCategory, QueryExecutor};
use crate::guard::{
    self, PreparedQuery, QueryValidator, UnqualifiedTablePolicy, ValidationRejection,
};
use crate::synth::QuerySynthesizer;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Synthesizer repairs allowed per invocation
    pub max_repair_attempts: u32,
    /// Bound on each synthesize or repair call
    pub synth_timeout: Duration,
    pub validator: QueryValidator,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 1,
            synth_timeout: Duration::from_secs(30),
            validator: QueryValidator::default(),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    executor: QueryExecutor,
    synthesizer: Arc<dyn QuerySynthesizer>,
    schemas: Arc<SchemaCache>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        executor: QueryExecutor,
        synthesizer: Arc<dyn QuerySynthesizer>,
        schemas: Arc<SchemaCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            executor,
            synthesizer,
            schemas,
            config,
        }
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Describe the schema, synthesize a candidate, then `run` it
    pub async fn ask(
        &self,
        question: &str,
        dataset: &Dataset,
        row_ceiling: u64,
    ) -> Result<PipelineOutput, PipelineError> {
        let schema = self.schemas.describe(&dataset.namespace).await?.render();

        let synthesis = self.synthesizer.synthesize(question, &schema, &dataset.name);

        let candidate = match tokio::time::timeout(self.config.synth_timeout, synthesis).await {
            Ok(candidate) => candidate?,
            Err(_) => {
                let limit_ms = self.config.synth_timeout.as_millis() as u64;
                tracing::warn!(timeout_ms = limit_ms, "Synthesis timed out");
                return Err(PipelineError::SynthesisTimeout(ExecutionFailure::new(
                    FailureCategory::Timeout,
                    format!("Synthesis timed out after {} ms", limit_ms),
                )));
            }
        };

        self.run(question, &candidate, dataset, row_ceiling).await
    }

    /// Sanitize, validate and bound a candidate without executing it
    pub async fn preview(
        &self,
        candidate: &str,
        dataset: &Dataset,
        row_ceiling: u64,
    ) -> Result<PreparedQuery, PipelineError> {
        let dataset = self.resolve_dataset(dataset).await?;
        guard::prepare(candidate, &dataset, &self.config.validator, row_ceiling).map_err(
            |rejection| {
                let history = vec![
                    PipelineState::Received,
                    PipelineState::Sanitized,
                    PipelineState::Failed,
                ];
                rejected(rejection, guard::sanitize(candidate), 0, history)
            },
        )
    }

    /// Drive one candidate to a result set or a terminal failure
    pub async fn run(
        &self,
        question: &str,
        candidate: &str,
        dataset: &Dataset,
        row_ceiling: u64,
    ) -> Result<PipelineOutput, PipelineError> {
        let dataset = self.resolve_dataset(dataset).await?;
        let mut history = vec![PipelineState::Received];
        let mut candidate = candidate.to_string();
        let mut repairs = 0;
        let mut executions = 0;

        tracing::info!(dataset = %dataset.name, row_ceiling, "Running query pipeline");

        loop {
            let sanitized = guard::sanitize(&candidate);
            history.push(PipelineState::Sanitized);

            let validated = match self.config.validator.validate(&sanitized, &dataset) {
                Ok(validated) => validated,
                Err(rejection) => {
                    history.push(PipelineState::Failed);
                    return Err(rejected(rejection, sanitized, repairs, history));
                }
            };
            history.push(PipelineState::Validated);

            let sql = guard::enforce(&validated, row_ceiling);
            history.push(PipelineState::LimitApplied);
            tracing::debug!(sql = %sql, "Executing");

            history.push(PipelineState::Executing);
            executions += 1;

            let failure = match self.executor.execute(&sql, &dataset).await {
                Ok(result) => {
                    history.push(PipelineState::Succeeded);
                    tracing::info!(
                        dataset = %dataset.name,
                        rows = result.row_count(),
                        repairs,
                        "Query succeeded"
                    );
                    return Ok(PipelineOutput {
                        result,
                        final_sql: sql,
                        repairs,
                        executions,
                        history,
                    });
                }
                Err(failure) => failure,
            };

            if repairs >= self.config.max_repair_attempts {
                history.push(PipelineState::Failed);
                return Err(failed(failure, sql, repairs, history));
            }

            history.push(PipelineState::AwaitingRepair);
            match self.request_repair(question, &sql, &failure, &dataset).await {
                Some(repaired) => {
                    repairs += 1;
                    candidate = repaired;
                }
                None => {
                    history.push(PipelineState::Failed);
                    return Err(failed(failure, sql, repairs, history));
                }
            }
        }
    }

    /// Ask the synthesizer for a corrected query; `None` when it cannot help
    async fn request_repair(
        &self,
        question: &str,
        failing_sql: &str,
        failure: &ExecutionFailure,
        dataset: &Dataset,
    ) -> Option<String> {
        let schema = match self.schemas.describe(&dataset.namespace).await {
            Ok(description) => description.render(),
            Err(e) => {
                tracing::warn!("Schema unavailable for repair: {}", e);
                return None;
            }
        };

        let repair = self
            .synthesizer
            .repair(question, failing_sql, &failure.message, &schema);

        match tokio::time::timeout(self.config.synth_timeout, repair).await {
            Ok(Ok(repaired)) => {
                tracing::info!(dataset = %dataset.name, "Received repaired candidate");
                Some(repaired)
            }
            Ok(Err(e)) => {
                tracing::warn!("Repair failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.synth_timeout.as_millis() as u64,
                    "Repair timed out"
                );
                None
            }
        }
    }

    /// Attach the table allowlist when the validator needs it
    async fn resolve_dataset(&self, dataset: &Dataset) -> Result<Dataset, PipelineError> {
        if self.config.validator.unqualified_policy() != UnqualifiedTablePolicy::CheckCatalog
            || dataset.tables.is_some()
        {
            return Ok(dataset.clone());
        }

        let description = self.schemas.describe(&dataset.namespace).await?;
        Ok(dataset.clone().with_tables(description.table_names()))
    }
}

fn rejected(
    rejection: ValidationRejection,
    sql: String,
    repairs: u32,
    history: Vec<PipelineState>,
) -> PipelineError {
    PipelineError::Rejected {
        rejection,
        sql,
        repairs,
        history,
    }
}

fn failed(
    failure: ExecutionFailure,
    sql: String,
    repairs: u32,
    history: Vec<PipelineState>,
) -> PipelineError {
    PipelineError::Failed {
        failure,
        sql,
        repairs,
        history,
    }
}
