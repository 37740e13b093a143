//! Scripted synthesizer for tests and offline demos

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{QuerySynthesizer, SynthError};

/// Hands out queued answers and counts how often each operation ran.
/// An exhausted queue answers `SynthError::Empty`.
#[derive(Default)]
pub struct ScriptedSynthesizer {
    syntheses: Mutex<VecDeque<Result<String, String>>>,
    repairs: Mutex<VecDeque<Result<String, String>>>,
    synthesize_calls: AtomicUsize,
    repair_calls: AtomicUsize,
    /// Error text passed to each repair call
    repair_errors: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering, to exercise synthesizer timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn push_synthesis(&self, sql: impl Into<String>) {
        self.syntheses.lock().push_back(Ok(sql.into()));
    }

    pub fn push_repair(&self, sql: impl Into<String>) {
        self.repairs.lock().push_back(Ok(sql.into()));
    }

    /// Queue a repair call that fails with a network error
    pub fn push_repair_failure(&self, message: impl Into<String>) {
        self.repairs.lock().push_back(Err(message.into()));
    }

    pub fn synthesize_calls(&self) -> usize {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    pub fn repair_calls(&self) -> usize {
        self.repair_calls.load(Ordering::SeqCst)
    }

    pub fn repair_errors(&self) -> Vec<String> {
        self.repair_errors.lock().clone()
    }
}

fn next(queue: &Mutex<VecDeque<Result<String, String>>>) -> Result<String, SynthError> {
    match queue.lock().pop_front() {
        Some(Ok(sql)) => Ok(sql),
        Some(Err(message)) => Err(SynthError::Network(message)),
        None => Err(SynthError::Empty),
    }
}

#[async_trait]
impl QuerySynthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        _question: &str,
        _schema_description: &str,
        _dataset_name: &str,
    ) -> Result<String, SynthError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        next(&self.syntheses)
    }

    async fn repair(
        &self,
        _question: &str,
        _failing_sql: &str,
        error: &str,
        _schema_description: &str,
    ) -> Result<String, SynthError> {
        self.repair_calls.fetch_add(1, Ordering::SeqCst);
        self.repair_errors.lock().push(error.to_string());
        self.pause().await;
        next(&self.repairs)
    }
}
