//! Scripted connector for tests and offline demos

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Connector, ExecutionFailure, ExecutionOutcome};
use crate::data::{Dataset, ResultSet};

/// Replays queued outcomes in order and records every statement it receives.
///
/// When the queue runs dry the fallback outcome is returned (an empty result
/// set unless configured otherwise).
#[derive(Default)]
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    fallback: Mutex<Option<ExecutionOutcome>>,
    executed: Mutex<Vec<String>>,
    /// Statements started but not yet answered or dropped
    in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Outcome used once the queue is exhausted
    pub fn with_fallback(self, outcome: ExecutionOutcome) -> Self {
        *self.fallback.lock() = Some(outcome);
        self
    }

    pub fn push_result(&self, result: ResultSet) {
        self.outcomes.lock().push_back(Ok(result));
    }

    pub fn push_failure(&self, failure: ExecutionFailure) {
        self.outcomes.lock().push_back(Err(failure));
    }

    /// Statements received so far, oldest first
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Runs currently holding the connector
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Held for the duration of one run, released on completion or drop
struct Checkout<'a>(&'a AtomicUsize);

impl<'a> Checkout<'a> {
    fn acquire(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn run(&self, sql: &str, _dataset: &Dataset, _timeout: Duration) -> ExecutionOutcome {
        self.executed.lock().push(sql.to_string());
        let _checkout = Checkout::acquire(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.outcomes.lock().pop_front();
        match next {
            Some(outcome) => outcome,
            None => self
                .fallback
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(ResultSet::empty())),
        }
    }
}
