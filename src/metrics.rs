//! Write-only sink for hyperparameters and per-step scalars.
//!
//! Learners never read from a sink. The default [`TracingSink`] turns every
//! record into a `tracing` event; [`MemorySink`] keeps them for inspection.

use std::sync::{Arc, Mutex};

use tracing::info;

/// Receives named scalar values.
pub trait MetricsSink: Send {
    fn record(&mut self, name: &str, value: f64);
}

/// Emits each record as an `info!` event on the `dstruct::metrics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&mut self, name: &str, value: f64) {
        info!(target: "dstruct::metrics", name, value);
    }
}

/// Collects records in memory. Clones share the same buffer, so a handle kept
/// by the caller observes what a learner writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(String, f64)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record so far, in order.
    pub fn records(&self) -> Vec<(String, f64)> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Values recorded under `name`, in order.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.records()
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, name: &str, value: f64) {
        let mut guard = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((name.to_string(), value));
    }
}

impl<S: MetricsSink + ?Sized> MetricsSink for Box<S> {
    fn record(&mut self, name: &str, value: f64) {
        (**self).record(name, value);
    }
}
