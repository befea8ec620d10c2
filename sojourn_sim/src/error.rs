//! Error types for the experiment harness.

use sojourn_core::SimError;
use thiserror::Error;

/// Errors that abort an experiment run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration, instability or scheduler error from the engine
    #[error(transparent)]
    Sim(#[from] SimError),

    /// Every trial was empty, so there is nothing to report
    #[error("All {0} trials were empty; increase the duration or the arrival rate")]
    NoCompletedTrials(usize),

    /// Writing an export failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export serialization failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A parallel trial task panicked or was cancelled
    #[error("Trial task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl HarnessError {
    /// Returns true if the queue parameters are unstable.
    pub fn is_instability(&self) -> bool {
        matches!(self, HarnessError::Sim(SimError::Instability { .. }))
    }
}
