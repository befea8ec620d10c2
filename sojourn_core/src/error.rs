//! Error types for the sojourn engine.

use crate::petition::PetitionId;
use thiserror::Error;

/// Errors that can occur while configuring or running a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A rate, capacity, duration or count was out of range
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Arrival rate meets or exceeds total service capacity
    #[error("Unstable queue: arrival rate {arrival_rate} >= service capacity {service_capacity}")]
    Instability {
        arrival_rate: f64,
        service_capacity: f64,
    },

    /// No petition departed before the horizon
    #[error("Trial {trial} produced no completed petitions within {duration} time units")]
    EmptyTrial { trial: usize, duration: f64 },

    /// A delay was negative or not a number
    #[error("Cannot schedule an event {0} time units in the past")]
    NegativeDelay(f64),

    /// A workflow event arrived for a petition in the wrong state
    #[error("{petition} cannot {event} while {state}")]
    InvalidTransition {
        petition: PetitionId,
        state: &'static str,
        event: &'static str,
    },
}

impl SimError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true for errors that abort a whole experiment.
    ///
    /// Empty trials are per-trial conditions and are excluded instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimError::EmptyTrial { .. })
    }
}
