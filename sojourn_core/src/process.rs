//! Renewal arrival stream with exponential service demands.

use crate::clock::SimTime;
use crate::error::SimError;
use crate::petition::{Petition, PetitionId};
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Generates petitions for one trial.
///
/// Inter-arrival gaps are Exp(λ) and each petition's service time is Exp(μ),
/// all drawn independently from the RNG the caller passes in.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    /// λ, petitions per second
    arrival_rate: f64,

    /// μ, petitions per second per server
    service_rate: f64,

    inter_arrival: Exp<f64>,
    service: Exp<f64>,

    /// Petitions created so far
    spawned: u64,
}

impl ArrivalProcess {
    /// Creates a process with the given arrival and service rates.
    ///
    /// # Errors
    /// `SimError::Configuration` unless both rates are positive and finite.
    pub fn new(arrival_rate: f64, service_rate: f64) -> Result<Self, SimError> {
        let inter_arrival = exp_with_rate("arrival rate", arrival_rate)?;
        let service = exp_with_rate("service rate", service_rate)?;
        Ok(Self {
            arrival_rate,
            service_rate,
            inter_arrival,
            service,
            spawned: 0,
        })
    }

    /// Draws the gap until the next arrival.
    pub fn next_gap<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.inter_arrival.sample(rng)
    }

    /// Creates the next petition, arriving `now`, with a freshly drawn
    /// service time.
    pub fn next_petition<R: Rng + ?Sized>(&mut self, now: SimTime, rng: &mut R) -> Petition {
        self.spawned += 1;
        let service_time = self.service.sample(rng);
        Petition::new(PetitionId(self.spawned), now, service_time)
    }

    /// Returns the number of petitions created so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    /// Returns λ.
    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    /// Returns μ.
    pub fn service_rate(&self) -> f64 {
        self.service_rate
    }
}

fn exp_with_rate(what: &str, rate: f64) -> Result<Exp<f64>, SimError> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(SimError::config(format!("{} must be positive, got {}", what, rate)));
    }
    Exp::new(rate).map_err(|e| SimError::config(format!("{}: {}", what, e)))
}
