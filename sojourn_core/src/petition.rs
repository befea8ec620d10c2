//! Petitions: the units of work flowing through the queue.

use crate::clock::SimTime;
use crate::resource::ServerSlot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal of a petition within its trial (1-based, strictly increasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PetitionId(pub u64);

impl fmt::Display for PetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Petition {}", self.0)
    }
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Petition {
    /// Ordinal within the trial
    pub id: PetitionId,

    /// Clock time at which the petition arrived
    pub arrived_at: SimTime,

    /// Sampled service duration in seconds
    pub service_time: f64,

    /// Clock time at which a server started working on it
    started_at: Option<SimTime>,

    /// Arrival-to-departure time, set once at departure
    sojourn: Option<f64>,
}

impl Petition {
    /// Creates a petition that arrived at `arrived_at`.
    pub fn new(id: PetitionId, arrived_at: SimTime, service_time: f64) -> Self {
        Self {
            id,
            arrived_at,
            service_time,
            started_at: None,
            sojourn: None,
        }
    }

    /// Marks the start of service.
    pub fn start_service(&mut self, now: SimTime) {
        debug_assert!(self.started_at.is_none(), "{} served twice", self.id);
        self.started_at = Some(now);
    }

    /// Records departure and returns the sojourn time.
    ///
    /// The sojourn time is fixed by the first call; later calls return it
    /// unchanged.
    pub fn depart(&mut self, now: SimTime) -> f64 {
        *self.sojourn.get_or_insert(now - self.arrived_at)
    }

    /// Returns the sojourn time once departed.
    pub fn sojourn_time(&self) -> Option<f64> {
        self.sojourn
    }

    /// Returns the time spent waiting for a server, once service started.
    pub fn wait_time(&self) -> Option<f64> {
        self.started_at.map(|start| start - self.arrived_at)
    }

    /// Returns true once the sojourn time has been recorded.
    pub fn has_departed(&self) -> bool {
        self.sojourn.is_some()
    }
}

/// Where a petition's workflow currently is.
///
/// `Arrived -> WaitingForServer -> InService -> Departed`. A petition in
/// service owns the slot of the server it occupies.
#[derive(Debug)]
pub enum PetitionState {
    Arrived,
    WaitingForServer,
    InService { slot: ServerSlot },
    Departed,
}

impl PetitionState {
    /// Returns the state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PetitionState::Arrived => "arrived",
            PetitionState::WaitingForServer => "waiting_for_server",
            PetitionState::InService { .. } => "in_service",
            PetitionState::Departed => "departed",
        }
    }

    /// Returns true for the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PetitionState::Departed)
    }
}
