//! Sojourn Core - discrete-event engine for queueing simulations
//!
//! Estimates the time a petition spends in an M/M/c queue by driving
//! petitions through a virtual-clock scheduler:
//! 1. **Clock**: `Scheduler` pops the earliest due event and advances time
//! 2. **Servers**: `QueueingResource` grants slots in strict FIFO order
//! 3. **Workload**: `ArrivalProcess` draws exponential gaps and service times
//! 4. **Trial**: `run_trial` runs one horizon and averages the sojourn times

pub mod clock;
pub mod error;
pub mod petition;
pub mod process;
pub mod resource;
pub mod theory;
pub mod trial;

// Re-export key types for convenience
pub use clock::{Scheduler, SimTime};
pub use error::SimError;
pub use petition::{Petition, PetitionId, PetitionState};
pub use process::ArrivalProcess;
pub use resource::{Grant, QueueingResource, ServerSlot};
pub use theory::{mm1_sojourn, theoretical_sojourn};
pub use trial::{run_trial, Trial, TrialConfig, TrialOutcome, TrialResult};
