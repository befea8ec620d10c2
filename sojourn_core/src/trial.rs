//! The Trial Runner: one clock, one server pool, one arrival stream.
//!
//! Each arrival becomes a workflow that walks
//! `Arrived -> WaitingForServer -> InService -> Departed`. Suspension points
//! are explicit events on the scheduler:
//! - `Arrival`: the arrival stream wakes up, creates a petition and requests a server
//! - `Resume`: a petition that was granted a server starts its service delay
//! - `Departure`: service finished, the server is released and the sojourn recorded
//!
//! Grants always resume through the event queue at the current instant, so a
//! petition handed a server by a release runs only after every event that
//! was already due at that instant.

use crate::clock::{Scheduler, SimTime};
use crate::error::SimError;
use crate::petition::{Petition, PetitionId, PetitionState};
use crate::process::ArrivalProcess;
use crate::resource::{Grant, QueueingResource, ServerSlot};
use crate::theory::theoretical_sojourn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Parameters of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    /// λ, petitions per second
    pub arrival_rate: f64,

    /// μ, petitions per second per server
    pub service_rate: f64,

    /// Number of identical servers
    pub num_servers: usize,

    /// Virtual-time horizon in seconds
    pub duration: f64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            arrival_rate: 20.0,
            service_rate: 50.0,
            num_servers: 1,
            duration: 350.0,
        }
    }
}

impl TrialConfig {
    /// Builds a config from the mean inter-arrival time and the mean service
    /// time (e.g. 0.05s and 0.02s for λ=20, μ=50).
    pub fn from_means(mean_inter_arrival: f64, mean_service: f64) -> Self {
        Self {
            arrival_rate: 1.0 / mean_inter_arrival,
            service_rate: 1.0 / mean_service,
            ..Default::default()
        }
    }

    /// Sets λ.
    pub fn with_arrival_rate(mut self, rate: f64) -> Self {
        self.arrival_rate = rate;
        self
    }

    /// Sets μ.
    pub fn with_service_rate(mut self, rate: f64) -> Self {
        self.service_rate = rate;
        self
    }

    /// Sets the server count.
    pub fn with_servers(mut self, servers: usize) -> Self {
        self.num_servers = servers;
        self
    }

    /// Sets the horizon.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    /// Checks that every parameter is positive and finite.
    pub fn validate(&self) -> Result<(), SimError> {
        for (name, value) in [
            ("arrival rate", self.arrival_rate),
            ("service rate", self.service_rate),
            ("duration", self.duration),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.num_servers == 0 {
            return Err(SimError::config("server count must be at least 1"));
        }
        Ok(())
    }

    /// Expected sojourn time for these parameters.
    pub fn theoretical_sojourn(&self) -> Result<f64, SimError> {
        theoretical_sojourn(self.arrival_rate, self.service_rate, self.num_servers)
    }

    /// Mean service time, `1/μ`.
    pub fn mean_service_time(&self) -> f64 {
        1.0 / self.service_rate
    }

    /// Server utilisation `λ / (cμ)`.
    pub fn offered_utilisation(&self) -> f64 {
        self.arrival_rate / (self.num_servers as f64 * self.service_rate)
    }
}

/// Raw data harvested from one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    /// 1-based trial index within its experiment
    pub trial: usize,

    /// Sojourn times in departure order
    pub sojourn_times: Vec<f64>,

    /// Petitions that arrived before the horizon
    pub arrivals: u64,

    /// Petitions still waiting or in service at the horizon
    pub in_system: usize,

    /// Longest wait list observed
    pub max_queue_len: usize,

    /// Integral of busy servers over time
    pub busy_time: f64,

    /// Horizon the trial ran to
    pub duration: f64,

    /// Server count
    pub num_servers: usize,
}

impl TrialOutcome {
    /// Number of petitions that departed before the horizon.
    pub fn departures(&self) -> usize {
        self.sojourn_times.len()
    }

    /// Mean sojourn time, `None` if nothing departed.
    pub fn mean_sojourn(&self) -> Option<f64> {
        if self.sojourn_times.is_empty() {
            return None;
        }
        Some(self.sojourn_times.iter().sum::<f64>() / self.sojourn_times.len() as f64)
    }

    /// Fraction of server capacity that was busy.
    pub fn utilisation(&self) -> f64 {
        self.busy_time / (self.num_servers as f64 * self.duration)
    }

    /// Summarises the outcome.
    ///
    /// # Errors
    /// `SimError::EmptyTrial` if no petition departed.
    pub fn summarize(&self) -> Result<TrialResult, SimError> {
        let mean_sojourn = self.mean_sojourn().ok_or(SimError::EmptyTrial {
            trial: self.trial,
            duration: self.duration,
        })?;
        Ok(TrialResult {
            trial: self.trial,
            mean_sojourn,
            departures: self.departures(),
            arrivals: self.arrivals,
            in_system: self.in_system,
            max_queue_len: self.max_queue_len,
            utilisation: self.utilisation(),
        })
    }
}

/// Summary of one trial: the mean sojourn time plus counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// 1-based trial index
    pub trial: usize,

    /// Arithmetic mean of the trial's sojourn times
    pub mean_sojourn: f64,

    /// Completed petitions
    pub departures: usize,

    /// Arrived petitions
    pub arrivals: u64,

    /// Petitions abandoned at the horizon
    pub in_system: usize,

    /// Longest wait list observed
    pub max_queue_len: usize,

    /// Busy server-time over total server-time
    pub utilisation: f64,
}

/// Events driving a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrialEvent {
    Arrival,
    Resume(PetitionId),
    Departure(PetitionId),
}

/// A petition together with where its workflow is.
#[derive(Debug)]
struct Workflow {
    petition: Petition,
    state: PetitionState,
}

/// Everything a trial mutates besides the clock.
struct TrialState<R> {
    resource: QueueingResource,
    process: ArrivalProcess,
    rng: R,

    /// Petitions that have arrived but not departed
    workflows: HashMap<PetitionId, Workflow>,

    /// Completed sojourn times, in departure order
    sojourn_times: Vec<f64>,

    busy_time: f64,
    last_event: SimTime,
}

/// One independent run of the queue up to a fixed horizon.
pub struct Trial<R> {
    config: TrialConfig,
    index: usize,
    scheduler: Scheduler<TrialEvent>,
    state: TrialState<R>,
}

impl<R: Rng> Trial<R> {
    /// Creates a fresh trial drawing all randomness from `rng`.
    pub fn new(config: TrialConfig, rng: R) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            index: 1,
            scheduler: Scheduler::new(),
            state: TrialState {
                resource: QueueingResource::new(config.num_servers)?,
                process: ArrivalProcess::new(config.arrival_rate, config.service_rate)?,
                rng,
                workflows: HashMap::new(),
                sojourn_times: Vec::new(),
                busy_time: 0.0,
                last_event: SimTime::ZERO,
            },
        })
    }

    /// Sets the 1-based index reported in results and errors.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Runs the clock to the horizon and harvests the completed petitions.
    ///
    /// Petitions still queued or in service at the horizon are abandoned and
    /// contribute nothing.
    pub fn run(mut self) -> Result<TrialOutcome, SimError> {
        let horizon = SimTime::new(self.config.duration);

        let first_gap = self.state.process.next_gap(&mut self.state.rng);
        self.scheduler.schedule_in(first_gap, TrialEvent::Arrival)?;

        let state = &mut self.state;
        self.scheduler
            .advance_to(horizon, |scheduler, event| state.dispatch(scheduler, event))?;
        self.state.accrue_busy_time(horizon);

        let outcome = TrialOutcome {
            trial: self.index,
            sojourn_times: self.state.sojourn_times,
            arrivals: self.state.process.spawned(),
            in_system: self.state.workflows.len(),
            max_queue_len: self.state.resource.max_queue_len(),
            busy_time: self.state.busy_time,
            duration: self.config.duration,
            num_servers: self.config.num_servers,
        };
        debug!(
            "trial {}: {} arrivals, {} departures, {} abandoned, {} events",
            outcome.trial,
            outcome.arrivals,
            outcome.departures(),
            outcome.in_system,
            self.scheduler.dispatched()
        );
        Ok(outcome)
    }
}

impl<R: Rng> TrialState<R> {
    fn dispatch(
        &mut self,
        scheduler: &mut Scheduler<TrialEvent>,
        event: TrialEvent,
    ) -> Result<(), SimError> {
        self.accrue_busy_time(scheduler.now());
        match event {
            TrialEvent::Arrival => self.on_arrival(scheduler)?,
            TrialEvent::Resume(id) => self.on_resume(scheduler, id)?,
            TrialEvent::Departure(id) => self.on_departure(scheduler, id)?,
        }
        self.reclaim_servers(scheduler);
        Ok(())
    }

    /// Passes servers whose holder went away without releasing them on to
    /// the next waiters.
    fn reclaim_servers(&mut self, scheduler: &mut Scheduler<TrialEvent>) {
        loop {
            let handed = self.resource.reclaim();
            if handed.is_empty() {
                return;
            }
            warn!("reclaimed {} servers dropped without release", handed.len());
            for (next, slot) in handed {
                self.hand_off(scheduler, next, slot);
            }
        }
    }

    /// Gives `slot` to the waiting petition `next` and wakes it up now.
    fn hand_off(
        &mut self,
        scheduler: &mut Scheduler<TrialEvent>,
        next: PetitionId,
        slot: ServerSlot,
    ) {
        match self.workflows.get_mut(&next) {
            Some(waiter) => {
                debug_assert!(matches!(waiter.state, PetitionState::WaitingForServer));
                waiter.state = PetitionState::InService { slot };
                scheduler.schedule_now(TrialEvent::Resume(next));
            }
            // The dropped slot is reclaimed after this event
            None => warn!("{} left before its grant, returning the server", next),
        }
    }

    fn accrue_busy_time(&mut self, now: SimTime) {
        self.busy_time += self.resource.occupancy() as f64 * (now - self.last_event);
        self.last_event = now;
    }

    fn on_arrival(&mut self, scheduler: &mut Scheduler<TrialEvent>) -> Result<(), SimError> {
        let now = scheduler.now();
        let petition = self.process.next_petition(now, &mut self.rng);
        let id = petition.id;
        trace!("{} arrives at {}", id, now);

        let state = match self.resource.request(id) {
            Grant::Immediate(slot) => {
                scheduler.schedule_now(TrialEvent::Resume(id));
                PetitionState::InService { slot }
            }
            Grant::Queued { position } => {
                trace!("{} waits behind {} others", id, position);
                PetitionState::WaitingForServer
            }
        };
        self.workflows.insert(id, Workflow { petition, state });

        let gap = self.process.next_gap(&mut self.rng);
        scheduler.schedule_in(gap, TrialEvent::Arrival)?;
        Ok(())
    }

    fn on_resume(
        &mut self,
        scheduler: &mut Scheduler<TrialEvent>,
        id: PetitionId,
    ) -> Result<(), SimError> {
        let Some(workflow) = self.workflows.get_mut(&id) else {
            trace!("{} is gone, nothing to resume", id);
            return Ok(());
        };
        if !matches!(workflow.state, PetitionState::InService { .. }) {
            return Err(SimError::InvalidTransition {
                petition: id,
                state: workflow.state.name(),
                event: "start service",
            });
        }

        let now = scheduler.now();
        workflow.petition.start_service(now);
        trace!("{} enters service at {}", id, now);
        scheduler.schedule_in(workflow.petition.service_time, TrialEvent::Departure(id))?;
        Ok(())
    }

    fn on_departure(
        &mut self,
        scheduler: &mut Scheduler<TrialEvent>,
        id: PetitionId,
    ) -> Result<(), SimError> {
        let Some(mut workflow) = self.workflows.remove(&id) else {
            trace!("{} is gone, nothing departs", id);
            return Ok(());
        };
        let now = scheduler.now();

        let slot = match std::mem::replace(&mut workflow.state, PetitionState::Departed) {
            PetitionState::InService { slot } => slot,
            other => {
                return Err(SimError::InvalidTransition {
                    petition: id,
                    state: other.name(),
                    event: "depart",
                })
            }
        };
        if let Some((next, next_slot)) = self.resource.release(slot) {
            self.hand_off(scheduler, next, next_slot);
        }

        let sojourn = workflow.petition.depart(now);
        trace!("{} leaves at {} after {:.5}s", id, now, sojourn);
        self.sojourn_times.push(sojourn);
        Ok(())
    }
}

/// Runs one trial and returns its mean sojourn time.
///
/// # Errors
/// - `SimError::Configuration` for invalid parameters
/// - `SimError::EmptyTrial` if no petition departed before `config.duration`
pub fn run_trial<R: Rng>(config: &TrialConfig, rng: R) -> Result<TrialResult, SimError> {
    Trial::new(*config, rng)?.run()?.summarize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_default_matches_reference_constants() {
        let config = TrialConfig::default();
        assert_eq!(config, TrialConfig::from_means(0.05, 0.02));
        assert_eq!(config.num_servers, 1);
        assert_eq!(config.duration, 350.0);
        assert_relative_eq!(config.mean_service_time(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(config.offered_utilisation(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_non_positive_values() {
        let base = TrialConfig::default();
        assert!(base.validate().is_ok());
        assert!(base.with_arrival_rate(0.0).validate().is_err());
        assert!(base.with_service_rate(-2.0).validate().is_err());
        assert!(base.with_servers(0).validate().is_err());
        assert!(base.with_duration(0.0).validate().is_err());
        assert!(base.with_duration(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_reference_trial_completes() {
        let result = run_trial(&TrialConfig::default(), rng(42)).unwrap();

        assert!(result.departures > 0);
        assert!(result.mean_sojourn.is_finite());
        assert!(result.mean_sojourn > 0.02, "mean sojourn {}", result.mean_sojourn);
        assert_eq!(
            result.arrivals,
            result.departures as u64 + result.in_system as u64
        );
        // ~7000 arrivals at ρ=0.4
        assert!(result.arrivals > 6000 && result.arrivals < 8000);
        assert!((result.utilisation - 0.4).abs() < 0.05);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = TrialConfig::default().with_duration(50.0);
        let a = run_trial(&config, rng(7)).unwrap();
        let b = run_trial(&config, rng(7)).unwrap();
        let c = run_trial(&config, rng(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.mean_sojourn, c.mean_sojourn);
    }

    #[test]
    fn test_empty_trial_is_an_error() {
        // Mean gap of 1000s, horizon of 1ms
        let config = TrialConfig::default()
            .with_arrival_rate(0.001)
            .with_duration(0.001);
        let outcome = Trial::new(config, rng(1)).unwrap().with_index(4).run().unwrap();

        assert_eq!(outcome.departures(), 0);
        assert_eq!(outcome.mean_sojourn(), None);
        assert_eq!(
            outcome.summarize(),
            Err(SimError::EmptyTrial { trial: 4, duration: 0.001 })
        );
    }

    #[test]
    fn test_every_sojourn_covers_its_service() {
        let config = TrialConfig::default().with_duration(20.0);
        let outcome = Trial::new(config, rng(3)).unwrap().run().unwrap();
        assert!(outcome.sojourn_times.iter().all(|&s| s > 0.0));
        assert!(outcome.max_queue_len >= 1);
    }

    #[test]
    fn test_longer_horizon_completes_at_least_as_many() {
        let short = TrialConfig::default().with_duration(10.0);
        let long = short.with_duration(40.0);

        let a = Trial::new(short, rng(11)).unwrap().run().unwrap();
        let b = Trial::new(long, rng(11)).unwrap().run().unwrap();

        assert!(a.departures() <= b.departures());
        // The shorter run is a prefix of the longer one
        assert_eq!(a.sojourn_times[..], b.sojourn_times[..a.departures()]);
    }

    #[test]
    fn test_more_servers_shorten_sojourn() {
        let config = TrialConfig::default()
            .with_arrival_rate(45.0)
            .with_duration(200.0);
        let one = run_trial(&config, rng(5)).unwrap();
        let three = run_trial(&config.with_servers(3), rng(5)).unwrap();
        assert!(three.mean_sojourn < one.mean_sojourn);
        assert!(three.max_queue_len < one.max_queue_len);
    }

    #[test]
    fn test_fifo_departures_with_one_server() {
        // With one server and FIFO grants, departures follow arrival order,
        // so sojourn = departure - arrival is reconstructible in order.
        let config = TrialConfig::default().with_arrival_rate(45.0).with_duration(30.0);
        let mut trial = Trial::new(config, rng(21)).unwrap();
        let horizon = SimTime::new(config.duration);

        let first_gap = trial.state.process.next_gap(&mut trial.state.rng);
        trial.scheduler.schedule_in(first_gap, TrialEvent::Arrival).unwrap();

        let mut departed = Vec::new();
        let state = &mut trial.state;
        trial
            .scheduler
            .advance_to(horizon, |scheduler, event| {
                if let TrialEvent::Departure(id) = event {
                    departed.push(id);
                }
                state.dispatch(scheduler, event)
            })
            .unwrap();

        assert!(departed.len() > 100);
        assert!(departed.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_occupancy_never_exceeds_capacity() {
        let config = TrialConfig::default()
            .with_arrival_rate(90.0)
            .with_servers(2)
            .with_duration(20.0);
        let mut trial = Trial::new(config, rng(2)).unwrap();
        let first_gap = trial.state.process.next_gap(&mut trial.state.rng);
        trial.scheduler.schedule_in(first_gap, TrialEvent::Arrival).unwrap();

        let state = &mut trial.state;
        trial
            .scheduler
            .advance_to(SimTime::new(config.duration), |scheduler, event| {
                state.dispatch(scheduler, event)?;
                let res = &state.resource;
                assert!(res.occupancy() <= res.capacity());
                assert_eq!(res.outstanding_grants(), res.occupancy() as u64);
                let (requests, grants, _) = res.counters();
                assert_eq!(requests, grants + res.queue_len() as u64);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_dropped_slot_does_not_wedge_the_server() {
        let config = TrialConfig::default().with_arrival_rate(30.0).with_duration(40.0);
        let mut trial = Trial::new(config, rng(9)).unwrap();
        let first_gap = trial.state.process.next_gap(&mut trial.state.rng);
        trial.scheduler.schedule_in(first_gap, TrialEvent::Arrival).unwrap();

        // An outside holder takes the only server, then vanishes
        let slot = match trial.state.resource.request(PetitionId(0)) {
            Grant::Immediate(slot) => slot,
            Grant::Queued { .. } => panic!("server should be idle at t=0"),
        };

        let state = &mut trial.state;
        trial
            .scheduler
            .advance_to(SimTime::new(5.0), |scheduler, event| state.dispatch(scheduler, event))
            .unwrap();
        assert!(trial.state.sojourn_times.is_empty());
        assert!(trial.state.resource.queue_len() > 50);

        drop(slot);

        let state = &mut trial.state;
        trial
            .scheduler
            .advance_to(SimTime::new(config.duration), |scheduler, event| {
                state.dispatch(scheduler, event)
            })
            .unwrap();

        let res = &trial.state.resource;
        assert!(trial.state.sojourn_times.len() > 500);
        // Petition 1 arrived near t=0 and waited out the outside holder
        assert!(trial.state.sojourn_times[0] > 4.0);
        assert!(res.occupancy() <= res.capacity());
        assert_eq!(res.outstanding_grants(), res.occupancy() as u64);
    }

    #[test]
    fn test_departure_while_waiting_is_an_error() {
        let mut trial = Trial::new(TrialConfig::default(), rng(1)).unwrap();
        let id = PetitionId(7);
        trial.state.workflows.insert(
            id,
            Workflow {
                petition: Petition::new(id, SimTime::ZERO, 0.1),
                state: PetitionState::WaitingForServer,
            },
        );

        let err = trial
            .state
            .dispatch(&mut trial.scheduler, TrialEvent::Departure(id))
            .unwrap_err();

        assert_eq!(
            err,
            SimError::InvalidTransition {
                petition: id,
                state: "waiting_for_server",
                event: "depart",
            }
        );
        assert_eq!(err.to_string(), "Petition 7 cannot depart while waiting_for_server");
        assert!(trial.state.sojourn_times.is_empty());
    }

    #[test]
    fn test_resume_checks_the_workflow() {
        let mut trial = Trial::new(TrialConfig::default(), rng(1)).unwrap();

        // Unknown petitions were abandoned; nothing to do
        trial
            .state
            .dispatch(&mut trial.scheduler, TrialEvent::Resume(PetitionId(3)))
            .unwrap();
        assert_eq!(trial.scheduler.pending(), 0);

        let id = PetitionId(4);
        trial.state.workflows.insert(
            id,
            Workflow {
                petition: Petition::new(id, SimTime::ZERO, 0.1),
                state: PetitionState::WaitingForServer,
            },
        );
        let err = trial
            .state
            .dispatch(&mut trial.scheduler, TrialEvent::Resume(id))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidTransition { event: "start service", .. }));
        assert_eq!(trial.scheduler.pending(), 0);
    }
}
