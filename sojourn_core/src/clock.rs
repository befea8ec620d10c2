//! The virtual clock and event scheduler.
//!
//! Time only moves when the scheduler dispatches the next due event, so a
//! trial covering thousands of simulated seconds runs as fast as its events
//! can be handled. Events due at the same instant are dispatched in the order
//! they were scheduled.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::{Add, Sub};

/// A point on the virtual timeline, in simulated seconds.
///
/// Equality and ordering both follow `f64::total_cmp`, so `-0.0` sorts
/// before `0.0` and NaN compares equal to itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTime(f64);

impl SimTime {
    /// The start of every trial.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Creates a time value from simulated seconds.
    pub fn new(secs: f64) -> Self {
        Self(secs)
    }

    /// Returns the time in simulated seconds.
    pub fn as_secs(&self) -> f64 {
        self.0
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}s", self.0)
    }
}

/// A pending wake-up.
#[derive(Debug)]
struct Scheduled<E> {
    time: SimTime,
    /// Insertion counter, breaks ties between co-timed events
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl<E> Eq for Scheduled<E> {}
impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<E> Ord for Scheduled<E> {
    // BinaryHeap is a max-heap: the earliest (time, seq) must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Virtual clock plus the ordered set of pending events.
///
/// Generic over the event payload so the scheduler knows nothing about
/// petitions or servers; the owner decides what an event means.
#[derive(Debug)]
pub struct Scheduler<E> {
    /// Current virtual time
    now: SimTime,

    /// Next insertion sequence number
    next_seq: u64,

    /// Pending events, earliest first
    queue: BinaryHeap<Scheduled<E>>,

    /// Number of events dispatched so far
    dispatched: u64,
}

impl<E> Scheduler<E> {
    /// Creates a scheduler at time zero with no pending events.
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            dispatched: 0,
        }
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Returns the number of events waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns the number of events dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Returns the time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|s| s.time)
    }

    /// Schedules `event` to fire `delay` seconds from now.
    ///
    /// # Errors
    /// `SimError::NegativeDelay` if `delay` is negative or NaN.
    pub fn schedule_in(&mut self, delay: f64, event: E) -> Result<SimTime, SimError> {
        if !(delay >= 0.0) {
            return Err(SimError::NegativeDelay(delay));
        }
        let at = self.now + delay;
        self.push(at, event);
        Ok(at)
    }

    /// Schedules `event` at the current instant, behind every event already
    /// due now.
    pub fn schedule_now(&mut self, event: E) {
        self.push(self.now, event);
    }

    fn push(&mut self, time: SimTime, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { time, seq, event });
    }

    /// Pops the earliest event if it is due at or before `limit`, moving the
    /// clock to its timestamp.
    pub fn pop_due(&mut self, limit: SimTime) -> Option<E> {
        match self.queue.peek() {
            Some(next) if next.time <= limit => {}
            _ => return None,
        }
        let next = self.queue.pop()?;
        debug_assert!(next.time >= self.now, "clock moved backwards");
        self.now = next.time;
        self.dispatched += 1;
        Some(next.event)
    }

    /// Dispatches every event due at or before `limit`, then parks the clock
    /// at `limit`.
    ///
    /// `dispatch` receives the scheduler so handlers can schedule follow-up
    /// events. Events beyond the limit stay pending and never fire.
    ///
    /// # Errors
    /// `SimError::Configuration` if `limit` is NaN; otherwise the first
    /// error returned by `dispatch`.
    pub fn advance_to<F>(&mut self, limit: SimTime, mut dispatch: F) -> Result<(), SimError>
    where
        F: FnMut(&mut Self, E) -> Result<(), SimError>,
    {
        if limit.as_secs().is_nan() {
            return Err(SimError::config("cannot advance the clock to NaN"));
        }
        while let Some(event) = self.pop_due(limit) {
            dispatch(self, event)?;
        }
        if self.now < limit {
            self.now = limit;
        }
        Ok(())
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
