//! Pool of identical servers with a FIFO wait list.

use crate::error::SimError;
use crate::petition::PetitionId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Proof that the holder occupies one server.
///
/// Cannot be cloned or built outside this module. The normal way to give
/// the server back is [`QueueingResource::release`], which consumes it. A
/// slot dropped without release is returned to its pool on drop: the pool
/// frees the server on its next request, or hands it to the next waiter in
/// [`QueueingResource::reclaim`].
#[must_use = "a server slot must be handed back with QueueingResource::release"]
#[derive(Debug)]
pub struct ServerSlot {
    /// Sequence number of the grant that produced this slot
    grant: u64,

    /// Drop counter shared with the issuing pool
    returned: Arc<AtomicUsize>,

    released: bool,
}

impl ServerSlot {
    /// Returns the grant sequence number (1-based, in grant order).
    pub fn grant_number(&self) -> u64 {
        self.grant
    }
}

impl PartialEq for ServerSlot {
    fn eq(&self, other: &Self) -> bool {
        self.grant == other.grant && Arc::ptr_eq(&self.returned, &other.returned)
    }
}

impl Eq for ServerSlot {}

impl Drop for ServerSlot {
    fn drop(&mut self) {
        if !self.released {
            self.returned.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Outcome of a server request.
#[derive(Debug)]
pub enum Grant {
    /// A server was free; the caller holds it now
    Immediate(ServerSlot),

    /// All servers busy; the caller waits at `position` (0 = head)
    Queued { position: usize },
}

/// `capacity` identical servers shared by every petition in a trial.
#[derive(Debug)]
pub struct QueueingResource {
    /// Number of servers
    capacity: usize,

    /// Servers granted and not yet released or reclaimed
    occupancy: usize,

    /// Slots dropped without release, not yet reclaimed
    returned: Arc<AtomicUsize>,

    /// Blocked requests, oldest first
    waiting: VecDeque<PetitionId>,

    /// Cumulative requests
    requests: u64,

    /// Cumulative grants (immediate + hand-offs)
    grants: u64,

    /// Cumulative releases, reclaimed slots included
    releases: u64,

    /// Longest wait list observed
    max_queue_len: usize,
}

impl QueueingResource {
    /// Creates a pool of `capacity` idle servers.
    ///
    /// # Errors
    /// `SimError::Configuration` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, SimError> {
        if capacity == 0 {
            return Err(SimError::config("server count must be at least 1"));
        }
        Ok(Self {
            capacity,
            occupancy: 0,
            returned: Arc::new(AtomicUsize::new(0)),
            waiting: VecDeque::new(),
            requests: 0,
            grants: 0,
            releases: 0,
            max_queue_len: 0,
        })
    }

    /// Requests a server for `who`.
    ///
    /// Grants immediately when a server is free, otherwise appends `who` to
    /// the tail of the wait list. Servers of dropped slots count as free
    /// here only while nobody is waiting; otherwise they belong to the head
    /// of the wait list and are handed over by [`reclaim`](Self::reclaim).
    pub fn request(&mut self, who: PetitionId) -> Grant {
        self.requests += 1;
        if self.waiting.is_empty() {
            let _ = self.reclaim();
        }
        if self.occupancy < self.capacity {
            self.occupancy += 1;
            Grant::Immediate(self.issue())
        } else {
            self.waiting.push_back(who);
            self.max_queue_len = self.max_queue_len.max(self.waiting.len());
            Grant::Queued {
                position: self.waiting.len() - 1,
            }
        }
    }

    /// Gives a server back.
    ///
    /// If anyone is waiting, the server passes straight to the head of the
    /// wait list and the new holder is returned together with its slot;
    /// occupancy is unchanged in that case.
    pub fn release(&mut self, mut slot: ServerSlot) -> Option<(PetitionId, ServerSlot)> {
        debug_assert!(
            Arc::ptr_eq(&slot.returned, &self.returned),
            "slot from another pool"
        );
        slot.released = true;
        self.free_one()
    }

    /// Takes back the servers of slots dropped without release.
    ///
    /// Each one goes to the head of the wait list if anyone is waiting; the
    /// new holders are returned in FIFO order. Otherwise the server becomes
    /// idle.
    pub fn reclaim(&mut self) -> Vec<(PetitionId, ServerSlot)> {
        let dropped = self.returned.swap(0, Ordering::Relaxed);
        (0..dropped).filter_map(|_| self.free_one()).collect()
    }

    fn free_one(&mut self) -> Option<(PetitionId, ServerSlot)> {
        self.releases += 1;
        match self.waiting.pop_front() {
            Some(next) => Some((next, self.issue())),
            None => {
                self.occupancy -= 1;
                None
            }
        }
    }

    fn issue(&mut self) -> ServerSlot {
        self.grants += 1;
        ServerSlot {
            grant: self.grants,
            returned: Arc::clone(&self.returned),
            released: false,
        }
    }

    /// Returns the number of servers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of servers currently held by a live slot.
    pub fn occupancy(&self) -> usize {
        self.occupancy - self.returned.load(Ordering::Relaxed)
    }

    /// Returns the number of blocked requests.
    pub fn queue_len(&self) -> usize {
        self.waiting.len()
    }

    /// Returns the longest wait list seen so far.
    pub fn max_queue_len(&self) -> usize {
        self.max_queue_len
    }

    /// Returns true if every server is held.
    pub fn is_saturated(&self) -> bool {
        self.occupancy() == self.capacity
    }

    /// Returns (requests, grants, releases) since creation.
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.requests, self.grants, self.releases)
    }

    /// Returns grants that have not been released yet.
    pub fn outstanding_grants(&self) -> u64 {
        self.grants - self.releases - self.returned.load(Ordering::Relaxed) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u64) -> PetitionId {
        PetitionId(n)
    }

    fn expect_slot(grant: Grant) -> ServerSlot {
        match grant {
            Grant::Immediate(slot) => slot,
            Grant::Queued { position } => panic!("expected a slot, queued at {}", position),
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            QueueingResource::new(0),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_grants_until_saturated() {
        let mut res = QueueingResource::new(2).unwrap();

        let a = expect_slot(res.request(id(1)));
        let b = expect_slot(res.request(id(2)));
        assert!(res.is_saturated());

        match res.request(id(3)) {
            Grant::Queued { position } => assert_eq!(position, 0),
            Grant::Immediate(_) => panic!("third request must wait"),
        }
        match res.request(id(4)) {
            Grant::Queued { position } => assert_eq!(position, 1),
            Grant::Immediate(_) => panic!("fourth request must wait"),
        }
        assert_eq!(res.occupancy(), 2);
        assert_eq!(res.queue_len(), 2);
        assert_eq!(res.max_queue_len(), 2);

        assert_eq!(a.grant_number(), 1);
        assert_eq!(b.grant_number(), 2);
        let _ = res.release(a);
        let _ = res.release(b);
    }

    #[test]
    fn test_release_hands_off_in_fifo_order() {
        let mut res = QueueingResource::new(1).unwrap();
        let first = expect_slot(res.request(id(1)));
        let _ = res.request(id(2));
        let _ = res.request(id(3));

        let (next, slot2) = res.release(first).expect("petition 2 is waiting");
        assert_eq!(next, id(2));
        assert_eq!(res.occupancy(), 1);

        let (next, slot3) = res.release(slot2).expect("petition 3 is waiting");
        assert_eq!(next, id(3));

        assert!(res.release(slot3).is_none());
        assert_eq!(res.occupancy(), 0);
        assert_eq!(res.queue_len(), 0);
    }

    #[test]
    fn test_counters_balance() {
        let mut res = QueueingResource::new(1).unwrap();
        let slot = expect_slot(res.request(id(1)));
        let _ = res.request(id(2));

        let (requests, grants, releases) = res.counters();
        assert_eq!((requests, grants, releases), (2, 1, 0));
        assert_eq!(res.outstanding_grants(), res.occupancy() as u64);
        assert_eq!(requests, grants + res.queue_len() as u64);

        let (_, slot) = res.release(slot).unwrap();
        assert_eq!(res.outstanding_grants(), 1);
        assert!(res.release(slot).is_none());
        assert_eq!(res.counters(), (2, 2, 2));
        assert_eq!(res.outstanding_grants(), 0);
    }

    #[test]
    fn test_dropped_slot_frees_its_server() {
        let mut res = QueueingResource::new(1).unwrap();
        let slot = expect_slot(res.request(id(1)));
        drop(slot);

        assert_eq!(res.occupancy(), 0);
        assert!(!res.is_saturated());
        assert_eq!(res.outstanding_grants(), 0);

        let slot = expect_slot(res.request(id(2)));
        assert_eq!(slot.grant_number(), 2);
        assert_eq!(res.occupancy(), 1);
        assert_eq!(res.counters(), (2, 2, 1));
        assert!(res.release(slot).is_none());
        assert!(res.reclaim().is_empty());
    }

    #[test]
    fn test_dropped_slot_goes_to_head_of_wait_list() {
        let mut res = QueueingResource::new(1).unwrap();
        let slot = expect_slot(res.request(id(1)));
        let _ = res.request(id(2));
        drop(slot);

        // Petition 2 is still ahead of any newcomer
        match res.request(id(3)) {
            Grant::Queued { position } => assert_eq!(position, 1),
            Grant::Immediate(_) => panic!("newcomer jumped the wait list"),
        }

        let mut handed = res.reclaim();
        assert_eq!(handed.len(), 1);
        let (next, slot) = handed.remove(0);
        assert_eq!(next, id(2));
        assert_eq!(res.occupancy(), 1);

        let (next, slot) = res.release(slot).expect("petition 3 is waiting");
        assert_eq!(next, id(3));
        assert!(res.release(slot).is_none());
        assert_eq!(res.occupancy(), 0);
        assert_eq!(res.outstanding_grants(), 0);
    }

    proptest! {
        #[test]
        fn prop_fifo_grants_and_balanced_counters(
            capacity in 1usize..4,
            ops in proptest::collection::vec(any::<bool>(), 1..200),
        ) {
            let mut res = QueueingResource::new(capacity).unwrap();
            let mut held: VecDeque<ServerSlot> = VecDeque::new();
            let mut expected_queue: VecDeque<PetitionId> = VecDeque::new();
            let mut next = 0;

            // true = a new petition requests, false = the oldest holder releases
            for op in ops {
                if op {
                    next += 1;
                    match res.request(id(next)) {
                        Grant::Immediate(slot) => held.push_back(slot),
                        Grant::Queued { position } => {
                            prop_assert_eq!(position, expected_queue.len());
                            expected_queue.push_back(id(next));
                        }
                    }
                } else if let Some(slot) = held.pop_front() {
                    if let Some((who, slot)) = res.release(slot) {
                        prop_assert_eq!(Some(who), expected_queue.pop_front());
                        held.push_back(slot);
                    }
                }

                prop_assert!(res.occupancy() <= res.capacity());
                prop_assert_eq!(res.occupancy(), held.len());
                prop_assert_eq!(res.queue_len(), expected_queue.len());
                let (requests, grants, releases) = res.counters();
                prop_assert_eq!(grants - releases, res.occupancy() as u64);
                prop_assert_eq!(requests, grants + expected_queue.len() as u64);
            }
        }
    }
}
