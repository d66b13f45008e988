//! # datachan-dsa: Anti-Replay Window
//!
//! Sliding window over the most recent packet ids of one key generation.

use alloc::vec::Vec;
use core::fmt;

/// Per-id bookkeeping inside the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Unseen,
    /// Accepted at the given local time (seconds).
    Seen(u64),
    /// Aged out by the time backtrack; never acceptable again.
    Expired,
}

static_assertions::const_assert!(core::mem::size_of::<Slot>() <= 16);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayVerdict {
    Accept,
    /// Same id already accepted.
    Replay,
    /// Further behind the highest id than the sequence backtrack allows.
    Backtrack,
    /// Inside the window but the slot aged past the time backtrack.
    Expired,
    /// Long-form sender timestamp older than the current epoch.
    TimeBacktrack,
    /// Id 0 is never emitted by a sender.
    Invalid,
}

impl ReplayVerdict {
    #[inline(always)]
    pub fn is_accept(self) -> bool {
        self == ReplayVerdict::Accept
    }
}

/// A ring of `seq_backtrack + 1` slots indexed by distance from the highest
/// accepted id.
///
/// ## Mechanical Sympathy
/// `test` is a handful of compares and one ring load; it never mutates.
/// `record` touches at most `seq_backtrack + 1` slots when the window slides,
/// and the time-based expiry sweep runs at most once per reap interval.
///
/// Long form: a sender restarts its counter only together with a newer
/// timestamp. A newer timestamp opens a fresh epoch and resets the window;
/// an older one is rejected outright.
pub struct ReplayWindow {
    ring: Vec<Slot>,
    head: usize,
    highest: u32,
    epoch: u32,
    time_backtrack: u64,
    reap_interval: u64,
    last_reap: u64,
}

impl ReplayWindow {
    pub fn new(seq_backtrack: u32, time_backtrack: u32, reap_interval: u32) -> Self {
        let len = seq_backtrack as usize + 1;
        Self {
            ring: alloc::vec![Slot::Unseen; len],
            head: 0,
            highest: 0,
            epoch: 0,
            time_backtrack: time_backtrack as u64,
            reap_interval: reap_interval.max(1) as u64,
            last_reap: 0,
        }
    }

    /// Highest id accepted so far (0 before the first packet).
    pub fn highest(&self) -> u32 {
        self.highest
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of ids, counting the highest, the window can still accept
    /// out of order.
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Lowest id still inside the window.
    pub fn floor(&self) -> u32 {
        self.highest.saturating_sub(self.ring.len() as u32 - 1)
    }

    #[inline(always)]
    fn slot(&self, diff: usize) -> Slot {
        self.ring[(self.head + diff) % self.ring.len()]
    }

    /// Classifies `id`/`time` without recording anything.
    #[inline]
    pub fn test(&self, id: u32, time: u32) -> ReplayVerdict {
        if id == 0 {
            return ReplayVerdict::Invalid;
        }
        if time > self.epoch {
            return ReplayVerdict::Accept;
        }
        if time < self.epoch {
            return ReplayVerdict::TimeBacktrack;
        }
        if id > self.highest {
            return ReplayVerdict::Accept;
        }
        let diff = (self.highest - id) as usize;
        if diff >= self.ring.len() {
            return ReplayVerdict::Backtrack;
        }
        match self.slot(diff) {
            Slot::Unseen => ReplayVerdict::Accept,
            Slot::Seen(_) => ReplayVerdict::Replay,
            Slot::Expired => ReplayVerdict::Expired,
        }
    }

    /// Marks `id` as accepted at local time `now`, sliding the window when
    /// `id` is ahead of it. Callers only record ids that `test` accepted.
    pub fn record(&mut self, id: u32, time: u32, now: u64) {
        if time > self.epoch {
            self.epoch = time;
            self.clear();
            self.highest = id;
            self.ring[self.head] = Slot::Seen(now);
            return;
        }

        let len = self.ring.len();
        if id > self.highest {
            let delta = (id - self.highest) as usize;
            if delta >= len {
                self.clear();
            } else {
                for _ in 0..delta {
                    self.head = (self.head + len - 1) % len;
                    self.ring[self.head] = Slot::Unseen;
                }
            }
            self.highest = id;
            self.ring[self.head] = Slot::Seen(now);
        } else {
            let diff = (self.highest - id) as usize;
            if diff < len {
                self.ring[(self.head + diff) % len] = Slot::Seen(now);
            }
        }
    }

    /// Expires every slot at or behind the newest slot that was accepted
    /// more than `time_backtrack` seconds ago. Rate-limited to one sweep per
    /// reap interval; a zero time backtrack disables expiry.
    pub fn reap(&mut self, now: u64) {
        if self.time_backtrack == 0 || now < self.last_reap + self.reap_interval {
            return;
        }
        self.last_reap = now;

        let mut expire = false;
        let mut expired = 0usize;
        for diff in 0..self.ring.len() {
            let idx = (self.head + diff) % self.ring.len();
            match self.ring[idx] {
                Slot::Expired => break,
                Slot::Seen(t) if !expire && t + self.time_backtrack < now => expire = true,
                _ => {}
            }
            if expire {
                self.ring[idx] = Slot::Expired;
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::trace!("ReplayWindow: expired {} slots behind id {}", expired, self.highest);
        }
    }

    /// Forgets every id. The epoch is kept so an old sender time stays rejected.
    pub fn clear(&mut self) {
        for slot in self.ring.iter_mut() {
            *slot = Slot::Unseen;
        }
        self.head = 0;
        self.highest = 0;
    }
}

impl fmt::Debug for ReplayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayWindow")
            .field("highest", &self.highest)
            .field("floor", &self.floor())
            .field("epoch", &self.epoch)
            .field("capacity", &self.ring.len())
            .finish()
    }
}

#[cfg(kani)]
mod proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(8)]
    fn prove_accepted_id_never_readmitted() {
        let mut window = ReplayWindow::new(4, 0, 1);
        let (first, first_time): (u32, u32) = (kani::any(), kani::any());
        let (second, second_time): (u32, u32) = (kani::any(), kani::any());

        // Ring indexing stays in bounds for any pair of ids, and once
        // recorded an (id, time) is never accepted again.
        if window.test(first, first_time).is_accept() {
            window.record(first, first_time, 0);
        }
        if window.test(second, second_time).is_accept() {
            window.record(second, second_time, 0);
        }
        if first != 0 && first_time == window.epoch() {
            assert!(!window.test(first, first_time).is_accept());
        }
    }
}
