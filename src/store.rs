//! In-memory vote tally.
//!
//! Provides a thread-safe option -> count map with:
//! - A fixed option set decided at construction
//! - Atomic check-and-increment under a single lock
//! - Consistent snapshots in startup order

use crate::config::normalize_options;
use crate::error::{ConfigError, StoreError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, trace};

/// Counts plus the order options were configured in.
#[derive(Debug)]
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

/// Thread-safe vote tally shared by every worker.
#[derive(Debug)]
pub struct VoteStore {
    tally: Mutex<Tally>,
}

impl VoteStore {
    /// Create a tally with every option at zero.
    ///
    /// Duplicates collapse to one entry; fewer than two distinct options
    /// is a configuration error.
    pub fn new<I>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let order = normalize_options(options)?;
        let counts = order.iter().map(|option| (option.clone(), 0)).collect();

        info!(options = ?order, "Initializing vote tally");
        Ok(Self {
            tally: Mutex::new(Tally { order, counts }),
        })
    }

    /// The tally lock. A worker that panicked mid-request cannot have left a
    /// half-applied increment behind, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time view of every option and its count, in configured order.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let tally = self.lock();
        tally
            .order
            .iter()
            .map(|option| (option.clone(), tally.counts[option]))
            .collect()
    }

    /// Add one vote for `option`, returning the new count.
    ///
    /// Membership check and increment share the critical section; an
    /// unknown option leaves the tally untouched.
    pub fn increment(&self, option: &str) -> Result<u64, StoreError> {
        let mut tally = self.lock();
        let count = tally
            .counts
            .get_mut(option)
            .ok_or_else(|| StoreError::UnknownOption(option.to_string()))?;
        *count += 1;
        let new_count = *count;
        drop(tally);

        trace!(option, count = new_count, "Vote recorded");
        Ok(new_count)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.lock().counts.values().sum()
    }
}
