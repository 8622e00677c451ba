//! Bounded, recyclable integer identifier allocation.
//!
//! Identifiers are positive integers drawn from `1..=max_id`. The pool
//! starts empty and mints a batch of `increment` ids the first time it
//! drains; released ids go back into the pool and are reissued FIFO. Once
//! the whole space has been minted, the only remaining supply is gaps left
//! by released ids, found by a linear scan.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::core::SchedulerError;

/// Identifier handed out by an [`IdPool`], used as a cancellation key.
pub type TaskId = u32;

/// Batch size minted per refill when the configured pair is rejected.
pub const DEFAULT_INCREMENT: u32 = 1_000;

/// Identifier space bound substituted when the configured pair is rejected.
pub const DEFAULT_MAX_ID: u32 = 50_000;

/// Mutable allocator state, guarded by a single mutex.
struct PoolState {
    /// Unused identifiers, reissued oldest first.
    available: VecDeque<TaskId>,
    /// Identifiers issued and not yet returned.
    in_use: HashSet<TaskId>,
    /// Smallest value never yet placed in either collection. Wider than
    /// `TaskId` so it can sit one past a space minted to the full range.
    next_unminted: u64,
}

/// Bounded pool of reusable positive integer identifiers.
///
/// `acquire` and `release` are mutually exclusive through one mutex; both
/// are O(1) outside the refill paths. A rejected sizing pair (zero on
/// either side, or `increment * 2 > max_id`) falls back to
/// [`DEFAULT_INCREMENT`]/[`DEFAULT_MAX_ID`] rather than failing
/// construction.
pub struct IdPool {
    name: String,
    increment: u32,
    max_id: u32,
    state: Mutex<PoolState>,
}

impl IdPool {
    /// Create a pool named `name` drawing ids from `1..=max_id`, minted in
    /// batches of `increment`. Nothing is minted until the first `acquire`.
    pub fn new(name: impl Into<String>, increment: u32, max_id: u32) -> Self {
        let name = name.into();
        let (increment, max_id) =
            if increment == 0 || max_id == 0 || increment.saturating_mul(2) > max_id {
                warn!(
                    "id pool `{}` rejected sizing increment={} max_id={}, using defaults {}/{}",
                    name, increment, max_id, DEFAULT_INCREMENT, DEFAULT_MAX_ID
                );
                (DEFAULT_INCREMENT, DEFAULT_MAX_ID)
            } else {
                (increment, max_id)
            };
        Self {
            name,
            increment,
            max_id,
            state: Mutex::new(PoolState {
                available: VecDeque::with_capacity(increment as usize),
                in_use: HashSet::new(),
                next_unminted: 1,
            }),
        }
    }

    /// Issue an unused identifier and mark it in use.
    ///
    /// Refills the pool when it has drained; fails with
    /// [`SchedulerError::IdsExhausted`] once every id in `1..=max_id` is
    /// issued. The caller must abandon whatever required the id.
    pub fn acquire(&self) -> Result<TaskId, SchedulerError> {
        let mut state = self.state.lock();
        if state.available.is_empty() {
            self.refill(&mut state);
        }
        if let Some(id) = state.available.pop_front() {
            state.in_use.insert(id);
            trace!("id pool `{}` issued {}", self.name, id);
            return Ok(id);
        }
        warn!(
            "id pool `{}` exhausted: {} in use, max {}",
            self.name,
            state.in_use.len(),
            self.max_id
        );
        Err(SchedulerError::IdsExhausted {
            name: self.name.clone(),
            in_use: state.in_use.len(),
            available: state.available.len(),
            max_id: self.max_id,
        })
    }

    /// Return `id` to the pool.
    ///
    /// Silent no-op for ids that are not currently in use; double releases
    /// and unknown ids are expected outcomes of finalize races, not errors.
    pub fn release(&self, id: TaskId) {
        let mut state = self.state.lock();
        if state.in_use.remove(&id) {
            state.available.push_back(id);
            trace!("id pool `{}` recycled {}", self.name, id);
        }
    }

    /// Two-phase refill, called with the pool drained.
    ///
    /// Phase 1 mints monotonically until `increment` ids were added or the
    /// space tops out. Phase 2 only runs once the space has topped out:
    /// a linear scan of `1..=max_id` for a value in neither collection,
    /// appending the first hit. The scan is O(`max_id`) under the pool
    /// lock; accepted, since it is only reached near saturation after the
    /// id space has wrapped once.
    fn refill(&self, state: &mut PoolState) {
        let top = u64::from(self.max_id);
        let mut minted = 0u32;
        while minted < self.increment && state.next_unminted <= top {
            let id = TaskId::try_from(state.next_unminted).unwrap_or(TaskId::MAX);
            state.available.push_back(id);
            state.next_unminted += 1;
            minted += 1;
        }
        if minted > 0 {
            trace!(
                "id pool `{}` minted {} ids, next unminted {}",
                self.name,
                minted,
                state.next_unminted
            );
        }
        if state.next_unminted > top && (state.available.len() as u64) < u64::from(self.increment)
        {
            for candidate in 1..=self.max_id {
                if !state.in_use.contains(&candidate) && !state.available.contains(&candidate) {
                    state.available.push_back(candidate);
                    trace!("id pool `{}` reclaimed gap {}", self.name, candidate);
                    break;
                }
            }
        }
    }

    /// Number of identifiers sitting unused in the pool.
    pub fn pool_size(&self) -> usize {
        self.state.lock().available.len()
    }

    /// Number of identifiers currently issued.
    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use.len()
    }

    /// Pool name, diagnostic only.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective mint batch size after sizing validation.
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Effective upper bound of the id space after sizing validation.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }
}

impl fmt::Debug for IdPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IdPool")
            .field("name", &self.name)
            .field("available", &state.available.len())
            .field("in_use", &state.in_use.len())
            .field("next_unminted", &state.next_unminted)
            .finish()
    }
}
