//! Fixed-capacity replay buffer shared by search and the trainer.
//!
//! Three parallel containers (states, policy targets, rewards) are written
//! circularly at `writes % capacity`. Writes and batch sampling take the
//! same lock, so a sample is never observed half-written. Readiness is a
//! one-way latch: it flips the first time the write count reaches the
//! training threshold and is never cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::GameRng;
use crate::mcts::ConfigError;
use crate::nn::{EncodedState, TrainingBatch};
use crate::policy::PolicyError;

/// How long a waiting trainer sleeps between checks of its stop flag.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// A single stored sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplaySample {
    pub state: EncodedState,
    /// Per-action edge values of the node the sample came from.
    pub policy: Vec<f32>,
    pub reward: f32,
}

struct Slots {
    states: Vec<EncodedState>,
    policies: Vec<Vec<f32>>,
    rewards: Vec<f32>,
    writes: u64,
}

/// Bounded, thread-safe sample store with readiness gating.
pub struct ReplayBuffer {
    slots: Mutex<Slots>,
    ready: Mutex<bool>,
    ready_cvar: Condvar,
    capacity: usize,
    min_train_capacity: usize,
}

impl ReplayBuffer {
    /// Preallocate `capacity` zeroed samples of the given shapes.
    ///
    /// `capacity` must be non-zero and `min_train_capacity` in
    /// `1..=capacity`, otherwise the buffer could never become ready.
    pub fn new(
        capacity: usize,
        min_train_capacity: usize,
        state_shape: &[usize],
        action_space: usize,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::invalid("replay_capacity", "must be > 0"));
        }
        if !(1..=capacity).contains(&min_train_capacity) {
            return Err(ConfigError::invalid(
                "min_train_capacity",
                format!("must be in 1..={capacity}"),
            ));
        }

        let slots = Slots {
            states: vec![EncodedState::zeros(state_shape.to_vec()); capacity],
            policies: vec![vec![0.0; action_space]; capacity],
            rewards: vec![0.0; capacity],
            writes: 0,
        };
        Ok(Self {
            slots: Mutex::new(slots),
            ready: Mutex::new(false),
            ready_cvar: Condvar::new(),
            capacity,
            min_train_capacity,
        })
    }

    fn slots(&self) -> Result<MutexGuard<'_, Slots>, PolicyError> {
        self.slots
            .lock()
            .map_err(|_| PolicyError::LockPoisoned("replay buffer"))
    }

    fn ready_flag(&self) -> Result<MutexGuard<'_, bool>, PolicyError> {
        self.ready
            .lock()
            .map_err(|_| PolicyError::LockPoisoned("replay readiness"))
    }

    /// Store one sample, overwriting the oldest slot once full.
    ///
    /// Returns `true` only on the call that made the buffer ready.
    pub fn append(
        &self,
        state: EncodedState,
        policy: Vec<f32>,
        reward: f32,
    ) -> Result<bool, PolicyError> {
        let mut slots = self.slots()?;
        let slot = (slots.writes % self.capacity as u64) as usize;
        slots.states[slot] = state;
        slots.policies[slot] = policy;
        slots.rewards[slot] = reward;
        slots.writes += 1;

        if slots.writes < self.min_train_capacity as u64 {
            return Ok(false);
        }

        let mut ready = self.ready_flag()?;
        if *ready {
            return Ok(false);
        }
        *ready = true;
        self.ready_cvar.notify_all();
        info!(
            writes = slots.writes,
            capacity = self.capacity,
            "replay buffer ready for training"
        );
        Ok(true)
    }

    /// Has the buffer reached its training threshold?
    ///
    /// Reads as not ready once the readiness lock is poisoned; fallible
    /// callers see `LockPoisoned` from [`wait_ready`](Self::wait_ready).
    pub fn is_ready(&self) -> bool {
        self.ready.lock().map(|r| *r).unwrap_or(false)
    }

    /// Block until ready or until `optimize` is cleared.
    ///
    /// Returns `true` when the buffer is ready, `false` when cancelled.
    pub fn wait_ready(&self, optimize: &AtomicBool) -> Result<bool, PolicyError> {
        let mut ready = self.ready_flag()?;
        while !*ready {
            if !optimize.load(Ordering::Acquire) {
                return Ok(false);
            }
            let (guard, _) = self
                .ready_cvar
                .wait_timeout(ready, WAIT_POLL)
                .map_err(|_| PolicyError::LockPoisoned("replay readiness"))?;
            ready = guard;
        }
        Ok(true)
    }

    /// Wake any thread blocked in [`wait_ready`](Self::wait_ready) so it
    /// re-checks its stop flag.
    pub fn notify_waiters(&self) {
        self.ready_cvar.notify_all();
    }

    /// Draw `batch_size` samples uniformly with replacement from the live
    /// range `[0, min(writes, capacity))`. `None` while empty.
    pub fn sample_batch(
        &self,
        batch_size: usize,
        rng: &mut GameRng,
    ) -> Result<Option<TrainingBatch>, PolicyError> {
        let slots = self.slots()?;
        let live = live_len(slots.writes, self.capacity);
        if live == 0 || batch_size == 0 {
            return Ok(None);
        }

        let indices: Vec<usize> = (0..batch_size).map(|_| rng.gen_range_usize(0..live)).collect();
        let batch = TrainingBatch {
            states: indices.iter().map(|&i| slots.states[i].clone()).collect(),
            policies: indices.iter().map(|&i| slots.policies[i].clone()).collect(),
            rewards: indices.iter().map(|&i| slots.rewards[i]).collect(),
            indices,
        };
        Ok(Some(batch))
    }

    /// Sample stored in `slot`, if that slot has been written.
    pub fn get(&self, slot: usize) -> Result<Option<ReplaySample>, PolicyError> {
        let slots = self.slots()?;
        if slot >= live_len(slots.writes, self.capacity) {
            return Ok(None);
        }
        Ok(Some(ReplaySample {
            state: slots.states[slot].clone(),
            policy: slots.policies[slot].clone(),
            reward: slots.rewards[slot],
        }))
    }

    /// Number of live samples. A poisoned buffer reads as empty, while
    /// `append`, `sample_batch` and `get` report `LockPoisoned`.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|s| live_len(s.writes, self.capacity))
            .unwrap_or(0)
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total appends since creation, 0 if the buffer lock is poisoned.
    pub fn writes(&self) -> u64 {
        self.slots.lock().map(|s| s.writes).unwrap_or(0)
    }

    /// Maximum number of live samples.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes needed before the buffer reports ready.
    #[must_use]
    pub fn min_train_capacity(&self) -> usize {
        self.min_train_capacity
    }
}

impl std::fmt::Debug for ReplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayBuffer")
            .field("capacity", &self.capacity)
            .field("min_train_capacity", &self.min_train_capacity)
            .field("writes", &self.writes())
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn live_len(writes: u64, capacity: usize) -> usize {
    writes.min(capacity as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn state(v: f32) -> EncodedState {
        EncodedState::new(vec![v, v], vec![2])
    }

    fn buffer(capacity: usize, min: usize) -> ReplayBuffer {
        ReplayBuffer::new(capacity, min, &[2], 3).unwrap()
    }

    #[test]
    fn test_readiness_flips_once_on_threshold() {
        let replay = buffer(10, 5);

        let flips: Vec<bool> = (0..12)
            .map(|i| replay.append(state(i as f32), vec![0.0; 3], 0.0).unwrap())
            .collect();

        assert_eq!(flips.iter().filter(|&&f| f).count(), 1);
        assert!(flips[4]);
        assert!(replay.is_ready());
    }

    #[test]
    fn test_rejects_unusable_capacities() {
        let invalid_field = |capacity, min| match ReplayBuffer::new(capacity, min, &[1], 1) {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        };

        assert_eq!(invalid_field(0, 0), Some("replay_capacity"));
        assert_eq!(invalid_field(0, 1), Some("replay_capacity"));
        assert_eq!(invalid_field(4, 0), Some("min_train_capacity"));
        assert_eq!(invalid_field(4, 5), Some("min_train_capacity"));
        assert_eq!(invalid_field(4, 4), None);
        assert_eq!(invalid_field(1, 1), None);
    }

    #[test]
    fn test_smallest_buffer_ready_on_first_append() {
        let replay = ReplayBuffer::new(1, 1, &[2], 3).unwrap();
        assert!(replay.append(state(1.0), vec![0.0; 3], 1.0).unwrap());
        assert!(!replay.append(state(2.0), vec![0.0; 3], 2.0).unwrap());
        assert_eq!(replay.get(0).unwrap().unwrap().reward, 2.0);
    }

    #[test]
    fn test_poisoned_buffer() {
        let replay = Arc::new(buffer(4, 2));
        replay.append(state(1.0), vec![0.0; 3], 1.0).unwrap();

        let poisoner = {
            let replay = Arc::clone(&replay);
            thread::spawn(move || {
                let _slots = replay.slots.lock().unwrap();
                panic!("poison the replay lock");
            })
        };
        assert!(poisoner.join().is_err());

        // Accessors fall back, fallible operations report the poisoning.
        assert_eq!(replay.len(), 0);
        assert_eq!(replay.writes(), 0);
        assert!(matches!(
            replay.append(state(2.0), vec![0.0; 3], 2.0),
            Err(PolicyError::LockPoisoned("replay buffer"))
        ));
        assert!(matches!(
            replay.sample_batch(1, &mut GameRng::new(1)),
            Err(PolicyError::LockPoisoned(_))
        ));
        assert!(matches!(replay.get(0), Err(PolicyError::LockPoisoned(_))));
    }

    #[test]
    fn test_not_ready_before_threshold() {
        let replay = buffer(10, 5);
        for i in 0..4 {
            replay.append(state(i as f32), vec![0.0; 3], 0.0).unwrap();
        }
        assert!(!replay.is_ready());
        assert_eq!(replay.len(), 4);
    }

    #[test]
    fn test_wraps_over_oldest_slot() {
        let replay = buffer(4, 2);
        for i in 0..6 {
            replay.append(state(i as f32), vec![i as f32; 3], i as f32).unwrap();
        }

        assert_eq!(replay.len(), 4);
        assert_eq!(replay.writes(), 6);
        // Writes 4 and 5 landed in slots 0 and 1.
        assert_eq!(replay.get(0).unwrap().unwrap().reward, 4.0);
        assert_eq!(replay.get(1).unwrap().unwrap().state, state(5.0));
        assert_eq!(replay.get(2).unwrap().unwrap().reward, 2.0);
        assert!(replay.get(4).unwrap().is_none());
    }

    #[test]
    fn test_sample_batch_from_live_range() {
        let replay = buffer(10, 1);
        assert!(replay.sample_batch(4, &mut GameRng::new(1)).unwrap().is_none());

        replay.append(state(1.0), vec![1.0; 3], 1.0).unwrap();
        replay.append(state(2.0), vec![2.0; 3], 2.0).unwrap();

        let batch = replay.sample_batch(16, &mut GameRng::new(3)).unwrap().unwrap();
        assert_eq!(batch.len(), 16);
        assert!(batch.indices.iter().all(|&i| i < 2));
        for (i, &slot) in batch.indices.iter().enumerate() {
            assert_eq!(batch.rewards[i], slot as f32 + 1.0);
            assert_eq!(batch.policies[i], vec![slot as f32 + 1.0; 3]);
        }
    }

    #[test]
    fn test_wait_ready_cancelled() {
        let replay = buffer(4, 2);
        let optimize = AtomicBool::new(false);
        assert!(!replay.wait_ready(&optimize).unwrap());
    }

    #[test]
    fn test_wait_ready_wakes_on_append() {
        let replay = Arc::new(buffer(4, 2));
        let optimize = Arc::new(AtomicBool::new(true));

        let waiter = {
            let replay = Arc::clone(&replay);
            let optimize = Arc::clone(&optimize);
            thread::spawn(move || replay.wait_ready(&optimize).unwrap())
        };

        replay.append(state(0.0), vec![0.0; 3], 0.0).unwrap();
        replay.append(state(1.0), vec![0.0; 3], 0.0).unwrap();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_concurrent_reads_see_whole_samples() {
        let replay = Arc::new(ReplayBuffer::new(8, 1, &[4], 4).unwrap());
        replay.append(EncodedState::new(vec![0.0; 4], vec![4]), vec![0.0; 4], 0.0).unwrap();

        let reader = {
            let replay = Arc::clone(&replay);
            thread::spawn(move || {
                let mut rng = GameRng::new(5);
                for _ in 0..200 {
                    let batch = replay.sample_batch(8, &mut rng).unwrap().unwrap();
                    for (i, s) in batch.states.iter().enumerate() {
                        // Every element of a sample comes from the same write.
                        let v = s.tensor[0];
                        assert!(s.tensor.iter().all(|&x| x == v));
                        assert!(batch.policies[i].iter().all(|&x| x == v));
                        assert_eq!(batch.rewards[i], v);
                    }
                }
            })
        };

        for i in 1..500 {
            let v = i as f32;
            replay
                .append(EncodedState::new(vec![v; 4], vec![4]), vec![v; 4], v)
                .unwrap();
        }
        reader.join().unwrap();
    }
}
