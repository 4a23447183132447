//! Background trainer draining the replay buffer into the candidate model.
//!
//! ```text
//! Idle -> WaitingForData -> Training <-> Checkpointing -> Stopped(reason)
//! ```
//!
//! The trainer talks to search only through the replay buffer, the
//! readiness latch and its stop flag. A failing model call ends the trainer
//! (logged at error level) and never the host process.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::core::GameRng;
use crate::mcts::PolicyConfig;
use crate::nn::ModelPair;
use crate::policy::PolicyError;

use super::replay::ReplayBuffer;

/// Why the trainer stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The stop flag was cleared.
    Cancelled,
    /// A model call, lock, or the model itself failed.
    Failed(String),
}

/// Trainer lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    WaitingForData,
    Training,
    Checkpointing,
    Stopped(StopReason),
}

/// Summary returned when the trainer thread ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainingReport {
    /// Value of the shared step counter at exit.
    pub steps: u64,
    /// Checkpoint tags saved by this run, in order.
    pub checkpoints: Vec<String>,
    pub stop: StopReason,
}

/// First checkpoint boundary strictly after `steps`. Boundaries are
/// `1, 1 + interval, 1 + 2 * interval, ...`.
fn next_boundary(steps: u64, interval: u64) -> u64 {
    if steps < 1 {
        1
    } else {
        1 + ((steps - 1) / interval + 1) * interval
    }
}

/// Training loop state, moved onto the trainer thread.
pub struct TrainingCoordinator {
    replay: Arc<ReplayBuffer>,
    models: Arc<ModelPair>,
    optimize: Arc<AtomicBool>,
    steps: Arc<AtomicU64>,
    state: Arc<Mutex<TrainerState>>,
    rng: GameRng,
    batch_size: usize,
    checkpoint_interval: u64,
    next_checkpoint: u64,
}

impl TrainingCoordinator {
    /// Create a coordinator. `steps` is shared so a restarted trainer
    /// continues the same step count and checkpoint schedule.
    pub fn new(
        replay: Arc<ReplayBuffer>,
        models: Arc<ModelPair>,
        config: &PolicyConfig,
        rng: GameRng,
        steps: Arc<AtomicU64>,
    ) -> Self {
        let next_checkpoint = next_boundary(steps.load(Ordering::Acquire), config.checkpoint_interval);
        Self {
            replay,
            models,
            optimize: Arc::new(AtomicBool::new(true)),
            steps,
            state: Arc::new(Mutex::new(TrainerState::Idle)),
            rng,
            batch_size: config.batch_size,
            checkpoint_interval: config.checkpoint_interval,
            next_checkpoint,
        }
    }

    /// Start the trainer thread.
    pub fn spawn(self) -> Result<TrainerHandle, PolicyError> {
        let optimize = Arc::clone(&self.optimize);
        let replay = Arc::clone(&self.replay);
        let state = Arc::clone(&self.state);
        let steps = Arc::clone(&self.steps);

        let thread = thread::Builder::new()
            .name("replay-trainer".into())
            .spawn(move || self.run())
            .map_err(PolicyError::TrainerSpawn)?;

        Ok(TrainerHandle {
            optimize,
            replay,
            state,
            steps,
            thread: Some(thread),
        })
    }

    fn set_state(&self, next: TrainerState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn run(mut self) -> TrainingReport {
        info!(batch_size = self.batch_size, "starting training thread");
        let mut checkpoints = Vec::new();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.train(&mut checkpoints)));
        let stop = match outcome {
            Ok(Ok(())) => StopReason::Cancelled,
            Ok(Err(err)) => StopReason::Failed(err.to_string()),
            Err(_) => StopReason::Failed("model panicked during training".into()),
        };

        let steps = self.steps.load(Ordering::Acquire);
        match &stop {
            StopReason::Cancelled => info!(steps, "training thread stopped"),
            StopReason::Failed(reason) => error!(steps, %reason, "training thread crashed"),
        }

        self.optimize.store(false, Ordering::Release);
        self.set_state(TrainerState::Stopped(stop.clone()));
        TrainingReport {
            steps,
            checkpoints,
            stop,
        }
    }

    fn train(&mut self, checkpoints: &mut Vec<String>) -> Result<(), PolicyError> {
        self.set_state(TrainerState::WaitingForData);
        debug!("waiting for replay data");
        if !self.replay.wait_ready(&self.optimize)? {
            return Ok(());
        }

        self.set_state(TrainerState::Training);
        while self.optimize.load(Ordering::Acquire) {
            let Some(batch) = self.replay.sample_batch(self.batch_size, &mut self.rng)? else {
                warn!("replay buffer ready but empty");
                return Ok(());
            };

            let epoch = self.steps.load(Ordering::Acquire);
            let diagnostics = self.models.candidate()?.fit(&batch, epoch)?;
            debug!(
                step = epoch,
                loss = diagnostics.loss,
                policy_loss = diagnostics.policy_loss,
                value_loss = diagnostics.value_loss,
                "training step"
            );

            let step = self.steps.fetch_add(1, Ordering::AcqRel) + 1;
            if step >= self.next_checkpoint {
                self.checkpoint(step, checkpoints)?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, step: u64, checkpoints: &mut Vec<String>) -> Result<(), PolicyError> {
        self.set_state(TrainerState::Checkpointing);
        let tag = format!("checkpoint-{step}");
        self.models.candidate()?.save(&tag)?;
        info!(step, %tag, "saved candidate checkpoint");

        checkpoints.push(tag);
        self.next_checkpoint += self.checkpoint_interval;
        self.set_state(TrainerState::Training);
        Ok(())
    }
}

/// Handle to a running trainer. Dropping it stops and joins the thread.
pub struct TrainerHandle {
    optimize: Arc<AtomicBool>,
    replay: Arc<ReplayBuffer>,
    state: Arc<Mutex<TrainerState>>,
    steps: Arc<AtomicU64>,
    thread: Option<JoinHandle<TrainingReport>>,
}

impl TrainerHandle {
    /// Request a cooperative stop. Observed before the next training step,
    /// or immediately while waiting for data.
    pub fn stop(&self) {
        self.optimize.store(false, Ordering::Release);
        self.replay.notify_waiters();
    }

    /// Wait for the trainer to finish.
    pub fn join(mut self) -> TrainingReport {
        self.join_thread()
    }

    fn join_thread(&mut self) -> TrainingReport {
        let Some(thread) = self.thread.take() else {
            return TrainingReport {
                steps: self.steps(),
                checkpoints: Vec::new(),
                stop: StopReason::Cancelled,
            };
        };

        thread.join().unwrap_or_else(|_| {
            let stop = StopReason::Failed("training thread panicked".into());
            if let Ok(mut state) = self.state.lock() {
                *state = TrainerState::Stopped(stop.clone());
            }
            TrainingReport {
                steps: self.steps(),
                checkpoints: Vec::new(),
                stop,
            }
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TrainerState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(TrainerState::Stopped(StopReason::Failed("state lock poisoned".into())))
    }

    /// Training steps completed so far.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    /// Is the trainer thread still alive?
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TrainerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            let _ = self.join_thread();
        }
    }
}

impl std::fmt::Debug for TrainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainerHandle")
            .field("state", &self.state())
            .field("steps", &self.steps())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_boundaries() {
        assert_eq!(next_boundary(0, 1000), 1);
        assert_eq!(next_boundary(1, 1000), 1001);
        assert_eq!(next_boundary(1000, 1000), 1001);
        assert_eq!(next_boundary(1001, 1000), 2001);
        assert_eq!(next_boundary(0, 3), 1);
        assert_eq!(next_boundary(4, 3), 7);
    }
}
