//! Live/candidate model pair.
//!
//! Search reads the live model; the trainer mutates the candidate. The only
//! writer of the live slot is promotion, which replaces the whole `Arc`
//! under a write lock, so a reader holding a clone keeps a complete model.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::policy::PolicyError;

use super::traits::PolicyValueModel;

/// Shared handle to an immutable model used for prediction.
pub type SharedModel = Arc<dyn PolicyValueModel>;

/// The live model used for decisions and the candidate being trained.
pub struct ModelPair {
    live: RwLock<SharedModel>,
    candidate: Mutex<Box<dyn PolicyValueModel>>,
}

impl ModelPair {
    /// Start from a candidate; the live model is a snapshot of it.
    pub fn new(candidate: Box<dyn PolicyValueModel>) -> Self {
        let live: SharedModel = Arc::from(candidate.boxed_clone());
        Self::with_live(live, candidate)
    }

    /// Build a pair from explicit live and candidate models.
    pub fn with_live(live: SharedModel, candidate: Box<dyn PolicyValueModel>) -> Self {
        Self {
            live: RwLock::new(live),
            candidate: Mutex::new(candidate),
        }
    }

    /// Current live model.
    pub fn live(&self) -> Result<SharedModel, PolicyError> {
        self.live
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| PolicyError::LockPoisoned("live model"))
    }

    /// Exclusive access to the candidate for a training step.
    pub fn candidate(&self) -> Result<MutexGuard<'_, Box<dyn PolicyValueModel>>, PolicyError> {
        self.candidate
            .lock()
            .map_err(|_| PolicyError::LockPoisoned("candidate model"))
    }

    /// Frozen copy of the candidate as it is right now.
    pub fn snapshot_candidate(&self) -> Result<SharedModel, PolicyError> {
        let candidate = self.candidate()?;
        Ok(Arc::from(candidate.boxed_clone()))
    }

    /// Make `model` the live model. The previous live model is dropped once
    /// in-flight readers release their clones.
    pub fn promote(&self, model: SharedModel) -> Result<(), PolicyError> {
        let mut live = self
            .live
            .write()
            .map_err(|_| PolicyError::LockPoisoned("live model"))?;
        *live = model;
        Ok(())
    }
}

impl std::fmt::Debug for ModelPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPair")
            .field("live_action_space", &self.live().map(|m| m.action_space()).ok())
            .finish_non_exhaustive()
    }
}
