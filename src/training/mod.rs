//! Training infrastructure: replay storage, background trainer, promotion.
//!
//! ## Overview
//!
//! - **ReplayBuffer**: fixed-capacity circular sample store written by
//!   `update` and sampled by the trainer
//! - **TrainingCoordinator**: background thread fitting the candidate model
//!   and saving checkpoints
//! - **Evaluation**: tournament between live and candidate models, with
//!   atomic promotion of the winner
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcts_policy::policy::PolicyManager;
//!
//! let mut manager = PolicyManager::neural(model, &env, config.with_training(true))?;
//! // ... search, calling manager.update(node, reward) after each game ...
//! let outcome = manager.as_neural_mut().unwrap().evaluation()?;
//! ```

pub mod coordinator;
pub mod evaluation;
pub mod replay;

// Re-export main types
pub use coordinator::{StopReason, TrainerHandle, TrainerState, TrainingCoordinator, TrainingReport};
pub use evaluation::{
    run_promotion, PromotionOutcome, Tournament, TournamentError, TournamentRecord, CANDIDATE_SEAT,
};
pub use replay::{ReplayBuffer, ReplaySample};
