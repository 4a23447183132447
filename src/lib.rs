//! # mcts-policy
//!
//! Pluggable decision policies for Monte Carlo Tree Search, with a
//! self-improving neural variant.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: The policy layer never interprets rules. An
//!    `Environment` supplies legal actions and sizes; states encode
//!    themselves through `Observation`.
//!
//! 2. **Closed Strategy Set**: `PolicyManager` is an enum of Default (UCB1),
//!    Neural (PUCT over model priors) and Residual (Neural over a factory
//!    built network). Every returned action is a member of the legal set.
//!
//! 3. **Search Never Waits on Training**: The trainer runs on its own thread
//!    and talks to search only through the replay buffer. Promotion swaps the
//!    live model atomically.
//!
//! ## Architecture
//!
//! - **Tree Arena**: Nodes live in a `SearchTree` and own their children
//!   through an action-keyed map. Backpropagation is driven by the caller.
//!
//! - **Live/Candidate Split**: Search predicts with the live model while the
//!   trainer fits the candidate. Evaluation plays them against each other and
//!   promotes a candidate that wins strictly more than the threshold.
//!
//! ## Modules
//!
//! - `core`: Actions, the environment contract, deterministic RNG
//! - `mcts`: Search tree, node statistics, selection formulas, configuration
//! - `nn`: Model traits, encoded states, the live/candidate model pair
//! - `policy`: Policy managers and their error type
//! - `training`: Replay buffer, background trainer, evaluation and promotion

pub mod core;
pub mod mcts;
pub mod nn;
pub mod policy;
pub mod training;

// Re-export commonly used types
pub use crate::core::{Action, ActionList, Environment, GameRng};

pub use crate::mcts::{
    ConfigError, EdgeStats, NodeId, PolicyConfig, SearchNode, SearchTree, TemperatureSchedule,
    TreeStats, GREEDY_TEMPERATURE,
};

pub use crate::nn::{
    EncodedState, FitDiagnostics, ModelError, ModelFactory, ModelPair, Observation,
    PolicyValueModel, Prediction, ResidualArchitecture, SharedModel, TrainingBatch, UniformModel,
};

pub use crate::policy::{
    DefaultPolicy, ModelShape, NeuralPolicy, PolicyError, PolicyManager, ResidualPolicy,
};

pub use crate::training::{
    PromotionOutcome, ReplayBuffer, ReplaySample, StopReason, Tournament, TournamentError,
    TournamentRecord, TrainerHandle, TrainerState, TrainingReport,
};
