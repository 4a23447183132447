//! Neural network integration.
//!
//! ## Overview
//!
//! - **Traits**: `PolicyValueModel` (the model collaborator), `ModelFactory`
//!   (residual model construction), `Observation` (state encoding)
//! - **Models**: `ModelPair` holding the live and candidate models
//! - **Baseline**: `UniformModel` for testing and cold starts
//!
//! ## Usage
//!
//! ```rust
//! use mcts_policy::nn::{EncodedState, ModelPair, PolicyValueModel, UniformModel};
//!
//! let models = ModelPair::new(Box::new(UniformModel::new(vec![9], 9)));
//! let live = models.live().unwrap();
//! let prediction = live.predict(&EncodedState::zeros(vec![9])).unwrap();
//! assert_eq!(prediction.policy.len(), 9);
//! ```

pub mod models;
pub mod traits;

// Re-export main types
pub use models::{ModelPair, SharedModel};
pub use traits::{
    EncodedState, FitDiagnostics, ModelError, ModelFactory, Observation, PolicyValueModel,
    Prediction, ResidualArchitecture, TrainingBatch, UniformModel,
};
