//! Neural network traits for policy and value prediction.
//!
//! These traits define the interface between the policy managers and the
//! model collaborator that actually owns the network weights.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a model collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Training step failed: {0}")]
    FitFailed(String),

    #[error("Checkpoint '{tag}' could not be saved: {reason}")]
    SaveFailed { tag: String, reason: String },

    #[error("Model returned {actual} policy entries, expected {expected}")]
    PolicyLength { expected: usize, actual: usize },
}

/// Encoded state as a flat tensor for neural network input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodedState {
    /// Flattened tensor data (row-major order).
    pub tensor: Vec<f32>,

    /// Shape of the tensor (e.g., [channels, height, width] or [features]).
    pub shape: Vec<usize>,
}

impl EncodedState {
    /// Create a new encoded state.
    pub fn new(tensor: Vec<f32>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(
            tensor.len(),
            shape.iter().product::<usize>(),
            "Tensor length must match shape product"
        );
        Self { tensor, shape }
    }

    /// Create a zero-filled encoded state with the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size = shape.iter().product();
        Self {
            tensor: vec![0.0; size],
            shape,
        }
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    /// Check if the tensor is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    /// Append a channel dimension of size 1 (`[M, N]` becomes `[M, N, 1]`).
    ///
    /// Convolutional models declare one more input dimension than a plain
    /// board encoding; the data layout is unchanged.
    #[must_use]
    pub fn with_trailing_channel(mut self) -> Self {
        self.shape.push(1);
        self
    }
}

/// States stored in search nodes must be able to encode themselves.
pub trait Observation {
    /// Encode this state for model input and replay storage.
    fn observe(&self) -> EncodedState;
}

impl Observation for EncodedState {
    fn observe(&self) -> EncodedState {
        self.clone()
    }
}

/// Output of a single forward pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Prior probability per action (length = action space).
    pub policy: Vec<f32>,

    /// Value estimate for the player to move.
    pub value: f32,
}

/// One batch of replay samples submitted as a single training step.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrainingBatch {
    /// Replay slots the samples were drawn from (with replacement).
    pub indices: Vec<usize>,
    pub states: Vec<EncodedState>,
    /// Per-action edge values recorded at update time.
    pub policies: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
}

impl TrainingBatch {
    /// Number of samples in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Diagnostics returned by one training step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Combined loss.
    pub loss: f32,
    pub policy_loss: f32,
    pub value_loss: f32,
}

/// Combined policy-value model.
///
/// The live model only ever sees `predict`; the candidate is trained with
/// `fit` and checkpointed with `save`. `boxed_clone` snapshots a model so a
/// copy can play evaluation games or become the live model.
pub trait PolicyValueModel: Send + Sync {
    /// Input shape the model expects (without batch dimension).
    fn input_shape(&self) -> Vec<usize>;

    /// Length of the policy head.
    fn action_space(&self) -> usize;

    /// Predict priors and value for one state.
    fn predict(&self, state: &EncodedState) -> Result<Prediction, ModelError>;

    /// Run one optimisation step. `epoch` is the trainer's step counter.
    fn fit(&mut self, batch: &TrainingBatch, epoch: u64) -> Result<FitDiagnostics, ModelError>;

    /// Persist the model under `tag`. The format belongs to the model.
    fn save(&self, tag: &str) -> Result<(), ModelError>;

    /// Deep copy of the model.
    fn boxed_clone(&self) -> Box<dyn PolicyValueModel>;
}

/// Architecture knobs for residual policy-value networks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualArchitecture {
    pub residual_layers: usize,
    pub filters: usize,
    pub kernel_size: usize,
}

impl Default for ResidualArchitecture {
    fn default() -> Self {
        Self {
            residual_layers: 40,
            filters: 256,
            kernel_size: 3,
        }
    }
}

/// Builds residual models for a given input and output size.
pub trait ModelFactory {
    fn build(
        &self,
        input_shape: &[usize],
        action_space: usize,
        architecture: &ResidualArchitecture,
    ) -> Box<dyn PolicyValueModel>;
}

/// Uniform policy, zero value, no learning. Baseline for drivers without a
/// trained network.
#[derive(Clone, Debug, Default)]
pub struct UniformModel {
    input_shape: Vec<usize>,
    action_space: usize,
}

impl UniformModel {
    /// Create a new baseline model.
    pub fn new(input_shape: Vec<usize>, action_space: usize) -> Self {
        Self {
            input_shape,
            action_space,
        }
    }
}

impl PolicyValueModel for UniformModel {
    fn input_shape(&self) -> Vec<usize> {
        self.input_shape.clone()
    }

    fn action_space(&self) -> usize {
        self.action_space
    }

    fn predict(&self, _state: &EncodedState) -> Result<Prediction, ModelError> {
        let policy = if self.action_space == 0 {
            vec![]
        } else {
            vec![1.0 / self.action_space as f32; self.action_space]
        };
        Ok(Prediction { policy, value: 0.0 })
    }

    fn fit(&mut self, _batch: &TrainingBatch, _epoch: u64) -> Result<FitDiagnostics, ModelError> {
        Ok(FitDiagnostics::default())
    }

    fn save(&self, _tag: &str) -> Result<(), ModelError> {
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn PolicyValueModel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_state_new() {
        let state = EncodedState::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        assert_eq!(state.len(), 4);
        assert_eq!(state.shape, vec![2, 2]);
    }

    #[test]
    fn test_encoded_state_zeros() {
        let state = EncodedState::zeros(vec![3, 4]);
        assert_eq!(state.len(), 12);
        assert!(state.tensor.iter().all(|&v| v == 0.0));

        assert!(EncodedState::zeros(vec![0]).is_empty());
    }

    #[test]
    fn test_trailing_channel() {
        let state = EncodedState::zeros(vec![3, 3]).with_trailing_channel();
        assert_eq!(state.shape, vec![3, 3, 1]);
        assert_eq!(state.len(), 9);
    }

    #[test]
    fn test_uniform_model() {
        let model = UniformModel::new(vec![4], 5);
        let prediction = model.predict(&EncodedState::zeros(vec![4])).unwrap();

        assert_eq!(prediction.policy.len(), 5);
        assert!((prediction.policy.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(prediction.value, 0.0);
        assert_eq!(model.boxed_clone().action_space(), 5);
    }

    #[test]
    fn test_uniform_model_zero_actions() {
        let model = UniformModel::default();
        let prediction = model.predict(&EncodedState::zeros(vec![1])).unwrap();
        assert!(prediction.policy.is_empty());
    }

    #[test]
    fn test_model_error_messages() {
        let err = ModelError::SaveFailed {
            tag: "checkpoint-1".into(),
            reason: "disk full".into(),
        };
        assert_eq!(err.to_string(), "Checkpoint 'checkpoint-1' could not be saved: disk full");

        let err = ModelError::PolicyLength { expected: 4, actual: 3 };
        assert!(err.to_string().contains("expected 4"));
    }

    #[test]
    fn test_batch_serialization() {
        let batch = TrainingBatch {
            indices: vec![1],
            states: vec![EncodedState::zeros(vec![2])],
            policies: vec![vec![0.5, 0.5]],
            rewards: vec![1.0],
        };
        let json = serde_json::to_string(&batch).unwrap();
        let back: TrainingBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.policies, batch.policies);
    }
}
