//! Model-guided policy: PUCT over live-model priors, replay recording,
//! background training and promotion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{Action, Environment, GameRng};
use crate::mcts::{selection, ConfigError, PolicyConfig, SearchNode, GREEDY_TEMPERATURE};
use crate::nn::{EncodedState, ModelError, ModelPair, Observation, PolicyValueModel, SharedModel};
use crate::training::{
    run_promotion, PromotionOutcome, ReplayBuffer, Tournament, TrainerHandle, TrainerState,
    TrainingCoordinator, TrainingReport,
};

use super::PolicyError;

/// Input and output sizes agreed between the environment and the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelShape {
    /// Shape the model consumes; replay samples are stored in this shape.
    pub input_shape: Vec<usize>,
    pub action_space: usize,
    /// Observations get a trailing size-1 channel before prediction.
    pub expand_channel: bool,
}

impl ModelShape {
    /// Shape for observations that already match the model input.
    pub fn new(input_shape: Vec<usize>, action_space: usize) -> Self {
        Self {
            input_shape,
            action_space,
            expand_channel: false,
        }
    }

    /// Reconcile an environment with a model.
    ///
    /// A model whose input is the state shape plus a trailing `1` is accepted
    /// and observations are expanded to match. Anything else that differs is
    /// a configuration error.
    pub fn resolve(
        state_shape: &[usize],
        action_space: usize,
        model: &dyn PolicyValueModel,
    ) -> Result<Self, ConfigError> {
        let input_shape = model.input_shape();
        let expand_channel = if input_shape == state_shape {
            false
        } else if input_shape.split_last() == Some((&1, state_shape)) {
            true
        } else {
            return Err(ConfigError::StateShapeMismatch {
                state: state_shape.to_vec(),
                model: input_shape,
            });
        };

        if model.action_space() != action_space {
            return Err(ConfigError::ActionSpaceMismatch {
                model: model.action_space(),
                environment: action_space,
            });
        }

        Ok(Self {
            input_shape,
            action_space,
            expand_channel,
        })
    }

    /// Encode a state in the model's input shape.
    pub fn encode<S: Observation>(&self, state: &S) -> EncodedState {
        let encoded = state.observe();
        if self.expand_channel {
            encoded.with_trailing_channel()
        } else {
            encoded
        }
    }
}

/// Blend `(1 - epsilon) * prior + epsilon * noise` with symmetric Dirichlet
/// noise over every action.
pub fn blend_root_noise(prior: &[f64], alpha: f64, epsilon: f64, rng: &mut GameRng) -> Vec<f64> {
    let noise = rng.dirichlet(alpha, prior.len());
    prior
        .iter()
        .zip(&noise)
        .map(|(p, n)| (1.0 - epsilon) * p + epsilon * n)
        .collect()
}

/// Model-guided strategy.
pub struct NeuralPolicy {
    config: PolicyConfig,
    shape: ModelShape,
    models: Arc<ModelPair>,
    replay: Arc<ReplayBuffer>,
    rng: GameRng,
    steps: Arc<AtomicU64>,
    trainer: Option<TrainerHandle>,
    tournament: Option<Box<dyn Tournament>>,
}

impl NeuralPolicy {
    /// Build a manager around `model`, which becomes the candidate; the live
    /// model starts as a copy of it.
    pub fn new<E: Environment>(
        model: Box<dyn PolicyValueModel>,
        env: &E,
        config: PolicyConfig,
    ) -> Result<Self, PolicyError> {
        config.validate()?;
        let shape = ModelShape::resolve(&env.state_shape(), env.action_space(), model.as_ref())?;
        if shape.expand_channel {
            debug!(input_shape = ?shape.input_shape, "expanding observations with a channel dimension");
        }

        let mut policy = Self::from_parts(Arc::new(ModelPair::new(model)), config, shape)?;
        if policy.config.training {
            policy.start_training()?;
        }
        Ok(policy)
    }

    /// Manager with a fixed model that never trains. Used for evaluation
    /// agents.
    pub fn frozen(
        model: SharedModel,
        config: PolicyConfig,
        shape: ModelShape,
    ) -> Result<Self, PolicyError> {
        let candidate = model.boxed_clone();
        let models = Arc::new(ModelPair::with_live(model, candidate));
        Self::from_parts(models, config.with_training(false), shape)
    }

    fn from_parts(
        models: Arc<ModelPair>,
        config: PolicyConfig,
        shape: ModelShape,
    ) -> Result<Self, PolicyError> {
        let replay = Arc::new(ReplayBuffer::new(
            config.replay_capacity,
            config.min_train_capacity,
            &shape.input_shape,
            shape.action_space,
        )?);
        Ok(Self {
            rng: GameRng::new(config.seed),
            config,
            shape,
            models,
            replay,
            steps: Arc::new(AtomicU64::new(0)),
            trainer: None,
            tournament: None,
        })
    }

    /// Attach the tournament runner used by [`evaluation`](Self::evaluation).
    #[must_use]
    pub fn with_tournament(mut self, tournament: impl Tournament + 'static) -> Self {
        self.tournament = Some(Box::new(tournament));
        self
    }

    /// Replace the tournament runner.
    pub fn set_tournament(&mut self, tournament: Box<dyn Tournament>) {
        self.tournament = Some(tournament);
    }

    /// PUCT over the live model's priors, restricted to `legal`.
    pub(crate) fn selection<S: Observation>(
        &mut self,
        node: &SearchNode<S>,
        legal: &[Action],
        is_root: bool,
    ) -> Result<Option<Action>, PolicyError> {
        let mut probabilities = self.priors(node)?;
        if is_root {
            probabilities = blend_root_noise(
                &probabilities,
                self.config.dirichlet_alpha,
                self.config.root_noise_epsilon,
                &mut self.rng,
            );
        }

        let scores = selection::puct(node, &probabilities, self.config.exploration_constant);
        Ok(selection::masked_argmax(&scores, legal))
    }

    fn priors<S: Observation>(&self, node: &SearchNode<S>) -> Result<Vec<f64>, PolicyError> {
        let model = self.models.live()?;
        let prediction = model.predict(&self.shape.encode(&node.state))?;
        if prediction.policy.len() != self.shape.action_space {
            return Err(ModelError::PolicyLength {
                expected: self.shape.action_space,
                actual: prediction.policy.len(),
            }
            .into());
        }
        Ok(prediction.policy.iter().map(|&p| f64::from(p)).collect())
    }

    pub(crate) fn action_choice<S>(
        &mut self,
        node: &SearchNode<S>,
        move_number: Option<u32>,
    ) -> Option<Action> {
        let temperature = move_number.map_or(GREEDY_TEMPERATURE, |m| {
            self.config.temperature_schedule.temperature_at(m)
        });
        selection::temperature_choice(node, temperature, &mut self.rng)
    }

    /// Append `(state, per-action edge values, reward)` to the replay buffer.
    pub(crate) fn update<S: Observation>(
        &mut self,
        node: &SearchNode<S>,
        reward: f64,
    ) -> Result<(), PolicyError> {
        let state = self.shape.encode(&node.state);
        let flipped = self.replay.append(state, node.edge_values(), reward as f32)?;
        debug!(reward, writes = self.replay.writes(), "recorded replay sample");
        if flipped && self.trainer.is_some() {
            info!("trainer released");
        }
        Ok(())
    }

    /// Start the background trainer. No-op while one is running.
    pub fn start_training(&mut self) -> Result<(), PolicyError> {
        if self.trainer.as_ref().is_some_and(TrainerHandle::is_running) {
            return Ok(());
        }
        // Reap a trainer that already stopped on its own.
        if let Some(old) = self.trainer.take() {
            let report = old.join();
            debug!(steps = report.steps, stop = ?report.stop, "previous trainer reaped");
        }

        let coordinator = TrainingCoordinator::new(
            Arc::clone(&self.replay),
            Arc::clone(&self.models),
            &self.config,
            self.rng.fork(),
            Arc::clone(&self.steps),
        );
        self.trainer = Some(coordinator.spawn()?);
        self.config.training = true;
        Ok(())
    }

    /// Stop the trainer and wait for it. `None` if none was started.
    pub fn stop_training(&mut self) -> Option<TrainingReport> {
        let trainer = self.trainer.take()?;
        trainer.stop();
        self.config.training = false;
        Some(trainer.join())
    }

    /// Lifecycle state of the current trainer, if any.
    #[must_use]
    pub fn trainer_state(&self) -> Option<TrainerState> {
        self.trainer.as_ref().map(TrainerHandle::state)
    }

    /// Play the candidate against the live model and promote it if it wins
    /// often enough.
    pub fn evaluation(&mut self) -> Result<PromotionOutcome, PolicyError> {
        let tournament = self
            .tournament
            .as_deref_mut()
            .ok_or(ConfigError::MissingTournament)?;
        run_promotion(
            &self.models,
            tournament,
            &self.config,
            &self.shape,
            self.steps.load(Ordering::Acquire),
        )
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    #[must_use]
    pub fn shape(&self) -> &ModelShape {
        &self.shape
    }

    #[must_use]
    pub fn replay(&self) -> &Arc<ReplayBuffer> {
        &self.replay
    }

    #[must_use]
    pub fn models(&self) -> &Arc<ModelPair> {
        &self.models
    }

    /// Current live model.
    pub fn live_model(&self) -> Result<SharedModel, PolicyError> {
        self.models.live()
    }

    /// Training steps completed across every trainer this manager started.
    #[must_use]
    pub fn training_step(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }
}

impl Drop for NeuralPolicy {
    fn drop(&mut self) {
        self.stop_training();
    }
}

impl std::fmt::Debug for NeuralPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralPolicy")
            .field("shape", &self.shape)
            .field("replay", &self.replay)
            .field("steps", &self.training_step())
            .field("trainer", &self.trainer)
            .field("has_tournament", &self.tournament.is_some())
            .finish_non_exhaustive()
    }
}
