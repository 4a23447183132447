//! Policy managers: the decision layer consulted by the search driver.
//!
//! A `PolicyManager` answers four questions at each step of a search:
//!
//! - `selection`: which action to descend through during tree traversal
//! - `rollout`: which action to play from a leaf
//! - `action_choice`: which action to actually play after searching
//! - `update`: what to record once a reward for a node is known
//!
//! The set of strategies is closed:
//!
//! - **Default**: UCB1 selection, uniform random rollouts, most-visited choice
//! - **Neural**: PUCT over a live model's priors, temperature-based choice,
//!   replay recording and an optional background trainer
//! - **Residual**: Neural with a model built from a residual architecture
//!
//! Every returned action is checked against the legal set supplied for the
//! call. Backpropagation into the tree belongs to the driver
//! (`SearchTree::backpropagate`); `update` never touches node statistics.

mod default;
mod neural;
mod residual;

pub use default::DefaultPolicy;
pub use neural::{blend_root_noise, ModelShape, NeuralPolicy};
pub use residual::ResidualPolicy;

use thiserror::Error;

use crate::core::{Action, Environment};
use crate::mcts::{ConfigError, PolicyConfig, SearchNode};
use crate::nn::{ModelError, ModelFactory, Observation, PolicyValueModel, ResidualArchitecture};
use crate::training::TournamentError;

/// Errors surfaced by policy managers and their collaborators.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error("Action {action} is not in the legal set {legal:?}")]
    IllegalAction { action: Action, legal: Vec<Action> },

    #[error("No legal actions to choose from")]
    NoLegalActions,

    #[error("No action has been visited")]
    NoVisitedActions,

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Failed to start training thread: {0}")]
    TrainerSpawn(#[source] std::io::Error),
}

/// Search decision strategy.
#[derive(Debug)]
pub enum PolicyManager {
    Default(DefaultPolicy),
    Neural(NeuralPolicy),
    Residual(ResidualPolicy),
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::Default(DefaultPolicy::default())
    }
}

impl PolicyManager {
    /// UCB1 manager.
    pub fn default_policy(config: &PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self::Default(DefaultPolicy::from_config(config)))
    }

    /// Model-guided manager. Starts the trainer if `config.training` is set.
    pub fn neural<E: Environment>(
        model: Box<dyn PolicyValueModel>,
        env: &E,
        config: PolicyConfig,
    ) -> Result<Self, PolicyError> {
        NeuralPolicy::new(model, env, config).map(Self::Neural)
    }

    /// Model-guided manager over a freshly built residual network.
    pub fn residual<E: Environment, F: ModelFactory>(
        factory: &F,
        env: &E,
        architecture: ResidualArchitecture,
        config: PolicyConfig,
    ) -> Result<Self, PolicyError> {
        ResidualPolicy::new(factory, env, architecture, config).map(Self::Residual)
    }

    /// Strategy name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default(_) => "default",
            Self::Neural(_) => "neural",
            Self::Residual(_) => "residual",
        }
    }

    /// The model-guided core, if this manager has one.
    #[must_use]
    pub fn as_neural(&self) -> Option<&NeuralPolicy> {
        match self {
            Self::Default(_) => None,
            Self::Neural(policy) => Some(policy),
            Self::Residual(policy) => Some(policy.neural()),
        }
    }

    /// Mutable access to the model-guided core.
    pub fn as_neural_mut(&mut self) -> Option<&mut NeuralPolicy> {
        match self {
            Self::Default(_) => None,
            Self::Neural(policy) => Some(policy),
            Self::Residual(policy) => Some(policy.neural_mut()),
        }
    }

    /// Action to descend through from `node` during traversal.
    ///
    /// `is_root` enables Dirichlet noise on model priors.
    pub fn selection<S: Observation>(
        &mut self,
        node: &SearchNode<S>,
        legal: &[Action],
        is_root: bool,
    ) -> Result<Action, PolicyError> {
        if legal.is_empty() {
            return Err(PolicyError::NoLegalActions);
        }

        let action = match self {
            Self::Default(policy) => policy.selection(node, legal),
            Self::Neural(policy) => policy.selection(node, legal, is_root)?,
            Self::Residual(policy) => policy.neural_mut().selection(node, legal, is_root)?,
        };
        ensure_legal(action, legal)
    }

    /// Action to play from a leaf during simulation.
    pub fn rollout<E: Environment>(
        &mut self,
        node: &SearchNode<E::State>,
        env: &E,
    ) -> Result<Action, PolicyError> {
        let legal = env.legal_actions(&node.state);
        if legal.is_empty() {
            return Err(PolicyError::NoLegalActions);
        }

        let action = match self {
            Self::Default(policy) => policy.rollout(&legal),
            Self::Neural(policy) => policy.selection(node, &legal, false)?,
            Self::Residual(policy) => policy.neural_mut().selection(node, &legal, false)?,
        };
        ensure_legal(action, &legal)
    }

    /// Action to actually play once search at `node` is done.
    ///
    /// `move_number` picks the temperature for model-guided managers; `None`
    /// plays greedily.
    pub fn action_choice<S>(
        &mut self,
        node: &SearchNode<S>,
        move_number: Option<u32>,
    ) -> Result<Action, PolicyError> {
        let action = match self {
            Self::Default(policy) => policy.action_choice(node),
            Self::Neural(policy) => policy.action_choice(node, move_number),
            Self::Residual(policy) => policy.neural_mut().action_choice(node, move_number),
        };
        action.ok_or(PolicyError::NoVisitedActions)
    }

    /// Record the outcome observed for `node`.
    pub fn update<S: Observation>(
        &mut self,
        node: &SearchNode<S>,
        reward: f64,
    ) -> Result<(), PolicyError> {
        match self {
            Self::Default(_) => Ok(()),
            Self::Neural(policy) => policy.update(node, reward),
            Self::Residual(policy) => policy.neural_mut().update(node, reward),
        }
    }
}

/// `Some(action)` must be a member of `legal`.
fn ensure_legal(action: Option<Action>, legal: &[Action]) -> Result<Action, PolicyError> {
    match action {
        Some(action) if legal.contains(&action) => Ok(action),
        Some(action) => Err(PolicyError::IllegalAction {
            action,
            legal: legal.to_vec(),
        }),
        None => Err(PolicyError::NoLegalActions),
    }
}
