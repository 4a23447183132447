//! Neural policy over a residual network built for the environment.

use crate::core::Environment;
use crate::mcts::PolicyConfig;
use crate::nn::{ModelFactory, ResidualArchitecture};

use super::{NeuralPolicy, PolicyError};

/// `NeuralPolicy` whose model comes from a [`ModelFactory`].
#[derive(Debug)]
pub struct ResidualPolicy {
    inner: NeuralPolicy,
    architecture: ResidualArchitecture,
}

impl ResidualPolicy {
    /// Build a network sized from the environment's state shape and action
    /// space, then wrap it.
    pub fn new<E: Environment, F: ModelFactory>(
        factory: &F,
        env: &E,
        architecture: ResidualArchitecture,
        config: PolicyConfig,
    ) -> Result<Self, PolicyError> {
        let model = factory.build(&env.state_shape(), env.action_space(), &architecture);
        let inner = NeuralPolicy::new(model, env, config)?;
        Ok(Self { inner, architecture })
    }

    #[must_use]
    pub fn architecture(&self) -> &ResidualArchitecture {
        &self.architecture
    }

    #[must_use]
    pub fn neural(&self) -> &NeuralPolicy {
        &self.inner
    }

    pub fn neural_mut(&mut self) -> &mut NeuralPolicy {
        &mut self.inner
    }
}
