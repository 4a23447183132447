//! UCB1 policy with uniform random rollouts.

use crate::core::{Action, GameRng};
use crate::mcts::{selection, PolicyConfig, SearchNode};

/// Model-free strategy. Needs no environment knowledge beyond the legal set.
#[derive(Clone, Debug)]
pub struct DefaultPolicy {
    exploration_constant: f64,
    rng: GameRng,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl DefaultPolicy {
    /// Create with an explicit exploration constant and seed.
    pub fn new(exploration_constant: f64, seed: u64) -> Self {
        Self {
            exploration_constant,
            rng: GameRng::new(seed),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.exploration_constant, config.seed)
    }

    /// Exploration constant used by UCB1.
    #[must_use]
    pub fn exploration_constant(&self) -> f64 {
        self.exploration_constant
    }

    pub(crate) fn selection<S>(&self, node: &SearchNode<S>, legal: &[Action]) -> Option<Action> {
        selection::ucb1(node, legal, self.exploration_constant)
    }

    pub(crate) fn rollout(&mut self, legal: &[Action]) -> Option<Action> {
        self.rng.choose(legal).copied()
    }

    pub(crate) fn action_choice<S>(&self, node: &SearchNode<S>) -> Option<Action> {
        node.most_visited()
    }
}
