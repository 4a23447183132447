//! Environment collaborator.
//!
//! The policy layer never interprets game rules. It only asks the
//! environment which actions are legal and how large the state and action
//! spaces are.

use smallvec::SmallVec;

use crate::nn::Observation;

/// Index of an action in the environment's fixed action space.
pub type Action = usize;

/// Legal action list. Most games have small branching factors.
pub type ActionList = SmallVec<[Action; 16]>;

/// Game environment as seen by the policy managers.
pub trait Environment {
    /// State type stored in search nodes.
    type State: Observation;

    /// Shape of an encoded state (without batch dimension).
    fn state_shape(&self) -> Vec<usize>;

    /// Total number of actions. Policy vectors have this length.
    fn action_space(&self) -> usize;

    /// Legal actions in `state`, all below `action_space()`.
    fn legal_actions(&self, state: &Self::State) -> ActionList;
}
