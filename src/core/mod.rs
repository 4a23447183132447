//! Core types shared by every layer: actions, the environment contract, RNG.

pub mod environment;
pub mod rng;

pub use environment::{Action, ActionList, Environment};
pub use rng::GameRng;
