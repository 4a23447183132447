//! Search tree and selection algorithms.
//!
//! ## Overview
//!
//! - **Tree**: arena of `SearchNode`s with lazily created, exclusively owned
//!   children and per-action visit/value statistics
//! - **Selection**: UCB1, PUCT with legal-action masking, temperature-based
//!   final choice
//! - **Config**: `PolicyConfig` and the `TemperatureSchedule`
//!
//! ## Usage
//!
//! ```rust
//! use mcts_policy::mcts::{selection, SearchTree};
//!
//! let mut tree = SearchTree::new("start", 3);
//! let root = tree.root();
//!
//! // Unvisited actions are explored first, in the order given.
//! let action = selection::ucb1(tree.root_node(), &[2, 0, 1], 1.41).unwrap();
//! assert_eq!(action, 2);
//!
//! tree.expand(root, action, "after 2", false);
//! tree.backpropagate(&[(root, action)], 1.0);
//! assert_eq!(tree.root_node().visits(), 1);
//! ```

pub mod config;
pub mod node;
pub mod selection;
pub mod tree;

// Re-export main types
pub use config::{ConfigError, PolicyConfig, TemperatureSchedule, GREEDY_TEMPERATURE};
pub use node::{EdgeStats, NodeId, SearchNode};
pub use tree::{SearchTree, TreeStats};
