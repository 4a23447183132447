//! Arena-based search tree.
//!
//! Nodes sit in a flat `Vec<SearchNode>` and refer to each other by index.

use serde::{Deserialize, Serialize};

use crate::core::Action;

use super::node::{NodeId, SearchNode};

/// Arena-based search tree.
///
/// Nodes are stored in a flat vector and referenced by `NodeId` indices.
/// A node is reachable from exactly one parent's child map, so the arena
/// always describes a tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchTree<S> {
    /// All nodes in the tree.
    nodes: Vec<SearchNode<S>>,

    /// Size of the action space every node tracks.
    action_space: usize,
}

impl<S> SearchTree<S> {
    /// Create a new tree with a root node for `root_state`.
    pub fn new(root_state: S, action_space: usize) -> Self {
        Self::with_capacity(root_state, action_space, 1024)
    }

    /// Create a tree with custom initial capacity.
    pub fn with_capacity(root_state: S, action_space: usize, capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(SearchNode::new(root_state, action_space));
        Self {
            nodes,
            action_space,
        }
    }

    /// Get the root node ID.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Get a node by ID.
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> &SearchNode<S> {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut SearchNode<S> {
        &mut self.nodes[id.0 as usize]
    }

    /// Get the root node.
    #[must_use]
    pub fn root_node(&self) -> &SearchNode<S> {
        self.get(self.root())
    }

    /// Child of `parent` through `action`, created on first traversal.
    ///
    /// Returns the existing child if one was already created; `state` and
    /// `terminal` are only used for a new node.
    pub fn expand(&mut self, parent: NodeId, action: Action, state: S, terminal: bool) -> NodeId {
        if let Some(existing) = self.get(parent).child(action) {
            return existing;
        }

        let mut child = SearchNode::new(state, self.action_space);
        child.is_terminal = terminal;
        child.depth = self.get(parent).depth + 1;

        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(child);
        self.get_mut(parent).attach_child(action, id);
        id
    }

    /// Backpropagate `reward` along the path the driver traversed.
    ///
    /// Each `(node, action)` pair receives one visit and the reward. Rewards
    /// are from a single perspective; drivers of alternating games negate
    /// them per ply before calling.
    pub fn backpropagate(&mut self, path: &[(NodeId, Action)], reward: f64) {
        for &(node, action) in path.iter().rev() {
            self.get_mut(node).record(action, reward);
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Action space tracked per node.
    #[must_use]
    pub fn action_space(&self) -> usize {
        self.action_space
    }

    /// Get statistics about the tree.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            node_count: self.nodes.len(),
            max_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            terminal_count: self.nodes.iter().filter(|n| n.is_terminal).count(),
            total_visits: self.nodes.iter().map(|n| u64::from(n.visits())).sum(),
        }
    }

    /// Iterate over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SearchNode<S>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::new(i as u32), n))
    }
}

/// Statistics about the search tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Total number of nodes.
    pub node_count: usize,

    /// Maximum depth reached.
    pub max_depth: u16,

    /// Number of terminal nodes.
    pub terminal_count: usize,

    /// Sum of node visit counts.
    pub total_visits: u64,
}

impl TreeStats {
    /// Average visits per node.
    #[must_use]
    pub fn visits_per_node(&self) -> f64 {
        if self.node_count == 0 {
            0.0
        } else {
            self.total_visits as f64 / self.node_count as f64
        }
    }
}
