//! Search node and per-action statistics.
//!
//! Nodes live in the `SearchTree` arena and are referenced by `NodeId`.
//! Each node owns its children through an action → `NodeId` map; there are
//! no child → parent links.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::Action;

/// Index into the `SearchTree` node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new node ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Visit and value statistics for one action out of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    /// Visit count for this action.
    pub visits: u32,

    /// Sum of rewards backpropagated through this action.
    pub total_value: f64,
}

impl EdgeStats {
    /// Mean backpropagated reward, 0 when unvisited.
    #[must_use]
    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / f64::from(self.visits)
        }
    }
}

/// A game state reached during search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchNode<S> {
    /// The state this node represents. Opaque to the search core.
    pub state: S,

    /// Statistics for every action in the action space.
    stats: Vec<EdgeStats>,

    /// Children created so far, keyed by the action that reaches them.
    children: FxHashMap<Action, NodeId>,

    /// Total visits to this node.
    visits: u32,

    /// Is this a terminal game state?
    pub is_terminal: bool,

    /// Depth in tree (root = 0).
    pub depth: u16,
}

impl<S> SearchNode<S> {
    /// Create an unvisited node over an action space of `action_space`.
    pub fn new(state: S, action_space: usize) -> Self {
        Self {
            state,
            stats: vec![EdgeStats::default(); action_space],
            children: FxHashMap::default(),
            visits: 0,
            is_terminal: false,
            depth: 0,
        }
    }

    /// Mark this node terminal.
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    /// Size of the action space this node tracks.
    #[must_use]
    pub fn action_space(&self) -> usize {
        self.stats.len()
    }

    /// Total visits to this node.
    #[inline]
    #[must_use]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    /// Statistics for `action`. Out-of-range actions read as unvisited.
    #[must_use]
    pub fn edge(&self, action: Action) -> EdgeStats {
        self.stats.get(action).copied().unwrap_or_default()
    }

    /// Visits through `action`.
    #[must_use]
    pub fn action_visits(&self, action: Action) -> u32 {
        self.edge(action).visits
    }

    /// Mean value of `action`.
    #[must_use]
    pub fn mean_value(&self, action: Action) -> f64 {
        self.edge(action).mean_value()
    }

    /// Record one backpropagation step through `action`.
    ///
    /// # Panics
    ///
    /// Panics if `action` is outside the action space; the driver only
    /// backpropagates actions a policy returned.
    pub fn record(&mut self, action: Action, reward: f64) {
        let edge = &mut self.stats[action];
        edge.visits += 1;
        edge.total_value += reward;
        self.visits += 1;
    }

    /// Per-action visit counts over the whole action space.
    #[must_use]
    pub fn visit_counts(&self) -> Vec<u32> {
        self.stats.iter().map(|e| e.visits).collect()
    }

    /// Per-action mean values: the replay policy target.
    #[must_use]
    pub fn edge_values(&self) -> Vec<f32> {
        self.stats.iter().map(|e| e.mean_value() as f32).collect()
    }

    /// Child reached through `action`, if it has been created.
    #[must_use]
    pub fn child(&self, action: Action) -> Option<NodeId> {
        self.children.get(&action).copied()
    }

    /// Number of children created so far.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn attach_child(&mut self, action: Action, child: NodeId) {
        self.children.insert(action, child);
    }

    /// Action with the most visits, ties to the lowest action index.
    /// `None` if nothing has been visited.
    #[must_use]
    pub fn most_visited(&self) -> Option<Action> {
        let mut best: Option<(Action, u32)> = None;
        for (action, edge) in self.stats.iter().enumerate() {
            if edge.visits > best.map_or(0, |(_, v)| v) {
                best = Some((action, edge.visits));
            }
        }
        best.map(|(action, _)| action)
    }
}
