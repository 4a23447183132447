//! Action scoring for tree traversal and final move choice.
//!
//! - `ucb1`: Q(a) + c * sqrt(ln(N) / n(a)), unvisited actions first
//! - `puct`: Q(a) + c * P(a) * sqrt(N) / (1 + n(a)), as a full score vector
//! - `masked_argmax`: best score restricted to the legal actions
//! - `temperature_choice`: visit-count based final choice

use crate::core::{Action, GameRng};

use super::config::GREEDY_TEMPERATURE;
use super::node::SearchNode;

/// UCB1 (Upper Confidence Bound) selection over `actions`.
///
/// An unvisited action has an unbounded score: the first unvisited action
/// in `actions` order is returned before any visited one is considered.
/// Among visited actions ties go to the earlier action. `None` only when
/// `actions` is empty.
pub fn ucb1<S>(node: &SearchNode<S>, actions: &[Action], c: f64) -> Option<Action> {
    let ln_total = f64::from(node.visits().max(1)).ln();
    let mut best: Option<(Action, f64)> = None;

    for &action in actions {
        let visits = node.action_visits(action);
        if visits == 0 {
            return Some(action);
        }

        let mut score = node.mean_value(action) + c * (ln_total / f64::from(visits)).sqrt();
        if score.is_nan() {
            score = f64::NEG_INFINITY;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((action, score));
        }
    }

    best.map(|(action, _)| action)
}

/// PUCT scores for every action in the node's action space.
///
/// Actions beyond the end of `probabilities` get a zero prior. The caller
/// masks illegal actions with [`masked_argmax`].
pub fn puct<S>(node: &SearchNode<S>, probabilities: &[f64], c: f64) -> Vec<f64> {
    let sqrt_total = f64::from(node.visits()).sqrt();

    (0..node.action_space())
        .map(|action| {
            let prior = probabilities.get(action).copied().unwrap_or(0.0);
            let exploration = c * prior * sqrt_total / (1.0 + f64::from(node.action_visits(action)));
            node.mean_value(action) + exploration
        })
        .collect()
}

/// Highest-scoring legal action.
///
/// Scores of illegal actions are never read. NaN and missing legal scores
/// count as negative infinity; ties go to the earlier legal action. Returns
/// a member of `legal` whenever `legal` is non-empty.
pub fn masked_argmax(scores: &[f64], legal: &[Action]) -> Option<Action> {
    let score_of = |action: Action| match scores.get(action) {
        Some(s) if !s.is_nan() => *s,
        _ => f64::NEG_INFINITY,
    };

    let (&first, rest) = legal.split_first()?;
    let mut best = (first, score_of(first));
    for &action in rest {
        let score = score_of(action);
        if score > best.1 {
            best = (action, score);
        }
    }
    Some(best.0)
}

/// Final action choice from visit counts.
///
/// At or below [`GREEDY_TEMPERATURE`] this is the most visited action
/// (ties to the lowest index). Above it, actions are sampled with weight
/// `visits^(1/temperature)`. `None` if nothing has been visited.
pub fn temperature_choice<S>(
    node: &SearchNode<S>,
    temperature: f64,
    rng: &mut GameRng,
) -> Option<Action> {
    if temperature <= GREEDY_TEMPERATURE {
        return node.most_visited();
    }

    let counts = node.visit_counts();
    let max = f64::from(counts.iter().copied().max().unwrap_or(0));
    if max == 0.0 {
        return None;
    }

    // Relative to the max count so large exponents stay finite.
    let exponent = 1.0 / temperature;
    let weights: Vec<f64> = counts
        .iter()
        .map(|&v| (f64::from(v) / max).powf(exponent))
        .collect();

    rng.choose_weighted(&weights).or_else(|| node.most_visited())
}
