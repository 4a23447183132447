//! Head-to-head evaluation and promotion of the candidate model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::mcts::{PolicyConfig, TemperatureSchedule};
use crate::nn::ModelPair;
use crate::policy::{ModelShape, NeuralPolicy, PolicyError, PolicyManager};

/// Seat of the candidate agent in the tournament; the live agent sits at 0.
pub const CANDIDATE_SEAT: usize = 1;

/// Errors reported by a tournament runner.
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament failed: {0}")]
    Failed(String),

    #[error("Tournament returned {actual} results for {expected} agents")]
    MissingResults { expected: usize, actual: usize },
}

/// Per-agent tournament result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRecord {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// Plays complete games between agents.
///
/// Implementations own the environment and the search driver; agents only
/// provide decisions. Results are returned in agent order.
pub trait Tournament: Send {
    fn play(
        &mut self,
        agents: &mut [PolicyManager],
        games: u32,
    ) -> Result<Vec<TournamentRecord>, TournamentError>;
}

/// Result of one evaluation round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    /// Candidate wins.
    pub wins: u32,
    /// Configured game count the fraction is taken over.
    pub games: u32,
    pub win_fraction: f64,
    /// Did the candidate become the live model?
    pub promoted: bool,
}

/// Play the live model against a snapshot of the candidate and promote the
/// snapshot if its win fraction is strictly above the threshold.
///
/// Both agents play greedily (zero temperature) with frozen models. The
/// config is validated first, so a zero game count is an error rather than
/// an unbounded win fraction.
pub fn run_promotion(
    models: &ModelPair,
    tournament: &mut dyn Tournament,
    config: &PolicyConfig,
    shape: &ModelShape,
    step: u64,
) -> Result<PromotionOutcome, PolicyError> {
    config.validate()?;
    info!(step, games = config.validation_games, "running evaluation");

    let live = models.live()?;
    let candidate = models.snapshot_candidate()?;

    let agent_config = config
        .clone()
        .with_training(false)
        .with_temperature_schedule(TemperatureSchedule::greedy());
    let mut agents = [
        PolicyManager::Neural(NeuralPolicy::frozen(live, agent_config.clone(), shape.clone())?),
        PolicyManager::Neural(NeuralPolicy::frozen(
            Arc::clone(&candidate),
            agent_config.with_seed(config.seed.wrapping_add(1)),
            shape.clone(),
        )?),
    ];

    let records = tournament.play(&mut agents, config.validation_games)?;
    let record = records
        .get(CANDIDATE_SEAT)
        .copied()
        .ok_or(TournamentError::MissingResults {
            expected: agents.len(),
            actual: records.len(),
        })?;

    let win_fraction = f64::from(record.wins) / f64::from(config.validation_games);
    let promoted = win_fraction > config.promotion_threshold;
    if promoted {
        models.promote(candidate)?;
        info!(step, win_fraction, threshold = config.promotion_threshold, "candidate promoted to live model");
    } else {
        info!(step, win_fraction, threshold = config.promotion_threshold, "candidate rejected");
    }

    Ok(PromotionOutcome {
        wins: record.wins,
        games: config.validation_games,
        win_fraction,
        promoted,
    })
}
