//! Policy manager configuration parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Temperatures at or below this value pick the most visited action.
pub const GREEDY_TEMPERATURE: f64 = 1e-2;

/// Configuration problems surfaced to the constructor or evaluation caller.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Evaluation requires a tournament runner")]
    MissingTournament,

    #[error("State shape {state:?} does not match model input shape {model:?}")]
    StateShapeMismatch { state: Vec<usize>, model: Vec<usize> },

    #[error("Model policy head has {model} actions, environment has {environment}")]
    ActionSpaceMismatch { model: usize, environment: usize },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Move-number thresholds mapped to action-choice temperatures.
///
/// Built once at configuration time. The temperature for move `m` is the
/// value at the greatest threshold strictly below `m`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemperatureSchedule(BTreeMap<u32, f64>);

impl TemperatureSchedule {
    /// Schedule from `(threshold, temperature)` pairs. Later duplicates win.
    pub fn new(entries: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Greedy play from the first move.
    #[must_use]
    pub fn greedy() -> Self {
        Self::new([(0, 0.0)])
    }

    /// Temperature for `move_number`, or [`GREEDY_TEMPERATURE`] if no
    /// threshold lies below it.
    #[must_use]
    pub fn temperature_at(&self, move_number: u32) -> f64 {
        self.0
            .range(..move_number)
            .next_back()
            .map_or(GREEDY_TEMPERATURE, |(_, &t)| t)
    }

    /// Iterate thresholds in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        Self::new([(0, GREEDY_TEMPERATURE)])
    }
}

/// Policy manager configuration.
///
/// Missing fields deserialize to their defaults, so partial configs work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Exploration constant C shared by UCB1 and PUCT (default: 1.41).
    pub exploration_constant: f64,

    /// Dirichlet alpha for root exploration noise.
    pub dirichlet_alpha: f64,

    /// Weight of the noise in the root prior blend.
    pub root_noise_epsilon: f64,

    /// Replay buffer slots.
    pub replay_capacity: usize,

    /// Writes needed before the trainer starts.
    pub min_train_capacity: usize,

    /// Samples per training step.
    pub batch_size: usize,

    /// Training steps between checkpoints.
    pub checkpoint_interval: u64,

    /// Games played when evaluating a candidate.
    pub validation_games: u32,

    /// Win fraction the candidate must exceed to be promoted.
    pub promotion_threshold: f64,

    /// Action-choice temperature by move number.
    pub temperature_schedule: TemperatureSchedule,

    /// Random seed. Same seed produces deterministic decisions.
    pub seed: u64,

    /// Start the background trainer when the manager is built.
    pub training: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            exploration_constant: 1.41,
            dirichlet_alpha: 0.03,
            root_noise_epsilon: 0.25,
            replay_capacity: 10,
            min_train_capacity: 5,
            batch_size: 4,
            checkpoint_interval: 1000,
            validation_games: 400,
            promotion_threshold: 0.55,
            temperature_schedule: TemperatureSchedule::default(),
            seed: 42,
            training: false,
        }
    }
}

impl PolicyConfig {
    /// Set the exploration constant.
    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    /// Set root noise parameters.
    pub fn with_root_noise(mut self, alpha: f64, epsilon: f64) -> Self {
        self.dirichlet_alpha = alpha;
        self.root_noise_epsilon = epsilon;
        self
    }

    /// Set replay capacity. The training threshold follows at half capacity.
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self.min_train_capacity = (capacity / 2).max(1);
        self
    }

    /// Override the training threshold.
    pub fn with_min_train_capacity(mut self, min: usize) -> Self {
        self.min_train_capacity = min;
        self
    }

    /// Set the training batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Set evaluation game count and promotion threshold.
    pub fn with_validation(mut self, games: u32, threshold: f64) -> Self {
        self.validation_games = games;
        self.promotion_threshold = threshold;
        self
    }

    /// Set the temperature schedule.
    pub fn with_temperature_schedule(mut self, schedule: TemperatureSchedule) -> Self {
        self.temperature_schedule = schedule;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Start the trainer on construction.
    pub fn with_training(mut self, training: bool) -> Self {
        self.training = training;
        self
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(ConfigError::invalid("exploration_constant", "must be finite and >= 0"));
        }
        if !(self.dirichlet_alpha > 0.0 && self.dirichlet_alpha.is_finite()) {
            return Err(ConfigError::invalid("dirichlet_alpha", "must be finite and > 0"));
        }
        if !(0.0..=1.0).contains(&self.root_noise_epsilon) {
            return Err(ConfigError::invalid("root_noise_epsilon", "must be in [0, 1]"));
        }
        if self.replay_capacity == 0 {
            return Err(ConfigError::invalid("replay_capacity", "must be > 0"));
        }
        if self.min_train_capacity == 0 || self.min_train_capacity > self.replay_capacity {
            return Err(ConfigError::invalid(
                "min_train_capacity",
                format!("must be in 1..={}", self.replay_capacity),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be > 0"));
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::invalid("checkpoint_interval", "must be > 0"));
        }
        if self.validation_games == 0 {
            return Err(ConfigError::invalid("validation_games", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.promotion_threshold) {
            return Err(ConfigError::invalid("promotion_threshold", "must be in [0, 1]"));
        }
        if self
            .temperature_schedule
            .iter()
            .any(|(_, t)| !t.is_finite() || t < 0.0)
        {
            return Err(ConfigError::invalid("temperature_schedule", "temperatures must be finite and >= 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PolicyConfig::default();
        assert!((config.exploration_constant - 1.41).abs() < 1e-12);
        assert!((config.dirichlet_alpha - 0.03).abs() < 1e-12);
        assert!((config.root_noise_epsilon - 0.25).abs() < 1e-12);
        assert_eq!(config.replay_capacity, 10);
        assert_eq!(config.min_train_capacity, 5);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.checkpoint_interval, 1000);
        assert_eq!(config.validation_games, 400);
        assert!((config.promotion_threshold - 0.55).abs() < 1e-12);
        assert!(!config.training);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PolicyConfig::default()
            .with_exploration(2.0)
            .with_replay_capacity(100)
            .with_batch_size(32)
            .with_seed(123);

        assert_eq!(config.exploration_constant, 2.0);
        assert_eq!(config.replay_capacity, 100);
        assert_eq!(config.min_train_capacity, 50);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.seed, 123);
    }

    #[test]
    fn test_schedule_nearest_key_below() {
        let schedule = TemperatureSchedule::new([(0, 1.0), (10, 0.5), (30, 0.0)]);

        // No threshold strictly below move 0
        assert_eq!(schedule.temperature_at(0), GREEDY_TEMPERATURE);
        assert_eq!(schedule.temperature_at(1), 1.0);
        assert_eq!(schedule.temperature_at(10), 1.0);
        assert_eq!(schedule.temperature_at(11), 0.5);
        assert_eq!(schedule.temperature_at(31), 0.0);
        assert_eq!(schedule.temperature_at(u32::MAX), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let bad = [
            PolicyConfig::default().with_replay_capacity(0),
            PolicyConfig::default().with_min_train_capacity(11),
            PolicyConfig::default().with_min_train_capacity(0),
            PolicyConfig::default().with_batch_size(0),
            PolicyConfig::default().with_checkpoint_interval(0),
            PolicyConfig::default().with_validation(0, 0.55),
            PolicyConfig::default().with_validation(10, 1.5),
            PolicyConfig::default().with_root_noise(0.0, 0.25),
            PolicyConfig::default().with_root_noise(0.03, -0.1),
            PolicyConfig::default().with_exploration(f64::NAN),
            PolicyConfig::default()
                .with_temperature_schedule(TemperatureSchedule::new([(0, -1.0)])),
        ];

        for config in bad {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serialization() {
        let config = PolicyConfig::default()
            .with_temperature_schedule(TemperatureSchedule::new([(0, 1.0), (15, 0.1)]));
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PolicyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PolicyConfig =
            serde_json::from_str(r#"{"batch_size": 16, "temperature_schedule": {"0": 1.0, "8": 0.0}}"#)
                .unwrap();

        assert_eq!(config.batch_size, 16);
        assert_eq!(config.replay_capacity, 10);
        assert_eq!(config.temperature_schedule.temperature_at(5), 1.0);
        assert_eq!(config.temperature_schedule.temperature_at(9), 0.0);
    }
}
