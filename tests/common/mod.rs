//! Shared fixtures: a small board environment, a scripted model, a scripted
//! tournament and a residual model factory.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mcts_policy::core::{ActionList, Environment};
use mcts_policy::nn::{
    EncodedState, FitDiagnostics, ModelError, ModelFactory, PolicyValueModel, Prediction,
    ResidualArchitecture, TrainingBatch,
};
use mcts_policy::policy::PolicyManager;
use mcts_policy::training::{Tournament, TournamentError, TournamentRecord};

/// One row of cells; an action marks an empty cell.
#[derive(Clone, Debug)]
pub struct RowEnv {
    pub width: usize,
}

impl RowEnv {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Board with the given cells already filled.
    pub fn board(&self, filled: &[usize]) -> EncodedState {
        let mut state = EncodedState::zeros(vec![self.width]);
        for &cell in filled {
            state.tensor[cell] = 1.0;
        }
        state
    }
}

impl Environment for RowEnv {
    type State = EncodedState;

    fn state_shape(&self) -> Vec<usize> {
        vec![self.width]
    }

    fn action_space(&self) -> usize {
        self.width
    }

    fn legal_actions(&self, state: &EncodedState) -> ActionList {
        (0..self.width).filter(|&a| state.tensor[a] == 0.0).collect()
    }
}

/// Failure injected into `fit`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitFault {
    None,
    ErrorAt(u64),
    PanicAt(u64),
}

/// Model with a fixed policy whose value is the number of `fit` calls this
/// instance has seen, so snapshots taken at different times are tellable
/// apart.
#[derive(Clone, Debug)]
pub struct ScriptedModel {
    pub input_shape: Vec<usize>,
    pub policy: Vec<f32>,
    pub fit_count: u64,
    pub fault: FitFault,
    pub total_fits: Arc<AtomicU64>,
    pub saved: Arc<Mutex<Vec<String>>>,
    pub predictions: Arc<AtomicU64>,
}

impl ScriptedModel {
    pub fn uniform(input_shape: Vec<usize>, action_space: usize) -> Self {
        Self::with_policy(input_shape, vec![1.0 / action_space as f32; action_space])
    }

    pub fn with_policy(input_shape: Vec<usize>, policy: Vec<f32>) -> Self {
        Self {
            input_shape,
            policy,
            fit_count: 0,
            fault: FitFault::None,
            total_fits: Arc::new(AtomicU64::new(0)),
            saved: Arc::new(Mutex::new(Vec::new())),
            predictions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_fault(mut self, fault: FitFault) -> Self {
        self.fault = fault;
        self
    }

    pub fn saved_tags(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

impl PolicyValueModel for ScriptedModel {
    fn input_shape(&self) -> Vec<usize> {
        self.input_shape.clone()
    }

    fn action_space(&self) -> usize {
        self.policy.len()
    }

    fn predict(&self, state: &EncodedState) -> Result<Prediction, ModelError> {
        if state.shape != self.input_shape {
            return Err(ModelError::PredictionFailed(format!(
                "expected shape {:?}, got {:?}",
                self.input_shape, state.shape
            )));
        }
        self.predictions.fetch_add(1, Ordering::Relaxed);
        Ok(Prediction {
            policy: self.policy.clone(),
            value: self.fit_count as f32,
        })
    }

    fn fit(&mut self, batch: &TrainingBatch, epoch: u64) -> Result<FitDiagnostics, ModelError> {
        match self.fault {
            FitFault::ErrorAt(at) if at == epoch => {
                return Err(ModelError::FitFailed(format!("injected failure at epoch {epoch}")));
            }
            FitFault::PanicAt(at) if at == epoch => panic!("injected panic at epoch {epoch}"),
            _ => {}
        }
        if batch.states.iter().any(|s| s.shape != self.input_shape) {
            return Err(ModelError::FitFailed("batch shape mismatch".into()));
        }
        self.fit_count += 1;
        self.total_fits.fetch_add(1, Ordering::Relaxed);
        Ok(FitDiagnostics {
            loss: 1.0 / self.fit_count as f32,
            ..Default::default()
        })
    }

    fn save(&self, tag: &str) -> Result<(), ModelError> {
        self.saved.lock().unwrap().push(tag.to_string());
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn PolicyValueModel> {
        Box::new(self.clone())
    }
}

/// Factory that remembers the sizes it was asked for.
#[derive(Default)]
pub struct RecordingFactory {
    pub requests: Mutex<Vec<(Vec<usize>, usize, ResidualArchitecture)>>,
}

impl ModelFactory for RecordingFactory {
    fn build(
        &self,
        input_shape: &[usize],
        action_space: usize,
        architecture: &ResidualArchitecture,
    ) -> Box<dyn PolicyValueModel> {
        self.requests
            .lock()
            .unwrap()
            .push((input_shape.to_vec(), action_space, architecture.clone()));
        Box::new(ScriptedModel::uniform(input_shape.to_vec(), action_space))
    }
}

/// What a tournament saw of one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct SeatView {
    pub model_value: f32,
    pub training: bool,
    pub greedy: bool,
}

/// Returns fixed records and reports what each seat looked like.
pub struct ScriptedTournament {
    pub records: Vec<TournamentRecord>,
    pub seen: Arc<Mutex<Vec<SeatView>>>,
    pub board: EncodedState,
}

impl ScriptedTournament {
    /// Live agent gets `games - candidate_wins` wins, candidate the rest.
    pub fn candidate_wins(candidate_wins: u32, games: u32, board: EncodedState) -> Self {
        let live = TournamentRecord {
            wins: games - candidate_wins,
            losses: candidate_wins,
            draws: 0,
        };
        let candidate = TournamentRecord {
            wins: candidate_wins,
            losses: games - candidate_wins,
            draws: 0,
        };
        Self {
            records: vec![live, candidate],
            seen: Arc::new(Mutex::new(Vec::new())),
            board,
        }
    }
}

impl Tournament for ScriptedTournament {
    fn play(
        &mut self,
        agents: &mut [PolicyManager],
        _games: u32,
    ) -> Result<Vec<TournamentRecord>, TournamentError> {
        let mut seen = self.seen.lock().unwrap();
        seen.clear();
        for agent in agents.iter() {
            let neural = agent
                .as_neural()
                .ok_or_else(|| TournamentError::Failed("expected neural agents".into()))?;
            let model = neural
                .live_model()
                .map_err(|e| TournamentError::Failed(e.to_string()))?;
            let prediction = model
                .predict(&self.board)
                .map_err(|e| TournamentError::Failed(e.to_string()))?;
            seen.push(SeatView {
                model_value: prediction.value,
                training: neural.config().training,
                greedy: neural.config().temperature_schedule
                    == mcts_policy::mcts::TemperatureSchedule::greedy(),
            });
        }
        Ok(self.records.clone())
    }
}

/// Poll `cond` until it holds or a generous deadline passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
