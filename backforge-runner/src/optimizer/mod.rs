//! Parameter optimizer: grid, random, genetic and surrogate-model search
//! behind one [`Optimizer`] trait.
//!
//! Every search follows the same loop: propose a batch of candidates, score
//! the batch on the worker pool, then append the results to the trace in
//! candidate order from a single thread. Because proposal only depends on
//! the seed and on previously recorded results, a search is reproducible
//! for any thread count.

pub mod genetic;
pub mod grid;
pub mod pool;
pub mod random;
pub mod space;
pub mod surrogate;
pub mod trace;

pub use genetic::{GeneticConfig, GeneticSearch};
pub use grid::GridSearch;
pub use pool::{EvalPool, Evaluation};
pub use random::RandomSearch;
pub use space::{ParamDomain, ParamSpace, SpaceError};
pub use surrogate::{SurrogateMinimizer, SurrogateSearch, TpeMinimizer};
pub use trace::{SearchTrace, TraceEntry, TraceError};

use std::sync::Arc;
use std::time::Duration;

use backforge_core::engine::Deadline;
use backforge_core::rng::RngHierarchy;
use backforge_core::ParamSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::objective::Direction;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid parameter space: {0}")]
    InvalidSpace(#[from] SpaceError),

    #[error("invalid search settings: {0}")]
    InvalidSettings(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("surrogate model: {0}")]
    Surrogate(String),
}

/// Per-evaluation context handed to the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// Global candidate index within the search.
    pub candidate: usize,
    /// Pass this to the simulator so a slow run aborts cooperatively.
    pub deadline: Deadline,
}

/// Scores one parameter set. Larger or smaller is better depending on the
/// search direction.
pub trait Objective: Send + Sync {
    fn evaluate(&self, params: &ParamSet, ctx: &EvalContext) -> anyhow::Result<f64>;
}

impl<F> Objective for F
where
    F: Fn(&ParamSet, &EvalContext) -> anyhow::Result<f64> + Send + Sync,
{
    fn evaluate(&self, params: &ParamSet, ctx: &EvalContext) -> anyhow::Result<f64> {
        self(params, ctx)
    }
}

/// Settings shared by every search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub direction: Direction,
    /// Worker threads; `None` uses available parallelism.
    pub threads: Option<usize>,
    /// Per-candidate wall-clock budget.
    pub timeout: Option<Duration>,
    pub seed: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            direction: Direction::Maximize,
            threads: None,
            timeout: None,
            seed: 42,
        }
    }
}

impl SearchSettings {
    pub fn maximize() -> Self {
        Self::default()
    }

    pub fn minimize() -> Self {
        Self {
            direction: Direction::Minimize,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn rng(&self) -> RngHierarchy {
        RngHierarchy::new(self.seed)
    }
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// `None` only when every candidate failed.
    pub best_params: Option<ParamSet>,
    /// [`Direction::worst`] when every candidate failed.
    pub best_score: f64,
    pub trace: SearchTrace,
}

pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn search(
        &self,
        space: &ParamSpace,
        objective: Arc<dyn Objective>,
        settings: &SearchSettings,
    ) -> Result<SearchOutcome, SearchError>;
}

/// Which search to run, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchMethod {
    #[default]
    Grid,
    Random {
        n_iter: usize,
    },
    Genetic(GeneticConfig),
    Bayesian {
        n_calls: usize,
        #[serde(default = "default_initial_points")]
        n_initial_points: usize,
    },
}

fn default_initial_points() -> usize {
    10
}

impl SearchMethod {
    pub fn build(&self) -> Box<dyn Optimizer> {
        match self {
            Self::Grid => Box::new(GridSearch),
            Self::Random { n_iter } => Box::new(RandomSearch::new(*n_iter)),
            Self::Genetic(config) => Box::new(GeneticSearch::new(config.clone())),
            Self::Bayesian {
                n_calls,
                n_initial_points,
            } => Box::new(SurrogateSearch::tpe(*n_calls, *n_initial_points)),
        }
    }
}

/// Single writer that appends batch results to the trace in candidate order
/// and tracks the running best.
pub(crate) struct Recorder {
    trace: SearchTrace,
    best: Option<(ParamSet, f64)>,
}

impl Recorder {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            trace: SearchTrace::new(direction),
            best: None,
        }
    }

    pub(crate) fn next_index(&self) -> usize {
        self.trace.len()
    }

    pub(crate) fn best(&self) -> Option<&(ParamSet, f64)> {
        self.best.as_ref()
    }

    /// Append `evaluations` as batch `batch` and return their effective
    /// scores in the same order.
    pub(crate) fn record(&mut self, evaluations: Vec<Evaluation>, batch: usize) -> Vec<f64> {
        let direction = self.trace.direction;
        let mut scores = Vec::with_capacity(evaluations.len());
        for eval in evaluations {
            let (score, error) = match eval.outcome {
                Ok(score) => (Some(score), None),
                Err(e) => (None, Some(e)),
            };
            if let Some(s) = score {
                let improves = self
                    .best
                    .as_ref()
                    .map_or(true, |(_, b)| direction.is_better(s, *b));
                if improves {
                    self.best = Some((eval.params.clone(), s));
                }
            }
            scores.push(score.unwrap_or_else(|| direction.worst()));
            self.trace.push(TraceEntry {
                index: self.trace.len(),
                batch,
                params: eval.params,
                score,
                error,
                elapsed_ms: eval.elapsed.as_millis() as u64,
            });
        }
        scores
    }

    pub(crate) fn finish(self, method: &str) -> SearchOutcome {
        let direction = self.trace.direction;
        let (best_params, best_score) = match self.best {
            Some((params, score)) => (Some(params), score),
            None => (None, direction.worst()),
        };
        info!(
            method,
            candidates = self.trace.len(),
            failures = self.trace.failures(),
            best_score,
            "search complete"
        );
        SearchOutcome {
            best_params,
            best_score,
            trace: self.trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backforge_core::ParamValue;

    fn eval(x: i64, outcome: Result<f64, String>) -> Evaluation {
        Evaluation {
            params: ParamSet::from([("x".to_string(), ParamValue::Int(x))]),
            outcome,
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn recorder_tracks_best_and_failures() {
        let mut rec = Recorder::new(Direction::Maximize);
        let scores = rec.record(
            vec![eval(1, Ok(1.0)), eval(2, Err("boom".into())), eval(3, Ok(4.0))],
            0,
        );
        assert_eq!(scores, [1.0, f64::NEG_INFINITY, 4.0]);
        rec.record(vec![eval(4, Ok(4.0))], 1);

        let outcome = rec.finish("test");
        assert_eq!(outcome.best_score, 4.0);
        assert_eq!(outcome.best_params.unwrap()["x"], ParamValue::Int(3));
        assert_eq!(outcome.trace.len(), 4);
        assert_eq!(outcome.trace.entries[3].index, 3);
        assert_eq!(outcome.trace.entries[3].batch, 1);
        assert_eq!(outcome.trace.entries[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn all_failures_yield_worst() {
        let mut rec = Recorder::new(Direction::Minimize);
        rec.record(vec![eval(1, Err("x".into()))], 0);
        let outcome = rec.finish("test");
        assert!(outcome.best_params.is_none());
        assert_eq!(outcome.best_score, f64::INFINITY);
    }

    #[test]
    fn search_method_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            method: SearchMethod,
        }
        let w: Wrapper =
            toml::from_str("[method]\nkind = \"bayesian\"\nn_calls = 30\n").unwrap();
        assert_eq!(
            w.method,
            SearchMethod::Bayesian {
                n_calls: 30,
                n_initial_points: 10
            }
        );
        assert_eq!(w.method.build().name(), "bayesian");
    }
}
