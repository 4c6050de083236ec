//! Surrogate-model (bayesian) search.
//!
//! The search loop only knows the ask/tell protocol of
//! [`SurrogateMinimizer`]; [`TpeMinimizer`] is the shipped model. Each step
//! asks for one point, evaluates it on the pool, and tells the loss back, so
//! the sequence of proposals depends only on the seed and the scores.

use std::sync::Arc;

use backforge_core::{ParamSet, ParamValue};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use super::{
    EvalPool, Objective, Optimizer, ParamDomain, ParamSpace, Recorder, SearchError,
    SearchOutcome, SearchSettings,
};
use crate::objective::Direction;

const ASK_STREAM: &str = "tpe-ask";

/// Sequential model-based minimizer.
pub trait SurrogateMinimizer: Send {
    /// Propose the next point to evaluate.
    fn ask(&mut self, space: &ParamSpace, rng: &mut StdRng) -> Result<ParamSet, SearchError>;

    /// Report the loss observed at `params`. Lower is better; failed
    /// evaluations are told `f64::INFINITY`.
    fn tell(&mut self, params: ParamSet, loss: f64);
}

pub type MinimizerFactory = Arc<dyn Fn() -> Box<dyn SurrogateMinimizer> + Send + Sync>;

/// Drives a [`SurrogateMinimizer`] for `n_calls` evaluations.
#[derive(Clone)]
pub struct SurrogateSearch {
    pub n_calls: usize,
    factory: MinimizerFactory,
}

impl std::fmt::Debug for SurrogateSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrogateSearch")
            .field("n_calls", &self.n_calls)
            .finish_non_exhaustive()
    }
}

impl SurrogateSearch {
    /// Search with the default Tree-structured Parzen Estimator.
    pub fn tpe(n_calls: usize, n_initial_points: usize) -> Self {
        Self::with_minimizer(n_calls, move || {
            Box::new(TpeMinimizer::new(n_initial_points)) as Box<dyn SurrogateMinimizer>
        })
    }

    pub fn with_minimizer<F>(n_calls: usize, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SurrogateMinimizer> + Send + Sync + 'static,
    {
        Self {
            n_calls,
            factory: Arc::new(factory),
        }
    }
}

fn to_loss(direction: Direction, score: f64) -> f64 {
    if !score.is_finite() {
        return f64::INFINITY;
    }
    match direction {
        Direction::Maximize => -score,
        Direction::Minimize => score,
    }
}

impl Optimizer for SurrogateSearch {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn search(
        &self,
        space: &ParamSpace,
        objective: Arc<dyn Objective>,
        settings: &SearchSettings,
    ) -> Result<SearchOutcome, SearchError> {
        space.validate()?;
        if self.n_calls == 0 {
            return Err(SearchError::InvalidSettings("n_calls must be at least 1".into()));
        }
        let pool = EvalPool::new(settings.threads, settings.timeout)?;
        let rng = settings.rng();
        info!(
            method = self.name(),
            candidates = self.n_calls,
            threads = pool.threads(),
            "search started"
        );

        let mut minimizer = (self.factory)();
        let mut recorder = Recorder::new(settings.direction);
        for step in 0..self.n_calls {
            let params = minimizer.ask(space, &mut rng.rng_for(ASK_STREAM, step as u64))?;
            let evaluations = pool.evaluate(&objective, vec![params.clone()], step);
            let scores = recorder.record(evaluations, step);
            let score = scores.first().copied().unwrap_or_else(|| settings.direction.worst());
            minimizer.tell(params, to_loss(settings.direction, score));
        }
        Ok(recorder.finish(self.name()))
    }
}

// ─── Tree-structured Parzen Estimator ───────────────────────────────

/// TPE: split observations into the best `gamma` fraction and the rest,
/// model each with a Parzen density, and propose the candidate maximizing
/// `l(x) / g(x)`.
#[derive(Debug, Clone)]
pub struct TpeMinimizer {
    pub n_initial_points: usize,
    pub gamma: f64,
    pub n_candidates: usize,
    /// Kernel width as a fraction of a numeric range.
    pub bandwidth: f64,
    observations: Vec<(ParamSet, f64)>,
}

impl TpeMinimizer {
    pub fn new(n_initial_points: usize) -> Self {
        Self {
            n_initial_points,
            gamma: 0.2,
            n_candidates: 24,
            bandwidth: 0.1,
            observations: Vec::new(),
        }
    }

    pub fn observations(&self) -> &[(ParamSet, f64)] {
        &self.observations
    }

    /// Good and bad halves of the history, best first.
    fn split(&self) -> (Vec<&ParamSet>, Vec<&ParamSet>) {
        let mut sorted: Vec<&(ParamSet, f64)> = self.observations.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n = sorted.len();
        let n_good = ((n as f64 * self.gamma).ceil() as usize).clamp(1, n - 1);
        let mut good: Vec<&ParamSet> = sorted.into_iter().map(|(p, _)| p).collect();
        let bad = good.split_off(n_good);
        (good, bad)
    }

    fn sample_numerical(
        &self,
        name: &str,
        domain: &ParamDomain,
        (min, max): (f64, f64),
        good: &[&ParamSet],
        bad: &[&ParamSet],
        rng: &mut StdRng,
    ) -> ParamValue {
        let values = |group: &[&ParamSet]| -> Vec<f64> {
            group
                .iter()
                .filter_map(|p| p.get(name).and_then(ParamValue::as_f64))
                .collect()
        };
        let good_vals = values(good);
        let bad_vals = values(bad);
        let sigma = (max - min) * self.bandwidth;
        if good_vals.is_empty() || sigma <= 0.0 {
            return domain.sample(rng);
        }
        let Ok(unit) = Normal::new(0.0, sigma) else {
            return domain.sample(rng);
        };

        let mut best_val = good_vals[0];
        let mut best_ratio = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let base = good_vals[rng.gen_range(0..good_vals.len())];
            let candidate = (base + unit.sample(rng)).clamp(min, max);
            let lx = parzen(candidate, &good_vals, sigma);
            let gx = parzen(candidate, &bad_vals, sigma);
            let ratio = lx / (gx + 1e-10);
            if ratio > best_ratio {
                best_ratio = ratio;
                best_val = candidate;
            }
        }
        domain.snap(best_val)
    }

    fn sample_categorical(
        &self,
        name: &str,
        options: &[ParamValue],
        good: &[&ParamSet],
        bad: &[&ParamSet],
        rng: &mut StdRng,
    ) -> ParamValue {
        let counts = |group: &[&ParamSet]| -> Vec<f64> {
            let mut counts = vec![1.0; options.len()];
            for p in group {
                if let Some(idx) = p.get(name).and_then(|v| options.iter().position(|o| o == v)) {
                    counts[idx] += 1.0;
                }
            }
            counts
        };
        let good_w = counts(good);
        let bad_w = counts(bad);
        let (good_total, bad_total) = (good_w.iter().sum::<f64>(), bad_w.iter().sum::<f64>());

        let Ok(dist) = WeightedIndex::new(&good_w) else {
            return options[rng.gen_range(0..options.len())].clone();
        };
        let mut best_idx = 0;
        let mut best_ratio = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let idx = dist.sample(rng);
            let ratio = (good_w[idx] / good_total) / (bad_w[idx] / bad_total);
            if ratio > best_ratio {
                best_ratio = ratio;
                best_idx = idx;
            }
        }
        options[best_idx].clone()
    }
}

impl SurrogateMinimizer for TpeMinimizer {
    fn ask(&mut self, space: &ParamSpace, rng: &mut StdRng) -> Result<ParamSet, SearchError> {
        let finite = self.observations.iter().filter(|(_, l)| l.is_finite()).count();
        if self.observations.len() < self.n_initial_points.max(2) || finite == 0 {
            return Ok(space.sample(rng));
        }

        let (good, bad) = self.split();
        let mut proposal = ParamSet::new();
        for (name, domain) in space.iter() {
            let value = match (domain, domain.bounds()) {
                (ParamDomain::Discrete { values }, _) => {
                    self.sample_categorical(name, values, &good, &bad, rng)
                }
                (_, Some(bounds)) => self.sample_numerical(name, domain, bounds, &good, &bad, rng),
                (_, None) => domain.sample(rng),
            };
            proposal.insert(name.to_string(), value);
        }
        Ok(proposal)
    }

    fn tell(&mut self, params: ParamSet, loss: f64) {
        self.observations.push((params, loss));
    }
}

fn gaussian_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let exponent = -0.5 * ((x - mean) / sigma).powi(2);
    exponent.exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}

/// Mean of Gaussian kernels centred on `points`.
fn parzen(x: f64, points: &[f64], sigma: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|&p| gaussian_pdf(x, p, sigma)).sum::<f64>() / points.len() as f64
}
