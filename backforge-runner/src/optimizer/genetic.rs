//! Genetic algorithm search.
//!
//! One generation is one batch on the worker pool. Breeding happens on the
//! calling thread from a per-generation RNG stream, so the population
//! sequence is fixed by the seed.

use std::sync::Arc;

use backforge_core::ParamSet;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    EvalPool, Objective, Optimizer, ParamSpace, Recorder, SearchError, SearchOutcome,
    SearchSettings,
};
use crate::objective::Direction;

const INIT_STREAM: &str = "ga-init";
const BREED_STREAM: &str = "ga-breed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population: usize,
    pub generations: usize,
    /// Per-parameter mutation probability.
    pub mutation_rate: f64,
    /// Gaussian mutation width as a fraction of a continuous range.
    pub mutation_sigma: f64,
    /// Carry the global best into the next generation.
    pub elitism: bool,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population: 20,
            generations: 10,
            mutation_rate: 0.1,
            mutation_sigma: 0.1,
            elitism: false,
        }
    }
}

impl GeneticConfig {
    pub fn new(population: usize, generations: usize) -> Self {
        Self {
            population,
            generations,
            ..Self::default()
        }
    }

    pub fn with_elitism(mut self, elitism: bool) -> Self {
        self.elitism = elitism;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Total objective calls: initial population plus each bred generation.
    pub fn evaluations(&self) -> usize {
        self.population * (self.generations + 1)
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.population < 2 {
            return Err(SearchError::InvalidSettings(
                "population must be at least 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(SearchError::InvalidSettings(format!(
                "mutation_rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if !(self.mutation_sigma.is_finite() && self.mutation_sigma >= 0.0) {
            return Err(SearchError::InvalidSettings(format!(
                "mutation_sigma must be finite and >= 0, got {}",
                self.mutation_sigma
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GeneticSearch {
    pub config: GeneticConfig,
}

impl GeneticSearch {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    /// Binary tournament: two distinct individuals, keep the fitter. Ties go
    /// to the first drawn.
    fn tournament_select<'a>(
        population: &'a [ParamSet],
        scores: &[f64],
        direction: Direction,
        rng: &mut StdRng,
    ) -> &'a ParamSet {
        let a = rng.gen_range(0..population.len());
        let mut b = rng.gen_range(0..population.len() - 1);
        if b >= a {
            b += 1;
        }
        if direction.is_better(scores[b], scores[a]) {
            &population[b]
        } else {
            &population[a]
        }
    }

    /// Uniform crossover: each parameter swaps between the children with
    /// probability 0.5.
    fn crossover(p1: &ParamSet, p2: &ParamSet, rng: &mut StdRng) -> (ParamSet, ParamSet) {
        let mut c1 = p1.clone();
        let mut c2 = p2.clone();
        for (name, v1) in p1 {
            if rng.gen_bool(0.5) {
                if let Some(v2) = p2.get(name) {
                    c1.insert(name.clone(), v2.clone());
                    c2.insert(name.clone(), v1.clone());
                }
            }
        }
        (c1, c2)
    }

    fn mutate(&self, child: &mut ParamSet, space: &ParamSpace, rng: &mut StdRng) {
        for (name, domain) in space.iter() {
            if rng.gen_bool(self.config.mutation_rate) {
                let next = match child.get(name) {
                    Some(current) => domain.mutate(current, self.config.mutation_sigma, rng),
                    None => domain.sample(rng),
                };
                child.insert(name.to_string(), next);
            }
        }
    }

    fn breed(
        &self,
        space: &ParamSpace,
        population: &[ParamSet],
        scores: &[f64],
        elite: Option<&ParamSet>,
        direction: Direction,
        rng: &mut StdRng,
    ) -> Vec<ParamSet> {
        let size = self.config.population;
        let n_parents = size / 2;
        let parents: Vec<&ParamSet> = (0..n_parents)
            .map(|_| Self::tournament_select(population, scores, direction, rng))
            .collect();

        let mut next = Vec::with_capacity(size);
        for pair in parents.chunks_exact(2) {
            let (mut c1, mut c2) = Self::crossover(pair[0], pair[1], rng);
            self.mutate(&mut c1, space, rng);
            self.mutate(&mut c2, space, rng);
            next.push(c1);
            next.push(c2);
        }
        next.truncate(size);

        if let Some(elite) = elite {
            if next.len() < size {
                next.push(elite.clone());
            } else if let Some(last) = next.last_mut() {
                *last = elite.clone();
            }
        }
        while next.len() < size {
            next.push(space.sample(rng));
        }
        next
    }
}

impl Optimizer for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn search(
        &self,
        space: &ParamSpace,
        objective: Arc<dyn Objective>,
        settings: &SearchSettings,
    ) -> Result<SearchOutcome, SearchError> {
        space.validate()?;
        self.config.validate()?;
        let pool = EvalPool::new(settings.threads, settings.timeout)?;
        let rng = settings.rng();
        info!(
            method = self.name(),
            population = self.config.population,
            generations = self.config.generations,
            candidates = self.config.evaluations(),
            threads = pool.threads(),
            "search started"
        );

        let mut init_rng = rng.rng_for(INIT_STREAM, 0);
        let mut population: Vec<ParamSet> = (0..self.config.population)
            .map(|_| space.sample(&mut init_rng))
            .collect();

        let mut recorder = Recorder::new(settings.direction);
        for generation in 0..=self.config.generations {
            let first = recorder.next_index();
            let evaluations = pool.evaluate(&objective, population.clone(), first);
            let scores = recorder.record(evaluations, generation);
            debug!(
                generation,
                best = ?recorder.best().map(|(_, s)| *s),
                "generation evaluated"
            );
            if generation == self.config.generations {
                break;
            }

            let elite = if self.config.elitism {
                recorder.best().map(|(p, _)| p.clone())
            } else {
                None
            };
            let mut breed_rng = rng.rng_for(BREED_STREAM, generation as u64);
            population = self.breed(
                space,
                &population,
                &scores,
                elite.as_ref(),
                settings.direction,
                &mut breed_rng,
            );
        }
        Ok(recorder.finish(self.name()))
    }
}
