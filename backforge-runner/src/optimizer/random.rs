//! Random search: `n_iter` independent uniform draws from the space.

use std::sync::Arc;

use tracing::info;

use super::{
    EvalPool, Objective, Optimizer, ParamSpace, Recorder, SearchError, SearchOutcome,
    SearchSettings,
};

const STREAM: &str = "random-search";

#[derive(Debug, Clone, Copy)]
pub struct RandomSearch {
    pub n_iter: usize,
}

impl RandomSearch {
    pub fn new(n_iter: usize) -> Self {
        Self { n_iter }
    }
}

impl Optimizer for RandomSearch {
    fn name(&self) -> &'static str {
        "random"
    }

    fn search(
        &self,
        space: &ParamSpace,
        objective: Arc<dyn Objective>,
        settings: &SearchSettings,
    ) -> Result<SearchOutcome, SearchError> {
        space.validate()?;
        if self.n_iter == 0 {
            return Err(SearchError::InvalidSettings("n_iter must be at least 1".into()));
        }

        // Candidate i draws from its own stream so proposals never depend on
        // how many values earlier candidates consumed.
        let rng = settings.rng();
        let candidates = (0..self.n_iter)
            .map(|i| space.sample(&mut rng.rng_for(STREAM, i as u64)))
            .collect();

        let pool = EvalPool::new(settings.threads, settings.timeout)?;
        info!(
            method = self.name(),
            candidates = self.n_iter,
            threads = pool.threads(),
            "search started"
        );
        let mut recorder = Recorder::new(settings.direction);
        let evaluations = pool.evaluate(&objective, candidates, 0);
        recorder.record(evaluations, 0);
        Ok(recorder.finish(self.name()))
    }
}
