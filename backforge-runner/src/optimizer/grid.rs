//! Exhaustive grid search.

use std::sync::Arc;

use tracing::info;

use super::{
    EvalPool, Objective, Optimizer, ParamSpace, Recorder, SearchError, SearchOutcome,
    SearchSettings,
};

/// Evaluates every combination of the space's grid values. Parameters are
/// enumerated in sorted name order with the last varying fastest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl Optimizer for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn search(
        &self,
        space: &ParamSpace,
        objective: Arc<dyn Objective>,
        settings: &SearchSettings,
    ) -> Result<SearchOutcome, SearchError> {
        let candidates = space.grid()?;
        let pool = EvalPool::new(settings.threads, settings.timeout)?;
        info!(
            method = self.name(),
            candidates = candidates.len(),
            threads = pool.threads(),
            "search started"
        );

        let mut recorder = Recorder::new(settings.direction);
        let evaluations = pool.evaluate(&objective, candidates, 0);
        recorder.record(evaluations, 0);
        Ok(recorder.finish(self.name()))
    }
}
