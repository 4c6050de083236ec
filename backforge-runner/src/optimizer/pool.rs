//! Worker pool: evaluates a batch of candidates in parallel and returns the
//! results in candidate order.
//!
//! Without a timeout a candidate runs directly on a pool thread. With one,
//! the candidate runs on its own thread while the pool thread waits on a
//! channel; a candidate still running at its deadline is recorded as timed
//! out and left to finish in the background.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backforge_core::engine::Deadline;
use backforge_core::ParamSet;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::{EvalContext, Objective, SearchError};

/// Result of one candidate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub params: ParamSet,
    pub outcome: Result<f64, String>,
    pub elapsed: Duration,
}

/// Rayon pool built once per search.
pub struct EvalPool {
    pool: rayon::ThreadPool,
    timeout: Option<Duration>,
}

impl EvalPool {
    /// `threads == None` uses available parallelism.
    pub fn new(threads: Option<usize>, timeout: Option<Duration>) -> Result<Self, SearchError> {
        let threads = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("backforge-eval-{i}"))
            .build()?;
        Ok(Self { pool, timeout })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate `candidates`. `first_index` numbers the candidates globally
    /// so objectives can tell them apart. Output order matches input order.
    pub fn evaluate(
        &self,
        objective: &Arc<dyn Objective>,
        candidates: Vec<ParamSet>,
        first_index: usize,
    ) -> Vec<Evaluation> {
        let timeout = self.timeout;
        self.pool.install(|| {
            candidates
                .into_par_iter()
                .enumerate()
                .map(|(i, params)| evaluate_one(objective, params, first_index + i, timeout))
                .collect()
        })
    }
}

/// How a single objective call ended.
enum Call {
    Returned(anyhow::Result<f64>),
    Panicked(String),
    Abandoned,
    NotStarted(String),
}

fn evaluate_one(
    objective: &Arc<dyn Objective>,
    params: ParamSet,
    index: usize,
    timeout: Option<Duration>,
) -> Evaluation {
    let deadline = timeout.map(Deadline::after).unwrap_or_default();
    let ctx = EvalContext {
        candidate: index,
        deadline,
    };
    let started = Instant::now();
    let call = match timeout {
        None => call_guarded(objective.as_ref(), &params, &ctx),
        Some(_) => call_with_deadline(objective, &params, ctx),
    };
    let elapsed = started.elapsed();

    let outcome = match call {
        Call::Panicked(msg) => Err(format!("objective panicked: {msg}")),
        Call::NotStarted(e) => Err(format!("could not start evaluation thread: {e}")),
        Call::Abandoned => Err(format!("timed out after {} ms", elapsed.as_millis())),
        Call::Returned(_) if deadline.is_expired() => Err(format!(
            "timed out after {} ms",
            elapsed.as_millis()
        )),
        Call::Returned(Err(e)) => Err(format!("{e:#}")),
        Call::Returned(Ok(score)) if !score.is_finite() => {
            Err(format!("non-finite score {score}"))
        }
        Call::Returned(Ok(score)) => Ok(score),
    };
    if let Err(reason) = &outcome {
        debug!(candidate = index, reason = %reason, "candidate failed");
    }
    Evaluation {
        params,
        outcome,
        elapsed,
    }
}

fn call_guarded(objective: &dyn Objective, params: &ParamSet, ctx: &EvalContext) -> Call {
    match catch_unwind(AssertUnwindSafe(|| objective.evaluate(params, ctx))) {
        Ok(result) => Call::Returned(result),
        Err(panic) => Call::Panicked(panic_message(panic.as_ref())),
    }
}

/// Run the objective on a dedicated thread and stop waiting at the deadline.
fn call_with_deadline(objective: &Arc<dyn Objective>, params: &ParamSet, ctx: EvalContext) -> Call {
    let (tx, rx) = mpsc::channel();
    let objective = Arc::clone(objective);
    let owned = params.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("backforge-candidate-{}", ctx.candidate))
        .spawn(move || {
            // The receiver is gone once the candidate has been abandoned.
            let _ = tx.send(call_guarded(objective.as_ref(), &owned, &ctx));
        });
    if let Err(e) = spawned {
        return Call::NotStarted(e.to_string());
    }

    let wait = ctx.deadline.remaining().unwrap_or(Duration::ZERO);
    match rx.recv_timeout(wait) {
        Ok(call) => call,
        Err(RecvTimeoutError::Timeout) => {
            warn!(candidate = ctx.candidate, "candidate still running at its deadline, abandoned");
            Call::Abandoned
        }
        Err(RecvTimeoutError::Disconnected) => {
            Call::Panicked("evaluation thread exited without a result".to_string())
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
