//! Async front for a runner
//!
//! Batch prediction is blocking native work. [`Dispatcher`] bounds how many
//! batches run at once to the runner's sized capacity and executes each one
//! on Tokio's blocking pool so async worker threads never stall on it.

use crate::adapter::{BatchAdapter, Input, Predictions};
use crate::runner::Runner;
use futures::future::try_join_all;
use modelrun_kernel::{RunnerError, RunnerResult};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded async submission to a shared [`Runner`]
pub struct Dispatcher<A: BatchAdapter> {
    runner: Arc<Runner<A>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl<A: BatchAdapter> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            permits: Arc::clone(&self.permits),
            capacity: self.capacity,
        }
    }
}

impl<A: BatchAdapter> Dispatcher<A> {
    /// Permits: `num_replica * num_concurrency_per_replica`
    pub fn new(runner: Arc<Runner<A>>) -> Self {
        let capacity = runner.sizing().capacity().max(1);
        Self {
            runner,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn runner(&self) -> &Arc<Runner<A>> {
        &self.runner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a running batch
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one batch once a slot is free.
    ///
    /// # Errors
    /// Whatever [`Runner::run_batch`] returns; a panicked or cancelled
    /// blocking task is reported as `RunnerError::InferenceFailure`.
    pub async fn submit(&self, input: Input<A::Batch>) -> RunnerResult<Predictions> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| RunnerError::inference_failure(self.runner.tag(), e))?;

        let runner = Arc::clone(&self.runner);
        let tag = runner.tag().clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            runner.run_batch(input)
        })
        .await
        .map_err(|e| RunnerError::inference_failure(tag, e))?
    }

    /// Run several batches concurrently; results come back in input order.
    /// The first failure is returned and the remaining results discarded.
    pub async fn submit_all(
        &self,
        inputs: Vec<Input<A::Batch>>,
    ) -> RunnerResult<Vec<Predictions>> {
        try_join_all(inputs.into_iter().map(|input| self.submit(input))).await
    }
}
