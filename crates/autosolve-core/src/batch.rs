//! Sequential batch execution with stop-on-first-error and a dedicated
//! worker thread.

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use crate::adapter::SolveAdapter;
use crate::cancel::CancelToken;
use crate::controller::{NodeOutcome, RefinementController};
use crate::error::{AdapterError, SolveError};
use crate::params::{CameraOutputSpec, SolveParameters};
use crate::progress::{ProgressEvent, ProgressPublisher};

/// Outcome of one node, paired with its position in the input sequence.
#[derive(Debug)]
pub struct BatchEntry<C> {
    pub node_index: usize,
    pub outcome: NodeOutcome<C>,
}

/// Ordered per-node outcomes, truncated at the first `Failed` or
/// `Cancelled` entry. Nodes after the truncation point were never
/// attempted.
#[derive(Debug, Default)]
pub struct BatchResult<C> {
    pub entries: Vec<BatchEntry<C>>,
}

impl<C> BatchResult<C> {
    /// True when every entry produced a camera (converged or best-effort).
    pub fn fully_succeeded(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.outcome.has_camera())
    }
}

/// Runs one [`RefinementController`] per node, strictly sequentially, in
/// input order. The first `Failed` or `Cancelled` outcome halts the batch.
pub struct BatchRunner<A: SolveAdapter> {
    adapter: A,
    progress: ProgressPublisher,
    cancel: CancelToken,
}

impl<A: SolveAdapter> BatchRunner<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            progress: ProgressPublisher::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally created cancellation token instead of the
    /// runner's own.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for requesting cancellation of this batch. Cancelling stops
    /// the active controller at its next suspension point and prevents
    /// starting any later node.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Attach a progress observer. Must be called before [`run`](Self::run)
    /// to observe the whole batch.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Execute the batch on the calling thread.
    pub fn run(
        &mut self,
        nodes: &[A::Node],
        params: &SolveParameters,
        output: &CameraOutputSpec,
    ) -> BatchResult<A::Camera> {
        let total = nodes.len();
        let mut entries = Vec::with_capacity(total);

        for (node_index, node) in nodes.iter().enumerate() {
            let outcome = RefinementController::new(
                &mut self.adapter,
                &self.progress,
                &self.cancel,
                node_index,
                total,
            )
            .run(node, params, output);

            let stop = !outcome.has_camera();
            match &outcome {
                NodeOutcome::Solved {
                    final_rmse,
                    iterations,
                    ..
                } => log::info!(
                    "node {node_index}: solved in {iterations} iteration(s), RMSE {final_rmse:.4}"
                ),
                NodeOutcome::MaxIterationsReached {
                    final_rmse,
                    iterations,
                    ..
                } => log::info!(
                    "node {node_index}: best effort after {iterations} iteration(s), \
                     RMSE {final_rmse:.4}"
                ),
                NodeOutcome::Failed(err) => {
                    log::error!("node {node_index}: failed, halting batch: {err}")
                }
                NodeOutcome::Cancelled => log::info!("node {node_index}: cancelled"),
            }

            entries.push(BatchEntry {
                node_index,
                outcome,
            });
            if stop {
                break;
            }
        }

        BatchResult { entries }
    }
}

/// Live handle to a batch running on its own worker thread.
///
/// The worker exclusively owns the adapter and all solve state; the
/// creating thread only consumes progress events, requests cancellation,
/// and joins for the final result.
pub struct BatchHandle<C> {
    cancel: CancelToken,
    events: Receiver<ProgressEvent>,
    worker: JoinHandle<BatchResult<C>>,
}

impl<C> BatchHandle<C> {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Progress events published by the worker. The channel closes when
    /// the batch finishes.
    pub fn progress(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Wait for the batch to finish. A panic inside the adapter is
    /// reported as an error instead of unwinding into the caller.
    pub fn join(self) -> Result<BatchResult<C>, SolveError> {
        self.worker.join().map_err(|_| {
            SolveError::Adapter(AdapterError::new("batch worker", "worker thread panicked"))
        })
    }
}

/// Spawn a dedicated worker thread executing the whole batch.
///
/// All adapter calls happen on that single worker; the interactive thread
/// stays free to drain [`BatchHandle::progress`] and cancel.
pub fn spawn_batch<A>(
    adapter: A,
    nodes: Vec<A::Node>,
    params: SolveParameters,
    output: CameraOutputSpec,
) -> BatchHandle<A::Camera>
where
    A: SolveAdapter + Send + 'static,
    A::Node: Send + 'static,
    A::Camera: Send + 'static,
{
    let mut runner = BatchRunner::new(adapter);
    let cancel = runner.cancel_token();
    let events = runner.subscribe();
    let worker = thread::spawn(move || runner.run(&nodes, &params, &output));
    BatchHandle {
        cancel,
        events,
        worker,
    }
}
