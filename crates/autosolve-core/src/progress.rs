use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::params::SolveThresholds;

/// Lifecycle phase of one node's refinement run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Tracking,
    Solving,
    Refining,
    CreatingOutput,
    Completed,
    Failed,
    Cancelled,
}

/// Immutable progress snapshot published by the batch worker.
///
/// Events for a node arrive in phase-then-iteration order; across nodes
/// they follow batch order with no interleaving, because only one
/// controller runs at a time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub node_index: usize,
    pub total_nodes: usize,
    pub phase: Phase,
    /// Completed refinement passes at the time of the event.
    pub iteration: u32,
    pub rmse_before: Option<f64>,
    pub rmse_after: Option<f64>,
    /// Thresholds in effect when the event was produced.
    pub thresholds: SolveThresholds,
}

/// Single-producer, multi-consumer progress fan-out.
///
/// Observers subscribe before the run starts and drain their receiver on
/// their own thread; publishing clones the event to every live subscriber
/// over an unbounded channel and never blocks the worker. A subscriber
/// whose receiver was dropped is pruned on the next publish.
#[derive(Debug, Default)]
pub struct ProgressPublisher {
    subscribers: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer. Only events published after the call are seen.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: ProgressEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
