//! Scripted [`SolveAdapter`] for tests and offline demos.
//!
//! Each node carries an RMSE schedule consumed one value per solve. The
//! adapter records every operation it receives, so tests can assert call
//! order and that halted nodes were never touched.

use std::collections::HashMap;

use crate::adapter::SolveAdapter;
use crate::error::AdapterError;
use crate::params::{CameraOutputSpec, SolveThresholds};

/// Deterministic behavior script for one node.
#[derive(Clone, Debug)]
pub struct NodeScript {
    /// Plate name reported by `plate_name`.
    pub name: String,
    /// RMSE values returned by successive `compute_rmse` calls. The last
    /// value repeats once the schedule is exhausted; an empty schedule
    /// makes `compute_rmse` fail.
    pub rmse_schedule: Vec<f64>,
    /// Valid-track counts returned by successive `count_valid_tracks`
    /// calls, with the same repeat-last rule.
    pub valid_tracks: Vec<usize>,
    /// Optional injected failure.
    pub failure: Option<FailureInjection>,
}

/// Fail the `at_call`-th invocation (1-based) of `operation`.
#[derive(Clone, Copy, Debug)]
pub struct FailureInjection {
    pub operation: &'static str,
    pub at_call: usize,
}

impl NodeScript {
    pub fn new(name: impl Into<String>, rmse_schedule: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            rmse_schedule,
            valid_tracks: vec![100],
            failure: None,
        }
    }

    #[must_use]
    pub fn with_valid_tracks(mut self, counts: Vec<usize>) -> Self {
        self.valid_tracks = counts;
        self
    }

    #[must_use]
    pub fn with_failure(mut self, operation: &'static str, at_call: usize) -> Self {
        self.failure = Some(FailureInjection { operation, at_call });
        self
    }
}

#[derive(Debug, Default)]
struct NodeRuntime {
    rmse_cursor: usize,
    tracks_cursor: usize,
    op_calls: HashMap<&'static str, usize>,
}

/// Node handles are indices into the adapter's script table.
pub type ScriptedNodeId = usize;

/// Adapter that replays per-node scripts instead of talking to a host.
#[derive(Debug)]
pub struct ScriptedAdapter {
    scripts: Vec<NodeScript>,
    runtime: Vec<NodeRuntime>,
    calls: Vec<(ScriptedNodeId, &'static str)>,
}

impl ScriptedAdapter {
    pub fn new(scripts: Vec<NodeScript>) -> Self {
        let runtime = scripts.iter().map(|_| NodeRuntime::default()).collect();
        Self {
            scripts,
            runtime,
            calls: Vec::new(),
        }
    }

    /// Node handles for the whole script table, in script order.
    pub fn node_ids(&self) -> Vec<ScriptedNodeId> {
        (0..self.scripts.len()).collect()
    }

    /// Every `(node, operation)` received so far, in call order.
    pub fn calls(&self) -> &[(ScriptedNodeId, &'static str)] {
        &self.calls
    }

    /// Record the call and apply any injected failure.
    fn step(&mut self, node: ScriptedNodeId, op: &'static str) -> Result<(), AdapterError> {
        self.calls.push((node, op));
        let script = self
            .scripts
            .get(node)
            .ok_or_else(|| AdapterError::new(op, format!("unknown node handle {node}")))?;
        let count = self.runtime[node].op_calls.entry(op).or_insert(0);
        *count += 1;
        if let Some(failure) = script.failure {
            if failure.operation == op && failure.at_call == *count {
                return Err(AdapterError::new(op, "scripted failure"));
            }
        }
        Ok(())
    }
}

impl SolveAdapter for ScriptedAdapter {
    type Node = ScriptedNodeId;
    type Camera = String;

    fn track_features(&mut self, node: &ScriptedNodeId) -> Result<(), AdapterError> {
        self.step(*node, "track_features")
    }

    fn solve_camera(&mut self, node: &ScriptedNodeId) -> Result<(), AdapterError> {
        self.step(*node, "solve_camera")
    }

    fn delete_rejected_tracks(
        &mut self,
        node: &ScriptedNodeId,
        _thresholds: &SolveThresholds,
    ) -> Result<(), AdapterError> {
        self.step(*node, "delete_rejected_tracks")
    }

    fn delete_invalid_tracks(
        &mut self,
        node: &ScriptedNodeId,
        _thresholds: &SolveThresholds,
    ) -> Result<(), AdapterError> {
        self.step(*node, "delete_invalid_tracks")
    }

    fn compute_rmse(&mut self, node: &ScriptedNodeId) -> Result<f64, AdapterError> {
        self.step(*node, "compute_rmse")?;
        let script = &self.scripts[*node];
        if script.rmse_schedule.is_empty() {
            return Err(AdapterError::new("compute_rmse", "rmse schedule is empty"));
        }
        let cursor = self.runtime[*node].rmse_cursor;
        let index = cursor.min(script.rmse_schedule.len() - 1);
        self.runtime[*node].rmse_cursor = cursor + 1;
        Ok(script.rmse_schedule[index])
    }

    fn count_valid_tracks(&mut self, node: &ScriptedNodeId) -> Result<usize, AdapterError> {
        self.step(*node, "count_valid_tracks")?;
        let script = &self.scripts[*node];
        if script.valid_tracks.is_empty() {
            return Ok(0);
        }
        let cursor = self.runtime[*node].tracks_cursor;
        let index = cursor.min(script.valid_tracks.len() - 1);
        self.runtime[*node].tracks_cursor = cursor + 1;
        Ok(script.valid_tracks[index])
    }

    fn create_camera_node(
        &mut self,
        node: &ScriptedNodeId,
        spec: &CameraOutputSpec,
    ) -> Result<String, AdapterError> {
        self.step(*node, "create_camera_node")?;
        Ok(spec.camera_name(&self.scripts[*node].name))
    }

    fn plate_name(&mut self, node: &ScriptedNodeId) -> Result<String, AdapterError> {
        self.step(*node, "plate_name")?;
        Ok(self.scripts[*node].name.clone())
    }
}
