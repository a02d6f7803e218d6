use serde::{Deserialize, Serialize};

use crate::error::SolveError;

/// Amount subtracted from `max_track_error` and `max_error` on each
/// tightening step.
pub const TIGHTEN_STEP: f64 = 0.25;

/// Lower clamp for the error thresholds. Tightening never drives a
/// threshold to zero or below.
pub const THRESHOLD_FLOOR: f64 = 0.25;

/// Track-acceptance thresholds in effect during one refinement pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveThresholds {
    /// Minimum number of frames a track must span to be kept.
    pub min_track_length: u32,
    /// Maximum per-track RMSE before the track is rejected.
    pub max_track_error: f64,
    /// Maximum reprojection error before the track is rejected.
    pub max_error: f64,
}

impl SolveThresholds {
    /// Thresholds for the next pass: longer minimum track length, tighter
    /// error bounds, clamped at [`THRESHOLD_FLOOR`].
    #[must_use]
    pub fn tightened(&self) -> Self {
        Self {
            min_track_length: self.min_track_length.saturating_add(1),
            max_track_error: (self.max_track_error - TIGHTEN_STEP).max(THRESHOLD_FLOOR),
            max_error: (self.max_error - TIGHTEN_STEP).max(THRESHOLD_FLOOR),
        }
    }
}

/// Immutable configuration for one refinement run.
///
/// A run never mutates its parameters; each pass derives a new
/// [`SolveThresholds`] snapshot via [`SolveThresholds::tightened`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveParameters {
    pub min_track_length: u32,
    pub max_track_error: f64,
    pub max_error: f64,
    /// Target RMSE. The refinement loop stops as soon as a solve lands
    /// below this value.
    pub control_error: f64,
    /// Refinement pass budget.
    pub max_iterations: u32,
}

impl Default for SolveParameters {
    fn default() -> Self {
        Self {
            min_track_length: 3,
            max_track_error: 4.0,
            max_error: 4.0,
            control_error: 1.0,
            max_iterations: 5,
        }
    }
}

impl SolveParameters {
    /// Reject malformed configurations before any adapter call is made.
    pub fn validate(&self) -> Result<(), SolveError> {
        if self.max_iterations < 1 {
            return Err(SolveError::InvalidParameters(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !self.control_error.is_finite() || self.control_error <= 0.0 {
            return Err(SolveError::InvalidParameters(
                "control_error must be positive and finite".into(),
            ));
        }
        if !self.max_track_error.is_finite() || self.max_track_error <= 0.0 {
            return Err(SolveError::InvalidParameters(
                "max_track_error must be positive and finite".into(),
            ));
        }
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(SolveError::InvalidParameters(
                "max_error must be positive and finite".into(),
            ));
        }
        if self.min_track_length < 1 {
            return Err(SolveError::InvalidParameters(
                "min_track_length must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Threshold snapshot for the first refinement pass.
    pub fn thresholds(&self) -> SolveThresholds {
        SolveThresholds {
            min_track_length: self.min_track_length,
            max_track_error: self.max_track_error,
            max_error: self.max_error,
        }
    }
}

/// How the output camera follows the solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    /// Camera knobs follow the solver through live expressions.
    Linked,
    /// Solved values are copied once into the camera.
    #[default]
    Baked,
}

/// Naming and linking for the camera node created after a solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraOutputSpec {
    pub name_prefix: String,
    pub link_mode: LinkMode,
}

impl Default for CameraOutputSpec {
    fn default() -> Self {
        Self {
            name_prefix: "cam_".to_string(),
            link_mode: LinkMode::Baked,
        }
    }
}

impl CameraOutputSpec {
    /// Full camera name for a node's plate.
    pub fn camera_name(&self, plate: &str) -> String {
        format!("{}{plate}", self.name_prefix)
    }
}
