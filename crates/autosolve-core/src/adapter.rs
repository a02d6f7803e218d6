use crate::error::AdapterError;
use crate::params::{CameraOutputSpec, SolveThresholds};

/// Host-side tracking and solving capability consumed by the refinement
/// controller.
///
/// Implementations bridge to the host application's camera tracker. Every
/// operation blocks until the host is done, and all calls for a batch are
/// issued from the single batch worker; `&mut self` enforces that
/// serialization at the type level. The core contains no tracking or
/// solving mathematics itself, it only orchestrates call order and
/// threshold decisions.
pub trait SolveAdapter {
    /// Opaque handle to a tracking node owned by the host.
    type Node;
    /// Handle to a camera node created by the host.
    type Camera;

    /// Run 2D feature tracking over the node's plate.
    fn track_features(&mut self, node: &Self::Node) -> Result<(), AdapterError>;

    /// Solve the camera from the currently accepted tracks.
    fn solve_camera(&mut self, node: &Self::Node) -> Result<(), AdapterError>;

    /// Drop tracks the solver rejected under the given thresholds.
    fn delete_rejected_tracks(
        &mut self,
        node: &Self::Node,
        thresholds: &SolveThresholds,
    ) -> Result<(), AdapterError>;

    /// Drop tracks the host flags as invalid under the given thresholds.
    fn delete_invalid_tracks(
        &mut self,
        node: &Self::Node,
        thresholds: &SolveThresholds,
    ) -> Result<(), AdapterError>;

    /// Root-mean-square error of the current solve.
    fn compute_rmse(&mut self, node: &Self::Node) -> Result<f64, AdapterError>;

    /// Number of tracks still accepted by the solver.
    fn count_valid_tracks(&mut self, node: &Self::Node) -> Result<usize, AdapterError>;

    /// Create the output camera node described by `spec`, named
    /// `{spec.name_prefix}{plate_name(node)}`.
    fn create_camera_node(
        &mut self,
        node: &Self::Node,
        spec: &CameraOutputSpec,
    ) -> Result<Self::Camera, AdapterError>;

    /// Display name of the plate feeding this node.
    fn plate_name(&mut self, node: &Self::Node) -> Result<String, AdapterError>;
}
