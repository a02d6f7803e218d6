//! Bounded camera-solve refinement for automated tracking.
//!
//! The crate orchestrates an external tracking/solving host through the
//! [`SolveAdapter`] seam: track features, solve, then repeatedly prune
//! marginal tracks under progressively tighter thresholds and re-solve
//! until the RMSE drops below the control error or the iteration budget
//! runs out. [`BatchRunner`] sequences runs over several nodes with
//! stop-on-first-error semantics, [`ProgressPublisher`] fans immutable
//! progress events out to observers, and [`CancelToken`] provides
//! cooperative cancellation checked only between host calls.
//!
//! All host calls for a batch happen on one worker ([`spawn_batch`] gives
//! it a dedicated thread); the calling thread only consumes events,
//! cancels, and collects the final [`BatchResult`].
//!
//! ## Quickstart
//!
//! ```
//! use autosolve_core::sim::{NodeScript, ScriptedAdapter};
//! use autosolve_core::{BatchRunner, CameraOutputSpec, SolveParameters};
//!
//! let adapter = ScriptedAdapter::new(vec![NodeScript::new(
//!     "plate_010",
//!     vec![3.2, 2.1, 1.4, 0.8],
//! )]);
//! let mut runner = BatchRunner::new(adapter);
//! let result = runner.run(&[0], &SolveParameters::default(), &CameraOutputSpec::default());
//! assert!(result.fully_succeeded());
//! ```

mod adapter;
mod batch;
mod cancel;
mod controller;
mod error;
mod logger;
mod params;
mod progress;

pub mod registry;
pub mod sim;

pub use adapter::SolveAdapter;
pub use batch::{spawn_batch, BatchEntry, BatchHandle, BatchResult, BatchRunner};
pub use cancel::CancelToken;
pub use controller::{NodeOutcome, RefinementController};
pub use error::{AdapterError, SolveError};
pub use logger::init_with_level;
pub use params::{
    CameraOutputSpec, LinkMode, SolveParameters, SolveThresholds, THRESHOLD_FLOOR, TIGHTEN_STEP,
};
pub use progress::{Phase, ProgressEvent, ProgressPublisher};
