// THEORY:
// Every failure this engine can produce is an input or programming error the
// caller must fix. Nothing is transient, so nothing is retried. The taxonomy is
// deliberately small:
//
// 1.  **ShapeMismatch**: the two images disagree on height, width, or channel
//     count. Checked once at the boundary, never per channel.
// 2.  **InvalidArgument**: a parameter outside its domain (non-positive
//     `max_val`, non-positive sigma, zero-sized grids, zero workers).
// 3.  **Dimension**: the 2-D convolver was handed something it cannot slide a
//     window over (a multi-channel grid, or a window larger than the plane).
// 4.  **WorkerFailure**: a per-channel task died. The whole comparison fails;
//     a partial similarity map is never returned.
// 5.  **Runtime**: the worker runtime itself could not be started.

use crate::core_modules::grid::grid::Shape;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SsimError {
    #[error("input images must have the same shape, got {left} and {right}")]
    ShapeMismatch { left: Shape, right: Shape },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("dimension error: {0}")]
    Dimension(String),
    #[error("worker for channel {channel} failed: {reason}")]
    WorkerFailure { channel: usize, reason: String },
    #[error("failed to start the worker runtime: {0}")]
    Runtime(String),
}

pub type SsimResult<T> = Result<T, SsimError>;
