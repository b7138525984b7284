// THEORY:
// This file is the main entry point for the `ssim_vision` library crate. It
// exports the comparison pipeline (`compare`, `SsimEngine`, `SsimConfig`) and the
// data types it consumes and produces as the high-level interface of the engine.
//
// The building blocks in `core_modules` (window construction, convolution,
// per-channel dispatch, the similarity formula) stay public for callers that want
// a single stage, but the pipeline is the one place they are wired together.

pub mod core_modules;
pub mod pipeline;

pub use core_modules::error::{SsimError, SsimResult};
pub use core_modules::error_metrics::{mae, mean_absolute_error, mean_squared_error, mse, rmse, root_mean_squared_error};
pub use core_modules::grid::grid::{Image, Plane, Shape, Window};
pub use core_modules::image_helper::{image_from_dynamic, save_similarity_map, similarity_map_to_luma};
pub use pipeline::{compare, compare_async, Comparison, EffectiveWindow, SsimConfig, SsimEngine};
