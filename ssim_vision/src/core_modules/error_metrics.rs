// THEORY:
// Plain per-sample error metrics, kept next to SSIM because callers often want
// a cheap pixel-level number alongside the perceptual one. They see every
// sample of both images with equal weight and know nothing about windows.

use crate::core_modules::error::SsimResult;
use crate::core_modules::grid::grid::Image;

/// Mean of `|a - b|` over every sample.
pub fn mean_absolute_error(a: &Image, b: &Image) -> SsimResult<f64> {
    Ok(a.zip_map(b, |x, y| (x - y).abs())?.mean())
}

/// Mean of `(a - b)^2` over every sample.
pub fn mean_squared_error(a: &Image, b: &Image) -> SsimResult<f64> {
    Ok(a.zip_map(b, |x, y| (x - y) * (x - y))?.mean())
}

pub fn root_mean_squared_error(a: &Image, b: &Image) -> SsimResult<f64> {
    mean_squared_error(a, b).map(f64::sqrt)
}

pub use self::mean_absolute_error as mae;
pub use self::mean_squared_error as mse;
pub use self::root_mean_squared_error as rmse;
