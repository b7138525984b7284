// THEORY:
// The `kernel` module produces the Gaussian weighting window every moment plane
// is blurred with. Each cell holds the 2-D Gaussian density at its offset from
// the (integer-truncated) centre:
//
//     exp(-(dx^2 / (2 sx^2) + dy^2 / (2 sy^2))) / (2 pi sx sy)
//
// The density is sampled, not renormalised. For the usual 11x1.5 window the
// weights sum to roughly 1 and that small bias is part of the score every
// caller has ever seen, so it stays.

use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::Window;
use std::f64::consts::PI;

/// Builds separable Gaussian windows.
pub struct KernelBuilder;

impl KernelBuilder {
    /// Builds a `size_y` x `size_x` Gaussian window. Unequal sizes or sigmas give
    /// an asymmetric window.
    pub fn build(size_x: usize, size_y: usize, sigma_x: f64, sigma_y: f64) -> SsimResult<Window> {
        if size_x == 0 || size_y == 0 {
            return Err(SsimError::InvalidArgument(format!(
                "window sizes must be positive, got {size_x}x{size_y}"
            )));
        }
        for (axis, sigma) in [("x", sigma_x), ("y", sigma_y)] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(SsimError::InvalidArgument(format!(
                    "sigma_{axis} must be a positive finite number, got {sigma}"
                )));
            }
        }

        let sigma_x_sq = sigma_x * sigma_x;
        let sigma_y_sq = sigma_y * sigma_y;
        let scale = 1.0 / (2.0 * PI * sigma_x * sigma_y);
        let center_x = (size_x / 2) as f64;
        let center_y = (size_y / 2) as f64;

        let mut weights = Vec::with_capacity(size_x * size_y);
        for row in 0..size_y {
            let dy = row as f64 - center_y;
            for col in 0..size_x {
                let dx = col as f64 - center_x;
                let exponent = dx * dx / (2.0 * sigma_x_sq) + dy * dy / (2.0 * sigma_y_sq);
                weights.push(scale * (-exponent).exp());
            }
        }

        Window::from_weights(size_x, size_y, weights)
    }

    /// Square window with the same sigma on both axes.
    pub fn square(size: usize, sigma: f64) -> SsimResult<Window> {
        Self::build(size, size, sigma, sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_sums_close_to_one() {
        let window = KernelBuilder::square(11, 1.5).unwrap();
        assert_eq!((window.size_x(), window.size_y()), (11, 11));
        // Sampled density, not renormalised: close to 1, not exactly 1.
        assert!((window.sum() - 1.0).abs() < 1e-2, "sum = {}", window.sum());
    }

    #[test]
    fn peak_sits_at_truncated_center() {
        let window = KernelBuilder::square(5, 1.0).unwrap();
        let peak = window.get(2, 2);
        assert!((peak - 1.0 / (2.0 * PI)).abs() < 1e-15);
        assert!(window.weights().iter().all(|&w| w <= peak));
        assert_eq!(window.get(0, 1), window.get(4, 3));
    }

    #[test]
    fn even_size_center_is_right_of_middle() {
        let window = KernelBuilder::build(4, 1, 1.0, 1.0).unwrap();
        let row: Vec<f64> = (0..4).map(|col| window.get(0, col)).collect();
        assert!(row[2] > row[1]);
        assert_eq!(row[1], row[3]);
    }

    #[test]
    fn asymmetric_window_has_requested_extent() {
        let window = KernelBuilder::build(7, 3, 2.0, 0.5).unwrap();
        assert_eq!(window.size_x(), 7);
        assert_eq!(window.size_y(), 3);
        assert_eq!(window.weights().len(), 21);
        // The narrow y-sigma falls off faster than the wide x-sigma.
        assert!(window.get(0, 3) < window.get(1, 2));
    }

    #[test]
    fn rejects_non_positive_sigma() {
        assert!(KernelBuilder::square(11, 0.0).is_err());
        assert!(KernelBuilder::build(11, 11, 1.5, -1.0).is_err());
        assert!(KernelBuilder::square(11, f64::NAN).is_err());
    }

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(
            KernelBuilder::build(0, 3, 1.0, 1.0),
            Err(SsimError::InvalidArgument(_))
        ));
    }
}
