// THEORY:
// The `convolver` slides a weighting window over a single plane and produces the
// weighted sum under every position where the window fits entirely ("valid"
// mode). No padding: the output shrinks by the window's reach on each axis.
//
// Each output cell owns its own accumulator and always walks the window in the
// same row-major order, so a given plane and window produce bit-identical
// output no matter which worker thread runs it or when.

use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::{Image, Plane, Window};

/// Weighted sliding-sum over 2-D planes.
pub struct WindowConvolver;

impl WindowConvolver {
    /// Valid-mode convolution of `plane` with `window`. The output has
    /// `(plane_h - window_h + 1, plane_w - window_w + 1)` cells.
    pub fn convolve2d(plane: &Plane, window: &Window) -> SsimResult<Plane> {
        let (window_h, window_w) = (window.size_y(), window.size_x());
        if window_h > plane.height() || window_w > plane.width() {
            return Err(SsimError::Dimension(format!(
                "window of {window_h}x{window_w} does not fit in a {}x{} plane",
                plane.height(),
                plane.width()
            )));
        }

        let out_h = plane.height() - window_h + 1;
        let out_w = plane.width() - window_w + 1;
        let weights = window.weights();

        let mut output = Vec::with_capacity(out_h * out_w);
        for out_y in 0..out_h {
            for out_x in 0..out_w {
                let mut sum = 0.0;
                for i in 0..window_h {
                    let row = &plane.row(out_y + i)[out_x..out_x + window_w];
                    let weight_row = &weights[i * window_w..(i + 1) * window_w];
                    for (w, v) in weight_row.iter().zip(row) {
                        sum += w * v;
                    }
                }
                output.push(sum);
            }
        }

        Plane::new(out_h, out_w, output)
    }

    /// Same as `convolve2d`, for callers holding an `Image`. Fails with a
    /// dimension error unless the image has exactly one channel.
    pub fn convolve_image(image: &Image, window: &Window) -> SsimResult<Image> {
        let plane = Plane::try_from(image)?;
        Self::convolve2d(&plane, window).map(Image::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::kernel::KernelBuilder;

    fn ramp(height: usize, width: usize) -> Plane {
        let data = (0..height * width).map(|i| i as f64).collect();
        Plane::new(height, width, data).unwrap()
    }

    #[test]
    fn output_shrinks_by_window_reach() {
        let plane = ramp(10, 8);
        let window = KernelBuilder::build(3, 5, 1.0, 1.0).unwrap();
        let out = WindowConvolver::convolve2d(&plane, &window).unwrap();
        assert_eq!((out.height(), out.width()), (6, 6));
    }

    #[test]
    fn box_window_computes_local_sums() {
        let plane = ramp(3, 3);
        let window = Window::from_weights(2, 2, vec![1.0; 4]).unwrap();
        let out = WindowConvolver::convolve2d(&plane, &window).unwrap();
        // [0 1 2; 3 4 5; 6 7 8]
        assert_eq!(out.data(), &[8.0, 12.0, 20.0, 24.0]);
    }

    #[test]
    fn window_is_not_flipped() {
        let plane = ramp(2, 3);
        let window = Window::from_weights(2, 1, vec![1.0, 10.0]).unwrap();
        let out = WindowConvolver::convolve2d(&plane, &window).unwrap();
        // [0 1 2; 3 4 5]: each output is left + 10 * right.
        assert_eq!(out.data(), &[10.0, 21.0, 43.0, 54.0]);
    }

    #[test]
    fn window_equal_to_plane_yields_single_cell() {
        let plane = Plane::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let window = Window::from_weights(2, 2, vec![0.25; 4]).unwrap();
        let out = WindowConvolver::convolve2d(&plane, &window).unwrap();
        assert_eq!(out.data(), &[2.5]);
    }

    #[test]
    fn oversized_window_is_a_dimension_error() {
        let plane = ramp(4, 10);
        let window = KernelBuilder::square(5, 1.0).unwrap();
        let err = WindowConvolver::convolve2d(&plane, &window).unwrap_err();
        assert!(matches!(err, SsimError::Dimension(_)));
    }

    #[test]
    fn multi_channel_image_is_rejected() {
        let image = Image::filled(8, 8, 3, 1.0).unwrap();
        let window = KernelBuilder::square(3, 1.0).unwrap();
        let err = WindowConvolver::convolve_image(&image, &window).unwrap_err();
        assert!(matches!(err, SsimError::Dimension(_)));
    }

    #[test]
    fn uniform_plane_scales_by_window_sum() {
        let plane = Plane::new(12, 12, vec![128.0; 144]).unwrap();
        let window = KernelBuilder::square(11, 1.5).unwrap();
        let out = WindowConvolver::convolve2d(&plane, &window).unwrap();
        let expected = 128.0 * window.sum();
        assert!(out.data().iter().all(|v| (v - expected).abs() < 1e-9));
    }
}
