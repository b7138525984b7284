// THEORY:
// The `similarity` module turns five moment planes into the SSIM map:
//
//     mu_a, mu_b          weighted means
//     e_aa, e_bb, e_ab    weighted means of a*a, b*b, a*b
//
// From these it derives the variances and the covariance, then evaluates
//
//     ((2 mu_a mu_b + c1) (2 cov_ab + c2)) / ((mu_a^2 + mu_b^2 + c1) (var_a + var_b + c2))
//
// per sample. This is the simplified single-constant form: `c2` serves both the
// contrast and the structure term, there is no separate `c3`. The expression is
// kept in exactly this algebraic shape; every operand appears symmetrically in
// a and b, so swapping the inputs gives bit-identical output, and comparing an
// image with itself gives numerator == denominator bit for bit.
//
// The moments come from one of two places:
// 1.  **Windowed**: the Gaussian window is slid over each plane through the
//     `ChannelDispatcher`. All five convolutions are issued together and share
//     the dispatcher's worker bound.
// 2.  **Unblurred**: with no window, the raw samples are the means and the raw
//     pointwise products are the second moments. The map keeps the input shape.

use crate::core_modules::channel_dispatcher::ChannelDispatcher;
use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::{Image, Window};
use std::sync::Arc;

/// The two stabilisation constants, `c1 = (k1 * max_val)^2` and `c2 = (k2 * max_val)^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityConstants {
    pub c1: f64,
    pub c2: f64,
}

impl StabilityConstants {
    pub fn new(k1: f64, k2: f64, max_val: f64) -> SsimResult<Self> {
        if !(max_val.is_finite() && max_val > 0.0) {
            return Err(SsimError::InvalidArgument(format!(
                "max_val must be a positive finite number, got {max_val}"
            )));
        }
        Ok(Self {
            c1: (k1 * max_val).powi(2),
            c2: (k2 * max_val).powi(2),
        })
    }
}

/// First and second order moment planes of an image pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentPlanes {
    pub mu_a: Image,
    pub mu_b: Image,
    pub e_aa: Image,
    pub e_bb: Image,
    pub e_ab: Image,
}

impl MomentPlanes {
    /// The unblurred moments: raw samples and raw pointwise products.
    pub fn unblurred(a: &Image, b: &Image) -> SsimResult<Self> {
        Ok(Self {
            e_aa: a.zip_map(a, |x, y| x * y)?,
            e_bb: b.zip_map(b, |x, y| x * y)?,
            e_ab: a.zip_map(b, |x, y| x * y)?,
            mu_a: a.clone(),
            mu_b: b.clone(),
        })
    }
}

/// Combines moment planes into a similarity map and its mean score.
pub struct SimilarityScorer {
    dispatcher: ChannelDispatcher,
}

impl SimilarityScorer {
    pub fn new(dispatcher: ChannelDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Scores `a` against `b`. With `Some(window)` the moments are Gaussian
    /// weighted and the map shrinks by the window's reach; with `None` the
    /// unblurred moments are used and the map keeps the input shape.
    pub async fn score(
        &self,
        a: &Image,
        b: &Image,
        window: Option<Window>,
        constants: StabilityConstants,
    ) -> SsimResult<(f64, Image)> {
        if a.shape() != b.shape() {
            return Err(SsimError::ShapeMismatch {
                left: a.shape(),
                right: b.shape(),
            });
        }

        let moments = match window {
            Some(window) => self.windowed_moments(a, b, window).await?,
            None => MomentPlanes::unblurred(a, b)?,
        };

        let map = Self::similarity_map(&moments, constants)?;
        Ok((map.mean(), map))
    }

    /// Convolves both images and their three pointwise products with `window`.
    pub async fn windowed_moments(&self, a: &Image, b: &Image, window: Window) -> SsimResult<MomentPlanes> {
        let window = Arc::new(window);
        let a_sq = Arc::new(a.zip_map(a, |x, y| x * y)?);
        let b_sq = Arc::new(b.zip_map(b, |x, y| x * y)?);
        let ab = Arc::new(a.zip_map(b, |x, y| x * y)?);
        let a = Arc::new(a.clone());
        let b = Arc::new(b.clone());

        let d = &self.dispatcher;
        let (mu_a, mu_b, e_aa, e_bb, e_ab) = tokio::try_join!(
            d.convolve(a, Arc::clone(&window)),
            d.convolve(b, Arc::clone(&window)),
            d.convolve(a_sq, Arc::clone(&window)),
            d.convolve(b_sq, Arc::clone(&window)),
            d.convolve(ab, window),
        )?;

        Ok(MomentPlanes {
            mu_a,
            mu_b,
            e_aa,
            e_bb,
            e_ab,
        })
    }

    /// Evaluates the SSIM expression sample by sample.
    pub fn similarity_map(moments: &MomentPlanes, constants: StabilityConstants) -> SsimResult<Image> {
        let shape = moments.mu_a.shape();
        let planes = [&moments.mu_b, &moments.e_aa, &moments.e_bb, &moments.e_ab];
        if let Some(odd) = planes.iter().find(|p| p.shape() != shape) {
            return Err(SsimError::ShapeMismatch {
                left: shape,
                right: odd.shape(),
            });
        }

        let StabilityConstants { c1, c2 } = constants;
        let data = moments
            .mu_a
            .data()
            .iter()
            .zip(moments.mu_b.data())
            .zip(moments.e_aa.data())
            .zip(moments.e_bb.data())
            .zip(moments.e_ab.data())
            .map(|((((&mu_a, &mu_b), &e_aa), &e_bb), &e_ab)| {
                let mu_aa = mu_a * mu_a;
                let mu_bb = mu_b * mu_b;
                let mu_ab = mu_a * mu_b;
                let var_a = e_aa - mu_aa;
                let var_b = e_bb - mu_bb;
                let cov_ab = e_ab - mu_ab;

                let numerator = (2.0 * mu_ab + c1) * (2.0 * cov_ab + c2);
                let denominator = (mu_aa + mu_bb + c1) * (var_a + var_b + c2);
                numerator / denominator
            })
            .collect();

        Image::new(shape.height, shape.width, shape.channels, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::kernel::KernelBuilder;

    fn constants() -> StabilityConstants {
        StabilityConstants::new(0.01, 0.03, 255.0).unwrap()
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(ChannelDispatcher::new(2).unwrap())
    }

    #[test]
    fn constants_follow_dynamic_range() {
        let c = constants();
        assert!((c.c1 - 6.5025).abs() < 1e-12);
        assert!((c.c2 - 58.5225).abs() < 1e-12);
    }

    #[test]
    fn non_positive_max_val_is_rejected() {
        assert!(StabilityConstants::new(0.01, 0.03, 0.0).is_err());
        assert!(StabilityConstants::new(0.01, 0.03, -255.0).is_err());
    }

    #[test]
    fn single_sample_formula() {
        // a = 10, b = 20 with no blur: variances and covariance are zero.
        let a = Image::filled(1, 1, 1, 10.0).unwrap();
        let b = Image::filled(1, 1, 1, 20.0).unwrap();
        let moments = MomentPlanes::unblurred(&a, &b).unwrap();
        let c = constants();
        let map = SimilarityScorer::similarity_map(&moments, c).unwrap();

        let expected = ((2.0 * 200.0 + c.c1) * c.c2) / ((100.0 + 400.0 + c.c1) * c.c2);
        assert!((map.data()[0] - expected).abs() < 1e-15);
    }

    #[tokio::test]
    async fn unblurred_path_keeps_input_shape() {
        let a = Image::from_fn(6, 5, 2, |y, x, c| (y * x + c) as f64).unwrap();
        let b = Image::from_fn(6, 5, 2, |y, x, c| (y + x * c) as f64).unwrap();
        let (score, map) = scorer().score(&a, &b, None, constants()).await.unwrap();
        assert_eq!(map.shape(), a.shape());
        assert!((score - map.mean()).abs() < 1e-15);
    }

    #[tokio::test]
    async fn windowed_path_shrinks_map() {
        let a = Image::from_fn(20, 16, 3, |y, x, c| ((y * 13 + x * 7 + c) % 256) as f64).unwrap();
        let b = Image::from_fn(20, 16, 3, |y, x, c| ((y * 5 + x * 11 + c) % 256) as f64).unwrap();
        let window = KernelBuilder::square(7, 1.0).unwrap();
        let (_, map) = scorer().score(&a, &b, Some(window), constants()).await.unwrap();
        assert_eq!((map.height(), map.width(), map.channels()), (14, 10, 3));
    }

    #[tokio::test]
    async fn self_similarity_is_exactly_one() {
        let a = Image::from_fn(24, 24, 3, |y, x, c| ((y * 31 + x * 17 + c * 90) % 256) as f64).unwrap();
        let window = KernelBuilder::square(11, 1.5).unwrap();
        let (score, map) = scorer().score(&a, &a, Some(window), constants()).await.unwrap();
        assert_eq!(score, 1.0);
        assert!(map.data().iter().all(|&v| v == 1.0));
    }

    #[tokio::test]
    async fn swapping_inputs_gives_identical_bits() {
        let a = Image::from_fn(18, 18, 1, |y, x, _| ((y * 9 + x * 4) % 200) as f64).unwrap();
        let b = Image::from_fn(18, 18, 1, |y, x, _| ((y * 3 + x * 8) % 180) as f64).unwrap();
        let window = KernelBuilder::square(5, 1.5).unwrap();
        let s = scorer();
        let (ab_score, ab_map) = s.score(&a, &b, Some(window.clone()), constants()).await.unwrap();
        let (ba_score, ba_map) = s.score(&b, &a, Some(window), constants()).await.unwrap();
        assert_eq!(ab_score, ba_score);
        assert_eq!(ab_map, ba_map);
    }

    #[tokio::test]
    async fn mismatched_shapes_fail_before_any_work() {
        let a = Image::filled(10, 10, 3, 0.0).unwrap();
        let b = Image::filled(10, 10, 1, 0.0).unwrap();
        let err = scorer().score(&a, &b, None, constants()).await.unwrap_err();
        assert!(matches!(err, SsimError::ShapeMismatch { .. }));
    }
}
