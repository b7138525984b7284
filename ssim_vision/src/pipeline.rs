// THEORY:
// The `pipeline` module is the top-level API of the engine. It takes two images
// and a configuration and returns one score and one similarity map. Everything
// below it (`core_modules`) is wired together here and nowhere else.
//
// The sequence for a single comparison:
// 1.  **Validate**: shapes must match exactly; `max_val` must be positive; the
//     window parameters must be usable.
// 2.  **Fit the Window**: the window may not be larger than the image, so its
//     size is clamped to `min(filter_size, height, width)` and sigma is scaled
//     down by the same ratio. A `filter_size` of 0 means "no window at all".
// 3.  **Score**: the `SimilarityScorer` builds the moment planes (through the
//     `ChannelDispatcher` when windowed) and evaluates the SSIM map.
//
// Comparisons hold no state between calls. An `SsimEngine` only owns the worker
// runtime and the dispatcher's worker bound, so the same inputs always give the
// same bits.

use crate::core_modules::channel_dispatcher::ChannelDispatcher;
use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::{Image, Window};
use crate::core_modules::kernel::KernelBuilder;
use crate::core_modules::similarity::{SimilarityScorer, StabilityConstants};
use log::debug;
use tokio::runtime::Runtime;

const DEFAULT_FILTER_SIZE: usize = 11;
const DEFAULT_FILTER_SIGMA: f64 = 1.5;
const DEFAULT_K1: f64 = 0.01;
const DEFAULT_K2: f64 = 0.03;
const DEFAULT_MAX_VAL: f64 = 255.0;

/// Tunable parameters for a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct SsimConfig {
    /// Side length of the Gaussian window. 0 disables blurring entirely.
    pub filter_size: usize,
    /// Standard deviation of the Gaussian window at `filter_size`.
    pub filter_sigma: f64,
    pub k1: f64,
    pub k2: f64,
    /// Dynamic range of the samples, 255 for 8-bit images.
    pub max_val: f64,
    /// Upper bound on channel convolutions running at once.
    pub workers: usize,
}

impl Default for SsimConfig {
    fn default() -> Self {
        Self {
            filter_size: DEFAULT_FILTER_SIZE,
            filter_sigma: DEFAULT_FILTER_SIGMA,
            k1: DEFAULT_K1,
            k2: DEFAULT_K2,
            max_val: DEFAULT_MAX_VAL,
            workers: num_cpus::get().max(1),
        }
    }
}

/// The window actually used once the configured one has been fitted to an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveWindow {
    pub size: usize,
    pub sigma: f64,
}

impl SsimConfig {
    pub fn with_filter_size(mut self, filter_size: usize) -> Self {
        self.filter_size = filter_size;
        self
    }

    pub fn with_filter_sigma(mut self, filter_sigma: f64) -> Self {
        self.filter_sigma = filter_sigma;
        self
    }

    pub fn with_constants(mut self, k1: f64, k2: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self
    }

    pub fn with_max_val(mut self, max_val: f64) -> Self {
        self.max_val = max_val;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> SsimResult<()> {
        if !(self.max_val.is_finite() && self.max_val > 0.0) {
            return Err(SsimError::InvalidArgument(format!(
                "max_val must be a positive finite number, got {}",
                self.max_val
            )));
        }
        if self.filter_size > 0 && !(self.filter_sigma.is_finite() && self.filter_sigma > 0.0) {
            return Err(SsimError::InvalidArgument(format!(
                "filter_sigma must be a positive finite number, got {}",
                self.filter_sigma
            )));
        }
        if self.workers == 0 {
            return Err(SsimError::InvalidArgument("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Fits the configured window to a `height` x `width` image. `None` when
    /// blurring is disabled.
    pub fn effective_window(&self, height: usize, width: usize) -> Option<EffectiveWindow> {
        if self.filter_size == 0 {
            return None;
        }
        let size = self.filter_size.min(height).min(width);
        let sigma = size as f64 * self.filter_sigma / self.filter_size as f64;
        Some(EffectiveWindow { size, sigma })
    }

    fn constants(&self) -> SsimResult<StabilityConstants> {
        StabilityConstants::new(self.k1, self.k2, self.max_val)
    }
}

/// The result of one comparison: the mean score and the per-sample map.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub score: f64,
    pub map: Image,
}

impl Comparison {
    pub fn into_parts(self) -> (f64, Image) {
        (self.score, self.map)
    }
}

/// Owns a worker runtime and runs comparisons on it.
pub struct SsimEngine {
    config: SsimConfig,
    scorer: SimilarityScorer,
    runtime: Runtime,
}

impl SsimEngine {
    pub fn new(config: SsimConfig) -> SsimResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers)
            .max_blocking_threads(config.workers)
            .thread_name("ssim-worker")
            .build()
            .map_err(|e| SsimError::Runtime(e.to_string()))?;
        let scorer = SimilarityScorer::new(ChannelDispatcher::new(config.workers)?);

        Ok(Self {
            config,
            scorer,
            runtime,
        })
    }

    pub fn config(&self) -> &SsimConfig {
        &self.config
    }

    /// Blocking comparison. Must not be called from inside an async context;
    /// use `compare_async` there.
    pub fn compare(&self, a: &Image, b: &Image) -> SsimResult<Comparison> {
        self.runtime.block_on(self.compare_async(a, b))
    }

    pub async fn compare_async(&self, a: &Image, b: &Image) -> SsimResult<Comparison> {
        run_comparison(&self.scorer, &self.config, a, b).await
    }
}

/// Compares `a` with `b` on a short-lived engine built from `config`.
///
/// Every call starts a multi-thread tokio runtime with `config.workers` threads
/// and shuts it down again before returning. For more than one comparison, build
/// an `SsimEngine` once and call `SsimEngine::compare` on it; results are
/// identical either way.
pub fn compare(a: &Image, b: &Image, config: &SsimConfig) -> SsimResult<Comparison> {
    SsimEngine::new(config.clone())?.compare(a, b)
}

/// Compares `a` with `b` on the caller's tokio runtime.
pub async fn compare_async(a: &Image, b: &Image, config: &SsimConfig) -> SsimResult<Comparison> {
    config.validate()?;
    let scorer = SimilarityScorer::new(ChannelDispatcher::new(config.workers)?);
    run_comparison(&scorer, config, a, b).await
}

async fn run_comparison(
    scorer: &SimilarityScorer,
    config: &SsimConfig,
    a: &Image,
    b: &Image,
) -> SsimResult<Comparison> {
    if a.shape() != b.shape() {
        return Err(SsimError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    config.validate()?;
    let constants = config.constants()?;

    let window = match config.effective_window(a.height(), a.width()) {
        Some(fitted) => {
            debug!(
                "comparing {} images with a {}x{} window, sigma {:.4}",
                a.shape(),
                fitted.size,
                fitted.size,
                fitted.sigma
            );
            Some(build_window(fitted)?)
        }
        None => {
            debug!("comparing {} images without a window", a.shape());
            None
        }
    };

    let (score, map) = scorer.score(a, b, window, constants).await?;
    debug!("mean similarity {score:.6} over map {}", map.shape());
    Ok(Comparison { score, map })
}

fn build_window(fitted: EffectiveWindow) -> SsimResult<Window> {
    KernelBuilder::square(fitted.size, fitted.sigma)
}
