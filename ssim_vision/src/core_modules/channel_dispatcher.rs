// THEORY:
// The `ChannelDispatcher` fans a multi-channel convolution out into one task per
// channel and joins the results back into a single image. Channels never read
// each other's data, so each task owns its input plane and its output plane and
// there is nothing to lock.
//
// Key architectural principles:
// 1.  **Bounded Pool**: Tasks run on tokio's blocking pool (the work is pure CPU),
//     gated by a semaphore sized to the configured worker count. The semaphore
//     is shared by every convolution the dispatcher runs, so issuing several
//     moment planes at once still never exceeds the bound.
// 2.  **Order by Index**: Results are joined in submission order, which is the
//     channel index. Completion order never leaks into the output.
// 3.  **All or Nothing**: If any channel task fails or panics, the whole call
//     fails with `WorkerFailure`. A partially filled image is never assembled.

use crate::core_modules::convolver::WindowConvolver;
use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::{Image, Plane, Window};
use futures::future::try_join_all;
use log::{trace, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs per-channel convolutions on a bounded set of blocking workers.
#[derive(Clone)]
pub struct ChannelDispatcher {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl ChannelDispatcher {
    pub fn new(workers: usize) -> SsimResult<Self> {
        if workers == 0 {
            return Err(SsimError::InvalidArgument(
                "the dispatcher needs at least one worker".to_string(),
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Convolves every channel of `image` with `window` and restacks the results
    /// in the original channel order. A single-channel image gives exactly what
    /// `WindowConvolver::convolve2d` gives.
    pub async fn convolve(&self, image: Arc<Image>, window: Arc<Window>) -> SsimResult<Image> {
        let channels = image.channels();
        let planes = self
            .run_per_channel(channels, move |channel| {
                let plane = image.channel(channel)?;
                WindowConvolver::convolve2d(&plane, &window)
            })
            .await?;
        Image::from_planes(&planes)
    }

    /// Runs `job(channel)` for every channel index on the blocking pool and
    /// returns the planes indexed by channel.
    async fn run_per_channel<F>(&self, channels: usize, job: F) -> SsimResult<Vec<Plane>>
    where
        F: Fn(usize) -> SsimResult<Plane> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let tasks = (0..channels)
            .map(|channel| run_channel(Arc::clone(&self.permits), Arc::clone(&job), channel));

        try_join_all(tasks).await
    }
}

/// One channel's task: wait for a permit, then run the job on the blocking pool.
async fn run_channel<F>(permits: Arc<Semaphore>, job: Arc<F>, channel: usize) -> SsimResult<Plane>
where
    F: Fn(usize) -> SsimResult<Plane> + Send + Sync + 'static,
{
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| SsimError::WorkerFailure {
            channel,
            reason: e.to_string(),
        })?;
    trace!("dispatching convolution for channel {channel}");

    match tokio::task::spawn_blocking(move || job(channel)).await {
        Ok(result) => result,
        Err(join_error) => {
            warn!("convolution worker for channel {channel} failed: {join_error}");
            Err(SsimError::WorkerFailure {
                channel,
                reason: join_error.to_string(),
            })
        }
    }
}
