// An example runner for the `ssim_vision` library: compares a few uniform
// colour fills and logs the scores. Set RUST_LOG=debug to see window details.
// Run with `cargo run -p ssim_vision --features demo`.

use anyhow::Context;
use flexi_logger::Logger;
use log::info;
use ssim_vision::{Image, SsimConfig, SsimEngine};

const SIDE: usize = 100;

/// A BGR-ordered fill with one channel at 255 and the others at 0.
fn colour_fill(channel: usize) -> anyhow::Result<Image> {
    Image::from_fn(SIDE, SIDE, 3, |_, _, c| if c == channel { 255.0 } else { 0.0 })
        .context("building colour fill")
}

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;
    info!("SSIM Vision Engine - Example Runner");

    let blue = colour_fill(0)?;
    let green = colour_fill(1)?;
    let red = colour_fill(2)?;
    let fill128 = Image::filled(SIDE, SIDE, 1, 128.0)?;
    let fill255 = Image::filled(SIDE, SIDE, 1, 255.0)?;

    let engine = SsimEngine::new(SsimConfig::default())?;
    let pairs = [
        ("blue <-> blue", &blue, &blue),
        ("red <-> blue", &red, &blue),
        ("red <-> green", &red, &green),
        ("fill128 <-> fill128", &fill128, &fill128),
        ("fill128 <-> fill255", &fill128, &fill255),
    ];

    for (label, a, b) in pairs {
        let comparison = engine.compare(a, b).with_context(|| format!("comparing {label}"))?;
        info!("{label} score: {}", comparison.score);
    }

    Ok(())
}
