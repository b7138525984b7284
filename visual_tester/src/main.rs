use anyhow::{Context, bail};
use flexi_logger::Logger;
use image::DynamicImage;
use log::info;
use ssim_vision::{SsimConfig, SsimEngine, image_from_dynamic, mean_absolute_error, root_mean_squared_error, save_similarity_map};
use std::env;
use std::str::FromStr;

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: visual_tester <image_a> <image_b> [map_output.png]");
        println!("Overrides: SSIM_FILTER_SIZE, SSIM_FILTER_SIGMA, SSIM_MAX_VAL, SSIM_WORKERS");
        return Ok(());
    }
    let path_a = &args[1];
    let path_b = &args[2];
    let map_path = args.get(3);

    // --- 2. Image Decoding ---
    let decoded_a = image::open(path_a).with_context(|| format!("opening {path_a}"))?;
    let decoded_b = image::open(path_b).with_context(|| format!("opening {path_b}"))?;
    let image_a = image_from_dynamic(&decoded_a)?;
    let image_b = image_from_dynamic(&decoded_b)?;
    if image_a.shape() != image_b.shape() {
        bail!(
            "{path_a} is {} but {path_b} is {}; both images need the same shape",
            image_a.shape(),
            image_b.shape()
        );
    }

    // --- 3. Engine Initialization ---
    let config = config_from_env(&decoded_a)?;
    info!(
        "comparing {} images, filter {} / sigma {}, max_val {}, {} workers",
        image_a.shape(),
        config.filter_size,
        config.filter_sigma,
        config.max_val,
        config.workers
    );
    let engine = SsimEngine::new(config)?;

    // --- 4. Comparison ---
    let (score, map) = engine.compare(&image_a, &image_b)?.into_parts();
    println!("ssim: {score:.6}");
    println!("mae:  {:.6}", mean_absolute_error(&image_a, &image_b)?);
    println!("rmse: {:.6}", root_mean_squared_error(&image_a, &image_b)?);

    // --- 5. Similarity Map Output ---
    if let Some(map_path) = map_path {
        save_similarity_map(map_path, &map).with_context(|| format!("writing {map_path}"))?;
        println!("Similarity map saved to {map_path}");
    }

    Ok(())
}

/// Builds the comparison config, letting environment variables override the defaults.
/// Without `SSIM_MAX_VAL` the dynamic range follows the decoded sample type.
fn config_from_env(decoded: &DynamicImage) -> anyhow::Result<SsimConfig> {
    let mut config = SsimConfig::default().with_max_val(native_max_val(decoded));

    if let Some(filter_size) = env_override("SSIM_FILTER_SIZE")? {
        config = config.with_filter_size(filter_size);
    }
    if let Some(filter_sigma) = env_override("SSIM_FILTER_SIGMA")? {
        config = config.with_filter_sigma(filter_sigma);
    }
    if let Some(max_val) = env_override("SSIM_MAX_VAL")? {
        config = config.with_max_val(max_val);
    }
    if let Some(workers) = env_override("SSIM_WORKERS")? {
        config = config.with_workers(workers);
    }

    config.validate()?;
    Ok(config)
}

fn env_override<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name}={raw} is not a valid value")),
        Err(_) => Ok(None),
    }
}

fn native_max_val(decoded: &DynamicImage) -> f64 {
    match decoded {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => u16::MAX as f64,
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => 1.0,
        _ => u8::MAX as f64,
    }
}
