// THEORY:
// The engine itself only speaks `Image`. This module is the thin bridge to the
// `image` crate for callers that start from decoded buffers and want to look at
// the resulting similarity map. Samples are widened, never rescaled: an 8-bit
// source compares with `max_val = 255`, a 16-bit one with `65535`.

use crate::core_modules::error::{SsimError, SsimResult};
use crate::core_modules::grid::grid::Image;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageBuffer, ImageEncoder, ImageError, Luma, Pixel};
use std::path::Path;

impl<P> TryFrom<&ImageBuffer<P, Vec<P::Subpixel>>> for Image
where
    P: Pixel,
    P::Subpixel: Into<f64>,
{
    type Error = SsimError;

    fn try_from(buffer: &ImageBuffer<P, Vec<P::Subpixel>>) -> SsimResult<Self> {
        let (width, height) = buffer.dimensions();
        Image::from_samples(
            height as usize,
            width as usize,
            P::CHANNEL_COUNT as usize,
            buffer.as_raw().as_slice(),
        )
    }
}

/// Converts a decoded image, keeping its native channel layout and bit depth.
pub fn image_from_dynamic(dynamic: &DynamicImage) -> SsimResult<Image> {
    match dynamic {
        DynamicImage::ImageLuma8(buffer) => Image::try_from(buffer),
        DynamicImage::ImageLumaA8(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgb8(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgba8(buffer) => Image::try_from(buffer),
        DynamicImage::ImageLuma16(buffer) => Image::try_from(buffer),
        DynamicImage::ImageLumaA16(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgb16(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgba16(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgb32F(buffer) => Image::try_from(buffer),
        DynamicImage::ImageRgba32F(buffer) => Image::try_from(buffer),
        other => Image::try_from(&other.to_rgba8()),
    }
}

/// Renders a similarity map as grayscale: the per-pixel channel mean, clamped
/// to [0, 1] and scaled to 0..255. Negative similarity shows as black.
pub fn similarity_map_to_luma(map: &Image) -> GrayImage {
    let channels = map.channels();
    GrayImage::from_fn(map.width() as u32, map.height() as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let mean = (0..channels).map(|c| map.get(y, x, c)).sum::<f64>() / channels as f64;
        Luma([(mean.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Writes the grayscale rendering of `map` as a PNG file.
pub fn save_similarity_map<Q: AsRef<Path>>(path: Q, map: &Image) -> Result<(), ImageError> {
    let luma = similarity_map_to_luma(map);
    let output = std::fs::File::create(path)?;
    let encoder = PngEncoder::new(output);

    encoder.write_image(luma.as_raw(), luma.width(), luma.height(), ExtendedColorType::L8)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rgb_buffer_becomes_three_channel_image() {
        let buffer = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8, y as u8, 255]));
        let image = Image::try_from(&buffer).unwrap();
        assert_eq!((image.height(), image.width(), image.channels()), (3, 4, 3));
        assert_eq!(image.get(2, 1, 0), 1.0);
        assert_eq!(image.get(2, 1, 1), 2.0);
        assert_eq!(image.get(2, 1, 2), 255.0);
    }

    #[test]
    fn dynamic_luma16_keeps_native_range() {
        let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(2, 2, Luma([65_535]));
        let image = image_from_dynamic(&DynamicImage::ImageLuma16(buffer)).unwrap();
        assert_eq!(image.channels(), 1);
        assert!(image.data().iter().all(|&v| v == 65_535.0));
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let buffer = GrayImage::new(0, 0);
        assert!(Image::try_from(&buffer).is_err());
    }

    #[test]
    fn luma_rendering_clamps_and_averages() {
        let map = Image::new(1, 3, 2, vec![1.0, 1.0, -0.5, -1.0, 0.0, 1.0]).unwrap();
        let luma = similarity_map_to_luma(&map);
        assert_eq!(luma.dimensions(), (3, 1));
        assert_eq!(luma.get_pixel(0, 0).0, [255]);
        assert_eq!(luma.get_pixel(1, 0).0, [0]);
        assert_eq!(luma.get_pixel(2, 0).0, [128]);
    }

    #[test]
    fn save_similarity_map_file() {
        let map = Image::from_fn(20, 30, 3, |y, _, _| y as f64 / 19.0).unwrap();
        let path = std::env::temp_dir().join("ssim_vision_map_test.png");

        save_similarity_map(&path, &map).expect("Error Saving File.");

        let decoded = image::open(&path).expect("Error Reading File.").to_luma8();
        assert_eq!(decoded.dimensions(), (30, 20));
        assert_eq!(decoded.get_pixel(0, 19).0, [255]);
        let _ = std::fs::remove_file(path);
    }
}
