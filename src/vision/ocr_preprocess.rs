//! Image preprocessing filters for OCR optimization
//!
//! The DJ application draws light text on a dark background while Tesseract
//! expects dark text on a light one, and small glyphs recognise poorly, so
//! title crops are inverted and optionally upscaled before recognition.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Interpolation filter used when upscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<UpscaleFilter> for FilterType {
    fn from(filter: UpscaleFilter) -> Self {
        match filter {
            UpscaleFilter::Nearest => FilterType::Nearest,
            UpscaleFilter::Triangle => FilterType::Triangle,
            UpscaleFilter::CatmullRom => FilterType::CatmullRom,
            UpscaleFilter::Gaussian => FilterType::Gaussian,
            UpscaleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Preprocessing applied to a crop before OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrPreprocessing {
    /// Invert RGB channels
    pub invert: bool,
    /// Integer upscale factor, 1 = unchanged
    pub scale: u32,
    /// Filter used when `scale > 1`
    pub filter: UpscaleFilter,
}

impl Default for OcrPreprocessing {
    fn default() -> Self {
        Self {
            invert: true,
            scale: 1,
            filter: UpscaleFilter::default(),
        }
    }
}

/// Apply preprocessing filters, returning a new image
pub fn apply_preprocessing(image: &RgbaImage, settings: &OcrPreprocessing) -> RgbaImage {
    debug!(
        "OCR preprocessing {}x{}: invert={}, scale={}, filter={:?}",
        image.width(),
        image.height(),
        settings.invert,
        settings.scale,
        settings.filter
    );

    let mut result = image.clone();

    if settings.invert {
        apply_invert(&mut result);
    }

    if settings.scale > 1 {
        result = apply_upscale(&result, settings.scale, settings.filter);
    }

    result
}

/// Invert RGB colors, alpha unchanged
fn apply_invert(image: &mut RgbaImage) {
    for chunk in image.chunks_exact_mut(4) {
        chunk[0] = 255 - chunk[0];
        chunk[1] = 255 - chunk[1];
        chunk[2] = 255 - chunk[2];
    }
}

/// Upscale by an integer factor with the given interpolation filter
fn apply_upscale(image: &RgbaImage, scale: u32, filter: UpscaleFilter) -> RgbaImage {
    if scale <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageops::resize(
        image,
        image.width().saturating_mul(scale),
        image.height().saturating_mul(scale),
        filter.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_invert() {
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([0, 100, 255, 128]));
        apply_invert(&mut image);
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 155, 0, 128]));
    }

    #[test]
    fn test_upscale_dimensions() {
        let image = RgbaImage::from_pixel(30, 8, Rgba([10, 10, 10, 255]));
        let result = apply_upscale(&image, 4, UpscaleFilter::CatmullRom);
        assert_eq!(result.dimensions(), (120, 32));
    }

    #[test]
    fn test_upscale_noop() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        assert_eq!(apply_upscale(&image, 1, UpscaleFilter::Lanczos3), image);
    }

    #[test]
    fn test_preprocessing_inverts_then_scales() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([250, 250, 250, 255]));
        let settings = OcrPreprocessing {
            invert: true,
            scale: 3,
            filter: UpscaleFilter::Nearest,
        };

        let result = apply_preprocessing(&image, &settings);

        assert_eq!(result.dimensions(), (6, 6));
        assert!(result.pixels().all(|p| *p == Rgba([5, 5, 5, 255])));
    }

    #[test]
    fn test_preprocessing_without_invert_keeps_pixels() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let settings = OcrPreprocessing {
            invert: false,
            scale: 1,
            ..Default::default()
        };
        assert_eq!(apply_preprocessing(&image, &settings), image);
    }
}
