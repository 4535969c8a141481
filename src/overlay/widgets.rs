//! Overlay style and drawing helpers

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::shared::Deck;

/// Style configuration for rendered overlays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Canvas width in pixels
    pub width: u32,
    /// Side length of the square cover art
    pub cover_size: u32,
    /// Gap between canvas edges, cover and text
    pub padding: u32,
    /// Height of the badge strip at the top
    pub badge_height: u32,
    /// Horizontal padding inside the badge
    pub badge_padding: u32,
    /// Fraction of the width over which the backdrop fades out
    pub gradient_blend: f32,
    /// Backdrop opacity at the deck's edge (0.0 - 1.0)
    pub gradient_opacity: f32,
    pub title_font_size: f32,
    pub body_font_size: f32,
    pub badge_font_size: f32,
    /// TrueType font for artists and publisher
    pub regular_font: PathBuf,
    /// TrueType font for title and badge
    pub bold_font: PathBuf,
    pub text_color: [u8; 4],
    pub badge_color: [u8; 4],
    /// Fill used when a track has no usable cover art
    pub placeholder_cover_color: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            width: 960,
            cover_size: 200,
            padding: 10,
            badge_height: 44,
            badge_padding: 8,
            gradient_blend: 0.6,
            gradient_opacity: 0.8,
            title_font_size: 30.0,
            body_font_size: 24.0,
            badge_font_size: 30.0,
            regular_font: PathBuf::from("/System/Library/Fonts/Supplemental/Arial.ttf"),
            bold_font: PathBuf::from("/System/Library/Fonts/Supplemental/Arial Bold.ttf"),
            text_color: [255, 255, 255, 255],
            badge_color: [255, 0, 0, 255],
            placeholder_cover_color: [48, 48, 48, 255],
        }
    }
}

impl OverlayStyle {
    /// Canvas dimensions. They depend on nothing but the style.
    pub fn canvas_size(&self) -> (u32, u32) {
        let height = self.badge_height + self.padding + self.cover_size + self.padding;
        (self.width, height)
    }
}

/// Fill the canvas with a black backdrop, opaque at the deck's edge and
/// fading to transparent towards the other side
pub fn draw_gradient(canvas: &mut RgbaImage, deck: Deck, style: &OverlayStyle) {
    let (width, height) = canvas.dimensions();
    let blend = (style.gradient_blend * width as f32).max(1.0);
    let opacity = style.gradient_opacity.clamp(0.0, 1.0);

    for x in 0..width {
        let distance = match deck {
            Deck::Left => x,
            Deck::Right => width - 1 - x,
        };
        let fade = (1.0 - distance as f32 / blend).max(0.0);
        let alpha = (opacity * fade * 255.0).round() as u8;
        for y in 0..height {
            canvas.put_pixel(x, y, Rgba([0, 0, 0, alpha]));
        }
    }
}

/// Decode cover art and resample it to `size`², or a placeholder square
pub fn decode_cover(bytes: Option<&[u8]>, size: u32, placeholder: [u8; 4]) -> RgbaImage {
    if let Some(bytes) = bytes {
        match image::load_from_memory(bytes) {
            Ok(cover) => return cover.resize_exact(size, size, FilterType::Lanczos3).to_rgba8(),
            Err(e) => debug!("Cover art failed to decode: {}", e),
        }
    }
    RgbaImage::from_pixel(size, size, Rgba(placeholder))
}

/// Composite `cover` onto the canvas with its top-left corner at `origin`
pub fn paste_cover(canvas: &mut RgbaImage, cover: &RgbaImage, origin: (u32, u32)) {
    imageops::overlay(canvas, cover, origin.0 as i64, origin.1 as i64);
}
