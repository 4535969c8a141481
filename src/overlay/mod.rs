//! Overlay Presentation Layer
//!
//! Renders the now-playing card for a deck: badge, cover art, and title,
//! artists and publisher text over a fading backdrop. The result is written
//! as a PNG that broadcast software picks up as an image source.

pub mod widgets;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::debug;

use crate::library::LibraryRecord;
use crate::shared::Deck;
use widgets::{decode_cover, draw_gradient, paste_cover, OverlayStyle};

/// Line height as a multiple of the font size
const LINE_SPACING: f32 = 1.2;

/// Renders overlay images for resolved tracks
pub trait OverlayRenderer {
    fn render(&self, track: &LibraryRecord, deck: Deck, is_master: bool) -> Result<RgbaImage>;
}

/// Badge text for the deck's role
pub fn badge_label(is_master: bool) -> &'static str {
    if is_master {
        "NOW PLAYING"
    } else {
        "PREVIOUS"
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

/// Font-independent placement of the overlay elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub deck: Deck,
    pub canvas: (u32, u32),
    /// Top-left corner of the cover art
    pub cover_origin: (u32, u32),
    /// Left edge of the text for left alignment, right edge for right alignment
    pub text_anchor_x: u32,
    pub text_top: u32,
    pub wrap_width: u32,
    pub align: TextAlign,
}

impl OverlayLayout {
    pub fn compute(style: &OverlayStyle, deck: Deck) -> Self {
        let canvas = style.canvas_size();
        let (width, _) = canvas;
        let top = style.badge_height + style.padding;
        let beside_cover = 2 * style.padding + style.cover_size;

        let (cover_x, text_anchor_x, align) = match deck {
            Deck::Left => (style.padding, beside_cover, TextAlign::Left),
            Deck::Right => (
                width.saturating_sub(style.padding + style.cover_size),
                width.saturating_sub(beside_cover),
                TextAlign::Right,
            ),
        };

        Self {
            deck,
            canvas,
            cover_origin: (cover_x, top),
            text_anchor_x,
            text_top: top,
            wrap_width: width.saturating_sub(style.cover_size + 3 * style.padding),
            align,
        }
    }

    /// Left edge of a badge `badge_width` wide, anchored to the deck's side
    pub fn badge_x(&self, style: &OverlayStyle, badge_width: u32) -> u32 {
        match self.deck {
            Deck::Left => style.padding,
            Deck::Right => self.canvas.0.saturating_sub(style.padding + badge_width),
        }
    }

    /// Left edge of a line `line_width` wide
    pub fn line_x(&self, line_width: u32) -> u32 {
        match self.align {
            TextAlign::Left => self.text_anchor_x,
            TextAlign::Right => self.text_anchor_x.saturating_sub(line_width),
        }
    }
}

/// Greedy word wrap. A word wider than `max_width` gets a line of its own.
pub fn wrap_text(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", line, word);
        if measure(&candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines
}

/// Regular and bold faces used for overlay text
pub struct Fonts {
    pub regular: FontVec,
    pub bold: FontVec,
}

impl Fonts {
    pub fn load(regular: &Path, bold: &Path) -> Result<Self> {
        Ok(Self {
            regular: load_font(regular)?,
            bold: load_font(bold)?,
        })
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
    FontVec::try_from_vec(data).map_err(|_| anyhow!("Invalid font file {:?}", path))
}

/// Overlay renderer drawing with imageproc
pub struct OverlayComposer {
    style: OverlayStyle,
    fonts: Fonts,
}

impl OverlayComposer {
    pub fn new(style: OverlayStyle, fonts: Fonts) -> Self {
        Self { style, fonts }
    }

    fn draw_badge(&self, canvas: &mut RgbaImage, layout: &OverlayLayout, label: &str) {
        let scale = PxScale::from(self.style.badge_font_size);
        let (text_w, text_h) = text_size(scale, &self.fonts.bold, label);
        let badge_w = text_w + 2 * self.style.badge_padding;
        let x = layout.badge_x(&self.style, badge_w);

        draw_filled_rect_mut(
            canvas,
            Rect::at(x as i32, 0).of_size(badge_w.max(1), self.style.badge_height.max(1)),
            Rgba(self.style.badge_color),
        );

        let text_y = self.style.badge_height.saturating_sub(text_h) / 2;
        draw_text_mut(
            canvas,
            Rgba(self.style.text_color),
            (x + self.style.badge_padding) as i32,
            text_y as i32,
            scale,
            &self.fonts.bold,
            label,
        );
    }

    /// Draw a wrapped text block starting at `y`; returns the y after it.
    /// Lines that would run past the bottom of the canvas are dropped.
    fn draw_block(
        &self,
        canvas: &mut RgbaImage,
        layout: &OverlayLayout,
        y: u32,
        text: &str,
        font: &FontVec,
        size: f32,
    ) -> u32 {
        let scale = PxScale::from(size);
        let line_height = (size * LINE_SPACING).ceil() as u32;
        let measure = |s: &str| text_size(scale, font, s).0;
        let mut y = y;

        for line in wrap_text(text, layout.wrap_width, measure) {
            if y + line_height > layout.canvas.1 {
                debug!("Dropping overflowing line {:?}", line);
                break;
            }
            let x = layout.line_x(measure(&line));
            draw_text_mut(
                canvas,
                Rgba(self.style.text_color),
                x as i32,
                y as i32,
                scale,
                font,
                &line,
            );
            y += line_height;
        }

        y
    }
}

impl OverlayRenderer for OverlayComposer {
    fn render(&self, track: &LibraryRecord, deck: Deck, is_master: bool) -> Result<RgbaImage> {
        let layout = OverlayLayout::compute(&self.style, deck);
        let (width, height) = layout.canvas;
        let mut canvas = RgbaImage::new(width, height);

        draw_gradient(&mut canvas, deck, &self.style);
        self.draw_badge(&mut canvas, &layout, badge_label(is_master));

        let cover = decode_cover(
            track.cover_art.as_deref(),
            self.style.cover_size,
            self.style.placeholder_cover_color,
        );
        paste_cover(&mut canvas, &cover, layout.cover_origin);

        let mut y = layout.text_top;
        y = self.draw_block(
            &mut canvas,
            &layout,
            y,
            &track.title,
            &self.fonts.bold,
            self.style.title_font_size,
        );
        y = self.draw_block(
            &mut canvas,
            &layout,
            y,
            &track.artists,
            &self.fonts.regular,
            self.style.body_font_size,
        );
        self.draw_block(
            &mut canvas,
            &layout,
            y,
            &track.publisher,
            &self.fonts.regular,
            self.style.body_font_size,
        );

        Ok(canvas)
    }
}
