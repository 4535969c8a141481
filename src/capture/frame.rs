//! Frame data structures for captured window content

use image::{GenericImageView, Rgba, RgbaImage, SubImage};
use std::fmt;
use std::time::Instant;

/// An axis-aligned rectangle in frame coordinates.
///
/// A zero width or height means "not found"; callers skip every step that
/// depends on such a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// The degenerate "not found" region
    pub const EMPTY: Region = Region {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the region covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Clip the region to an image of the given dimensions
    pub fn clip(&self, width: u32, height: u32) -> Region {
        if self.x >= width || self.y >= height {
            return Region::EMPTY;
        }
        Region {
            x: self.x,
            y: self.y,
            width: self.right().min(width) - self.x,
            height: self.bottom().min(height) - self.y,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A captured frame of the monitored window
#[derive(Debug)]
pub struct CapturedFrame {
    /// RGBA pixel data
    pub image: RgbaImage,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Pixel at (x, y). Callers keep coordinates inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        self.image.get_pixel(x, y)
    }

    /// Borrow the part of `region` that lies inside the frame.
    /// Returns `None` when nothing is left after clipping.
    pub fn view(&self, region: Region) -> Option<SubImage<&RgbaImage>> {
        let clipped = region.clip(self.width(), self.height());
        if clipped.is_empty() {
            return None;
        }
        Some(self.image.view(clipped.x, clipped.y, clipped.width, clipped.height))
    }

    /// Copy the part of `region` that lies inside the frame
    pub fn crop(&self, region: Region) -> Option<RgbaImage> {
        self.view(region).map(|view| view.to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_empty() {
        assert!(Region::EMPTY.is_empty());
        assert!(Region::new(5, 5, 0, 10).is_empty());
        assert!(Region::new(5, 5, 10, 0).is_empty());
        assert!(!Region::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_region_clip() {
        let region = Region::new(90, 40, 20, 20);
        assert_eq!(region.clip(100, 50), Region::new(90, 40, 10, 10));
        assert_eq!(region.clip(200, 200), region);
        assert!(Region::new(100, 0, 10, 10).clip(100, 50).is_empty());
    }

    #[test]
    fn test_frame_crop_clips_to_bounds() {
        let frame = CapturedFrame::new(RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255])));

        let crop = frame.crop(Region::new(8, 8, 5, 5)).unwrap();
        assert_eq!(crop.dimensions(), (2, 2));
        assert_eq!(crop.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));

        assert!(frame.crop(Region::new(10, 0, 5, 5)).is_none());
        assert!(frame.crop(Region::EMPTY).is_none());
    }
}
