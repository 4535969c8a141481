//! Title extraction
//!
//! Crops the title area of a deck's song-info panel, normalizes it for OCR
//! and returns the first line the engine recognizes.

use thiserror::Error;
use tracing::debug;

use crate::capture::frame::{CapturedFrame, Region};
use crate::config::{DetectionConfig, OcrConfig};
use crate::shared::Deck;
use crate::storage::ScratchDir;
use crate::vision::ocr::{OcrEngine, OcrError};
use crate::vision::ocr_preprocess::{apply_preprocessing, OcrPreprocessing};

/// What the deck's title area says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckTitle {
    /// The deck shows the application's empty-deck placeholder
    NotLoaded,
    /// Raw first line of OCR output
    Text(String),
}

/// One pass of the extraction pipeline.
///
/// The first attempt follows the configured capture density; the
/// remediation attempt always upscales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Normal,
    ForcedUpscale,
}

impl Attempt {
    /// Attempts in the order they are tried
    pub const SEQUENCE: [Attempt; 2] = [Attempt::Normal, Attempt::ForcedUpscale];
}

/// Title extraction failures
#[derive(Debug, Error)]
pub enum TitleError {
    #[error("title area of the {deck} deck is empty")]
    EmptyCrop { deck: Deck },

    #[error("failed to write title crop: {0}")]
    WriteCrop(#[from] image::ImageError),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Crops, normalizes and recognizes deck titles
pub struct TitleExtractor {
    ocr: Box<dyn OcrEngine>,
    settings: OcrConfig,
    detection: DetectionConfig,
    high_density: bool,
    scratch: ScratchDir,
}

impl TitleExtractor {
    pub fn new(
        ocr: Box<dyn OcrEngine>,
        settings: OcrConfig,
        detection: DetectionConfig,
        high_density: bool,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            ocr,
            settings,
            detection,
            high_density,
            scratch,
        }
    }

    /// Preprocessing used for the given attempt
    pub fn preprocessing(&self, attempt: Attempt) -> OcrPreprocessing {
        let upscale = attempt == Attempt::ForcedUpscale || !self.high_density;
        OcrPreprocessing {
            invert: true,
            scale: if upscale { self.settings.upscale_factor.max(1) } else { 1 },
            filter: self.settings.upscale_filter,
        }
    }

    /// Title area of `panel` in frame coordinates, clipped to the frame
    pub fn title_region(&self, frame: &CapturedFrame, panel: Region, deck: Deck) -> Region {
        self.detection
            .layout(deck)
            .title
            .resolve(panel)
            .clip(frame.width(), frame.height())
    }

    /// Run one extraction attempt for `deck`
    pub fn extract(
        &self,
        frame: &CapturedFrame,
        panel: Region,
        deck: Deck,
        attempt: Attempt,
    ) -> Result<DeckTitle, TitleError> {
        let region = self.title_region(frame, panel, deck);
        let crop = frame.crop(region).ok_or(TitleError::EmptyCrop { deck })?;

        let normalized = apply_preprocessing(&crop, &self.preprocessing(attempt));
        let crop_path = self.scratch.title_crop(deck);
        normalized.save(&crop_path)?;

        let text = self
            .ocr
            .recognize(&crop_path, &self.scratch.ocr_base(deck), self.settings.layout)?;

        let title = parse_title(&text, &self.settings.placeholder_text);
        debug!("{} deck title ({:?}): {:?}", deck, attempt, title);
        Ok(title)
    }
}

/// First line of OCR output, or `NotLoaded` for the empty-deck placeholder
pub fn parse_title(text: &str, placeholder: &str) -> DeckTitle {
    let first_line = text.lines().next().unwrap_or("").trim_end();
    if first_line == placeholder.trim() {
        DeckTitle::NotLoaded
    } else {
        DeckTitle::Text(first_line.to_string())
    }
}
