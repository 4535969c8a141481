//! Vision Layer
//!
//! Finds each deck's song-info panel in a captured frame, classifies the
//! master deck, and reads the loaded track's title with OCR.

pub mod detection;
pub mod ocr;
pub mod ocr_preprocess;
pub mod title;

pub use ocr::{OcrEngine, TesseractOcr};
pub use title::{Attempt, DeckTitle, TitleError, TitleExtractor};
