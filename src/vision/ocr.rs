//! OCR (Optical Character Recognition) module
//!
//! Runs Tesseract as an external process on a raster file. Tesseract writes
//! its result to a `.txt` sidecar next to the requested output base.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Page segmentation hint for the OCR engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    /// Treat the image as a single text line
    #[default]
    SingleLine,
    /// Assume a single uniform block of text
    Block,
}

impl PageLayout {
    /// Tesseract `--psm` value for this layout
    pub fn psm(&self) -> &'static str {
        match self {
            PageLayout::SingleLine => "7",
            PageLayout::Block => "6",
        }
    }
}

/// Engine-level OCR failures
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to read OCR output {path:?}: {source}")]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Text recognition backend
pub trait OcrEngine {
    /// Recognize the text in `image`, using `output_base` for any files the
    /// engine writes. Returns the full recognized text.
    fn recognize(&self, image: &Path, output_base: &Path, layout: PageLayout)
        -> Result<String, OcrError>;
}

/// Path of the text file Tesseract writes for `output_base`
pub fn sidecar_path(output_base: &Path) -> PathBuf {
    let mut path = OsString::from(output_base.as_os_str());
    path.push(".txt");
    PathBuf::from(path)
}

/// Tesseract command line engine
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(
        &self,
        image: &Path,
        output_base: &Path,
        layout: PageLayout,
    ) -> Result<String, OcrError> {
        let start = Instant::now();

        let output = Command::new(&self.command)
            .arg(image)
            .arg(output_base)
            .arg("--psm")
            .arg(layout.psm())
            .output()
            .map_err(|source| OcrError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let sidecar = sidecar_path(output_base);
        let text = std::fs::read_to_string(&sidecar).map_err(|source| OcrError::MissingOutput {
            path: sidecar.clone(),
            source,
        })?;

        debug!("Tesseract on {:?} took {:?}", image, start.elapsed());
        Ok(text)
    }
}
