//! Storage Layer
//!
//! Application directories and the scratch directory holding per-cycle
//! working files: the captured frame, title crops, OCR sidecars and the
//! rendered overlays. Everything in it is disposable.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::shared::Deck;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "nowplaying", "NowPlayingOverlay")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default scratch directory when none is configured
pub fn default_work_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("scratch"))
}

/// Well-known working files for one run
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Use `root` as the scratch directory, creating it if needed
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create scratch directory {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging file for live captures
    pub fn capture_frame(&self) -> PathBuf {
        self.root.join("capture.png")
    }

    /// Normalized title crop handed to OCR
    pub fn title_crop(&self, deck: Deck) -> PathBuf {
        self.root.join(format!("{}_title.png", deck))
    }

    /// Output base given to OCR; the engine appends `.txt`
    pub fn ocr_base(&self, deck: Deck) -> PathBuf {
        self.root.join(format!("{}_title", deck))
    }

    /// Text sidecar written by OCR
    pub fn ocr_sidecar(&self, deck: Deck) -> PathBuf {
        crate::vision::ocr::sidecar_path(&self.ocr_base(deck))
    }

    /// Rendered overlay consumed by the broadcast software
    pub fn overlay(&self, deck: Deck) -> PathBuf {
        self.root.join(format!("{}_overlay.png", deck))
    }

    /// Every file this directory may contain
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.capture_frame()];
        for deck in Deck::ALL {
            files.push(self.title_crop(deck));
            files.push(self.ocr_sidecar(deck));
            files.push(self.overlay(deck));
        }
        files
    }

    /// Delete all working files, returning how many existed
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.files() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {:?}", path));
                }
            }
        }
        debug!("Removed {} scratch files from {:?}", removed, self.root);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_paths() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().to_path_buf()).unwrap();

        assert_eq!(scratch.title_crop(Deck::Left), dir.path().join("left_title.png"));
        assert_eq!(scratch.ocr_sidecar(Deck::Right), dir.path().join("right_title.txt"));
        assert_eq!(scratch.overlay(Deck::Right), dir.path().join("right_overlay.png"));
        assert_eq!(scratch.files().len(), 7);
    }

    #[test]
    fn test_scratch_creates_missing_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("scratch");

        let scratch = ScratchDir::new(root.clone()).unwrap();

        assert!(root.is_dir());
        assert_eq!(scratch.root(), root.as_path());
    }

    #[test]
    fn test_clean_removes_only_known_files() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(scratch.overlay(Deck::Left), b"png").unwrap();
        std::fs::write(scratch.ocr_sidecar(Deck::Left), b"text").unwrap();
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&unrelated, b"keep").unwrap();

        assert_eq!(scratch.clean().unwrap(), 2);
        assert!(!scratch.overlay(Deck::Left).exists());
        assert!(unrelated.exists());

        // Nothing left to remove
        assert_eq!(scratch.clean().unwrap(), 0);
    }
}
