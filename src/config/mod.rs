//! Application Configuration
//!
//! User settings stored in TOML format. Every pixel constant the detection
//! heuristics depend on lives here so it can be recalibrated for a different
//! skin, window size or display scale without touching code.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::frame::Region;
use crate::matching::MatcherBackend;
use crate::overlay::widgets::OverlayStyle;
use crate::shared::Deck;
use crate::vision::ocr::PageLayout;
use crate::vision::ocr_preprocess::UpscaleFilter;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Capture settings
    pub capture: CaptureSettings,
    /// Panel detection constants
    pub detection: DetectionConfig,
    /// OCR settings
    pub ocr: OcrConfig,
    /// Fuzzy matching settings
    pub matching: MatchingConfig,
    /// Overlay rendering style
    pub overlay: OverlayStyle,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root of the local track library
    pub music_dir: PathBuf,
    /// Directory for scratch files and rendered overlays (project data dir if unset)
    pub work_dir: Option<PathBuf>,
    /// Delay between polling cycles
    pub poll_interval_ms: u64,
    /// File extensions considered when scanning the library
    pub audio_extensions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let music_dir = directories::UserDirs::new()
            .and_then(|dirs| dirs.audio_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("Music"));

        Self {
            music_dir,
            work_dir: None,
            poll_interval_ms: 250,
            audio_extensions: ["mp3", "flac", "m4a", "aac", "ogg", "wav", "aif", "aiff"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Owning application name used for window lookup
    pub window_owner: String,
    /// Window title used for window lookup
    pub window_title: String,
    /// Explicit window id, skips lookup when set
    pub window_id: Option<u32>,
    /// Window lookup tool, invoked as `<tool> <owner> <title>`
    pub lookup_command: String,
    /// Window capture tool, invoked as `<tool> -l <id> -x <file>`
    pub screencapture_command: String,
    /// Capture runs at high pixel density (2x); small glyphs are then legible without upscaling
    pub high_density: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            window_owner: "rekordbox".to_string(),
            window_title: "rekordbox".to_string(),
            window_id: None,
            lookup_command: "GetWindowID".to_string(),
            screencapture_command: "screencapture".to_string(),
            high_density: false,
        }
    }
}

/// A sub-rectangle expressed as fractions of a panel's width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Resolve against a detected panel. An empty panel yields an empty region.
    pub fn resolve(&self, panel: Region) -> Region {
        if panel.is_empty() {
            return Region::EMPTY;
        }
        let scale = |value: f32, extent: u32| (value.max(0.0) * extent as f32).round() as u32;
        Region {
            x: panel.x.saturating_add(scale(self.x, panel.width)),
            y: panel.y.saturating_add(scale(self.y, panel.height)),
            width: scale(self.width, panel.width),
            height: scale(self.height, panel.height),
        }
    }
}

/// Per-deck placement of the song-info panel and its sub-areas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeckLayout {
    /// First column scanned for the panel border, as a fraction of frame width
    pub start_column: f32,
    /// Area containing the master indicator glyph
    pub master_indicator: RelativeRect,
    /// Area containing the track title
    pub title: RelativeRect,
}

impl DeckLayout {
    /// Absolute start column for a frame of the given width
    pub fn start_column_px(&self, frame_width: u32) -> u32 {
        (self.start_column.clamp(0.0, 1.0) * frame_width as f32) as u32
    }
}

/// Pixel heuristics for locating panels and classifying the master deck
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Color of the separator border drawn along the top of each panel
    pub border_color: [u8; 3],
    /// Color filling the panel below the border
    pub panel_fill: [u8; 3],
    /// Red channel value above which the master indicator counts as lit
    pub master_threshold: u8,
    pub left: DeckLayout,
    pub right: DeckLayout,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            border_color: [25, 25, 25],
            panel_fill: [0, 0, 0],
            master_threshold: 200,
            left: DeckLayout {
                start_column: 0.0,
                master_indicator: RelativeRect::new(0.78, 0.58, 0.1, 0.35),
                title: RelativeRect::new(0.14, 0.12, 0.5, 0.47),
            },
            right: DeckLayout {
                start_column: 0.5,
                master_indicator: RelativeRect::new(0.88, 0.58, 0.1, 0.35),
                title: RelativeRect::new(0.14, 0.12, 0.5, 0.47),
            },
        }
    }
}

impl DetectionConfig {
    /// Layout for the given deck
    pub fn layout(&self, deck: Deck) -> &DeckLayout {
        match deck {
            Deck::Left => &self.left,
            Deck::Right => &self.right,
        }
    }
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract executable
    pub tesseract_command: String,
    /// Page segmentation hint passed to the engine
    pub layout: PageLayout,
    /// Upscale factor applied to title crops before recognition
    pub upscale_factor: u32,
    /// Interpolation filter used for upscaling
    pub upscale_filter: UpscaleFilter,
    /// Text the application shows on an empty deck
    pub placeholder_text: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_command: "tesseract".to_string(),
            layout: PageLayout::SingleLine,
            upscale_factor: 4,
            upscale_filter: UpscaleFilter::CatmullRom,
            placeholder_text: "Not Loaded.".to_string(),
        }
    }
}

/// Fuzzy matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Matching backend
    pub backend: MatcherBackend,
    /// fzf executable, used by the `fzf` backend
    pub fzf_command: String,
    /// Minimum score (0.0 - 1.0) for the built-in matcher to accept a candidate
    pub min_score: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            backend: MatcherBackend::Builtin,
            fzf_command: "fzf".to_string(),
            min_score: 0.0,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
