//! Now Playing Overlay - DJ deck detection for broadcast overlays
//!
//! Watches the DJ application's window, works out which deck is master,
//! reads the loaded track titles with OCR, matches them against the local
//! music library and renders "now playing" cards for streaming software.

mod analysis;
mod app;
mod capture;
mod config;
mod library;
mod matching;
mod overlay;
mod shared;
mod signal;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::{Collaborators, NowPlayingApp};
use crate::capture::{find_window_id, FrameSource, ImageFileSource, ScreencaptureSource};
use crate::config::AppConfig;
use crate::library::tags::SymphoniaTagReader;
use crate::library::LibraryIndex;
use crate::overlay::{Fonts, OverlayComposer};
use crate::storage::ScratchDir;
use crate::vision::TesseractOcr;

/// Now Playing Overlay - master deck detection and overlay rendering
#[derive(Parser, Debug)]
#[command(name = "now-playing-overlay")]
#[command(about = "Renders now-playing overlays for the master deck of a running DJ application")]
struct Args {
    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root of the music library
    #[arg(short, long)]
    music_dir: Option<PathBuf>,

    /// Capture this window id instead of looking it up
    #[arg(short, long)]
    window_id: Option<u32>,

    /// Process a saved screenshot once and keep the intermediate files
    #[arg(long, value_name = "PNG")]
    replay: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Now Playing Overlay starting...");

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(music_dir) = args.music_dir {
        config.general.music_dir = music_dir;
    }
    if let Some(window_id) = args.window_id {
        config.capture.window_id = Some(window_id);
    }

    let work_dir = match &config.general.work_dir {
        Some(dir) => dir.clone(),
        None => storage::default_work_dir()?,
    };
    let scratch = ScratchDir::new(work_dir)?;
    info!("Scratch directory: {:?}", scratch.root());

    let library = LibraryIndex::build(
        &config.general.music_dir,
        &config.general.audio_extensions,
        &SymphoniaTagReader,
    )?;
    if library.is_empty() {
        warn!("No tracks found in {:?}", config.general.music_dir);
    }
    let scan = library.stats();
    if scan.skipped > 0 {
        warn!("{} library entries could not be read (run with --verbose for details)", scan.skipped);
    }

    let fonts = Fonts::load(&config.overlay.regular_font, &config.overlay.bold_font)
        .context("Failed to load overlay fonts; set overlay.regular_font and overlay.bold_font")?;
    let renderer = OverlayComposer::new(config.overlay.clone(), fonts);

    let source: Box<dyn FrameSource> = match &args.replay {
        Some(path) => {
            info!("Replaying {:?}", path);
            Box::new(ImageFileSource::new(path.clone()))
        }
        None => {
            let window_id = find_window_id(&config.capture)?;
            Box::new(ScreencaptureSource::new(
                &config.capture,
                window_id,
                scratch.capture_frame(),
            ))
        }
    };

    let collaborators = Collaborators {
        source,
        ocr: Box::new(TesseractOcr::new(config.ocr.tesseract_command.clone())),
        matcher: matching::build_matcher(&config.matching),
        renderer: Box::new(renderer),
    };

    let cancel = CancellationToken::new();
    let replay = args.replay.is_some();
    let mut app = NowPlayingApp::new(config, library, scratch, collaborators, cancel.clone());

    if replay {
        app.run_single()?;
    } else {
        let listener = signal::spawn_interrupt_listener(cancel.clone())?;
        let result = app.run();
        cancel.cancel();
        if listener.join().is_err() {
            warn!("Interrupt listener thread panicked");
        }
        result?;
    }

    info!("Now Playing Overlay shutdown complete");

    Ok(())
}

/// Load the configuration, writing defaults on first run
fn load_or_create_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    let config_path = storage::get_config_dir()?.join("config.toml");
    if config_path.exists() {
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
        info!("Loaded configuration from {:?}", config_path);
        return Ok(config);
    }

    let config = AppConfig::default();
    config::save_config(&config, &config_path)?;
    info!("Wrote default configuration to {:?}", config_path);
    Ok(config)
}
