//! Window Capture Layer
//!
//! Produces one RGBA frame of the monitored window per polling cycle. Live
//! capture shells out to the platform's window capture tool; replay mode
//! reads a saved screenshot instead, which is how the detection constants
//! get calibrated.

pub mod frame;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CaptureSettings;
use frame::CapturedFrame;

/// Errors raised while locating or capturing the target window
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no window owned by '{owner}' titled '{title}' was found")]
    WindowNotFound { owner: String, title: String },

    #[error("{count} windows owned by '{owner}' are titled '{title}'; set capture.window_id to pick one")]
    AmbiguousWindow {
        owner: String,
        title: String,
        count: usize,
    },

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to decode frame {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Source of frames for the polling loop
pub trait FrameSource {
    /// Capture the window's current content
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError>;
}

/// Resolve the id of the window to capture.
///
/// Uses `capture.window_id` when set, otherwise runs the lookup tool and
/// requires it to report exactly one window.
pub fn find_window_id(capture: &CaptureSettings) -> Result<u32, CaptureError> {
    if let Some(id) = capture.window_id {
        info!("Using configured window id {}", id);
        return Ok(id);
    }

    let output = Command::new(&capture.lookup_command)
        .arg(&capture.window_owner)
        .arg(&capture.window_title)
        .output()
        .map_err(|source| CaptureError::Spawn {
            command: capture.lookup_command.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!(
        "{} exited with {}: {:?}",
        capture.lookup_command, output.status, stdout
    );

    let ids = parse_window_ids(&stdout);
    match ids.len() {
        0 if !output.status.success() && !output.stderr.is_empty() => {
            Err(CaptureError::CommandFailed {
                command: capture.lookup_command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
        0 => Err(CaptureError::WindowNotFound {
            owner: capture.window_owner.clone(),
            title: capture.window_title.clone(),
        }),
        1 => {
            let id = ids[0];
            info!(
                "Found window {} for '{}' / '{}'",
                id, capture.window_owner, capture.window_title
            );
            Ok(id)
        }
        count => Err(CaptureError::AmbiguousWindow {
            owner: capture.window_owner.clone(),
            title: capture.window_title.clone(),
            count,
        }),
    }
}

/// Parse one numeric window id per line, ignoring noise and duplicates
fn parse_window_ids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Live capture through the `screencapture` command line tool
pub struct ScreencaptureSource {
    command: String,
    window_id: u32,
    output: PathBuf,
}

impl ScreencaptureSource {
    /// Capture `window_id`, staging each frame at `output`
    pub fn new(capture: &CaptureSettings, window_id: u32, output: PathBuf) -> Self {
        Self {
            command: capture.screencapture_command.clone(),
            window_id,
            output,
        }
    }
}

impl FrameSource for ScreencaptureSource {
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        let output = Command::new(&self.command)
            .arg("-l")
            .arg(self.window_id.to_string())
            .arg("-x")
            .arg(&self.output)
            .output()
            .map_err(|source| CaptureError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        load_frame(&self.output)
    }
}

/// Replays a saved screenshot as every frame
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        load_frame(&self.path)
    }
}

/// Decode an image file into a frame
fn load_frame(path: &Path) -> Result<CapturedFrame, CaptureError> {
    let image = image::open(path).map_err(|source| CaptureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let frame = CapturedFrame::new(image.to_rgba8());
    debug!("Captured {}x{} frame", frame.width(), frame.height());
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_parse_window_ids() {
        assert_eq!(parse_window_ids("1234\n"), vec![1234]);
        assert_eq!(parse_window_ids("  77 \n\n77\n"), vec![77]);
        assert_eq!(parse_window_ids("12\n34\n"), vec![12, 34]);
        assert!(parse_window_ids("").is_empty());
        assert!(parse_window_ids("window not found").is_empty());
    }

    #[test]
    fn test_find_window_id_prefers_configured_id() {
        let capture = CaptureSettings {
            window_id: Some(99),
            lookup_command: "/nonexistent/lookup-tool".to_string(),
            ..Default::default()
        };

        assert_eq!(find_window_id(&capture).unwrap(), 99);
    }

    #[test]
    fn test_find_window_id_missing_tool() {
        let capture = CaptureSettings {
            lookup_command: "/nonexistent/lookup-tool".to_string(),
            ..Default::default()
        };

        let result = find_window_id(&capture);
        assert!(matches!(result, Err(CaptureError::Spawn { .. })));
    }

    #[test]
    fn test_image_file_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(8, 4, Rgba([25, 25, 25, 255]))
            .save(&path)
            .unwrap();

        let mut source = ImageFileSource::new(path);
        let frame = source.capture().unwrap();

        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(frame.pixel(3, 2), &Rgba([25, 25, 25, 255]));
    }

    #[test]
    fn test_image_file_source_missing_file() {
        let mut source = ImageFileSource::new(PathBuf::from("/nonexistent/frame.png"));
        assert!(matches!(source.capture(), Err(CaptureError::Decode { .. })));
    }
}
