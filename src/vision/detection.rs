//! Song-info panel detection
//!
//! Pixel-pattern heuristics over a captured frame: no OCR and no UI
//! automation. The DJ application draws a fixed-color separator along the
//! top of each deck's song-info panel regardless of window size, so the
//! panel is found by looking for a long run of that color. A lit master
//! indicator is the only bright red element inside the panel.

use image::{GenericImageView, Rgba};
use tracing::debug;

use crate::capture::frame::{CapturedFrame, Region};
use crate::config::{DetectionConfig, RelativeRect};

/// Locate a deck's song-info panel.
///
/// Scans rows from the top, considering only columns `>= start_column`,
/// for a run of the border color longer than a quarter of the frame width.
/// The run's first pixel is the panel's top-left corner and its length the
/// panel width. The height extends down the run's trailing column for as
/// long as the pixels have the panel fill color.
///
/// Returns [`Region::EMPTY`] when no row has a qualifying run.
pub fn locate_panel(frame: &CapturedFrame, start_column: u32, detection: &DetectionConfig) -> Region {
    let (width, height) = frame.dimensions();
    let min_run = width / 4;

    for y in 0..height {
        let mut x = start_column;
        while x < width {
            if !matches_rgb(frame.pixel(x, y), detection.border_color) {
                x += 1;
                continue;
            }

            let run_start = x;
            while x < width && matches_rgb(frame.pixel(x, y), detection.border_color) {
                x += 1;
            }

            let run_length = x - run_start;
            if run_length > min_run {
                let trailing = x - 1;
                let fill_rows = count_fill_below(frame, trailing, y, detection.panel_fill);
                let panel = Region::new(run_start, y, run_length, 1 + fill_rows);
                debug!("Panel border found at column {}: {}", start_column, panel);
                return panel;
            }
        }
    }

    debug!("No panel border found from column {}", start_column);
    Region::EMPTY
}

/// Number of consecutive fill-colored pixels directly below (x, y)
fn count_fill_below(frame: &CapturedFrame, x: u32, y: u32, fill: [u8; 3]) -> u32 {
    (y + 1..frame.height())
        .take_while(|&row| matches_rgb(frame.pixel(x, row), fill))
        .count() as u32
}

/// Exact RGB comparison, alpha ignored
fn matches_rgb(pixel: &Rgba<u8>, color: [u8; 3]) -> bool {
    pixel[0] == color[0] && pixel[1] == color[1] && pixel[2] == color[2]
}

/// Decide whether the deck owning `panel` is the master deck.
///
/// Returns true on the first pixel inside the indicator area whose red
/// channel exceeds `threshold`. An empty panel, or an indicator area that
/// falls outside the frame, is never master.
pub fn is_master(
    frame: &CapturedFrame,
    panel: Region,
    indicator: &RelativeRect,
    threshold: u8,
) -> bool {
    if panel.is_empty() {
        return false;
    }

    let Some(view) = frame.view(indicator.resolve(panel)) else {
        return false;
    };

    view.pixels().any(|(_, _, pixel)| pixel[0] > threshold)
}
