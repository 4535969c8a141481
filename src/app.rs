//! Application Coordinator
//!
//! Runs the polling loop: capture the window, locate both decks' panels,
//! classify the master deck, and on every master change identify the loaded
//! tracks and render fresh overlays.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analysis::{MasterTracker, SongResolver, Transition};
use crate::capture::frame::{CapturedFrame, Region};
use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::library::{LibraryIndex, LibraryRecord};
use crate::matching::{FuzzyMatcher, MatchError};
use crate::overlay::{badge_label, OverlayRenderer};
use crate::shared::Deck;
use crate::storage::ScratchDir;
use crate::vision::detection;
use crate::vision::{Attempt, DeckTitle, OcrEngine, TitleError, TitleExtractor};

/// Longest uninterrupted sleep between cycles
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// External collaborators of the polling loop
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub ocr: Box<dyn OcrEngine>,
    pub matcher: Box<dyn FuzzyMatcher>,
    pub renderer: Box<dyn OverlayRenderer>,
}

/// Detection result for one deck in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckObservation {
    pub deck: Deck,
    pub panel: Region,
    pub is_master: bool,
}

/// What happened to a deck during an identification round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckOutcome {
    /// Song-info panel not found in the frame
    NoPanel,
    /// Deck shows the empty-deck placeholder
    NotLoaded,
    /// Title read but no library track matched
    NoMatch,
    /// Overlay written for the matched track
    Rendered { key: String },
    /// Identification or rendering failed
    Failed,
    /// Skipped because shutdown was requested
    Cancelled,
}

/// Summary of one polling cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub observations: [DeckObservation; 2],
    pub transition: Transition,
    /// Per-deck outcomes; empty when no identification round ran
    pub outcomes: Vec<(Deck, DeckOutcome)>,
}

impl CycleReport {
    /// Whether this cycle ran an identification round
    pub fn identified(&self) -> bool {
        !self.outcomes.is_empty()
    }
}

/// Failure of one identification attempt
#[derive(Debug, Error)]
enum IdentifyError {
    #[error(transparent)]
    Title(#[from] TitleError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

impl IdentifyError {
    /// An empty crop stays empty when upscaled; everything else may recover
    fn is_retryable(&self) -> bool {
        !matches!(self, IdentifyError::Title(TitleError::EmptyCrop { .. }))
    }
}

enum Identification<'a> {
    NotLoaded,
    Unknown,
    Found(&'a LibraryRecord),
}

/// Main application coordinator
pub struct NowPlayingApp {
    config: AppConfig,
    library: LibraryIndex,
    scratch: ScratchDir,
    source: Box<dyn FrameSource>,
    titles: TitleExtractor,
    resolver: SongResolver,
    renderer: Box<dyn OverlayRenderer>,
    tracker: MasterTracker,
    cancel: CancellationToken,
}

impl NowPlayingApp {
    pub fn new(
        config: AppConfig,
        library: LibraryIndex,
        scratch: ScratchDir,
        collaborators: Collaborators,
        cancel: CancellationToken,
    ) -> Self {
        let titles = TitleExtractor::new(
            collaborators.ocr,
            config.ocr.clone(),
            config.detection.clone(),
            config.capture.high_density,
            scratch.clone(),
        );

        Self {
            config,
            library,
            scratch,
            source: collaborators.source,
            titles,
            resolver: SongResolver::new(collaborators.matcher),
            renderer: collaborators.renderer,
            tracker: MasterTracker::new(),
            cancel,
        }
    }

    /// Poll until cancelled. Scratch files are removed before the first
    /// cycle and after the last one.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Watching for master deck changes ({} library tracks)",
            self.library.len()
        );
        self.scratch.clean()?;

        let result = self.poll();
        if let Err(e) = &result {
            error!("Polling stopped: {:#}", e);
        }

        match self.scratch.clean() {
            Ok(removed) => info!("Removed {} scratch files", removed),
            Err(e) => warn!("Failed to clean scratch directory: {:#}", e),
        }

        result
    }

    /// Capture one frame and identify both decks regardless of the master
    /// state. Scratch artifacts are kept for inspection.
    pub fn run_single(&mut self) -> Result<CycleReport> {
        self.scratch.clean()?;
        let frame = self.source.capture().context("Window capture failed")?;
        let report = self.run_cycle(&frame, true);

        for observation in &report.observations {
            info!(
                "{} deck: panel {} master {}",
                observation.deck, observation.panel, observation.is_master
            );
        }
        info!("Master state: {}", report.transition.to);
        if report.identified() {
            for (deck, outcome) in &report.outcomes {
                info!("{} deck: {:?}", deck, outcome);
            }
        }
        info!("Artifacts kept in {:?}", self.scratch.root());

        Ok(report)
    }

    fn poll(&mut self) -> Result<()> {
        let interval = Duration::from_millis(self.config.general.poll_interval_ms);

        while !self.cancel.is_cancelled() {
            let frame = self.source.capture().context("Window capture failed")?;
            if self.cancel.is_cancelled() {
                break;
            }
            let report = self.run_cycle(&frame, false);
            if report.identified() {
                debug!("Identification round finished: {:?}", report.outcomes);
            }
            self.pause(interval);
        }

        info!("Shutdown requested, polling stopped");
        Ok(())
    }

    /// Sleep for `interval` in short slices, waking early on cancellation
    fn pause(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Process one frame. Identification runs on a master change, or always
    /// when `force` is set.
    pub fn run_cycle(&mut self, frame: &CapturedFrame, force: bool) -> CycleReport {
        let observations = Deck::ALL.map(|deck| self.observe(frame, deck));
        let transition = self.tracker.observe(
            observations[Deck::Left.index()].is_master,
            observations[Deck::Right.index()].is_master,
        );

        let mut report = CycleReport {
            observations,
            transition,
            outcomes: Vec::new(),
        };

        if transition.changed() {
            info!("Master deck changed: {} -> {}", transition.from, transition.to);
        } else if !force {
            debug!("Cycle without master change, {:?} since capture", frame.timestamp.elapsed());
            return report;
        }

        for observation in &report.observations {
            let outcome = if self.cancel.is_cancelled() {
                DeckOutcome::Cancelled
            } else {
                self.process_deck(frame, observation)
            };
            report.outcomes.push((observation.deck, outcome));
        }

        debug!("Identification round done {:?} after capture", frame.timestamp.elapsed());
        report
    }

    fn observe(&self, frame: &CapturedFrame, deck: Deck) -> DeckObservation {
        let detection = &self.config.detection;
        let layout = detection.layout(deck);
        let panel = detection::locate_panel(frame, layout.start_column_px(frame.width()), detection);
        let is_master = detection::is_master(
            frame,
            panel,
            &layout.master_indicator,
            detection.master_threshold,
        );

        DeckObservation {
            deck,
            panel,
            is_master,
        }
    }

    fn process_deck(&self, frame: &CapturedFrame, observation: &DeckObservation) -> DeckOutcome {
        let deck = observation.deck;
        if observation.panel.is_empty() {
            info!("Song info panel not found for {} deck", deck);
            return DeckOutcome::NoPanel;
        }

        let record = match self.identify(frame, observation) {
            Ok(Identification::Found(record)) => record,
            Ok(Identification::NotLoaded) => {
                info!("{} deck is not loaded", deck);
                return DeckOutcome::NotLoaded;
            }
            Ok(Identification::Unknown) => {
                info!("No song found for {} deck", deck);
                return DeckOutcome::NoMatch;
            }
            Err(e) => {
                warn!("Skipping {} deck this cycle: {}", deck, e);
                return DeckOutcome::Failed;
            }
        };

        let is_master = self.tracker.current().is_deck(deck);
        match self.write_overlay(record, deck, is_master) {
            Ok(()) => {
                info!("{} deck [{}]: {}", deck, badge_label(is_master), record.key);
                DeckOutcome::Rendered {
                    key: record.key.clone(),
                }
            }
            Err(e) => {
                warn!("Failed to render overlay for {} deck: {:#}", deck, e);
                DeckOutcome::Failed
            }
        }
    }

    /// Run the attempt sequence until one attempt succeeds
    fn identify(
        &self,
        frame: &CapturedFrame,
        observation: &DeckObservation,
    ) -> Result<Identification<'_>, IdentifyError> {
        let mut failure = None;

        for attempt in Attempt::SEQUENCE {
            if failure.is_some() && self.cancel.is_cancelled() {
                break;
            }
            match self.try_identify(frame, observation, attempt) {
                Ok(identification) => return Ok(identification),
                Err(e) if e.is_retryable() => {
                    warn!("{} deck attempt {:?} failed: {}", observation.deck, attempt, e);
                    failure = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        failure.map_or(Ok(Identification::Unknown), Err)
    }

    fn try_identify(
        &self,
        frame: &CapturedFrame,
        observation: &DeckObservation,
        attempt: Attempt,
    ) -> Result<Identification<'_>, IdentifyError> {
        let title = self
            .titles
            .extract(frame, observation.panel, observation.deck, attempt)?;
        if title == DeckTitle::NotLoaded {
            return Ok(Identification::NotLoaded);
        }

        Ok(match self.resolver.resolve(&title, &self.library)? {
            Some(record) => Identification::Found(record),
            None => Identification::Unknown,
        })
    }

    fn write_overlay(&self, record: &LibraryRecord, deck: Deck, is_master: bool) -> Result<()> {
        let image = self.renderer.render(record, deck, is_master)?;
        let path = self.scratch.overlay(deck);
        image
            .save(&path)
            .with_context(|| format!("Failed to write overlay {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use crate::config::RelativeRect;
    use crate::library::normalize_key;
    use crate::matching::TermMatcher;
    use crate::vision::ocr::{OcrError, PageLayout};
    use image::{Rgba, RgbaImage};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use tempfile::tempdir;

    const BACKGROUND: Rgba<u8> = Rgba([60, 60, 60, 255]);
    const BORDER: Rgba<u8> = Rgba([25, 25, 25, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn paint(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
        for py in y..y + h {
            for px in x..x + w {
                image.put_pixel(px, py, color);
            }
        }
    }

    /// 400x100 frame with both panels; the master deck's indicator is lit
    fn frame(master: Option<Deck>) -> CapturedFrame {
        let mut image = RgbaImage::from_pixel(400, 100, BACKGROUND);
        for x in [0, 200] {
            paint(&mut image, x, 10, 180, 1, BORDER);
            paint(&mut image, x, 11, 180, 50, BLACK);
        }
        match master {
            Some(Deck::Left) => paint(&mut image, 100, 40, 2, 2, RED),
            Some(Deck::Right) => paint(&mut image, 300, 40, 2, 2, RED),
            None => {}
        }
        CapturedFrame::new(image)
    }

    /// Serves queued frames, then cancels and keeps serving a blank frame
    struct QueuedSource {
        frames: VecDeque<CapturedFrame>,
        cancel: CancellationToken,
        captures: Rc<Cell<usize>>,
    }

    impl FrameSource for QueuedSource {
        fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
            self.captures.set(self.captures.get() + 1);
            match self.frames.pop_front() {
                Some(frame) => Ok(frame),
                None => {
                    self.cancel.cancel();
                    Ok(frame(None))
                }
            }
        }
    }

    struct MissingWindow;

    impl FrameSource for MissingWindow {
        fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
            Err(CaptureError::WindowNotFound {
                owner: "rekordbox".to_string(),
                title: "rekordbox".to_string(),
            })
        }
    }

    /// Fails the first `failures` calls, then answers with `text`
    struct StubOcr {
        text: String,
        failures: Cell<usize>,
        calls: Rc<Cell<usize>>,
    }

    impl OcrEngine for StubOcr {
        fn recognize(&self, _image: &Path, _base: &Path, _layout: PageLayout) -> Result<String, OcrError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(OcrError::MissingOutput {
                    path: PathBuf::from("left_title.txt"),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(format!("{}\n", self.text))
        }
    }

    struct StubRenderer {
        rendered: Rc<RefCell<Vec<(Deck, bool)>>>,
    }

    impl OverlayRenderer for StubRenderer {
        fn render(&self, _track: &LibraryRecord, deck: Deck, is_master: bool) -> Result<RgbaImage> {
            self.rendered.borrow_mut().push((deck, is_master));
            Ok(RgbaImage::new(4, 4))
        }
    }

    struct Harness {
        app: NowPlayingApp,
        scratch: ScratchDir,
        cancel: CancellationToken,
        captures: Rc<Cell<usize>>,
        ocr_calls: Rc<Cell<usize>>,
        rendered: Rc<RefCell<Vec<(Deck, bool)>>>,
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.general.poll_interval_ms = 0;
        for layout in [&mut config.detection.left, &mut config.detection.right] {
            layout.master_indicator = RelativeRect::new(0.5, 0.5, 0.2, 0.2);
            layout.title = RelativeRect::new(0.1, 0.1, 0.5, 0.3);
        }
        config
    }

    fn library() -> LibraryIndex {
        LibraryIndex::from_records([LibraryRecord {
            key: normalize_key("Rogue", "Empire"),
            title: "Empire".to_string(),
            artists: "Rogue".to_string(),
            publisher: "Monstercat".to_string(),
            cover_art: None,
            path: PathBuf::from("/music/Empire.mp3"),
        }])
    }

    fn harness(
        dir: &Path,
        config: AppConfig,
        frames: Vec<CapturedFrame>,
        ocr_text: &str,
        ocr_failures: usize,
    ) -> Harness {
        let cancel = CancellationToken::new();
        let captures = Rc::new(Cell::new(0));
        let ocr_calls = Rc::new(Cell::new(0));
        let rendered = Rc::new(RefCell::new(Vec::new()));
        let scratch = ScratchDir::new(dir.to_path_buf()).unwrap();

        let collaborators = Collaborators {
            source: Box::new(QueuedSource {
                frames: frames.into(),
                cancel: cancel.clone(),
                captures: captures.clone(),
            }),
            ocr: Box::new(StubOcr {
                text: ocr_text.to_string(),
                failures: Cell::new(ocr_failures),
                calls: ocr_calls.clone(),
            }),
            matcher: Box::new(TermMatcher::default()),
            renderer: Box::new(StubRenderer {
                rendered: rendered.clone(),
            }),
        };

        Harness {
            app: NowPlayingApp::new(config, library(), scratch.clone(), collaborators, cancel.clone()),
            scratch,
            cancel,
            captures,
            ocr_calls,
            rendered,
        }
    }

    #[test]
    fn test_observe_both_decks() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 0);

        let report = h.app.run_cycle(&frame(Some(Deck::Right)), false);

        let [left, right] = report.observations;
        assert_eq!(left.panel, Region::new(0, 10, 180, 51));
        assert_eq!(right.panel, Region::new(200, 10, 180, 51));
        assert!(!left.is_master);
        assert!(right.is_master);
    }

    #[test]
    fn test_master_changes_trigger_identification() {
        let dir = tempdir().unwrap();
        let frames = vec![
            frame(None),
            frame(Some(Deck::Left)),
            frame(Some(Deck::Left)),
            frame(Some(Deck::Right)),
        ];
        let mut h = harness(dir.path(), test_config(), frames, "Empire", 0);

        h.app.run().unwrap();

        // Four queued frames plus the one that triggered cancellation
        assert_eq!(h.captures.get(), 5);
        // Two rounds, both decks each
        assert_eq!(h.ocr_calls.get(), 4);
        assert_eq!(
            *h.rendered.borrow(),
            vec![
                (Deck::Left, true),
                (Deck::Right, false),
                (Deck::Left, false),
                (Deck::Right, true)
            ]
        );
        // Overlays are removed on shutdown
        assert!(!h.scratch.overlay(Deck::Left).exists());
    }

    #[test]
    fn test_cycle_writes_overlays() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire Ft. Rogue - Fire 03.45", 0);

        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);

        assert!(report.identified());
        let expected = DeckOutcome::Rendered {
            key: "Rogue - Empire".to_string(),
        };
        assert_eq!(report.outcomes, vec![(Deck::Left, expected.clone()), (Deck::Right, expected)]);
        assert!(h.scratch.overlay(Deck::Left).exists());
        assert!(h.scratch.overlay(Deck::Right).exists());
        assert!(h.scratch.title_crop(Deck::Left).exists());
    }

    #[test]
    fn test_no_change_skips_identification() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 0);

        let report = h.app.run_cycle(&frame(None), false);

        assert!(!report.identified());
        assert_eq!(h.ocr_calls.get(), 0);
    }

    #[test]
    fn test_forced_cycle_identifies_without_change() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 0);

        let report = h.app.run_cycle(&frame(None), true);

        assert!(!report.transition.changed());
        assert_eq!(report.outcomes.len(), 2);
        // No master yet: both overlays say PREVIOUS
        assert_eq!(*h.rendered.borrow(), vec![(Deck::Left, false), (Deck::Right, false)]);
    }

    #[test]
    fn test_missing_panels_skip_ocr() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 0);
        let blank = CapturedFrame::new(RgbaImage::from_pixel(400, 100, BACKGROUND));

        let report = h.app.run_cycle(&blank, true);

        assert_eq!(
            report.outcomes,
            vec![(Deck::Left, DeckOutcome::NoPanel), (Deck::Right, DeckOutcome::NoPanel)]
        );
        assert_eq!(h.ocr_calls.get(), 0);
    }

    #[test]
    fn test_not_loaded_and_unknown_tracks() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Not Loaded.", 0);
        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);
        assert_eq!(report.outcomes[0].1, DeckOutcome::NotLoaded);

        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Zzyzx", 0);
        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);
        assert_eq!(report.outcomes[0].1, DeckOutcome::NoMatch);
        assert!(h.rendered.borrow().is_empty());
    }

    #[test]
    fn test_ocr_failure_retried_once() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 1);

        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);

        // Left: fail + retry, right: one call
        assert_eq!(h.ocr_calls.get(), 3);
        assert!(matches!(report.outcomes[0].1, DeckOutcome::Rendered { .. }));
    }

    #[test]
    fn test_second_failure_skips_deck() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 2);

        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);

        assert_eq!(report.outcomes[0].1, DeckOutcome::Failed);
        assert!(matches!(report.outcomes[1].1, DeckOutcome::Rendered { .. }));
        assert_eq!(h.ocr_calls.get(), 3);
    }

    #[test]
    fn test_empty_title_crop_not_retried() {
        let dir = tempdir().unwrap();
        let mut config = test_config();
        config.detection.left.title = RelativeRect::new(0.1, 0.1, 0.0, 0.3);
        let mut h = harness(dir.path(), config, vec![], "Empire", 0);

        let report = h.app.run_cycle(&frame(Some(Deck::Left)), false);

        assert_eq!(report.outcomes[0].1, DeckOutcome::Failed);
        // Only the right deck reached OCR
        assert_eq!(h.ocr_calls.get(), 1);
    }

    #[test]
    fn test_cancel_before_run() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path(), test_config(), vec![frame(None)], "Empire", 0);
        let Harness {
            mut app,
            scratch,
            cancel,
            captures,
            ..
        } = h;
        std::fs::write(scratch.overlay(Deck::Right), b"stale").unwrap();

        cancel.cancel();
        app.run().unwrap();

        assert_eq!(captures.get(), 0);
        assert!(!scratch.overlay(Deck::Right).exists());
    }

    #[test]
    fn test_capture_error_aborts_loop() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![], "Empire", 0);
        h.app.source = Box::new(MissingWindow);

        assert!(h.app.run().is_err());
        assert!(!h.cancel.is_cancelled());
    }

    #[test]
    fn test_run_single_keeps_artifacts() {
        let dir = tempdir().unwrap();
        let mut h = harness(dir.path(), test_config(), vec![frame(None)], "Empire", 0);

        let report = h.app.run_single().unwrap();

        assert!(report.identified());
        assert_eq!(h.captures.get(), 1);
        assert!(h.scratch.overlay(Deck::Left).exists());
        assert!(h.scratch.title_crop(Deck::Right).exists());
    }
}
