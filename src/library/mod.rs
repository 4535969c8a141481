//! Track Library
//!
//! In-memory catalog of the local music library, keyed by a normalized
//! "Artists - Title" string. Built once before polling starts and only read
//! afterwards; the keys are the candidate set for fuzzy matching.

pub mod tags;

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use walkdir::WalkDir;

use tags::{TagReader, TrackTags};

/// Metadata for one library track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    /// Normalized "Artists - Title" lookup key
    pub key: String,
    pub title: String,
    /// Artists joined with ", "
    pub artists: String,
    pub publisher: String,
    /// Encoded cover image, if the file has one
    pub cover_art: Option<Vec<u8>>,
    /// Source file
    pub path: PathBuf,
}

impl LibraryRecord {
    /// Build a record from tags, using the file stem when the title tag is missing
    pub fn from_tags(path: &Path, tags: TrackTags) -> Self {
        let title = tags.title.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let artists = tags.joined_artists();

        Self {
            key: normalize_key(&artists, &title),
            title,
            artists,
            publisher: tags.publisher.unwrap_or_default(),
            cover_art: tags.cover_art,
            path: path.to_path_buf(),
        }
    }
}

/// Lookup key for a track: "Artists - Title" with whitespace collapsed
pub fn normalize_key(artists: &str, title: &str) -> String {
    let artists = collapse_whitespace(artists);
    let title = collapse_whitespace(title);
    if artists.is_empty() {
        title
    } else {
        format!("{} - {}", artists, title)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Counters from a library scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Audio files that were read
    pub indexed: usize,
    /// Audio files whose tags could not be read, plus directory entries
    /// the walk could not visit
    pub skipped: usize,
}

/// Catalog of library tracks keyed by normalized "Artists - Title"
#[derive(Debug, Default)]
pub struct LibraryIndex {
    records: BTreeMap<String, LibraryRecord>,
    stats: ScanStats,
}

impl LibraryIndex {
    /// Scan `root` recursively and index every readable audio file.
    ///
    /// Files whose tags cannot be read are skipped. On key collisions the
    /// file visited last wins.
    pub fn build(root: &Path, extensions: &[String], reader: &dyn TagReader) -> Result<Self> {
        if !root.is_dir() {
            bail!("Music directory {:?} does not exist", root);
        }

        let start = Instant::now();
        let mut records = Vec::new();
        let mut stats = ScanStats::default();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    stats.skipped += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !has_audio_extension(path, extensions) {
                continue;
            }

            match reader.read(path) {
                Ok(tags) => {
                    records.push(LibraryRecord::from_tags(path, tags));
                    stats.indexed += 1;
                }
                Err(e) => {
                    debug!("Skipping {:?}: {}", path, e);
                    stats.skipped += 1;
                }
            }
        }

        let mut index = Self::from_records(records);
        index.stats = stats;
        info!(
            "Indexed {} tracks ({} files read, {} skipped) from {:?} in {:?}",
            index.len(),
            stats.indexed,
            stats.skipped,
            root,
            start.elapsed()
        );

        Ok(index)
    }

    /// Build an index from ready-made records
    pub fn from_records(records: impl IntoIterator<Item = LibraryRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Insert a record, replacing any record with the same key
    pub fn insert(&mut self, record: LibraryRecord) {
        if let Some(previous) = self.records.insert(record.key.clone(), record) {
            debug!("Duplicate library key {:?}, replaced {:?}", previous.key, previous.path);
        }
    }

    pub fn get(&self, key: &str) -> Option<&LibraryRecord> {
        self.records.get(key)
    }

    /// All keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counters from the scan that built this index
    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

fn has_audio_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
