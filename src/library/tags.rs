//! Audio tag reading
//!
//! Probes audio files with symphonia and collects the fields the overlay
//! shows: title, artists, publisher (label) and cover art.

use std::fs::File;
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey};
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Tag fields read from one audio file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    /// Performers in tag order
    pub artists: Vec<String>,
    pub publisher: Option<String>,
    /// Encoded image bytes (usually JPEG or PNG)
    pub cover_art: Option<Vec<u8>>,
}

impl TrackTags {
    /// Artists joined for display
    pub fn joined_artists(&self) -> String {
        self.artists.join(", ")
    }

    /// Merge one metadata revision. Values already present win, so the
    /// container-level revision read first takes precedence.
    fn absorb(&mut self, revision: &MetadataRevision) {
        let mut artists = Vec::new();

        for tag in revision.tags() {
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) if self.title.is_none() => {
                    self.title = Some(value.to_string());
                }
                Some(StandardTagKey::Artist) => artists.push(value.to_string()),
                Some(StandardTagKey::Label) if self.publisher.is_none() => {
                    self.publisher = Some(value.to_string());
                }
                _ => {}
            }
        }

        if self.artists.is_empty() {
            self.artists = artists;
        }

        if self.cover_art.is_none() {
            let visuals = revision.visuals();
            let front = visuals
                .iter()
                .find(|v| v.usage == Some(StandardVisualKey::FrontCover))
                .or_else(|| visuals.first());
            self.cover_art = front.map(|v| v.data.to_vec());
        }
    }
}

/// Tag reading failures. Swallowed per file while building the library.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or unreadable audio file {path}: {source}")]
    Unsupported {
        path: String,
        #[source]
        source: symphonia::core::errors::Error,
    },
}

/// Reads tags from an audio file
pub trait TagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, TagError>;
}

/// Tag reader backed by symphonia's format probe
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaTagReader;

impl TagReader for SymphoniaTagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, TagError> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| TagError::Open {
            path: display.clone(),
            source,
        })?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|source| TagError::Unsupported {
                path: display,
                source,
            })?;

        let mut tags = TrackTags::default();

        // Tags found ahead of the container (e.g. ID3v2 on MP3)
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                tags.absorb(revision);
            }
        }

        // Tags embedded in the container itself (FLAC, MP4, Ogg)
        if let Some(revision) = probed.format.metadata().current() {
            tags.absorb(revision);
        }

        Ok(tags)
    }
}
