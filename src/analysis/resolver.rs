//! Song resolution
//!
//! Maps the raw OCR title of a deck onto a library record. OCR output is
//! noisy (truncation ellipses, durations, "Ft." credits), so when the full
//! query does not match, words are dropped shortest-first until something
//! does or nothing is left.

use tracing::debug;

use crate::library::{LibraryIndex, LibraryRecord};
use crate::matching::{FuzzyMatcher, MatchError};
use crate::vision::DeckTitle;

/// Remove truncation ellipses and collapse whitespace
pub fn clean_ocr_text(text: &str) -> String {
    text.replace("...", "")
        .replace('…', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number of whitespace-separated words
pub fn word_count(query: &str) -> usize {
    query.split_whitespace().count()
}

/// Drop the word with the fewest characters. Ties drop the first occurrence.
pub fn drop_shortest_word(query: &str) -> String {
    let words: Vec<&str> = query.split_whitespace().collect();
    let shortest = words
        .iter()
        .enumerate()
        .min_by_key(|(i, word)| (word.chars().count(), *i))
        .map(|(i, _)| i);

    words
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != shortest)
        .map(|(_, word)| *word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Successively relaxed queries, ending before the empty query
pub struct Relaxations {
    next: Option<String>,
}

impl Iterator for Relaxations {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let current = self.next.take()?;
        let relaxed = drop_shortest_word(&current);
        if !relaxed.is_empty() {
            self.next = Some(relaxed);
        }
        Some(current)
    }
}

/// The query itself followed by every shortest-word relaxation of it
pub fn relaxations(query: &str) -> Relaxations {
    let start = query.split_whitespace().collect::<Vec<_>>().join(" ");
    Relaxations {
        next: (!start.is_empty()).then_some(start),
    }
}

/// Resolves OCR titles against the library
pub struct SongResolver {
    matcher: Box<dyn FuzzyMatcher>,
}

impl SongResolver {
    pub fn new(matcher: Box<dyn FuzzyMatcher>) -> Self {
        Self { matcher }
    }

    /// Find the library record for `title`, or `None` if every relaxation
    /// fails to match
    pub fn resolve<'a>(
        &self,
        title: &DeckTitle,
        library: &'a LibraryIndex,
    ) -> Result<Option<&'a LibraryRecord>, MatchError> {
        let text = match title {
            DeckTitle::NotLoaded => return Ok(None),
            DeckTitle::Text(text) => text,
        };

        let candidates = library.keys();
        if candidates.is_empty() {
            return Ok(None);
        }

        let cleaned = clean_ocr_text(text);
        debug!("Resolving {:?} ({} words)", cleaned, word_count(&cleaned));

        for query in relaxations(&cleaned) {
            let Some(found) = self.matcher.best_match(&query, &candidates)? else {
                continue;
            };
            match library.get(&found.candidate) {
                Some(record) => {
                    debug!("Query {:?} matched {:?} (score {:.3})", query, record.key, found.score);
                    return Ok(Some(record));
                }
                None => debug!("Matcher returned unknown key {:?}", found.candidate),
            }
        }

        Ok(None)
    }
}
