//! Fuzzy matching
//!
//! Picks the library key that best matches a (possibly noisy) OCR query.
//! Two backends: a built-in term matcher and the external `fzf` filter.

pub mod fzf;
pub mod term;

use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use thiserror::Error;

use crate::config::MatchingConfig;

pub use fzf::FzfMatcher;
pub use term::TermMatcher;

/// Best candidate for a query
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub candidate: String,
    /// Backend-specific score, higher is better
    pub score: f64,
}

/// Matcher failures
#[derive(Debug, Error)]
pub enum MatchError {
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

    #[error("I/O error talking to '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fuzzy matching backend
pub trait FuzzyMatcher {
    /// Best candidate for `query`, or `None` when nothing matches
    fn best_match(&self, query: &str, candidates: &[&str]) -> Result<Option<FuzzyMatch>, MatchError>;
}

/// Which matcher to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherBackend {
    #[default]
    Builtin,
    Fzf,
}

/// Create the configured matcher
pub fn build_matcher(config: &MatchingConfig) -> Box<dyn FuzzyMatcher> {
    match config.backend {
        MatcherBackend::Builtin => Box::new(TermMatcher::new(config.min_score)),
        MatcherBackend::Fzf => Box::new(FzfMatcher::new(config.fzf_command.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_builtin_matcher() {
        let matcher = build_matcher(&MatchingConfig::default());
        let result = matcher
            .best_match("empire", &["Rogue - Empire", "Kayla - Fire"])
            .unwrap()
            .unwrap();
        assert_eq!(result.candidate, "Rogue - Empire");
    }

    #[test]
    fn test_backend_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: MatcherBackend,
        }
        let parsed: Wrapper = toml::from_str("backend = \"builtin\"").unwrap();
        assert_eq!(parsed.backend, MatcherBackend::Builtin);
        let parsed: Wrapper = toml::from_str("backend = \"fzf\"").unwrap();
        assert_eq!(parsed.backend, MatcherBackend::Fzf);
    }
}
