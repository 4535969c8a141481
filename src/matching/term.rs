//! Built-in matcher
//!
//! fzf-style term matching: every whitespace-separated query term must occur
//! in the candidate as a case-insensitive subsequence. Accepted candidates
//! are ranked by how tightly the terms match, blended with overall string
//! similarity.

use strsim::normalized_levenshtein;

use super::{FuzzyMatch, FuzzyMatcher, MatchError};

const COMPACTNESS_WEIGHT: f64 = 0.8;
const SIMILARITY_WEIGHT: f64 = 0.2;

/// In-process fuzzy matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct TermMatcher {
    min_score: f64,
}

impl TermMatcher {
    /// Candidates scoring below `min_score` are rejected
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    /// Score `candidate` against `query`, or `None` if some term is missing
    pub fn score(query: &str, candidate: &str) -> Option<f64> {
        let query = query.to_lowercase();
        let candidate = candidate.to_lowercase();
        let haystack: Vec<char> = candidate.chars().collect();

        let mut compactness = 0.0;
        let mut terms = 0usize;
        for term in query.split_whitespace() {
            let needle: Vec<char> = term.chars().collect();
            let span = shortest_span(&needle, &haystack)?;
            compactness += needle.len() as f64 / span as f64;
            terms += 1;
        }
        if terms == 0 {
            return None;
        }

        let similarity = normalized_levenshtein(&query, &candidate);
        Some(COMPACTNESS_WEIGHT * compactness / terms as f64 + SIMILARITY_WEIGHT * similarity)
    }
}

/// Length of the shortest window of `haystack` containing `needle` as a
/// subsequence
fn shortest_span(needle: &[char], haystack: &[char]) -> Option<usize> {
    let first = *needle.first()?;
    let mut best: Option<usize> = None;

    for (start, &c) in haystack.iter().enumerate() {
        if c != first {
            continue;
        }
        let mut matched = 1;
        let mut end = start;
        for (offset, &h) in haystack[start + 1..].iter().enumerate() {
            if matched == needle.len() {
                break;
            }
            if h == needle[matched] {
                matched += 1;
                end = start + 1 + offset;
            }
        }
        if matched < needle.len() {
            // Later starts cannot match either
            break;
        }
        let span = end - start + 1;
        if best.map_or(true, |b| span < b) {
            best = Some(span);
        }
    }

    best
}

impl FuzzyMatcher for TermMatcher {
    fn best_match(&self, query: &str, candidates: &[&str]) -> Result<Option<FuzzyMatch>, MatchError> {
        let mut best: Option<FuzzyMatch> = None;

        for candidate in candidates {
            let Some(score) = Self::score(query, candidate) else {
                continue;
            };
            if score < self.min_score {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(FuzzyMatch {
                    candidate: candidate.to_string(),
                    score,
                });
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_shortest_span() {
        assert_eq!(shortest_span(&chars("abc"), &chars("abc")), Some(3));
        assert_eq!(shortest_span(&chars("ac"), &chars("a-b-ac")), Some(2));
        assert_eq!(shortest_span(&chars("fire"), &chars("rogue - empire")), None);
        assert_eq!(shortest_span(&chars("x"), &chars("")), None);
    }

    #[test]
    fn test_every_term_required() {
        assert!(TermMatcher::score("empire rogue", "Rogue - Empire").is_some());
        assert!(TermMatcher::score("empire fire", "Rogue - Empire").is_none());
        assert!(TermMatcher::score("   ", "Rogue - Empire").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let upper = TermMatcher::score("EMPIRE", "Rogue - Empire").unwrap();
        let lower = TermMatcher::score("empire", "rogue - empire").unwrap();
        assert!((upper - lower).abs() < 1e-9);
    }

    #[test]
    fn test_prefers_compact_match() {
        let matcher = TermMatcher::default();
        let result = matcher
            .best_match("fire", &["Fiona - Underwire", "Kayla - Fire"])
            .unwrap()
            .unwrap();
        assert_eq!(result.candidate, "Kayla - Fire");
    }

    #[test]
    fn test_no_candidate_matches() {
        let matcher = TermMatcher::default();
        assert!(matcher.best_match("zzz", &["Rogue - Empire"]).unwrap().is_none());
        assert!(matcher.best_match("empire", &[]).unwrap().is_none());
    }

    #[test]
    fn test_min_score_rejects_loose_matches() {
        let strict = TermMatcher::new(0.95);
        assert!(strict
            .best_match("re", &["Rogue - Empire"])
            .unwrap()
            .is_none());

        let exact = strict.best_match("rogue - empire", &["Rogue - Empire"]).unwrap();
        assert!(exact.is_some());
    }
}
