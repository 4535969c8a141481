//! External `fzf` matcher
//!
//! Pipes the candidates to `fzf --filter <query>` and takes the top line of
//! its ranked output.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

use super::{FuzzyMatch, FuzzyMatcher, MatchError};

/// fzf exit code for "no match"
const NO_MATCH_EXIT_CODE: i32 = 1;

/// Matcher backed by the `fzf` executable
pub struct FzfMatcher {
    command: String,
}

impl FzfMatcher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Top-ranked line of `fzf --filter` output
pub fn parse_filter_output(stdout: &str) -> Option<FuzzyMatch> {
    stdout
        .lines()
        .map(str::trim_end)
        .find(|line| !line.is_empty())
        .map(|line| FuzzyMatch {
            candidate: line.to_string(),
            score: 1.0,
        })
}

impl FuzzyMatcher for FzfMatcher {
    fn best_match(&self, query: &str, candidates: &[&str]) -> Result<Option<FuzzyMatch>, MatchError> {
        let start = Instant::now();

        let mut child = Command::new(&self.command)
            .arg("--filter")
            .arg(query)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MatchError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // Feed stdin from a separate thread so a full stdout pipe cannot
        // deadlock against a full stdin pipe.
        let input = candidates.join("\n");
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                stdin.write_all(input.as_bytes())?;
                stdin.write_all(b"\n")
            })
        });

        let output = child.wait_with_output().map_err(|source| MatchError::Io {
            command: self.command.clone(),
            source,
        })?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // fzf may exit before reading everything
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(source)) => {
                    return Err(MatchError::Io {
                        command: self.command.clone(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(MatchError::Io {
                        command: self.command.clone(),
                        source: std::io::Error::other("stdin writer thread panicked"),
                    })
                }
            }
        }

        debug!("fzf for {:?} took {:?}", query, start.elapsed());

        if output.status.success() {
            return Ok(parse_filter_output(&String::from_utf8_lossy(&output.stdout)));
        }
        if output.status.code() == Some(NO_MATCH_EXIT_CODE) {
            return Ok(None);
        }

        Err(MatchError::Failed {
            command: self.command.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_output() {
        let parsed = parse_filter_output("Rogue - Empire\nKayla - Fire\n").unwrap();
        assert_eq!(parsed.candidate, "Rogue - Empire");

        assert!(parse_filter_output("").is_none());
        assert!(parse_filter_output("\n\n").is_none());
    }

    #[test]
    fn test_missing_executable() {
        let matcher = FzfMatcher::new("definitely-not-an-installed-fzf");
        let result = matcher.best_match("empire", &["Rogue - Empire"]);
        assert!(matches!(result, Err(MatchError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_one_is_no_match() {
        // `false` ignores its arguments and exits with status 1
        let matcher = FzfMatcher::new("false");
        assert!(matcher.best_match("empire", &["Rogue - Empire"]).unwrap().is_none());
    }
}
