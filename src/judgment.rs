//! Verdict tokens and the mapping from raw judge text to a [`Judgment`].
//!
//! Judges answer in free text, but only a small closed set of token
//! aliases is meaningful. Everything else is a parse error; the caller
//! decides the fallback (the tournament loop logs and treats the pair as
//! a tie so a misparse can never move ratings).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verdict for one pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// The first item of the pair wins.
    FirstWins,
    /// The second item of the pair wins.
    SecondWins,
    /// No winner; the pair moves no ratings.
    Neither,
}

impl Judgment {
    /// Winner/loser indices for a pair `(first, second)`, or `None` for a
    /// tie. This is the only path from a verdict to a rating update, so an
    /// update can never see a half-decided pair.
    pub fn orient(self, first: usize, second: usize) -> Option<(usize, usize)> {
        match self {
            Judgment::FirstWins => Some((first, second)),
            Judgment::SecondWins => Some((second, first)),
            Judgment::Neither => None,
        }
    }
}

/// The judge answered with text outside the accepted token set.
#[derive(Debug, Clone, Error)]
#[error("unrecognized verdict text: {raw:?}")]
pub struct VerdictParseError {
    /// Offending text, trimmed and truncated for logging.
    pub raw: String,
}

const FIRST_ALIASES: &[&str] = &["one", "pro one", "con one"];
const SECOND_ALIASES: &[&str] = &["two", "pro two", "con two"];
const NEITHER_ALIASES: &[&str] = &["neither", "none", "both"];

const RAW_EXCERPT_LEN: usize = 120;

/// Map raw judge output onto a [`Judgment`].
///
/// Matching is case-insensitive after stripping surrounding whitespace,
/// quotes, and stray punctuation, and collapsing interior whitespace.
/// "One", "Pro One", and "Con One" pick the first item; the "Two"
/// variants pick the second; "Neither", "None", and "Both" are ties.
/// Unrecognized text is rejected, never guessed at.
pub fn parse_verdict(raw: &str) -> Result<Judgment, VerdictParseError> {
    let normalized = normalize(raw);
    let token = normalized.as_str();
    if FIRST_ALIASES.contains(&token) {
        Ok(Judgment::FirstWins)
    } else if SECOND_ALIASES.contains(&token) {
        Ok(Judgment::SecondWins)
    } else if NEITHER_ALIASES.contains(&token) {
        Ok(Judgment::Neither)
    } else {
        Err(VerdictParseError { raw: excerpt(raw) })
    }
}

fn normalize(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_matches(|c: char| "\"'`*._,!:;".contains(c));
    stripped
        .split_whitespace()
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn excerpt(raw: &str) -> String {
    raw.trim().chars().take(RAW_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_aliases() {
        for raw in ["One", "one", " ONE ", "Pro One", "con one", "\"One\""] {
            assert_eq!(parse_verdict(raw).unwrap(), Judgment::FirstWins, "{raw}");
        }
    }

    #[test]
    fn test_parse_second_aliases() {
        for raw in ["Two", "pro two", "Con Two", "two.", "**Two**"] {
            assert_eq!(parse_verdict(raw).unwrap(), Judgment::SecondWins, "{raw}");
        }
    }

    #[test]
    fn test_parse_tie_aliases() {
        for raw in ["Neither", "none", "BOTH", "Neither."] {
            assert_eq!(parse_verdict(raw).unwrap(), Judgment::Neither, "{raw}");
        }
    }

    #[test]
    fn test_parse_collapses_interior_whitespace() {
        assert_eq!(parse_verdict("Pro   One").unwrap(), Judgment::FirstWins);
        assert_eq!(parse_verdict("con\tTwo").unwrap(), Judgment::SecondWins);
    }

    #[test]
    fn test_parse_rejects_unknown_text() {
        for raw in ["", "Three", "the first one is better", "Onetwo", "1"] {
            assert!(parse_verdict(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_error_excerpt_is_bounded() {
        let long = "x".repeat(4096);
        let err = parse_verdict(&long).unwrap_err();
        assert!(err.raw.chars().count() <= 120);
    }

    #[test]
    fn test_orient_maps_winner_and_loser() {
        assert_eq!(Judgment::FirstWins.orient(3, 7), Some((3, 7)));
        assert_eq!(Judgment::SecondWins.orient(3, 7), Some((7, 3)));
        assert_eq!(Judgment::Neither.orient(3, 7), None);
    }

    #[test]
    fn test_judgment_serde_uses_snake_case() {
        let json = serde_json::to_string(&Judgment::FirstWins).unwrap();
        assert_eq!(json, "\"first_wins\"");
        let back: Judgment = serde_json::from_str("\"neither\"").unwrap();
        assert_eq!(back, Judgment::Neither);
    }
}
