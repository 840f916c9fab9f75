#![forbid(unsafe_code)]

//! # elo-arena
//!
//! Pairwise Elo tournaments for ranking free-form items with an LLM judge.
//!
//! Absolute scores from a single prompt ("rate this 1 to 10") are noisy and
//! miscalibrated. elo-arena instead schedules head-to-head comparisons inside
//! independent groups, asks a [`Comparator`] which item wins each pair, and
//! folds the verdicts into Elo ratings with a decaying K-factor. Reading the
//! standings back out works in every phase, so a run that fails partway still
//! yields the ordering implied by the comparisons that did complete.
//!
//! The bundled [`judge::ChatJudge`] speaks the OpenAI chat-completions wire
//! format; any other judge plugs in through the [`Comparator`] trait.

pub mod comparator;
pub mod config;
pub mod evaluation;
pub mod judge;
pub mod judgment;
pub mod rating;
pub mod tournament;
pub mod trace;

pub use comparator::{Comparator, ComparatorError};
pub use config::RankingConfig;
pub use judgment::{parse_verdict, Judgment, VerdictParseError};
pub use rating::{expected_win, k_decay, RatingLedger, RatingRecord};
pub use tournament::{
    GroupKey, GroupPhase, GroupStats, RankError, RankedItem, Tournament,
};
pub use trace::{ComparisonTrace, JsonlTraceSink, TraceError, TraceSink, TraceWorker};
