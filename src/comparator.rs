//! Comparator seam and the retrying invocation wrapper.
//!
//! The tournament never judges anything itself; it hands each pair to an
//! injected [`Comparator`] and owns everything around the call: bounded
//! retry with a linearly growing delay, verdict-token parsing, and the
//! tie fallback for unrecognized text.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::config::RankingConfig;
use crate::judgment::{parse_verdict, Judgment};
use crate::tournament::{GroupKey, RankError};

/// Error surfaced by a comparator implementation.
#[derive(Debug, Error)]
pub enum ComparatorError {
    #[error("{0}")]
    Message(String),
}

impl ComparatorError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Pairwise judge injected into a tournament.
///
/// Implementations return raw verdict text ("One", "Pro Two", "Neither",
/// and friends); the engine parses it. An `Err` marks a transient failure
/// and is retried by the engine, so implementations should not retry
/// internally. Implementations must be safe to invoke concurrently, one
/// call at a time per group but across many groups at once.
#[async_trait]
pub trait Comparator<I: Sync>: Send + Sync {
    async fn judge(
        &self,
        group: GroupKey,
        first: &I,
        second: &I,
    ) -> Result<String, ComparatorError>;
}

/// One judged pair after retries and verdict parsing.
#[derive(Debug, Clone)]
pub(crate) struct JudgedPair {
    /// Raw comparator text, kept for tracing.
    pub raw: String,
    pub judgment: Judgment,
    /// Comparator invocations consumed, retries included.
    pub attempts: u32,
}

/// Invoke the comparator for one pair with bounded retry and map its text
/// to a judgment.
///
/// Unrecognized verdict text is logged and judged [`Judgment::Neither`],
/// so a misparse can never move ratings. Call failures are retried
/// `max_retries` times, sleeping `retry_base_delay + retry_delay_increment
/// × retries_so_far` between attempts; exhaustion returns
/// [`RankError::ComparatorExhausted`] wrapping the last error.
pub(crate) async fn judge_pair_with_retry<I, C>(
    comparator: &C,
    config: &RankingConfig,
    group: GroupKey,
    first: &I,
    second: &I,
) -> Result<JudgedPair, RankError>
where
    I: Sync,
    C: Comparator<I> + ?Sized,
{
    let mut last_error: Option<ComparatorError> = None;

    for attempt in 0..=config.max_retries {
        match comparator.judge(group, first, second).await {
            Ok(raw) => {
                let judgment = match parse_verdict(&raw) {
                    Ok(judgment) => judgment,
                    Err(parse_error) => {
                        warn!(%group, error = %parse_error, "unrecognized verdict, judging the pair a tie");
                        Judgment::Neither
                    }
                };
                return Ok(JudgedPair {
                    raw,
                    judgment,
                    attempts: attempt + 1,
                });
            }
            Err(error) => {
                if attempt == config.max_retries {
                    return Err(RankError::ComparatorExhausted {
                        group,
                        attempts: attempt + 1,
                        source: error,
                    });
                }
                warn!(%group, attempt, error = %error, "comparator call failed, retrying");
                let delay = retry_delay(config, attempt);
                last_error = Some(error);
                sleep(delay).await;
            }
        }
    }

    Err(RankError::ComparatorExhausted {
        group,
        attempts: config.max_retries + 1,
        source: last_error.unwrap_or_else(|| ComparatorError::msg("comparator never ran")),
    })
}

/// Linear backoff: base delay plus one increment per retry already spent.
fn retry_delay(config: &RankingConfig, attempt: u32) -> Duration {
    config.retry_base_delay + config.retry_delay_increment * attempt
}
