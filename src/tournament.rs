//! Pairwise tournament scheduling and per-group ranking state.
//!
//! A [`Tournament`] owns one [`RatingLedger`] and one fixed pair list per
//! group. Setup generates every `(i, j)` combination in index order and
//! down-samples it to a budget with a seeded RNG; the run walks the
//! surviving pairs strictly sequentially, delegating each comparison to
//! the injected [`Comparator`] and each decided verdict to the ledger.
//! Groups never share state, so independent groups can run concurrently.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comparator::{judge_pair_with_retry, Comparator, ComparatorError};
use crate::config::RankingConfig;
use crate::rating::{RatingLedger, RatingRecord};
use crate::trace::{now_epoch_ms, ComparisonTrace, TraceError, TraceSink};

// ===== GROUP KEYS =====

/// Partition key for independent ranking state.
///
/// Serialized as `-1` for [`GroupKey::Ungrouped`] and as the plain index
/// otherwise, matching the numeric key convention of upstream stores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "i64", try_from = "i64")]
pub enum GroupKey {
    /// A single unpartitioned collection.
    Ungrouped,
    /// A numbered partition, e.g. a sub-problem index.
    Index(u32),
}

impl From<GroupKey> for i64 {
    fn from(key: GroupKey) -> Self {
        match key {
            GroupKey::Ungrouped => -1,
            GroupKey::Index(index) => i64::from(index),
        }
    }
}

impl TryFrom<i64> for GroupKey {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(GroupKey::Ungrouped),
            index if (0..=i64::from(u32::MAX)).contains(&index) => {
                Ok(GroupKey::Index(index as u32))
            }
            other => Err(format!("group key out of range: {other}")),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Ungrouped => write!(f, "ungrouped"),
            GroupKey::Index(index) => write!(f, "group-{index}"),
        }
    }
}

// ===== PHASES, ERRORS, RESULTS =====

/// Per-group lifecycle. A group absent from the tournament is
/// "uninitialized"; every accessor on a present group is valid in any
/// phase, including `Failed` (best-known partial ordering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPhase {
    /// Pairs generated and ratings initialized; no comparisons yet.
    SetUp,
    /// The run loop is mid-flight.
    Running,
    /// Every scheduled pair was judged.
    Completed,
    /// Aborted by an unrecovered comparator failure; terminal. Rating
    /// updates applied before the failure are retained.
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("{0} has no ranking state")]
    UnknownGroup(GroupKey),
    #[error("{group} cannot {operation} while {phase:?}")]
    InvalidPhase {
        group: GroupKey,
        phase: GroupPhase,
        operation: &'static str,
    },
    #[error("{group} has no item {index} (group holds {len})")]
    ItemOutOfBounds {
        group: GroupKey,
        index: usize,
        len: usize,
    },
    #[error("comparator for {group} failed after {attempts} attempts: {source}")]
    ComparatorExhausted {
        group: GroupKey,
        attempts: u32,
        #[source]
        source: ComparatorError,
    },
    #[error("invalid ranking config: {0}")]
    InvalidConfig(String),
    #[error("trace sink failed: {0}")]
    Trace(#[from] TraceError),
}

/// Counters for one group's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Pairs surviving the cap at setup.
    pub pairs_scheduled: usize,
    /// Comparator calls that completed, retries folded in.
    pub judged: usize,
    /// Judgments that moved ratings.
    pub decided: usize,
    /// Tie outcomes, unrecognized verdicts included.
    pub ties: usize,
}

/// An item handed back to the caller with its final standing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem<I> {
    pub item: I,
    /// Elo rating at extraction time.
    pub rating: f64,
    /// Decided comparisons the item took part in.
    pub comparisons: u32,
    /// 1-based position in the group ordering.
    pub rank: usize,
}

#[derive(Debug)]
struct GroupState<I> {
    items: Vec<I>,
    /// Fixed traversal order; only pair selection was randomized.
    pairs: Vec<(usize, usize)>,
    cursor: usize,
    ledger: RatingLedger,
    phase: GroupPhase,
    stats: GroupStats,
}

// ===== TOURNAMENT =====

/// Tournament scheduler and rating store over independent item groups.
///
/// Lifecycle per group: [`setup_group`](Self::setup_group) once, one run
/// ([`run_group`](Self::run_group) or [`run_all`](Self::run_all)), then
/// read the ordering. The ordered accessors also work mid-run and after a
/// failed run, returning the best-known ordering for whatever ratings
/// exist.
#[derive(Debug)]
pub struct Tournament<I> {
    config: RankingConfig,
    groups: HashMap<GroupKey, GroupState<I>>,
}

impl<I> Tournament<I> {
    pub fn new(config: RankingConfig) -> Result<Self, RankError> {
        config.validate().map_err(RankError::InvalidConfig)?;
        Ok(Self {
            config,
            groups: HashMap::new(),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: RankingConfig::default(),
            groups: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Keys of every set-up group, sorted for deterministic iteration.
    pub fn group_keys(&self) -> Vec<GroupKey> {
        let mut keys: Vec<GroupKey> = self.groups.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Generate the pair workload and rating records for a group.
    ///
    /// Pairs are every `(i, j)` with `i < j < items.len()` in index order.
    /// If their count exceeds the cap (`max_pairs`, or the configured
    /// fraction of the item count when `None`), uniformly random pairs are
    /// removed until it fits; removal preserves the relative order of the
    /// survivors. Zero or one item yields an empty workload, leaving the
    /// lone item at the initial rating.
    pub fn setup_group(
        &mut self,
        group: GroupKey,
        items: Vec<I>,
        max_pairs: Option<usize>,
    ) -> Result<(), RankError> {
        if let Some(existing) = self.groups.get(&group) {
            return Err(RankError::InvalidPhase {
                group,
                phase: existing.phase,
                operation: "set up again",
            });
        }

        let item_count = items.len();
        let mut pairs = all_pairs(item_count);
        let cap = max_pairs.unwrap_or_else(|| self.config.default_max_pairs(item_count));
        if pairs.len() > cap {
            let mut rng = StdRng::seed_from_u64(group_seed(self.config.rng_seed, group));
            while pairs.len() > cap {
                let victim = rng.gen_range(0..pairs.len());
                pairs.remove(victim);
            }
        }

        debug!(%group, items = item_count, pairs = pairs.len(), "group set up");
        let stats = GroupStats {
            pairs_scheduled: pairs.len(),
            ..GroupStats::default()
        };
        self.groups.insert(
            group,
            GroupState {
                items,
                pairs,
                cursor: 0,
                ledger: RatingLedger::new(item_count, &self.config),
                phase: GroupPhase::SetUp,
                stats,
            },
        );
        Ok(())
    }

    fn state(&self, group: GroupKey) -> Result<&GroupState<I>, RankError> {
        self.groups
            .get(&group)
            .ok_or(RankError::UnknownGroup(group))
    }

    pub fn group_phase(&self, group: GroupKey) -> Result<GroupPhase, RankError> {
        Ok(self.state(group)?.phase)
    }

    pub fn group_stats(&self, group: GroupKey) -> Result<GroupStats, RankError> {
        Ok(self.state(group)?.stats)
    }

    /// The surviving pair list in traversal order.
    pub fn scheduled_pairs(&self, group: GroupKey) -> Result<&[(usize, usize)], RankError> {
        Ok(&self.state(group)?.pairs)
    }

    /// The group's items in their original input order.
    pub fn items(&self, group: GroupKey) -> Result<&[I], RankError> {
        Ok(&self.state(group)?.items)
    }

    pub fn rating_record(&self, group: GroupKey, index: usize) -> Result<&RatingRecord, RankError> {
        let state = self.state(group)?;
        if index >= state.ledger.len() {
            return Err(RankError::ItemOutOfBounds {
                group,
                index,
                len: state.ledger.len(),
            });
        }
        Ok(state.ledger.record(index))
    }

    /// Item indices sorted by descending rating; exact ties keep input
    /// order. Reading is idempotent in every phase.
    pub fn ordered_indices(&self, group: GroupKey) -> Result<Vec<usize>, RankError> {
        Ok(self.state(group)?.ledger.ordered_indices())
    }

    pub fn ordered_items(&self, group: GroupKey) -> Result<Vec<&I>, RankError> {
        let state = self.state(group)?;
        Ok(state
            .ledger
            .ordered_indices()
            .into_iter()
            .map(|index| &state.items[index])
            .collect())
    }

    /// Items in rank order with their final ratings attached.
    pub fn ordered_with_ratings(&self, group: GroupKey) -> Result<Vec<(&I, f64)>, RankError> {
        let state = self.state(group)?;
        Ok(state
            .ledger
            .ordered_indices()
            .into_iter()
            .map(|index| (&state.items[index], state.ledger.record(index).rating))
            .collect())
    }

    /// Consume the group and hand the items back in rank order, annotated
    /// with rating, comparison count, and 1-based rank. Valid in any
    /// phase, so a failed group's partial standings are still
    /// recoverable.
    pub fn finish_group(&mut self, group: GroupKey) -> Result<Vec<RankedItem<I>>, RankError> {
        let state = self
            .groups
            .remove(&group)
            .ok_or(RankError::UnknownGroup(group))?;
        let GroupState { items, ledger, .. } = state;

        let order = ledger.ordered_indices();
        let mut rank_of = vec![0usize; order.len()];
        for (position, index) in order.iter().enumerate() {
            rank_of[*index] = position + 1;
        }

        let mut ranked: Vec<RankedItem<I>> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let record = ledger.record(index);
                RankedItem {
                    item,
                    rating: record.rating,
                    comparisons: record.comparisons,
                    rank: rank_of[index],
                }
            })
            .collect();
        ranked.sort_by_key(|entry| entry.rank);
        Ok(ranked)
    }
}

impl<I: Send + Sync> Tournament<I> {
    /// Judge every scheduled pair of one group, in order.
    pub async fn run_group<C>(&mut self, group: GroupKey, comparator: &C) -> Result<(), RankError>
    where
        C: Comparator<I> + ?Sized,
    {
        self.run_group_traced(group, comparator, None).await
    }

    /// [`run_group`](Self::run_group) with an optional per-comparison
    /// trace sink. A sink failure aborts the run; lost trace records are
    /// treated like any other unrecovered error.
    pub async fn run_group_traced<C>(
        &mut self,
        group: GroupKey,
        comparator: &C,
        trace: Option<&dyn TraceSink>,
    ) -> Result<(), RankError>
    where
        C: Comparator<I> + ?Sized,
    {
        let config = &self.config;
        let state = self
            .groups
            .get_mut(&group)
            .ok_or(RankError::UnknownGroup(group))?;
        run_state(group, state, comparator, config, trace).await
    }

    /// Run every group still in `SetUp`, concurrently, and await them all.
    ///
    /// There is no internal concurrency limiter: each group issues one
    /// comparator call at a time, and the caller controls overall
    /// parallelism by what it sets up before calling this. All groups run
    /// to a terminal phase before the first error (in group-key order) is
    /// reported; completed groups keep their results.
    pub async fn run_all<C>(&mut self, comparator: &C) -> Result<(), RankError>
    where
        C: Comparator<I> + ?Sized,
    {
        self.run_all_traced(comparator, None).await
    }

    pub async fn run_all_traced<C>(
        &mut self,
        comparator: &C,
        trace: Option<&dyn TraceSink>,
    ) -> Result<(), RankError>
    where
        C: Comparator<I> + ?Sized,
    {
        let config = &self.config;
        let mut pending: Vec<(GroupKey, &mut GroupState<I>)> = self
            .groups
            .iter_mut()
            .filter(|(_, state)| state.phase == GroupPhase::SetUp)
            .map(|(group, state)| (*group, state))
            .collect();
        pending.sort_by_key(|(group, _)| *group);

        let runs = pending
            .into_iter()
            .map(|(group, state)| run_state(group, state, comparator, config, trace));
        let results = futures::future::join_all(runs).await;
        for result in results {
            result?;
        }
        Ok(())
    }
}

async fn run_state<I, C>(
    group: GroupKey,
    state: &mut GroupState<I>,
    comparator: &C,
    config: &RankingConfig,
    trace: Option<&dyn TraceSink>,
) -> Result<(), RankError>
where
    I: Send + Sync,
    C: Comparator<I> + ?Sized,
{
    if state.phase != GroupPhase::SetUp {
        return Err(RankError::InvalidPhase {
            group,
            phase: state.phase,
            operation: "run",
        });
    }
    state.phase = GroupPhase::Running;

    while state.cursor < state.pairs.len() {
        let (first, second) = state.pairs[state.cursor];
        let judged = judge_pair_with_retry(
            comparator,
            config,
            group,
            &state.items[first],
            &state.items[second],
        )
        .await;

        match judged {
            Ok(outcome) => {
                state.stats.judged += 1;
                match outcome.judgment.orient(first, second) {
                    Some((winner, loser)) => {
                        state.ledger.apply_decided(config, winner, loser);
                        state.stats.decided += 1;
                    }
                    None => state.stats.ties += 1,
                }
                if let Some(sink) = trace {
                    let event = ComparisonTrace {
                        timestamp_ms: now_epoch_ms(),
                        group,
                        comparison_index: state.cursor,
                        first_index: first,
                        second_index: second,
                        raw_verdict: Some(outcome.raw),
                        judgment: Some(outcome.judgment),
                        attempts: outcome.attempts,
                        first_rating_after: state.ledger.record(first).rating,
                        second_rating_after: state.ledger.record(second).rating,
                        error: None,
                    };
                    if let Err(error) = sink.record(event) {
                        state.phase = GroupPhase::Failed;
                        return Err(RankError::Trace(error));
                    }
                }
                state.cursor += 1;
            }
            Err(error) => {
                state.phase = GroupPhase::Failed;
                if let Some(sink) = trace {
                    let event = ComparisonTrace {
                        timestamp_ms: now_epoch_ms(),
                        group,
                        comparison_index: state.cursor,
                        first_index: first,
                        second_index: second,
                        raw_verdict: None,
                        judgment: None,
                        attempts: config.max_retries + 1,
                        first_rating_after: state.ledger.record(first).rating,
                        second_rating_after: state.ledger.record(second).rating,
                        error: Some(error.to_string()),
                    };
                    if let Err(trace_error) = sink.record(event) {
                        return Err(RankError::Trace(trace_error));
                    }
                }
                return Err(error);
            }
        }
    }

    state.phase = GroupPhase::Completed;
    debug!(%group, judged = state.stats.judged, decided = state.stats.decided, "group tournament completed");
    Ok(())
}

fn all_pairs(item_count: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(item_count * item_count.saturating_sub(1) / 2);
    for first in 0..item_count {
        for second in (first + 1)..item_count {
            pairs.push((first, second));
        }
    }
    pairs
}

fn group_seed(seed: u64, group: GroupKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    group.hash(&mut hasher);
    hasher.finish()
}
