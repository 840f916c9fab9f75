//! Per-group Elo rating store.
//!
//! Each item index in a group owns one [`RatingRecord`]. Records are
//! created at setup, mutated only through [`RatingLedger::apply_decided`],
//! and read out as a stable descending ordering. Ties never reach the
//! ledger; an ambiguous verdict moves nothing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;

/// Rating state for one item index within a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Current Elo rating. No rounding during accumulation; display
    /// layers round.
    pub rating: f64,
    /// Decided comparisons this item has taken part in.
    pub comparisons: u32,
    /// Adaptive K-factor, decaying with `comparisons`.
    pub k_factor: f64,
}

/// Logistic expectation that the winner-side rating beats the loser-side
/// rating: `1 / (1 + 10^((loser - winner) / 400))`.
pub fn expected_win(winner_rating: f64, loser_rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((loser_rating - winner_rating) / 400.0))
}

/// K-factor after `comparisons` decided comparisons: linear from
/// `initial_k_factor` down to `min_k_factor` over the first
/// `comparisons_to_min_k` comparisons, clamped at the floor afterwards.
pub fn k_decay(config: &RankingConfig, comparisons: u32) -> f64 {
    if comparisons >= config.comparisons_to_min_k {
        return config.min_k_factor;
    }
    let span = config.initial_k_factor - config.min_k_factor;
    config.initial_k_factor
        - span * f64::from(comparisons) / f64::from(config.comparisons_to_min_k)
}

/// Rating records for one group, indexed by item position.
#[derive(Debug, Clone)]
pub struct RatingLedger {
    records: Vec<RatingRecord>,
}

impl RatingLedger {
    /// One fresh record per item index.
    pub fn new(item_count: usize, config: &RankingConfig) -> Self {
        let record = RatingRecord {
            rating: config.initial_rating,
            comparisons: 0,
            k_factor: config.initial_k_factor,
        };
        Self {
            records: vec![record; item_count],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> &RatingRecord {
        &self.records[index]
    }

    /// Apply one decided comparison.
    ///
    /// Both ratings move by their own current K times the same `1 - E`
    /// margin, using the ratings and K-factors as they stood before this
    /// call; counts and K-factors update afterwards. Equal K-factors make
    /// the exchange exactly zero-sum.
    pub fn apply_decided(&mut self, config: &RankingConfig, winner: usize, loser: usize) {
        let expected = expected_win(self.records[winner].rating, self.records[loser].rating);
        let margin = 1.0 - expected;
        let gain = self.records[winner].k_factor * margin;
        let loss = self.records[loser].k_factor * margin;
        self.records[winner].rating += gain;
        self.records[loser].rating -= loss;
        for index in [winner, loser] {
            let record = &mut self.records[index];
            record.comparisons += 1;
            record.k_factor = k_decay(config, record.comparisons);
        }
    }

    /// Item indices sorted by descending rating. The sort is stable, so
    /// exactly equal ratings keep their input order.
    pub fn ordered_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.records.len()).collect();
        indices.sort_by(|&a, &b| {
            self.records[b]
                .rating
                .partial_cmp(&self.records[a].rating)
                .unwrap_or(Ordering::Equal)
        });
        indices
    }
}
