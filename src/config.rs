//! Engine configuration.

use std::time::Duration;

/// Tunable constants for a ranking pass.
///
/// One config is shared by every group in a [`Tournament`]; per-group
/// variation happens through the per-call pair cap, not through config.
///
/// [`Tournament`]: crate::tournament::Tournament
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Rating assigned to every item at group setup.
    pub initial_rating: f64,
    /// K-factor for an item with zero decided comparisons.
    pub initial_k_factor: f64,
    /// Floor the K-factor decays to and then holds.
    pub min_k_factor: f64,
    /// Decided-comparison count at which the K-factor reaches the floor.
    pub comparisons_to_min_k: u32,
    /// Default pair budget as a fraction of the item count, applied when
    /// `setup_group` receives no explicit cap.
    pub max_fraction_matched: f64,
    /// Retries after a failed comparator call. Total attempts per pair is
    /// `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Extra delay added for each further retry (linear growth).
    pub retry_delay_increment: Duration,
    /// Seed for pair down-sampling. Mixed with the group key, so distinct
    /// groups draw decorrelated but reproducible removal sequences.
    pub rng_seed: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000.0,
            initial_k_factor: 60.0,
            min_k_factor: 10.0,
            comparisons_to_min_k: 20,
            max_fraction_matched: 0.75,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_delay_increment: Duration::from_millis(500),
            rng_seed: 1337,
        }
    }
}

impl RankingConfig {
    /// Pair budget used when the caller passes no explicit cap:
    /// `floor(n × max_fraction_matched)`.
    pub fn default_max_pairs(&self, item_count: usize) -> usize {
        (item_count as f64 * self.max_fraction_matched).floor() as usize
    }

    /// Reject configs the update rule cannot work with. Returns the
    /// offending field description on failure.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.initial_rating.is_finite() {
            return Err(format!(
                "initial_rating must be finite, got {}",
                self.initial_rating
            ));
        }
        if !self.min_k_factor.is_finite() || self.min_k_factor <= 0.0 {
            return Err(format!(
                "min_k_factor must be positive, got {}",
                self.min_k_factor
            ));
        }
        if !self.initial_k_factor.is_finite() || self.initial_k_factor < self.min_k_factor {
            return Err(format!(
                "initial_k_factor must be at least min_k_factor ({}), got {}",
                self.min_k_factor, self.initial_k_factor
            ));
        }
        if self.comparisons_to_min_k == 0 {
            return Err("comparisons_to_min_k must be at least 1".to_string());
        }
        if !self.max_fraction_matched.is_finite() || self.max_fraction_matched < 0.0 {
            return Err(format!(
                "max_fraction_matched must be non-negative, got {}",
                self.max_fraction_matched
            ));
        }
        Ok(())
    }
}
