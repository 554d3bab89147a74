//! Rating calculator trait
//!
//! This module defines the interface for two-party rating updates. A decided
//! match is always rated from both sides' pre-match beliefs, so the order in
//! which the two updates are computed never matters.

use crate::error::Result;
use crate::types::{CompetitorId, RatingChange, SkillBelief};
use serde::{Deserialize, Serialize};

/// Result of rating one decided match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCalculationResult {
    /// Winner first, then loser
    pub rating_changes: Vec<RatingChange>,
    /// Pre-match probability that the winner would win
    pub winner_expectation: f64,
}

/// Trait for calculating rating changes after decided matches
#[cfg_attr(test, mockall::automock)]
pub trait RatingCalculator: Send + Sync {
    /// Posterior belief for `own` after a single result against `opponent`
    fn update(&self, own: &SkillBelief, opponent: &SkillBelief, won: bool)
        -> Result<SkillBelief>;

    /// Probability that `own` beats `opponent` under the current beliefs
    fn win_probability(&self, own: &SkillBelief, opponent: &SkillBelief) -> f64;

    /// Belief assigned to competitors without any rated match
    fn initial_belief(&self) -> SkillBelief;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;

    /// Update configuration from JSON
    fn update_config(&mut self, config: serde_json::Value) -> Result<()>;
}

/// Rate both sides of a decided match
///
/// Fails as a whole: if either side cannot be updated, no change is returned.
pub fn rate_match<C: RatingCalculator + ?Sized>(
    calculator: &C,
    winner: (&CompetitorId, SkillBelief),
    loser: (&CompetitorId, SkillBelief),
) -> Result<RatingCalculationResult> {
    let (winner_id, winner_belief) = winner;
    let (loser_id, loser_belief) = loser;

    let winner_expectation = calculator.win_probability(&winner_belief, &loser_belief);
    let winner_after = calculator.update(&winner_belief, &loser_belief, true)?;
    let loser_after = calculator.update(&loser_belief, &winner_belief, false)?;

    Ok(RatingCalculationResult {
        rating_changes: vec![
            RatingChange {
                competitor_id: winner_id.clone(),
                old_belief: winner_belief,
                new_belief: winner_after,
                won: true,
            },
            RatingChange {
                competitor_id: loser_id.clone(),
                old_belief: loser_belief,
                new_belief: loser_after,
                won: false,
            },
        ],
        winner_expectation,
    })
}
