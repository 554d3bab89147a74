//! Skill-stratified team assignment
//!
//! Entrants are ranked by conservative skill estimate and cut into pots of
//! `number_of_teams`. Each pot is shuffled and dealt out as one member per
//! team, so every team draws from every skill tier.

use crate::error::{LadderError, Result};
use crate::types::{CompetitorId, TeamSlot};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Deal entrants into `number_of_teams` balanced teams
///
/// `entrants` pairs each competitor with their conservative estimate; input
/// order breaks ties between equal estimates. Slots come back in pot order.
pub fn assign_teams<R: Rng + ?Sized>(
    entrants: &[(CompetitorId, f64)],
    number_of_teams: usize,
    rng: &mut R,
) -> Result<Vec<TeamSlot>> {
    if entrants.is_empty() {
        return Ok(Vec::new());
    }
    if number_of_teams == 0 {
        return Err(LadderError::InvalidPartition {
            reason: "number of teams must be positive".to_string(),
        }
        .into());
    }
    if number_of_teams > entrants.len() {
        return Err(LadderError::InvalidPartition {
            reason: format!(
                "{} teams cannot be filled by {} entrants",
                number_of_teams,
                entrants.len()
            ),
        }
        .into());
    }

    let mut ranked: Vec<&(CompetitorId, f64)> = entrants.iter().collect();
    // Stable, so equal estimates keep their input order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut slots = Vec::with_capacity(entrants.len());
    for (pot_index, pot) in ranked.chunks(number_of_teams).enumerate() {
        let mut pot = pot.to_vec();
        pot.shuffle(rng);
        debug!("Dealing pot {} of {} entrants", pot_index, pot.len());
        slots.extend(
            pot.into_iter()
                .enumerate()
                .map(|(team_number, (competitor_id, _))| TeamSlot {
                    competitor_id: competitor_id.clone(),
                    team_number,
                }),
        );
    }
    Ok(slots)
}

/// Team assignment with its own seeded random source
#[derive(Debug, Clone)]
pub struct TeamAssigner {
    rng: ChaCha8Rng,
}

impl TeamAssigner {
    /// Reproducible assigner: the same seed deals the same teams
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_os_rng(),
        }
    }

    pub fn assign(
        &mut self,
        entrants: &[(CompetitorId, f64)],
        number_of_teams: usize,
    ) -> Result<Vec<TeamSlot>> {
        assign_teams(entrants, number_of_teams, &mut self.rng)
    }
}
