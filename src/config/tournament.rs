//! Tournament configuration

use crate::types::ScoringMethod;
use serde::{Deserialize, Serialize};

/// Defaults applied to newly created team round-robin tournaments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    pub number_of_teams: usize,
    pub segment_boards: u32,
    pub scoring_method: ScoringMethod,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            number_of_teams: 4,
            segment_boards: 7,
            scoring_method: ScoringMethod::Imps,
        }
    }
}
