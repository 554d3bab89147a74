//! Common types used throughout the ladder

use serde::{Deserialize, Serialize};

/// Opaque identifier for a competitor (the results page user name)
pub type CompetitorId = String;

/// Identifier for a team round-robin tournament
pub type TournamentId = u64;

/// Unit used to turn raw trick scores into comparative match scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringMethod {
    #[serde(rename = "IMPs", alias = "IMPS", alias = "imps")]
    Imps,
    #[serde(rename = "MPs", alias = "MPS", alias = "mps")]
    MatchPoints,
}

impl ScoringMethod {
    /// Resolve a scoring token as printed on the results page, ignoring case
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "IMPS" | "IMP" => Some(ScoringMethod::Imps),
            "MPS" | "MP" | "MATCHPOINTS" | "MATCH POINTS" => Some(ScoringMethod::MatchPoints),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringMethod::Imps => write!(f, "IMPs"),
            ScoringMethod::MatchPoints => write!(f, "MPs"),
        }
    }
}

/// One board of a friend challenge, as played by both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardResult {
    pub number: u32,
    pub hero_play_record: String,
    pub hero_contract_result: String,
    pub hero_raw_score: i32,
    /// `None` while the board is unscored
    pub hero_match_score: Option<f64>,
    pub villain_play_record: String,
    pub villain_contract_result: String,
    pub villain_raw_score: i32,
    pub villain_match_score: Option<f64>,
}

/// Who took a match, judged by summed match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    HeroWon,
    VillainWon,
    Tied,
}

/// Structured result of one two-party friend challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub scoring_method: ScoringMethod,
    pub hero_id: CompetitorId,
    pub villain_id: CompetitorId,
    /// Ascending by board number, never empty
    pub boards: Vec<BoardResult>,
}

impl MatchReport {
    pub fn hero_total(&self) -> f64 {
        self.boards
            .iter()
            .map(|board| board.hero_match_score.unwrap_or(0.0))
            .sum()
    }

    pub fn villain_total(&self) -> f64 {
        self.boards
            .iter()
            .map(|board| board.villain_match_score.unwrap_or(0.0))
            .sum()
    }

    pub fn outcome(&self) -> MatchOutcome {
        let (hero, villain) = (self.hero_total(), self.villain_total());
        if hero > villain {
            MatchOutcome::HeroWon
        } else if villain > hero {
            MatchOutcome::VillainWon
        } else {
            MatchOutcome::Tied
        }
    }
}

/// A competitor's belief distribution over their own skill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillBelief {
    pub mean: f64,
    pub stddev: f64,
}

impl SkillBelief {
    pub fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }

    /// Skill point estimate biased down by uncertainty, used for ranking
    pub fn conservative_estimate(&self) -> f64 {
        self.mean - 3.0 * self.stddev
    }

    pub fn variance(&self) -> f64 {
        self.stddev * self.stddev
    }
}

impl Default for SkillBelief {
    fn default() -> Self {
        Self {
            mean: 1200.0,
            stddev: 400.0,
        }
    }
}

/// Team number handed to one entrant when a tournament starts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamSlot {
    pub competitor_id: CompetitorId,
    pub team_number: usize,
}

/// Rating change information for a competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub competitor_id: CompetitorId,
    pub old_belief: SkillBelief,
    pub new_belief: SkillBelief,
    pub won: bool,
}

impl RatingChange {
    pub fn mean_delta(&self) -> f64 {
        self.new_belief.mean - self.old_belief.mean
    }
}
