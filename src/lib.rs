//! Bridge Ladder - friend challenge ratings and team tournaments
//!
//! This crate reads friend challenge results pages, keeps a Bayesian skill
//! belief per competitor, and deals tournament entrants onto balanced teams.

pub mod challenge;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod tournament;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use challenge::{parse_challenge, ChallengeSource, PageFetcher};
pub use rating::{BayesianRatingCalculator, RatingCalculator};
pub use service::LadderService;
pub use tournament::{assign_teams, TeamAssigner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
