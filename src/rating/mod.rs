//! Skill rating with a Bayesian moment-matching update
//!
//! This module provides the rating calculator interface, the Bayesian
//! calculator with its self-contained quadrature, and rating storage.

pub mod bayesian;
pub mod calculator;
pub mod quadrature;
pub mod storage;

// Re-export commonly used types
pub use bayesian::BayesianRatingCalculator;
pub use calculator::{rate_match, RatingCalculationResult, RatingCalculator};
pub use quadrature::{normal_cdf, AdaptiveSimpson, QuadratureError};
pub use storage::{InMemoryRatingStorage, RatingEntry, RatingStorage};
