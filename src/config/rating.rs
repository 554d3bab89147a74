//! Rating system configuration

use crate::types::SkillBelief;
use serde::{Deserialize, Serialize};

/// Priors and numerical budget for the Bayesian rating update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub initial_mean: f64,
    pub initial_stddev: f64,
    /// Half-width of the integration window, in prior standard deviations
    pub integration_span_sigmas: f64,
    /// Relative quadrature tolerance
    pub tolerance: f64,
    pub max_depth: u32,
    pub max_evaluations: usize,
    /// Floor under the posterior variance (standardized units)
    pub variance_floor: f64,
}

impl RatingConfig {
    pub fn initial_belief(&self) -> SkillBelief {
        SkillBelief::new(self.initial_mean, self.initial_stddev)
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_mean: 1200.0,
            initial_stddev: 400.0,
            integration_span_sigmas: 6.0,
            tolerance: 1e-9,
            max_depth: 48,
            max_evaluations: 200_000,
            variance_floor: 1e-12,
        }
    }
}
