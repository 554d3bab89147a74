//! Bayesian moment-matching rating update
//!
//! A competitor's skill belief is a normal prior N(mean, stddev²). One game
//! against an opponent is observed through a probit likelihood,
//! P(win | r) = Φ((r - mean_opp) / c) with c² = stddev² + stddev_opp², and the
//! posterior is projected back onto a normal by matching its first two moments.
//!
//! The moments are computed by quadrature in standardized coordinates
//! z = (r - mean) / stddev over [-span, span], which keeps the integrand well
//! scaled whatever the rating scale is.

use crate::config::RatingConfig;
use crate::error::{LadderError, Result};
use crate::rating::calculator::RatingCalculator;
use crate::rating::quadrature::{normal_cdf, standard_normal_pdf, AdaptiveSimpson, QuadratureError};
use crate::types::SkillBelief;
use tracing::trace;

/// Rating calculator performing a full Bayesian update per game
#[derive(Debug, Clone)]
pub struct BayesianRatingCalculator {
    config: RatingConfig,
    quadrature: AdaptiveSimpson,
}

impl BayesianRatingCalculator {
    /// Create a new calculator; the configuration is validated first
    pub fn new(config: RatingConfig) -> Result<Self> {
        validate(&config)?;
        let quadrature = quadrature_for(&config);
        Ok(Self { config, quadrature })
    }

    pub fn rating_config(&self) -> &RatingConfig {
        &self.config
    }

    /// First three standardized posterior moments: mass, mean and second moment
    fn posterior_moments(
        &self,
        own: &SkillBelief,
        opponent: &SkillBelief,
        won: bool,
    ) -> std::result::Result<(f64, f64, f64), QuadratureError> {
        let spread = (own.variance() + opponent.variance()).sqrt();
        let sign = if won { 1.0 } else { -1.0 };
        let density = |z: f64| {
            let skill = own.mean + own.stddev * z;
            standard_normal_pdf(z) * normal_cdf(sign * (skill - opponent.mean) / spread)
        };

        let span = self.config.integration_span_sigmas;
        // Coarse pass fixes the scale of the posterior mass so the tolerance is relative
        let scale = self
            .quadrature
            .integrate(&density, -span, span, self.config.tolerance)?;
        let absolute = self.config.tolerance * scale;

        let mass = self.quadrature.integrate(&density, -span, span, absolute)?;
        let first = self
            .quadrature
            .integrate(|z| z * density(z), -span, span, absolute)?;
        let second = self
            .quadrature
            .integrate(|z| z * z * density(z), -span, span, absolute)?;
        Ok((mass, first, second))
    }
}

fn quadrature_for(config: &RatingConfig) -> AdaptiveSimpson {
    AdaptiveSimpson {
        max_depth: config.max_depth,
        max_evaluations: config.max_evaluations,
        ..AdaptiveSimpson::default()
    }
}

fn validate(config: &RatingConfig) -> Result<()> {
    let invalid = |message: &str| -> anyhow::Error {
        LadderError::ConfigurationError {
            message: message.to_string(),
        }
        .into()
    };

    if !config.initial_mean.is_finite() {
        return Err(invalid("Initial mean must be finite"));
    }
    if !(config.initial_stddev.is_finite() && config.initial_stddev > 0.0) {
        return Err(invalid("Initial stddev must be positive"));
    }
    if !(config.integration_span_sigmas.is_finite() && config.integration_span_sigmas >= 3.0) {
        return Err(invalid("Integration span must be at least 3 standard deviations"));
    }
    if !(config.tolerance > 0.0 && config.tolerance < 1.0) {
        return Err(invalid("Quadrature tolerance must be in (0, 1)"));
    }
    if config.max_depth == 0 || config.max_evaluations == 0 {
        return Err(invalid("Quadrature budget must be greater than 0"));
    }
    if !(config.variance_floor > 0.0) {
        return Err(invalid("Variance floor must be positive"));
    }
    Ok(())
}

fn check_belief(belief: &SkillBelief, side: &str) -> Result<()> {
    if !belief.mean.is_finite() {
        return Err(LadderError::InvalidBelief {
            reason: format!("{} mean {} is not finite", side, belief.mean),
        }
        .into());
    }
    if !(belief.stddev.is_finite() && belief.stddev > 0.0) {
        return Err(LadderError::InvalidBelief {
            reason: format!("{} stddev {} must be positive", side, belief.stddev),
        }
        .into());
    }
    Ok(())
}

impl RatingCalculator for BayesianRatingCalculator {
    fn update(
        &self,
        own: &SkillBelief,
        opponent: &SkillBelief,
        won: bool,
    ) -> Result<SkillBelief> {
        check_belief(own, "own")?;
        check_belief(opponent, "opponent")?;

        let failed = |reason: String| LadderError::RatingUpdateFailed { reason };
        let (mass, first, second) = self
            .posterior_moments(own, opponent, won)
            .map_err(|e| failed(e.to_string()))?;
        if !(mass > 0.0) {
            return Err(failed("posterior mass vanished".to_string()).into());
        }

        let mean_shift = first / mass;
        let variance = (second / mass - mean_shift * mean_shift).max(self.config.variance_floor);
        let posterior = SkillBelief::new(own.mean + own.stddev * mean_shift, own.stddev * variance.sqrt());
        if !(posterior.mean.is_finite() && posterior.stddev.is_finite() && posterior.stddev > 0.0) {
            return Err(failed(format!("non-finite posterior {:?}", posterior)).into());
        }

        trace!(
            "Updated belief ({:.2}, {:.2}) -> ({:.2}, {:.2}) after {}",
            own.mean,
            own.stddev,
            posterior.mean,
            posterior.stddev,
            if won { "win" } else { "loss" }
        );
        Ok(posterior)
    }

    fn win_probability(&self, own: &SkillBelief, opponent: &SkillBelief) -> f64 {
        let spread = (own.variance() + opponent.variance()).sqrt();
        if !(spread > 0.0) {
            return 0.5;
        }
        normal_cdf((own.mean - opponent.mean) / spread)
    }

    fn initial_belief(&self) -> SkillBelief {
        self.config.initial_belief()
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "bayesian",
            "initial_mean": self.config.initial_mean,
            "initial_stddev": self.config.initial_stddev,
            "integration_span_sigmas": self.config.integration_span_sigmas,
            "tolerance": self.config.tolerance,
            "max_depth": self.config.max_depth,
            "max_evaluations": self.config.max_evaluations,
            "variance_floor": self.config.variance_floor
        })
    }

    fn update_config(&mut self, config: serde_json::Value) -> Result<()> {
        let mut new_config = self.config.clone();

        if let Some(mean) = config.get("initial_mean").and_then(|v| v.as_f64()) {
            new_config.initial_mean = mean;
        }
        if let Some(stddev) = config.get("initial_stddev").and_then(|v| v.as_f64()) {
            new_config.initial_stddev = stddev;
        }
        if let Some(span) = config.get("integration_span_sigmas").and_then(|v| v.as_f64()) {
            new_config.integration_span_sigmas = span;
        }
        if let Some(tolerance) = config.get("tolerance").and_then(|v| v.as_f64()) {
            new_config.tolerance = tolerance;
        }
        if let Some(depth) = config.get("max_depth").and_then(|v| v.as_u64()) {
            new_config.max_depth = depth as u32;
        }
        if let Some(evaluations) = config.get("max_evaluations").and_then(|v| v.as_u64()) {
            new_config.max_evaluations = evaluations as usize;
        }
        if let Some(floor) = config.get("variance_floor").and_then(|v| v.as_f64()) {
            new_config.variance_floor = floor;
        }

        validate(&new_config)?;
        self.quadrature = quadrature_for(&new_config);
        self.config = new_config;
        Ok(())
    }
}
