//! Main application configuration
//!
//! This module defines the primary configuration structures for bridge-ladder,
//! including environment variable loading, TOML file loading and validation.

use crate::config::{RatingConfig, TournamentConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Host serving friend challenge results pages
pub const DEFAULT_TRUSTED_HOST: &str = "webutil.bridgebase.com";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub source: SourceSettings,
    pub rating: RatingConfig,
    pub tournament: TournamentConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Where results pages may be fetched from, and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// The only host a matchlink may point at
    pub trusted_host: String,
    /// Timeout for a single page fetch in seconds
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "bridge-ladder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            trusted_host: DEFAULT_TRUSTED_HOST.to_string(),
            request_timeout_seconds: 15,
            user_agent: format!("bridge-ladder/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }

        // Source settings
        if let Ok(host) = env::var("TRUSTED_HOST") {
            self.source.trusted_host = host;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECONDS") {
            self.source.request_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Rating settings
        if let Ok(mean) = env::var("RATING_INITIAL_MEAN") {
            self.rating.initial_mean = mean
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_INITIAL_MEAN value: {}", mean))?;
        }
        if let Ok(stddev) = env::var("RATING_INITIAL_STDDEV") {
            self.rating.initial_stddev = stddev
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_INITIAL_STDDEV value: {}", stddev))?;
        }
        if let Ok(tolerance) = env::var("RATING_TOLERANCE") {
            self.rating.tolerance = tolerance
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_TOLERANCE value: {}", tolerance))?;
        }

        // Tournament settings
        if let Ok(teams) = env::var("NUMBER_OF_TEAMS") {
            self.tournament.number_of_teams = teams
                .parse()
                .map_err(|_| anyhow!("Invalid NUMBER_OF_TEAMS value: {}", teams))?;
        }
        if let Ok(boards) = env::var("SEGMENT_BOARDS") {
            self.tournament.segment_boards = boards
                .parse()
                .map_err(|_| anyhow!("Invalid SEGMENT_BOARDS value: {}", boards))?;
        }

        Ok(())
    }

    /// Get the page fetch timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate source settings
    if config.source.trusted_host.is_empty() {
        return Err(anyhow!("Trusted host cannot be empty"));
    }
    if config.source.request_timeout_seconds == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }

    // Validate rating settings
    let rating = &config.rating;
    if !rating.initial_mean.is_finite() {
        return Err(anyhow!("Initial mean must be finite"));
    }
    if !(rating.initial_stddev.is_finite() && rating.initial_stddev > 0.0) {
        return Err(anyhow!("Initial stddev must be positive"));
    }
    if !(rating.integration_span_sigmas >= 3.0 && rating.integration_span_sigmas.is_finite()) {
        return Err(anyhow!("Integration span must be at least 3 standard deviations"));
    }
    if !(rating.tolerance > 0.0 && rating.tolerance < 1.0) {
        return Err(anyhow!("Quadrature tolerance must be in (0, 1)"));
    }
    if rating.max_depth == 0 || rating.max_evaluations == 0 {
        return Err(anyhow!("Quadrature budget must be greater than 0"));
    }
    if !(rating.variance_floor > 0.0) {
        return Err(anyhow!("Variance floor must be positive"));
    }

    // Validate tournament settings
    if config.tournament.number_of_teams == 0 {
        return Err(anyhow!("Number of teams must be greater than 0"));
    }
    if config.tournament.segment_boards == 0 {
        return Err(anyhow!("Segment boards must be greater than 0"));
    }

    Ok(())
}
