//! Configuration management for the bridge-ladder crate
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;
pub mod rating;
pub mod tournament;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, SourceSettings};
pub use rating::RatingConfig;
pub use tournament::TournamentConfig;
