//! Service layer for the ladder
//!
//! This module contains the service facade that coordinates ingestion,
//! rating and tournament starts over shared storage and metrics.

pub mod ladder;

pub use ladder::{LadderService, ReportRating};
