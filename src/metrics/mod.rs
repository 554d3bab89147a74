//! Metrics for the ladder
//!
//! This module provides Prometheus metrics collection for ingestion, rating
//! and tournament operations.

pub mod collector;

pub use collector::{
    IngestMetrics, IngestOutcome, MetricsCollector, MetricsTimer, RatingMetrics,
    TournamentMetrics,
};
