//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for challenge ingestion, rating
//! updates and team assignment on a private Prometheus registry.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the ladder
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Challenge ingestion metrics
    ingest_metrics: IngestMetrics,

    /// Rating update metrics
    rating_metrics: RatingMetrics,

    /// Tournament metrics
    tournament_metrics: TournamentMetrics,
}

/// Challenge ingestion metrics
#[derive(Clone)]
pub struct IngestMetrics {
    /// Challenges ingested, by outcome
    pub challenges_ingested_total: IntCounterVec,

    /// Boards read from accepted challenges
    pub boards_parsed_total: IntCounter,
}

/// Rating update metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Rated reports, by outcome
    pub rating_updates_total: IntCounterVec,

    /// Time spent rating one report
    pub rating_update_duration: Histogram,
}

/// Tournament metrics
#[derive(Clone)]
pub struct TournamentMetrics {
    /// Team assignments performed
    pub team_assignments_total: IntCounter,

    /// Entrants dealt onto teams
    pub entrants_assigned_total: IntCounter,
}

/// Outcome label for an ingest attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    Untrusted,
    FetchFailed,
    Malformed,
}

impl IngestOutcome {
    fn label(self) -> &'static str {
        match self {
            IngestOutcome::Accepted => "accepted",
            IngestOutcome::Untrusted => "untrusted",
            IngestOutcome::FetchFailed => "fetch_failed",
            IngestOutcome::Malformed => "malformed",
        }
    }
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let ingest_metrics = IngestMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let tournament_metrics = TournamentMetrics::new(&registry)?;

        Ok(Self {
            registry,
            ingest_metrics,
            rating_metrics,
            tournament_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn ingest(&self) -> &IngestMetrics {
        &self.ingest_metrics
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn tournament(&self) -> &TournamentMetrics {
        &self.tournament_metrics
    }

    /// Record one ingest attempt; `boards` counts only for accepted challenges
    pub fn record_ingest(&self, outcome: IngestOutcome, boards: usize) {
        self.ingest_metrics
            .challenges_ingested_total
            .with_label_values(&[outcome.label()])
            .inc();
        if outcome == IngestOutcome::Accepted {
            self.ingest_metrics.boards_parsed_total.inc_by(boards as u64);
        }
    }

    /// Record a rated report (`rated`, `tied` or `failed`)
    pub fn record_rating_update(&self, outcome: &str, duration: Duration) {
        self.rating_metrics
            .rating_updates_total
            .with_label_values(&[outcome])
            .inc();
        self.rating_metrics
            .rating_update_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_team_assignment(&self, entrants: usize) {
        self.tournament_metrics.team_assignments_total.inc();
        self.tournament_metrics
            .entrants_assigned_total
            .inc_by(entrants as u64);
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl IngestMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let challenges_ingested_total = IntCounterVec::new(
            Opts::new(
                "bridge_ladder_challenges_ingested_total",
                "Friend challenges ingested",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(challenges_ingested_total.clone()))?;

        let boards_parsed_total = IntCounter::new(
            "bridge_ladder_boards_parsed_total",
            "Boards parsed from accepted challenges",
        )?;
        registry.register(Box::new(boards_parsed_total.clone()))?;

        Ok(Self {
            challenges_ingested_total,
            boards_parsed_total,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_updates_total = IntCounterVec::new(
            Opts::new("bridge_ladder_rating_updates_total", "Rated match reports"),
            &["outcome"],
        )?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        let rating_update_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bridge_ladder_rating_update_duration_seconds",
                "Rating update time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(rating_update_duration.clone()))?;

        Ok(Self {
            rating_updates_total,
            rating_update_duration,
        })
    }
}

impl TournamentMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let team_assignments_total = IntCounter::new(
            "bridge_ladder_team_assignments_total",
            "Team assignments performed",
        )?;
        registry.register(Box::new(team_assignments_total.clone()))?;

        let entrants_assigned_total = IntCounter::new(
            "bridge_ladder_entrants_assigned_total",
            "Entrants dealt onto teams",
        )?;
        registry.register(Box::new(entrants_assigned_total.clone()))?;

        Ok(Self {
            team_assignments_total,
            entrants_assigned_total,
        })
    }
}
