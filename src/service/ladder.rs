//! Ladder service coordination
//!
//! [`LadderService`] ties the pieces together: it ingests friend challenges
//! through a [`ChallengeSource`], rates decided matches against stored
//! beliefs, and starts tournaments from current conservative estimates.

use crate::challenge::{parse_challenge, ChallengeSource, HttpPageFetcher, PageFetcher};
use crate::config::{AppConfig, TournamentConfig};
use crate::error::{ladder_error, LadderError, Result};
use crate::metrics::{IngestOutcome, MetricsCollector};
use crate::rating::{
    rate_match, BayesianRatingCalculator, RatingCalculationResult, RatingCalculator, RatingEntry,
    RatingStorage,
};
use crate::tournament::{TeamAssigner, Tournament, TournamentBook};
use crate::types::{CompetitorId, MatchOutcome, MatchReport, SkillBelief, TeamSlot, TournamentId};
use std::sync::{Arc, MutexGuard};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What applying a report did to the ratings
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRating {
    Rated(RatingCalculationResult),
    /// Equal totals: both beliefs are left unchanged
    Tied,
}

pub struct LadderService {
    config: AppConfig,
    source: ChallengeSource,
    calculator: Arc<dyn RatingCalculator>,
    storage: Arc<dyn RatingStorage>,
    metrics: Arc<MetricsCollector>,
    /// Serializes read-modify-write of stored beliefs
    rating_lock: Mutex<()>,
    /// At most one tournament is active at a time
    tournaments: std::sync::Mutex<TournamentBook>,
}

impl LadderService {
    /// Build a service that fetches pages over HTTP
    pub fn from_config(config: AppConfig, storage: Arc<dyn RatingStorage>) -> Result<Self> {
        let fetcher = Arc::new(HttpPageFetcher::new(&config.source)?);
        Self::new(config, fetcher, storage, Arc::new(MetricsCollector::new()?))
    }

    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        storage: Arc<dyn RatingStorage>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let calculator = Arc::new(BayesianRatingCalculator::new(config.rating.clone())?);
        let source = ChallengeSource::new(fetcher, config.source.trusted_host.clone());
        Ok(Self {
            config,
            source,
            calculator,
            storage,
            metrics,
            rating_lock: Mutex::new(()),
            tournaments: std::sync::Mutex::new(TournamentBook::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn storage(&self) -> Arc<dyn RatingStorage> {
        self.storage.clone()
    }

    /// Validate, fetch and parse a matchlink
    pub async fn ingest_challenge(&self, matchlink: &str) -> Result<MatchReport> {
        let result = self.source.load(matchlink).await;
        self.record_ingest(&result);
        result
    }

    /// Parse a results page that was obtained some other way
    pub fn ingest_document(&self, document: &str) -> Result<MatchReport> {
        let result = parse_challenge(document);
        self.record_ingest(&result);
        result
    }

    fn record_ingest(&self, result: &Result<MatchReport>) {
        match result {
            Ok(report) => {
                info!(
                    "Ingested {} vs {}: {} boards, {} to {} {}",
                    report.hero_id,
                    report.villain_id,
                    report.boards.len(),
                    report.hero_total(),
                    report.villain_total(),
                    report.scoring_method
                );
                self.metrics
                    .record_ingest(IngestOutcome::Accepted, report.boards.len());
            }
            Err(e) => {
                let outcome = match ladder_error(e) {
                    Some(LadderError::UntrustedSource { .. }) => IngestOutcome::Untrusted,
                    Some(LadderError::MalformedDocument { .. }) => IngestOutcome::Malformed,
                    _ => IngestOutcome::FetchFailed,
                };
                warn!("Challenge rejected ({:?}): {}", outcome, e);
                self.metrics.record_ingest(outcome, 0);
            }
        }
    }

    /// Current belief of a competitor, the initial belief if they were never rated
    pub fn belief_of(&self, competitor_id: &CompetitorId) -> Result<SkillBelief> {
        Ok(self
            .storage
            .get_rating(competitor_id)?
            .map(|entry| entry.belief)
            .unwrap_or_else(|| self.calculator.initial_belief()))
    }

    /// Rate both sides of a report and persist the new beliefs together
    pub async fn apply_report(&self, report: &MatchReport) -> Result<ReportRating> {
        if report.hero_id == report.villain_id {
            return Err(LadderError::malformed(format!(
                "{} cannot play against themselves",
                report.hero_id
            ))
            .into());
        }

        let _guard = self.rating_lock.lock().await;
        let timer = self.metrics.start_timer();

        let (winner_id, loser_id) = match report.outcome() {
            MatchOutcome::HeroWon => (&report.hero_id, &report.villain_id),
            MatchOutcome::VillainWon => (&report.villain_id, &report.hero_id),
            MatchOutcome::Tied => {
                info!(
                    "{} and {} tied on {}; ratings unchanged",
                    report.hero_id,
                    report.villain_id,
                    report.hero_total()
                );
                self.metrics.record_rating_update("tied", timer.stop());
                return Ok(ReportRating::Tied);
            }
        };

        let stored = self
            .storage
            .get_ratings(&[winner_id.clone(), loser_id.clone()])?;
        let entry_for = |id: &CompetitorId| {
            stored
                .get(id)
                .cloned()
                .unwrap_or_else(|| RatingEntry::new(id.clone(), self.calculator.initial_belief()))
        };
        let mut winner = entry_for(winner_id);
        let mut loser = entry_for(loser_id);

        let result = match rate_match(
            self.calculator.as_ref(),
            (winner_id, winner.belief),
            (loser_id, loser.belief),
        ) {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to rate {} vs {}: {}", winner_id, loser_id, e);
                self.metrics.record_rating_update("failed", timer.stop());
                return Err(e);
            }
        };

        winner.record_match(result.rating_changes[0].new_belief);
        loser.record_match(result.rating_changes[1].new_belief);
        self.storage.store_ratings(vec![winner, loser])?;

        info!(
            "{} beat {} (expected {:.1}%): {:+.1} / {:+.1}",
            winner_id,
            loser_id,
            result.winner_expectation * 100.0,
            result.rating_changes[0].mean_delta(),
            result.rating_changes[1].mean_delta()
        );
        self.metrics.record_rating_update("rated", timer.stop());
        Ok(ReportRating::Rated(result))
    }

    fn book(&self) -> Result<MutexGuard<'_, TournamentBook>> {
        self.tournaments.lock().map_err(|e| {
            LadderError::InternalError {
                message: format!("Tournament book lock poisoned: {}", e),
            }
            .into()
        })
    }

    fn no_active_tournament() -> anyhow::Error {
        LadderError::TournamentState {
            reason: "no tournament is active".to_string(),
        }
        .into()
    }

    /// Open a tournament for signup with the configured settings
    pub fn open_tournament(&self, name: impl Into<String>) -> Result<TournamentId> {
        let config = self.config.tournament.clone();
        self.open_tournament_with(name, &config)
    }

    /// Open a tournament for signup; fails while another one is still active
    pub fn open_tournament_with(
        &self,
        name: impl Into<String>,
        config: &TournamentConfig,
    ) -> Result<TournamentId> {
        self.book()?.create(name, config)
    }

    /// Snapshot of the active tournament, if any
    pub fn active_tournament(&self) -> Result<Option<Tournament>> {
        Ok(self.book()?.active().cloned())
    }

    pub fn signup(&self, competitor_id: &str) -> Result<()> {
        let mut book = self.book()?;
        let tournament = book.active_mut().ok_or_else(Self::no_active_tournament)?;
        tournament.signup(competitor_id)?;
        info!("{} signed up for tournament {}", competitor_id, tournament.id);
        Ok(())
    }

    pub fn drop_entrant(&self, competitor_id: &str) -> Result<()> {
        let mut book = self.book()?;
        let tournament = book.active_mut().ok_or_else(Self::no_active_tournament)?;
        tournament.drop_entrant(competitor_id)
    }

    /// Deal the active tournament's entrants onto teams and start play
    pub fn start_active_tournament(&self, assigner: &mut TeamAssigner) -> Result<Vec<TeamSlot>> {
        let mut book = self.book()?;
        let tournament = book.active_mut().ok_or_else(Self::no_active_tournament)?;
        self.start_tournament(tournament, assigner)
    }

    /// Close the active tournament so a new one can be opened
    pub fn close_active_tournament(&self) -> Result<TournamentId> {
        let mut book = self.book()?;
        let tournament = book.active_mut().ok_or_else(Self::no_active_tournament)?;
        tournament.close()?;
        Ok(tournament.id)
    }

    /// Deal a tournament's entrants onto teams from their current ratings
    pub fn start_tournament(
        &self,
        tournament: &mut Tournament,
        assigner: &mut TeamAssigner,
    ) -> Result<Vec<TeamSlot>> {
        let stored = self.storage.get_ratings(&tournament.entrant_ids())?;
        let initial = self.calculator.initial_belief();
        let slots = tournament.start(
            |id| {
                stored
                    .get(id)
                    .map(|entry| entry.belief)
                    .unwrap_or(initial)
                    .conservative_estimate()
            },
            assigner,
        )?;
        self.metrics.record_team_assignment(slots.len());
        Ok(slots)
    }

    /// All rated competitors, best conservative estimate first
    pub fn standings(&self) -> Result<Vec<RatingEntry>> {
        let mut entries: Vec<RatingEntry> = self.storage.get_all_ratings()?.into_values().collect();
        entries.sort_by(|a, b| {
            b.belief
                .conservative_estimate()
                .total_cmp(&a.belief.conservative_estimate())
                .then_with(|| a.competitor_id.cmp(&b.competitor_id))
        });
        Ok(entries)
    }
}
