//! Tournament lifecycle: signup, start, close
//!
//! A tournament collects entrants while in signup. Starting it deals every
//! entrant onto a team and freezes the roster; closing it makes it inactive.
//! [`TournamentBook`] keeps all tournaments and allows one active at a time.

use crate::config::TournamentConfig;
use crate::error::{LadderError, Result};
use crate::tournament::assignment::TeamAssigner;
use crate::types::{CompetitorId, ScoringMethod, TeamSlot, TournamentId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Possible states of a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentState {
    /// Accepting signups and drops
    Signup,
    /// Teams are assigned and segments are being played
    Started,
    /// Finished or abandoned (terminal state)
    Inactive,
}

/// One signed-up competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentEntry {
    pub competitor_id: CompetitorId,
    pub signed_up_at: DateTime<Utc>,
    /// Assigned when the tournament starts
    pub team_number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub scoring_method: ScoringMethod,
    pub segment_boards: u32,
    pub number_of_teams: usize,
    state: TournamentState,
    entries: Vec<TournamentEntry>,
}

fn state_error(reason: String) -> anyhow::Error {
    LadderError::TournamentState { reason }.into()
}

impl Tournament {
    pub fn new(id: TournamentId, name: impl Into<String>, config: &TournamentConfig) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: current_timestamp(),
            scoring_method: config.scoring_method,
            segment_boards: config.segment_boards,
            number_of_teams: config.number_of_teams,
            state: TournamentState::Signup,
            entries: Vec::new(),
        }
    }

    pub fn state(&self) -> TournamentState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != TournamentState::Inactive
    }

    /// Entries in signup order
    pub fn entries(&self) -> &[TournamentEntry] {
        &self.entries
    }

    pub fn entrant_ids(&self) -> Vec<CompetitorId> {
        self.entries
            .iter()
            .map(|entry| entry.competitor_id.clone())
            .collect()
    }

    /// Members of one team, in signup order
    pub fn team(&self, team_number: usize) -> Vec<&CompetitorId> {
        self.entries
            .iter()
            .filter(|entry| entry.team_number == Some(team_number))
            .map(|entry| &entry.competitor_id)
            .collect()
    }

    fn require_signup(&self, action: &str) -> Result<()> {
        if self.state != TournamentState::Signup {
            return Err(state_error(format!(
                "cannot {} tournament {} in state {:?}",
                action, self.id, self.state
            )));
        }
        Ok(())
    }

    pub fn signup(&mut self, competitor_id: impl Into<CompetitorId>) -> Result<()> {
        let competitor_id = competitor_id.into();
        self.require_signup("sign up for")?;
        if self
            .entries
            .iter()
            .any(|entry| entry.competitor_id == competitor_id)
        {
            return Err(state_error(format!(
                "{} is already signed up for tournament {}",
                competitor_id, self.id
            )));
        }

        self.entries.push(TournamentEntry {
            competitor_id,
            signed_up_at: current_timestamp(),
            team_number: None,
        });
        Ok(())
    }

    pub fn drop_entrant(&mut self, competitor_id: &str) -> Result<()> {
        self.require_signup("drop from")?;
        let position = self
            .entries
            .iter()
            .position(|entry| entry.competitor_id == competitor_id)
            .ok_or_else(|| {
                state_error(format!(
                    "{} is not signed up for tournament {}",
                    competitor_id, self.id
                ))
            })?;
        self.entries.remove(position);
        Ok(())
    }

    /// Deal teams from the entrants' conservative estimates and start play
    ///
    /// On failure the tournament stays in signup with no team numbers changed.
    pub fn start<F>(&mut self, estimate: F, assigner: &mut TeamAssigner) -> Result<Vec<TeamSlot>>
    where
        F: Fn(&CompetitorId) -> f64,
    {
        self.require_signup("start")?;

        let estimates: Vec<(CompetitorId, f64)> = self
            .entries
            .iter()
            .map(|entry| (entry.competitor_id.clone(), estimate(&entry.competitor_id)))
            .collect();
        let slots = assigner.assign(&estimates, self.number_of_teams)?;

        for entry in &mut self.entries {
            entry.team_number = slots
                .iter()
                .find(|slot| slot.competitor_id == entry.competitor_id)
                .map(|slot| slot.team_number);
        }
        self.state = TournamentState::Started;
        info!(
            "Started tournament {} with {} entrants on {} teams",
            self.id,
            slots.len(),
            self.number_of_teams
        );
        Ok(slots)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state == TournamentState::Inactive {
            return Err(state_error(format!(
                "tournament {} is already inactive",
                self.id
            )));
        }
        self.state = TournamentState::Inactive;
        info!("Closed tournament {}", self.id);
        Ok(())
    }
}

/// All known tournaments, at most one of them active
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TournamentBook {
    tournaments: BTreeMap<TournamentId, Tournament>,
    next_id: TournamentId,
}

impl TournamentBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new tournament for signup
    pub fn create(&mut self, name: impl Into<String>, config: &TournamentConfig) -> Result<TournamentId> {
        if let Some(active) = self.active() {
            return Err(state_error(format!(
                "tournament {} ({}) is still active",
                active.id, active.name
            )));
        }

        self.next_id += 1;
        let id = self.next_id;
        let tournament = Tournament::new(id, name, config);
        info!("Opened tournament {} ({}) for signup", id, tournament.name);
        self.tournaments.insert(id, tournament);
        Ok(id)
    }

    pub fn get(&self, id: TournamentId) -> Option<&Tournament> {
        self.tournaments.get(&id)
    }

    pub fn get_mut(&mut self, id: TournamentId) -> Option<&mut Tournament> {
        self.tournaments.get_mut(&id)
    }

    pub fn active(&self) -> Option<&Tournament> {
        self.tournaments.values().find(|t| t.is_active())
    }

    pub fn active_mut(&mut self) -> Option<&mut Tournament> {
        self.tournaments.values_mut().find(|t| t.is_active())
    }

    pub fn len(&self) -> usize {
        self.tournaments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tournaments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ladder_error;

    fn config(teams: usize) -> TournamentConfig {
        TournamentConfig {
            number_of_teams: teams,
            ..TournamentConfig::default()
        }
    }

    fn assert_state_error(result: Result<impl std::fmt::Debug>) {
        let error = result.unwrap_err();
        assert!(matches!(
            ladder_error(&error),
            Some(LadderError::TournamentState { .. })
        ));
    }

    #[test]
    fn test_signup_and_drop() {
        let mut tournament = Tournament::new(1, "Friday teams", &config(2));
        tournament.signup("north").unwrap();
        tournament.signup("south").unwrap();
        assert_state_error(tournament.signup("north"));

        tournament.drop_entrant("north").unwrap();
        assert_state_error(tournament.drop_entrant("north"));
        assert_eq!(tournament.entrant_ids(), vec!["south".to_string()]);
    }

    #[test]
    fn test_start_assigns_every_entrant() {
        let mut tournament = Tournament::new(1, "Friday teams", &config(2));
        for name in ["a", "b", "c", "d"] {
            tournament.signup(name).unwrap();
        }

        let mut assigner = TeamAssigner::with_seed(5);
        let slots = tournament
            .start(|id| if id.as_str() < "c" { 100.0 } else { 0.0 }, &mut assigner)
            .unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!(tournament.state(), TournamentState::Started);
        assert!(tournament.entries().iter().all(|e| e.team_number.is_some()));
        assert_eq!(tournament.team(0).len(), 2);
        assert_eq!(tournament.team(1).len(), 2);
        // The two strong entrants never share a team
        let team_a = tournament.entries()[0].team_number;
        let team_b = tournament.entries()[1].team_number;
        assert_ne!(team_a, team_b);

        assert_state_error(tournament.signup("late"));
        assert_state_error(tournament.start(|_| 0.0, &mut assigner));
    }

    #[test]
    fn test_failed_start_stays_in_signup() {
        let mut tournament = Tournament::new(1, "Friday teams", &config(4));
        tournament.signup("a").unwrap();
        tournament.signup("b").unwrap();

        let result = tournament.start(|_| 0.0, &mut TeamAssigner::with_seed(1));
        let error = result.unwrap_err();
        assert!(matches!(
            ladder_error(&error),
            Some(LadderError::InvalidPartition { .. })
        ));
        assert_eq!(tournament.state(), TournamentState::Signup);
        assert!(tournament.entries().iter().all(|e| e.team_number.is_none()));
    }

    #[test]
    fn test_close() {
        let mut tournament = Tournament::new(1, "Friday teams", &config(2));
        tournament.close().unwrap();
        assert_eq!(tournament.state(), TournamentState::Inactive);
        assert!(!tournament.is_active());
        assert_state_error(tournament.close());
        assert_state_error(tournament.signup("north"));
    }

    #[test]
    fn test_book_allows_one_active_tournament() {
        let mut book = TournamentBook::new();
        let first = book.create("Monday", &config(2)).unwrap();
        assert_state_error(book.create("Tuesday", &config(2)));

        book.get_mut(first).unwrap().close().unwrap();
        assert!(book.active().is_none());

        let second = book.create("Tuesday", &config(2)).unwrap();
        assert_ne!(first, second);
        assert_eq!(book.active().map(|t| t.id), Some(second));
        assert_eq!(book.len(), 2);
        assert_eq!(book.get(first).unwrap().state(), TournamentState::Inactive);
    }
}
