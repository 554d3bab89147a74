//! Team tournaments: lifecycle and skill-stratified team assignment

pub mod assignment;
pub mod lifecycle;

pub use assignment::{assign_teams, TeamAssigner};
pub use lifecycle::{Tournament, TournamentBook, TournamentEntry, TournamentState};
