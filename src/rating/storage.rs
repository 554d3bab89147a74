//! Rating storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving competitor
//! beliefs, with an in-memory implementation that can be snapshotted to and
//! restored from a JSON file between runs.

use crate::error::{LadderError, Result};
use crate::types::{CompetitorId, SkillBelief};
use crate::utils::current_timestamp;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Storage entry for a competitor's belief with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub competitor_id: CompetitorId,
    pub belief: SkillBelief,
    pub matches_played: u64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RatingEntry {
    /// Create a new rating entry for a new competitor
    pub fn new(competitor_id: CompetitorId, initial_belief: SkillBelief) -> Self {
        let now = current_timestamp();
        Self {
            competitor_id,
            belief: initial_belief,
            matches_played: 0,
            last_updated: now,
            created_at: now,
        }
    }

    /// Record the belief after a rated match
    pub fn record_match(&mut self, new_belief: SkillBelief) {
        self.belief = new_belief;
        self.matches_played += 1;
        self.last_updated = current_timestamp();
    }
}

/// Trait for rating storage operations
pub trait RatingStorage: Send + Sync {
    /// Get a competitor's rating entry
    fn get_rating(&self, competitor_id: &CompetitorId) -> Result<Option<RatingEntry>>;

    /// Store or update a competitor's rating
    fn store_rating(&self, entry: RatingEntry) -> Result<()>;

    /// Get ratings for multiple competitors
    fn get_ratings(
        &self,
        competitor_ids: &[CompetitorId],
    ) -> Result<HashMap<CompetitorId, RatingEntry>>;

    /// Store multiple rating updates atomically
    fn store_ratings(&self, entries: Vec<RatingEntry>) -> Result<()>;

    /// Get all rated competitors
    fn get_all_ratings(&self) -> Result<HashMap<CompetitorId, RatingEntry>>;

    /// Remove a competitor's rating
    fn remove_rating(&self, competitor_id: &CompetitorId) -> Result<bool>;

    /// Get total number of rated competitors
    fn get_competitor_count(&self) -> Result<usize>;
}

/// In-memory rating storage implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStorage {
    ratings: RwLock<HashMap<CompetitorId, RatingEntry>>,
}

fn lock_error(kind: &str) -> LadderError {
    LadderError::InternalError {
        message: format!("Failed to acquire ratings {} lock", kind),
    }
}

impl InMemoryRatingStorage {
    /// Create an empty in-memory rating storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore storage from a JSON snapshot; a missing file means no ratings yet
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ratings file {}", path.display()))?;
        let entries: Vec<RatingEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse ratings file {}", path.display()))?;

        let storage = Self::new();
        storage.store_ratings(entries)?;
        Ok(storage)
    }

    /// Write every entry to a JSON snapshot, ordered by competitor id
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<RatingEntry> = self.get_all_ratings()?.into_values().collect();
        entries.sort_by(|a, b| a.competitor_id.cmp(&b.competitor_id));

        let raw = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write ratings file {}", path.display()))?;
        Ok(())
    }
}

impl RatingStorage for InMemoryRatingStorage {
    fn get_rating(&self, competitor_id: &CompetitorId) -> Result<Option<RatingEntry>> {
        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;
        Ok(ratings.get(competitor_id).cloned())
    }

    fn store_rating(&self, entry: RatingEntry) -> Result<()> {
        let mut ratings = self.ratings.write().map_err(|_| lock_error("write"))?;
        ratings.insert(entry.competitor_id.clone(), entry);
        Ok(())
    }

    fn get_ratings(
        &self,
        competitor_ids: &[CompetitorId],
    ) -> Result<HashMap<CompetitorId, RatingEntry>> {
        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;

        let mut result = HashMap::new();
        for competitor_id in competitor_ids {
            if let Some(entry) = ratings.get(competitor_id) {
                result.insert(competitor_id.clone(), entry.clone());
            }
        }

        Ok(result)
    }

    fn store_ratings(&self, entries: Vec<RatingEntry>) -> Result<()> {
        let mut ratings = self.ratings.write().map_err(|_| lock_error("write"))?;
        for entry in entries {
            ratings.insert(entry.competitor_id.clone(), entry);
        }
        Ok(())
    }

    fn get_all_ratings(&self) -> Result<HashMap<CompetitorId, RatingEntry>> {
        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;
        Ok(ratings.clone())
    }

    fn remove_rating(&self, competitor_id: &CompetitorId) -> Result<bool> {
        let mut ratings = self.ratings.write().map_err(|_| lock_error("write"))?;
        Ok(ratings.remove(competitor_id).is_some())
    }

    fn get_competitor_count(&self) -> Result<usize> {
        let ratings = self.ratings.read().map_err(|_| lock_error("read"))?;
        Ok(ratings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_rating_entry(competitor_id: &str, mean: f64) -> RatingEntry {
        RatingEntry::new(competitor_id.to_string(), SkillBelief::new(mean, 200.0))
    }

    #[test]
    fn test_rating_entry_creation() {
        let entry = create_test_rating_entry("north", 1500.0);
        assert_eq!(entry.competitor_id, "north");
        assert_eq!(entry.belief.mean, 1500.0);
        assert_eq!(entry.matches_played, 0);
        assert_eq!(entry.created_at, entry.last_updated);
    }

    #[test]
    fn test_rating_entry_record_match() {
        let mut entry = create_test_rating_entry("north", 1500.0);
        let created = entry.created_at;

        entry.record_match(SkillBelief::new(1550.0, 180.0));

        assert_eq!(entry.belief, SkillBelief::new(1550.0, 180.0));
        assert_eq!(entry.matches_played, 1);
        assert!(entry.last_updated >= created);
        assert_eq!(entry.created_at, created);
    }

    #[test]
    fn test_in_memory_storage_basic_operations() {
        let storage = InMemoryRatingStorage::new();
        let entry = create_test_rating_entry("north", 1500.0);

        assert!(storage.get_rating(&"north".to_string()).unwrap().is_none());

        storage.store_rating(entry).unwrap();

        let retrieved = storage.get_rating(&"north".to_string()).unwrap().unwrap();
        assert_eq!(retrieved.competitor_id, "north");
        assert_eq!(retrieved.belief.mean, 1500.0);
        assert_eq!(storage.get_competitor_count().unwrap(), 1);
    }

    #[test]
    fn test_bulk_operations() {
        let storage = InMemoryRatingStorage::new();
        storage
            .store_ratings(vec![
                create_test_rating_entry("north", 1500.0),
                create_test_rating_entry("south", 1600.0),
                create_test_rating_entry("east", 1400.0),
            ])
            .unwrap();

        let ids = vec!["north".to_string(), "east".to_string(), "west".to_string()];
        let retrieved = storage.get_ratings(&ids).unwrap();

        assert_eq!(retrieved.len(), 2);
        assert!(retrieved.contains_key("north"));
        assert!(retrieved.contains_key("east"));
        assert_eq!(storage.get_all_ratings().unwrap().len(), 3);
    }

    #[test]
    fn test_competitor_removal() {
        let storage = InMemoryRatingStorage::new();
        storage
            .store_rating(create_test_rating_entry("north", 1500.0))
            .unwrap();

        assert!(storage.remove_rating(&"north".to_string()).unwrap());
        assert!(storage.get_rating(&"north".to_string()).unwrap().is_none());
        assert!(!storage.remove_rating(&"north".to_string()).unwrap());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = std::env::temp_dir().join(format!("bridge-ladder-storage-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ratings.json");

        let storage = InMemoryRatingStorage::new();
        let mut entry = create_test_rating_entry("north", 1500.0);
        entry.record_match(SkillBelief::new(1520.0, 190.0));
        storage.store_rating(entry.clone()).unwrap();
        storage.save_snapshot(&path).unwrap();

        let restored = InMemoryRatingStorage::load_snapshot(&path).unwrap();
        assert_eq!(
            restored.get_rating(&"north".to_string()).unwrap(),
            Some(entry)
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let path = std::env::temp_dir().join("bridge-ladder-no-such-ratings.json");
        let storage = InMemoryRatingStorage::load_snapshot(&path).unwrap();
        assert_eq!(storage.get_competitor_count().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = std::env::temp_dir().join(format!("bridge-ladder-corrupt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ratings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(InMemoryRatingStorage::load_snapshot(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
