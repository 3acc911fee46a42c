//! Single-slot, in-memory cache for the last aggregation result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::aggregator::NewsPayload;
use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: NewsPayload,
    pub fetched_at: DateTime<Utc>,
    /// Bumped on every `set`, so waiters can tell a refresh happened.
    pub generation: u64,
}

pub struct ArticleCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CacheEntry>>,
}

impl ArticleCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self) -> Option<CacheEntry> {
        self.entry.read().await.clone()
    }

    /// Replace the slot wholesale.
    pub async fn set(&self, payload: NewsPayload, fetched_at: DateTime<Utc>) {
        let mut entry = self.entry.write().await;
        let generation = entry.as_ref().map_or(1, |e| e.generation + 1);
        *entry = Some(CacheEntry {
            payload,
            fetched_at,
            generation,
        });
    }

    pub async fn generation(&self) -> Option<u64> {
        self.entry.read().await.as_ref().map(|e| e.generation)
    }

    /// Time since the current entry was stored. A clock that moved backwards
    /// reads as zero age.
    pub async fn age(&self) -> Option<Duration> {
        let fetched_at = self.entry.read().await.as_ref()?.fetched_at;
        Some(self.age_since(fetched_at))
    }

    /// The current entry and its age, if it is younger than the TTL.
    pub async fn fresh(&self) -> Option<(CacheEntry, Duration)> {
        let entry = self.get().await?;
        let age = self.age_since(entry.fetched_at);
        (age < self.ttl).then_some((entry, age))
    }

    fn age_since(&self, fetched_at: DateTime<Utc>) -> Duration {
        (self.clock.now() - fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
