//! The `/api/news` engine: cached, fault-tolerant fan-out over the configured
//! feeds.
//!
//! A call either answers from the cache (when the last result is younger than
//! the TTL and no refresh was forced) or fetches every feed concurrently,
//! merges and sorts the articles newest first, and replaces the cache slot.
//! Refreshes are single-flight: callers that queue behind a running refresh
//! reuse its result instead of fetching again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::article::{sort_newest_first, Article};
use crate::cache::ArticleCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, FeedConfig};
use crate::fetcher::Fetcher;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("refresh task failed: {0}")]
    Refresh(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPayload {
    pub articles: Vec<Article>,
    pub count: usize,
    pub last_updated: String,
}

impl NewsPayload {
    pub fn new(articles: Vec<Article>, now: DateTime<Utc>) -> Self {
        Self {
            count: articles.len(),
            articles,
            last_updated: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub payload: NewsPayload,
    pub cached: bool,
    /// Whole seconds since the cached payload was fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<u64>,
}

impl NewsResponse {
    fn cached(payload: NewsPayload, age: Duration) -> Self {
        Self {
            success: true,
            payload,
            cached: true,
            cache_age: Some(age.as_secs()),
        }
    }

    fn fresh(payload: NewsPayload) -> Self {
        Self {
            success: true,
            payload,
            cached: false,
            cache_age: None,
        }
    }
}

pub struct Aggregator {
    feeds: Arc<Vec<FeedConfig>>,
    fetcher: Fetcher,
    cache: Arc<ArticleCache>,
    clock: Arc<dyn Clock>,
    refresh_lock: Mutex<()>,
}

impl Aggregator {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            feeds: Arc::new(config.feeds.clone()),
            fetcher: Fetcher::new(config),
            cache: Arc::new(ArticleCache::new(config.cache_ttl(), clock.clone())),
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    pub async fn get_articles(&self, force_refresh: bool) -> Result<NewsResponse, AggregateError> {
        if !force_refresh {
            if let Some((entry, age)) = self.cache.fresh().await {
                debug!("Returning cached articles ({}s old)", age.as_secs());
                return Ok(NewsResponse::cached(entry.payload, age));
            }
        }

        let seen = self.cache.generation().await;
        let _guard = self.refresh_lock.lock().await;

        // Someone else refreshed while we waited for the lock.
        if let Some(entry) = self.cache.get().await {
            if Some(entry.generation) != seen {
                debug!("Reusing refresh completed while waiting");
                return Ok(NewsResponse::fresh(entry.payload));
            }
        }

        let payload = self.refresh().await?;
        Ok(NewsResponse::fresh(payload))
    }

    /// Runs on its own task so a caller going away mid-refresh does not
    /// abandon the work queued callers are waiting on.
    async fn refresh(&self) -> Result<NewsPayload, AggregateError> {
        let feeds = Arc::clone(&self.feeds);
        let fetcher = self.fetcher.clone();
        let cache = Arc::clone(&self.cache);
        let clock = Arc::clone(&self.clock);

        let task = tokio::spawn(async move {
            info!("Fetching fresh articles from {} feeds", feeds.len());

            let mut articles = fetcher.fetch_all(&feeds, clock.now()).await;
            sort_newest_first(&mut articles);

            let now = clock.now();
            let payload = NewsPayload::new(articles, now);
            cache.set(payload.clone(), now).await;

            info!("Refresh complete: {} articles", payload.count);
            payload
        });

        Ok(task.await?)
    }
}
