use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::article::Article;
use crate::config::{Config, FeedConfig};
use crate::normalize::{feed_parser, normalize, RawItem};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing failed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    max_items: usize,
    snippet_length: usize,
}

impl Fetcher {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .user_agent("NeuroLoom/1.0 (RSS Aggregator)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            timeout: config.feed_timeout(),
            max_items: config.max_items_per_feed,
            snippet_length: config.snippet_length,
        }
    }

    /// Fetch every feed at once and concatenate the results in feed order.
    ///
    /// A feed that errors or misses its deadline contributes nothing; the
    /// others are unaffected.
    pub async fn fetch_all(&self, feeds: &[FeedConfig], now: DateTime<Utc>) -> Vec<Article> {
        let results = join_all(feeds.iter().map(|feed| self.fetch_feed(feed, now))).await;

        let mut articles = Vec::new();
        for (feed, result) in feeds.iter().zip(results) {
            match result {
                Ok(items) => {
                    debug!("Fetched {} items from '{}'", items.len(), feed.name);
                    articles.extend(items);
                }
                Err(e) => warn!("Error fetching '{}' ({}): {}", feed.name, feed.url, e),
            }
        }
        articles
    }

    /// Download and parse one feed under the per-feed deadline. Losing the
    /// race drops the in-flight request.
    pub async fn fetch_feed(
        &self,
        feed: &FeedConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>, FetchError> {
        let fetch = async {
            let bytes = self.download(&feed.url).await?;
            self.articles_from_bytes(&bytes, &feed.name, now)
        };

        tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Parse raw feed bytes into at most `max_items` normalized articles, in
    /// feed order.
    pub fn articles_from_bytes(
        &self,
        bytes: &[u8],
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>, FetchError> {
        let parsed = feed_parser().parse(bytes)?;

        Ok(parsed
            .entries
            .into_iter()
            .take(self.max_items)
            .map(|entry| normalize(RawItem::from_entry(entry), source, now, self.snippet_length))
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(timeout_ms: u64) -> Config {
        let mut config = Config::from_str("feeds = []").unwrap();
        config.feed_timeout_ms = timeout_ms;
        config
    }

    fn feed(name: &str, url: String) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            url,
        }
    }

    async fn mount_feed(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/rss+xml")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    mod articles_from_bytes_tests {
        use super::*;

        #[test]
        fn test_parses_rss_in_feed_order() {
            let fetcher = Fetcher::new(&test_config(5000));
            let xml = rss_feed("Mint", 3, 0);

            let articles = fetcher
                .articles_from_bytes(xml.as_bytes(), "Mint", base_date())
                .unwrap();

            assert_eq!(articles.len(), 3);
            assert_eq!(articles[0].title, "Mint story 0");
            assert_eq!(articles[2].title, "Mint story 2");
            assert_eq!(articles[0].link, "https://mint.example.com/0");
            assert_eq!(articles[0].source, "Mint");
            assert_eq!(articles[0].creator, "Mint");
            assert_eq!(articles[0].categories, vec!["Tech".to_string()]);
        }

        #[test]
        fn test_caps_items_per_feed() {
            let fetcher = Fetcher::new(&test_config(5000));
            let xml = rss_feed("Big", 25, 0);

            let articles = fetcher
                .articles_from_bytes(xml.as_bytes(), "Big", base_date())
                .unwrap();

            assert_eq!(articles.len(), 20);
            assert_eq!(articles[19].title, "Big story 19");
        }

        #[test]
        fn test_unreadable_date_sorts_below_dated_items() {
            let fetcher = Fetcher::new(&test_config(5000));
            let xml = r#"<?xml version="1.0"?>
                <rss version="2.0"><channel><title>Mixed</title>
                    <item><title>bad</title><pubDate>sometime last week</pubDate></item>
                    <item><title>good</title><pubDate>Mon, 09 Dec 2024 12:00:00 GMT</pubDate></item>
                </channel></rss>"#;
            let now = base_date() + chrono::Duration::days(30);

            let mut articles = fetcher
                .articles_from_bytes(xml.as_bytes(), "Mixed", now)
                .unwrap();
            crate::article::sort_newest_first(&mut articles);

            assert_eq!(articles[0].title, "good");
            assert_eq!(articles[0].pub_date, "2024-12-09T12:00:00.000Z");
            assert_eq!(articles[1].title, "bad");
            assert_eq!(articles[1].pub_date, "1970-01-01T00:00:00.000Z");
        }

        #[test]
        fn test_missing_date_uses_fetch_time() {
            let fetcher = Fetcher::new(&test_config(5000));
            let xml = r#"<?xml version="1.0"?>
                <rss version="2.0"><channel><title>Undated</title>
                    <item><title>undated</title></item>
                </channel></rss>"#;

            let articles = fetcher
                .articles_from_bytes(xml.as_bytes(), "Undated", base_date())
                .unwrap();

            assert_eq!(articles[0].pub_date, "2024-12-09T12:00:00.000Z");
        }

        #[test]
        fn test_malformed_xml_is_an_error() {
            let fetcher = Fetcher::new(&test_config(5000));

            let result = fetcher.articles_from_bytes(b"<rss><channel><item>", "Bad", base_date());
            assert!(matches!(result, Err(FetchError::Parse(_))));
        }

        #[test]
        fn test_non_feed_bytes_are_an_error() {
            let fetcher = Fetcher::new(&test_config(5000));

            let result = fetcher.articles_from_bytes(&[0xFF, 0xFE, 0x00], "Bad", base_date());
            assert!(result.is_err());
        }
    }

    mod fetch_feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetch_success() {
            let server = MockServer::start().await;
            mount_feed(&server, "/rss", rss_feed("Verge", 4, 0)).await;
            let fetcher = Fetcher::new(&test_config(5000));

            let articles = fetcher
                .fetch_feed(&feed("Verge", format!("{}/rss", server.uri())), base_date())
                .await
                .unwrap();

            assert_eq!(articles.len(), 4);
        }

        #[tokio::test]
        async fn test_non_2xx_is_an_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;
            let fetcher = Fetcher::new(&test_config(5000));

            let result = fetcher
                .fetch_feed(&feed("Down", format!("{}/rss", server.uri())), base_date())
                .await;

            assert!(matches!(result, Err(FetchError::Http(_))));
        }

        #[tokio::test]
        async fn test_slow_feed_times_out() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(rss_feed("Slow", 1, 0))
                        .set_delay(std::time::Duration::from_secs(3)),
                )
                .mount(&server)
                .await;
            let fetcher = Fetcher::new(&test_config(100));

            let result = fetcher
                .fetch_feed(&feed("Slow", format!("{}/rss", server.uri())), base_date())
                .await;

            match result {
                Err(FetchError::Timeout(d)) => assert_eq!(d, Duration::from_millis(100)),
                other => panic!("expected timeout, got {:?}", other.map(|a| a.len())),
            }
        }

        #[tokio::test]
        async fn test_unreachable_host_is_an_error() {
            let fetcher = Fetcher::new(&test_config(2000));

            let result = fetcher
                .fetch_feed(&feed("Nowhere", "http://127.0.0.1:1/rss".to_string()), base_date())
                .await;

            assert!(result.is_err());
        }
    }

    mod fetch_all_tests {
        use super::*;

        #[tokio::test]
        async fn test_failures_are_isolated() {
            let server = MockServer::start().await;
            mount_feed(&server, "/a", rss_feed("A", 2, 0)).await;
            mount_feed(&server, "/broken", "definitely not xml".to_string()).await;
            mount_feed(&server, "/b", rss_feed("B", 3, 0)).await;
            Mock::given(method("GET"))
                .and(path("/gone"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let feeds = vec![
                feed("A", format!("{}/a", server.uri())),
                feed("Broken", format!("{}/broken", server.uri())),
                feed("Gone", format!("{}/gone", server.uri())),
                feed("B", format!("{}/b", server.uri())),
            ];
            let fetcher = Fetcher::new(&test_config(5000));

            let articles = fetcher.fetch_all(&feeds, base_date()).await;

            assert_eq!(articles.len(), 5);
            let sources: Vec<&str> = articles.iter().map(|a| a.source.as_str()).collect();
            assert_eq!(sources, vec!["A", "A", "B", "B", "B"]);
        }

        #[tokio::test]
        async fn test_feeds_run_concurrently() {
            let server = MockServer::start().await;
            for i in 0..5 {
                Mock::given(method("GET"))
                    .and(path(format!("/slowish/{i}")))
                    .respond_with(
                        ResponseTemplate::new(200)
                            .set_body_string(rss_feed("Slowish", 1, 0))
                            .set_delay(std::time::Duration::from_millis(300)),
                    )
                    .mount(&server)
                    .await;
            }
            let feeds: Vec<FeedConfig> = (0..5)
                .map(|i| feed("Slowish", format!("{}/slowish/{i}", server.uri())))
                .collect();
            // One after another these would take 1.5s.
            let fetcher = Fetcher::new(&test_config(1000));

            let started = std::time::Instant::now();
            let articles = fetcher.fetch_all(&feeds, base_date()).await;

            assert_eq!(articles.len(), 5);
            assert!(started.elapsed() < Duration::from_millis(1400));
        }

        #[tokio::test]
        async fn test_all_feeds_failing_yields_empty() {
            let server = MockServer::start().await;
            let feeds = vec![
                feed("X", format!("{}/missing-x", server.uri())),
                feed("Y", format!("{}/missing-y", server.uri())),
            ];
            let fetcher = Fetcher::new(&test_config(5000));

            let articles = fetcher.fetch_all(&feeds, base_date()).await;
            assert!(articles.is_empty());
        }
    }
}
