use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// How long an aggregated result is served before re-fetching, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Per-feed fetch deadline in milliseconds
    #[serde(default = "default_feed_timeout_ms")]
    pub feed_timeout_ms: u64,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    pub feeds: Vec<FeedConfig>,
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_feed_timeout_ms() -> u64 {
    5000
}

fn default_max_items_per_feed() -> usize {
    20
}

fn default_snippet_length() -> usize {
    200
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_url")]
    pub api_url: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_summarizer_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_summarizer_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_url: default_summarizer_url(),
            model: default_summarizer_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }
}
