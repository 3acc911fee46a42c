//! Article summaries via an OpenAI-compatible chat-completions API.
//!
//! [`Summarizer::summarize`] never fails outward: every problem is turned
//! into a short message the UI can show in place of a summary.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::SummarizerConfig;

pub const NOT_CONFIGURED: &str =
    "AI summaries not configured. Add GROQ_API_KEY to environment variables.";
pub const RATE_LIMITED: &str = "Too many requests. Please try again in a moment.";
pub const NO_SUMMARY: &str = "Unable to generate summary for this article.";
pub const FAILED: &str = "Failed to generate summary. Please try again.";

const SYSTEM_PROMPT: &str = "You are a tech news summarizer. Create concise, engaging 2-3 sentence \
summaries that highlight key points and why they matter. Be direct, technical, and insightful. \
Focus on the impact and innovation.";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("rate limited by summarization API")]
    RateLimited,

    #[error("summarization API returned {0}")]
    Status(StatusCode),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion contained no text")]
    Empty,
}

impl SummaryError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SummaryError::MissingApiKey => NOT_CONFIGURED,
            SummaryError::RateLimited => RATE_LIMITED,
            SummaryError::Empty => NO_SUMMARY,
            SummaryError::Status(_) | SummaryError::Http(_) => FAILED,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

pub struct Summarizer {
    client: Client,
    config: SummarizerConfig,
    api_key: Option<String>,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn summarize(&self, request: &SummarizeRequest) -> SummarizeResponse {
        let summary = match self.request_summary(request).await {
            Ok(summary) => summary,
            Err(e) => {
                match &e {
                    SummaryError::MissingApiKey => error!("GROQ_API_KEY not configured"),
                    SummaryError::RateLimited | SummaryError::Empty => warn!("Summary unavailable: {}", e),
                    _ => error!("Summary API error: {}", e),
                }
                e.user_message().to_string()
            }
        };
        SummarizeResponse { summary }
    }

    pub async fn request_summary(&self, request: &SummarizeRequest) -> Result<String, SummaryError> {
        let api_key = self.api_key.as_deref().ok_or(SummaryError::MissingApiKey)?;

        let description = request
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("No description available");

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Summarize this tech article:\n\nTitle: {}\n\nDescription: {}",
                        request.title, description
                    ),
                },
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": 0.9,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SummaryError::RateLimited),
            status if !status.is_success() => return Err(SummaryError::Status(status)),
            _ => {}
        }

        let completion: Completion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(SummaryError::Empty)
    }
}
