use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neuroloom::aggregator::Aggregator;
use neuroloom::config::Config;
use neuroloom::routes::{self, AppState};
use neuroloom::summarizer::Summarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuroloom=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEUROLOOM_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} feeds from {} (cache TTL {}s, feed timeout {}ms)",
        config.feeds.len(),
        config_path,
        config.cache_ttl_secs,
        config.feed_timeout_ms
    );

    let summarizer = Summarizer::new(
        config.summarizer.clone(),
        std::env::var("GROQ_API_KEY").ok(),
    );
    if !summarizer.is_configured() {
        warn!("GROQ_API_KEY not set, article summaries are disabled");
    }

    let state = Arc::new(AppState {
        aggregator: Arc::new(Aggregator::new(&config)),
        summarizer: Arc::new(summarizer),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
