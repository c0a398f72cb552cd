use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::client::{Everything, NewsClient, SourceDirectory, TopHeadlines};
use newsdesk::config::Config;
use newsdesk::connectivity::{Connectivity, TcpProbe};
use newsdesk::coordinator::{Coordinator, FetchStatus, MergePolicy};
use newsdesk::db::Database;
use newsdesk::models::{Article, Source};
use newsdesk::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("newsdesk.toml")?;
    info!(
        "Loaded configuration: {} categories, country '{}'",
        config.categories.len(),
        config.country
    );
    if config.api_key.is_empty() {
        warn!("No API key configured; requests will be rejected by the news service");
    }

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.initialize().await?;
    info!("Database initialized");
    let db = Arc::new(db);

    // Create news client and streams
    let client = Arc::new(NewsClient::new(&config)?);
    let connectivity: Arc<dyn Connectivity> = Arc::new(TcpProbe::for_base_url(
        &config.base_url,
        Duration::from_millis(config.connectivity_timeout_ms),
    )?);

    let headlines = Arc::new(Coordinator::<Article>::new(
        "headlines",
        Arc::new(TopHeadlines(client.clone())),
        connectivity.clone(),
        MergePolicy::Append,
    ));
    let search = Arc::new(Coordinator::<Article>::new(
        "search",
        Arc::new(Everything(client.clone())),
        connectivity.clone(),
        MergePolicy::Append,
    ));
    let sources = Arc::new(Coordinator::<Source>::new(
        "sources",
        Arc::new(SourceDirectory(client.clone())),
        connectivity,
        MergePolicy::Replace,
    ));

    // Load the first category in the background
    let initial = headlines.clone();
    let category = config.default_category().to_string();
    tokio::spawn(async move {
        info!("Loading initial headlines for '{}'", category);
        if let FetchStatus::Error(message) = initial.start(&category).await {
            error!("Initial headline load failed: {}", message);
        }
    });

    // Create app state
    let state = Arc::new(AppState {
        db,
        headlines,
        search,
        sources,
        categories: config.categories.clone(),
        country: config.country.clone(),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
