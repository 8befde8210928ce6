mod answers;
mod applications;
mod browser;
mod config;
mod db;
mod engine;
mod errors;
mod ledger;
mod llm_client;
mod mapping;
mod models;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::answers::LlmAnswerGenerator;
use crate::browser::{SessionDriver, WebDriverBackend};
use crate::config::Config;
use crate::db::create_pool;
use crate::engine::{ApplicationEngine, Catalog};
use crate::ledger::{Ledger, PgLedger};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AutoApply API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL ledger
    let db = create_pool(&config.database_url).await?;
    let ledger: Arc<dyn Ledger> = Arc::new(PgLedger::new(db));

    // Initialize LLM-backed answer generator
    let llm = LlmClient::new(config.llm_settings()).context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm.model());
    let generator = Arc::new(LlmAnswerGenerator::new(llm));

    // Initialize browser automation
    let backend = WebDriverBackend::new(config.webdriver_settings())
        .context("Failed to build WebDriver client")?;
    info!(
        "WebDriver backend at {} (headless: {})",
        config.webdriver_url, config.browser_headless
    );
    let driver = SessionDriver::new(Arc::new(backend), config.engine.driver.clone());

    let catalog = Arc::new(Catalog::default());
    let engine = Arc::new(ApplicationEngine::new(
        ledger.clone(),
        catalog.clone(),
        catalog.clone(),
        generator,
        driver,
        config.engine.clone(),
    ));

    // Continue attempts a previous process left open
    if let Err(e) = engine.recover_interrupted().await {
        warn!("Startup recovery skipped: {e}");
    }

    // Build app state
    let state = AppState {
        engine,
        catalog,
        ledger,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
