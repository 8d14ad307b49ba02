mod capabilities;
mod config;
mod error;
mod fallback;
mod gemini;
mod google;
mod models;
mod pipeline;
mod prediction;
mod redaction;
mod routes;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::capabilities::RecordStore;
use crate::config::{mask_key, AppConfig};
use crate::gemini::GeminiClient;
use crate::google::{DlpModerator, GoogleApi, LanguageClient, SpeechClient, TranslateClient, VisionClient};
use crate::pipeline::{Capabilities, Orchestrator, PipelineSettings};
use crate::prediction::SimulatedPredictor;
use crate::routes::AppState;
use crate::store::{FileStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Using Gemini key: {}", mask_key(&config.gemini_api_key));
    tracing::info!("Using Google Cloud key: {} (project {})", mask_key(&config.google_api_key), config.google_project_id);

    let google = GoogleApi::new(config.google_api_key.clone(), config.call_timeout)
        .context("failed to build Google API client")?;
    let endpoints = &config.endpoints;
    let vision = Arc::new(VisionClient::new(google.clone(), endpoints.vision.clone()));
    let transcriber = Arc::new(SpeechClient::new(google.clone(), endpoints.speech.clone()));

    let store: Arc<dyn RecordStore> = match &config.content_store_dir {
        Some(dir) => {
            let store = FileStore::open(dir.clone()).await
                .with_context(|| format!("failed to open content store at {}", dir.display()))?;
            Arc::new(store)
        }
        None => {
            tracing::info!("CONTENT_STORE_DIR not set, generated content is kept in memory");
            Arc::new(MemoryStore::default())
        }
    };

    let generator = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
        config.call_timeout,
    ).context("failed to build Gemini client")?;

    let caps = Capabilities {
        generator: Arc::new(generator),
        image_analyzer: vision.clone(),
        moderator: Arc::new(DlpModerator::new(google.clone(), endpoints.dlp.clone(), config.google_project_id.clone())),
        analyzer: Arc::new(LanguageClient::new(google.clone(), endpoints.language.clone())),
        translator: Arc::new(TranslateClient::new(google.clone(), endpoints.translate.clone(), config.source_language.clone())),
        predictor: Arc::new(SimulatedPredictor::new()),
        store: store.clone(),
    };
    let settings = PipelineSettings {
        primary_platform: config.primary_platform.clone(),
        target_languages: config.target_languages.clone(),
        call_timeout: config.call_timeout,
    };

    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(caps, settings)),
        image_analyzer: vision,
        transcriber,
        store,
    };
    let app = routes::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
