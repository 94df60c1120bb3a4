//! # Audio Insights Backend - Main Application Entry Point
//!
//! Accepts a recorded conversation, has it transcribed with speaker diarization by
//! a remote speech-to-text provider, asks a language model for a summary and a
//! list of insights, and returns everything as one JSON document.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state, providers and metrics
//! - **storage**: Scratch files holding uploads while the provider reads them
//! - **transcription**: Speech-to-text providers (AssemblyAI, Whisper)
//! - **summarization**: Language-model summary and insights
//! - **pipeline**: Sequences one upload through the providers
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **handlers**: HTTP request handlers
//! - **error**: Error types and their HTTP responses

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod pipeline;
mod state;
mod storage;
mod summarization;
mod transcription;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::AudioStore;
use crate::summarization::OpenAiSummarizer;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Builds the providers** and the shared application state
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** on SIGINT / SIGTERM, letting in-flight
///    uploads finish and release their scratch files
#[actix_web::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audio-insights-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let store = AudioStore::new(config.scratch_dir(), &config.storage.default_extension)
        .context("failed to prepare scratch directory")?;
    let transcriber = transcription::build_transcriber(&config.transcription)
        .context("failed to build transcription client")?;
    let summarizer = OpenAiSummarizer::from_config(&config.summarization)
        .context("failed to build summarization client")?;

    info!(
        scratch_dir = %store.dir().display(),
        transcription = config.transcription.provider.as_str(),
        summarization_model = %config.summarization.model,
        "Providers ready"
    );

    let app_state = AppState::new(config.clone(), store, transcriber, Arc::new(summarizer));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware executes in reverse order of registration for responses
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize tracing.
///
/// `RUST_LOG` controls what gets logged; without it the default is
/// `audio_insights_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_insights_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to initialize tracing")?;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM. If a handler can't be installed the server keeps
/// running on the remaining one.
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = terminate => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => {
                warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await
            }
        },
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await
    }
}
