//! # Configuration Management
//!
//! This module loads the application configuration from several layered sources:
//! - Built-in defaults (the `Default` impl below)
//! - An optional TOML file (config.toml)
//! - Environment variables (with the APP_ prefix)
//! - Provider credentials from their conventional variables
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `ASSEMBLYAI_API_KEY`, `OPENAI_API_KEY`, `HOST`, `PORT`
//! 2. Prefixed environment variables (APP_SERVER__PORT, APP_TRANSCRIPTION__POLL_INTERVAL_MS, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values
//!
//! ## Why a double underscore separator:
//! Several keys contain underscores themselves (`poll_interval_ms`), so a single `_`
//! cannot tell a section boundary apart from a word boundary.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration, grouped by concern.
///
/// ## Sections:
/// - `server`: where to listen and how large an upload may be
/// - `storage`: where scratch audio files are written
/// - `transcription`: speech-to-text provider and polling bounds
/// - `summarization`: language-model provider and prompt parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub summarization: SummarizationConfig,
}

/// HTTP server settings.
///
/// ## Fields:
/// - `host`: IP address to bind ("127.0.0.1" for local development, "0.0.0.0" in containers)
/// - `port`: TCP port to listen on
/// - `max_upload_bytes`: largest accepted `audio` field, anything bigger is rejected with 400
/// - `slow_request_ms`: requests slower than this are logged as warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub slow_request_ms: u64,
}

/// Scratch storage for uploaded audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for temporary audio files. Empty means `<system temp>/audio-insights`.
    pub scratch_dir: String,
    /// Extension used when the declared content type is not recognised.
    pub default_extension: String,
}

/// Which remote service turns audio into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Upload + diarized transcript job + status polling.
    AssemblyAi,
    /// Single synchronous request, no speaker labels.
    Whisper,
}

impl TranscriptionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionProvider::AssemblyAi => "assemblyai",
            TranscriptionProvider::Whisper => "whisper",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            TranscriptionProvider::AssemblyAi => "https://api.assemblyai.com/v2",
            TranscriptionProvider::Whisper => "https://api.openai.com/v1",
        }
    }
}

/// Speech-to-text provider settings.
///
/// ## Polling bounds:
/// The job is polled every `poll_interval_ms` until it reaches a terminal status.
/// The wait gives up after `max_poll_attempts` polls or `deadline_secs` seconds,
/// whichever comes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub provider: TranscriptionProvider,
    /// Empty means the provider's public endpoint.
    pub base_url: String,
    pub api_key: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub deadline_secs: u64,
    pub request_timeout_secs: u64,
    /// Empty lets the provider detect the language.
    pub language_code: String,
    pub whisper_model: String,
}

/// Language-model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Low values keep the reply close to the requested JSON shape.
    pub temperature: f32,
    /// Number of insights asked for in the prompt.
    pub insight_count: usize,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 10000,
                max_upload_bytes: 50 * 1024 * 1024,  // 50MB
                slow_request_ms: 30_000,
            },
            storage: StorageConfig {
                scratch_dir: String::new(),
                default_extension: "webm".to_string(),
            },
            transcription: TranscriptionConfig {
                provider: TranscriptionProvider::AssemblyAi,
                base_url: String::new(),
                api_key: String::new(),
                poll_interval_ms: 2000,
                max_poll_attempts: 300,
                deadline_secs: 900,
                request_timeout_secs: 120,
                language_code: String::new(),
                whisper_model: "whisper-1".to_string(),
            },
            summarization: SummarizationConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
                insight_count: 5,
                request_timeout_secs: 120,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_TRANSCRIPTION__PROVIDER=whisper`: Use Whisper instead of AssemblyAI
    /// - `APP_SUMMARIZATION__MODEL=gpt-4o`: Change the summarization model
    /// - `ASSEMBLYAI_API_KEY` / `OPENAI_API_KEY`: Provider credentials
    /// - `HOST` / `PORT`: Deployment platform conventions
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("ASSEMBLYAI_API_KEY") {
            settings = settings.set_override("transcription.api_key", key)?;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("summarization.api_key", key)?;
        }

        let mut config: AppConfig = settings.build()?.try_deserialize()?;
        config.resolve_provider_defaults();
        Ok(config)
    }

    /// Fill in the values that depend on which transcription provider was chosen.
    ///
    /// Whisper lives on the same API as the summarization model, so it reuses that
    /// endpoint's credentials unless dedicated ones were configured.
    pub fn resolve_provider_defaults(&mut self) {
        let provider = self.transcription.provider;
        if self.transcription.base_url.is_empty() {
            self.transcription.base_url = provider.default_base_url().to_string();
        }
        if provider == TranscriptionProvider::Whisper && self.transcription.api_key.is_empty() {
            self.transcription.api_key = self.summarization.api_key.clone();
        }
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 and uploads are allowed to carry at least one byte
    /// - Polling has a non-zero interval and a non-zero bound
    /// - Both providers have credentials
    /// - The temperature is inside the range chat completion APIs accept
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.transcription.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.transcription.max_poll_attempts == 0 || self.transcription.deadline_secs == 0 {
            return Err(anyhow::anyhow!("Polling must be bounded by at least one attempt and one second"));
        }

        if self.transcription.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Transcription API key missing. Set ASSEMBLYAI_API_KEY or APP_TRANSCRIPTION__API_KEY"
            ));
        }

        if self.summarization.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Summarization API key missing. Set OPENAI_API_KEY or APP_SUMMARIZATION__API_KEY"
            ));
        }

        if !(0.0..=2.0).contains(&self.summarization.temperature) {
            return Err(anyhow::anyhow!("Temperature must be between 0.0 and 2.0"));
        }

        if self.summarization.insight_count == 0 {
            return Err(anyhow::anyhow!("Insight count must be greater than 0"));
        }

        Ok(())
    }

    /// Directory where uploads are staged while a request is in flight.
    pub fn scratch_dir(&self) -> PathBuf {
        if self.storage.scratch_dir.is_empty() {
            env::temp_dir().join("audio-insights")
        } else {
            PathBuf::from(&self.storage.scratch_dir)
        }
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}
