//! # Transcription Module
//!
//! Turns a scratch audio file into text plus speaker-attributed utterances by
//! delegating to a remote speech-to-text provider.
//!
//! ## Key Components:
//! - **Transcriber trait**: the seam the request pipeline depends on
//! - **AssemblyAI client**: upload, diarized job creation, bounded status polling
//! - **Whisper client**: one synchronous request, segments without speaker labels
//! - **Poll policy**: interval, attempt bound and deadline for the status loop
//!
//! ## Job Lifecycle:
//! `queued → processing → completed | error`. Only `completed` yields a
//! [`TranscriptionJob`] to the caller; `error` becomes [`TranscriptionError::Provider`].

pub mod assemblyai;
pub mod poll;
pub mod whisper;

pub use assemblyai::AssemblyAiClient;
pub use poll::PollPolicy;
pub use whisper::WhisperClient;

use crate::config::{TranscriptionConfig, TranscriptionProvider};
use crate::storage::{ScratchAudio, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Processing status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Terminal statuses end the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

/// One speaker-attributed, time-bounded span of transcript text.
///
/// Offsets are milliseconds from the start of the recording, with `start <= end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub start: u64,
    pub end: u64,
    pub text: String,
}

impl Utterance {
    /// Build an utterance from raw provider offsets, clamping negatives to zero
    /// and an inverted span to zero length.
    pub fn from_offsets(speaker: impl Into<String>, start: i64, end: i64, text: impl Into<String>) -> Self {
        let start = start.max(0) as u64;
        let end = (end.max(0) as u64).max(start);
        Self {
            speaker: speaker.into(),
            start,
            end,
            text: text.into(),
        }
    }
}

/// A transcription job as last seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
    pub id: String,
    pub status: JobStatus,
    pub text: String,
    pub utterances: Vec<Utterance>,
    /// Provider message when `status` is `Error`.
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription request failed: {0}")]
    Request(String),
    #[error("transcription provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("transcription failed: {0}")]
    Provider(String),
    #[error("transcription did not finish after {attempts} status checks ({elapsed_secs}s)")]
    Timeout { attempts: u32, elapsed_secs: u64 },
    #[error("unexpected transcription response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TranscriptionError {
    /// Short machine-readable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptionError::Request(_) => "transcription_request",
            TranscriptionError::Api { .. } => "transcription_api",
            TranscriptionError::Provider(_) => "transcription_provider",
            TranscriptionError::Timeout { .. } => "transcription_timeout",
            TranscriptionError::MalformedResponse(_) => "transcription_malformed",
            TranscriptionError::Storage(_) => "transcription_storage",
        }
    }
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TranscriptionError::MalformedResponse(err.to_string())
        } else {
            TranscriptionError::Request(err.to_string())
        }
    }
}

/// Abstraction over speech-to-text services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Run the full provider cycle for one scratch file and return the completed job.
    async fn transcribe(&self, audio: &ScratchAudio) -> Result<TranscriptionJob, TranscriptionError>;

    /// Lowercase provider identifier ("assemblyai", "whisper").
    fn provider_id(&self) -> &str;
}

/// Build the configured transcription client.
pub fn build_transcriber(config: &TranscriptionConfig) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
    Ok(match config.provider {
        TranscriptionProvider::AssemblyAi => Arc::new(AssemblyAiClient::from_config(config)?),
        TranscriptionProvider::Whisper => Arc::new(WhisperClient::from_config(config)?),
    })
}

/// Turn a non-success response into an `Api` error carrying the body.
pub(crate) async fn api_error(response: reqwest::Response) -> TranscriptionError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    TranscriptionError::Api { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_order_is_forward() {
        assert!(JobStatus::Queued < JobStatus::Processing);
        assert!(JobStatus::Processing < JobStatus::Completed);
    }

    #[test]
    fn test_status_parsing() {
        let status: JobStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, JobStatus::Processing);
        assert!(serde_json::from_str::<JobStatus>("\"paused\"").is_err());
    }

    #[test]
    fn test_utterance_offsets_are_normalized() {
        let u = Utterance::from_offsets("A", -20, 500, "oi");
        assert_eq!((u.start, u.end), (0, 500));

        let inverted = Utterance::from_offsets("B", 900, 800, "tchau");
        assert_eq!((inverted.start, inverted.end), (900, 900));
    }

    #[test]
    fn test_error_kinds() {
        let timeout = TranscriptionError::Timeout { attempts: 3, elapsed_secs: 6 };
        assert_eq!(timeout.kind(), "transcription_timeout");
        assert!(timeout.to_string().contains("3 status checks"));
    }
}
