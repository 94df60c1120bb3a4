//! OpenAI Whisper client.
//!
//! Whisper answers synchronously and has no diarization, so every segment is
//! attributed to a single speaker label.

use super::{api_error, JobStatus, Transcriber, TranscriptionError, TranscriptionJob, Utterance};
use crate::config::TranscriptionConfig;
use crate::storage::ScratchAudio;
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Label used for every segment, since Whisper cannot tell speakers apart.
pub const SINGLE_SPEAKER_LABEL: &str = "A";

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    start: f64,
    end: f64,
    text: String,
}

fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    language_code: Option<String>,
}

impl std::fmt::Debug for WhisperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl WhisperClient {
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.whisper_model.clone(),
            language_code: Some(config.language_code.trim())
                .filter(|code| !code.is_empty())
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &ScratchAudio) -> Result<TranscriptionJob, TranscriptionError> {
        let bytes = audio.read().await?;

        let file_part = multipart::Part::bytes(bytes)
            .file_name(audio.file_name())
            .mime_str(audio.content_type())
            .map_err(|e| TranscriptionError::Request(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);
        if let Some(language) = &self.language_code {
            form = form.text("language", language.clone());
        }

        tracing::debug!(model = %self.model, "sending audio to Whisper");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let transcription: VerboseTranscription = response.json().await?;

        let job = TranscriptionJob {
            id: format!("whisper-{}", Uuid::new_v4()),
            status: JobStatus::Completed,
            text: transcription.text.trim().to_string(),
            utterances: transcription
                .segments
                .into_iter()
                .map(|segment| {
                    Utterance::from_offsets(
                        SINGLE_SPEAKER_LABEL,
                        seconds_to_millis(segment.start),
                        seconds_to_millis(segment.end),
                        segment.text.trim(),
                    )
                })
                .collect(),
            error: None,
        };

        info!(
            job_id = %job.id,
            chars = job.text.len(),
            utterances = job.utterances.len(),
            "transcription completed"
        );

        Ok(job)
    }

    fn provider_id(&self) -> &str {
        "whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, TranscriptionProvider};
    use crate::storage::{AudioStore, UploadedAudio};
    use mockito::{Matcher, Server};

    fn client_for(server_url: &str) -> WhisperClient {
        let config = TranscriptionConfig {
            provider: TranscriptionProvider::Whisper,
            base_url: server_url.to_string(),
            api_key: "sk-test".to_string(),
            ..AppConfig::default().transcription
        };
        WhisperClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis(0.0), 0);
        assert_eq!(seconds_to_millis(1.2345), 1235);
    }

    #[tokio::test]
    async fn test_segments_become_single_speaker_utterances() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "webm").unwrap();
        let audio = store
            .store(&UploadedAudio {
                bytes: b"webm".to_vec(),
                content_type: Some("audio/webm".to_string()),
                filename: None,
            })
            .await
            .unwrap();

        let mock = server
            .mock("POST", "/audio/transcriptions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Regex("verbose_json".to_string()))
            .with_body(
                r#"{
                    "text": " Olá pessoal. Vamos começar. ",
                    "segments": [
                        {"id": 0, "start": 0.0, "end": 1.5, "text": " Olá pessoal."},
                        {"id": 1, "start": 1.5, "end": 3.25, "text": " Vamos começar."}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let job = client_for(&server.url()).transcribe(&audio).await.unwrap();
        mock.assert_async().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.text, "Olá pessoal. Vamos começar.");
        assert_eq!(
            job.utterances,
            vec![
                Utterance {
                    speaker: "A".to_string(),
                    start: 0,
                    end: 1500,
                    text: "Olá pessoal.".to_string(),
                },
                Utterance {
                    speaker: "A".to_string(),
                    start: 1500,
                    end: 3250,
                    text: "Vamos começar.".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "webm").unwrap();
        let audio = store
            .store(&UploadedAudio {
                bytes: b"webm".to_vec(),
                content_type: None,
                filename: None,
            })
            .await
            .unwrap();

        server
            .mock("POST", "/audio/transcriptions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = client_for(&server.url()).transcribe(&audio).await.unwrap_err();
        match err {
            TranscriptionError::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
