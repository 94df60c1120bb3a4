//! AssemblyAI client: upload, diarized transcript job, status polling.

use super::{api_error, JobStatus, PollPolicy, Transcriber, TranscriptionError, TranscriptionJob, Utterance};
use crate::config::TranscriptionConfig;
use crate::storage::ScratchAudio;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct CreateTranscriptRequest<'a> {
    audio_url: &'a str,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_detection: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: JobStatus,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    utterances: Option<Vec<UtteranceResponse>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UtteranceResponse {
    speaker: String,
    start: i64,
    end: i64,
    text: String,
}

impl From<TranscriptResponse> for TranscriptionJob {
    fn from(response: TranscriptResponse) -> Self {
        TranscriptionJob {
            id: response.id,
            status: response.status,
            text: response.text.unwrap_or_default(),
            utterances: response
                .utterances
                .unwrap_or_default()
                .into_iter()
                .map(|u| Utterance::from_offsets(u.speaker, u.start, u.end, u.text))
                .collect(),
            error: response.error,
        }
    }
}

pub struct AssemblyAiClient {
    base_url: String,
    api_key: String,
    language_code: Option<String>,
    poll: PollPolicy,
    client: reqwest::Client,
}

impl std::fmt::Debug for AssemblyAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("language_code", &self.language_code)
            .field("poll", &self.poll)
            .finish()
    }
}

impl AssemblyAiClient {
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let language_code = Some(config.language_code.trim())
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            language_code,
            poll: PollPolicy::from_config(config),
            client,
        })
    }

    /// Send the raw audio bytes and return the provider's private URL for them.
    pub async fn upload(&self, audio: &ScratchAudio) -> Result<String, TranscriptionError> {
        let bytes = audio.read().await?;
        let size_bytes = bytes.len();

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let upload: UploadResponse = response.json().await?;
        info!(size_bytes, "audio uploaded to transcription provider");
        Ok(upload.upload_url)
    }

    /// Create a transcript job with speaker labels for an uploaded file.
    pub async fn create_transcript(&self, audio_url: &str) -> Result<TranscriptionJob, TranscriptionError> {
        let request = CreateTranscriptRequest {
            audio_url,
            speaker_labels: true,
            language_code: self.language_code.as_deref(),
            language_detection: self.language_code.is_none().then_some(true),
        };

        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let transcript: TranscriptResponse = response.json().await?;
        info!(job_id = %transcript.id, status = transcript.status.as_str(), "transcription job created");
        Ok(transcript.into())
    }

    /// Fetch the current state of a transcript job.
    pub async fn get_transcript(&self, job_id: &str) -> Result<TranscriptionJob, TranscriptionError> {
        let response = self
            .client
            .get(format!("{}/transcript/{}", self.base_url, job_id))
            .header("authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let transcript: TranscriptResponse = response.json().await?;
        Ok(transcript.into())
    }
}

#[async_trait]
impl Transcriber for AssemblyAiClient {
    async fn transcribe(&self, audio: &ScratchAudio) -> Result<TranscriptionJob, TranscriptionError> {
        let audio_url = self.upload(audio).await?;
        let created = self.create_transcript(&audio_url).await?;

        let job = if created.status.is_terminal() {
            created
        } else {
            self.poll.wait(&created.id, || self.get_transcript(&created.id)).await?
        };

        match job.status {
            JobStatus::Completed => {
                info!(
                    job_id = %job.id,
                    chars = job.text.len(),
                    utterances = job.utterances.len(),
                    "transcription completed"
                );
                Ok(job)
            }
            _ => Err(TranscriptionError::Provider(
                job.error
                    .unwrap_or_else(|| format!("job {} ended without a message", job.id)),
            )),
        }
    }

    fn provider_id(&self) -> &str {
        "assemblyai"
    }
}
