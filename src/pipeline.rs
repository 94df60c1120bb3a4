//! # Request Pipeline
//!
//! Sequences one upload through the providers:
//!
//! `Received → Validated → AudioStored → Transcribed → Summarized → Responded`
//!
//! Validation happens in the handler before this module is reached. From
//! `AudioStored` on, the scratch file is released on every exit path: the explicit
//! `release` below covers normal returns and `ScratchAudio`'s `Drop` covers a
//! cancelled request future.

use crate::error::AppResult;
use crate::state::AppState;
use crate::storage::{ScratchAudio, UploadedAudio};
use crate::transcription::Utterance;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// The body of a successful `POST /transcrever`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePayload {
    #[serde(rename = "transcricao")]
    pub transcript: String,
    #[serde(rename = "diarizacao")]
    pub utterances: Vec<Utterance>,
    #[serde(rename = "resumo")]
    pub summary: String,
    pub insights: Vec<String>,
}

/// Run the full pipeline for an already-validated upload.
pub async fn run(state: &AppState, upload: UploadedAudio) -> AppResult<ResponsePayload> {
    let _active = state.begin_pipeline();
    let started = Instant::now();

    let outcome = match state.store.store(&upload).await {
        Ok(scratch) => {
            let outcome = transcribe_and_summarize(state, &scratch).await;
            scratch.release().await;
            outcome
        }
        Err(err) => Err(err.into()),
    };

    match &outcome {
        Ok(payload) => {
            info!(
                duration_ms = started.elapsed().as_millis() as u64,
                utterances = payload.utterances.len(),
                insights = payload.insights.len(),
                "pipeline completed"
            );
            state.record_pipeline_outcome(None);
        }
        Err(err) => {
            error!(
                duration_ms = started.elapsed().as_millis() as u64,
                kind = err.kind(),
                error = %err,
                "pipeline failed"
            );
            state.record_pipeline_outcome(Some(err.kind()));
        }
    }

    outcome
}

async fn transcribe_and_summarize(state: &AppState, scratch: &ScratchAudio) -> AppResult<ResponsePayload> {
    let job = state.transcriber.transcribe(scratch).await?;
    info!(
        provider = state.transcriber.provider_id(),
        job_id = %job.id,
        "transcribed"
    );

    let summary = state.summarizer.summarize(&job.text).await?;
    info!(provider = state.summarizer.provider_id(), "summarized");

    Ok(ResponsePayload {
        transcript: job.text,
        utterances: job.utterances,
        summary: summary.summary,
        insights: summary.insights,
    })
}
