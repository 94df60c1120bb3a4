//! # Error Handling
//!
//! This module defines the errors a request can end with and how each one is
//! turned into an HTTP response.
//!
//! ## Error Categories:
//! - **Validation**: the client sent something unusable (no `audio` field, empty
//!   or oversized upload, broken multipart body). Reported before any file is
//!   written or any provider is called.
//! - **Transcription**: the speech-to-text provider failed, rejected the request,
//!   reported a job error, or never finished within the polling bounds.
//! - **Summarization**: the language model failed or answered with something that
//!   is not the expected JSON object.
//! - **Storage**: the scratch file could not be written.
//!
//! ## Response Format:
//! Every error is rendered as `{"erro": "<message>"}`, which is what the front end
//! displays to the user.

use crate::storage::StorageError;
use crate::summarization::SummaryError;
use crate::transcription::TranscriptionError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Message returned when the multipart body has no `audio` field.
pub const MISSING_AUDIO_MESSAGE: &str = "campo 'audio' não enviado";

/// Custom error types for the application.
///
/// ## Rust Concepts:
/// - **enum**: each variant is one way a request can fail
/// - **wrapped errors**: provider variants keep the typed error so the pipeline
///   can log its kind, while the response only shows its message
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or incomplete data (400)
    Validation(String),

    /// Speech-to-text provider failure, including poll timeouts (500)
    Transcription(TranscriptionError),

    /// Language-model failure or unusable reply (500)
    Summarization(SummaryError),

    /// Scratch storage failure (500)
    Storage(StorageError),
}

impl AppError {
    /// The 400 returned when no `audio` field was sent.
    pub fn missing_audio() -> Self {
        AppError::Validation(MISSING_AUDIO_MESSAGE.to_string())
    }

    /// Machine-readable label used in logs and pipeline metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Transcription(err) => err.kind(),
            AppError::Summarization(err) => err.kind(),
            AppError::Storage(_) => "storage",
        }
    }
}

/// Display is the exact message sent back in the `erro` field.
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::Transcription(err) => write!(f, "{}", err),
            AppError::Summarization(err) => write!(f, "{}", err),
            AppError::Storage(err) => write!(f, "{}", err),
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - Validation → 400 (Bad Request)
/// - Transcription/Summarization/Storage → 500 (Internal Server Error)
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Transcription(_) | AppError::Summarization(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "erro": self.to_string()
        }))
    }
}

impl From<TranscriptionError> for AppError {
    fn from(err: TranscriptionError) -> Self {
        AppError::Transcription(err)
    }
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        AppError::Summarization(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
