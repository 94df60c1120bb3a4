//! # Summarization Module
//!
//! Sends the full transcript to a language model and turns its reply into a
//! [`SummaryResult`]: a short executive summary plus a list of insights.
//!
//! ## Reply contract:
//! The model is asked to answer with nothing but
//! `{"resumo": string, "insights": [string, ...]}`. The reply is parsed strictly.
//! A reply that is not JSON, lacks one of the two keys, or carries the wrong
//! types is a [`SummaryError`], never an empty default.

pub mod openai;
pub mod prompt;

pub use openai::OpenAiSummarizer;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Structured result of one summarization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryResult {
    pub summary: String,
    pub insights: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summarization request failed: {0}")]
    Request(String),
    #[error("summarization provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("summarization provider returned no content")]
    EmptyReply,
    #[error("summarization reply is not a JSON object: {0}")]
    MalformedReply(String),
    #[error("summarization reply is missing field '{0}'")]
    MissingField(&'static str),
    #[error("summarization reply field '{field}' must be {expected}")]
    InvalidField { field: &'static str, expected: &'static str },
}

impl SummaryError {
    pub fn kind(&self) -> &'static str {
        match self {
            SummaryError::Request(_) => "summarization_request",
            SummaryError::Api { .. } => "summarization_api",
            SummaryError::EmptyReply => "summarization_empty",
            SummaryError::MalformedReply(_) => "summarization_malformed",
            SummaryError::MissingField(_) => "summarization_missing_field",
            SummaryError::InvalidField { .. } => "summarization_invalid_field",
        }
    }
}

impl From<reqwest::Error> for SummaryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SummaryError::MalformedReply(err.to_string())
        } else {
            SummaryError::Request(err.to_string())
        }
    }
}

/// Abstraction over language-model summarizers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a transcript. An empty transcript is still sent.
    async fn summarize(&self, transcript: &str) -> Result<SummaryResult, SummaryError>;

    fn provider_id(&self) -> &str;
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse the model's reply into a [`SummaryResult`].
pub fn parse_reply(content: &str) -> Result<SummaryResult, SummaryError> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| SummaryError::MalformedReply(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| SummaryError::MalformedReply("expected an object at the top level".to_string()))?;

    let summary = object
        .get("resumo")
        .ok_or(SummaryError::MissingField("resumo"))?
        .as_str()
        .ok_or(SummaryError::InvalidField {
            field: "resumo",
            expected: "a string",
        })?
        .trim()
        .to_string();

    let invalid_insights = || SummaryError::InvalidField {
        field: "insights",
        expected: "an array of strings",
    };
    let insights = object
        .get("insights")
        .ok_or(SummaryError::MissingField("insights"))?
        .as_array()
        .ok_or_else(invalid_insights)?
        .iter()
        .map(|item| item.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid_insights)?;

    Ok(SummaryResult { summary, insights })
}
