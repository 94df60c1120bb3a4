use super::{parse_reply, prompt, SummaryError, SummaryResult, Summarizer};
use crate::config::SummarizationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Chat-completions summarizer (OpenAI and compatible endpoints).
pub struct OpenAiSummarizer {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    insight_count: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSummarizer")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiSummarizer {
    pub fn from_config(config: &SummarizationConfig) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            insight_count: config.insight_count,
            client,
        })
    }

    /// Send one user message and return the text of the first choice.
    async fn complete(&self, content: String) -> Result<String, SummaryError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(content),
            }],
            temperature: self.temperature,
        };

        tracing::info!(model = %self.model, "sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(SummaryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        if let Some(usage) = &chat_response.usage {
            tracing::info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }

        let choice = chat_response.choices.into_iter().next().ok_or(SummaryError::EmptyReply)?;

        if let Some(reason) = &choice.finish_reason {
            if reason != "stop" {
                tracing::warn!(finish_reason = %reason, "chat completion did not stop normally");
            }
        }

        choice.message.content.ok_or(SummaryError::EmptyReply)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<SummaryResult, SummaryError> {
        let reply = self
            .complete(prompt::build_prompt(transcript, self.insight_count))
            .await?;

        let result = parse_reply(&reply)?;

        // Any count is accepted; a mismatch is only worth a warning.
        if result.insights.len() != self.insight_count {
            tracing::warn!(
                expected = self.insight_count,
                received = result.insights.len(),
                "insight count differs from the requested amount"
            );
        }

        tracing::info!(
            summary_chars = result.summary.len(),
            insights = result.insights.len(),
            "summary parsed"
        );

        Ok(result)
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn summarizer_for(server_url: &str) -> OpenAiSummarizer {
        let config = SummarizationConfig {
            base_url: server_url.to_string(),
            api_key: "sk-test".to_string(),
            ..AppConfig::default().summarization
        };
        OpenAiSummarizer::from_config(&config).unwrap()
    }

    fn completion(content: &str) -> String {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_summarize_sends_single_turn_low_temperature() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.3
            })))
            .with_body(completion(
                r#"{"resumo": "Reunião curta sobre o orçamento.", "insights": ["a", "b", "c", "d", "e"]}"#,
            ))
            .create_async()
            .await;

        let result = summarizer_for(&server.url())
            .summarize("Falante A: precisamos fechar o orçamento.")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.summary, "Reunião curta sobre o orçamento.");
        assert_eq!(result.insights, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_prompt_carries_transcript() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::Regex("precisamos fechar o orçamento".to_string()))
            .with_body(completion(r#"{"resumo": "ok", "insights": []}"#))
            .create_async()
            .await;

        summarizer_for(&server.url())
            .summarize("precisamos fechar o orçamento")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fewer_insights_are_tolerated() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(completion(r#"{"resumo": "ok", "insights": ["só um"]}"#))
            .create_async()
            .await;

        let result = summarizer_for(&server.url()).summarize("texto").await.unwrap();
        assert_eq!(result.insights, vec!["só um"]);
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(completion("Claro! Aqui está o resumo da reunião."))
            .create_async()
            .await;

        let err = summarizer_for(&server.url()).summarize("texto").await.unwrap_err();
        assert!(matches!(err, SummaryError::MalformedReply(_)));
    }

    #[tokio::test]
    async fn test_missing_insights_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(completion(r#"{"resumo": "ok"}"#))
            .create_async()
            .await;

        let err = summarizer_for(&server.url()).summarize("texto").await.unwrap_err();
        assert!(matches!(err, SummaryError::MissingField("insights")));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = summarizer_for(&server.url()).summarize("texto").await.unwrap_err();
        assert!(matches!(err, SummaryError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_no_choices_is_empty_reply() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = summarizer_for(&server.url()).summarize("texto").await.unwrap_err();
        assert!(matches!(err, SummaryError::EmptyReply));
    }
}
