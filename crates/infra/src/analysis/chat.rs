//! Chat-completions client for the analysis service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use scrub_ai::{AnalysisClient, AnalysisError, AnalysisRequest, CallOutcome};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Sends one chat-completions call per batch.
///
/// Every failure is classified and returned as a [`CallOutcome`]; nothing here retries.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl ChatCompletionsClient {
    /// Build a client whose calls give up after `timeout`.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    async fn send(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_envelope(&text)
    }
}

#[async_trait]
impl AnalysisClient for ChatCompletionsClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &AnalysisRequest) -> CallOutcome {
        match self.send(request).await {
            Ok(text) => {
                debug!(chars = text.len(), "analysis call succeeded");
                CallOutcome::Success(text)
            }
            Err(e) => e.into_outcome(),
        }
    }
}

/// Extract the first choice's message text from a response body.
///
/// The text is trimmed. A body without a first choice, or whose message has no
/// content, is a malformed envelope.
pub fn parse_envelope(body: &str) -> Result<String, AnalysisError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::MalformedEnvelope(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| AnalysisError::MalformedEnvelope("no message content in first choice".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"\n1. Acme: Active\n"}},
                     {"message":{"content":"ignored"}}]}"#;
        assert_eq!(parse_envelope(body).unwrap(), "1. Acme: Active");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = parse_envelope(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedEnvelope(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn null_content_is_malformed() {
        let err = parse_envelope(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedEnvelope(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(parse_envelope("<html>gateway</html>").is_err());
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "sonar",
            messages: [
                ChatMessage { role: "system", content: "sys" },
                ChatMessage { role: "user", content: "usr" },
            ],
            temperature: 0.3,
            max_tokens: 2000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "sonar");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["max_tokens"], 2000);
    }
}
