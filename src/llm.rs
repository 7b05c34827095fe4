//! Language-model transport.
//!
//! REST client for the OpenAI chat completions API, with a streaming
//! variant that forwards tokens as they arrive. Provider error bodies
//! are parsed here into [`ProviderError`] variants so callers never
//! match on message strings.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::ProviderError;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const KEY_PROBE_URL: &str = "https://api.openai.com/v1/models/gpt-3.5-turbo";
const KEY_PROBE_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    /// Cheap probe for a personal key supplied with a request: fetch one
    /// model record with a short timeout before doing any real work.
    pub async fn validate_key(&self) -> Result<(), ProviderError> {
        let response = self
            .http
            .get(KEY_PROBE_URL)
            .bearer_auth(&self.api_key)
            .timeout(KEY_PROBE_TIMEOUT)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(()),
            401 => Err(ProviderError::InvalidKey(
                "Incorrect OpenAI API key provided".to_string(),
            )),
            _ => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Api(format!(
                    "key validation failed ({}): {}",
                    status, body
                )))
            }
        }
    }

    /// One-shot completion, used for the question-condensing step.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": messages,
                "temperature": 0,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("bad completion response: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    /// Streaming completion. `on_token` is called with each token as it
    /// arrives; the full answer is returned once the stream finishes.
    pub async fn stream_complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        mut on_token: impl FnMut(&str),
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": messages,
                "temperature": 0,
                "stream": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let mut answer = String::new();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(bytes) = stream.next().await {
            let bytes = bytes?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(answer);
                }
                let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
                    continue;
                };
                if let Some(token) = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                {
                    answer.push_str(&token);
                    on_token(&token);
                }
            }
        }
        Ok(answer)
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        parse_provider_error(status.as_u16(), &body)
    }
}

/// Map a provider error body to a structured error. A body with code
/// `context_length_exceeded` carries the model limit and the actual
/// token count as the first two integers of its message.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if parsed.error.code.as_deref() == Some("context_length_exceeded") {
            if let Some((limit, used)) = first_two_integers(&parsed.error.message) {
                return ProviderError::ContextLengthExceeded { limit, used };
            }
        }
        if status == 401 {
            return ProviderError::InvalidKey(
                "Incorrect OpenAI API key provided".to_string(),
            );
        }
        return ProviderError::Api(parsed.error.message);
    }
    ProviderError::Api(format!("request failed ({}): {}", status, body))
}

fn first_two_integers(message: &str) -> Option<(i64, i64)> {
    let mut numbers = Vec::new();
    let mut current = String::new();
    for ch in message.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else if !current.is_empty() {
            numbers.push(std::mem::take(&mut current));
            if numbers.len() == 2 {
                break;
            }
        }
    }
    if !current.is_empty() && numbers.len() < 2 {
        numbers.push(current);
    }
    if numbers.len() < 2 {
        return None;
    }
    let limit = numbers[0].parse().ok()?;
    let used = numbers[1].parse().ok()?;
    Some((limit, used))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT_BODY: &str = r#"{"error":{
        "message":"This model's maximum context length is 4097 tokens. However, your messages resulted in 12617 tokens. Please reduce the length of the messages.",
        "type":"invalid_request_error",
        "param":"messages",
        "code":"context_length_exceeded"
    }}"#;

    #[test]
    fn context_length_error_yields_limit_and_used() {
        match parse_provider_error(400, CONTEXT_BODY) {
            ProviderError::ContextLengthExceeded { limit, used } => {
                assert_eq!(limit, 4097);
                assert_eq!(used, 12617);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unauthorized_maps_to_invalid_key() {
        let body = r#"{"error":{"message":"Invalid authentication","code":"invalid_api_key"}}"#;
        assert!(matches!(
            parse_provider_error(401, body),
            ProviderError::InvalidKey(_)
        ));
    }

    #[test]
    fn other_errors_keep_the_provider_message() {
        let body = r#"{"error":{"message":"The model is overloaded","code":"rate_limit"}}"#;
        match parse_provider_error(429, body) {
            ProviderError::Api(message) => assert_eq!(message, "The model is overloaded"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unparseable_bodies_fall_back_to_raw_text() {
        match parse_provider_error(502, "<html>bad gateway</html>") {
            ProviderError::Api(message) => assert!(message.contains("bad gateway")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn integer_extraction_handles_trailing_number() {
        assert_eq!(first_two_integers("limit 4097 used 12617"), Some((4097, 12617)));
        assert_eq!(first_two_integers("only 4097 here"), None);
        assert_eq!(first_two_integers("ends with 10 then 20"), Some((10, 20)));
        assert_eq!(first_two_integers("none"), None);
    }
}
