//! Embedding client.
//!
//! Thin REST client for the OpenAI embeddings endpoint. Texts are sent
//! in batches and the returned vectors come back in input order.
//! Rate limits and server errors are retried with exponential backoff;
//! other client errors fail immediately.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::error::ProviderError;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const BATCH_SIZE: usize = 100;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Embed `texts`, preserving input order across batches.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = json!({ "model": self.model, "input": batch });
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let response = match self
                .http
                .post(EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(attempt, error = %e, "embedding request failed, retrying");
                    last_err = Some(ProviderError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let mut parsed: EmbeddingResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Api(format!("bad embedding response: {}", e)))?;

                // The API documents input order but indexes each row anyway.
                parsed.data.sort_by_key(|row| row.index);
                return Ok(parsed.data.into_iter().map(|row| row.embedding).collect());
            }

            if status.as_u16() == 401 {
                return Err(ProviderError::InvalidKey(
                    "Incorrect OpenAI API key provided".to_string(),
                ));
            }

            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::Api(format!(
                "embedding request failed ({}): {}",
                status, text
            ));
            if retryable_status(status) {
                warn!(attempt, %status, "embedding request rate limited, retrying");
                last_err = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Api("embedding failed after retries".to_string())))
    }
}

/// 429 and 5xx are transient; any other client error is not.
fn retryable_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Exponential backoff: 1s, 2s, 4s, capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(retryable_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!retryable_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!retryable_status(reqwest::StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(32));
    }
}
