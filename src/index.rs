//! Vector index client.
//!
//! REST client for a Pinecone-style index. All operations are scoped to
//! the caller's namespace; the index itself is shared across tenants.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::credentials::IndexCredentials;
use crate::error::ProviderError;
use crate::models::{ChunkMetadata, CollectionStatus, DocumentChunk, SourceRef};

/// Display ceiling reported alongside the live chunk count.
pub const MAX_COLLECTION_SIZE: u64 = 100;

const UPSERT_BATCH: usize = 100;

#[derive(Debug, Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: VectorMetadata,
}

/// Chunk metadata plus the chunk text, stored on the vector so query
/// results can cite sources without a second lookup.
#[derive(Debug, Serialize, Deserialize)]
struct VectorMetadata {
    text: String,
    #[serde(flatten)]
    chunk: ChunkMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    metadata: Option<VectorMetadata>,
}

pub struct VectorIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    namespace: String,
}

impl VectorIndex {
    pub fn new(http: reqwest::Client, credentials: &IndexCredentials) -> Self {
        Self {
            http,
            base_url: format!(
                "https://{}.svc.{}.pinecone.io",
                credentials.index_name, credentials.environment
            ),
            api_key: credentials.api_key.clone(),
            namespace: credentials.namespace.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }

    /// Upsert chunks with their embeddings, batched. `chunks` and
    /// `vectors` must be the same length and order.
    pub async fn upsert(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), ProviderError> {
        if chunks.len() != vectors.len() {
            return Err(ProviderError::Api(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let rows: Vec<UpsertVector> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, values)| UpsertVector {
                id: Uuid::new_v4().to_string(),
                values,
                metadata: VectorMetadata {
                    text: chunk.text,
                    chunk: chunk.metadata,
                },
            })
            .collect();

        for batch in rows.chunks(UPSERT_BATCH) {
            let response = self
                .post(
                    "/vectors/upsert",
                    json!({ "vectors": batch, "namespace": self.namespace }),
                )
                .await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api(format!(
                    "upsert failed ({}): {}",
                    status, body
                )));
            }
        }
        Ok(())
    }

    /// Live chunk count for this namespace. A namespace the index has
    /// never seen reports zero rather than an error.
    pub async fn status(&self) -> Result<CollectionStatus, ProviderError> {
        let response = self.post("/describe_index_stats", json!({})).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "describe_index_stats failed ({}): {}",
                status, body
            )));
        }

        let stats: IndexStats = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("bad stats response: {}", e)))?;

        Ok(CollectionStatus {
            size: namespace_size(&stats, &self.namespace),
            max: MAX_COLLECTION_SIZE,
        })
    }

    /// Delete every vector in this namespace. Deleting a namespace that
    /// does not exist is a no-op.
    pub async fn purge(&self) -> Result<(), ProviderError> {
        let response = self
            .post(
                "/vectors/delete",
                json!({ "deleteAll": true, "namespace": self.namespace }),
            )
            .await?;

        if response.status().as_u16() == 404 || response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api(format!(
            "purge failed ({}): {}",
            status, body
        )))
    }

    /// Nearest-neighbor search returning cited sources, best first.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: i64,
    ) -> Result<Vec<SourceRef>, ProviderError> {
        let response = self
            .post(
                "/query",
                json!({
                    "vector": vector,
                    "topK": top_k,
                    "namespace": self.namespace,
                    "includeMetadata": true,
                }),
            )
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "query failed ({}): {}",
                status, body
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("bad query response: {}", e)))?;

        Ok(parsed
            .matches
            .into_iter()
            .filter_map(|m| m.metadata)
            .map(|metadata| SourceRef {
                text: metadata.text,
                metadata: metadata.chunk,
            })
            .collect())
    }
}

fn namespace_size(stats: &IndexStats, namespace: &str) -> u64 {
    stats
        .namespaces
        .get(namespace)
        .map(|ns| ns.vector_count)
        .unwrap_or(0)
}
