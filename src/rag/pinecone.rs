//! Pinecone REST client.
//!
//! `PineconeControl` talks to the control plane (describe/create index);
//! `PineconeIndex` talks to one index's data-plane host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::store::{ChunkMatch, IndexedChunk, VectorIndex};
use super::RetrievalError;
use crate::core::config::RagConfig;

const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub dimension: Option<u32>,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
}

fn build_client(timeout: Duration) -> Result<Client, RetrievalError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RetrievalError::Index(e.to_string()))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, RetrievalError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RetrievalError::Index(format!("{}: {}", status, body)));
    }
    Ok(response.json::<Value>().await?)
}

#[derive(Clone)]
pub struct PineconeControl {
    base_url: String,
    api_key: String,
    client: Client,
}

impl PineconeControl {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RetrievalError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: build_client(timeout)?,
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    /// `None` when the index does not exist.
    pub async fn describe_index(
        &self,
        name: &str,
    ) -> Result<Option<IndexDescription>, RetrievalError> {
        let url = format!("{}/indexes/{}", self.base_url, name);
        let response = self.request(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload = read_json(response).await?;
        serde_json::from_value(payload)
            .map(Some)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))
    }

    pub async fn create_serverless_index(
        &self,
        name: &str,
        dimension: u32,
        cloud: &str,
        region: &str,
    ) -> Result<(), RetrievalError> {
        let url = format!("{}/indexes", self.base_url);
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": cloud, "region": region } }
        });
        let response = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        read_json(response).await?;
        Ok(())
    }

    /// Creates the index if missing and waits until it reports ready.
    pub async fn ensure_index(
        &self,
        config: &RagConfig,
        poll_interval: Duration,
        max_polls: usize,
    ) -> Result<IndexDescription, RetrievalError> {
        if self.describe_index(&config.index_name).await?.is_none() {
            tracing::info!(
                index = %config.index_name,
                dimension = config.embedding_dimension,
                "Creating vector index"
            );
            self.create_serverless_index(
                &config.index_name,
                config.embedding_dimension,
                &config.cloud,
                &config.region,
            )
            .await?;
        }

        for _ in 0..max_polls.max(1) {
            if let Some(description) = self.describe_index(&config.index_name).await? {
                if description.status.ready {
                    if let Some(dimension) = description.dimension {
                        if dimension != config.embedding_dimension {
                            tracing::warn!(
                                index = %description.name,
                                index_dimension = dimension,
                                configured_dimension = config.embedding_dimension,
                                "Index dimension differs from embedding dimension"
                            );
                        }
                    }
                    return Ok(description);
                }
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(RetrievalError::Index(format!(
            "index '{}' did not become ready",
            config.index_name
        )))
    }
}

#[derive(Clone)]
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    client: Client,
}

impl PineconeIndex {
    pub fn new(
        host: &str,
        api_key: &str,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        Ok(Self {
            host: normalize_host(host),
            api_key: api_key.to_string(),
            namespace: namespace.filter(|ns| !ns.trim().is_empty()),
            client: build_client(timeout)?,
        })
    }

    /// Uses `index_host` when configured, otherwise looks the host up by name.
    pub async fn from_config(config: &RagConfig) -> Result<Self, RetrievalError> {
        let api_key = config
            .pinecone_api_key
            .as_deref()
            .ok_or_else(|| RetrievalError::Index("pinecone api key is not set".to_string()))?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let host = match config.index_host.as_deref().filter(|h| !h.trim().is_empty()) {
            Some(host) => host.to_string(),
            None => {
                let control = PineconeControl::new(&config.control_plane_url, api_key, timeout)?;
                control
                    .describe_index(&config.index_name)
                    .await?
                    .ok_or_else(|| {
                        RetrievalError::Index(format!(
                            "index '{}' does not exist",
                            config.index_name
                        ))
                    })?
                    .host
            }
        };

        Self::new(&host, api_key, config.namespace.clone(), timeout)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    fn with_namespace(&self, mut body: Value) -> Value {
        if let (Some(namespace), Some(obj)) = (&self.namespace, body.as_object_mut()) {
            obj.insert("namespace".to_string(), json!(namespace));
        }
        body
    }
}

fn metadata_string(metadata: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    metadata
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkMatch>, RetrievalError> {
        let body = self.with_namespace(json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        }));

        let response = self.post("/query").json(&body).send().await?;
        let payload = read_json(response).await?;

        let Some(matches) = payload.get("matches").and_then(|m| m.as_array()) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::with_capacity(matches.len());
        for item in matches {
            let metadata = item.get("metadata").and_then(|m| m.as_object());
            let Some(text) = metadata_string(metadata, "text") else {
                tracing::debug!("Skipping match without text metadata");
                continue;
            };
            let score = item.get("score").and_then(|s| s.as_f64()).ok_or_else(|| {
                RetrievalError::MalformedResponse("match without score".to_string())
            })?;

            hits.push(ChunkMatch {
                id: item
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score,
                text,
                source: metadata_string(metadata, "source")
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
        Ok(hits)
    }

    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<usize, RetrievalError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors: Vec<Value> = chunks
            .into_iter()
            .map(|chunk| {
                let mut metadata = chunk.metadata;
                metadata.insert("text".to_string(), json!(chunk.text));
                metadata.insert("source".to_string(), json!(chunk.source));
                json!({
                    "id": chunk.id,
                    "values": chunk.values,
                    "metadata": metadata,
                })
            })
            .collect();
        let sent = vectors.len();

        let body = self.with_namespace(json!({ "vectors": vectors }));
        let response = self.post("/vectors/upsert").json(&body).send().await?;
        let payload = read_json(response).await?;

        Ok(payload
            .get("upsertedCount")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(sent))
    }
}
