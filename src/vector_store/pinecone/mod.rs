
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChunkMetadata, SearchMatch, VectorIndex, VectorRecord};
use crate::PaddleError;
use crate::config::PineconeConfig;
use crate::http::{JsonClient, endpoint};

const API_VERSION: &str = "2024-07";
const READY_POLL_ATTEMPTS: u32 = 30;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Client for a single Pinecone index and namespace
#[derive(Debug)]
pub struct PineconeClient {
    http: JsonClient,
    api_key: String,
    control_url: Url,
    index_name: String,
    namespace: String,
    dimension: u32,
    metric: String,
    cloud: String,
    region: String,
    upsert_batch_size: usize,
    host: OnceLock<Url>,
    ready_poll_interval: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: u32,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

/// Index description returned by the control plane
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub dimension: Option<u32>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub status: Option<IndexStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

impl IndexDescription {
    fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }
}

impl PineconeClient {
    #[inline]
    pub fn new(config: &PineconeConfig, api_key: String) -> Result<Self> {
        let control_url =
            Url::parse(&config.control_plane_url).context("Invalid Pinecone control plane URL")?;

        let host = OnceLock::new();
        if let Some(index_host) = config.index_host.as_deref() {
            let url = parse_host(index_host)?;
            let _ = host.set(url);
        }

        Ok(Self {
            http: JsonClient::new(
                Duration::from_secs(config.timeout_seconds),
                config.retry_attempts,
            ),
            api_key,
            control_url,
            index_name: config.index_name.clone(),
            namespace: config.namespace.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            upsert_batch_size: config.upsert_batch_size.max(1),
            host,
            ready_poll_interval: READY_POLL_INTERVAL,
        })
    }

    #[inline]
    pub fn with_http_client(mut self, http: JsonClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    #[inline]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn headers(&self) -> [(&str, &str); 2] {
        [
            ("Api-Key", self.api_key.as_str()),
            ("X-Pinecone-API-Version", API_VERSION),
        ]
    }

    /// List the indexes visible to this API key
    #[inline]
    pub fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let url = endpoint(&self.control_url, "indexes")?;
        let list: IndexList = self
            .http
            .get_json(&url, &self.headers())
            .context("Failed to list Pinecone indexes")?;
        Ok(list.indexes)
    }

    #[inline]
    pub fn describe_index(&self) -> Result<IndexDescription> {
        let url = endpoint(&self.control_url, &format!("indexes/{}", self.index_name))?;
        self.http
            .get_json(&url, &self.headers())
            .with_context(|| format!("Failed to describe index '{}'", self.index_name))
    }

    /// Create the serverless index if it does not exist and wait until it is ready
    #[inline]
    pub fn ensure_index(&self) -> Result<IndexDescription> {
        if let Some(existing) = self
            .list_indexes()?
            .into_iter()
            .find(|index| index.name == self.index_name)
        {
            debug!("Index '{}' already exists", self.index_name);
            if let Some(dimension) = existing.dimension {
                if dimension != self.dimension {
                    warn!(
                        "Index '{}' has dimension {} but {} is configured",
                        self.index_name, dimension, self.dimension
                    );
                }
            }
            self.remember_host(&existing)?;
            return Ok(existing);
        }

        info!(
            "Creating index '{}' ({} dimensions, {} metric, {}/{})",
            self.index_name, self.dimension, self.metric, self.cloud, self.region
        );

        let request = CreateIndexRequest {
            name: &self.index_name,
            dimension: self.dimension,
            metric: &self.metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        let url = endpoint(&self.control_url, "indexes")?;
        let mut description: IndexDescription = self
            .http
            .post_json(&url, &self.headers(), &request)
            .with_context(|| format!("Failed to create index '{}'", self.index_name))?;

        let mut attempts = 0;
        while !description.is_ready() {
            attempts += 1;
            if attempts > READY_POLL_ATTEMPTS {
                return Err(anyhow!(
                    "Index '{}' was not ready after {} checks",
                    self.index_name,
                    READY_POLL_ATTEMPTS
                ));
            }
            debug!("Waiting for index '{}' to become ready", self.index_name);
            std::thread::sleep(self.ready_poll_interval);
            description = self.describe_index()?;
        }

        info!("Index '{}' is ready", self.index_name);
        self.remember_host(&description)?;
        Ok(description)
    }

    fn remember_host(&self, description: &IndexDescription) -> Result<()> {
        if self.host.get().is_none() && !description.host.is_empty() {
            let _ = self.host.set(parse_host(&description.host)?);
        }
        Ok(())
    }

    /// Data plane URL, resolved through the control plane on first use
    fn data_plane(&self) -> Result<Url> {
        if let Some(host) = self.host.get() {
            return Ok(host.clone());
        }

        let description = self.describe_index()?;
        if description.host.is_empty() {
            return Err(anyhow!(
                "Index '{}' has no host yet; is it still initializing?",
                self.index_name
            ));
        }
        let host = parse_host(&description.host)?;
        debug!("Resolved index '{}' host to {}", self.index_name, host);
        Ok(self.host.get_or_init(|| host).clone())
    }

    fn query_matches(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>> {
        let url = endpoint(&self.data_plane()?, "query")?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: &self.namespace,
        };

        let response: QueryResponse = self
            .http
            .post_json(&url, &self.headers(), &request)
            .context("Pinecone query failed")?;

        let mut matches = Vec::with_capacity(response.matches.len());
        for hit in response.matches {
            let Some(raw) = hit.metadata else {
                warn!("Match {} has no metadata, skipping", hit.id);
                continue;
            };
            match serde_json::from_value::<ChunkMetadata>(raw) {
                Ok(metadata) => matches.push(SearchMatch {
                    id: hit.id,
                    score: hit.score,
                    metadata,
                }),
                Err(e) => warn!("Match {} has unusable metadata ({}), skipping", hit.id, e),
            }
        }

        debug!("Query returned {} usable matches", matches.len());
        Ok(matches)
    }

    fn upsert_records(&self, records: &[VectorRecord]) -> Result<usize> {
        let url = endpoint(&self.data_plane()?, "vectors/upsert")?;
        let mut upserted = 0;

        for batch in records.chunks(self.upsert_batch_size) {
            if let Some(bad) = batch
                .iter()
                .find(|r| r.values.len() != self.dimension as usize)
            {
                return Err(anyhow!(
                    "Vector {} has {} dimensions, index expects {}",
                    bad.id,
                    bad.values.len(),
                    self.dimension
                ));
            }

            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|record| UpsertVector {
                        id: &record.id,
                        values: &record.values,
                        metadata: &record.metadata,
                    })
                    .collect(),
                namespace: &self.namespace,
            };

            let response: UpsertResponse = self
                .http
                .post_json(&url, &self.headers(), &request)
                .with_context(|| format!("Failed to upsert batch of {} vectors", batch.len()))?;
            upserted += response.upserted_count;
        }

        debug!("Upserted {} vectors", upserted);
        Ok(upserted)
    }

    fn delete_namespace(&self) -> Result<()> {
        let url = endpoint(&self.data_plane()?, "vectors/delete")?;
        let request = DeleteRequest {
            delete_all: true,
            namespace: &self.namespace,
        };

        let _: serde_json::Value = self
            .http
            .post_json(&url, &self.headers(), &request)
            .context("Failed to delete vectors")?;

        info!(
            "Deleted all vectors from index '{}' namespace '{}'",
            self.index_name, self.namespace
        );
        Ok(())
    }
}

impl VectorIndex for PineconeClient {
    #[inline]
    fn upsert(&self, records: &[VectorRecord]) -> crate::Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.upsert_records(records)
            .map_err(|e| PaddleError::upstream(&e))
    }

    #[inline]
    fn query(&self, vector: &[f32], top_k: usize) -> crate::Result<Vec<SearchMatch>> {
        self.query_matches(vector, top_k)
            .map_err(|e| PaddleError::upstream(&e))
    }

    #[inline]
    fn delete_all(&self) -> crate::Result<()> {
        self.delete_namespace().map_err(|e| PaddleError::upstream(&e))
    }
}

/// Index hosts come back without a scheme
fn parse_host(host: &str) -> Result<Url> {
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Url::parse(&with_scheme).with_context(|| format!("Invalid index host: {}", host))
}
