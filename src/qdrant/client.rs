//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::index::{IndexError, IndexFilter, IndexMatch, IndexPoint, VectorIndex};
use crate::qdrant::{
    filters::build_index_filter,
    payload::{build_payload, current_timestamp_rfc3339, point_id},
    types::{QdrantError, QueryResponse},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for one Qdrant collection.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
}

impl QdrantService {
    /// Construct a client for `collection` at `url`.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: impl Into<String>,
    ) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("summeryai/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        let collection = collection.into();
        tracing::debug!(
            url = %base_url,
            collection = %collection,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection,
        })
    }

    /// Construct a client from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, QdrantError> {
        Self::new(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            config.qdrant_collection_name.clone(),
        )
    }

    /// Name of the collection this client writes to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection when missing and make sure payload indexes exist.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), QdrantError> {
        self.create_collection_if_not_exists(vector_size).await?;
        self.ensure_payload_indexes().await
    }

    /// Create the collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            vector_size,
            "Creating collection"
        );
        self.create_collection(vector_size).await
    }

    /// Create or update the collection with the specified vector size.
    pub async fn create_collection(&self, vector_size: u64) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection ensured/created");
        })
        .await
    }

    /// Ensure payload indexes exist for the fields queries filter on.
    pub async fn ensure_payload_indexes(&self) -> Result<(), QdrantError> {
        let fields: [(&str, &str); 2] = [
            ("upload_session_id", "keyword"),
            ("file_name", "keyword"),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(
                    Method::PUT,
                    &format!("collections/{}/index", self.collection),
                )?
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(
                    collection = %self.collection,
                    field,
                    schema,
                    "Payload index ensured"
                );
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = %self.collection,
                    field,
                    schema,
                    "Payload index already exists"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = %self.collection, field, schema, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    /// Insert or replace a single point, waiting for Qdrant to apply it.
    pub async fn upsert_point(&self, point: &IndexPoint) -> Result<(), QdrantError> {
        let payload = build_payload(&point.id, &point.metadata, &current_timestamp_rfc3339());
        let body = json!({
            "points": [{
                "id": point_id(&point.id).to_string(),
                "vector": point.vector,
                "payload": payload,
            }]
        });

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                record_id = %point.id,
                "Point upserted"
            );
        })
        .await
    }

    /// Perform a similarity search, returning scored payloads.
    pub async fn search_points(
        &self,
        vector: Vec<f32>,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<IndexMatch>, QdrantError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter_value) = filter {
            body["filter"] = filter_value;
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let results = payload
            .result
            .into_points()
            .into_iter()
            .map(|point| {
                let metadata = point.payload.unwrap_or_default();
                IndexMatch {
                    record_id: metadata
                        .get("record_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    score: point.score,
                    metadata,
                }
            })
            .collect();

        Ok(results)
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantService {
    async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError> {
        if point.vector.is_empty() {
            return Err(IndexError::InvalidRequest(format!(
                "record {} has an empty vector",
                point.id
            )));
        }
        Ok(self.upsert_point(&point).await?)
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &IndexFilter,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        Ok(self
            .search_points(vector, build_index_filter(filter), top_k.max(1))
            .await?)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
