//! Content store client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::query::{ContentQuery, Filter};
use crate::config::ContentStoreConfig;
use crate::error::ContentError;

/// A write against the content store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(Value),
    CreateOrReplace(Value),
    Patch {
        id: String,
        set: Map<String, Value>,
        unset: Vec<String>,
    },
}

impl Mutation {
    pub fn patch(id: impl Into<String>) -> Self {
        Self::Patch {
            id: id.into(),
            set: Map::new(),
            unset: Vec::new(),
        }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Self::Patch { set, .. } = &mut self {
            set.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn unset(mut self, key: &str) -> Self {
        if let Self::Patch { unset, .. } = &mut self {
            unset.push(key.to_string());
        }
        self
    }

    /// Wire shape accepted by the mutate endpoint.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Create(doc) => json!({ "create": doc }),
            Self::CreateOrReplace(doc) => json!({ "createOrReplace": doc }),
            Self::Patch { id, set, unset } => {
                let mut patch = Map::new();
                patch.insert("id".to_string(), Value::from(id.clone()));
                if !set.is_empty() {
                    patch.insert("set".to_string(), Value::Object(set.clone()));
                }
                if !unset.is_empty() {
                    patch.insert("unset".to_string(), json!(unset));
                }
                json!({ "patch": patch })
            }
        }
    }
}

/// Handle to the document store. Constructed once at start-up and shared.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Execute a read query and return the raw JSON result.
    async fn fetch(&self, query: &ContentQuery) -> Result<Value, ContentError>;

    /// Apply mutations as one transaction.
    async fn mutate(&self, mutations: Vec<Mutation>) -> Result<(), ContentError>;

    /// Round-trip latency of a trivial query, for health checks.
    async fn ping(&self) -> Result<Duration, ContentError> {
        let start = Instant::now();
        self.fetch(&ContentQuery::count(Filter::of_type("caseStudy")))
            .await?;
        Ok(start.elapsed())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Value,
}

/// Sanity HTTP API client.
pub struct HttpContentClient {
    http: reqwest::Client,
    query_url: String,
    mutate_url: String,
    read_token: Option<String>,
    write_token: Option<String>,
}

impl HttpContentClient {
    pub fn new(config: &ContentStoreConfig, project_id: &str) -> Self {
        let host = if config.use_cdn { "apicdn" } else { "api" };
        let version = config.api_version.trim_start_matches('v');
        Self {
            http: reqwest::Client::new(),
            query_url: format!(
                "https://{project_id}.{host}.sanity.io/v{version}/data/query/{}",
                config.dataset
            ),
            mutate_url: format!(
                "https://{project_id}.api.sanity.io/v{version}/data/mutate/{}",
                config.dataset
            ),
            read_token: config.read_token.clone(),
            write_token: config.write_token.clone(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ContentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ContentError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ContentClient for HttpContentClient {
    #[tracing::instrument(skip_all)]
    async fn fetch(&self, query: &ContentQuery) -> Result<Value, ContentError> {
        let (text, params) = query.render();
        tracing::debug!(query = %text, param_count = params.len(), "content query");

        let mut request = self
            .http
            .post(&self.query_url)
            .json(&json!({ "query": text, "params": params }));
        if let Some(token) = &self.read_token {
            request = request.bearer_auth(token);
        }

        let response = Self::check(request.send().await?).await?;
        let body: QueryResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(body.result)
    }

    #[tracing::instrument(skip_all, fields(count = mutations.len()))]
    async fn mutate(&self, mutations: Vec<Mutation>) -> Result<(), ContentError> {
        let token = self
            .write_token
            .as_ref()
            .ok_or(ContentError::ReadOnly("SANITY_API_WRITE_TOKEN is not set"))?;

        let body = json!({
            "mutations": mutations.iter().map(Mutation::to_json).collect::<Vec<_>>()
        });
        let response = self
            .http
            .post(&self.mutate_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
