//! HTTP adapter for Elasticsearch and OpenSearch clusters

use super::dsl;
use super::{EngineError, EngineQuery, ModelDeployment, RawHit, RawSearchResponse, SearchEngine};
use crate::config::{EngineConfig, EngineKind};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Pause between internal retries, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Search engine reached over its REST API
pub struct ElasticEngine {
    client: Client,
    base_url: Url,
    kind: EngineKind,
    index: String,
    username: String,
    password: Option<String>,
    max_retries: u32,
    request_timeout: Duration,
}

impl ElasticEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| EngineError::Unavailable(format!("invalid engine url: {}", e)))?;

        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("cannot build http client: {}", e)))?;

        tracing::info!(
            "Using {} at {} (index '{}')",
            config.kind.as_str(),
            base_url,
            config.index
        );

        Ok(Self {
            client,
            base_url,
            kind: config.kind,
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password(),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                EngineError::Unavailable(format!("engine url cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying transient failures up to `max_retries` times.
    ///
    /// `budget` bounds the whole exchange, retries and backoff included. A
    /// retry that could not start before the budget runs out is not made.
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        budget: Duration,
    ) -> Result<Value, EngineError> {
        let deadline = Instant::now() + budget;
        let mut attempt = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self
                .send_once(method.clone(), url.clone(), query, body, remaining)
                .await
            {
                Ok(value) => return Ok(value),
                Err(EngineError::Timeout(_)) if attempt >= self.max_retries => {
                    return Err(EngineError::Timeout(budget));
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = RETRY_BACKOFF * attempt;
                    if Instant::now() + backoff >= deadline {
                        tracing::warn!(
                            "Engine request {} {} failed ({}), no budget left to retry",
                            method,
                            url.path(),
                            e
                        );
                        return Err(match e {
                            EngineError::Timeout(_) => EngineError::Timeout(budget),
                            other => other,
                        });
                    }
                    tracing::warn!(
                        "Engine request {} {} failed ({}), retry {}/{}",
                        method,
                        url.path(),
                        e,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        budget: Duration,
    ) -> Result<Value, EngineError> {
        let mut request = self
            .client
            .request(method, url)
            .timeout(budget)
            .query(query);
        if let Some(password) = &self.password {
            request = request.basic_auth(&self.username, Some(password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout(budget)
            } else {
                EngineError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout(budget)
            } else {
                EngineError::Decode(e.to_string())
            }
        })
    }
}

#[async_trait]
impl SearchEngine for ElasticEngine {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn supports_native_fusion(&self) -> bool {
        self.kind == EngineKind::Elasticsearch
    }

    async fn search(&self, query: &EngineQuery) -> Result<RawSearchResponse, EngineError> {
        let body = dsl::render_search_body(query, self.kind, &self.index)?;
        tracing::debug!("Search body: {}", body);
        let url = self.endpoint(&[self.index.as_str(), "_search"])?;
        let response = self
            .send(Method::POST, url, &[], Some(&body), query.budget)
            .await?;
        dsl::decode_search_response(&response)
    }

    async fn model_deployment(&self, model_id: &str) -> Result<ModelDeployment, EngineError> {
        let url = match self.kind {
            EngineKind::Elasticsearch => {
                self.endpoint(&["_ml", "trained_models", model_id, "_stats"])?
            }
            EngineKind::Opensearch => self.endpoint(&["_plugins", "_ml", "models", model_id])?,
        };
        match self
            .send(Method::GET, url, &[], None, self.request_timeout)
            .await
        {
            Ok(body) => Ok(dsl::decode_model_status(&body, self.kind)),
            Err(EngineError::NotFound) => Ok(ModelDeployment::Missing),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<RawHit>, EngineError> {
        let url = self.endpoint(&[self.index.as_str(), "_doc", id])?;
        match self
            .send(Method::GET, url, &[], None, self.request_timeout)
            .await
        {
            Ok(body) => dsl::decode_document(&body),
            Err(EngineError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn index(
        &self,
        id: &str,
        document: &Value,
        pipeline: Option<&str>,
    ) -> Result<String, EngineError> {
        let url = self.endpoint(&[self.index.as_str(), "_doc", id])?;
        let mut params = vec![("refresh", "false")];
        if let Some(pipeline) = pipeline {
            params.push(("pipeline", pipeline));
        }
        let response = self
            .send(Method::PUT, url, &params, Some(document), self.request_timeout)
            .await?;
        Ok(response
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        let url = self.endpoint(&[])?;
        self.send(Method::GET, url, &[], None, self.request_timeout)
            .await
            .map(|_| ())
    }
}
