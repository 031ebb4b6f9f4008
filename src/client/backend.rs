//! Where a client session sends its searches

use crate::catalog::{SearchRequest, SearchResult};
use crate::search::HybridSearcher;
use crate::server::ErrorBody;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Superseded by a newer request; never shown to the user
    #[error("request cancelled")]
    Cancelled,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("search failed: {0}")]
    Search(String),
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, FetchError>;
}

/// Query string for a request. Defaults are left out so that the server
/// applies its own.
pub fn query_pairs(request: &SearchRequest) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("q", request.query.clone()),
        ("page", request.page.to_string()),
        ("pageSize", request.page_size.to_string()),
    ];
    if !request.genres.is_empty() {
        pairs.push(("genres", request.genres.join(",")));
    }
    if let Some(min) = request.rating_min.filter(|r| *r > 0.0) {
        pairs.push(("ratingMin", min.to_string()));
    }
    if let Some(max) = request.rating_max {
        pairs.push(("ratingMax", max.to_string()));
    }
    if request.semantic_ratio > 0.0 {
        pairs.push(("semanticRatio", request.semantic_ratio.to_string()));
    }
    pairs
}

/// Searches a running API server over HTTP
pub struct HttpBackend {
    client: Client,
    search_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| FetchError::Transport(format!("invalid server url: {}", e)))?;
        // Without a trailing slash, join would replace the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base
            .join("search")
            .map_err(|e| FetchError::Transport(format!("invalid server url: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client, search_url })
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, FetchError> {
        let response = self
            .client
            .get(self.search_url.clone())
            .query(&query_pairs(request))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SearchResult>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// In-process searches, used by the CLI and tests
#[async_trait]
impl SearchBackend for HybridSearcher {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, FetchError> {
        HybridSearcher::search(self, request.clone())
            .await
            .map_err(|e| FetchError::Search(e.to_string()))
    }
}
