//! Search engine collaborator
//!
//! The core never speaks an engine's wire format directly. It hands an
//! [`EngineQuery`] to a [`SearchEngine`] and gets back a [`RawSearchResponse`],
//! the one canonical shape every adapter translates its native response into.

pub mod dsl;
mod elastic;

pub use elastic::ElasticEngine;

use crate::catalog::GenreBucket;
use crate::search::query::{
    FilterClause, LexicalPlan, MoreLikeThisPlan, RelevancePlan, SemanticPlan,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("engine request timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine unreachable: {0}")]
    Unavailable(String),

    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("resource not found")]
    NotFound,

    #[error("unexpected engine response: {0}")]
    Decode(String),

    #[error("operation not supported by this engine: {0}")]
    Unsupported(&'static str),
}

impl EngineError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Timeout(_) | EngineError::Unavailable(_) => true,
            EngineError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            EngineError::NotFound | EngineError::Decode(_) | EngineError::Unsupported(_) => false,
        }
    }
}

/// Reciprocal rank fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfParams {
    pub rank_constant: u32,
    /// Only the top `rank_window_size` of each sub-ranking are fused
    pub rank_window_size: usize,
}

impl Default for RrfParams {
    fn default() -> Self {
        Self {
            rank_constant: 60,
            rank_window_size: 100,
        }
    }
}

/// How hits are scored and ordered
#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    Lexical(LexicalPlan),
    Semantic(SemanticPlan),
    /// Both plans as sub-searches of one request, fused by reciprocal rank
    Fused {
        lexical: RelevancePlan,
        semantic: SemanticPlan,
        rrf: RrfParams,
    },
    MoreLikeThis(MoreLikeThisPlan),
}

/// A fully described search call
#[derive(Debug, Clone, PartialEq)]
pub struct EngineQuery {
    pub ranking: Ranking,
    pub post_filter: FilterClause,
    pub exclude_ids: Vec<String>,
    pub from: usize,
    pub size: usize,
    /// Request an exact hit count rather than an estimate
    pub exact_total: bool,
    /// Number of genre buckets to aggregate, if any
    pub genre_facets: Option<usize>,
    /// Request timeout budget
    pub budget: Duration,
}

impl EngineQuery {
    pub fn new(ranking: Ranking, budget: Duration) -> Self {
        Self {
            ranking,
            post_filter: FilterClause::default(),
            exclude_ids: Vec::new(),
            from: 0,
            size: 10,
            exact_total: false,
            genre_facets: None,
            budget,
        }
    }

    pub fn with_filter(mut self, filter: FilterClause) -> Self {
        self.post_filter = filter;
        self
    }

    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn with_facets(mut self, buckets: usize) -> Self {
        self.genre_facets = Some(buckets);
        self
    }

    pub fn with_exact_total(mut self) -> Self {
        self.exact_total = true;
        self
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_ids.push(id.into());
        self
    }
}

/// A single hit in engine order
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: serde_json::Value,
}

/// Canonical engine response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchResponse {
    pub hits: Vec<RawHit>,
    pub total: u64,
    pub genre_buckets: Vec<GenreBucket>,
}

/// Deployment state of the semantic model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDeployment {
    Started,
    /// Known to the engine but not serving; carries the reported state
    NotStarted(String),
    Missing,
}

#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Short engine name for health reporting
    fn name(&self) -> &'static str;

    /// Whether [`Ranking::Fused`] can be executed as a single request.
    /// When false the caller fuses sub-searches itself.
    fn supports_native_fusion(&self) -> bool {
        true
    }

    async fn search(&self, query: &EngineQuery) -> Result<RawSearchResponse, EngineError>;

    async fn model_deployment(&self, model_id: &str) -> Result<ModelDeployment, EngineError>;

    /// Fetch one document by id; `Ok(None)` when it does not exist
    async fn get(&self, id: &str) -> Result<Option<RawHit>, EngineError>;

    /// Index a document through the ingest pipeline, returning its id
    async fn index(
        &self,
        id: &str,
        document: &serde_json::Value,
        pipeline: Option<&str>,
    ) -> Result<String, EngineError>;

    async fn ping(&self) -> Result<(), EngineError>;
}
