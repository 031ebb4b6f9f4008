//! Hybrid search combining semantic and keyword ranking
//!
//! A request is served by an ordered list of strategies. The first strategy
//! that succeeds wins; every failure is logged and the next one is tried.
//! Only when the last strategy (always plain lexical) fails does the caller
//! see an error.

use crate::catalog::{GenreBucket, Movie, MovieSource, RequestLimits, SearchRequest, SearchResult};
use crate::config::Config;
use crate::engine::{EngineError, EngineQuery, RawSearchResponse, Ranking, RrfParams, SearchEngine};
use crate::error::{CineError, Result};
use crate::search::fusion::{fuse_hits, FusionConfig};
use crate::search::normalize::{movie_from_hit, normalize};
use crate::search::probe::ModelAvailabilityProbe;
use crate::search::query::{
    filter_clause, lexical_plan, relevance_plan, semantic_plan, LexicalPlan,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tunables the searcher needs, lifted out of [`Config`]
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_page_size: usize,
    pub limits: RequestLimits,
    pub rrf: RrfParams,
    pub facet_size: usize,
    pub genre_list_size: usize,
    pub model_id: String,
    pub ingest_pipeline: Option<String>,
    pub request_timeout: Duration,
    pub semantic_timeout: Duration,
    pub similar_default_limit: usize,
    pub similar_max_limit: usize,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = config.engine.ingest_pipeline.trim();
        Self {
            default_page_size: config.search.default_page_size,
            limits: RequestLimits {
                max_page_size: config.search.max_page_size,
                max_result_window: config.search.max_result_window,
            },
            rrf: RrfParams {
                rank_constant: config.search.rank_constant,
                rank_window_size: config.search.rank_window_size,
            },
            facet_size: config.search.facet_size,
            genre_list_size: config.search.genre_list_size,
            model_id: config.engine.model_id.clone(),
            ingest_pipeline: (!pipeline.is_empty()).then(|| pipeline.to_string()),
            request_timeout: config.engine.request_timeout(),
            semantic_timeout: config.engine.semantic_timeout(),
            similar_default_limit: config.search.similar_default_limit,
            similar_max_limit: config.search.similar_max_limit,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One way of ranking a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Lexical,
    Semantic,
    /// Lexical and semantic sub-searches fused by reciprocal rank
    Blended,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Lexical => "lexical",
            Strategy::Semantic => "semantic",
            Strategy::Blended => "blended",
        }
    }
}

/// Strategies to try, in order, for an effective ratio.
///
/// Every chain ends with [`Strategy::Lexical`].
pub fn strategy_chain(effective_ratio: f64, query_is_empty: bool) -> Vec<Strategy> {
    if query_is_empty || effective_ratio <= 0.0 {
        vec![Strategy::Lexical]
    } else if effective_ratio >= 1.0 {
        vec![Strategy::Semantic, Strategy::Lexical]
    } else {
        vec![Strategy::Blended, Strategy::Lexical]
    }
}

/// The total a page implies: a short page means the ranking ended on it.
fn settled_total(response: &RawSearchResponse, query: &EngineQuery) -> u64 {
    if response.hits.len() < query.size {
        let seen = query.from.saturating_add(response.hits.len()) as u64;
        response.total.min(seen)
    } else {
        response.total
    }
}

/// Engine health snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub engine: &'static str,
    pub semantic_available: bool,
    pub timestamp: String,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Hybrid searcher combining semantic and keyword ranking
pub struct HybridSearcher {
    engine: Arc<dyn SearchEngine>,
    probe: Arc<ModelAvailabilityProbe>,
    settings: SearchSettings,
    fusion: FusionConfig,
}

impl HybridSearcher {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        probe: Arc<ModelAvailabilityProbe>,
        settings: SearchSettings,
    ) -> Result<Self> {
        let fusion = FusionConfig::try_from(settings.rrf)
            .map_err(|e| CineError::Config(e.to_string()))?;

        Ok(Self {
            engine,
            probe,
            settings,
            fusion,
        })
    }

    /// Build a searcher and its availability probe from configuration
    pub fn from_config(engine: Arc<dyn SearchEngine>, config: &Config) -> Result<Self> {
        let settings = SearchSettings::from_config(config);
        let probe = Arc::new(ModelAvailabilityProbe::new(
            engine.clone(),
            settings.model_id.clone(),
            config.search.availability_ttl(),
        ));
        Self::new(engine, probe, settings)
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    pub fn probe(&self) -> &Arc<ModelAvailabilityProbe> {
        &self.probe
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Perform hybrid search.
    ///
    /// Out-of-range parameters are clamped. Semantic failures fall back to
    /// lexical ranking of the same request; only a failed lexical attempt
    /// surfaces, as [`CineError::SearchUnavailable`].
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let request = request.clamped(&self.settings.limits);
        let ratio = self.effective_ratio(&request).await;
        let chain = strategy_chain(ratio, request.trimmed_query().is_empty());

        for (attempt, strategy) in chain.iter().enumerate() {
            let started = Instant::now();
            match self.run(*strategy, &request).await {
                Ok(response) => {
                    let result = normalize(response, started.elapsed());
                    tracing::debug!(
                        "{} search for '{}' returned {} of {} in {}ms",
                        strategy.as_str(),
                        request.trimmed_query(),
                        result.movies.len(),
                        result.total,
                        result.latency_millis
                    );
                    return Ok(result);
                }
                Err(e) => match chain.get(attempt + 1) {
                    Some(next) => tracing::warn!(
                        "{} search failed, falling back to {}: {}",
                        strategy.as_str(),
                        next.as_str(),
                        e
                    ),
                    None => tracing::error!("{} search failed: {}", strategy.as_str(), e),
                },
            }
        }

        Err(CineError::search_unavailable())
    }

    /// The request's ratio if the semantic model can serve it, otherwise 0.
    ///
    /// The probe is not consulted when the ratio or the query rules out
    /// semantic ranking anyway.
    pub async fn effective_ratio(&self, request: &SearchRequest) -> f64 {
        if request.semantic_ratio <= 0.0 || request.trimmed_query().is_empty() {
            return 0.0;
        }
        if self.probe.is_semantic_available().await {
            request.semantic_ratio
        } else {
            0.0
        }
    }

    /// The engine query a strategy issues for a clamped request
    pub fn plan(&self, strategy: Strategy, request: &SearchRequest) -> EngineQuery {
        let text = request.trimmed_query();
        let ranking = match strategy {
            Strategy::Lexical => Ranking::Lexical(lexical_plan(text)),
            Strategy::Semantic => Ranking::Semantic(semantic_plan(text, &self.settings.model_id)),
            Strategy::Blended => Ranking::Fused {
                lexical: relevance_plan(text),
                semantic: semantic_plan(text, &self.settings.model_id),
                rrf: self.settings.rrf,
            },
        };
        let budget = match strategy {
            Strategy::Lexical => self.settings.request_timeout,
            Strategy::Semantic | Strategy::Blended => self.settings.semantic_timeout,
        };

        EngineQuery::new(ranking, budget)
            .with_filter(filter_clause(request))
            .with_page(request.offset(), request.page_size)
            .with_facets(self.settings.facet_size)
            .with_exact_total()
    }

    async fn run(
        &self,
        strategy: Strategy,
        request: &SearchRequest,
    ) -> std::result::Result<RawSearchResponse, EngineError> {
        let query = self.plan(strategy, request);
        if strategy != Strategy::Blended {
            return self.engine.search(&query).await;
        }

        let mut response = if self.engine.supports_native_fusion() {
            self.engine.search(&query).await?
        } else {
            self.fuse_locally(query.clone()).await?
        };
        // Only the top window of each sub-ranking is fused, while a native
        // engine counts every document either sub-search matched
        let fusable = (self.fusion.rank_window_size as u64).saturating_mul(2);
        response.total = settled_total(&response, &query).min(fusable);
        Ok(response)
    }

    /// Blended ranking for engines without native fusion: both sub-searches
    /// run concurrently over the top window, are fused here, then paged.
    async fn fuse_locally(
        &self,
        query: EngineQuery,
    ) -> std::result::Result<RawSearchResponse, EngineError> {
        let (lexical, semantic) = match &query.ranking {
            Ranking::Fused {
                lexical, semantic, ..
            } => (lexical.clone(), semantic.clone()),
            _ => return Err(EngineError::Unsupported("local fusion of a single ranking")),
        };

        let window = self.fusion.rank_window_size;
        let lexical_query = EngineQuery {
            ranking: Ranking::Lexical(LexicalPlan::Relevance(lexical)),
            from: 0,
            size: window,
            ..query.clone()
        };
        let semantic_query = EngineQuery {
            ranking: Ranking::Semantic(semantic),
            from: 0,
            size: window,
            genre_facets: None,
            ..query.clone()
        };

        let (lexical, semantic) = tokio::try_join!(
            self.engine.search(&lexical_query),
            self.engine.search(&semantic_query)
        )?;

        let fused = fuse_hits(vec![lexical.hits, semantic.hits], &self.fusion);
        let total = fused.len() as u64;
        let hits = fused
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .collect();

        Ok(RawSearchResponse {
            hits,
            total,
            genre_buckets: lexical.genre_buckets,
        })
    }

    /// Look up one movie; `Ok(None)` when the id is unknown
    pub async fn get_movie(&self, id: &str) -> Result<Option<Movie>> {
        match self.engine.get(id).await {
            Ok(hit) => Ok(hit.and_then(|hit| {
                movie_from_hit(hit).map(|mut movie| {
                    movie.relevance_score = None;
                    movie
                })
            })),
            Err(e) => {
                tracing::error!("Movie lookup for {} failed: {}", id, e);
                Err(CineError::search_unavailable())
            }
        }
    }

    /// Genre buckets over the whole catalog. Engine failures yield an empty list.
    pub async fn genres(&self) -> Vec<GenreBucket> {
        let query = EngineQuery::new(
            Ranking::Lexical(lexical_plan("")),
            self.settings.request_timeout,
        )
        .with_page(0, 0)
        .with_facets(self.settings.genre_list_size);

        match self.engine.search(&query).await {
            Ok(response) => response.genre_buckets,
            Err(e) => {
                tracing::error!("Genre listing failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Index a new movie through the ingest pipeline, returning its generated id
    pub async fn ingest(&self, movie: MovieSource) -> Result<String> {
        let id = format!("generated_{}", Uuid::new_v4().simple());
        let document = serde_json::to_value(&movie).map_err(|e| CineError::Json {
            source: e,
            context: format!("Failed to encode movie '{}'", movie.title),
        })?;

        self.engine
            .index(&id, &document, self.settings.ingest_pipeline.as_deref())
            .await
            .map_err(|e| {
                tracing::error!("Ingest of '{}' failed: {}", movie.title, e);
                CineError::Engine(e)
            })
    }

    /// Ping the engine and report semantic availability
    pub async fn health(&self) -> HealthReport {
        let engine = self.engine.name();
        let timestamp = Utc::now().to_rfc3339();
        match self.engine.ping().await {
            Ok(()) => HealthReport {
                status: "ok",
                engine,
                semantic_available: self.probe.is_semantic_available().await,
                timestamp,
            },
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                HealthReport {
                    status: "error",
                    engine,
                    semantic_available: false,
                    timestamp,
                }
            }
        }
    }
}
