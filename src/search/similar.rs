//! "More like this" lookups seeded from a stored movie

use crate::catalog::Movie;
use crate::engine::{EngineQuery, Ranking};
use crate::search::hybrid::HybridSearcher;
use crate::search::normalize::movies_from_hits;
use crate::search::query::{more_like_this_plan, similar_semantic_plan};

impl HybridSearcher {
    /// Clamp a requested similar-movies limit, applying the configured default
    pub fn similar_limit(&self, limit: Option<usize>) -> usize {
        let settings = self.settings();
        limit
            .unwrap_or(settings.similar_default_limit)
            .clamp(1, settings.similar_max_limit.max(1))
    }

    /// Movies similar to `id`, never including `id` itself.
    ///
    /// Semantic similarity is used when the model is available, term
    /// statistics otherwise or when the semantic call fails. Unknown ids and
    /// engine failures give an empty list.
    pub async fn similar(&self, id: &str, limit: Option<usize>) -> Vec<Movie> {
        let limit = self.similar_limit(limit);

        let movie = match self.get_movie(id).await {
            Ok(Some(movie)) => movie,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!("Similar lookup for {} failed: {}", id, e);
                return Vec::new();
            }
        };

        if self.probe().is_semantic_available().await {
            let query = EngineQuery::new(
                Ranking::Semantic(similar_semantic_plan(&movie, &self.settings().model_id)),
                self.settings().semantic_timeout,
            )
            .with_page(0, limit)
            .excluding(id);

            match self.engine().search(&query).await {
                Ok(response) => return movies_from_hits(response.hits),
                Err(e) => tracing::warn!(
                    "Semantic similar search for {} failed, falling back to more-like-this: {}",
                    id,
                    e
                ),
            }
        }

        let query = EngineQuery::new(
            Ranking::MoreLikeThis(more_like_this_plan(id)),
            self.settings().request_timeout,
        )
        .with_page(0, limit)
        .excluding(id);

        match self.engine().search(&query).await {
            Ok(response) => movies_from_hits(response.hits),
            Err(e) => {
                tracing::error!("More-like-this search for {} failed: {}", id, e);
                Vec::new()
            }
        }
    }
}
