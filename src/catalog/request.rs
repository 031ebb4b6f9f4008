use super::Movie;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounds applied to every incoming search request
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_page_size: usize,
    /// Pages are capped so that `offset + page_size` stays within this
    pub max_result_window: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_page_size: 50,
            max_result_window: 10_000,
        }
    }
}

/// A free-text search with filters and paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Empty means "browse by popularity"
    pub query: String,
    /// 0 = pure lexical, 1 = pure semantic, anything between is blended
    pub semantic_ratio: f64,
    /// Any-of genre filter; empty means no filter
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating_min: Option<f64>,
    #[serde(default)]
    pub rating_max: Option<f64>,
    pub page: usize,
    pub page_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            semantic_ratio: 0.0,
            genres: Vec::new(),
            rating_min: None,
            rating_max: None,
            page: 1,
            page_size: 24,
        }
    }

    pub fn with_semantic_ratio(mut self, ratio: f64) -> Self {
        self.semantic_ratio = ratio;
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rating(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.rating_min = min;
        self.rating_max = max;
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Correct out-of-range parameters instead of rejecting them.
    ///
    /// The ratio is forced into `[0, 1]` (NaN becomes 0), the page to at
    /// least 1 and the page size into `[1, max_page_size]`. The page is then
    /// capped to the last one that fits in `max_result_window`. Non-finite
    /// rating bounds and blank genre names are dropped.
    pub fn clamped(mut self, limits: &RequestLimits) -> Self {
        self.semantic_ratio = if self.semantic_ratio.is_nan() {
            0.0
        } else {
            self.semantic_ratio.clamp(0.0, 1.0)
        };
        self.page_size = self.page_size.clamp(1, limits.max_page_size.max(1));
        let last_page = (limits.max_result_window / self.page_size).max(1);
        self.page = self.page.clamp(1, last_page);
        self.rating_min = self.rating_min.filter(|r| r.is_finite());
        self.rating_max = self.rating_max.filter(|r| r.is_finite());
        self.genres = self
            .genres
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    pub fn trimmed_query(&self) -> &str {
        self.query.trim()
    }

    /// Zero-based index of the first hit on the requested page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// One facet bucket: a genre and how many matched documents carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreBucket {
    pub key: String,
    #[serde(rename = "docCount", alias = "doc_count")]
    pub doc_count: u64,
}

/// One page of ranked movies plus match statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub movies: Vec<Movie>,
    /// Exact number of matches across all pages
    pub total: u64,
    pub latency_millis: u64,
    #[serde(default)]
    pub genre_facets: BTreeMap<String, u64>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self {
            movies: Vec::new(),
            total: 0,
            latency_millis: 0,
            genre_facets: BTreeMap::new(),
        }
    }
}
