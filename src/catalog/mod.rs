//! Movie catalog domain types
//!
//! `Movie` is the canonical shape handed to API consumers. Engine documents are
//! read through [`MovieSource`], which mirrors the stored field names and never
//! carries embedding or pipeline bookkeeping fields.

mod request;

pub use request::{GenreBucket, RequestLimits, SearchRequest, SearchResult};

use serde::{Deserialize, Deserializer, Serialize};

/// A cast or crew credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub name: String,
    /// Character for cast members, job for crew members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
}

/// A movie as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<Credit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crew: Vec<Credit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Only present on search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Movie {
    /// Text used to seed a "more like this" semantic lookup.
    /// The overview is cut to keep the model input short.
    pub fn similarity_seed(&self, overview_chars: usize) -> String {
        let overview: String = self.overview.chars().take(overview_chars).collect();
        format!("{} {} {}", self.title, self.genres.join(" "), overview)
    }
}

/// Stored cast entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
}

/// Stored crew entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
}

/// Movie document as stored in the search index.
///
/// Unknown fields (embeddings, `model_id`, ingest errors) are ignored on read.
/// Incoming API payloads may use either the stored snake_case names or the
/// camelCase names of [`Movie`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieSource {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default, alias = "releaseDate", skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, alias = "voteAverage", skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    #[serde(
        default,
        alias = "voteCount",
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub vote_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    #[serde(default, alias = "posterPath", skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, alias = "backdropPath", skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, alias = "runtimeMinutes", skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(default, alias = "originalLanguage", skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<Vec<CastSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew: Option<Vec<CrewSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Counts indexed as floats (`1234.0`) are read and truncated; negative or
/// non-finite values are treated as absent
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let count = Option::<f64>::deserialize(deserializer)?;
    Ok(count.filter(|c| c.is_finite() && *c >= 0.0).map(|c| c as u64))
}

impl MovieSource {
    /// Attach an id (and optionally a relevance score) to produce an API movie
    pub fn into_movie(self, id: String, relevance_score: Option<f64>) -> Movie {
        Movie {
            id,
            title: self.title,
            overview: self.overview,
            genres: self.genres,
            release_date: self.release_date,
            runtime_minutes: self.runtime,
            original_language: self.original_language,
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            tagline: self.tagline,
            vote_average: self.vote_average.unwrap_or(0.0).clamp(0.0, 10.0),
            vote_count: self.vote_count.unwrap_or(0),
            popularity: self.popularity.unwrap_or(0.0).max(0.0),
            cast: self
                .cast
                .unwrap_or_default()
                .into_iter()
                .map(|c| Credit {
                    name: c.name,
                    role: c.character,
                    profile_path: c.profile_path,
                })
                .collect(),
            crew: self
                .crew
                .unwrap_or_default()
                .into_iter()
                .map(|c| Credit {
                    name: c.name,
                    role: c.job,
                    profile_path: None,
                })
                .collect(),
            keywords: self.keywords.unwrap_or_default(),
            relevance_score,
        }
    }
}
