//! Result normalizer: canonical engine responses into API results

use crate::catalog::{GenreBucket, Movie, MovieSource, SearchResult};
use crate::engine::{RawHit, RawSearchResponse};
use std::collections::BTreeMap;
use std::time::Duration;

/// Map one hit into a movie. Hits whose source cannot be read as a movie are
/// skipped with a warning rather than failing the whole page.
pub fn movie_from_hit(hit: RawHit) -> Option<Movie> {
    match serde_json::from_value::<MovieSource>(hit.source) {
        Ok(source) => Some(source.into_movie(hit.id, hit.score)),
        Err(e) => {
            tracing::warn!("Skipping unreadable document {}: {}", hit.id, e);
            None
        }
    }
}

pub fn movies_from_hits(hits: Vec<RawHit>) -> Vec<Movie> {
    hits.into_iter().filter_map(movie_from_hit).collect()
}

pub fn genre_facets(buckets: &[GenreBucket]) -> BTreeMap<String, u64> {
    buckets
        .iter()
        .map(|b| (b.key.clone(), b.doc_count))
        .collect()
}

/// Shape a raw response into a [`SearchResult`], stamping the given latency.
/// Skipped hits are taken out of the total as well.
pub fn normalize(response: RawSearchResponse, latency: Duration) -> SearchResult {
    let returned = response.hits.len();
    let movies = movies_from_hits(response.hits);
    let skipped = (returned - movies.len()) as u64;

    SearchResult {
        genre_facets: genre_facets(&response.genre_buckets),
        total: response.total.saturating_sub(skipped),
        movies,
        latency_millis: latency.as_millis().min(u64::MAX as u128) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, source: serde_json::Value) -> RawHit {
        RawHit {
            id: id.to_string(),
            score: Some(4.2),
            source,
        }
    }

    #[test]
    fn test_normalize_response() {
        let response = RawSearchResponse {
            hits: vec![
                hit(
                    "272",
                    json!({"title": "Batman Begins", "genres": ["Action"], "vote_average": 7.7,
                           "title_embedding": {"bat": 2.0}}),
                ),
                hit("155", json!({"title": "The Dark Knight"})),
            ],
            total: 57,
            genre_buckets: vec![
                GenreBucket {
                    key: "Action".to_string(),
                    doc_count: 40,
                },
                GenreBucket {
                    key: "Crime".to_string(),
                    doc_count: 22,
                },
            ],
        };

        let result = normalize(response, Duration::from_millis(35));
        assert_eq!(result.total, 57);
        assert_eq!(result.latency_millis, 35);
        assert_eq!(result.movies.len(), 2);
        assert_eq!(result.movies[0].id, "272");
        assert_eq!(result.movies[0].relevance_score, Some(4.2));
        assert_eq!(result.genre_facets["Crime"], 22);

        let value = serde_json::to_value(&result).unwrap();
        assert!(value["movies"][0].get("title_embedding").is_none());
        assert_eq!(value["genreFacets"]["Action"], 40);
    }

    #[test]
    fn test_skipped_hits_leave_the_total() {
        let response = RawSearchResponse {
            hits: vec![
                hit("1", json!({"title": "Alien"})),
                hit("2", json!({"vote_count": 5})),
            ],
            total: 2,
            genre_buckets: Vec::new(),
        };

        let result = normalize(response, Duration::ZERO);
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn test_unreadable_hit_skipped() {
        let movies = movies_from_hits(vec![
            hit("1", json!({"overview": "no title"})),
            hit("2", json!({"title": "Alien"})),
        ]);
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Alien");
    }
}
