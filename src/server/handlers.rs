use super::AppState;
use crate::catalog::{GenreBucket, Movie, MovieSource, SearchRequest, SearchResult};
use crate::error::CineError;
use crate::search::HealthReport;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Raw `/search` parameters. Everything arrives as text so that unparseable
/// values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    semantic_ratio: Option<String>,
    /// Comma separated
    #[serde(default)]
    genres: Option<String>,
    #[serde(default)]
    rating_min: Option<String>,
    #[serde(default)]
    rating_max: Option<String>,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    page_size: Option<String>,
}

fn parse<T: FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

impl SearchParams {
    fn into_request(self, default_page_size: usize) -> SearchRequest {
        let page = parse::<i64>(&self.page).unwrap_or(1).max(1) as usize;
        let page_size = parse::<i64>(&self.page_size)
            .map(|s| s.max(1) as usize)
            .unwrap_or(default_page_size);
        let genres: Vec<String> = self
            .genres
            .as_deref()
            .map(|g| g.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        SearchRequest::new(self.q.unwrap_or_default())
            .with_semantic_ratio(parse(&self.semantic_ratio).unwrap_or(0.0))
            .with_genres(genres)
            .with_rating(parse(&self.rating_min), parse(&self.rating_max))
            .with_page(page, page_size)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarParams {
    #[serde(default)]
    limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarResponse {
    pub movies: Vec<Movie>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenresResponse {
    pub genres: Vec<GenreBucket>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<CineError> for ApiError {
    fn from(err: CineError) -> Self {
        match err {
            CineError::SearchUnavailable(message) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message,
            },
            CineError::NotFound { id } => Self::not_found(format!("Movie not found: {}", id)),
            other => {
                tracing::error!("Request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let searcher = state.searcher();
    let request = params.into_request(searcher.settings().default_page_size);
    let result = searcher.search(request).await?;
    Ok(Json(result))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    match state.searcher().get_movie(&id).await? {
        Some(movie) => Ok(Json(movie)),
        None => Err(CineError::NotFound { id }.into()),
    }
}

pub async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Json<SimilarResponse> {
    let limit = parse::<i64>(&params.limit).map(|l| l.max(1) as usize);
    let movies = state.searcher().similar(&id, limit).await;
    Json(SimilarResponse { movies })
}

pub async fn genres(State(state): State<AppState>) -> Json<GenresResponse> {
    Json(GenresResponse {
        genres: state.searcher().genres().await,
    })
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.searcher().health().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(movie): Json<MovieSource>,
) -> (StatusCode, Json<IngestResponse>) {
    match state.searcher().ingest(movie).await {
        Ok(id) => (
            StatusCode::OK,
            Json(IngestResponse {
                success: true,
                id: Some(id),
                message: Some("Movie indexed".to_string()),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(IngestResponse {
                success: false,
                id: None,
                message: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}
