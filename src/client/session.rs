//! Client search state machine
//!
//! [`SearchSession::handle`] is the only way state changes. It never performs
//! I/O; it returns [`Effect`]s (start a timer, cancel a fetch, start a fetch)
//! for a driver to carry out. Results come back as events tagged with the
//! [`RequestToken`] they were issued under, and anything not tagged with the
//! current token is dropped without touching state.

use super::backend::FetchError;
use crate::catalog::{Movie, SearchRequest, SearchResult};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Searching,
    Ready,
    /// Last fetch failed; previous results stay visible
    Error(String),
}

/// Identifies one dispatched fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Results replace the current list
    Fresh,
    /// Results are concatenated after the current list
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub genres: BTreeSet<String>,
    /// 0 means no lower bound
    pub rating_min: f64,
    pub semantic_ratio: f64,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            genres: BTreeSet::new(),
            rating_min: 0.0,
            semantic_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    token: RequestToken,
    mode: FetchMode,
    page: usize,
}

/// Everything a UI renders from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSearchState {
    pub phase: Phase,
    /// Text as typed, before debouncing
    pub input: String,
    /// Text of the last dispatched search
    pub query: String,
    pub filters: Filters,
    pub page: usize,
    pub page_size: usize,
    pub movies: Vec<Movie>,
    pub total: u64,
    pub has_more: bool,
    pub genre_facets: BTreeMap<String, u64>,
    pub latency_millis: Option<u64>,
    pub focused: bool,
    in_flight: Option<InFlight>,
}

impl ClientSearchState {
    fn new(page_size: usize) -> Self {
        Self {
            phase: Phase::Idle,
            input: String::new(),
            query: String::new(),
            filters: Filters::default(),
            page: 1,
            page_size,
            movies: Vec::new(),
            total: 0,
            has_more: false,
            genre_facets: BTreeMap::new(),
            latency_millis: None,
            focused: false,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<RequestToken> {
        self.in_flight.map(|f| f.token)
    }

    pub fn is_searching(&self) -> bool {
        self.phase == Phase::Searching
    }
}

/// Something the user did
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Input(String),
    ToggleGenre(String),
    ClearGenres,
    SetRatingMin(f64),
    SetSemanticRatio(f64),
    LoadMore,
    /// Search again with the current query and filters
    Refresh,
    Focus,
    Blur,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    User(UserAction),
    /// The debounce timer started under `generation` fired
    DebounceElapsed { generation: u64 },
    FetchSucceeded {
        token: RequestToken,
        result: SearchResult,
    },
    FetchFailed {
        token: RequestToken,
        error: FetchError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace any pending debounce timer with a new one
    StartDebounce { generation: u64, delay: Duration },
    Cancel(RequestToken),
    Fetch {
        token: RequestToken,
        request: SearchRequest,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub page_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            page_size: 24,
        }
    }
}

pub struct SearchSession {
    config: SessionConfig,
    state: ClientSearchState,
    next_token: u64,
    debounce_generation: u64,
}

impl SearchSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: ClientSearchState::new(config.page_size.max(1)),
            config,
            next_token: 0,
            debounce_generation: 0,
        }
    }

    pub fn state(&self) -> &ClientSearchState {
        &self.state
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::User(action) => self.on_action(action),
            SessionEvent::DebounceElapsed { generation } => {
                if generation != self.debounce_generation || self.state.input == self.state.query
                {
                    return Vec::new();
                }
                self.state.query = self.state.input.clone();
                self.fetch(FetchMode::Fresh)
            }
            SessionEvent::FetchSucceeded { token, result } => {
                self.on_success(token, result);
                Vec::new()
            }
            SessionEvent::FetchFailed { token, error } => {
                self.on_failure(token, error);
                Vec::new()
            }
        }
    }

    fn on_action(&mut self, action: UserAction) -> Vec<Effect> {
        match action {
            UserAction::Input(text) => {
                self.state.input = text;
                self.debounce_generation += 1;
                vec![Effect::StartDebounce {
                    generation: self.debounce_generation,
                    delay: self.config.debounce,
                }]
            }
            UserAction::ToggleGenre(genre) => {
                if !self.state.filters.genres.remove(&genre) {
                    self.state.filters.genres.insert(genre);
                }
                self.fetch(FetchMode::Fresh)
            }
            UserAction::ClearGenres => {
                self.state.filters.genres.clear();
                self.fetch(FetchMode::Fresh)
            }
            UserAction::SetRatingMin(rating) => {
                self.state.filters.rating_min = if rating.is_finite() { rating } else { 0.0 };
                self.fetch(FetchMode::Fresh)
            }
            UserAction::SetSemanticRatio(ratio) => {
                self.state.filters.semantic_ratio = if ratio.is_nan() {
                    0.0
                } else {
                    ratio.clamp(0.0, 1.0)
                };
                self.fetch(FetchMode::Fresh)
            }
            UserAction::LoadMore => {
                if self.state.phase == Phase::Ready && self.state.has_more {
                    self.fetch(FetchMode::Append)
                } else {
                    Vec::new()
                }
            }
            UserAction::Refresh => self.fetch(FetchMode::Fresh),
            UserAction::Focus => {
                self.state.focused = true;
                Vec::new()
            }
            UserAction::Blur => {
                self.state.focused = false;
                Vec::new()
            }
        }
    }

    /// Cancel whatever is in flight and dispatch a new fetch
    fn fetch(&mut self, mode: FetchMode) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        if let Some(previous) = self.state.in_flight.take() {
            effects.push(Effect::Cancel(previous.token));
        }

        let page = match mode {
            FetchMode::Fresh => {
                self.state.page = 1;
                1
            }
            FetchMode::Append => self.state.page + 1,
        };

        self.next_token += 1;
        let token = RequestToken(self.next_token);
        self.state.in_flight = Some(InFlight { token, mode, page });
        self.state.phase = Phase::Searching;

        effects.push(Effect::Fetch {
            token,
            request: self.request_for(page),
        });
        effects
    }

    fn request_for(&self, page: usize) -> SearchRequest {
        let filters = &self.state.filters;
        let rating_min = (filters.rating_min > 0.0).then_some(filters.rating_min);
        SearchRequest::new(self.state.query.clone())
            .with_semantic_ratio(filters.semantic_ratio)
            .with_genres(filters.genres.iter().cloned())
            .with_rating(rating_min, None)
            .with_page(page, self.state.page_size)
    }

    fn take_current(&mut self, token: RequestToken) -> Option<InFlight> {
        match self.state.in_flight {
            Some(current) if current.token == token => self.state.in_flight.take(),
            _ => None,
        }
    }

    fn on_success(&mut self, token: RequestToken, result: SearchResult) {
        let Some(flight) = self.take_current(token) else {
            tracing::debug!("Dropping stale search response {:?}", token);
            return;
        };

        // An empty page ends paging even if the total claims otherwise
        let exhausted = result.movies.is_empty();
        match flight.mode {
            FetchMode::Fresh => self.state.movies = result.movies,
            FetchMode::Append => self.state.movies.extend(result.movies),
        }
        self.state.page = flight.page;
        self.state.total = result.total;
        self.state.has_more = !exhausted && (self.state.movies.len() as u64) < result.total;
        if !result.genre_facets.is_empty() {
            self.state.genre_facets = result.genre_facets;
        }
        self.state.latency_millis = Some(result.latency_millis);
        self.state.phase = Phase::Ready;
    }

    fn on_failure(&mut self, token: RequestToken, error: FetchError) {
        if error == FetchError::Cancelled {
            return;
        }
        if self.take_current(token).is_none() {
            tracing::debug!("Dropping stale search failure {:?}: {}", token, error);
            return;
        }
        tracing::warn!("Search failed: {}", error);
        self.state.phase = Phase::Error(error.to_string());
    }
}
