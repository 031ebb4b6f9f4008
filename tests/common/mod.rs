//! Shared fixtures: an in-memory engine that evaluates query plans over a
//! small movie corpus.
#![allow(dead_code)]

use async_trait::async_trait;
use cinesearch::catalog::{GenreBucket, Movie, MovieSource};
use cinesearch::config::Config;
use cinesearch::engine::{
    EngineError, EngineQuery, ModelDeployment, RawHit, RawSearchResponse, Ranking, SearchEngine,
};
use cinesearch::search::query::{
    FilterClause, LexicalPlan, MoreLikeThisPlan, RelevancePlan, SearchField, SemanticPlan,
};
use cinesearch::search::HybridSearcher;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const INTERNAL: [&str; 3] = ["overview_embedding", "title_embedding", "model_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Browse,
    Lexical,
    Semantic,
    Fused,
    MoreLikeThis,
}

impl QueryKind {
    pub fn of(query: &EngineQuery) -> Self {
        match &query.ranking {
            Ranking::Lexical(LexicalPlan::BrowseByPopularity) => QueryKind::Browse,
            Ranking::Lexical(LexicalPlan::Relevance(_)) => QueryKind::Lexical,
            Ranking::Semantic(_) => QueryKind::Semantic,
            Ranking::Fused { .. } => QueryKind::Fused,
            Ranking::MoreLikeThis(_) => QueryKind::MoreLikeThis,
        }
    }
}

struct Doc {
    id: String,
    raw: Value,
    movie: Movie,
}

pub struct FakeEngine {
    docs: Vec<Doc>,
    native_fusion: bool,
    model: Mutex<ModelDeployment>,
    failing: Mutex<Vec<QueryKind>>,
    unreachable: AtomicBool,
    calls: Mutex<Vec<EngineQuery>>,
    status_calls: AtomicUsize,
    indexed: Mutex<Vec<(String, Value, Option<String>)>>,
}

impl FakeEngine {
    pub fn new(docs: Vec<(String, Value)>) -> Self {
        let docs = docs
            .into_iter()
            .map(|(id, raw)| {
                let movie = serde_json::from_value::<MovieSource>(raw.clone())
                    .expect("fixture document")
                    .into_movie(id.clone(), None);
                Doc { id, raw, movie }
            })
            .collect();

        Self {
            docs,
            native_fusion: true,
            model: Mutex::new(ModelDeployment::Started),
            failing: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            indexed: Mutex::new(Vec::new()),
        }
    }

    pub fn without_native_fusion(mut self) -> Self {
        self.native_fusion = false;
        self
    }

    pub fn with_model(self, state: ModelDeployment) -> Self {
        *self.model.lock().unwrap() = state;
        self
    }

    pub fn fail(&self, kind: QueryKind) {
        self.failing.lock().unwrap().push(kind);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<EngineQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<QueryKind> {
        self.calls().iter().map(QueryKind::of).collect()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn indexed(&self) -> Vec<(String, Value, Option<String>)> {
        self.indexed.lock().unwrap().clone()
    }

    fn ranked(&self, ranking: &Ranking) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = match ranking {
            Ranking::Lexical(LexicalPlan::BrowseByPopularity) => {
                let mut all: Vec<(usize, f64)> = (0..self.docs.len()).map(|i| (i, 1.0)).collect();
                all.sort_by(|a, b| {
                    let pa = self.docs[a.0].movie.popularity;
                    let pb = self.docs[b.0].movie.popularity;
                    pb.partial_cmp(&pa).unwrap()
                });
                return all;
            }
            Ranking::Lexical(LexicalPlan::Relevance(plan)) => self
                .docs
                .iter()
                .enumerate()
                .map(|(i, d)| (i, relevance(plan, &d.movie)))
                .collect(),
            Ranking::Semantic(plan) => self
                .docs
                .iter()
                .enumerate()
                .map(|(i, d)| (i, expansion(plan, &d.raw)))
                .collect(),
            Ranking::Fused {
                lexical,
                semantic,
                rrf,
            } => {
                let window = rrf.rank_window_size;
                let k = rrf.rank_constant as f64;
                let lists = [
                    self.ranked(&Ranking::Lexical(LexicalPlan::Relevance(lexical.clone()))),
                    self.ranked(&Ranking::Semantic(semantic.clone())),
                ];
                let mut order: Vec<usize> = Vec::new();
                let mut fused: HashMap<usize, f64> = HashMap::new();
                for list in &lists {
                    for (rank, (i, _)) in list.iter().take(window).enumerate() {
                        if !fused.contains_key(i) {
                            order.push(*i);
                        }
                        *fused.entry(*i).or_insert(0.0) += 1.0 / (k + rank as f64 + 1.0);
                    }
                }
                order.into_iter().map(|i| (i, fused[&i])).collect()
            }
            Ranking::MoreLikeThis(plan) => self.more_like_this(plan),
        };

        scored.retain(|(_, score)| *score > 0.0);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored
    }

    fn more_like_this(&self, plan: &MoreLikeThisPlan) -> Vec<(usize, f64)> {
        let Some(target) = self.docs.iter().find(|d| d.id == plan.id) else {
            return Vec::new();
        };
        self.docs
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let shared = plan
                    .fields
                    .iter()
                    .map(|f| {
                        let theirs = tokens(&field_text(&d.movie, *f));
                        tokens(&field_text(&target.movie, *f))
                            .iter()
                            .filter(|t| t.len() > 3 && theirs.contains(t))
                            .count()
                    })
                    .sum::<usize>();
                (i, shared as f64)
            })
            .collect()
    }

    fn hit(&self, index: usize, score: Option<f64>) -> RawHit {
        let doc = &self.docs[index];
        let mut source = doc.raw.clone();
        if let Some(map) = source.as_object_mut() {
            for field in INTERNAL {
                map.remove(field);
            }
        }
        RawHit {
            id: doc.id.clone(),
            score,
            source,
        }
    }
}

fn passes(filter: &FilterClause, movie: &Movie) -> bool {
    let genre_ok = filter.genres.is_empty() || filter.genres.iter().any(|g| movie.genres.contains(g));
    let min_ok = filter.rating_min.map_or(true, |min| movie.vote_average >= min);
    let max_ok = filter.rating_max.map_or(true, |max| movie.vote_average <= max);
    genre_ok && min_ok && max_ok
}

pub fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_text(movie: &Movie, field: SearchField) -> String {
    match field {
        SearchField::Title | SearchField::TitleExact => movie.title.clone(),
        SearchField::Tagline => movie.tagline.clone().unwrap_or_default(),
        SearchField::Overview => movie.overview.clone(),
        SearchField::Genres => movie.genres.join(" "),
        SearchField::Keywords | SearchField::KeywordTerms => movie.keywords.join(" "),
        SearchField::CastName => movie
            .cast
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        SearchField::CrewName => movie
            .crew
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Term-count text score plus phrase boosts, times the re-rank multiplier
fn relevance(plan: &RelevancePlan, movie: &Movie) -> f64 {
    let terms = tokens(&plan.text);
    if terms.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    for field_match in &plan.matches {
        for weighted in &field_match.fields {
            let hits = if weighted.field == SearchField::TitleExact {
                if movie.title.to_lowercase() == plan.text.to_lowercase() {
                    terms.len()
                } else {
                    0
                }
            } else {
                let words = tokens(&field_text(movie, weighted.field));
                terms.iter().filter(|t| words.contains(t)).count()
            };
            score += weighted.weight as f64 * hits as f64;
        }
    }
    if score == 0.0 {
        return 0.0;
    }

    for phrase in &plan.phrases {
        let words = tokens(&field_text(movie, phrase.field));
        if words.windows(terms.len()).any(|w| w == terms.as_slice()) {
            score += phrase.boost as f64;
        }
    }

    score * plan.rerank_multiplier(movie)
}

/// Sum of boosted token weights from the stored sparse embeddings
fn expansion(plan: &SemanticPlan, raw: &Value) -> f64 {
    plan.clauses
        .iter()
        .map(|clause| {
            let embedding = raw.get(clause.field.path());
            let weight: f64 = tokens(&clause.text)
                .iter()
                .map(|t| {
                    embedding
                        .and_then(|e| e.get(t.as_str()))
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0)
                })
                .sum();
            clause.boost as f64 * weight
        })
        .sum()
}

#[async_trait]
impl SearchEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn supports_native_fusion(&self) -> bool {
        self.native_fusion
    }

    async fn search(&self, query: &EngineQuery) -> Result<RawSearchResponse, EngineError> {
        self.calls.lock().unwrap().push(query.clone());
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("connection refused".to_string()));
        }
        if self.failing.lock().unwrap().contains(&QueryKind::of(query)) {
            return Err(EngineError::Timeout(query.budget));
        }
        if matches!(query.ranking, Ranking::Fused { .. }) && !self.native_fusion {
            return Err(EngineError::Unsupported("fused sub-search ranking"));
        }

        let matched: Vec<(usize, f64)> = self
            .ranked(&query.ranking)
            .into_iter()
            .filter(|(i, _)| !query.exclude_ids.contains(&self.docs[*i].id))
            .collect();

        let genre_buckets = match query.genre_facets {
            Some(size) => {
                let mut counts: HashMap<String, u64> = HashMap::new();
                for (i, _) in &matched {
                    for genre in &self.docs[*i].movie.genres {
                        *counts.entry(genre.clone()).or_insert(0) += 1;
                    }
                }
                let mut buckets: Vec<GenreBucket> = counts
                    .into_iter()
                    .map(|(key, doc_count)| GenreBucket { key, doc_count })
                    .collect();
                buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then(a.key.cmp(&b.key)));
                buckets.truncate(size);
                buckets
            }
            None => Vec::new(),
        };

        let filtered: Vec<(usize, f64)> = matched
            .into_iter()
            .filter(|(i, _)| passes(&query.post_filter, &self.docs[*i].movie))
            .collect();
        let total = match &query.ranking {
            // Like a real cluster, count every match of either sub-search,
            // not just the fused window
            Ranking::Fused {
                lexical, semantic, ..
            } => self
                .docs
                .iter()
                .filter(|d| !query.exclude_ids.contains(&d.id))
                .filter(|d| passes(&query.post_filter, &d.movie))
                .filter(|d| relevance(lexical, &d.movie) > 0.0 || expansion(semantic, &d.raw) > 0.0)
                .count() as u64,
            _ => filtered.len() as u64,
        };
        let hits = filtered
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .map(|(i, score)| self.hit(i, Some(score)))
            .collect();

        Ok(RawSearchResponse {
            hits,
            total,
            genre_buckets,
        })
    }

    async fn model_deployment(&self, _model_id: &str) -> Result<ModelDeployment, EngineError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("connection refused".to_string()));
        }
        Ok(self.model.lock().unwrap().clone())
    }

    async fn get(&self, id: &str) -> Result<Option<RawHit>, EngineError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .docs
            .iter()
            .position(|d| d.id == id)
            .map(|i| self.hit(i, None)))
    }

    async fn index(
        &self,
        id: &str,
        document: &Value,
        pipeline: Option<&str>,
    ) -> Result<String, EngineError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("connection refused".to_string()));
        }
        self.indexed.lock().unwrap().push((
            id.to_string(),
            document.clone(),
            pipeline.map(str::to_string),
        ));
        Ok(id.to_string())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(EngineError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn searcher(engine: Arc<FakeEngine>) -> HybridSearcher {
    HybridSearcher::from_config(engine, &Config::default()).expect("default config")
}

/// A searcher that fuses only the top `window` hits of each sub-ranking
pub fn windowed_searcher(engine: Arc<FakeEngine>, window: usize) -> HybridSearcher {
    let mut config = Config::default();
    config.search.rank_window_size = window;
    HybridSearcher::from_config(engine, &config).expect("windowed config")
}

fn doc(id: &str, fields: Value) -> (String, Value) {
    (id.to_string(), fields)
}

/// A dozen well-known titles
pub fn movies() -> Vec<(String, Value)> {
    vec![
        doc(
            "272",
            json!({
                "title": "Batman Begins",
                "overview": "Driven by tragedy, billionaire Bruce Wayne dedicates his life to uncovering and defeating the corruption that plagues Gotham City.",
                "genres": ["Action", "Crime", "Drama"],
                "release_date": "2005-06-10",
                "vote_average": 7.7, "vote_count": 20000, "popularity": 60.0,
                "keywords": ["vigilante", "superhero"],
                "cast": [{"name": "Christian Bale", "character": "Bruce Wayne"}],
                "crew": [{"name": "Christopher Nolan", "job": "Director"}],
                "overview_embedding": {"batman": 1.5, "hero": 1.8, "vigilante": 2.0, "gotham": 2.0, "dark": 0.6},
                "title_embedding": {"batman": 2.5, "begins": 1.0}
            }),
        ),
        doc(
            "155",
            json!({
                "title": "The Dark Knight",
                "overview": "Batman raises the stakes in his war on crime with the help of Lieutenant Jim Gordon and District Attorney Harvey Dent.",
                "genres": ["Drama", "Action", "Crime", "Thriller"],
                "release_date": "2008-07-16",
                "vote_average": 8.5, "vote_count": 32000, "popularity": 90.0,
                "keywords": ["joker", "superhero"],
                "cast": [{"name": "Christian Bale", "character": "Bruce Wayne"}],
                "crew": [{"name": "Christopher Nolan", "job": "Director"}],
                "overview_embedding": {"batman": 2.5, "hero": 2.0, "joker": 2.5, "gotham": 2.2, "dark": 1.5},
                "title_embedding": {"dark": 2.0, "knight": 2.0}
            }),
        ),
        doc(
            "603",
            json!({
                "title": "The Matrix",
                "overview": "A computer hacker learns about the true nature of reality and his role in the war against its controllers.",
                "genres": ["Action", "Science Fiction"],
                "release_date": "1999-03-30",
                "vote_average": 8.2, "vote_count": 25000, "popularity": 70.0,
                "keywords": ["simulation", "hacker"],
                "overview_embedding": {"hacker": 2.0, "reality": 2.0, "simulation": 2.5, "computer": 1.5},
                "title_embedding": {"matrix": 2.5}
            }),
        ),
        doc(
            "329865",
            json!({
                "title": "Arrival",
                "overview": "Taking place after alien crafts land around the world, a linguist races against time to communicate with the visitors.",
                "genres": ["Drama", "Science Fiction", "Mystery"],
                "release_date": "2016-11-10",
                "vote_average": 7.6, "vote_count": 18000, "popularity": 40.0,
                "keywords": ["alien", "language"],
                "overview_embedding": {"alien": 2.5, "language": 2.5, "contact": 2.0, "space": 1.0},
                "title_embedding": {"arrival": 2.0}
            }),
        ),
        doc(
            "348",
            json!({
                "title": "Alien",
                "overview": "During its return to the earth, commercial spaceship Nostromo intercepts a distress signal from a distant planet.",
                "genres": ["Horror", "Science Fiction"],
                "release_date": "1979-05-25",
                "vote_average": 8.1, "vote_count": 14000, "popularity": 35.0,
                "keywords": ["alien", "spaceship"],
                "overview_embedding": {"alien": 2.8, "space": 2.5, "monster": 2.0, "spaceship": 2.0},
                "title_embedding": {"alien": 3.0}
            }),
        ),
        doc(
            "508",
            json!({
                "title": "Love Actually",
                "overview": "Follows the lives of eight very different couples in dealing with their love lives in London at Christmas.",
                "genres": ["Comedy", "Romance", "Drama"],
                "release_date": "2003-09-07",
                "vote_average": 7.0, "vote_count": 7000, "popularity": 30.0,
                "keywords": ["christmas", "love"],
                "overview_embedding": {"love": 2.5, "romance": 2.0, "christmas": 2.0},
                "title_embedding": {"love": 2.5}
            }),
        ),
        doc(
            "50646",
            json!({
                "title": "Crazy, Stupid, Love.",
                "overview": "Cal Weaver is living the American dream until he learns his wife wants a divorce and he must rediscover love.",
                "genres": ["Comedy", "Drama", "Romance"],
                "release_date": "2011-07-29",
                "vote_average": 7.0, "vote_count": 9000, "popularity": 28.0,
                "keywords": ["divorce", "love"],
                "overview_embedding": {"love": 2.2, "divorce": 2.0, "romance": 1.5},
                "title_embedding": {"love": 2.0, "crazy": 1.0}
            }),
        ),
        doc(
            "11036",
            json!({
                "title": "The Notebook",
                "overview": "An epic love story centered around an older man who reads aloud to a woman with Alzheimer's.",
                "genres": ["Romance", "Drama"],
                "release_date": "2004-06-25",
                "vote_average": 7.9, "vote_count": 11000, "popularity": 32.0,
                "keywords": ["love", "memory"],
                "overview_embedding": {"love": 2.8, "romance": 2.5, "memory": 1.8},
                "title_embedding": {"notebook": 2.0}
            }),
        ),
        doc(
            "137",
            json!({
                "title": "Groundhog Day",
                "overview": "A narcissistic weatherman finds himself living the same day over and over again, and falls in love.",
                "genres": ["Romance", "Fantasy", "Drama", "Comedy"],
                "release_date": "1993-02-11",
                "vote_average": 7.6, "vote_count": 6000, "popularity": 20.0,
                "keywords": ["time loop"],
                "overview_embedding": {"time": 2.5, "loop": 2.5, "love": 1.2},
                "title_embedding": {"groundhog": 2.0}
            }),
        ),
        doc(
            "949",
            json!({
                "title": "Heat",
                "overview": "Obsessive master thief Neil McCauley leads a top-notch crew on various daring heists throughout Los Angeles.",
                "genres": ["Action", "Crime", "Drama", "Thriller"],
                "release_date": "1995-12-15",
                "vote_average": 7.9, "vote_count": 6500, "popularity": 25.0,
                "keywords": ["heist", "los angeles"],
                "cast": [{"name": "Al Pacino", "character": "Vincent Hanna"}],
                "overview_embedding": {"heist": 2.5, "crime": 2.0, "thief": 2.0},
                "title_embedding": {"heat": 2.0}
            }),
        ),
    ]
}

/// `count` near-identical documentaries matching "ocean", with distinct
/// vote counts so that ranking is strict
pub fn documentaries(count: usize) -> Vec<(String, Value)> {
    (0..count)
        .map(|i| {
            doc(
                &format!("doc-{}", i),
                json!({
                    "title": format!("Deep Water {}", i),
                    "overview": "A documentary about life in the ocean.",
                    "genres": ["Documentary"],
                    "vote_average": 6.0 + (i % 30) as f64 / 10.0,
                    "vote_count": 100 + 37 * i,
                    "popularity": i as f64,
                    "overview_embedding": {"ocean": 1.0 + i as f64 / 100.0},
                    "title_embedding": {"water": 1.0}
                }),
            )
        })
        .collect()
}

pub fn corpus() -> Vec<(String, Value)> {
    let mut all = movies();
    all.extend(documentaries(60));
    all
}

pub fn ids(movies: &[Movie]) -> Vec<String> {
    movies.iter().map(|m| m.id.clone()).collect()
}
