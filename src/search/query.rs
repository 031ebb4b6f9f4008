//! Query builders
//!
//! Pure functions turning a user query and filters into engine-agnostic plans.
//! Nothing here talks to the engine; `engine::dsl` renders these plans.

use crate::catalog::{Movie, SearchRequest};

/// Characters of overview used when seeding a similarity lookup
pub const SIMILARITY_SEED_OVERVIEW_CHARS: usize = 200;

/// Text fields the lexical plan can match against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Title,
    /// Un-analysed title, rewards exact title queries
    TitleExact,
    Tagline,
    Overview,
    Genres,
    /// Analysed keyword text
    Keywords,
    /// Raw keyword terms
    KeywordTerms,
    CastName,
    CrewName,
}

impl SearchField {
    pub fn path(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::TitleExact => "title.raw",
            SearchField::Tagline => "tagline",
            SearchField::Overview => "overview",
            SearchField::Genres => "genres",
            SearchField::Keywords => "keywords.text",
            SearchField::KeywordTerms => "keywords",
            SearchField::CastName => "cast.name",
            SearchField::CrewName => "crew.name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedField {
    pub field: SearchField,
    pub weight: f32,
}

const fn weighted(field: SearchField, weight: f32) -> WeightedField {
    WeightedField { field, weight }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Score of the single best matching field wins
    BestFields { fuzzy: bool },
    /// Terms may be spread over several fields
    CrossFields,
}

/// A weighted multi-field match
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub kind: MatchKind,
    pub fields: Vec<WeightedField>,
}

/// Extra score for the whole query appearing as a phrase in one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseBoost {
    pub field: SearchField,
    pub boost: f32,
    /// Positions the phrase terms may move apart
    pub slop: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    VoteCount,
    VoteAverage,
    Popularity,
}

impl NumericField {
    pub fn path(&self) -> &'static str {
        match self {
            NumericField::VoteCount => "vote_count",
            NumericField::VoteAverage => "vote_average",
            NumericField::Popularity => "popularity",
        }
    }

    pub fn value_of(&self, movie: &Movie) -> f64 {
        match self {
            NumericField::VoteCount => movie.vote_count as f64,
            NumericField::VoteAverage => movie.vote_average,
            NumericField::Popularity => movie.popularity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreModifier {
    None,
    /// log10(2 + value)
    Log2p,
}

/// One popularity/rating term of the re-rank multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankFactor {
    pub field: NumericField,
    pub modifier: ScoreModifier,
    /// Value assumed when the document lacks the field
    pub missing: f64,
    pub weight: f64,
}

impl RerankFactor {
    pub fn apply(&self, value: Option<f64>) -> f64 {
        let value = value.unwrap_or(self.missing);
        let modified = match self.modifier {
            ScoreModifier::None => value,
            ScoreModifier::Log2p => (2.0 + value).log10(),
        };
        modified * self.weight
    }
}

/// Text relevance plan: matches and phrase boosts summed, then multiplied by
/// the sum of the re-rank factors
#[derive(Debug, Clone, PartialEq)]
pub struct RelevancePlan {
    pub text: String,
    pub matches: Vec<FieldMatch>,
    pub phrases: Vec<PhraseBoost>,
    pub rerank: Vec<RerankFactor>,
}

impl RelevancePlan {
    /// Re-rank multiplier for a document
    pub fn rerank_multiplier(&self, movie: &Movie) -> f64 {
        self.rerank
            .iter()
            .map(|f| f.apply(Some(f.field.value_of(movie))))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexicalPlan {
    /// Match everything, most popular first
    BrowseByPopularity,
    Relevance(RelevancePlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingField {
    Overview,
    Title,
}

impl EmbeddingField {
    pub fn path(&self) -> &'static str {
        match self {
            EmbeddingField::Overview => "overview_embedding",
            EmbeddingField::Title => "title_embedding",
        }
    }
}

/// One conceptual-similarity lookup against a stored embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionClause {
    pub field: EmbeddingField,
    pub text: String,
    pub boost: f32,
}

/// Semantic plan: clauses are OR-ed, any one may contribute
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticPlan {
    pub model_id: String,
    pub clauses: Vec<ExpansionClause>,
}

/// Post-filter: narrows hits without touching scores or facet counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    /// Any-of
    pub genres: Vec<String>,
    /// Inclusive
    pub rating_min: Option<f64>,
    /// Inclusive
    pub rating_max: Option<f64>,
}

impl FilterClause {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty() && self.rating_min.is_none() && self.rating_max.is_none()
    }
}

/// Term-statistics similarity against an existing document
#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThisPlan {
    pub id: String,
    pub fields: Vec<SearchField>,
    pub min_term_freq: u32,
    pub min_doc_freq: u32,
    pub max_query_terms: u32,
}

const BEST_FIELDS: [WeightedField; 8] = [
    weighted(SearchField::Title, 3.0),
    weighted(SearchField::TitleExact, 4.0),
    weighted(SearchField::Tagline, 1.5),
    weighted(SearchField::Overview, 1.0),
    weighted(SearchField::Genres, 2.0),
    weighted(SearchField::Keywords, 3.0),
    weighted(SearchField::CastName, 5.0),
    weighted(SearchField::CrewName, 5.0),
];

const CROSS_FIELDS: [WeightedField; 5] = [
    weighted(SearchField::Title, 2.0),
    weighted(SearchField::Overview, 1.0),
    weighted(SearchField::Keywords, 2.0),
    weighted(SearchField::CastName, 4.0),
    weighted(SearchField::CrewName, 4.0),
];

const PHRASE_BOOSTS: [PhraseBoost; 5] = [
    PhraseBoost {
        field: SearchField::Title,
        boost: 10.0,
        slop: 0,
    },
    PhraseBoost {
        field: SearchField::CastName,
        boost: 10.0,
        slop: 0,
    },
    PhraseBoost {
        field: SearchField::CrewName,
        boost: 10.0,
        slop: 0,
    },
    PhraseBoost {
        field: SearchField::Keywords,
        boost: 8.0,
        slop: 0,
    },
    PhraseBoost {
        field: SearchField::Overview,
        boost: 3.0,
        slop: 2,
    },
];

const RERANK: [RerankFactor; 2] = [
    RerankFactor {
        field: NumericField::VoteCount,
        modifier: ScoreModifier::Log2p,
        missing: 1.0,
        weight: 0.5,
    },
    RerankFactor {
        field: NumericField::VoteAverage,
        modifier: ScoreModifier::None,
        missing: 5.0,
        weight: 0.1,
    },
];

/// Build the keyword plan. A blank query browses by popularity.
pub fn lexical_plan(query: &str) -> LexicalPlan {
    let text = query.trim();
    if text.is_empty() {
        LexicalPlan::BrowseByPopularity
    } else {
        LexicalPlan::Relevance(relevance_plan(text))
    }
}

/// Multi-field relevance plan for a non-empty query
pub fn relevance_plan(text: &str) -> RelevancePlan {
    RelevancePlan {
        text: text.trim().to_string(),
        matches: vec![
            FieldMatch {
                kind: MatchKind::BestFields { fuzzy: true },
                fields: BEST_FIELDS.to_vec(),
            },
            FieldMatch {
                kind: MatchKind::CrossFields,
                fields: CROSS_FIELDS.to_vec(),
            },
        ],
        phrases: PHRASE_BOOSTS.to_vec(),
        rerank: RERANK.to_vec(),
    }
}

/// Overview embedding is the primary signal; the title embedding is kept
/// light so literal title words do not dominate conceptual matches.
pub fn semantic_plan(query: &str, model_id: &str) -> SemanticPlan {
    let text = query.trim().to_string();
    SemanticPlan {
        model_id: model_id.to_string(),
        clauses: vec![
            ExpansionClause {
                field: EmbeddingField::Overview,
                text: text.clone(),
                boost: 5.0,
            },
            ExpansionClause {
                field: EmbeddingField::Title,
                text,
                boost: 1.0,
            },
        ],
    }
}

/// Semantic plan seeded from a movie's own text
pub fn similar_semantic_plan(movie: &Movie, model_id: &str) -> SemanticPlan {
    SemanticPlan {
        model_id: model_id.to_string(),
        clauses: vec![
            ExpansionClause {
                field: EmbeddingField::Overview,
                text: movie.similarity_seed(SIMILARITY_SEED_OVERVIEW_CHARS),
                boost: 2.0,
            },
            ExpansionClause {
                field: EmbeddingField::Title,
                text: movie.title.clone(),
                boost: 1.0,
            },
        ],
    }
}

pub fn more_like_this_plan(id: &str) -> MoreLikeThisPlan {
    MoreLikeThisPlan {
        id: id.to_string(),
        fields: vec![
            SearchField::Title,
            SearchField::Overview,
            SearchField::Genres,
            SearchField::KeywordTerms,
        ],
        min_term_freq: 1,
        min_doc_freq: 2,
        max_query_terms: 25,
    }
}

pub fn filter_clause(request: &SearchRequest) -> FilterClause {
    FilterClause {
        genres: request.genres.clone(),
        rating_min: request.rating_min,
        rating_max: request.rating_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query_browses() {
        assert_eq!(lexical_plan("   "), LexicalPlan::BrowseByPopularity);
        assert_eq!(lexical_plan(""), LexicalPlan::BrowseByPopularity);
    }

    #[test]
    fn test_relevance_plan_trims_and_weights() {
        let plan = match lexical_plan("  the matrix ") {
            LexicalPlan::Relevance(plan) => plan,
            other => panic!("unexpected plan {:?}", other),
        };
        assert_eq!(plan.text, "the matrix");

        // Title phrase outranks every other phrase boost except names
        let title = plan
            .phrases
            .iter()
            .find(|p| p.field == SearchField::Title)
            .unwrap();
        assert!(plan.phrases.iter().all(|p| p.boost <= title.boost));

        let overview = plan
            .phrases
            .iter()
            .find(|p| p.field == SearchField::Overview)
            .unwrap();
        assert_eq!(overview.slop, 2);
        assert!(overview.boost < title.boost);

        // Names and titles dominate field weights
        let best = &plan.matches[0];
        let overview_weight = best
            .fields
            .iter()
            .find(|f| f.field == SearchField::Overview)
            .unwrap()
            .weight;
        assert!(best
            .fields
            .iter()
            .filter(|f| matches!(
                f.field,
                SearchField::Title | SearchField::CastName | SearchField::CrewName
            ))
            .all(|f| f.weight > overview_weight));
    }

    #[test]
    fn test_rerank_prefers_voted_titles() {
        let plan = relevance_plan("heat");
        let mut popular = crate::catalog::MovieSource {
            title: "Heat".to_string(),
            tagline: None,
            genres: vec![],
            overview: String::new(),
            release_date: None,
            vote_average: Some(8.0),
            vote_count: Some(10_000),
            popularity: None,
            poster_path: None,
            backdrop_path: None,
            runtime: None,
            original_language: None,
            cast: None,
            crew: None,
            keywords: None,
        };
        let a = popular.clone().into_movie("1".to_string(), None);
        popular.vote_count = Some(3);
        popular.vote_average = Some(4.0);
        let b = popular.into_movie("2".to_string(), None);

        assert!(plan.rerank_multiplier(&a) > plan.rerank_multiplier(&b));
    }

    #[test]
    fn test_rerank_missing_values() {
        let factor = RERANK[1];
        assert!((factor.apply(None) - 0.5).abs() < 1e-9);
        let log = RERANK[0];
        assert!((log.apply(Some(8.0)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_semantic_plan_weights_overview_higher() {
        let plan = semantic_plan(" dreams inside dreams ", ".elser_model_2");
        assert_eq!(plan.clauses.len(), 2);
        assert_eq!(plan.clauses[0].field, EmbeddingField::Overview);
        assert_eq!(plan.clauses[0].text, "dreams inside dreams");
        assert!(plan.clauses[0].boost > plan.clauses[1].boost);
    }

    #[test]
    fn test_filter_clause() {
        let request = SearchRequest::new("love")
            .with_genres(["Comedy"])
            .with_rating(Some(6.0), None);
        let filter = filter_clause(&request);
        assert!(!filter.is_empty());
        assert_eq!(filter.genres, vec!["Comedy".to_string()]);
        assert!(filter_clause(&SearchRequest::new("love")).is_empty());
    }
}
