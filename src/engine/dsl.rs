//! Elasticsearch / OpenSearch query DSL
//!
//! Renders engine-agnostic plans into request bodies and translates native
//! response bodies into [`RawSearchResponse`]. Everything here is pure.

use super::{EngineError, EngineQuery, ModelDeployment, Ranking, RawHit, RawSearchResponse};
use crate::catalog::GenreBucket;
use crate::config::EngineKind;
use crate::search::query::{
    FieldMatch, FilterClause, LexicalPlan, MatchKind, MoreLikeThisPlan, RelevancePlan,
    ScoreModifier, SemanticPlan,
};
use serde_json::{json, Map, Value};

/// Stored fields that must never leave the engine
pub const INTERNAL_FIELDS: [&str; 4] = [
    "overview_embedding",
    "title_embedding",
    "model_id",
    "elser_error",
];

fn weighted_fields(m: &FieldMatch) -> Vec<String> {
    m.fields
        .iter()
        .map(|f| {
            if (f.weight - 1.0).abs() < f32::EPSILON {
                f.field.path().to_string()
            } else {
                format!("{}^{}", f.field.path(), f.weight)
            }
        })
        .collect()
}

fn render_field_match(text: &str, m: &FieldMatch) -> Value {
    let mut body = json!({
        "query": text,
        "fields": weighted_fields(m),
    });
    match m.kind {
        MatchKind::BestFields { fuzzy } => {
            body["type"] = json!("best_fields");
            if fuzzy {
                body["fuzziness"] = json!("AUTO");
            }
        }
        MatchKind::CrossFields => {
            body["type"] = json!("cross_fields");
        }
    }
    json!({ "multi_match": body })
}

/// Relevance plan as a `function_score`: text clauses summed, multiplied by
/// the summed popularity/rating factors
pub fn render_relevance(plan: &RelevancePlan) -> Value {
    let mut should: Vec<Value> = plan
        .matches
        .iter()
        .map(|m| render_field_match(&plan.text, m))
        .collect();

    for phrase in &plan.phrases {
        let mut clause = json!({ "query": plan.text, "boost": phrase.boost });
        if phrase.slop > 0 {
            clause["slop"] = json!(phrase.slop);
        }
        should.push(json!({ "match_phrase": { phrase.field.path(): clause } }));
    }

    let functions: Vec<Value> = plan
        .rerank
        .iter()
        .map(|f| {
            json!({
                "field_value_factor": {
                    "field": f.field.path(),
                    "factor": 1.0,
                    "modifier": match f.modifier {
                        ScoreModifier::None => "none",
                        ScoreModifier::Log2p => "log2p",
                    },
                    "missing": f.missing,
                },
                "weight": f.weight,
            })
        })
        .collect();

    json!({
        "function_score": {
            "query": { "bool": { "should": should } },
            "functions": functions,
            "score_mode": "sum",
            "boost_mode": "multiply",
        }
    })
}

pub fn render_lexical(plan: &LexicalPlan) -> Value {
    match plan {
        LexicalPlan::BrowseByPopularity => json!({ "match_all": {} }),
        LexicalPlan::Relevance(plan) => render_relevance(plan),
    }
}

pub fn render_semantic(plan: &SemanticPlan, kind: EngineKind) -> Value {
    let should: Vec<Value> = plan
        .clauses
        .iter()
        .map(|clause| match kind {
            EngineKind::Elasticsearch => json!({
                "text_expansion": {
                    clause.field.path(): {
                        "model_id": plan.model_id,
                        "model_text": clause.text,
                        "boost": clause.boost,
                    }
                }
            }),
            EngineKind::Opensearch => json!({
                "neural_sparse": {
                    clause.field.path(): {
                        "model_id": plan.model_id,
                        "query_text": clause.text,
                        "boost": clause.boost,
                    }
                }
            }),
        })
        .collect();

    json!({ "bool": { "should": should } })
}

pub fn render_more_like_this(plan: &MoreLikeThisPlan, index: &str) -> Value {
    let fields: Vec<&str> = plan.fields.iter().map(|f| f.path()).collect();
    json!({
        "more_like_this": {
            "fields": fields,
            "like": [{ "_index": index, "_id": plan.id }],
            "min_term_freq": plan.min_term_freq,
            "min_doc_freq": plan.min_doc_freq,
            "max_query_terms": plan.max_query_terms,
        }
    })
}

/// Post-filter clause, `None` when nothing is filtered
pub fn render_filter(filter: &FilterClause) -> Option<Value> {
    if filter.is_empty() {
        return None;
    }

    let mut must = Vec::new();
    if !filter.genres.is_empty() {
        must.push(json!({ "terms": { "genres": filter.genres } }));
    }
    if filter.rating_min.is_some() || filter.rating_max.is_some() {
        let mut range = Map::new();
        if let Some(min) = filter.rating_min {
            range.insert("gte".to_string(), json!(min));
        }
        if let Some(max) = filter.rating_max {
            range.insert("lte".to_string(), json!(max));
        }
        must.push(json!({ "range": { "vote_average": range } }));
    }

    Some(json!({ "bool": { "must": must } }))
}

fn excluding(query: Value, ids: &[String]) -> Value {
    if ids.is_empty() {
        query
    } else {
        json!({
            "bool": {
                "must": [query],
                "must_not": [{ "ids": { "values": ids } }],
            }
        })
    }
}

/// Full `_search` body for a query
pub fn render_search_body(
    query: &EngineQuery,
    kind: EngineKind,
    index: &str,
) -> Result<Value, EngineError> {
    let mut body = Map::new();

    match &query.ranking {
        Ranking::Fused {
            lexical,
            semantic,
            rrf,
        } => {
            if kind != EngineKind::Elasticsearch {
                return Err(EngineError::Unsupported("fused sub-search ranking"));
            }
            body.insert(
                "sub_searches".to_string(),
                json!([
                    { "query": excluding(render_relevance(lexical), &query.exclude_ids) },
                    { "query": excluding(render_semantic(semantic, kind), &query.exclude_ids) },
                ]),
            );
            body.insert(
                "rank".to_string(),
                json!({
                    "rrf": {
                        "rank_constant": rrf.rank_constant,
                        "rank_window_size": rrf.rank_window_size,
                    }
                }),
            );
        }
        Ranking::Lexical(plan) => {
            body.insert(
                "query".to_string(),
                excluding(render_lexical(plan), &query.exclude_ids),
            );
            if matches!(plan, LexicalPlan::BrowseByPopularity) {
                body.insert("sort".to_string(), json!([{ "popularity": "desc" }]));
            }
        }
        Ranking::Semantic(plan) => {
            body.insert(
                "query".to_string(),
                excluding(render_semantic(plan, kind), &query.exclude_ids),
            );
            body.insert(
                "timeout".to_string(),
                json!(format!("{}s", query.budget.as_secs().max(1))),
            );
        }
        Ranking::MoreLikeThis(plan) => {
            body.insert(
                "query".to_string(),
                excluding(render_more_like_this(plan, index), &query.exclude_ids),
            );
        }
    }

    if let Some(filter) = render_filter(&query.post_filter) {
        body.insert("post_filter".to_string(), filter);
    }
    body.insert("from".to_string(), json!(query.from));
    body.insert("size".to_string(), json!(query.size));
    body.insert(
        "_source".to_string(),
        json!({ "excludes": INTERNAL_FIELDS }),
    );
    if query.exact_total {
        body.insert("track_total_hits".to_string(), json!(true));
    }
    if let Some(buckets) = query.genre_facets {
        body.insert(
            "aggs".to_string(),
            json!({ "genres": { "terms": { "field": "genres", "size": buckets } } }),
        );
    }

    Ok(Value::Object(body))
}

fn strip_internal(mut source: Value) -> Value {
    if let Some(map) = source.as_object_mut() {
        for field in INTERNAL_FIELDS {
            map.remove(field);
        }
    }
    source
}

fn decode_hit(hit: &Value) -> Result<RawHit, EngineError> {
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Decode("hit without _id".to_string()))?;
    Ok(RawHit {
        id: id.to_string(),
        score: hit.get("_score").and_then(Value::as_f64),
        source: strip_internal(hit.get("_source").cloned().unwrap_or(Value::Null)),
    })
}

/// Translate a native `_search` response.
///
/// `hits.total` is accepted both as a bare number and as `{value, relation}`.
pub fn decode_search_response(body: &Value) -> Result<RawSearchResponse, EngineError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| EngineError::Decode("response without hits".to_string()))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    };

    let decoded = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(decode_hit).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let genre_buckets = body
        .pointer("/aggregations/genres/buckets")
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| serde_json::from_value::<GenreBucket>(b.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(RawSearchResponse {
        hits: decoded,
        total,
        genre_buckets,
    })
}

/// Translate a document `GET` response; `None` when not found
pub fn decode_document(body: &Value) -> Result<Option<RawHit>, EngineError> {
    if body.get("found").and_then(Value::as_bool) == Some(false) {
        return Ok(None);
    }
    decode_hit(body).map(Some)
}

/// Translate a model status response
pub fn decode_model_status(body: &Value, kind: EngineKind) -> ModelDeployment {
    match kind {
        EngineKind::Elasticsearch => {
            let stats = body
                .get("trained_model_stats")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if stats.is_empty() {
                return ModelDeployment::Missing;
            }
            let state_of = |m: &Value, pointer: &str| {
                m.pointer(pointer)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            let started = stats.iter().any(|m| {
                state_of(m, "/deployment_stats/state").as_deref() == Some("started")
                    || state_of(m, "/deployment_stats/allocation_status/state").as_deref()
                        == Some("started")
            });
            if started {
                ModelDeployment::Started
            } else {
                let reported = stats
                    .iter()
                    .find_map(|m| state_of(m, "/deployment_stats/state"))
                    .unwrap_or_else(|| "not deployed".to_string());
                ModelDeployment::NotStarted(reported)
            }
        }
        EngineKind::Opensearch => match body.get("model_state").and_then(Value::as_str) {
            Some("DEPLOYED") => ModelDeployment::Started,
            Some(state) => ModelDeployment::NotStarted(state.to_string()),
            None => ModelDeployment::Missing,
        },
    }
}
