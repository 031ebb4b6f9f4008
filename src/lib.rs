//! Cinesearch - Hybrid Movie Search
//!
//! Searches a movie catalog held in Elasticsearch or OpenSearch, blending
//! keyword relevance with semantic similarity through reciprocal rank fusion,
//! and degrading to keyword-only ranking whenever the semantic model is not
//! available. Ships an HTTP API and a debounced, cancellable search client.

pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod search;
pub mod server;

pub use error::{CineError, Result};
