//! Hybrid movie search
//!
//! Query builders produce engine-agnostic plans, the hybrid searcher picks a
//! ranking strategy (with lexical fallback) and the normalizer shapes what
//! the engine returns.

pub mod fusion;
pub mod hybrid;
pub mod normalize;
pub mod probe;
pub mod query;
mod similar;

pub use fusion::{fuse_hits, reciprocal_rank_fusion, FusionConfig, FusionError};
pub use hybrid::{strategy_chain, HealthReport, HybridSearcher, SearchSettings, Strategy};
pub use normalize::normalize;
pub use probe::{ModelAvailability, ModelAvailabilityProbe};
