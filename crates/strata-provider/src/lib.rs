//! Streaming chunk management: regions of interest, staged generation
//! pipeline, bounded near cache, far-store eviction.
#![forbid(unsafe_code)]

mod config;
mod near_cache;
mod phase;
mod provider;
mod region;
mod relevance;
#[cfg(test)]
mod tests;

pub use config::{ProviderConfig, load_provider_config};
pub use near_cache::NearCache;
pub use phase::{ChunkPhase, PhaseError, PhaseOp};
pub use provider::{ChunkEvent, ChunkProvider, ProviderStats};
pub use region::{CacheRegion, Viewer, ViewerId};
pub use relevance::{RelevanceSnapshot, relevance_score};
