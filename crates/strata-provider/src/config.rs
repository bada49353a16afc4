use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Memory budget the default cache capacity is derived from, in MiB.
/// Deployments with more headroom override `cache_capacity` directly.
const MEMORY_BUDGET_MB: usize = 1024;

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
    #[serde(default = "default_generate_workers")]
    pub generate_workers: usize,
    #[serde(default = "default_decorate_workers")]
    pub decorate_workers: usize,
    #[serde(default = "default_internal_light_workers")]
    pub internal_light_workers: usize,
    #[serde(default = "default_propagate_workers")]
    pub propagate_workers: usize,
    #[serde(default = "default_review_workers")]
    pub review_workers: usize,
    /// Soft bound on resident chunks, checked once per tick.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Extra chunks kept around each region during eviction.
    #[serde(default = "default_keep_margin")]
    pub keep_margin: i32,
    /// Completed results drained per stage per tick. One result per tick
    /// caps per-tick synchronization cost but also throttles pipeline drain
    /// to the tick rate; raise this to widen the drain.
    #[serde(default = "default_poll_budget")]
    pub poll_budget: usize,
}

fn default_fetch_workers() -> usize {
    8
}
fn default_generate_workers() -> usize {
    8
}
fn default_decorate_workers() -> usize {
    2
}
fn default_internal_light_workers() -> usize {
    4
}
fn default_propagate_workers() -> usize {
    2
}
fn default_review_workers() -> usize {
    2
}
fn default_cache_capacity() -> usize {
    2 * MEMORY_BUDGET_MB
}
fn default_keep_margin() -> i32 {
    4
}
fn default_poll_budget() -> usize {
    1
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            fetch_workers: default_fetch_workers(),
            generate_workers: default_generate_workers(),
            decorate_workers: default_decorate_workers(),
            internal_light_workers: default_internal_light_workers(),
            propagate_workers: default_propagate_workers(),
            review_workers: default_review_workers(),
            cache_capacity: default_cache_capacity(),
            keep_margin: default_keep_margin(),
            poll_budget: default_poll_budget(),
        }
    }
}

pub fn load_provider_config(path: &Path) -> Result<ProviderConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: ProviderConfig = toml::from_str(&s)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stage_sizing() {
        let cfg = ProviderConfig::default();
        assert_eq!(cfg.fetch_workers, 8);
        assert_eq!(cfg.generate_workers, 8);
        assert_eq!(cfg.decorate_workers, 2);
        assert_eq!(cfg.internal_light_workers, 4);
        assert_eq!(cfg.propagate_workers, 2);
        assert_eq!(cfg.poll_budget, 1);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: ProviderConfig = toml::from_str("cache_capacity = 16\npoll_budget = 3").unwrap();
        assert_eq!(cfg.cache_capacity, 16);
        assert_eq!(cfg.poll_budget, 3);
        assert_eq!(cfg.keep_margin, 4);
    }
}
