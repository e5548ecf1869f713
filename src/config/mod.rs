//! Injected configuration for the discovery state core.
//!
//! The core never reads the environment or a config file itself: request
//! handlers resolve configuration once per operation and pass these
//! structs in. Every struct deserializes from JSON with per-field
//! defaults so a handler can overlay partial overrides onto
//! `Default::default()`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the durable graph store and its caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding one subdirectory per record namespace.
    pub state_root: PathBuf,
    /// Maximum cached entities.
    #[serde(default = "default_entity_cache")]
    pub entity_cache_size: usize,
    /// Maximum cached relationships.
    #[serde(default = "default_relationship_cache")]
    pub relationship_cache_size: usize,
    /// Maximum cached work items.
    #[serde(default = "default_work_item_cache")]
    pub work_item_cache_size: usize,
    /// Maximum cached chains.
    #[serde(default = "default_chain_cache")]
    pub chain_cache_size: usize,
    /// Maximum cached sessions.
    #[serde(default = "default_session_cache")]
    pub session_cache_size: usize,
    /// Upper bound on entries evicted by a single cache sweep.
    #[serde(default = "default_cleanup_buffer")]
    pub cleanup_buffer: usize,
}

fn default_entity_cache() -> usize {
    1000
}

fn default_relationship_cache() -> usize {
    2000
}

fn default_work_item_cache() -> usize {
    500
}

fn default_chain_cache() -> usize {
    200
}

fn default_session_cache() -> usize {
    50
}

fn default_cleanup_buffer() -> usize {
    100
}

impl StoreConfig {
    /// Build a config rooted at the given directory with default cache
    /// sizes.
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
            entity_cache_size: default_entity_cache(),
            relationship_cache_size: default_relationship_cache(),
            work_item_cache_size: default_work_item_cache(),
            chain_cache_size: default_chain_cache(),
            session_cache_size: default_session_cache(),
            cleanup_buffer: default_cleanup_buffer(),
        }
    }
}

/// Thresholds and estimation constants for the token budget manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    /// Characters per token used by the fallback estimator.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Fraction of the budget at which usage enters the warning band.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    /// Fraction of the budget at which compression must run.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,
    /// Fraction of the budget treated as an emergency.
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f64,
}

fn default_chars_per_token() -> usize {
    4
}

fn default_warning_threshold() -> f64 {
    0.8
}

fn default_compression_threshold() -> f64 {
    0.9
}

fn default_emergency_threshold() -> f64 {
    0.95
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            warning_threshold: default_warning_threshold(),
            compression_threshold: default_compression_threshold(),
            emergency_threshold: default_emergency_threshold(),
        }
    }
}

/// Tunables for the recovery orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Fixed token ceiling for metadata-only recovery.
    #[serde(default = "default_metadata_ceiling")]
    pub metadata_token_ceiling: usize,
    /// Per-entity token estimate used to derive progressive page sizes.
    #[serde(default = "default_tokens_per_entity")]
    pub estimated_tokens_per_entity: usize,
    /// Compression-trigger fraction for the priority-based strategy;
    /// lower than the general trigger because priority entities are
    /// protected harder.
    #[serde(default = "default_priority_headroom")]
    pub priority_trigger_threshold: f64,
}

fn default_metadata_ceiling() -> usize {
    2000
}

fn default_tokens_per_entity() -> usize {
    150
}

fn default_priority_headroom() -> f64 {
    0.75
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            metadata_token_ceiling: default_metadata_ceiling(),
            estimated_tokens_per_entity: default_tokens_per_entity(),
            priority_trigger_threshold: default_priority_headroom(),
        }
    }
}

/// Limits and timing for the task coordinator and heartbeat monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// System-wide cap on registered agents.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Interval between heartbeat scans, in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// An agent silent longer than this is marked disconnected, in
    /// milliseconds.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    /// Weigh an agent's track record (success rate, average task
    /// duration) into capability-based scoring.
    #[serde(default = "default_weight_toggle")]
    pub weight_experience: bool,
    /// Weigh an agent's current load into capability-based scoring.
    #[serde(default = "default_weight_toggle")]
    pub weight_load: bool,
}

fn default_max_agents() -> usize {
    10
}

fn default_heartbeat_interval() -> u64 {
    5_000
}

fn default_heartbeat_timeout() -> u64 {
    30_000
}

fn default_weight_toggle() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
            weight_experience: default_weight_toggle(),
            weight_load: default_weight_toggle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_new() {
        let config = StoreConfig::new("/tmp/state");
        assert_eq!(config.state_root, PathBuf::from("/tmp/state"));
        assert_eq!(config.entity_cache_size, 1000);
        assert_eq!(config.cleanup_buffer, 100);
    }

    #[test]
    fn test_store_config_partial_deserialize() {
        let json = r#"{"state_root": "/var/discovery", "entity_cache_size": 250}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.entity_cache_size, 250);
        assert_eq!(config.relationship_cache_size, 2000); // default
    }

    #[test]
    fn test_token_budget_defaults() {
        let config = TokenBudgetConfig::default();
        assert_eq!(config.chars_per_token, 4);
        assert!((config.warning_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.compression_threshold - 0.9).abs() < f64::EPSILON);
        assert!((config.emergency_threshold - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_agents, 10);
        assert_eq!(config.heartbeat_timeout_ms, 30_000);
        assert!(config.weight_experience);
        assert!(config.weight_load);
    }

    #[test]
    fn test_recovery_config_deserialize() {
        let json = r#"{"metadata_token_ceiling": 500}"#;
        let config: RecoveryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.metadata_token_ceiling, 500);
        assert_eq!(config.estimated_tokens_per_entity, 150); // default
    }
}
