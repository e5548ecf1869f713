//! Recovery of a bounded working set from historical context backups.
//!
//! The orchestrator reads immutable backup snapshots (never the live
//! store) and reconstructs an entity/relationship set that fits a
//! caller-supplied token budget, using one of five strategies:
//! - `metadata_only`: identifying fields plus a short label, under a
//!   fixed low ceiling; full content is never loaded into the result
//! - `selective`: filter-matched entities accumulated up to the
//!   compression trigger, compressed in place between backups
//! - `progressive`: page-per-backup accumulation with a resumption
//!   offset
//! - `priority_based`: type-preference-ordered pull with edges carried
//!   alongside, compressing at a lower headroom threshold
//! - `full`: whole backups until the trigger, then a fallback ladder of
//!   compression, progressive detail reduction (80%/60%/40%), and
//!   finally a raw one-at-a-time partial load
//!
//! Running out of budget degrades output size rather than failing; only
//! a wholly empty non-fittable slice is reported (as a success with
//! zero items) in the result message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::budget::{TokenBudgetManager, UsageBand};
use crate::cancel::CancelFlag;
use crate::compression::{CompressionEngine, CompressionOptions};
use crate::config::RecoveryConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::{
    namespace, BackupContent, BackupMetadata, EntityNode, EntityType, RelationshipEdge,
};

/// Which recovery behavior to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Identifying fields only, fixed low ceiling.
    MetadataOnly,
    /// Filter-matched entities with in-place compression.
    #[default]
    Selective,
    /// Paged accumulation with resumption support.
    Progressive,
    /// Type-preference-ordered pull with edges alongside.
    PriorityBased,
    /// Whole backups with the full fallback ladder.
    Full,
}

impl std::fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryMode::MetadataOnly => write!(f, "metadata_only"),
            RecoveryMode::Selective => write!(f, "selective"),
            RecoveryMode::Progressive => write!(f, "progressive"),
            RecoveryMode::PriorityBased => write!(f, "priority_based"),
            RecoveryMode::Full => write!(f, "full"),
        }
    }
}

/// Entity filter for selective recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryFilter {
    /// Keep only these entity types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<EntityType>>,
    /// Keep only these entity ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_ids: Option<Vec<String>>,
    /// Keep only entities updated at or after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<DateTime<Utc>>,
    /// Keep only entities updated at or before this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_before: Option<DateTime<Utc>>,
}

impl RecoveryFilter {
    fn matches(&self, entity: &EntityNode) -> bool {
        if let Some(types) = &self.entity_types {
            if !types.contains(&entity.entity_type) {
                return false;
            }
        }
        if let Some(ids) = &self.entity_ids {
            if !ids.iter().any(|id| id == &entity.id) {
                return false;
            }
        }
        if let Some(after) = self.updated_after {
            if entity.updated_at < after {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if entity.updated_at > before {
                return false;
            }
        }
        true
    }
}

/// Full recovery request: mode, budget, and mode-specific knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// Which behavior to run.
    pub mode: RecoveryMode,
    /// Hard upper bound on the result's token cost.
    pub max_tokens: usize,
    /// Entity filter (selective mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<RecoveryFilter>,
    /// Resumption offset from a previous progressive run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_from: Option<usize>,
}

impl RecoveryStrategy {
    /// Build a strategy with the given mode and budget.
    pub fn new(mode: RecoveryMode, max_tokens: usize) -> Self {
        Self {
            mode,
            max_tokens,
            filter: None,
            continue_from: None,
        }
    }

    /// Set the selective filter.
    pub fn with_filter(mut self, filter: RecoveryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the progressive resumption offset.
    pub fn with_continue_from(mut self, offset: usize) -> Self {
        self.continue_from = Some(offset);
        self
    }
}

/// Outcome of a recovery run. Always a structured success; budget
/// exhaustion shrinks the result rather than failing the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// Recovered entities.
    pub entities: Vec<EntityNode>,
    /// Recovered relationships (both endpoints always present).
    pub relationships: Vec<RelationshipEdge>,
    /// Re-serialized token cost of the result.
    pub tokens_used: usize,
    /// True once the cost crossed the warning band, signalling the
    /// caller that more data exists than was returned.
    pub has_more: bool,
    /// Resumption offset for progressive recovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    /// True when data was discarded to fit the budget.
    pub truncated: bool,
    /// Human-readable summary of what happened.
    pub message: String,
}

/// Read-only access to historical backup snapshots.
#[async_trait]
pub trait BackupReader: Send + Sync {
    /// List a session's backups, newest first.
    async fn list_backups(&self, session_id: &str) -> CoreResult<Vec<BackupMetadata>>;

    /// Load one backup's full content, `Ok(None)` when absent.
    async fn load_backup(&self, backup_id: &str) -> CoreResult<Option<BackupContent>>;
}

/// Backup reader over `context-backups/*.json` files whose names embed
/// the session id.
#[derive(Debug, Clone)]
pub struct FileBackupReader {
    dir: PathBuf,
}

impl FileBackupReader {
    /// Point the reader at a state root; backups live under its
    /// `context-backups/` directory.
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_root.into().join(namespace::CONTEXT_BACKUPS),
        }
    }

    async fn read_content(&self, file_stem: &str) -> CoreResult<Option<BackupContent>> {
        let path = self.dir.join(format!("{}.json", file_stem));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::storage_io(
                    format!("reading backup {}", file_stem),
                    e,
                ))
            }
        };
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl BackupReader for FileBackupReader {
    async fn list_backups(&self, session_id: &str) -> CoreResult<Vec<BackupMetadata>> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::storage_io("listing context backups", e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| CoreError::storage_io("listing context backups", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if !stem.contains(session_id) {
                continue;
            }
            if let Some(content) = self.read_content(stem).await? {
                backups.push(content.metadata);
            }
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    async fn load_backup(&self, backup_id: &str) -> CoreResult<Option<BackupContent>> {
        self.read_content(backup_id).await
    }
}

/// Reconstructs a budget-bounded working set from backup history.
pub struct RecoveryOrchestrator {
    budget: TokenBudgetManager,
    engine: CompressionEngine,
    config: RecoveryConfig,
    cancel: CancelFlag,
}

impl RecoveryOrchestrator {
    /// Build an orchestrator.
    pub fn new(budget: TokenBudgetManager, config: RecoveryConfig) -> Self {
        Self {
            budget,
            engine: CompressionEngine::new(),
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Install a shared cancellation flag checked between backups.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run recovery over the given backups (newest first) under the
    /// strategy's token budget.
    pub async fn recover(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        if strategy.max_tokens == 0 {
            return Err(CoreError::validation("max_tokens must be greater than zero"));
        }
        info!(
            mode = %strategy.mode,
            max_tokens = strategy.max_tokens,
            backups = backups.len(),
            "recovery started"
        );

        let result = match strategy.mode {
            RecoveryMode::MetadataOnly => self.recover_metadata(reader, backups, strategy).await?,
            RecoveryMode::Selective => self.recover_selective(reader, backups, strategy).await?,
            RecoveryMode::Progressive => {
                self.recover_progressive(reader, backups, strategy).await?
            }
            RecoveryMode::PriorityBased => {
                self.recover_priority(reader, backups, strategy).await?
            }
            RecoveryMode::Full => self.recover_full(reader, backups, strategy).await?,
        };

        info!(
            mode = %strategy.mode,
            entities = result.entities.len(),
            tokens = result.tokens_used,
            has_more = result.has_more,
            "recovery finished"
        );
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    async fn recover_metadata(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        let ceiling = self.config.metadata_token_ceiling.min(strategy.max_tokens);
        let mut entities: Vec<EntityNode> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut tokens = 0usize;
        let mut exhausted = false;

        'backups: for metadata in backups {
            self.cancel.check()?;
            let Some(content) = reader.load_backup(&metadata.id).await? else {
                warn!(backup = %metadata.id, "backup listed but unreadable, skipped");
                continue;
            };
            for entity in content.entities {
                if !seen.insert(entity.id.clone()) {
                    continue;
                }
                let stub = metadata_stub(&entity);
                let cost = self.budget.estimate_value(&stub)?;
                if tokens + cost > ceiling {
                    exhausted = true;
                    break 'backups;
                }
                tokens += cost;
                entities.push(stub);
            }
        }

        Ok(self.finish(
            entities,
            Vec::new(),
            strategy.max_tokens,
            None,
            exhausted,
            "metadata-only recovery",
        )?)
    }

    async fn recover_selective(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        let filter = strategy.filter.clone().unwrap_or_default();
        let mut entities: Vec<EntityNode> = Vec::new();
        let mut relationships: Vec<RelationshipEdge> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut compressed = false;

        for metadata in backups {
            self.cancel.check()?;
            let Some(content) = reader.load_backup(&metadata.id).await? else {
                continue;
            };
            for entity in content.entities {
                if filter.matches(&entity) && seen.insert(entity.id.clone()) {
                    entities.push(entity);
                }
            }
            relationships.extend(content.relationships);

            // Compress in place once the running cost nears the trigger,
            // then keep accumulating from the next backup.
            let tokens = self.estimate_set(&entities, &relationships)?;
            if self
                .budget
                .should_summarize_context(tokens, strategy.max_tokens)
            {
                let (e, r) = self.compress_set(entities, relationships, tokens, strategy.max_tokens)?;
                entities = e;
                relationships = r;
                seen = entities.iter().map(|e| e.id.clone()).collect();
                compressed = true;
            }
        }

        relationships = retain_connected(relationships, &entities);
        self.finish(
            entities,
            relationships,
            strategy.max_tokens,
            None,
            compressed,
            "selective recovery",
        )
    }

    async fn recover_progressive(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        let per_entity = self.config.estimated_tokens_per_entity.max(1);
        let page_size = (strategy.max_tokens / per_entity).max(1);
        let skip = strategy.continue_from.unwrap_or(0);

        let mut entities: Vec<EntityNode> = Vec::new();
        let mut relationships: Vec<RelationshipEdge> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut position = 0usize;
        let mut next_offset = None;
        let mut stopped = false;

        'backups: for metadata in backups {
            self.cancel.check()?;
            let Some(content) = reader.load_backup(&metadata.id).await? else {
                continue;
            };
            let mut taken_this_backup = 0usize;
            for entity in content.entities {
                if position < skip {
                    position += 1;
                    continue;
                }
                if taken_this_backup >= page_size {
                    next_offset = Some(position);
                    stopped = true;
                    break 'backups;
                }
                let tokens = self.estimate_set(&entities, &relationships)?;
                if self
                    .budget
                    .should_summarize_context(tokens, strategy.max_tokens)
                {
                    next_offset = Some(position);
                    stopped = true;
                    break 'backups;
                }
                if seen.insert(entity.id.clone()) {
                    entities.push(entity);
                    taken_this_backup += 1;
                }
                position += 1;
            }
            relationships.extend(content.relationships);
        }

        relationships = retain_connected(relationships, &entities);
        self.finish(
            entities,
            relationships,
            strategy.max_tokens,
            next_offset,
            stopped,
            "progressive recovery",
        )
    }

    async fn recover_priority(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        // Most valuable types first; their edges travel with them.
        const PREFERENCE: [EntityType; 9] = [
            EntityType::Controller,
            EntityType::Service,
            EntityType::Interface,
            EntityType::Component,
            EntityType::Repository,
            EntityType::Model,
            EntityType::Module,
            EntityType::Function,
            EntityType::Other,
        ];

        let mut pool_entities: Vec<EntityNode> = Vec::new();
        let mut pool_edges: Vec<RelationshipEdge> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for metadata in backups {
            self.cancel.check()?;
            let Some(content) = reader.load_backup(&metadata.id).await? else {
                continue;
            };
            for entity in content.entities {
                if seen.insert(entity.id.clone()) {
                    pool_entities.push(entity);
                }
            }
            pool_edges.extend(content.relationships);
        }

        // Priority entities are protected harder: stop at the lower
        // headroom threshold instead of the general trigger.
        let ceiling =
            (strategy.max_tokens as f64 * self.config.priority_trigger_threshold) as usize;
        let mut entities: Vec<EntityNode> = Vec::new();
        let mut relationships: Vec<RelationshipEdge> = Vec::new();
        let mut taken: HashSet<String> = HashSet::new();
        let mut tokens = 0usize;
        let mut exhausted = false;

        'types: for entity_type in PREFERENCE {
            for entity in pool_entities.iter().filter(|e| e.entity_type == entity_type) {
                self.cancel.check()?;
                let cost = self.budget.estimate_value(entity)?;
                if tokens + cost > ceiling {
                    exhausted = true;
                    break 'types;
                }
                tokens += cost;
                taken.insert(entity.id.clone());
                entities.push(entity.clone());

                // Pull the entity's own edges alongside while room remains.
                for edge in pool_edges
                    .iter()
                    .filter(|e| e.from_entity == entity.id || e.to_entity == entity.id)
                {
                    if taken.contains(&edge.from_entity) && taken.contains(&edge.to_entity) {
                        let edge_cost = self.budget.estimate_value(edge)?;
                        if tokens + edge_cost > ceiling {
                            continue;
                        }
                        tokens += edge_cost;
                        relationships.push(edge.clone());
                    }
                }
            }
        }

        self.finish(
            entities,
            relationships,
            strategy.max_tokens,
            None,
            exhausted,
            "priority-based recovery",
        )
    }

    async fn recover_full(
        &self,
        reader: &dyn BackupReader,
        backups: &[BackupMetadata],
        strategy: &RecoveryStrategy,
    ) -> CoreResult<RecoveryResult> {
        let mut entities: Vec<EntityNode> = Vec::new();
        let mut relationships: Vec<RelationshipEdge> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut degraded = false;

        for metadata in backups {
            self.cancel.check()?;
            let Some(content) = reader.load_backup(&metadata.id).await? else {
                continue;
            };
            for entity in content.entities {
                if seen.insert(entity.id.clone()) {
                    entities.push(entity);
                }
            }
            relationships.extend(content.relationships);

            let tokens = self.estimate_set(&entities, &relationships)?;
            if self
                .budget
                .should_summarize_context(tokens, strategy.max_tokens)
            {
                let (e, r) = self.compress_set(entities, relationships, tokens, strategy.max_tokens)?;
                entities = e;
                relationships = r;
                seen = entities.iter().map(|e| e.id.clone()).collect();
                degraded = true;
            }
        }

        // Fallback ladder for a set that still overflows: progressive
        // detail reduction, then a raw one-at-a-time partial load.
        let mut tokens = self.estimate_set(&entities, &relationships)?;
        if tokens > strategy.max_tokens {
            degraded = true;
            for fraction in [0.8f64, 0.6, 0.4] {
                let keep = ((entities.len() as f64) * fraction) as usize;
                let reduced = self.reduce_detail(&entities, keep);
                let reduced_edges = retain_connected(relationships.clone(), &reduced);
                tokens = self.estimate_set(&reduced, &reduced_edges)?;
                debug!(fraction, keep, tokens, "progressive detail reduction attempt");
                if tokens <= strategy.max_tokens {
                    entities = reduced;
                    relationships = reduced_edges;
                    break;
                }
            }
        }
        if tokens > strategy.max_tokens {
            // Raw partial load: add entities one at a time and stop the
            // instant the running cost would exceed the budget.
            let mut partial: Vec<EntityNode> = Vec::new();
            let mut running = 0usize;
            for entity in &entities {
                self.cancel.check()?;
                let cost = self.budget.estimate_value(entity)?;
                if running + cost > strategy.max_tokens {
                    break;
                }
                running += cost;
                partial.push(entity.clone());
            }
            entities = partial;
            relationships = retain_connected(relationships, &entities);
        }

        self.finish(
            entities,
            relationships,
            strategy.max_tokens,
            None,
            degraded,
            "full recovery",
        )
    }

    // ------------------------------------------------------------------
    // Shared machinery
    // ------------------------------------------------------------------

    fn estimate_set(
        &self,
        entities: &[EntityNode],
        relationships: &[RelationshipEdge],
    ) -> CoreResult<usize> {
        Ok(self.budget.estimate_slice(entities)? + self.budget.estimate_slice(relationships)?)
    }

    fn compress_set(
        &self,
        entities: Vec<EntityNode>,
        relationships: Vec<RelationshipEdge>,
        current_tokens: usize,
        max_tokens: usize,
    ) -> CoreResult<(Vec<EntityNode>, Vec<RelationshipEdge>)> {
        // Aim below the warning band, with margin for estimation noise.
        let target = (max_tokens as f64 * 0.7) as usize;
        let overshoot_pct = if current_tokens == 0 {
            0.0
        } else {
            ((current_tokens.saturating_sub(target)) as f64 / current_tokens as f64) * 100.0
        };
        let options =
            CompressionOptions::default().with_target_reduction(overshoot_pct.clamp(10.0, 90.0));
        let result = self.engine.compress(entities, relationships, &options);
        debug!(
            removed = result.entities_removed,
            kept = result.entities_kept,
            "in-place compression during recovery"
        );
        Ok((result.entities, result.relationships))
    }

    /// Cut to the `keep` highest-relevance entities and strip their
    /// free-text context fields.
    fn reduce_detail(&self, entities: &[EntityNode], keep: usize) -> Vec<EntityNode> {
        let mut ranked: Vec<EntityNode> = entities.to_vec();
        ranked.sort_by(|a, b| {
            b.relevance_score()
                .partial_cmp(&a.relevance_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(keep);
        for entity in &mut ranked {
            entity.business_context = None;
            entity.chain_context = None;
            entity.domain_context = None;
        }
        ranked
    }

    fn finish(
        &self,
        mut entities: Vec<EntityNode>,
        mut relationships: Vec<RelationshipEdge>,
        max_tokens: usize,
        next_offset: Option<usize>,
        truncated: bool,
        what: &str,
    ) -> CoreResult<RecoveryResult> {
        // Last-resort budget enforcement shared by all strategies: shed
        // edges, then entities, until the re-serialized cost fits.
        let mut tokens = self.estimate_set(&entities, &relationships)?;
        let mut shed = false;
        while tokens > max_tokens && !relationships.is_empty() {
            relationships.pop();
            shed = true;
            tokens = self.estimate_set(&entities, &relationships)?;
        }
        while tokens > max_tokens && !entities.is_empty() {
            entities.pop();
            relationships = retain_connected(relationships, &entities);
            shed = true;
            tokens = self.estimate_set(&entities, &relationships)?;
        }

        let message = if entities.is_empty() && shed {
            // Even the smallest non-empty slice overflowed; report it
            // rather than silently violating the budget.
            format!("{}: no backup slice fits within {} tokens", what, max_tokens)
        } else if shed || truncated {
            format!("{}: partial result within budget", what)
        } else {
            format!("{}: complete within budget", what)
        };

        let has_more = self.budget.usage_band(tokens, max_tokens) >= UsageBand::Warning
            || next_offset.is_some();
        Ok(RecoveryResult {
            entities,
            relationships,
            tokens_used: tokens,
            has_more,
            next_offset,
            truncated: truncated || shed,
            message,
        })
    }
}

/// Short identifying stub for metadata-only recovery.
fn metadata_stub(entity: &EntityNode) -> EntityNode {
    let mut stub = EntityNode::new(entity.id.clone(), entity.entity_type, entity.file_path.clone());
    stub.discovery_method = entity.discovery_method.clone();
    stub.priority = entity.priority;
    stub.processed = entity.processed;
    stub.created_at = entity.created_at;
    stub.updated_at = entity.updated_at;
    stub.business_context = Some(format!("{} @ {}", entity.entity_type, entity.file_path));
    stub
}

/// Keep only edges whose both endpoints are in the entity set.
fn retain_connected(
    relationships: Vec<RelationshipEdge>,
    entities: &[EntityNode],
) -> Vec<RelationshipEdge> {
    let ids: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    relationships
        .into_iter()
        .filter(|e| ids.contains(e.from_entity.as_str()) && ids.contains(e.to_entity.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_type_and_id() {
        let entity = EntityNode::new("svc-1", EntityType::Service, "a.ts");
        let filter = RecoveryFilter {
            entity_types: Some(vec![EntityType::Service]),
            ..Default::default()
        };
        assert!(filter.matches(&entity));

        let filter = RecoveryFilter {
            entity_ids: Some(vec!["other".to_string()]),
            ..Default::default()
        };
        assert!(!filter.matches(&entity));
    }

    #[test]
    fn test_metadata_stub_strips_detail() {
        let entity = EntityNode::new("e1", EntityType::Controller, "c.ts")
            .with_business_context("a very long explanation ".repeat(40));
        let stub = metadata_stub(&entity);
        assert_eq!(stub.id, "e1");
        assert!(stub.business_context.as_ref().unwrap().len() < 100);
        assert!(stub.analysis.is_none());
    }

    #[test]
    fn test_retain_connected_drops_dangling() {
        let entities = vec![EntityNode::new("a", EntityType::Service, "a.ts")];
        let edges = vec![
            RelationshipEdge::new("a", "a", crate::store::RelationshipType::Uses),
            RelationshipEdge::new("a", "gone", crate::store::RelationshipType::Uses),
        ];
        let kept = retain_connected(edges, &entities);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_strategy_serde() {
        let json = r#"{"mode": "priority_based", "max_tokens": 5000}"#;
        let strategy: RecoveryStrategy = serde_json::from_str(json).unwrap();
        assert_eq!(strategy.mode, RecoveryMode::PriorityBased);
        assert_eq!(strategy.max_tokens, 5000);
        assert!(strategy.filter.is_none());
    }
}
