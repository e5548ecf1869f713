//! Dependency-aware compression of oversized entity/relationship sets.
//!
//! Given a set that no longer fits its token budget, the engine removes
//! or abbreviates data until a target reduction is met:
//! - Preserved entity types are kept at full detail, bounded per type,
//!   most-recently-processed preferred
//! - Everything else is dropped in ascending relevance-score order
//! - Relationships are re-derived so both endpoints always survive;
//!   critical relationship types outrank the rest when a secondary cut
//!   is needed
//!
//! Edges are filtered to match the surviving entities, never the
//! reverse, so no entity is left with dangling edges.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{EntityNode, EntityType, RelationshipEdge, RelationshipType};

/// Options controlling one compression pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// Target reduction as a percentage of the entity count (0-100).
    #[serde(default = "default_target_reduction")]
    pub target_reduction_pct: f64,
    /// Entity types kept at full detail.
    #[serde(default)]
    pub preserve_types: Vec<EntityType>,
    /// Relationship types ranked ahead when a secondary cut is needed.
    #[serde(default)]
    pub critical_relationship_types: Vec<RelationshipType>,
    /// Cap on preserved entities per preserved type.
    #[serde(default = "default_max_preserved")]
    pub max_preserved_per_type: usize,
}

fn default_target_reduction() -> f64 {
    30.0
}

fn default_max_preserved() -> usize {
    50
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_reduction_pct: default_target_reduction(),
            preserve_types: vec![EntityType::Controller, EntityType::Service],
            critical_relationship_types: vec![
                RelationshipType::DependsOn,
                RelationshipType::Calls,
            ],
            max_preserved_per_type: default_max_preserved(),
        }
    }
}

impl CompressionOptions {
    /// Set the target reduction percentage (clamped to 0-100).
    pub fn with_target_reduction(mut self, pct: f64) -> Self {
        self.target_reduction_pct = pct.clamp(0.0, 100.0);
        self
    }

    /// Set the preserved entity types.
    pub fn with_preserve_types(mut self, types: Vec<EntityType>) -> Self {
        self.preserve_types = types;
        self
    }

    /// Set the critical relationship types.
    pub fn with_critical_types(mut self, types: Vec<RelationshipType>) -> Self {
        self.critical_relationship_types = types;
        self
    }
}

/// Outcome of one compression pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Entities that survived, preserved types first.
    pub entities: Vec<EntityNode>,
    /// Relationships whose both endpoints survived.
    pub relationships: Vec<RelationshipEdge>,
    /// How many entities were removed.
    pub entities_removed: usize,
    /// How many entities were kept.
    pub entities_kept: usize,
    /// How many relationships were kept.
    pub relationships_kept: usize,
    /// Achieved reduction of the entity count, in percent.
    pub reduction_pct: f64,
}

/// Removes low-value data from an entity/relationship set until it
/// meets a target reduction.
#[derive(Debug, Clone, Default)]
pub struct CompressionEngine;

impl CompressionEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self
    }

    /// Run one compression pass.
    pub fn compress(
        &self,
        entities: Vec<EntityNode>,
        relationships: Vec<RelationshipEdge>,
        options: &CompressionOptions,
    ) -> CompressionResult {
        let original_count = entities.len();
        let preserve: HashSet<EntityType> = options.preserve_types.iter().copied().collect();

        // Partition: preserved types at full detail, bounded per type,
        // most recently processed first; the rest are removal candidates.
        let mut preserved_by_type: HashMap<EntityType, Vec<EntityNode>> = HashMap::new();
        let mut candidates: Vec<EntityNode> = Vec::new();
        for entity in entities {
            if preserve.contains(&entity.entity_type) {
                preserved_by_type
                    .entry(entity.entity_type)
                    .or_default()
                    .push(entity);
            } else {
                candidates.push(entity);
            }
        }

        let mut kept: Vec<EntityNode> = Vec::new();
        for (_, mut group) in preserved_by_type {
            group.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            group.truncate(options.max_preserved_per_type);
            kept.extend(group);
        }

        // Drop candidates lowest-relevance first until the target is met.
        let target_removals = ((original_count as f64) * options.target_reduction_pct / 100.0)
            .ceil() as usize;
        let overflow_removed = original_count
            .saturating_sub(kept.len())
            .saturating_sub(candidates.len());
        candidates.sort_by(|a, b| {
            a.relevance_score()
                .partial_cmp(&b.relevance_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut removed = overflow_removed;
        let mut survivors_tail: Vec<EntityNode> = Vec::new();
        for entity in candidates {
            if removed < target_removals {
                removed += 1;
                debug!(entity_id = %entity.id, score = entity.relevance_score(), "entity dropped");
            } else {
                survivors_tail.push(entity);
            }
        }
        kept.extend(survivors_tail);

        // Re-derive edges: both endpoints must survive; critical types
        // rank ahead for any later secondary cut.
        let surviving_ids: HashSet<&str> = kept.iter().map(|e| e.id.as_str()).collect();
        let critical: HashSet<RelationshipType> = options
            .critical_relationship_types
            .iter()
            .copied()
            .collect();
        let mut surviving_edges: Vec<RelationshipEdge> = relationships
            .into_iter()
            .filter(|edge| {
                surviving_ids.contains(edge.from_entity.as_str())
                    && surviving_ids.contains(edge.to_entity.as_str())
            })
            .collect();
        surviving_edges.sort_by_key(|edge| !critical.contains(&edge.relationship_type));

        let reduction_pct = if original_count == 0 {
            0.0
        } else {
            (removed as f64 / original_count as f64) * 100.0
        };
        info!(
            removed,
            kept = kept.len(),
            relationships = surviving_edges.len(),
            reduction_pct,
            "compression pass complete"
        );

        CompressionResult {
            entities_removed: removed,
            entities_kept: kept.len(),
            relationships_kept: surviving_edges.len(),
            reduction_pct,
            entities: kept,
            relationships: surviving_edges,
        }
    }

    /// Secondary cut: truncate the relationship list to a maximum count,
    /// keeping critical types (already ranked first) ahead of the rest.
    pub fn truncate_relationships(
        &self,
        mut relationships: Vec<RelationshipEdge>,
        max_count: usize,
    ) -> Vec<RelationshipEdge> {
        relationships.truncate(max_count);
        relationships
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityAnalysis;

    fn entity(id: &str, entity_type: EntityType, relevance: f64) -> EntityNode {
        EntityNode::new(id, entity_type, format!("src/{}.ts", id)).with_analysis(EntityAnalysis {
            usage_count: 1,
            relevance_score: relevance,
            summarized: false,
        })
    }

    fn edge(from: &str, to: &str, t: RelationshipType) -> RelationshipEdge {
        RelationshipEdge::new(from, to, t)
    }

    #[test]
    fn test_preserved_types_survive() {
        let engine = CompressionEngine::new();
        let entities = vec![
            entity("ctl", EntityType::Controller, 0.1),
            entity("cmp-low", EntityType::Component, 0.1),
            entity("cmp-high", EntityType::Component, 0.9),
        ];
        let options = CompressionOptions::default()
            .with_preserve_types(vec![EntityType::Controller])
            .with_target_reduction(30.0);

        let result = engine.compress(entities, Vec::new(), &options);
        let ids: Vec<&str> = result.entities.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"ctl"), "preserved type kept despite low score");
        assert!(!ids.contains(&"cmp-low"), "lowest relevance dropped first");
        assert!(ids.contains(&"cmp-high"));
        assert_eq!(result.entities_removed, 1);
    }

    #[test]
    fn test_drops_ascending_by_relevance() {
        let engine = CompressionEngine::new();
        let entities = vec![
            entity("a", EntityType::Component, 0.9),
            entity("b", EntityType::Component, 0.2),
            entity("c", EntityType::Component, 0.5),
            entity("d", EntityType::Component, 0.1),
        ];
        let options = CompressionOptions::default()
            .with_preserve_types(Vec::new())
            .with_target_reduction(50.0);

        let result = engine.compress(entities, Vec::new(), &options);
        let ids: Vec<&str> = result.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(result.entities_removed, 2);
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"c"));
    }

    #[test]
    fn test_no_dangling_edges() {
        let engine = CompressionEngine::new();
        let entities = vec![
            entity("keep-1", EntityType::Service, 0.9),
            entity("keep-2", EntityType::Service, 0.8),
            entity("drop", EntityType::Component, 0.0),
        ];
        let relationships = vec![
            edge("keep-1", "keep-2", RelationshipType::Calls),
            edge("keep-1", "drop", RelationshipType::Uses),
            edge("drop", "keep-2", RelationshipType::Uses),
        ];
        let options = CompressionOptions::default().with_target_reduction(34.0);

        let result = engine.compress(entities, relationships, &options);
        assert_eq!(result.relationships_kept, 1);
        assert_eq!(result.relationships[0].from_entity, "keep-1");
        assert_eq!(result.relationships[0].to_entity, "keep-2");
    }

    #[test]
    fn test_critical_relationships_rank_first() {
        let engine = CompressionEngine::new();
        let entities = vec![
            entity("a", EntityType::Service, 0.9),
            entity("b", EntityType::Service, 0.9),
        ];
        let relationships = vec![
            edge("a", "b", RelationshipType::References),
            edge("a", "b", RelationshipType::DependsOn),
            edge("b", "a", RelationshipType::Imports),
        ];
        let options = CompressionOptions::default().with_target_reduction(0.0);

        let result = engine.compress(entities, relationships, &options);
        assert_eq!(
            result.relationships[0].relationship_type,
            RelationshipType::DependsOn
        );

        let cut = engine.truncate_relationships(result.relationships, 1);
        assert_eq!(cut.len(), 1);
        assert_eq!(cut[0].relationship_type, RelationshipType::DependsOn);
    }

    #[test]
    fn test_preserved_per_type_cap_prefers_recent() {
        let engine = CompressionEngine::new();
        let mut old = entity("old", EntityType::Controller, 0.5);
        old.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let fresh = entity("fresh", EntityType::Controller, 0.5);

        let mut options = CompressionOptions::default()
            .with_preserve_types(vec![EntityType::Controller])
            .with_target_reduction(50.0);
        options.max_preserved_per_type = 1;

        let result = engine.compress(vec![old, fresh], Vec::new(), &options);
        assert_eq!(result.entities_kept, 1);
        assert_eq!(result.entities[0].id, "fresh");
    }

    #[test]
    fn test_empty_input() {
        let engine = CompressionEngine::new();
        let result = engine.compress(Vec::new(), Vec::new(), &CompressionOptions::default());
        assert_eq!(result.entities_kept, 0);
        assert_eq!(result.reduction_pct, 0.0);
    }
}
