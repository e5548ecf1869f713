//! Durable graph store for discovered code entities.
//!
//! This module provides the data model for discovery state - sessions,
//! entity nodes, relationship edges, work items, chains, checkpoints -
//! plus the [`RecordStore`] seam over the durable backend and the
//! [`GraphStore`] facade that layers bounded in-memory caches, BFS
//! pathfinding, and the priority work queue on top of it.

mod cache;
mod files;
mod graph;


#[cfg(test)]
#[path = "graph_tests.rs"]
mod graph_tests;

pub use cache::BoundedCache;
pub use files::FileRecordStore;
pub use graph::{EntityFilter, GraphStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;

/// Record namespaces under the state root, one directory each.
pub mod namespace {
    /// Discovery sessions.
    pub const SESSIONS: &str = "sessions";
    /// Entity nodes.
    pub const ENTITIES: &str = "entities";
    /// Relationship edges.
    pub const RELATIONSHIPS: &str = "relationships";
    /// Work items.
    pub const WORK_ITEMS: &str = "work-items";
    /// Discovery chains.
    pub const CHAINS: &str = "chains";
    /// Coordination reports.
    pub const REPORTS: &str = "reports";
    /// Context backups (read-only, recovery input).
    pub const CONTEXT_BACKUPS: &str = "context-backups";

    /// Per-session checkpoint namespace, e.g. `checkpoints/sess-1`.
    pub fn checkpoints(session_id: &str) -> String {
        format!("checkpoints/{}", session_id)
    }
}

/// Phase of a discovery session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// Initial entity discovery.
    #[default]
    Discovery,
    /// Per-entity analysis.
    Analysis,
    /// Building dependency chains.
    ChainBuilding,
    /// Generating reports.
    Reporting,
    /// Session finished.
    Complete,
}

impl std::fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryPhase::Discovery => write!(f, "discovery"),
            DiscoveryPhase::Analysis => write!(f, "analysis"),
            DiscoveryPhase::ChainBuilding => write!(f, "chain_building"),
            DiscoveryPhase::Reporting => write!(f, "reporting"),
            DiscoveryPhase::Complete => write!(f, "complete"),
        }
    }
}

impl std::str::FromStr for DiscoveryPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(DiscoveryPhase::Discovery),
            "analysis" => Ok(DiscoveryPhase::Analysis),
            "chain_building" => Ok(DiscoveryPhase::ChainBuilding),
            "reporting" => Ok(DiscoveryPhase::Reporting),
            "complete" => Ok(DiscoveryPhase::Complete),
            _ => Err(format!("Unknown discovery phase: {}", s)),
        }
    }
}

/// Progress counters carried on a session record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    /// Entities discovered so far.
    pub total_entities: usize,
    /// Entities marked processed.
    pub processed_entities: usize,
    /// Relationships discovered so far.
    pub total_relationships: usize,
    /// Chains marked complete or validated.
    pub completed_chains: usize,
    /// Work items still pending.
    pub pending_work_items: usize,
}

/// Configuration snapshot stored on a session record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Entity cache cap active when the session was created.
    pub entity_cache_size: usize,
    /// Token budget compression-trigger fraction.
    pub compression_threshold: f64,
    /// Token budget emergency fraction.
    pub emergency_threshold: f64,
}

/// A discovery effort over one workspace.
///
/// Sessions are never deleted; a fresh effort gets a new session id and
/// supersedes the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySession {
    /// Unique session identifier.
    pub id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    pub updated_at: DateTime<Utc>,
    /// Free-text description of the discovery task.
    pub task_description: String,
    /// Root of the workspace being discovered.
    pub workspace_root: String,
    /// Current phase.
    pub phase: DiscoveryPhase,
    /// Progress counters.
    pub progress: SessionProgress,
    /// Configuration snapshot taken at creation.
    pub settings: SessionSettings,
}

impl DiscoverySession {
    /// Create a new session for a task and workspace.
    pub fn new(task_description: impl Into<String>, workspace_root: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            task_description: task_description.into(),
            workspace_root: workspace_root.into(),
            phase: DiscoveryPhase::Discovery,
            progress: SessionProgress::default(),
            settings: SessionSettings::default(),
        }
    }

    /// Set the phase.
    pub fn with_phase(mut self, phase: DiscoveryPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the configuration snapshot.
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Kind of discovered code entity. Closed enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// HTTP or command controller.
    Controller,
    /// Business-logic service.
    Service,
    /// UI or structural component.
    #[default]
    Component,
    /// Interface or trait definition.
    Interface,
    /// Data model or DTO.
    Model,
    /// Data-access repository.
    Repository,
    /// Module or package grouping.
    Module,
    /// Free function or utility.
    Function,
    /// Anything that fits no other kind.
    Other,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Controller => write!(f, "controller"),
            EntityType::Service => write!(f, "service"),
            EntityType::Component => write!(f, "component"),
            EntityType::Interface => write!(f, "interface"),
            EntityType::Model => write!(f, "model"),
            EntityType::Repository => write!(f, "repository"),
            EntityType::Module => write!(f, "module"),
            EntityType::Function => write!(f, "function"),
            EntityType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "controller" => Ok(EntityType::Controller),
            "service" => Ok(EntityType::Service),
            "component" => Ok(EntityType::Component),
            "interface" => Ok(EntityType::Interface),
            "model" => Ok(EntityType::Model),
            "repository" => Ok(EntityType::Repository),
            "module" => Ok(EntityType::Module),
            "function" => Ok(EntityType::Function),
            "other" => Ok(EntityType::Other),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}

/// Optional analysis payload attached to an entity after processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAnalysis {
    /// How many usage sites were found.
    pub usage_count: usize,
    /// Relevance score in [0, 1]; low-relevance entities compress first.
    pub relevance_score: f64,
    /// Whether the entity's context has been summarized.
    pub summarized: bool,
}

/// A discovered code entity tracked as a graph node.
///
/// The id is caller-assigned and stable for the life of a session.
/// `dependencies` and `dependents` are append-only duplicate-free lists
/// kept symmetric by the relationship-add path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNode {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Path of the file the entity was discovered in.
    pub file_path: String,
    /// How the entity was discovered (e.g. "grep", "import-scan").
    pub discovery_method: String,
    /// Priority, 1 (highest) to 5 (lowest).
    pub priority: u8,
    /// Whether the entity has been processed.
    pub processed: bool,
    /// Business-level context notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_context: Option<String>,
    /// Chain-membership context notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_context: Option<String>,
    /// Domain context notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_context: Option<String>,
    /// Ids of entities this one depends on.
    pub dependencies: Vec<String>,
    /// Ids of entities depending on this one.
    pub dependents: Vec<String>,
    /// Analysis payload, present once the entity has been analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<EntityAnalysis>,
    /// When the entity was first recorded.
    pub created_at: DateTime<Utc>,
    /// When the entity was last updated.
    pub updated_at: DateTime<Utc>,
    /// Agent that discovered the entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_by: Option<String>,
}

impl EntityNode {
    /// Create a new entity with the given caller-assigned id.
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            entity_type,
            file_path: file_path.into(),
            discovery_method: "manual".to_string(),
            priority: 3,
            processed: false,
            business_context: None,
            chain_context: None,
            domain_context: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            analysis: None,
            created_at: now,
            updated_at: now,
            discovered_by: None,
        }
    }

    /// Set the discovery method.
    pub fn with_discovery_method(mut self, method: impl Into<String>) -> Self {
        self.discovery_method = method.into();
        self
    }

    /// Set the priority (clamped to 1..=5).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }

    /// Set the business context.
    pub fn with_business_context(mut self, context: impl Into<String>) -> Self {
        self.business_context = Some(context.into());
        self
    }

    /// Set the analysis payload.
    pub fn with_analysis(mut self, analysis: EntityAnalysis) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Set the discovering agent.
    pub fn with_discovered_by(mut self, agent_id: impl Into<String>) -> Self {
        self.discovered_by = Some(agent_id.into());
        self
    }

    /// Refresh the updated-at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Relevance score for compression ordering; unanalyzed entities
    /// rank lowest.
    pub fn relevance_score(&self) -> f64 {
        self.analysis.as_ref().map(|a| a.relevance_score).unwrap_or(0.0)
    }
}

/// Kind of relationship between two entities. Closed enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Source uses the target.
    #[default]
    Uses,
    /// Source depends on the target.
    DependsOn,
    /// Source calls the target.
    Calls,
    /// Source implements the target interface.
    Implements,
    /// Source extends the target.
    Extends,
    /// Source references the target.
    References,
    /// Source imports the target.
    Imports,
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipType::Uses => write!(f, "uses"),
            RelationshipType::DependsOn => write!(f, "depends_on"),
            RelationshipType::Calls => write!(f, "calls"),
            RelationshipType::Implements => write!(f, "implements"),
            RelationshipType::Extends => write!(f, "extends"),
            RelationshipType::References => write!(f, "references"),
            RelationshipType::Imports => write!(f, "imports"),
        }
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uses" => Ok(RelationshipType::Uses),
            "depends_on" => Ok(RelationshipType::DependsOn),
            "calls" => Ok(RelationshipType::Calls),
            "implements" => Ok(RelationshipType::Implements),
            "extends" => Ok(RelationshipType::Extends),
            "references" => Ok(RelationshipType::References),
            "imports" => Ok(RelationshipType::Imports),
            _ => Err(format!("Unknown relationship type: {}", s)),
        }
    }
}

/// A directed, optionally bidirectional, typed edge between entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Unique edge identifier.
    pub id: String,
    /// Source entity id.
    pub from_entity: String,
    /// Target entity id.
    pub to_entity: String,
    /// Kind of relationship.
    pub relationship_type: RelationshipType,
    /// Strength in [0, 1].
    pub strength: f64,
    /// Whether the edge is meaningful in both directions.
    pub bidirectional: bool,
    /// How the relationship was discovered.
    pub discovery_method: String,
    /// Free-form metadata bag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// When the edge was recorded.
    pub created_at: DateTime<Utc>,
}

impl RelationshipEdge {
    /// Create a new edge between two entities.
    pub fn new(
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            relationship_type,
            strength: 1.0,
            bidirectional: false,
            discovery_method: "manual".to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Set the strength (clamped to [0, 1]).
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// Mark the edge bidirectional.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Set the discovery method.
    pub fn with_discovery_method(mut self, method: impl Into<String>) -> Self {
        self.discovery_method = method.into();
        self
    }

    /// Set the metadata bag.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Kind of work a work item asks for. Closed enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Analyze one entity in depth.
    #[default]
    AnalyzeEntity,
    /// Map an entity's relationships.
    MapRelationships,
    /// Build a dependency chain from an entity.
    BuildChain,
    /// Validate an existing chain.
    ValidateChain,
    /// Generate a report for the session.
    GenerateReport,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::AnalyzeEntity => write!(f, "analyze_entity"),
            TaskType::MapRelationships => write!(f, "map_relationships"),
            TaskType::BuildChain => write!(f, "build_chain"),
            TaskType::ValidateChain => write!(f, "validate_chain"),
            TaskType::GenerateReport => write!(f, "generate_report"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analyze_entity" => Ok(TaskType::AnalyzeEntity),
            "map_relationships" => Ok(TaskType::MapRelationships),
            "build_chain" => Ok(TaskType::BuildChain),
            "validate_chain" => Ok(TaskType::ValidateChain),
            "generate_report" => Ok(TaskType::GenerateReport),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// State of a work item.
///
/// Pending → Assigned → InProgress → Completed | Failed; a failed item
/// returns to Pending while retries remain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Waiting in the queue.
    #[default]
    Pending,
    /// Assigned to an agent, not yet started.
    Assigned,
    /// Being worked on.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItemStatus::Pending => write!(f, "pending"),
            WorkItemStatus::Assigned => write!(f, "assigned"),
            WorkItemStatus::InProgress => write!(f, "in_progress"),
            WorkItemStatus::Completed => write!(f, "completed"),
            WorkItemStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WorkItemStatus::Pending),
            "assigned" => Ok(WorkItemStatus::Assigned),
            "in_progress" => Ok(WorkItemStatus::InProgress),
            "completed" => Ok(WorkItemStatus::Completed),
            "failed" => Ok(WorkItemStatus::Failed),
            _ => Err(format!("Unknown work item status: {}", s)),
        }
    }
}

/// A unit of pending analysis work tied to one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique work item identifier.
    pub id: String,
    /// Target entity id.
    pub entity_id: String,
    /// Kind of work requested.
    pub task_type: TaskType,
    /// Priority, 1 (highest) to 5 (lowest).
    pub priority: u8,
    /// Current status.
    pub status: WorkItemStatus,
    /// Agent the item is assigned to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Set when the item was returned to the queue after its agent
    /// disappeared; orders it ahead of fresh work without touching the
    /// caller-assigned priority. Cleared on the next assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requeued_at: Option<DateTime<Utc>>,
    /// Work items that must complete first.
    pub depends_on: Vec<String>,
    /// How many times the item has been retried.
    pub retry_count: u32,
    /// Retry ceiling.
    pub max_retries: u32,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the item completed, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message from the last failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkItem {
    /// Create a new pending work item for an entity.
    pub fn new(entity_id: impl Into<String>, task_type: TaskType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id: entity_id.into(),
            task_type,
            priority: 3,
            status: WorkItemStatus::Pending,
            assigned_to: None,
            requeued_at: None,
            depends_on: Vec::new(),
            retry_count: 0,
            max_retries: 3,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// Set the priority (clamped to 1..=5).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }

    /// Pre-assign the item to an agent (agent affinity).
    pub fn with_assigned_to(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_to = Some(agent_id.into());
        self
    }

    /// Set the prerequisite work item ids.
    pub fn with_depends_on(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }

    /// Set the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// True while the item may return to the queue after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Pending-queue ordering key: requeued items come first, then
    /// priority ascending, then arrival order.
    pub fn queue_key(&self) -> (bool, u8, DateTime<Utc>) {
        (self.requeued_at.is_none(), self.priority, self.created_at)
    }
}

/// Completion state of a discovery chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Chain is being extended.
    #[default]
    Building,
    /// All links discovered.
    Complete,
    /// A link failed validation.
    Broken,
    /// Chain validated end to end.
    Validated,
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStatus::Building => write!(f, "building"),
            ChainStatus::Complete => write!(f, "complete"),
            ChainStatus::Broken => write!(f, "broken"),
            ChainStatus::Validated => write!(f, "validated"),
        }
    }
}

impl std::str::FromStr for ChainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "building" => Ok(ChainStatus::Building),
            "complete" => Ok(ChainStatus::Complete),
            "broken" => Ok(ChainStatus::Broken),
            "validated" => Ok(ChainStatus::Validated),
            _ => Err(format!("Unknown chain status: {}", s)),
        }
    }
}

/// An ordered path of entity ids representing a discovered dependency
/// sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryChain {
    /// Unique chain identifier.
    pub id: String,
    /// Human-readable chain name.
    pub name: String,
    /// Ordered entity ids forming the chain.
    pub entity_path: Vec<String>,
    /// Completion state.
    pub status: ChainStatus,
    /// When the chain was recorded.
    pub created_at: DateTime<Utc>,
}

impl DiscoveryChain {
    /// Create a new chain with the given path.
    pub fn new(name: impl Into<String>, entity_path: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            entity_path,
            status: ChainStatus::Building,
            created_at: Utc::now(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: ChainStatus) -> Self {
        self.status = status;
        self
    }
}

/// Point-in-time snapshot of session progress, used only for recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointData {
    /// Checkpoint identifier, unique within the session.
    pub checkpoint_id: String,
    /// Owning session id.
    pub session_id: String,
    /// When the checkpoint was taken.
    pub created_at: DateTime<Utc>,
    /// Phase at checkpoint time.
    pub phase: DiscoveryPhase,
    /// Progress counters at checkpoint time.
    pub progress: SessionProgress,
    /// Entity count at checkpoint time.
    pub entity_count: usize,
    /// Relationship count at checkpoint time.
    pub relationship_count: usize,
    /// Optional human label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CheckpointData {
    /// Create a checkpoint for a session.
    pub fn new(session_id: impl Into<String>, phase: DiscoveryPhase) -> Self {
        Self {
            checkpoint_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            phase,
            progress: SessionProgress::default(),
            entity_count: 0,
            relationship_count: 0,
            label: None,
        }
    }

    /// Set the progress snapshot.
    pub fn with_progress(mut self, progress: SessionProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Set the entity and relationship counts.
    pub fn with_counts(mut self, entities: usize, relationships: usize) -> Self {
        self.entity_count = entities;
        self.relationship_count = relationships;
        self
    }

    /// Set the human label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Identifying metadata of an immutable context backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Backup identifier.
    pub id: String,
    /// Session the backup belongs to.
    pub session_id: String,
    /// When the backup was written.
    pub created_at: DateTime<Utc>,
    /// Number of entities in the backup.
    pub entity_count: usize,
    /// Number of relationships in the backup.
    pub relationship_count: usize,
    /// Estimated token cost of the full backup content.
    pub token_estimate: usize,
}

/// Full content of a context backup: metadata plus the archived sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupContent {
    /// Identifying metadata.
    pub metadata: BackupMetadata,
    /// Archived entities.
    pub entities: Vec<EntityNode>,
    /// Archived relationships.
    pub relationships: Vec<RelationshipEdge>,
}

/// Seam over the durable record backend.
///
/// Records are opaque JSON values keyed by (namespace, id); the
/// [`GraphStore`] owns typing. Missing records read as `Ok(None)`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record, replacing any previous value for the id.
    async fn put(&self, namespace: &str, id: &str, record: &serde_json::Value) -> CoreResult<()>;

    /// Read one record, `Ok(None)` when absent.
    async fn get(&self, namespace: &str, id: &str) -> CoreResult<Option<serde_json::Value>>;

    /// List the ids present in a namespace, in unspecified order.
    async fn list_ids(&self, namespace: &str) -> CoreResult<Vec<String>>;

    /// Read every record in a namespace.
    async fn list(&self, namespace: &str) -> CoreResult<Vec<serde_json::Value>>;

    /// Remove one record. Removing an absent record is not an error.
    async fn remove(&self, namespace: &str, id: &str) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entity_type_round_trip() {
        for t in [
            EntityType::Controller,
            EntityType::Service,
            EntityType::Component,
            EntityType::Interface,
            EntityType::Model,
            EntityType::Repository,
            EntityType::Module,
            EntityType::Function,
            EntityType::Other,
        ] {
            assert_eq!(EntityType::from_str(&t.to_string()).unwrap(), t);
        }
        assert!(EntityType::from_str("widget").is_err());
    }

    #[test]
    fn test_relationship_type_round_trip() {
        for t in [
            RelationshipType::Uses,
            RelationshipType::DependsOn,
            RelationshipType::Calls,
            RelationshipType::Implements,
            RelationshipType::Extends,
            RelationshipType::References,
            RelationshipType::Imports,
        ] {
            assert_eq!(RelationshipType::from_str(&t.to_string()).unwrap(), t);
        }
    }

    #[test]
    fn test_work_item_status_round_trip() {
        for s in [
            WorkItemStatus::Pending,
            WorkItemStatus::Assigned,
            WorkItemStatus::InProgress,
            WorkItemStatus::Completed,
            WorkItemStatus::Failed,
        ] {
            assert_eq!(WorkItemStatus::from_str(&s.to_string()).unwrap(), s);
        }
    }

    #[test]
    fn test_entity_builder() {
        let entity = EntityNode::new("svc-auth", EntityType::Service, "src/auth/service.ts")
            .with_priority(9)
            .with_discovery_method("import-scan")
            .with_discovered_by("agent-1");

        assert_eq!(entity.priority, 5, "priority clamps to 1..=5");
        assert_eq!(entity.discovery_method, "import-scan");
        assert_eq!(entity.discovered_by.as_deref(), Some("agent-1"));
        assert!(!entity.processed);
        assert!(entity.dependencies.is_empty());
    }

    #[test]
    fn test_entity_relevance_defaults_to_zero() {
        let entity = EntityNode::new("e1", EntityType::Component, "a.ts");
        assert_eq!(entity.relevance_score(), 0.0);

        let entity = entity.with_analysis(EntityAnalysis {
            usage_count: 4,
            relevance_score: 0.7,
            summarized: false,
        });
        assert!((entity.relevance_score() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_relationship_strength_clamps() {
        let edge = RelationshipEdge::new("a", "b", RelationshipType::Calls).with_strength(1.7);
        assert!((edge.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_work_item_retry_budget() {
        let mut item = WorkItem::new("e1", TaskType::AnalyzeEntity).with_max_retries(1);
        assert!(item.can_retry());
        item.retry_count = 1;
        assert!(!item.can_retry());
    }

    #[test]
    fn test_session_serializes_dates_as_iso8601() {
        let session = DiscoverySession::new("map the auth flow", "/repo");
        let json = serde_json::to_value(&session).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.contains('T'), "expected ISO-8601 timestamp: {}", created);

        let back: DiscoverySession = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.phase, DiscoveryPhase::Discovery);
    }

    #[test]
    fn test_checkpoint_namespace_path() {
        assert_eq!(namespace::checkpoints("sess-1"), "checkpoints/sess-1");
    }
}
