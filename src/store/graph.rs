//! Graph store: CRUD, BFS pathfinding, and the priority work queue.
//!
//! Layers one [`BoundedCache`] per namespace over an injected
//! [`RecordStore`] backend. Every mutation persists to the backend
//! before touching the cache, so an I/O failure never leaves the cache
//! ahead of durable state. Missing records read as `Ok(None)`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::BoundedCache;
use super::files::FileRecordStore;
use super::{
    namespace, ChainStatus, CheckpointData, DiscoveryChain, DiscoverySession, EntityNode,
    EntityType, RecordStore, RelationshipEdge, RelationshipType, WorkItem, WorkItemStatus,
};
use crate::cancel::CancelFlag;
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};

/// Filter for [`GraphStore::get_all_entities`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Keep only entities of this type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    /// Keep only entities with this processed flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    /// Keep only entities at this priority or more urgent (numerically
    /// lower or equal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority: Option<u8>,
}

impl EntityFilter {
    /// Filter by entity type.
    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Filter by processed flag.
    pub fn with_processed(mut self, processed: bool) -> Self {
        self.processed = Some(processed);
        self
    }

    /// Filter by priority ceiling.
    pub fn with_max_priority(mut self, max_priority: u8) -> Self {
        self.max_priority = Some(max_priority);
        self
    }

    fn matches(&self, entity: &EntityNode) -> bool {
        if let Some(t) = self.entity_type {
            if entity.entity_type != t {
                return false;
            }
        }
        if let Some(p) = self.processed {
            if entity.processed != p {
                return false;
            }
        }
        if let Some(max) = self.max_priority {
            if entity.priority > max {
                return false;
            }
        }
        true
    }
}

/// Durable keyed storage for discovery state with per-namespace caches.
pub struct GraphStore {
    backend: Arc<dyn RecordStore>,
    entities: Mutex<BoundedCache<EntityNode>>,
    relationships: Mutex<BoundedCache<RelationshipEdge>>,
    work_items: Mutex<BoundedCache<WorkItem>>,
    chains: Mutex<BoundedCache<DiscoveryChain>>,
    sessions: Mutex<BoundedCache<DiscoverySession>>,
    cancel: CancelFlag,
}

/// Recover the guard from a poisoned lock; cache state is a plain map
/// and stays usable after a panicking writer.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GraphStore {
    /// Build a store over an injected backend.
    pub fn new(backend: Arc<dyn RecordStore>, config: &StoreConfig) -> Self {
        let buf = config.cleanup_buffer;
        Self {
            backend,
            entities: Mutex::new(BoundedCache::new("entities", config.entity_cache_size, buf)),
            relationships: Mutex::new(BoundedCache::new(
                "relationships",
                config.relationship_cache_size,
                buf,
            )),
            work_items: Mutex::new(BoundedCache::new(
                "work-items",
                config.work_item_cache_size,
                buf,
            )),
            chains: Mutex::new(BoundedCache::new("chains", config.chain_cache_size, buf)),
            sessions: Mutex::new(BoundedCache::new("sessions", config.session_cache_size, buf)),
            cancel: CancelFlag::new(),
        }
    }

    /// Open a file-backed store rooted at `config.state_root`.
    pub async fn open(config: &StoreConfig) -> CoreResult<Self> {
        let backend = FileRecordStore::new(config.state_root.clone()).await?;
        info!(root = %config.state_root.display(), "graph store opened");
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Install a shared cancellation flag checked by bulk scans.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    async fn persist<T: Serialize>(&self, ns: &str, id: &str, record: &T) -> CoreResult<()> {
        let value = serde_json::to_value(record)?;
        self.backend.put(ns, id, &value).await
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Add an entity. A second add with the same id replaces the first
    /// (last write wins).
    pub async fn add_entity(&self, entity: EntityNode) -> CoreResult<()> {
        validate_id("entity id", &entity.id)?;
        validate_priority(entity.priority)?;
        self.persist(namespace::ENTITIES, &entity.id, &entity).await?;
        debug!(entity_id = %entity.id, entity_type = %entity.entity_type, "entity added");
        lock(&self.entities).insert(entity.id.clone(), entity);
        Ok(())
    }

    /// Update an existing entity; fails with `NotFound` when the id was
    /// never added.
    pub async fn update_entity(&self, mut entity: EntityNode) -> CoreResult<EntityNode> {
        if self.get_entity(&entity.id).await?.is_none() {
            return Err(CoreError::not_found("entity", &entity.id));
        }
        validate_priority(entity.priority)?;
        entity.touch();
        self.persist(namespace::ENTITIES, &entity.id, &entity).await?;
        lock(&self.entities).insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    /// Fetch an entity by id, `Ok(None)` when absent.
    pub async fn get_entity(&self, id: &str) -> CoreResult<Option<EntityNode>> {
        if let Some(entity) = lock(&self.entities).get(id) {
            return Ok(Some(entity));
        }
        let Some(value) = self.backend.get(namespace::ENTITIES, id).await? else {
            return Ok(None);
        };
        let entity: EntityNode = serde_json::from_value(value)?;
        lock(&self.entities).insert(entity.id.clone(), entity.clone());
        Ok(Some(entity))
    }

    /// List entities matching a filter, ordered by creation time.
    ///
    /// Reads durable storage, not the cache, so evicted entities are
    /// included. Checks the cancellation flag between records.
    pub async fn get_all_entities(&self, filter: &EntityFilter) -> CoreResult<Vec<EntityNode>> {
        let mut entities = Vec::new();
        for value in self.backend.list(namespace::ENTITIES).await? {
            self.cancel.check()?;
            let entity: EntityNode = serde_json::from_value(value)?;
            if filter.matches(&entity) {
                entities.push(entity);
            }
        }
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entities)
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    /// Add a relationship edge.
    ///
    /// When both endpoint entities exist, the source's dependents list
    /// gains the target and the target's dependencies list gains the
    /// source; both lists stay duplicate-free.
    pub async fn add_relationship(&self, edge: RelationshipEdge) -> CoreResult<()> {
        validate_id("relationship id", &edge.id)?;
        validate_id("from_entity", &edge.from_entity)?;
        validate_id("to_entity", &edge.to_entity)?;
        if !(0.0..=1.0).contains(&edge.strength) {
            return Err(CoreError::validation("strength must be within [0, 1]"));
        }

        self.persist(namespace::RELATIONSHIPS, &edge.id, &edge).await?;
        lock(&self.relationships).insert(edge.id.clone(), edge.clone());

        let from = self.get_entity(&edge.from_entity).await?;
        let to = self.get_entity(&edge.to_entity).await?;
        if let (Some(mut from), Some(mut to)) = (from, to) {
            let mut dirty_from = false;
            let mut dirty_to = false;
            if !from.dependents.contains(&edge.to_entity) {
                from.dependents.push(edge.to_entity.clone());
                dirty_from = true;
            }
            if !to.dependencies.contains(&edge.from_entity) {
                to.dependencies.push(edge.from_entity.clone());
                dirty_to = true;
            }
            if dirty_from {
                from.touch();
                self.persist(namespace::ENTITIES, &from.id, &from).await?;
                lock(&self.entities).insert(from.id.clone(), from);
            }
            if dirty_to {
                to.touch();
                self.persist(namespace::ENTITIES, &to.id, &to).await?;
                lock(&self.entities).insert(to.id.clone(), to);
            }
        } else {
            debug!(
                edge_id = %edge.id,
                "endpoint entity missing; dependency lists not updated"
            );
        }
        Ok(())
    }

    /// List the edges touching an entity, optionally restricted by type.
    pub async fn get_relationships(
        &self,
        entity_id: &str,
        relationship_type: Option<RelationshipType>,
    ) -> CoreResult<Vec<RelationshipEdge>> {
        let all = self.get_all_relationships().await?;
        Ok(all
            .into_iter()
            .filter(|e| e.from_entity == entity_id || e.to_entity == entity_id)
            .filter(|e| relationship_type.map_or(true, |t| e.relationship_type == t))
            .collect())
    }

    /// List every relationship edge, ordered by creation time.
    pub async fn get_all_relationships(&self) -> CoreResult<Vec<RelationshipEdge>> {
        let mut edges = Vec::new();
        for value in self.backend.list(namespace::RELATIONSHIPS).await? {
            self.cancel.check()?;
            let edge: RelationshipEdge = serde_json::from_value(value)?;
            edges.push(edge);
        }
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(edges)
    }

    // ------------------------------------------------------------------
    // Work queue
    // ------------------------------------------------------------------

    /// Enqueue a work item.
    pub async fn add_work_item(&self, item: WorkItem) -> CoreResult<()> {
        validate_id("work item id", &item.id)?;
        validate_priority(item.priority)?;
        self.persist(namespace::WORK_ITEMS, &item.id, &item).await?;
        debug!(work_item = %item.id, task_type = %item.task_type, "work item enqueued");
        lock(&self.work_items).insert(item.id.clone(), item);
        Ok(())
    }

    /// Fetch a work item by id, `Ok(None)` when absent.
    pub async fn get_work_item(&self, id: &str) -> CoreResult<Option<WorkItem>> {
        if let Some(item) = lock(&self.work_items).get(id) {
            return Ok(Some(item));
        }
        let Some(value) = self.backend.get(namespace::WORK_ITEMS, id).await? else {
            return Ok(None);
        };
        let item: WorkItem = serde_json::from_value(value)?;
        lock(&self.work_items).insert(item.id.clone(), item.clone());
        Ok(Some(item))
    }

    /// List work items, optionally restricted to one status.
    pub async fn get_work_items(
        &self,
        status: Option<WorkItemStatus>,
    ) -> CoreResult<Vec<WorkItem>> {
        let mut items = Vec::new();
        for value in self.backend.list(namespace::WORK_ITEMS).await? {
            self.cancel.check()?;
            let item: WorkItem = serde_json::from_value(value)?;
            if status.map_or(true, |s| item.status == s) {
                items.push(item);
            }
        }
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    /// Dequeue the next eligible pending item.
    ///
    /// Scans pending items, keeps those within the optional priority
    /// ceiling and with matching agent affinity (unassigned, or
    /// pre-assigned to `agent_id`), picks the most urgent by
    /// [`WorkItem::queue_key`] (requeued items first, then priority
    /// ascending, then creation time), marks it assigned, and persists
    /// the status change before returning. `Ok(None)` when nothing is
    /// eligible.
    ///
    /// The selected item is reserved in the cache before the persisting
    /// await, so an interleaved dequeue in the same process cannot pick
    /// the same item; a multi-process deployment would need a version
    /// check on the record instead.
    pub async fn next_work_item(
        &self,
        max_priority: Option<u8>,
        agent_id: Option<&str>,
    ) -> CoreResult<Option<WorkItem>> {
        let pending = self.get_work_items(Some(WorkItemStatus::Pending)).await?;
        let candidate = pending
            .into_iter()
            .filter(|item| max_priority.map_or(true, |max| item.priority <= max))
            .filter(|item| match (&item.assigned_to, agent_id) {
                (None, _) => true,
                (Some(affinity), Some(agent)) => affinity == agent,
                (Some(_), None) => false,
            })
            .min_by_key(|item| item.queue_key());

        let Some(mut item) = candidate else {
            return Ok(None);
        };

        // In-process reservation: flip status under the lock before the
        // persisting await.
        let previous = {
            let mut cache = lock(&self.work_items);
            if let Some(cached) = cache.get(&item.id) {
                if cached.status != WorkItemStatus::Pending {
                    return Ok(None);
                }
            }
            item.status = WorkItemStatus::Assigned;
            if let Some(agent) = agent_id {
                item.assigned_to = Some(agent.to_string());
            }
            item.requeued_at = None;
            item.updated_at = Utc::now();
            let previous = cache.get(&item.id);
            cache.insert(item.id.clone(), item.clone());
            previous
        };

        match self.persist(namespace::WORK_ITEMS, &item.id, &item).await {
            Ok(()) => {
                debug!(
                    work_item = %item.id,
                    agent = agent_id.unwrap_or("-"),
                    priority = item.priority,
                    "work item assigned"
                );
                Ok(Some(item))
            }
            Err(e) => {
                // Roll the reservation back so the item stays dequeueable.
                let mut cache = lock(&self.work_items);
                match previous {
                    Some(prev) => cache.insert(item.id.clone(), prev),
                    None => {
                        cache.remove(&item.id);
                    }
                }
                Err(e)
            }
        }
    }

    /// Assign one specific pending item to an agent.
    ///
    /// Used by coordinators that pick the (item, agent) pairing
    /// themselves instead of taking the queue head. Returns `Ok(None)`
    /// when the item is absent, no longer pending, or pre-assigned to a
    /// different agent. The same in-process cache reservation as
    /// [`next_work_item`](Self::next_work_item) guards the persisting
    /// await.
    pub async fn claim_work_item(
        &self,
        id: &str,
        agent_id: &str,
    ) -> CoreResult<Option<WorkItem>> {
        let Some(mut item) = self.get_work_item(id).await? else {
            return Ok(None);
        };
        if item.status != WorkItemStatus::Pending {
            return Ok(None);
        }
        if let Some(affinity) = &item.assigned_to {
            if affinity != agent_id {
                return Ok(None);
            }
        }

        let previous = {
            let mut cache = lock(&self.work_items);
            if let Some(cached) = cache.get(&item.id) {
                if cached.status != WorkItemStatus::Pending {
                    return Ok(None);
                }
            }
            item.status = WorkItemStatus::Assigned;
            item.assigned_to = Some(agent_id.to_string());
            item.requeued_at = None;
            item.updated_at = Utc::now();
            let previous = cache.get(&item.id);
            cache.insert(item.id.clone(), item.clone());
            previous
        };

        match self.persist(namespace::WORK_ITEMS, &item.id, &item).await {
            Ok(()) => {
                debug!(work_item = %item.id, agent = agent_id, "work item claimed");
                Ok(Some(item))
            }
            Err(e) => {
                let mut cache = lock(&self.work_items);
                match previous {
                    Some(prev) => cache.insert(item.id.clone(), prev),
                    None => {
                        cache.remove(&item.id);
                    }
                }
                Err(e)
            }
        }
    }

    /// Apply a status transition to a work item.
    ///
    /// A failure with retries remaining returns the item to the queue
    /// (status back to pending, retry count incremented, assignment
    /// cleared). Fails with `NotFound` for an unknown id.
    pub async fn update_work_item_status(
        &self,
        id: &str,
        status: WorkItemStatus,
        error: Option<String>,
    ) -> CoreResult<WorkItem> {
        let Some(mut item) = self.get_work_item(id).await? else {
            return Err(CoreError::not_found("work item", id));
        };

        match status {
            WorkItemStatus::Completed => {
                item.status = WorkItemStatus::Completed;
                item.completed_at = Some(Utc::now());
                item.error = None;
            }
            WorkItemStatus::Failed => {
                item.error = error;
                if item.can_retry() {
                    item.retry_count += 1;
                    item.status = WorkItemStatus::Pending;
                    item.assigned_to = None;
                    debug!(
                        work_item = %item.id,
                        retry = item.retry_count,
                        "work item returned to queue for retry"
                    );
                } else {
                    item.status = WorkItemStatus::Failed;
                    item.completed_at = Some(Utc::now());
                    warn!(work_item = %item.id, "work item failed permanently");
                }
            }
            other => {
                item.status = other;
                if let Some(message) = error {
                    item.error = Some(message);
                }
            }
        }
        item.updated_at = Utc::now();

        self.persist(namespace::WORK_ITEMS, &item.id, &item).await?;
        lock(&self.work_items).insert(item.id.clone(), item.clone());
        Ok(item)
    }

    /// Return an in-flight item to the front of the queue.
    ///
    /// Used when an agent disappears mid-task: the item goes back to
    /// pending with `requeued_at` stamped so the next dequeue picks it
    /// up before fresh work. Its caller-assigned priority is left
    /// untouched and reapplies once the requeue flag is cleared on the
    /// next assignment. Fails with `NotFound` for an unknown id.
    pub async fn requeue_work_item(&self, id: &str) -> CoreResult<WorkItem> {
        let Some(mut item) = self.get_work_item(id).await? else {
            return Err(CoreError::not_found("work item", id));
        };
        item.status = WorkItemStatus::Pending;
        item.assigned_to = None;
        item.requeued_at = Some(Utc::now());
        item.updated_at = Utc::now();

        self.persist(namespace::WORK_ITEMS, &item.id, &item).await?;
        debug!(work_item = %item.id, "work item requeued at front");
        lock(&self.work_items).insert(item.id.clone(), item.clone());
        Ok(item)
    }

    // ------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------

    /// Record a discovery chain.
    pub async fn add_chain(&self, chain: DiscoveryChain) -> CoreResult<()> {
        validate_id("chain id", &chain.id)?;
        if chain.entity_path.is_empty() {
            return Err(CoreError::validation("chain entity_path must not be empty"));
        }
        self.persist(namespace::CHAINS, &chain.id, &chain).await?;
        lock(&self.chains).insert(chain.id.clone(), chain);
        Ok(())
    }

    /// Update a chain's completion status. Fails with `NotFound` for an
    /// unknown id.
    pub async fn update_chain_status(
        &self,
        id: &str,
        status: ChainStatus,
    ) -> CoreResult<DiscoveryChain> {
        let cached = lock(&self.chains).get(id);
        let mut chain = match cached {
            Some(chain) => chain,
            None => {
                let Some(value) = self.backend.get(namespace::CHAINS, id).await? else {
                    return Err(CoreError::not_found("chain", id));
                };
                serde_json::from_value(value)?
            }
        };
        chain.status = status;
        self.persist(namespace::CHAINS, &chain.id, &chain).await?;
        lock(&self.chains).insert(chain.id.clone(), chain.clone());
        Ok(chain)
    }

    /// List every chain, ordered by creation time.
    pub async fn get_all_chains(&self) -> CoreResult<Vec<DiscoveryChain>> {
        let mut chains = Vec::new();
        for value in self.backend.list(namespace::CHAINS).await? {
            self.cancel.check()?;
            let chain: DiscoveryChain = serde_json::from_value(value)?;
            chains.push(chain);
        }
        chains.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(chains)
    }

    // ------------------------------------------------------------------
    // Sessions and checkpoints
    // ------------------------------------------------------------------

    /// Persist a session record.
    pub async fn save_session(&self, mut session: DiscoverySession) -> CoreResult<()> {
        validate_id("session id", &session.id)?;
        session.updated_at = Utc::now();
        self.persist(namespace::SESSIONS, &session.id, &session).await?;
        lock(&self.sessions).insert(session.id.clone(), session);
        Ok(())
    }

    /// Persist a coordination report for a session, replacing any
    /// previous report.
    pub async fn save_report<T: Serialize + Sync>(
        &self,
        session_id: &str,
        report: &T,
    ) -> CoreResult<()> {
        validate_id("session id", session_id)?;
        self.persist(namespace::REPORTS, session_id, report).await
    }

    /// Load a session, `Ok(None)` when absent.
    pub async fn load_session(&self, id: &str) -> CoreResult<Option<DiscoverySession>> {
        if let Some(session) = lock(&self.sessions).get(id) {
            return Ok(Some(session));
        }
        let Some(value) = self.backend.get(namespace::SESSIONS, id).await? else {
            return Ok(None);
        };
        let session: DiscoverySession = serde_json::from_value(value)?;
        lock(&self.sessions).insert(session.id.clone(), session.clone());
        Ok(Some(session))
    }

    /// Persist a checkpoint under `checkpoints/{session_id}/`.
    pub async fn save_checkpoint(&self, checkpoint: CheckpointData) -> CoreResult<()> {
        validate_id("session id", &checkpoint.session_id)?;
        validate_id("checkpoint id", &checkpoint.checkpoint_id)?;
        let ns = namespace::checkpoints(&checkpoint.session_id);
        self.persist(&ns, &checkpoint.checkpoint_id, &checkpoint).await?;
        debug!(
            session = %checkpoint.session_id,
            checkpoint = %checkpoint.checkpoint_id,
            "checkpoint saved"
        );
        Ok(())
    }

    /// Load one checkpoint, `Ok(None)` when absent.
    pub async fn load_checkpoint(
        &self,
        session_id: &str,
        checkpoint_id: &str,
    ) -> CoreResult<Option<CheckpointData>> {
        let ns = namespace::checkpoints(session_id);
        let Some(value) = self.backend.get(&ns, checkpoint_id).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// List a session's checkpoints, oldest first.
    pub async fn list_checkpoints(&self, session_id: &str) -> CoreResult<Vec<CheckpointData>> {
        let ns = namespace::checkpoints(session_id);
        let mut checkpoints = Vec::new();
        for value in self.backend.list(&ns).await? {
            self.cancel.check()?;
            let checkpoint: CheckpointData = serde_json::from_value(value)?;
            checkpoints.push(checkpoint);
        }
        checkpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(checkpoints)
    }

    /// Delete all but the newest `keep_last` checkpoints of a session.
    pub async fn prune_checkpoints(&self, session_id: &str, keep_last: usize) -> CoreResult<usize> {
        let checkpoints = self.list_checkpoints(session_id).await?;
        if checkpoints.len() <= keep_last {
            return Ok(0);
        }
        let ns = namespace::checkpoints(session_id);
        let prune_count = checkpoints.len() - keep_last;
        for checkpoint in checkpoints.iter().take(prune_count) {
            self.backend.remove(&ns, &checkpoint.checkpoint_id).await?;
        }
        info!(session = %session_id, pruned = prune_count, "checkpoints pruned");
        Ok(prune_count)
    }

    // ------------------------------------------------------------------
    // Pathfinding
    // ------------------------------------------------------------------

    /// Find the shortest path between two entities over the relationship
    /// graph, treating edges as undirected.
    ///
    /// Returns the path as an ordered id list, `[from]` when the
    /// endpoints coincide, or an empty list when unreachable.
    pub async fn find_path(&self, from: &str, to: &str) -> CoreResult<Vec<String>> {
        if from == to {
            return Ok(vec![from.to_string()]);
        }

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for edge in self.get_all_relationships().await? {
            adjacency
                .entry(edge.from_entity.clone())
                .or_default()
                .push(edge.to_entity.clone());
            adjacency
                .entry(edge.to_entity)
                .or_default()
                .push(edge.from_entity);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(from.to_string());
        queue.push_back(from.to_string());

        while let Some(current) = queue.pop_front() {
            self.cancel.check()?;
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };
            for neighbor in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                parent.insert(neighbor.clone(), current.clone());
                if neighbor == to {
                    return Ok(reconstruct_path(&parent, from, to));
                }
                queue.push_back(neighbor.clone());
            }
        }

        Ok(Vec::new())
    }
}

fn reconstruct_path(parent: &HashMap<String, String>, from: &str, to: &str) -> Vec<String> {
    let mut path = vec![to.to_string()];
    let mut current = to;
    while current != from {
        let Some(prev) = parent.get(current) else {
            return Vec::new();
        };
        path.push(prev.clone());
        current = prev;
    }
    path.reverse();
    path
}

fn validate_id(what: &str, id: &str) -> CoreResult<()> {
    if id.trim().is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn validate_priority(priority: u8) -> CoreResult<()> {
    if !(1..=5).contains(&priority) {
        return Err(CoreError::validation(format!(
            "priority must be 1..=5, got {}",
            priority
        )));
    }
    Ok(())
}
