//! Multi-agent task coordination over the shared work queue.
//!
//! The coordinator owns the agent roster: registration against a
//! capacity cap, per-agent capability and specialization metadata,
//! heartbeat-driven liveness, and rolling performance counters. Task
//! distribution pairs pending work items with live agents under one of
//! four strategies and claims each pairing through the store, so every
//! assignment is durable before an agent hears about it.
//!
//! Completion reports update the agent's counters and immediately
//! trigger another distribution pass, keeping agents saturated without
//! a polling loop.

mod heartbeat;


pub use heartbeat::HeartbeatMonitor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::{GraphStore, TaskType, WorkItem, WorkItemStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Static description of an agent supplied at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfiguration {
    /// Unique agent identifier.
    pub id: String,
    /// Task types the agent can perform.
    pub capabilities: Vec<TaskType>,
    /// Domain tags the agent specializes in, matched against entity ids.
    #[serde(default)]
    pub specializations: Vec<String>,
    /// How many tasks the agent works concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
}

fn default_max_concurrent() -> usize {
    1
}

impl AgentConfiguration {
    /// Describe an agent with the given id and capabilities.
    pub fn new(id: impl Into<String>, capabilities: Vec<TaskType>) -> Self {
        Self {
            id: id.into(),
            capabilities,
            specializations: Vec::new(),
            max_concurrent_tasks: default_max_concurrent(),
        }
    }

    /// Set the specialization tags.
    pub fn with_specializations(mut self, tags: Vec<String>) -> Self {
        self.specializations = tags;
        self
    }

    /// Set the concurrency limit (minimum 1).
    pub fn with_max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n.max(1);
        self
    }
}

/// Liveness state of a registered agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered and idle.
    #[default]
    Available,
    /// Working at least one task.
    Busy,
    /// Missed its heartbeat window; tasks were requeued.
    Disconnected,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Available => write!(f, "available"),
            AgentState::Busy => write!(f, "busy"),
            AgentState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Rolling performance counters for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    /// Tasks completed successfully.
    pub tasks_completed: usize,
    /// Tasks reported failed.
    pub tasks_failed: usize,
    /// Fraction of reports that were successes; starts at 1.0 so new
    /// agents are not penalized before their first report.
    pub success_rate: f64,
    /// Rolling mean task duration, in seconds.
    pub average_duration_secs: f64,
}

impl Default for AgentPerformance {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            success_rate: 1.0,
            average_duration_secs: 0.0,
        }
    }
}

impl AgentPerformance {
    fn record(&mut self, success: bool, duration_secs: f64) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        let total = self.tasks_completed + self.tasks_failed;
        self.success_rate = self.tasks_completed as f64 / total as f64;
        // Rolling mean over all reports.
        self.average_duration_secs +=
            (duration_secs - self.average_duration_secs) / total as f64;
    }
}

/// Live view of one registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Registration-time description.
    pub config: AgentConfiguration,
    /// Liveness state.
    pub state: AgentState,
    /// Ids of work items currently assigned to the agent.
    pub current_tasks: Vec<String>,
    /// When each in-flight task was assigned, keyed by work item id.
    #[serde(default)]
    pub task_started: HashMap<String, DateTime<Utc>>,
    /// When the agent last heartbeated.
    pub last_heartbeat: DateTime<Utc>,
    /// When the agent registered.
    pub registered_at: DateTime<Utc>,
    /// Rolling counters.
    pub performance: AgentPerformance,
}

impl AgentStatus {
    fn new(config: AgentConfiguration) -> Self {
        let now = Utc::now();
        Self {
            config,
            state: AgentState::Available,
            current_tasks: Vec::new(),
            task_started: HashMap::new(),
            last_heartbeat: now,
            registered_at: now,
            performance: AgentPerformance::default(),
        }
    }

    fn has_capacity(&self) -> bool {
        self.state != AgentState::Disconnected
            && self.current_tasks.len() < self.config.max_concurrent_tasks
    }

    fn load_fraction(&self) -> f64 {
        self.current_tasks.len() as f64 / self.config.max_concurrent_tasks.max(1) as f64
    }
}

/// Outcome of a registration attempt. A capacity refusal is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// Whether the agent was admitted.
    pub accepted: bool,
    /// Human-readable explanation.
    pub message: String,
}

/// How pending work is paired with agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    /// Score agents on capability, specialization, track record, and
    /// load; highest score wins, ties go to the earliest registration.
    #[default]
    CapabilityBased,
    /// Always the least-loaded agent.
    LoadBalanced,
    /// Process priority bands ascending, assigning within a band to the
    /// first agent with spare capacity.
    PriorityWeighted,
    /// Rotate through agents, skipping any at capacity.
    RoundRobin,
}

impl std::fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionStrategy::CapabilityBased => write!(f, "capability_based"),
            DistributionStrategy::LoadBalanced => write!(f, "load_balanced"),
            DistributionStrategy::PriorityWeighted => write!(f, "priority_weighted"),
            DistributionStrategy::RoundRobin => write!(f, "round_robin"),
        }
    }
}

/// One (work item, agent) pairing produced by a distribution pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned work item id.
    pub work_item_id: String,
    /// Receiving agent id.
    pub agent_id: String,
    /// Kind of work assigned.
    pub task_type: TaskType,
}

/// Aggregate counters for one coordination run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoordinationStats {
    /// Assignments made across all distribution passes.
    pub tasks_assigned: usize,
    /// Tasks reported complete.
    pub tasks_completed: usize,
    /// Tasks reported failed.
    pub tasks_failed: usize,
    /// Tasks requeued after an agent disconnected.
    pub tasks_requeued: usize,
    /// Agents currently registered.
    pub agents_registered: usize,
    /// Agents marked disconnected by the heartbeat monitor.
    pub agents_disconnected: usize,
}

/// Snapshot of a coordination run, persisted as the session's report on
/// [`TaskCoordinator::stop`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationSession {
    /// Unique run identifier.
    pub id: String,
    /// Discovery session the run coordinated.
    pub session_id: String,
    /// Strategy in effect.
    pub strategy: DistributionStrategy,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run stopped, once it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// Aggregate counters.
    pub stats: CoordinationStats,
    /// Final agent roster snapshot.
    pub agents: Vec<AgentStatus>,
}

/// Distributes the shared work queue across registered agents.
pub struct TaskCoordinator {
    store: Arc<GraphStore>,
    session_id: String,
    run_id: String,
    started_at: DateTime<Utc>,
    config: CoordinatorConfig,
    strategy: DistributionStrategy,
    agents: Mutex<Vec<AgentStatus>>,
    round_robin_cursor: Mutex<usize>,
    stats: Mutex<CoordinationStats>,
    cancel: CancelFlag,
}

impl TaskCoordinator {
    /// Build a coordinator for a discovery session.
    pub fn new(
        store: Arc<GraphStore>,
        session_id: impl Into<String>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            config,
            strategy: DistributionStrategy::default(),
            agents: Mutex::new(Vec::new()),
            round_robin_cursor: Mutex::new(0),
            stats: Mutex::new(CoordinationStats::default()),
            cancel: CancelFlag::new(),
        }
    }

    /// Set the distribution strategy.
    pub fn with_strategy(mut self, strategy: DistributionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Install a shared cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The discovery session being coordinated.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    /// Register an agent.
    ///
    /// Hitting the agent cap refuses the registration in the outcome
    /// rather than failing the call. Re-registering a known id updates
    /// its configuration and restores it to available, which is how a
    /// disconnected agent rejoins.
    pub fn register_agent(&self, config: AgentConfiguration) -> CoreResult<RegistrationOutcome> {
        if config.id.trim().is_empty() {
            return Err(CoreError::validation("agent id must not be empty"));
        }
        if config.capabilities.is_empty() {
            return Err(CoreError::validation(
                "agent must declare at least one capability",
            ));
        }

        let mut agents = lock(&self.agents);
        if let Some(existing) = agents.iter_mut().find(|a| a.config.id == config.id) {
            existing.config = config;
            existing.state = AgentState::Available;
            existing.last_heartbeat = Utc::now();
            info!(agent = %existing.config.id, "agent re-registered");
            return Ok(RegistrationOutcome {
                accepted: true,
                message: "agent re-registered".to_string(),
            });
        }
        if agents.len() >= self.config.max_agents {
            warn!(
                agent = %config.id,
                max_agents = self.config.max_agents,
                "registration refused at capacity"
            );
            return Ok(RegistrationOutcome {
                accepted: false,
                message: format!("maximum of {} agents reached", self.config.max_agents),
            });
        }

        info!(agent = %config.id, capabilities = config.capabilities.len(), "agent registered");
        agents.push(AgentStatus::new(config));
        lock(&self.stats).agents_registered = agents.len();
        Ok(RegistrationOutcome {
            accepted: true,
            message: "agent registered".to_string(),
        })
    }

    /// Remove an agent, requeueing its in-flight tasks.
    pub async fn unregister_agent(&self, agent_id: &str) -> CoreResult<()> {
        let orphaned = {
            let mut agents = lock(&self.agents);
            let Some(index) = agents.iter().position(|a| a.config.id == agent_id) else {
                return Err(CoreError::not_found("agent", agent_id));
            };
            let agent = agents.remove(index);
            lock(&self.stats).agents_registered = agents.len();
            agent.current_tasks
        };
        self.requeue_orphans(agent_id, &orphaned).await?;
        info!(agent = %agent_id, "agent unregistered");
        Ok(())
    }

    /// Record a heartbeat, restoring a disconnected agent to available.
    pub fn record_heartbeat(&self, agent_id: &str) -> CoreResult<()> {
        let mut agents = lock(&self.agents);
        let Some(agent) = agents.iter_mut().find(|a| a.config.id == agent_id) else {
            return Err(CoreError::not_found("agent", agent_id));
        };
        agent.last_heartbeat = Utc::now();
        if agent.state == AgentState::Disconnected {
            agent.state = if agent.current_tasks.is_empty() {
                AgentState::Available
            } else {
                AgentState::Busy
            };
            info!(agent = %agent_id, "agent reconnected");
        }
        Ok(())
    }

    /// Mark agents silent past the timeout as disconnected and requeue
    /// their in-flight tasks at the front of the queue. Returns how many
    /// agents were expired.
    pub async fn expire_stale_agents(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let timeout = chrono::Duration::milliseconds(self.config.heartbeat_timeout_ms as i64);
        let expired: Vec<(String, Vec<String>)> = {
            let mut agents = lock(&self.agents);
            let mut expired = Vec::new();
            for agent in agents.iter_mut() {
                if agent.state == AgentState::Disconnected {
                    continue;
                }
                if now - agent.last_heartbeat > timeout {
                    agent.state = AgentState::Disconnected;
                    let tasks = std::mem::take(&mut agent.current_tasks);
                    agent.task_started.clear();
                    expired.push((agent.config.id.clone(), tasks));
                }
            }
            if !expired.is_empty() {
                lock(&self.stats).agents_disconnected += expired.len();
            }
            expired
        };

        for (agent_id, tasks) in &expired {
            warn!(agent = %agent_id, orphaned = tasks.len(), "agent missed heartbeat window");
            self.requeue_orphans(agent_id, tasks).await?;
        }
        Ok(expired.len())
    }

    async fn requeue_orphans(&self, agent_id: &str, task_ids: &[String]) -> CoreResult<()> {
        for task_id in task_ids {
            self.cancel.check()?;
            match self.store.requeue_work_item(task_id).await {
                Ok(_) => {
                    lock(&self.stats).tasks_requeued += 1;
                    debug!(work_item = %task_id, agent = %agent_id, "orphaned task requeued");
                }
                Err(e) if e.kind() == crate::error::ErrorKind::NotFound => {
                    warn!(work_item = %task_id, "orphaned task no longer exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Snapshot of the current roster.
    pub fn agents(&self) -> Vec<AgentStatus> {
        lock(&self.agents).clone()
    }

    /// Snapshot of the aggregate counters.
    pub fn stats(&self) -> CoordinationStats {
        *lock(&self.stats)
    }

    // ------------------------------------------------------------------
    // Distribution
    // ------------------------------------------------------------------

    /// Run one distribution pass: pair pending items with agents under
    /// the active strategy and claim each pairing through the store.
    pub async fn distribute_tasks(&self) -> CoreResult<Vec<Assignment>> {
        let mut pending = self
            .store
            .get_work_items(Some(WorkItemStatus::Pending))
            .await?;
        pending.sort_by_key(|item| item.queue_key());

        let mut assignments = Vec::new();
        for item in pending {
            self.cancel.check()?;
            let Some(agent_id) = self.pick_agent(&item) else {
                // No agent can take this item; later items may still
                // match a different capability.
                continue;
            };

            let Some(claimed) = self.store.claim_work_item(&item.id, &agent_id).await? else {
                continue;
            };

            {
                let mut agents = lock(&self.agents);
                if let Some(agent) = agents.iter_mut().find(|a| a.config.id == agent_id) {
                    agent.current_tasks.push(claimed.id.clone());
                    agent.task_started.insert(claimed.id.clone(), Utc::now());
                    agent.state = AgentState::Busy;
                }
                lock(&self.stats).tasks_assigned += 1;
            }
            debug!(
                work_item = %claimed.id,
                agent = %agent_id,
                strategy = %self.strategy,
                "task assigned"
            );
            assignments.push(Assignment {
                work_item_id: claimed.id,
                agent_id,
                task_type: claimed.task_type,
            });
        }

        if !assignments.is_empty() {
            info!(
                assigned = assignments.len(),
                strategy = %self.strategy,
                "distribution pass complete"
            );
        }
        Ok(assignments)
    }

    fn pick_agent(&self, item: &WorkItem) -> Option<String> {
        let agents = lock(&self.agents);
        let eligible: Vec<(usize, &AgentStatus)> = agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.has_capacity() && a.config.capabilities.contains(&item.task_type))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let chosen: Option<&AgentStatus> = match self.strategy {
            DistributionStrategy::CapabilityBased => eligible
                .iter()
                .copied()
                .max_by(|(ai, a), (bi, b)| {
                    capability_score(a, item, &self.config)
                        .partial_cmp(&capability_score(b, item, &self.config))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        // Ties go to the earliest registration.
                        .then_with(|| bi.cmp(ai))
                })
                .map(|(_, a)| a),
            DistributionStrategy::LoadBalanced => eligible
                .iter()
                .copied()
                .min_by(|(ai, a), (bi, b)| {
                    a.load_fraction()
                        .partial_cmp(&b.load_fraction())
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| ai.cmp(bi))
                })
                .map(|(_, a)| a),
            // Items arrive sorted by priority band; within a band the
            // first agent with spare capacity takes the task.
            DistributionStrategy::PriorityWeighted => eligible.first().map(|(_, a)| *a),
            DistributionStrategy::RoundRobin => {
                let mut cursor = lock(&self.round_robin_cursor);
                let (_, picked) = eligible[*cursor % eligible.len()];
                *cursor = cursor.wrapping_add(1);
                Some(picked)
            }
        };
        chosen.map(|a| a.config.id.clone())
    }

    // ------------------------------------------------------------------
    // Completion reporting
    // ------------------------------------------------------------------

    /// Record a task outcome from an agent, update its counters, and
    /// immediately run another distribution pass.
    pub async fn report_completion(
        &self,
        agent_id: &str,
        work_item_id: &str,
        success: bool,
        error: Option<String>,
    ) -> CoreResult<Vec<Assignment>> {
        let status = if success {
            WorkItemStatus::Completed
        } else {
            WorkItemStatus::Failed
        };
        self.store
            .update_work_item_status(work_item_id, status, error)
            .await?;

        {
            let mut agents = lock(&self.agents);
            let Some(agent) = agents.iter_mut().find(|a| a.config.id == agent_id) else {
                return Err(CoreError::not_found("agent", agent_id));
            };
            agent.current_tasks.retain(|id| id != work_item_id);
            let duration_secs = agent
                .task_started
                .remove(work_item_id)
                .map(|started| (Utc::now() - started).num_milliseconds() as f64 / 1000.0)
                .unwrap_or(0.0);
            agent.performance.record(success, duration_secs.max(0.0));
            agent.last_heartbeat = Utc::now();
            if agent.current_tasks.is_empty() {
                agent.state = AgentState::Available;
            }

            let mut stats = lock(&self.stats);
            if success {
                stats.tasks_completed += 1;
            } else {
                stats.tasks_failed += 1;
            }
        }
        debug!(agent = %agent_id, work_item = %work_item_id, success, "completion reported");

        // Freed capacity: hand out more work right away.
        self.distribute_tasks().await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Stop the run: snapshot the roster and counters, persist the
    /// snapshot as the session's report, and return it.
    pub async fn stop(&self) -> CoreResult<CoordinationSession> {
        let session = CoordinationSession {
            id: self.run_id.clone(),
            session_id: self.session_id.clone(),
            strategy: self.strategy,
            started_at: self.started_at,
            stopped_at: Some(Utc::now()),
            stats: self.stats(),
            agents: self.agents(),
        };
        self.store.save_report(&self.session_id, &session).await?;
        info!(
            session = %self.session_id,
            assigned = session.stats.tasks_assigned,
            completed = session.stats.tasks_completed,
            "coordination stopped, report persisted"
        );
        Ok(session)
    }
}

/// Capability-based fitness: capability and specialization matches
/// dominate; track record and current load adjust when the matching
/// [`CoordinatorConfig`] toggles are on.
fn capability_score(agent: &AgentStatus, item: &WorkItem, config: &CoordinatorConfig) -> f64 {
    let mut score = 0.0;
    if agent.config.capabilities.contains(&item.task_type) {
        score += 100.0;
    }
    let entity = item.entity_id.to_lowercase();
    if agent
        .config
        .specializations
        .iter()
        .any(|tag| entity.contains(&tag.to_lowercase()))
    {
        score += 50.0;
    }
    if config.weight_experience {
        score += agent.performance.success_rate * 30.0;
        score -= agent.performance.average_duration_secs;
    }
    if config.weight_load {
        score -= agent.load_fraction() * 25.0;
    }
    score
}
