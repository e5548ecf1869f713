//! Durable state core for long-running, multi-agent code discovery.
//!
//! A discovery run over a large codebase outlives any single context
//! window or agent process, so everything it learns lives here: a
//! file-backed graph of entities and relationships, a priority work
//! queue, checkpoints, and per-session progress. The crate is a
//! library only; request handlers own the wire protocol and
//! configuration loading, and pass resolved config structs in.
//!
//! The main pieces:
//!
//! - [`store::GraphStore`]: write-through persistent graph and work
//!   queue with bounded in-memory caches and BFS pathfinding
//! - [`budget::TokenBudgetManager`]: token cost estimation and
//!   threshold bands over a context budget
//! - [`compression::CompressionEngine`]: relevance-ordered shrinking of
//!   oversized entity sets with dependency preservation
//! - [`recovery::RecoveryOrchestrator`]: rebuilding a budget-bounded
//!   working set from immutable context backups
//! - [`coordinator::TaskCoordinator`] and
//!   [`coordinator::HeartbeatMonitor`]: agent roster, task
//!   distribution, and liveness
//!
//! Every fallible operation returns [`error::CoreResult`]; nothing here
//! panics across the crate boundary.

#![warn(missing_docs)]

pub mod budget;
pub mod cancel;
pub mod compression;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod recovery;
pub mod store;

pub use budget::{TokenBudgetManager, UsageBand};
pub use cancel::CancelFlag;
pub use compression::{CompressionEngine, CompressionOptions, CompressionResult};
pub use config::{CoordinatorConfig, RecoveryConfig, StoreConfig, TokenBudgetConfig};
pub use coordinator::{DistributionStrategy, HeartbeatMonitor, TaskCoordinator};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use recovery::{RecoveryMode, RecoveryOrchestrator, RecoveryResult, RecoveryStrategy};
pub use store::{GraphStore, RecordStore};
