#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Cluster Shutdown
//!
//! Orderly, unattended shutdown of a virtualization pool, driven from the pool's
//! coordinator: storage attachments first, then guest workloads, then member
//! hosts, and finally the coordinator itself.
//!
//! ## Architecture
//!
//! The core is an escalation and convergence-polling state machine. Commands to
//! individual resources are fired without waiting for them; progress is judged
//! only by re-enumerating the management plane until the targeted set is empty
//! or a deadline passes. Timeouts escalate workload shutdowns and let host
//! shutdown proceed; they never hang the run.
//!
//! ## Module Organization
//!
//! - [`shutdown`] - poller, escalator, storage detacher, host sequencer, role gate, orchestrator
//! - [`management`] - management plane traits, `xe` adapter, ping probe, dispatch pool
//! - [`models`] - workloads, hosts, storage, resource sets
//! - [`timing`] - injectable clock and explicit deadlines
//! - [`config`] - layered configuration
//! - [`logging`] - structured logging setup
//! - [`error`] - error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cluster_shutdown::config::ConfigManager;
//! use cluster_shutdown::management::ManagementContext;
//! use cluster_shutdown::shutdown::{ClusterShutdown, PoolConfRoleSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! let procedure = ClusterShutdown::new(
//!     config,
//!     ManagementContext::from_config(config),
//!     Arc::new(PoolConfRoleSource::new(config.management.role_file.clone())),
//! );
//! let outcome = procedure.run().await?;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod management;
pub mod models;
pub mod shutdown;
pub mod timing;

pub use config::{ConfigManager, ShutdownConfig};
pub use error::{Result, ShutdownError};
pub use shutdown::{ClusterShutdown, ShutdownOutcome, ShutdownReport};
