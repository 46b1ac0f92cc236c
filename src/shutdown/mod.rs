//! # Shutdown Procedure
//!
//! - [`poller`] - convergence wait primitive
//! - [`escalator`] - three-phase workload shutdown
//! - [`storage`] - network storage detach
//! - [`hosts`] - member then coordinator host shutdown
//! - [`role`] - coordinator-only entry guard
//! - [`orchestrator`] - the ordered procedure and its exit contract

pub mod escalator;
pub mod hosts;
pub mod orchestrator;
pub mod poller;
pub mod role;
pub mod storage;

pub use escalator::{EscalationPhase, EscalationReport, PhaseRecord, VmShutdownEscalator};
pub use hosts::{HostOutcome, HostShutdownReport, HostShutdownSequencer};
pub use orchestrator::{ClusterShutdown, ShutdownOutcome, ShutdownReport};
pub use poller::{ConvergencePoller, PollOutcome, PollState};
pub use role::{PoolConfRoleSource, RoleGate, RoleSource};
pub use storage::{DetachReport, StorageDetacher};
