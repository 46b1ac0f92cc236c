//! Collaborator seams between the shutdown procedure and the management plane.
//!
//! Every call is a single request that either returns data or fails. Callers
//! decide the failure policy: enumeration errors are fatal, command errors are
//! logged and left for the next convergence poll to notice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::models::{
    Host, ResourceId, ResourceSet, StorageAttachment, StorageVolume, TransportType, WorkloadScope,
};

/// Escalating shutdown action applied to a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadAction {
    GracefulStop,
    ForceStop,
    PowerReset,
}

impl fmt::Display for WorkloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GracefulStop => write!(f, "graceful_stop"),
            Self::ForceStop => write!(f, "force_stop"),
            Self::PowerReset => write!(f, "power_reset"),
        }
    }
}

/// Read-only queries against the management plane
#[async_trait]
pub trait ResourceEnumerator: Send + Sync {
    /// Running, non-control-domain workloads in `scope`
    async fn list_workloads(&self, scope: &WorkloadScope) -> Result<ResourceSet>;

    /// Every host in the pool, with its role already resolved
    async fn list_hosts(&self) -> Result<Vec<Host>>;

    async fn list_storage_volumes(
        &self,
        transports: &[TransportType],
    ) -> Result<Vec<StorageVolume>>;

    async fn list_attachments(&self, volume: &StorageVolume) -> Result<Vec<StorageAttachment>>;

    /// Human-readable label of a workload, for log lines
    async fn display_name(&self, id: &ResourceId) -> Result<String>;
}

/// Imperative commands against a single resource
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn workload_action(&self, id: &ResourceId, action: WorkloadAction) -> Result<()>;

    /// Stop new workload placement on the host
    async fn disable_host(&self, id: &ResourceId) -> Result<()>;

    async fn shutdown_host(&self, id: &ResourceId) -> Result<()>;

    /// Unplug a storage attachment
    async fn detach_attachment(&self, id: &ResourceId) -> Result<()>;
}

/// Network reachability check for a host address
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// `Ok(true)` when the host answered
    async fn probe(&self, address: &str) -> Result<bool>;
}
