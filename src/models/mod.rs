//! Data model for cluster resources.
//!
//! Nothing here is persisted. Every value is read fresh from the management plane
//! and lives for a single procedure run.

pub mod host;
pub mod resource_set;
pub mod storage;
pub mod workload;

pub use host::{Host, HostRole, HostShutdownState};
pub use resource_set::{ResourceId, ResourceSet};
pub use storage::{StorageAttachment, StorageVolume, TransportType};
pub use workload::{PowerState, Workload, WorkloadScope};
