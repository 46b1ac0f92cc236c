//! Cluster host model.

use super::resource_set::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a host within the pool, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    Coordinator,
    Member,
}

impl HostRole {
    pub fn is_coordinator(&self) -> bool {
        matches!(self, Self::Coordinator)
    }
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => write!(f, "coordinator"),
            Self::Member => write!(f, "member"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: ResourceId,
    pub name: String,
    /// Address used for liveness probing
    pub address: String,
    pub role: HostRole,
}

impl Host {
    pub fn new(
        id: impl Into<ResourceId>,
        name: impl Into<String>,
        address: impl Into<String>,
        role: HostRole,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            role,
        }
    }

    pub fn member(
        id: impl Into<ResourceId>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self::new(id, name, address, HostRole::Member)
    }

    pub fn coordinator(
        id: impl Into<ResourceId>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self::new(id, name, address, HostRole::Coordinator)
    }
}

/// Per-host progress through the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostShutdownState {
    Enabled,
    Disabled,
    ShutdownIssued,
    /// Probe confirmed the host went dark
    Unreachable,
    /// Liveness budget ran out before the host went dark
    TimedOutProceeded,
}

impl fmt::Display for HostShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::ShutdownIssued => write!(f, "shutdown_issued"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::TimedOutProceeded => write!(f, "timed_out_proceeded"),
        }
    }
}
