//! Guest workload model.

use super::resource_set::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Power state of a workload as reported by the management plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Running,
    Stopped,
    /// Paused, suspended or any state this procedure does not act on
    Other,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "halted"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for PowerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Empty power state".to_string()),
            "running" => Ok(Self::Running),
            "halted" | "stopped" => Ok(Self::Stopped),
            _ => Ok(Self::Other),
        }
    }
}

/// A guest virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: ResourceId,
    pub name: String,
    pub power_state: PowerState,
    /// Management or control-plane domain; never targeted
    pub is_control_domain: bool,
    pub tags: BTreeSet<String>,
}

impl Workload {
    pub fn new(id: impl Into<ResourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            power_state: PowerState::Running,
            is_control_domain: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_power_state(mut self, power_state: PowerState) -> Self {
        self.power_state = power_state;
        self
    }

    pub fn control_domain(mut self) -> Self {
        self.is_control_domain = true;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Which running workloads an escalation pass targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadScope {
    /// Running workloads that do not carry the deferral tag
    Restricted { deferral_tag: String },
    /// Every running workload
    All,
}

impl WorkloadScope {
    pub fn restricted(deferral_tag: impl Into<String>) -> Self {
        Self::Restricted {
            deferral_tag: deferral_tag.into(),
        }
    }

    /// Whether a workload belongs to this scope.
    ///
    /// Control domains and non-running workloads are never included.
    pub fn includes(&self, workload: &Workload) -> bool {
        if workload.is_control_domain || workload.power_state != PowerState::Running {
            return false;
        }
        match self {
            Self::Restricted { deferral_tag } => !workload.has_tag(deferral_tag),
            Self::All => true,
        }
    }
}

impl fmt::Display for WorkloadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restricted { deferral_tag } => {
                write!(f, "restricted(excluding '{deferral_tag}')")
            }
            Self::All => write!(f, "all"),
        }
    }
}
