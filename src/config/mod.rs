//! # Shutdown Configuration
//!
//! Every timing, tag and adapter setting the procedure uses, with defaults that
//! match a stock pool. Values are layered by [`ConfigManager`]: built-in
//! defaults, an optional base YAML file, an optional per-environment overlay,
//! then `CLUSTER_SHUTDOWN__SECTION__KEY` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cluster_shutdown::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let budget = manager.config().hosts.liveness_budget();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::models::TransportType;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring cluster-shutdown.yaml
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub escalation: EscalationConfig,
    pub poller: PollerConfig,
    pub storage: StorageConfig,
    pub hosts: HostsConfig,
    pub dispatch: DispatchConfig,
    pub management: ManagementConfig,
    pub logging: LoggingConfig,
}

/// Workload escalation phases
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub graceful_timeout_seconds: u64,
    pub force_timeout_seconds: u64,
    pub reset_timeout_seconds: u64,
    pub dispatch_stagger_seconds: u64,
    pub deferral_tag: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            graceful_timeout_seconds: constants::escalation::GRACEFUL_TIMEOUT_SECONDS,
            force_timeout_seconds: constants::escalation::FORCE_TIMEOUT_SECONDS,
            reset_timeout_seconds: constants::escalation::RESET_TIMEOUT_SECONDS,
            dispatch_stagger_seconds: constants::escalation::DISPATCH_STAGGER_SECONDS,
            deferral_tag: constants::escalation::DEFAULT_DEFERRAL_TAG.to_string(),
        }
    }
}

impl EscalationConfig {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_seconds)
    }

    pub fn force_timeout(&self) -> Duration {
        Duration::from_secs(self.force_timeout_seconds)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }

    pub fn dispatch_stagger(&self) -> Duration {
        Duration::from_secs(self.dispatch_stagger_seconds)
    }
}

/// Convergence poller pacing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub settle_delay_seconds: u64,
    pub retry_interval_seconds: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            settle_delay_seconds: constants::poller::SETTLE_DELAY_SECONDS,
            retry_interval_seconds: constants::poller::RETRY_INTERVAL_SECONDS,
        }
    }
}

impl PollerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }
}

/// Storage detachment
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Repository types whose attachments are unplugged
    pub transport_types: Vec<String>,
    pub detach_stagger_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transport_types: constants::storage::DEFAULT_TRANSPORT_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            detach_stagger_seconds: constants::storage::DETACH_STAGGER_SECONDS,
        }
    }
}

impl StorageConfig {
    pub fn transports(&self) -> Vec<TransportType> {
        self.transport_types
            .iter()
            .map(|t| TransportType::from(t.as_str()))
            .collect()
    }

    pub fn detach_stagger(&self) -> Duration {
        Duration::from_secs(self.detach_stagger_seconds)
    }
}

/// Host shutdown sequencing and liveness probing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsConfig {
    pub disable_settle_seconds: u64,
    pub host_stagger_seconds: u64,
    pub probe_settle_seconds: u64,
    /// Shared across all member hosts, measured from the start of probing
    pub liveness_budget_seconds: u64,
    /// Wait before re-probing a host that still answers
    pub reachable_retry_seconds: u64,
    /// Wait after a host is confirmed down before probing the next one
    pub unreachable_advance_seconds: u64,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            disable_settle_seconds: constants::hosts::DISABLE_SETTLE_SECONDS,
            host_stagger_seconds: constants::hosts::HOST_STAGGER_SECONDS,
            probe_settle_seconds: constants::hosts::PROBE_SETTLE_SECONDS,
            liveness_budget_seconds: constants::hosts::LIVENESS_BUDGET_SECONDS,
            reachable_retry_seconds: constants::hosts::REACHABLE_RETRY_SECONDS,
            unreachable_advance_seconds: constants::hosts::UNREACHABLE_ADVANCE_SECONDS,
        }
    }
}

impl HostsConfig {
    pub fn disable_settle(&self) -> Duration {
        Duration::from_secs(self.disable_settle_seconds)
    }

    pub fn host_stagger(&self) -> Duration {
        Duration::from_secs(self.host_stagger_seconds)
    }

    pub fn probe_settle(&self) -> Duration {
        Duration::from_secs(self.probe_settle_seconds)
    }

    pub fn liveness_budget(&self) -> Duration {
        Duration::from_secs(self.liveness_budget_seconds)
    }

    pub fn reachable_retry(&self) -> Duration {
        Duration::from_secs(self.reachable_retry_seconds)
    }

    pub fn unreachable_advance(&self) -> Duration {
        Duration::from_secs(self.unreachable_advance_seconds)
    }
}

/// Detached dispatch pool
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Concurrent detached commands allowed per command kind
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: constants::management::MAX_IN_FLIGHT_DISPATCHES,
        }
    }
}

/// Management plane adapters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementConfig {
    pub xe_binary: String,
    pub ping_binary: String,
    pub ping_timeout_seconds: u64,
    pub role_file: PathBuf,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            xe_binary: constants::management::XE_BINARY.to_string(),
            ping_binary: constants::management::PING_BINARY.to_string(),
            ping_timeout_seconds: constants::management::PING_TIMEOUT_SECONDS,
            role_file: PathBuf::from(constants::management::ROLE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only log file; console only when unset
    pub log_file: Option<PathBuf>,
}

impl ShutdownConfig {
    /// Validate configuration values that would make the procedure hang or no-op
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("escalation.graceful_timeout_seconds", self.escalation.graceful_timeout_seconds),
            ("escalation.force_timeout_seconds", self.escalation.force_timeout_seconds),
            ("escalation.reset_timeout_seconds", self.escalation.reset_timeout_seconds),
            ("poller.retry_interval_seconds", self.poller.retry_interval_seconds),
            ("hosts.liveness_budget_seconds", self.hosts.liveness_budget_seconds),
            ("hosts.reachable_retry_seconds", self.hosts.reachable_retry_seconds),
            ("management.ping_timeout_seconds", self.management.ping_timeout_seconds),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "0",
                    "must be greater than 0",
                ));
            }
        }

        if self.escalation.deferral_tag.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "escalation.deferral_tag",
                "escalation configuration",
            ));
        }

        if self.storage.transport_types.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "storage.transport_types",
                "storage configuration",
            ));
        }

        if let Some(local) = self
            .storage
            .transports()
            .into_iter()
            .find(|t| !t.is_network_backed())
        {
            return Err(ConfigurationError::invalid_value(
                "storage.transport_types",
                local.to_string(),
                "only network-backed transports may be detached",
            ));
        }

        if self.dispatch.max_in_flight == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.max_in_flight",
                "0",
                "at least one dispatch must be allowed in flight",
            ));
        }

        if self.management.xe_binary.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "management.xe_binary",
                "management configuration",
            ));
        }

        Ok(())
    }
}
