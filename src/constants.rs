//! # Shutdown Constants
//!
//! Default timings and well-known names that define the operational boundaries
//! of the shutdown procedure. Every value here can be overridden through
//! [`crate::config::ShutdownConfig`].

/// Workload escalation defaults, in seconds
pub mod escalation {
    pub const GRACEFUL_TIMEOUT_SECONDS: u64 = 180;
    pub const FORCE_TIMEOUT_SECONDS: u64 = 80;
    pub const RESET_TIMEOUT_SECONDS: u64 = 60;
    pub const DISPATCH_STAGGER_SECONDS: u64 = 1;

    /// Tag marking workloads that are held back until the full pass
    pub const DEFAULT_DEFERRAL_TAG: &str = "shutdown_last";
}

/// Convergence poller defaults, in seconds
pub mod poller {
    pub const SETTLE_DELAY_SECONDS: u64 = 10;
    pub const RETRY_INTERVAL_SECONDS: u64 = 10;
}

/// Storage detacher defaults
pub mod storage {
    pub const DETACH_STAGGER_SECONDS: u64 = 1;

    /// Network-backed storage repository types
    pub const DEFAULT_TRANSPORT_TYPES: &[&str] = &["nfs", "lvmoiscsi", "iscsi", "cifs", "lvmohba"];
}

/// Host sequencer defaults, in seconds
pub mod hosts {
    pub const DISABLE_SETTLE_SECONDS: u64 = 2;
    pub const HOST_STAGGER_SECONDS: u64 = 1;
    pub const PROBE_SETTLE_SECONDS: u64 = 10;
    pub const LIVENESS_BUDGET_SECONDS: u64 = 240;
    pub const REACHABLE_RETRY_SECONDS: u64 = 10;
    pub const UNREACHABLE_ADVANCE_SECONDS: u64 = 1;
}

/// Management plane defaults
pub mod management {
    pub const XE_BINARY: &str = "xe";
    pub const PING_BINARY: &str = "ping";
    pub const PING_TIMEOUT_SECONDS: u64 = 1;
    pub const ROLE_FILE: &str = "/etc/xensource/pool.conf";
    pub const MAX_IN_FLIGHT_DISPATCHES: usize = 16;
}

/// Process exit codes reported to the outer scheduler
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}
