//! # Management Plane
//!
//! Collaborator traits the procedure depends on, their production
//! implementations, and the detached dispatch pool.
//!
//! - [`traits`] - `ResourceEnumerator`, `CommandDispatcher`, `LivenessProbe`
//! - [`xe`] - `xe` CLI backed enumerator and dispatcher
//! - [`probe`] - ICMP echo probe
//! - [`dispatch`] - bounded fire-and-forget command execution

pub mod dispatch;
pub mod probe;
pub mod traits;
pub mod xe;

use std::sync::Arc;

use crate::config::ShutdownConfig;
use crate::timing::{Clock, TokioClock};

pub use dispatch::{DispatchCommand, DispatchPool};
pub use probe::PingProbe;
pub use traits::{CommandDispatcher, LivenessProbe, ResourceEnumerator, WorkloadAction};
pub use xe::XeCli;

/// Handles to every external collaborator, shared by all shutdown components
#[derive(Clone)]
pub struct ManagementContext {
    pub enumerator: Arc<dyn ResourceEnumerator>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub probe: Arc<dyn LivenessProbe>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ManagementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementContext")
            .field("enumerator", &"Arc<dyn ResourceEnumerator>")
            .field("dispatcher", &"Arc<dyn CommandDispatcher>")
            .field("probe", &"Arc<dyn LivenessProbe>")
            .field("clock", &self.clock)
            .finish()
    }
}

impl ManagementContext {
    pub fn new(
        enumerator: Arc<dyn ResourceEnumerator>,
        dispatcher: Arc<dyn CommandDispatcher>,
        probe: Arc<dyn LivenessProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            enumerator,
            dispatcher,
            probe,
            clock,
        }
    }

    /// Production wiring: `xe` for queries and commands, `ping` for liveness
    pub fn from_config(config: &ShutdownConfig) -> Self {
        let xe = Arc::new(XeCli::new(config.management.xe_binary.clone()));
        Self {
            enumerator: xe.clone(),
            dispatcher: xe,
            probe: Arc::new(PingProbe::new(
                config.management.ping_binary.clone(),
                config.management.ping_timeout_seconds,
            )),
            clock: Arc::new(TokioClock),
        }
    }
}
