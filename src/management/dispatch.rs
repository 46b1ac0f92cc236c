//! # Detached Dispatch Pool
//!
//! Fire-and-forget execution of per-resource commands. Each command runs in its
//! own spawned task that first takes a permit from the semaphore for its command
//! kind, so at most `max_in_flight` commands of one kind hit the management plane
//! at once. Kinds never share permits: graceful stops that hang indefinitely
//! cannot hold back the force stops, power resets or host shutdowns issued after
//! them. Tasks are never joined and their results are only logged; convergence
//! polling is the sole way the procedure learns whether a command took effect.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::traits::{CommandDispatcher, WorkloadAction};
use crate::models::ResourceId;

/// Graceful stop, force stop, power reset, host shutdown
const COMMAND_KINDS: usize = 4;

/// A command that can be issued without waiting for its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCommand {
    Workload {
        id: ResourceId,
        action: WorkloadAction,
    },
    ShutdownHost {
        id: ResourceId,
    },
}

impl DispatchCommand {
    pub fn target(&self) -> &ResourceId {
        match self {
            Self::Workload { id, .. } | Self::ShutdownHost { id } => id,
        }
    }

    fn kind_index(&self) -> usize {
        match self {
            Self::Workload { action, .. } => match action {
                WorkloadAction::GracefulStop => 0,
                WorkloadAction::ForceStop => 1,
                WorkloadAction::PowerReset => 2,
            },
            Self::ShutdownHost { .. } => 3,
        }
    }
}

impl fmt::Display for DispatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workload { action, .. } => write!(f, "{action}"),
            Self::ShutdownHost { .. } => write!(f, "host_shutdown"),
        }
    }
}

pub struct DispatchPool {
    dispatcher: Arc<dyn CommandDispatcher>,
    permits: [Arc<Semaphore>; COMMAND_KINDS],
    spawned: AtomicUsize,
}

impl fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let available: Vec<usize> = self.permits.iter().map(|p| p.available_permits()).collect();
        f.debug_struct("DispatchPool")
            .field("dispatcher", &"Arc<dyn CommandDispatcher>")
            .field("available_permits", &available)
            .field("spawned", &self.spawned.load(Ordering::Relaxed))
            .finish()
    }
}

impl DispatchPool {
    /// `max_in_flight` bounds each command kind separately
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            dispatcher,
            permits: std::array::from_fn(|_| Arc::new(Semaphore::new(max_in_flight))),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Dispatcher for commands the caller awaits directly
    pub fn dispatcher(&self) -> &Arc<dyn CommandDispatcher> {
        &self.dispatcher
    }

    /// Total commands handed to the pool since creation
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Start `command` in a detached task and return immediately
    pub fn spawn(&self, command: DispatchCommand) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let permits = Arc::clone(&self.permits[command.kind_index()]);
        self.spawned.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(
                        command = %command,
                        target = %command.target(),
                        "DISPATCH: pool closed, command dropped"
                    );
                    return;
                }
            };

            let result = match &command {
                DispatchCommand::Workload { id, action } => {
                    dispatcher.workload_action(id, *action).await
                }
                DispatchCommand::ShutdownHost { id } => dispatcher.shutdown_host(id).await,
            };

            match result {
                Ok(()) => debug!(
                    command = %command,
                    target = %command.target(),
                    "DISPATCH: command accepted"
                ),
                Err(e) => warn!(
                    command = %command,
                    target = %command.target(),
                    error = %e,
                    "DISPATCH: command rejected, next poll will re-evaluate"
                ),
            }
        });
    }
}
