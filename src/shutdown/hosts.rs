//! # Host Shutdown Sequencer
//!
//! Shuts down every member host, waits (bounded) for them to drop off the
//! network, then shuts down the coordinator last.
//!
//! Per host: `Enabled -> Disabled -> ShutdownIssued -> Unreachable | TimedOutProceeded`.
//!
//! The liveness budget is shared by all members and starts when probing starts.
//! Once it is spent the sequencer stops probing altogether and moves on to the
//! coordinator, leaving any unconfirmed members as `TimedOutProceeded`.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::HostsConfig;
use crate::error::{Result, ShutdownError};
use crate::logging::{log_dispatch_operation, log_error, log_phase_transition};
use crate::management::{DispatchCommand, DispatchPool, LivenessProbe, ResourceEnumerator};
use crate::models::{Host, HostShutdownState};
use crate::timing::{Clock, Deadline};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostOutcome {
    pub host: Host,
    pub state: HostShutdownState,
    pub probes: u32,
}

impl HostOutcome {
    fn new(host: Host) -> Self {
        Self {
            host,
            state: HostShutdownState::Enabled,
            probes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostShutdownReport {
    pub members: Vec<HostOutcome>,
    pub coordinator: HostOutcome,
    pub budget_exhausted: bool,
    pub coordinator_shutdown_issued: bool,
}

impl HostShutdownReport {
    /// Members whose shutdown was never confirmed by a failed probe
    pub fn unconfirmed_members(&self) -> impl Iterator<Item = &HostOutcome> {
        self.members
            .iter()
            .filter(|m| m.state != HostShutdownState::Unreachable)
    }
}

/// Split hosts into the single coordinator and the members
pub fn partition_hosts(hosts: Vec<Host>) -> Result<(Host, Vec<Host>)> {
    let (coordinators, members): (Vec<Host>, Vec<Host>) =
        hosts.into_iter().partition(|h| h.role.is_coordinator());

    match <[Host; 1]>::try_from(coordinators) {
        Ok([coordinator]) => Ok((coordinator, members)),
        Err(found) => Err(ShutdownError::Topology(format!(
            "expected exactly one coordinator host, found {}",
            found.len()
        ))),
    }
}

pub struct HostShutdownSequencer {
    enumerator: Arc<dyn ResourceEnumerator>,
    pool: Arc<DispatchPool>,
    probe: Arc<dyn LivenessProbe>,
    clock: Arc<dyn Clock>,
    config: HostsConfig,
}

impl fmt::Debug for HostShutdownSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostShutdownSequencer")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish()
    }
}

impl HostShutdownSequencer {
    pub fn new(
        enumerator: Arc<dyn ResourceEnumerator>,
        pool: Arc<DispatchPool>,
        probe: Arc<dyn LivenessProbe>,
        clock: Arc<dyn Clock>,
        config: HostsConfig,
    ) -> Self {
        Self {
            enumerator,
            pool,
            probe,
            clock,
            config,
        }
    }

    /// Run the full sequence. Only host enumeration failures are returned as errors.
    #[instrument(skip_all)]
    pub async fn shutdown_all(&self) -> Result<HostShutdownReport> {
        let (coordinator, members) = partition_hosts(self.enumerator.list_hosts().await?)?;
        info!(
            coordinator = %coordinator.name,
            members = members.len(),
            "🖥️ HOSTS: starting host shutdown sequence"
        );

        let mut members: Vec<HostOutcome> = members.into_iter().map(HostOutcome::new).collect();
        for member in &mut members {
            self.issue_member_shutdown(member).await;
        }

        self.clock.sleep(self.config.probe_settle()).await;
        let budget_exhausted = self.await_members_down(&mut members).await;

        let mut coordinator = HostOutcome::new(coordinator);
        let coordinator_shutdown_issued = self.shutdown_coordinator(&mut coordinator).await;

        Ok(HostShutdownReport {
            members,
            coordinator,
            budget_exhausted,
            coordinator_shutdown_issued,
        })
    }

    async fn issue_member_shutdown(&self, member: &mut HostOutcome) {
        let id = member.host.id.clone();
        match self.pool.dispatcher().disable_host(&id).await {
            Ok(()) => {
                member.state = HostShutdownState::Disabled;
                log_dispatch_operation(
                    "hosts",
                    "host_disable",
                    id.as_str(),
                    Some(&member.host.name),
                    "disabled",
                    None,
                );
            }
            Err(e) => log_error("hosts", "host_disable", &e.to_string(), Some(&member.host.name)),
        }
        self.clock.sleep(self.config.disable_settle()).await;

        self.pool.spawn(DispatchCommand::ShutdownHost { id: id.clone() });
        member.state = HostShutdownState::ShutdownIssued;
        log_dispatch_operation(
            "hosts",
            "host_shutdown",
            id.as_str(),
            Some(&member.host.name),
            "issued",
            None,
        );

        self.clock.sleep(self.config.host_stagger()).await;
    }

    /// Probe members in order until each is unreachable or the shared budget runs out.
    ///
    /// Returns true when the budget ran out first.
    async fn await_members_down(&self, members: &mut [HostOutcome]) -> bool {
        let clock = self.clock.as_ref();
        let deadline = Deadline::after(clock, self.config.liveness_budget());
        log_phase_transition("hosts", "liveness_probe", "started", Some(members.len()), None);

        for index in 0..members.len() {
            loop {
                let member = &mut members[index];
                member.probes += 1;

                // A probe error is not a liveness signal.
                let reachable = match self.probe.probe(&member.host.address).await {
                    Ok(reachable) => reachable,
                    Err(e) => {
                        debug!(
                            host = %member.host.name,
                            error = %e,
                            "HOSTS: probe error, treating host as down"
                        );
                        false
                    }
                };

                if !reachable {
                    member.state = HostShutdownState::Unreachable;
                    info!(
                        host = %member.host.name,
                        elapsed_secs = deadline.elapsed(clock).as_secs(),
                        "🔌 HOSTS: host no longer reachable"
                    );
                    clock.sleep(self.config.unreachable_advance()).await;
                    break;
                }

                if deadline.is_expired(clock) {
                    for pending in &mut members[index..] {
                        pending.state = HostShutdownState::TimedOutProceeded;
                    }
                    warn!(
                        host = %members[index].host.name,
                        budget_secs = deadline.budget().as_secs(),
                        unconfirmed = members.len() - index,
                        "⚠️ HOSTS: liveness budget exhausted, proceeding regardless"
                    );
                    return true;
                }

                debug!(host = %member.host.name, "HOSTS: host still reachable");
                clock.sleep(self.config.reachable_retry()).await;
            }
        }

        log_phase_transition(
            "hosts",
            "liveness_probe",
            "all_members_down",
            Some(0),
            Some(deadline.elapsed(clock).as_secs()),
        );
        false
    }

    /// Disable and shut down the coordinator, awaiting both commands
    async fn shutdown_coordinator(&self, coordinator: &mut HostOutcome) -> bool {
        let dispatcher = self.pool.dispatcher();
        let id = coordinator.host.id.clone();
        info!(host = %coordinator.host.name, "🛑 HOSTS: shutting down coordinator");

        match dispatcher.disable_host(&id).await {
            Ok(()) => coordinator.state = HostShutdownState::Disabled,
            Err(e) => log_error(
                "hosts",
                "host_disable",
                &e.to_string(),
                Some(&coordinator.host.name),
            ),
        }

        match dispatcher.shutdown_host(&id).await {
            Ok(()) => {
                coordinator.state = HostShutdownState::ShutdownIssued;
                log_dispatch_operation(
                    "hosts",
                    "host_shutdown",
                    id.as_str(),
                    Some(&coordinator.host.name),
                    "issued",
                    None,
                );
                true
            }
            Err(e) => {
                error!(
                    host = %coordinator.host.name,
                    error = %e,
                    "❌ HOSTS: coordinator shutdown rejected"
                );
                false
            }
        }
    }
}
