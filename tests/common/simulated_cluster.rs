//! Simulated Cluster for Testing
//!
//! In-memory pool implementing every management plane collaborator. Resource
//! state is derived from tokio's clock, so tests running with
//! `#[tokio::test(start_paused = true)]` observe exact, repeatable timings.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use cluster_shutdown::error::{Result, ShutdownError};
use cluster_shutdown::management::{
    CommandDispatcher, LivenessProbe, ManagementContext, ResourceEnumerator, WorkloadAction,
};
use cluster_shutdown::models::{
    Host, HostRole, PowerState, ResourceId, ResourceSet, StorageAttachment, StorageVolume,
    TransportType, Workload, WorkloadScope,
};
use cluster_shutdown::shutdown::RoleSource;
use cluster_shutdown::timing::TokioClock;

/// Everything the procedure did to the cluster, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    WorkloadAction { id: String, action: WorkloadAction },
    HostDisabled(String),
    HostShutdown(String),
    Detached(String),
    Probed(String),
}

#[derive(Debug, Clone)]
pub struct SimWorkload {
    pub workload: Workload,
    honors: Vec<WorkloadAction>,
    hangs: Vec<WorkloadAction>,
    stop_delay: Duration,
    stops_at: Option<Instant>,
}

impl SimWorkload {
    /// A running workload that rejects every action until told otherwise
    pub fn running(id: &str) -> Self {
        Self {
            workload: Workload::new(id, format!("vm {id}")),
            honors: Vec::new(),
            hangs: Vec::new(),
            stop_delay: Duration::ZERO,
            stops_at: None,
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.workload = self.workload.with_tag(tag);
        self
    }

    pub fn control_domain(mut self) -> Self {
        self.workload = self.workload.control_domain();
        self
    }

    /// Accept `action` and power off `delay` after it is issued
    pub fn stops_on(mut self, action: WorkloadAction, delay: Duration) -> Self {
        self.honors.push(action);
        self.stop_delay = delay;
        self
    }

    /// `action` is accepted by the management plane but the call never returns
    pub fn hangs_on(mut self, action: WorkloadAction) -> Self {
        self.hangs.push(action);
        self
    }

    fn current(&self, now: Instant) -> Workload {
        let mut workload = self.workload.clone();
        if matches!(self.stops_at, Some(at) if now >= at) {
            workload.power_state = PowerState::Stopped;
        }
        workload
    }
}

#[derive(Debug, Clone)]
pub struct SimHost {
    pub host: Host,
    /// Time from shutdown command to the host no longer answering probes
    goes_dark_after: Option<Duration>,
    shutdown_at: Option<Instant>,
    probe_errors: bool,
}

impl SimHost {
    pub fn member(id: &str) -> Self {
        Self::new(Host::member(id, format!("host {id}"), format!("addr-{id}")))
    }

    pub fn coordinator(id: &str) -> Self {
        Self::new(Host::coordinator(id, format!("host {id}"), format!("addr-{id}")))
    }

    fn new(host: Host) -> Self {
        Self {
            host,
            goes_dark_after: Some(Duration::from_secs(30)),
            shutdown_at: None,
            probe_errors: false,
        }
    }

    pub fn goes_dark_after(mut self, delay: Duration) -> Self {
        self.goes_dark_after = Some(delay);
        self
    }

    pub fn never_goes_dark(mut self) -> Self {
        self.goes_dark_after = None;
        self
    }

    /// Probes against this host fail with a network error
    pub fn probe_errors(mut self) -> Self {
        self.probe_errors = true;
        self
    }

    fn reachable(&self, now: Instant) -> bool {
        match (self.shutdown_at, self.goes_dark_after) {
            (Some(at), Some(delay)) => now < at + delay,
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    workloads: Vec<SimWorkload>,
    hosts: Vec<SimHost>,
    volumes: Vec<StorageVolume>,
    attachments: Vec<StorageAttachment>,
    failing_detaches: HashSet<String>,
    failing_disables: HashSet<String>,
    events: Vec<(Duration, ClusterEvent)>,
}

pub struct SimulatedCluster {
    state: Mutex<ClusterState>,
    started: Instant,
    management_plane_down: AtomicBool,
}

impl Default for SimulatedCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            started: Instant::now(),
            management_plane_down: AtomicBool::new(false),
        }
    }

    pub fn with_workload(self, workload: SimWorkload) -> Self {
        self.state.lock().workloads.push(workload);
        self
    }

    pub fn with_host(self, host: SimHost) -> Self {
        self.state.lock().hosts.push(host);
        self
    }

    /// Add a volume with `attachments` plugged attachments named `<volume>-pbd-<n>`
    pub fn with_volume(self, id: &str, transport: TransportType, attachments: usize) -> Self {
        {
            let mut state = self.state.lock();
            let volume = StorageVolume {
                id: ResourceId::new(id),
                name: format!("sr {id}"),
                transport: transport.clone(),
            };
            for n in 0..attachments {
                state.attachments.push(StorageAttachment {
                    id: ResourceId::new(format!("{id}-pbd-{n}")),
                    volume_id: volume.id.clone(),
                    transport: transport.clone(),
                    name: volume.name.clone(),
                    currently_attached: true,
                });
            }
            state.volumes.push(volume);
        }
        self
    }

    pub fn failing_detach(self, attachment: &str) -> Self {
        self.state.lock().failing_detaches.insert(attachment.to_string());
        self
    }

    pub fn failing_disable(self, host: &str) -> Self {
        self.state.lock().failing_disables.insert(host.to_string());
        self
    }

    pub fn take_management_plane_down(&self) {
        self.management_plane_down.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.state.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events with the time they happened, relative to cluster creation
    pub fn timed_events(&self) -> Vec<(Duration, ClusterEvent)> {
        self.state.lock().events.clone()
    }

    pub fn actions_for(&self, action: WorkloadAction) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClusterEvent::WorkloadAction { id, action: a } if a == action => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn attached_count(&self) -> usize {
        self.state
            .lock()
            .attachments
            .iter()
            .filter(|a| a.currently_attached)
            .count()
    }

    pub fn running_workloads(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .workloads
            .iter()
            .filter(|w| w.current(now).power_state == PowerState::Running)
            .count()
    }

    fn record(&self, state: &mut ClusterState, event: ClusterEvent) {
        state.events.push((self.started.elapsed(), event));
    }

    fn check_plane(&self, operation: &str) -> Result<()> {
        if self.management_plane_down.load(Ordering::SeqCst) {
            return Err(ShutdownError::management_plane(operation, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceEnumerator for SimulatedCluster {
    async fn list_workloads(&self, scope: &WorkloadScope) -> Result<ResourceSet> {
        self.check_plane("vm-list")?;
        let now = Instant::now();
        Ok(self
            .state
            .lock()
            .workloads
            .iter()
            .map(|w| w.current(now))
            .filter(|w| scope.includes(w))
            .map(|w| w.id)
            .collect())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.check_plane("host-list")?;
        Ok(self.state.lock().hosts.iter().map(|h| h.host.clone()).collect())
    }

    async fn list_storage_volumes(
        &self,
        transports: &[TransportType],
    ) -> Result<Vec<StorageVolume>> {
        self.check_plane("sr-list")?;
        Ok(self
            .state
            .lock()
            .volumes
            .iter()
            .filter(|v| transports.contains(&v.transport))
            .cloned()
            .collect())
    }

    async fn list_attachments(&self, volume: &StorageVolume) -> Result<Vec<StorageAttachment>> {
        self.check_plane("pbd-list")?;
        Ok(self
            .state
            .lock()
            .attachments
            .iter()
            .filter(|a| a.volume_id == volume.id)
            .cloned()
            .collect())
    }

    async fn display_name(&self, id: &ResourceId) -> Result<String> {
        Ok(format!("vm {id}"))
    }
}

#[async_trait]
impl CommandDispatcher for SimulatedCluster {
    async fn workload_action(&self, id: &ResourceId, action: WorkloadAction) -> Result<()> {
        let hangs = {
            let now = Instant::now();
            let mut state = self.state.lock();
            self.record(
                &mut state,
                ClusterEvent::WorkloadAction {
                    id: id.to_string(),
                    action,
                },
            );
            let workload = state
                .workloads
                .iter_mut()
                .find(|w| &w.workload.id == id)
                .ok_or_else(|| {
                    ShutdownError::dispatch(action.to_string(), id.as_str(), "no such vm")
                })?;

            if workload.honors.contains(&action) && workload.stops_at.is_none() {
                workload.stops_at = Some(now + workload.stop_delay);
            }
            if !workload.honors.contains(&action) && !workload.hangs.contains(&action) {
                return Err(ShutdownError::dispatch(
                    action.to_string(),
                    id.as_str(),
                    "operation rejected",
                ));
            }
            workload.hangs.contains(&action)
        };

        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn disable_host(&self, id: &ResourceId) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, ClusterEvent::HostDisabled(id.to_string()));
        if state.failing_disables.contains(id.as_str()) {
            return Err(ShutdownError::dispatch("host_disable", id.as_str(), "host busy"));
        }
        Ok(())
    }

    async fn shutdown_host(&self, id: &ResourceId) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.record(&mut state, ClusterEvent::HostShutdown(id.to_string()));
        if let Some(host) = state.hosts.iter_mut().find(|h| &h.host.id == id) {
            host.shutdown_at.get_or_insert(now);
        }
        Ok(())
    }

    async fn detach_attachment(&self, id: &ResourceId) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, ClusterEvent::Detached(id.to_string()));
        if state.failing_detaches.contains(id.as_str()) {
            return Err(ShutdownError::dispatch("detach", id.as_str(), "device busy"));
        }
        if let Some(attachment) = state.attachments.iter_mut().find(|a| &a.id == id) {
            attachment.currently_attached = false;
        }
        Ok(())
    }
}

#[async_trait]
impl LivenessProbe for SimulatedCluster {
    async fn probe(&self, address: &str) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let host = state
            .hosts
            .iter()
            .find(|h| h.host.address == address)
            .cloned();
        self.record(
            &mut state,
            ClusterEvent::Probed(
                host.as_ref()
                    .map(|h| h.host.id.to_string())
                    .unwrap_or_else(|| address.to_string()),
            ),
        );

        match host {
            Some(h) if h.probe_errors => Err(ShutdownError::Probe {
                address: address.to_string(),
                message: "network unreachable".to_string(),
            }),
            Some(h) => Ok(h.reachable(now)),
            None => Ok(false),
        }
    }
}

/// Role source returning a fixed role
pub struct StaticRole(pub HostRole);

#[async_trait]
impl RoleSource for StaticRole {
    async fn local_role(&self) -> Result<HostRole> {
        Ok(self.0)
    }
}

/// Role source whose configuration cannot be read
pub struct UnreadableRole;

#[async_trait]
impl RoleSource for UnreadableRole {
    async fn local_role(&self) -> Result<HostRole> {
        Err(ShutdownError::RoleSource("cannot read pool.conf".to_string()))
    }
}

/// Wire every collaborator to the simulated cluster
pub fn context(cluster: &Arc<SimulatedCluster>) -> ManagementContext {
    ManagementContext::new(
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        Arc::new(TokioClock),
    )
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
