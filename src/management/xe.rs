//! # XE CLI Adapter
//!
//! Implements [`ResourceEnumerator`] and [`CommandDispatcher`] on top of the `xe`
//! command-line client that ships on every pool host.
//!
//! `xe` prints records as blocks of `key ( RO)    : value` lines separated by
//! blank lines, and `--minimal` output as a single comma-separated line. Both are
//! parsed here.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::traits::{CommandDispatcher, ResourceEnumerator, WorkloadAction};
use crate::error::{Result, ShutdownError};
use crate::models::{
    Host, HostRole, PowerState, ResourceId, ResourceSet, StorageAttachment, StorageVolume,
    TransportType, Workload, WorkloadScope,
};

type XeRecord = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct XeCli {
    binary: String,
}

impl XeCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let operation = args.first().cloned().unwrap_or_default();
        debug!(binary = %self.binary, args = ?args, "XE: invoking");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShutdownError::management_plane(&operation, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ShutdownError::management_plane(
                operation,
                format!("exit status {}: {stderr}", output.status),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn command(&self, args: &[String]) -> Result<()> {
        self.run(args).await.map(|_| ())
    }

    async fn records(&self, args: &[String]) -> Result<Vec<XeRecord>> {
        self.run(args).await.map(|out| parse_records(&out))
    }
}

fn arg(key: &str, value: impl std::fmt::Display) -> String {
    format!("{key}={value}")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Parse `--minimal` output into its comma-separated values
pub fn parse_minimal(output: &str) -> Vec<String> {
    output
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse blank-line separated `key ( RO)    : value` records
pub fn parse_records(output: &str) -> Vec<XeRecord> {
    let mut records = Vec::new();
    let mut current = XeRecord::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }

        let Some((key, value)) = split_record_line(line) else {
            continue;
        };

        if !key.is_empty() {
            current.insert(key.to_string(), value.to_string());
        }
    }

    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Split one record line into key and value.
///
/// The access marker "( RO)" sits between key and colon; values may contain colons.
fn split_record_line(line: &str) -> Option<(&str, &str)> {
    if let Some(open) = line.find('(') {
        if !line[..open].contains(':') {
            if let Some(close) = line[open..].find(')').map(|i| open + i) {
                let rest = &line[close + 1..];
                if let Some(colon) = rest.find(':') {
                    return Some((line[..open].trim(), rest[colon + 1..].trim()));
                }
            }
        }
    }
    let colon = line.find(':')?;
    Some((line[..colon].trim(), line[colon + 1..].trim()))
}

fn field<'a>(record: &'a XeRecord, key: &str, operation: &str) -> Result<&'a str> {
    record.get(key).map(String::as_str).ok_or_else(|| {
        ShutdownError::management_plane(operation, format!("record missing '{key}'"))
    })
}

/// Split a set-valued field. Record output separates members with `; `,
/// `--minimal` output with `,`.
fn parse_tags(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split([';', ','])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Build the in-scope workload set from `vm-list` records
fn workloads_from_records(records: &[XeRecord], scope: &WorkloadScope) -> Result<ResourceSet> {
    let mut workloads = Vec::with_capacity(records.len());
    for record in records {
        let mut workload = Workload::new(
            field(record, "uuid", "vm-list")?,
            record.get("name-label").cloned().unwrap_or_default(),
        );
        if let Some(state) = record.get("power-state") {
            workload.power_state = state.parse().unwrap_or(PowerState::Other);
        }
        if let Some(tags) = record.get("tags") {
            workload.tags.extend(parse_tags(tags));
        }
        workloads.push(workload);
    }

    Ok(workloads
        .into_iter()
        .filter(|w| scope.includes(w))
        .map(|w| w.id)
        .collect())
}

#[async_trait]
impl ResourceEnumerator for XeCli {
    async fn list_workloads(&self, scope: &WorkloadScope) -> Result<ResourceSet> {
        let records = self
            .records(&[
                "vm-list".to_string(),
                arg("power-state", "running"),
                arg("is-control-domain", "false"),
                arg("params", "uuid,name-label,power-state,tags"),
            ])
            .await?;

        workloads_from_records(&records, scope)
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        let master = self
            .run(&strings(&["pool-list", "params=master", "--minimal"]))
            .await
            .map(|out| parse_minimal(&out))?;
        let master = match master.as_slice() {
            [only] => ResourceId::new(only.clone()),
            other => {
                return Err(ShutdownError::Topology(format!(
                    "expected one pool master, found {}",
                    other.len()
                )))
            }
        };

        let records = self
            .records(&strings(&["host-list", "params=uuid,name-label,address"]))
            .await?;

        records
            .iter()
            .map(|record| -> Result<Host> {
                let id = ResourceId::new(field(record, "uuid", "host-list")?);
                let role = if id == master {
                    HostRole::Coordinator
                } else {
                    HostRole::Member
                };
                Ok(Host::new(
                    id,
                    record.get("name-label").cloned().unwrap_or_default(),
                    field(record, "address", "host-list")?,
                    role,
                ))
            })
            .collect()
    }

    async fn list_storage_volumes(
        &self,
        transports: &[TransportType],
    ) -> Result<Vec<StorageVolume>> {
        let per_type = try_join_all(transports.iter().map(|transport| async move {
            let records = self
                .records(&[
                    "sr-list".to_string(),
                    arg("type", transport),
                    arg("params", "uuid,name-label,type"),
                ])
                .await?;
            records
                .iter()
                .map(|record| -> Result<StorageVolume> {
                    Ok(StorageVolume {
                        id: ResourceId::new(field(record, "uuid", "sr-list")?),
                        name: record.get("name-label").cloned().unwrap_or_default(),
                        transport: record
                            .get("type")
                            .map(|t| TransportType::from(t.as_str()))
                            .unwrap_or_else(|| transport.clone()),
                    })
                })
                .collect::<Result<Vec<_>>>()
        }))
        .await?;

        Ok(per_type.into_iter().flatten().collect())
    }

    async fn list_attachments(&self, volume: &StorageVolume) -> Result<Vec<StorageAttachment>> {
        let records = self
            .records(&[
                "pbd-list".to_string(),
                arg("sr-uuid", &volume.id),
                arg("params", "uuid,sr-uuid,currently-attached"),
            ])
            .await?;

        records
            .iter()
            .map(|record| -> Result<StorageAttachment> {
                Ok(StorageAttachment {
                    id: ResourceId::new(field(record, "uuid", "pbd-list")?),
                    volume_id: volume.id.clone(),
                    transport: volume.transport.clone(),
                    name: volume.name.clone(),
                    currently_attached: record
                        .get("currently-attached")
                        .map(|v| v == "true")
                        .unwrap_or(true),
                })
            })
            .collect()
    }

    async fn display_name(&self, id: &ResourceId) -> Result<String> {
        let out = self
            .run(&[
                "vm-param-get".to_string(),
                arg("uuid", id),
                arg("param-name", "name-label"),
            ])
            .await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl CommandDispatcher for XeCli {
    async fn workload_action(&self, id: &ResourceId, action: WorkloadAction) -> Result<()> {
        let args = match action {
            WorkloadAction::GracefulStop => vec!["vm-shutdown".to_string(), arg("uuid", id)],
            WorkloadAction::ForceStop => {
                vec!["vm-shutdown".to_string(), arg("uuid", id), "--force".to_string()]
            }
            WorkloadAction::PowerReset => vec![
                "vm-reset-powerstate".to_string(),
                arg("uuid", id),
                "--force".to_string(),
            ],
        };
        self.command(&args)
            .await
            .map_err(|e| ShutdownError::dispatch(action.to_string(), id.as_str(), e.to_string()))
    }

    async fn disable_host(&self, id: &ResourceId) -> Result<()> {
        self.command(&["host-disable".to_string(), arg("uuid", id)])
            .await
            .map_err(|e| ShutdownError::dispatch("host_disable", id.as_str(), e.to_string()))
    }

    async fn shutdown_host(&self, id: &ResourceId) -> Result<()> {
        self.command(&["host-shutdown".to_string(), arg("uuid", id)])
            .await
            .map_err(|e| ShutdownError::dispatch("host_shutdown", id.as_str(), e.to_string()))
    }

    async fn detach_attachment(&self, id: &ResourceId) -> Result<()> {
        self.command(&["pbd-unplug".to_string(), arg("uuid", id)])
            .await
            .map_err(|e| ShutdownError::dispatch("detach", id.as_str(), e.to_string()))
    }
}
