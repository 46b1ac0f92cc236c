//! # Storage Detacher
//!
//! Best-effort unplug of every attachment bound to a network-backed volume.
//! Detach is synchronous from the management plane's point of view, so there is
//! no convergence wait. A failed detach is logged and skipped.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::logging::{log_dispatch_operation, log_error};
use crate::management::{CommandDispatcher, ResourceEnumerator};
use crate::models::TransportType;
use crate::timing::Clock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetachReport {
    pub volumes: usize,
    pub attempted: usize,
    pub detached: usize,
    pub failed: usize,
    /// Attachments that were not plugged in to begin with
    pub already_detached: usize,
}

pub struct StorageDetacher {
    enumerator: Arc<dyn ResourceEnumerator>,
    dispatcher: Arc<dyn CommandDispatcher>,
    clock: Arc<dyn Clock>,
    transports: Vec<TransportType>,
    stagger: Duration,
}

impl fmt::Debug for StorageDetacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageDetacher")
            .field("transports", &self.transports)
            .field("stagger", &self.stagger)
            .finish()
    }
}

impl StorageDetacher {
    pub fn new(
        enumerator: Arc<dyn ResourceEnumerator>,
        dispatcher: Arc<dyn CommandDispatcher>,
        clock: Arc<dyn Clock>,
        transports: Vec<TransportType>,
        stagger: Duration,
    ) -> Self {
        Self {
            enumerator,
            dispatcher,
            clock,
            transports,
            stagger,
        }
    }

    /// Detach every plugged attachment of every network-backed volume.
    ///
    /// Enumeration failures are returned; detach failures only show up in the report.
    #[instrument(skip_all)]
    pub async fn detach_all(&self) -> Result<DetachReport> {
        let mut report = DetachReport::default();

        let volumes = self.enumerator.list_storage_volumes(&self.transports).await?;
        info!(volumes = volumes.len(), "💾 STORAGE: detaching network-backed volumes");

        for volume in volumes.iter().filter(|v| v.transport.is_network_backed()) {
            report.volumes += 1;

            for attachment in self.enumerator.list_attachments(volume).await? {
                if !attachment.currently_attached {
                    report.already_detached += 1;
                    debug!(
                        attachment = %attachment.id,
                        volume = %volume.name,
                        "STORAGE: attachment already detached"
                    );
                    continue;
                }

                report.attempted += 1;
                match self.dispatcher.detach_attachment(&attachment.id).await {
                    Ok(()) => {
                        report.detached += 1;
                        log_dispatch_operation(
                            "storage",
                            "detach",
                            attachment.id.as_str(),
                            Some(&volume.name),
                            "detached",
                            Some(volume.transport.as_str()),
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        log_error(
                            "storage",
                            "detach",
                            &e.to_string(),
                            Some(&format!("volume {} ({})", volume.name, volume.id)),
                        );
                    }
                }
                self.clock.sleep(self.stagger).await;
            }
        }

        info!(
            volumes = report.volumes,
            detached = report.detached,
            failed = report.failed,
            already_detached = report.already_detached,
            "💾 STORAGE: detach pass finished"
        );
        Ok(report)
    }
}
