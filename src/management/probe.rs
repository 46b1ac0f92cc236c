//! ICMP echo liveness probe backed by the system `ping` binary.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::traits::LivenessProbe;
use crate::error::{Result, ShutdownError};

#[derive(Debug, Clone)]
pub struct PingProbe {
    binary: String,
    timeout_seconds: u64,
}

impl PingProbe {
    pub fn new(binary: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_seconds,
        }
    }

    fn args(&self, address: &str) -> Vec<String> {
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            self.timeout_seconds.to_string(),
            address.to_string(),
        ]
    }
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn probe(&self, address: &str) -> Result<bool> {
        let status = Command::new(&self.binary)
            .args(self.args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ShutdownError::Probe {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        debug!(address = %address, success = status.success(), "PROBE: echo request finished");
        Ok(status.success())
    }
}
