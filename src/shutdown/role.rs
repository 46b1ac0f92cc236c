//! # Role Gate
//!
//! Entry guard: the procedure only runs on the node holding the coordinator role.
//! Every member carries the same installation so that any of them can take over,
//! and on a member the gate turns the whole run into a silent no-op.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, ShutdownError};
use crate::models::HostRole;

/// Local, read-only source of this node's role
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn local_role(&self) -> Result<HostRole>;
}

/// Reads the pool role file: `master` or `slave:<coordinator address>`
#[derive(Debug, Clone)]
pub struct PoolConfRoleSource {
    path: PathBuf,
}

impl PoolConfRoleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse the contents of the pool role file
pub fn parse_pool_role(contents: &str) -> Result<HostRole> {
    let contents = contents.trim();
    if contents == "master" {
        Ok(HostRole::Coordinator)
    } else if contents.starts_with("slave:") {
        Ok(HostRole::Member)
    } else {
        Err(ShutdownError::RoleSource(format!(
            "unrecognised pool role '{contents}'"
        )))
    }
}

#[async_trait]
impl RoleSource for PoolConfRoleSource {
    async fn local_role(&self) -> Result<HostRole> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ShutdownError::RoleSource(format!("cannot read {}: {e}", self.path.display()))
        })?;
        parse_pool_role(&contents)
    }
}

#[derive(Clone)]
pub struct RoleGate {
    source: Arc<dyn RoleSource>,
}

impl std::fmt::Debug for RoleGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleGate")
            .field("source", &"Arc<dyn RoleSource>")
            .finish()
    }
}

impl RoleGate {
    pub fn new(source: Arc<dyn RoleSource>) -> Self {
        Self { source }
    }

    /// Resolve this node's role once
    pub async fn resolve(&self) -> Result<HostRole> {
        let role = self.source.local_role().await?;
        info!(role = %role, "🔐 ROLE: local role resolved");
        Ok(role)
    }
}
