//! Storage volume and attachment model.

use super::resource_set::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport backing a storage volume
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Nfs,
    Iscsi,
    LvmOverIscsi,
    LvmOverHba,
    Cifs,
    Local,
    Other(String),
}

impl TransportType {
    /// Network-backed volumes are the only ones this procedure detaches
    pub fn is_network_backed(&self) -> bool {
        matches!(
            self,
            Self::Nfs | Self::Iscsi | Self::LvmOverIscsi | Self::LvmOverHba | Self::Cifs
        )
    }

    /// Name used by the management plane
    pub fn as_str(&self) -> &str {
        match self {
            Self::Nfs => "nfs",
            Self::Iscsi => "iscsi",
            Self::LvmOverIscsi => "lvmoiscsi",
            Self::LvmOverHba => "lvmohba",
            Self::Cifs => "cifs",
            Self::Local => "lvm",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TransportType {
    fn from(value: &str) -> Self {
        match value.trim() {
            "nfs" => Self::Nfs,
            "iscsi" => Self::Iscsi,
            "lvmoiscsi" => Self::LvmOverIscsi,
            "lvmohba" => Self::LvmOverHba,
            "cifs" | "smb" => Self::Cifs,
            "lvm" | "ext" | "local" => Self::Local,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVolume {
    pub id: ResourceId,
    pub name: String,
    pub transport: TransportType,
}

/// Binding between a host and a storage volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAttachment {
    pub id: ResourceId,
    pub volume_id: ResourceId,
    pub transport: TransportType,
    pub name: String,
    pub currently_attached: bool,
}
