//! ResourceMonitor: a standing directive to discover groups of one provider.

use serde::{Deserialize, Serialize};

use super::meta::{Kind, Object};

pub type ResourceMonitor = Object<ResourceMonitorSpec>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMonitorSpec {
    #[serde(rename = "type")]
    pub provider: String,
}

impl Kind for ResourceMonitorSpec {
    const KIND: &'static str = "ResourceMonitor";
    type Status = ResourceMonitorStatus;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMonitorStatus {
    /// Completion time of the last successful discovery pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scanned_at: Option<String>,

    /// Number of managed groups the provider reported on that pass.
    #[serde(default)]
    pub discovered: u32,
}
