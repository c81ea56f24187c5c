//! Telemetry payload submitted by agents to the hub

use crate::cf::DeploymentInfo;
use crate::config::InstanceSpec;
use crate::system::Stats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub spec: InstanceSpec,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "system_stats", default)]
    pub stats: Stats,
    /// Cloud Foundry ownership, when the deployment is a service instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf: Option<DeploymentInfo>,
}
