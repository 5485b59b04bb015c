// Uplift
// Copyright (C) 2025 - Uplift contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

use crate::secrets::SecretSource;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;

/// What the platform should realize this resource as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Vm,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Container => "container",
            ResourceKind::Vm => "vm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl Default for AddressFamily {
    fn default() -> Self {
        AddressFamily::Ipv4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Address is leased at boot and discovered through the guest agent.
    Dhcp,
    /// Address is fixed in the topology; discovery is skipped.
    Static,
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::Dhcp
    }
}

/// How a resource gets its address and how discovery should pick one when
/// the guest reports several interfaces.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    #[serde(default)]
    pub mode: NetworkMode,

    /// Required when mode is static.
    pub address: Option<String>,

    #[serde(default)]
    pub family: AddressFamily,

    /// Regex matched against guest interface names; defaults to the common
    /// wired-interface prefixes when unset.
    pub interface: Option<String>,
}

/// Declarative description of one compute resource to exist.
///
/// `id` doubles as the platform identity (the Proxmox VMID), which is what
/// makes provisioning idempotent across runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub id: u64,

    /// Hostname; defaults to `<role>-<id>` when unset.
    pub name: Option<String>,

    pub kind: ResourceKind,

    /// Determines which configuration group the resource later joins.
    pub role: String,

    pub cores: Option<u32>,

    /// Megabytes.
    pub memory: Option<u64>,

    /// Size string as the platform expects it, e.g. "20G".
    pub disk: Option<String>,

    /// Target node; falls back to the platform section's default node.
    pub placement: Option<String>,

    #[serde(default)]
    pub network: NetworkSpec,

    /// Per-resource template variables, layered over the topology defaults.
    #[serde(default)]
    pub vars: serde_yaml::Mapping,

    /// Passthrough platform options (ostemplate, bridge overrides, tags...)
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl ResourceSpec {
    pub fn hostname(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{}-{}", self.role, self.id),
        }
    }
}

/// Configuration group definition for one role tag.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleSpec {
    /// Configure-phase ordering; lower runs first. Groups with equal order
    /// run in file order.
    #[serde(default)]
    pub order: i64,

    /// Opaque label handed to the configuration-apply command, typically a
    /// playbook or profile name. A role with no apply step is a topology
    /// validation error.
    pub apply: Option<String>,
}

/// Connection details for the virtualization platform.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PlatformSection {
    /// Host or host:port of the API endpoint.
    pub api_host: Option<String>,

    /// Default node for resources without an explicit placement.
    pub node: Option<String>,

    pub token_id: Option<String>,

    pub token_secret: Option<SecretSource>,

    /// Minimum platform API version accepted at connect, e.g. "7.4.0".
    pub min_version: Option<String>,
}

/// The parsed topology file, prior to validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyFile {
    pub name: String,

    #[serde(default)]
    pub platform: PlatformSection,

    #[serde(default)]
    pub defaults: serde_yaml::Mapping,

    pub resources: Vec<ResourceSpec>,

    /// Role definitions in file order (order field breaks ties).
    #[serde(default)]
    pub roles: IndexMap<String, RoleSpec>,
}
