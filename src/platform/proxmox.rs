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

//! Proxmox VE platform client.
//!
//! QEMU VMs and LXC containers share a VMID namespace, so `spec.id` maps
//! directly onto the VMID and gives `ensure` its idempotence key. Address
//! discovery goes through the QEMU guest agent for VMs and the container
//! interface listing for LXC.

use crate::error::{Result, UpliftError};
use crate::platform::{
    AgentPing, Ensured, EnsureOutcome, GuestAddress, GuestInterface, Platform,
    ProvisionedResource, ResourceState,
};
use crate::secrets::{resolve_secret, Secret};
use crate::topology::spec::{AddressFamily, ResourceKind, ResourceSpec};
use crate::topology::Topology;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// All Proxmox API responses wrap their payload in a `data` field.
#[derive(Deserialize, Debug)]
struct ApiEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize, Debug, Clone)]
struct GuestListItem {
    vmid: u64,
    status: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct VersionData {
    version: String,
}

#[derive(Deserialize, Debug)]
struct AgentInterfacesResult {
    result: Option<Vec<AgentInterface>>,
}

#[derive(Deserialize, Debug)]
struct AgentInterface {
    name: String,
    #[serde(rename = "ip-addresses", default)]
    ip_addresses: Vec<AgentIpAddress>,
}

#[derive(Deserialize, Debug)]
struct AgentIpAddress {
    #[serde(rename = "ip-address")]
    ip_address: String,
    #[serde(rename = "ip-address-type")]
    ip_address_type: String,
}

#[derive(Deserialize, Debug)]
struct LxcInterface {
    name: String,
    inet: Option<String>,
    inet6: Option<String>,
}

pub struct ProxmoxPlatform {
    api_host: String,
    default_node: Option<String>,
    token_id: String,
    token_secret: Secret,
    min_version: Option<semver::Version>,
}

impl ProxmoxPlatform {
    pub fn from_topology(topology: &Topology) -> Result<Self> {
        let section = &topology.platform;
        let api_host = section.api_host.clone().ok_or_else(|| {
            UpliftError::Config("platform.api_host is required for a proxmox run".into())
        })?;
        let token_id = section.token_id.clone().ok_or_else(|| {
            UpliftError::Config("platform.token_id is required for a proxmox run".into())
        })?;
        let secret_source = section.token_secret.as_ref().ok_or_else(|| {
            UpliftError::Config("platform.token_secret is required for a proxmox run".into())
        })?;
        let token_secret = resolve_secret(secret_source)?;

        let min_version = match &section.min_version {
            Some(v) => Some(semver::Version::parse(v).map_err(|e| {
                UpliftError::Config(format!("platform.min_version '{}' is not semver: {}", v, e))
            })?),
            None => None,
        };

        Ok(Self {
            api_host,
            default_node: section.node.clone(),
            token_id,
            token_secret,
            min_version,
        })
    }

    fn api_url(&self, path: &str) -> String {
        if self.api_host.contains(':') {
            format!("https://{}/api2/json{}", self.api_host, path)
        } else {
            format!("https://{}:8006/api2/json{}", self.api_host, path)
        }
    }

    fn auth_header(&self) -> String {
        format!("PVEAPIToken={}={}", self.token_id, self.token_secret.expose())
    }

    fn runtime(&self) -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| UpliftError::Other(format!("unable to create async runtime: {}", e)))
    }

    fn client(&self) -> Result<reqwest::Client> {
        // Proxmox ships self-signed certs by default
        reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpliftError::Other(format!("unable to create HTTP client: {}", e)))
    }

    fn node_for<'a>(&'a self, spec: &'a ResourceSpec) -> Result<&'a str> {
        spec.placement
            .as_deref()
            .or(self.default_node.as_deref())
            .ok_or_else(|| {
                UpliftError::Config(format!(
                    "resource {} has no placement and platform.node is unset", spec.id
                ))
            })
    }

    fn family_path(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Vm => "qemu",
            ResourceKind::Container => "lxc",
        }
    }

    fn api_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api_url(path);
        let rt = self.runtime()?;
        let auth = self.auth_header();
        let client = self.client()?;

        rt.block_on(async {
            let resp = client
                .get(&url)
                .header("Authorization", auth)
                .send()
                .await
                .map_err(transport_error)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(error_for_status(status, &body));
            }
            let envelope: ApiEnvelope<T> = resp.json().await.map_err(|e| {
                UpliftError::PlatformUnavailable(format!("unparseable API response: {}", e))
            })?;
            envelope
                .data
                .ok_or_else(|| UpliftError::PlatformUnavailable("empty API response".into()))
        })
    }

    fn api_post(&self, path: &str, params: &HashMap<String, String>) -> Result<()> {
        let url = self.api_url(path);
        let rt = self.runtime()?;
        let auth = self.auth_header();
        let client = self.client()?;

        rt.block_on(async {
            let resp = client
                .post(&url)
                .header("Authorization", auth)
                .form(params)
                .send()
                .await
                .map_err(transport_error)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(error_for_status(status, &body));
            }
            Ok(())
        })
    }

    fn api_delete(&self, path: &str) -> Result<()> {
        let url = self.api_url(path);
        let rt = self.runtime()?;
        let auth = self.auth_header();
        let client = self.client()?;

        rt.block_on(async {
            let resp = client
                .delete(&url)
                .header("Authorization", auth)
                .send()
                .await
                .map_err(transport_error)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(error_for_status(status, &body));
            }
            Ok(())
        })
    }

    /// Reject platforms older than the configured minimum before mutating
    /// anything.
    pub fn verify_version(&self) -> Result<()> {
        let min = match &self.min_version {
            Some(v) => v,
            None => return Ok(()),
        };
        let data: VersionData = self.api_get("/version")?;
        let actual = semver::Version::parse(&data.version).map_err(|e| {
            UpliftError::PlatformUnavailable(format!(
                "platform reported unparseable version '{}': {}", data.version, e
            ))
        })?;
        if actual < *min {
            return Err(UpliftError::Config(format!(
                "platform version {} is older than required {}", actual, min
            )));
        }
        Ok(())
    }

    fn list_guests(&self, node: &str, kind: ResourceKind) -> Result<Vec<GuestListItem>> {
        let path = format!("/nodes/{}/{}", urlencoding::encode(node), Self::family_path(kind));
        self.api_get(&path)
    }

    /// Find the spec's VMID on its node, checking the sibling family so a
    /// kind mismatch surfaces as a conflict instead of a duplicate create.
    fn locate(&self, spec: &ResourceSpec) -> Result<Option<GuestListItem>> {
        let node = self.node_for(spec)?;
        for item in self.list_guests(node, spec.kind)? {
            if item.vmid == spec.id {
                return Ok(Some(item));
            }
        }
        let sibling = match spec.kind {
            ResourceKind::Vm => ResourceKind::Container,
            ResourceKind::Container => ResourceKind::Vm,
        };
        for item in self.list_guests(node, sibling)? {
            if item.vmid == spec.id {
                return Err(UpliftError::ResourceConflict(format!(
                    "vmid {} already exists as a {} but the topology declares a {}",
                    spec.id,
                    sibling.as_str(),
                    spec.kind.as_str()
                )));
            }
        }
        Ok(None)
    }

    fn start_guest(&self, spec: &ResourceSpec) -> Result<()> {
        let node = self.node_for(spec)?;
        let path = format!(
            "/nodes/{}/{}/{}/status/start",
            urlencoding::encode(node),
            Self::family_path(spec.kind),
            spec.id
        );
        self.api_post(&path, &HashMap::new())
    }

    fn create_params(&self, spec: &ResourceSpec) -> Result<HashMap<String, String>> {
        let mut params: HashMap<String, String> = HashMap::new();

        // operator passthrough first; computed defaults only fill gaps
        for (k, v) in spec.extra.iter() {
            if k != "node" {
                params.insert(k.clone(), v.clone());
            }
        }

        params.insert("vmid".to_string(), spec.id.to_string());
        params
            .entry("cores".to_string())
            .or_insert_with(|| spec.cores.unwrap_or(2).to_string());
        params
            .entry("memory".to_string())
            .or_insert_with(|| spec.memory.unwrap_or(2048).to_string());
        params.insert("start".to_string(), "1".to_string());

        match spec.kind {
            ResourceKind::Vm => {
                params.insert("name".to_string(), spec.hostname());
                let disk_size = spec
                    .disk
                    .as_deref()
                    .map(|s| s.trim_end_matches(['G', 'g']).to_string())
                    .unwrap_or_else(|| "20".to_string());
                let storage = spec
                    .extra
                    .get("storage")
                    .map(|s| s.as_str())
                    .unwrap_or("local-lvm");
                params
                    .entry("scsi0".to_string())
                    .or_insert_with(|| format!("{}:{},iothread=1", storage, disk_size));
                params
                    .entry("scsihw".to_string())
                    .or_insert_with(|| "virtio-scsi-single".to_string());
                params
                    .entry("net0".to_string())
                    .or_insert_with(|| "virtio,bridge=vmbr0".to_string());
                params
                    .entry("ostype".to_string())
                    .or_insert_with(|| "l26".to_string());
                // discovery depends on the agent channel
                params.entry("agent".to_string()).or_insert_with(|| "1".to_string());
            }
            ResourceKind::Container => {
                params.insert("hostname".to_string(), spec.hostname());
                if !params.contains_key("ostemplate") {
                    return Err(UpliftError::Validation(format!(
                        "container {} requires an ostemplate", spec.id
                    )));
                }
                let disk_size = spec
                    .disk
                    .as_deref()
                    .map(|s| s.trim_end_matches(['G', 'g']).to_string())
                    .unwrap_or_else(|| "8".to_string());
                let storage = spec
                    .extra
                    .get("storage")
                    .map(|s| s.as_str())
                    .unwrap_or("local-lvm");
                params
                    .entry("rootfs".to_string())
                    .or_insert_with(|| format!("{}:{}", storage, disk_size));
                params
                    .entry("net0".to_string())
                    .or_insert_with(|| "name=eth0,bridge=vmbr0,ip=dhcp".to_string());
                params
                    .entry("unprivileged".to_string())
                    .or_insert_with(|| "1".to_string());
            }
        }

        Ok(params)
    }

    fn query_vm_interfaces(&self, spec: &ResourceSpec) -> Result<AgentPing> {
        let node = self.node_for(spec)?;
        let path = format!(
            "/nodes/{}/qemu/{}/agent/network-get-interfaces",
            urlencoding::encode(node),
            spec.id
        );
        let result: std::result::Result<AgentInterfacesResult, UpliftError> = self.api_get(&path);
        match result {
            Ok(data) => {
                let interfaces = data
                    .result
                    .unwrap_or_default()
                    .into_iter()
                    .map(|iface| GuestInterface {
                        name: iface.name,
                        addresses: iface
                            .ip_addresses
                            .into_iter()
                            .filter_map(|ip| {
                                let family = match ip.ip_address_type.as_str() {
                                    "ipv4" => AddressFamily::Ipv4,
                                    "ipv6" => AddressFamily::Ipv6,
                                    _ => return None,
                                };
                                Some(GuestAddress { address: ip.ip_address, family })
                            })
                            .collect(),
                    })
                    .collect();
                Ok(AgentPing::Interfaces(interfaces))
            }
            // the agent answers 500 until the guest has booted far enough
            Err(UpliftError::PlatformUnavailable(msg)) if msg.contains("guest agent") => {
                Ok(AgentPing::NotReady)
            }
            Err(e) => Err(e),
        }
    }

    fn query_lxc_interfaces(&self, spec: &ResourceSpec) -> Result<AgentPing> {
        let node = self.node_for(spec)?;
        let path = format!(
            "/nodes/{}/lxc/{}/interfaces",
            urlencoding::encode(node),
            spec.id
        );
        let interfaces: Vec<LxcInterface> = self.api_get(&path)?;
        let mapped = interfaces
            .into_iter()
            .map(|iface| {
                let mut addresses = Vec::new();
                if let Some(inet) = iface.inet {
                    addresses.push(GuestAddress {
                        address: strip_prefix_len(&inet),
                        family: AddressFamily::Ipv4,
                    });
                }
                if let Some(inet6) = iface.inet6 {
                    addresses.push(GuestAddress {
                        address: strip_prefix_len(&inet6),
                        family: AddressFamily::Ipv6,
                    });
                }
                GuestInterface { name: iface.name, addresses }
            })
            .collect();
        Ok(AgentPing::Interfaces(mapped))
    }
}

impl Platform for ProxmoxPlatform {
    fn name(&self) -> &'static str {
        "proxmox"
    }

    fn find(&self, spec: &ResourceSpec) -> Result<Option<String>> {
        Ok(self.locate(spec)?.map(|item| item.vmid.to_string()))
    }

    fn ensure(&self, spec: &ResourceSpec) -> Result<Ensured> {
        if let Some(existing) = self.locate(spec)? {
            if let Some(name) = &existing.name {
                if *name != spec.hostname() {
                    return Err(UpliftError::ResourceConflict(format!(
                        "vmid {} is named '{}' on the platform but '{}' in the topology",
                        spec.id,
                        name,
                        spec.hostname()
                    )));
                }
            }
            if existing.status.as_deref() != Some("running") {
                self.start_guest(spec)?;
            }
            return Ok(Ensured {
                resource: ProvisionedResource::new(
                    spec.id,
                    existing.vmid.to_string(),
                    ResourceState::Booting,
                ),
                outcome: EnsureOutcome::AlreadyExists,
            });
        }

        let node = self.node_for(spec)?;
        let path = format!("/nodes/{}/{}", urlencoding::encode(node), Self::family_path(spec.kind));
        let params = self.create_params(spec)?;
        self.api_post(&path, &params)?;

        Ok(Ensured {
            resource: ProvisionedResource::new(spec.id, spec.id.to_string(), ResourceState::Booting),
            outcome: EnsureOutcome::Created,
        })
    }

    fn query_interfaces(&self, spec: &ResourceSpec, _handle: &str) -> Result<AgentPing> {
        match spec.kind {
            ResourceKind::Vm => self.query_vm_interfaces(spec),
            ResourceKind::Container => self.query_lxc_interfaces(spec),
        }
    }

    fn destroy(&self, spec: &ResourceSpec) -> Result<bool> {
        let existing = match self.locate(spec)? {
            Some(item) => item,
            None => return Ok(false),
        };
        let node = self.node_for(spec)?;
        if existing.status.as_deref() == Some("running") {
            let stop = format!(
                "/nodes/{}/{}/{}/status/stop",
                urlencoding::encode(node),
                Self::family_path(spec.kind),
                spec.id
            );
            // best effort; delete below reports the real failure
            let _ = self.api_post(&stop, &HashMap::new());
            std::thread::sleep(Duration::from_secs(3));
        }
        let path = format!(
            "/nodes/{}/{}/{}",
            urlencoding::encode(node),
            Self::family_path(spec.kind),
            spec.id
        );
        self.api_delete(&path)?;
        Ok(true)
    }
}

fn transport_error(e: reqwest::Error) -> UpliftError {
    UpliftError::PlatformUnavailable(format!("request failed: {}", e))
}

fn error_for_status(status: reqwest::StatusCode, body: &str) -> UpliftError {
    let lowered = body.to_lowercase();
    if status.is_server_error() || status.as_u16() == 429 {
        return UpliftError::PlatformUnavailable(format!("{}: {}", status, body));
    }
    if lowered.contains("quota") || lowered.contains("limit exceeded") {
        return UpliftError::QuotaExceeded(format!("{}: {}", status, body));
    }
    if status.as_u16() == 409 || lowered.contains("already exists") {
        return UpliftError::ResourceConflict(format!("{}: {}", status, body));
    }
    UpliftError::Other(format!("API error {}: {}", status, body))
}

fn strip_prefix_len(address: &str) -> String {
    address.split('/').next().unwrap_or(address).to_string()
}
