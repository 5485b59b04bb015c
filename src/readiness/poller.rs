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

//! Waits for a provisioned resource to report a usable network address.
//!
//! The guest side of bring-up is eventually consistent: the agent channel
//! appears some time after boot, and interfaces can show up before they
//! have addresses. Transport errors and partial reports are both normal
//! here, so everything short of the deadline is retried quietly.

use crate::error::{Result, UpliftError};
use crate::inventory::groups::DiscoveredAddress;
use crate::platform::{AgentPing, GuestInterface, Platform, ProvisionedResource};
use crate::run::cancel::CancelToken;
use crate::topology::spec::{NetworkMode, NetworkSpec, ResourceSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use std::thread;
use std::time::{Duration, Instant};

/// Interfaces that look like ordinary wired NICs, the usual place a
/// DHCP lease lands.
static DEFAULT_INTERFACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(eth|en)").expect("default interface pattern"));

/// Cadence between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Fixed delay between attempts.
    Simple,
    /// Delay doubles after each attempt, up to a maximum.
    Backoff,
}

impl WaitStrategy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "simple" => WaitStrategy::Simple,
            _ => WaitStrategy::Backoff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub strategy: WaitStrategy,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(2),
            strategy: WaitStrategy::Backoff,
            max_delay: Duration::from_secs(30),
        }
    }
}

pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Poll until the resource reports an address matching its network
    /// spec, the deadline passes, or the run is cancelled. No poll is
    /// issued once the deadline has elapsed.
    pub fn wait_ready(
        &self,
        platform: &dyn Platform,
        spec: &ResourceSpec,
        resource: &ProvisionedResource,
        cancel: &CancelToken,
    ) -> Result<DiscoveredAddress> {
        // statically addressed resources skip discovery entirely
        if spec.network.mode == NetworkMode::Static {
            let address = spec.network.address.clone().ok_or_else(|| {
                UpliftError::Validation(format!("resource {} declares no static address", spec.id))
            })?;
            return Ok(DiscoveredAddress::new(spec.id, address));
        }

        let interface_pattern = compile_interface_pattern(&spec.network)?;
        let start = Instant::now();
        let mut delay = self.policy.interval;

        loop {
            if cancel.is_cancelled() {
                return Err(UpliftError::Cancelled);
            }
            if start.elapsed() >= self.policy.timeout {
                return Err(UpliftError::ReadinessTimeout {
                    resource: spec.hostname(),
                    waited_secs: self.policy.timeout.as_secs(),
                });
            }

            match platform.query_interfaces(spec, &resource.handle) {
                Ok(AgentPing::Interfaces(interfaces)) => {
                    if let Some(address) =
                        select_address(&interfaces, &spec.network, &interface_pattern)
                    {
                        return Ok(DiscoveredAddress::new(spec.id, address));
                    }
                    // interfaces up but no usable lease yet; keep polling
                }
                Ok(AgentPing::NotReady) => {}
                // transport errors are retried silently within the deadline
                Err(_) => {}
            }

            thread::sleep(delay);
            if self.policy.strategy == WaitStrategy::Backoff {
                delay = (delay * 2).min(self.policy.max_delay);
            }
        }
    }
}

fn compile_interface_pattern(network: &NetworkSpec) -> Result<Regex> {
    match &network.interface {
        Some(pattern) => Regex::new(pattern).map_err(|e| {
            UpliftError::Validation(format!("bad interface pattern '{}': {}", pattern, e))
        }),
        None => Ok(DEFAULT_INTERFACE_PATTERN.clone()),
    }
}

/// Pick the first address matching the declared family on an interface
/// matching the declared name pattern. Loopback never counts.
pub fn select_address(
    interfaces: &[GuestInterface],
    network: &NetworkSpec,
    interface_pattern: &Regex,
) -> Option<String> {
    for interface in interfaces.iter() {
        if is_loopback_name(&interface.name) || !interface_pattern.is_match(&interface.name) {
            continue;
        }
        for candidate in interface.addresses.iter() {
            if candidate.family != network.family {
                continue;
            }
            if is_loopback_address(&candidate.address) {
                continue;
            }
            return Some(candidate.address.clone());
        }
    }
    None
}

fn is_loopback_name(name: &str) -> bool {
    name == "lo" || name.starts_with("lo:") || name == "lo0"
}

fn is_loopback_address(address: &str) -> bool {
    address.starts_with("127.") || address == "::1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulate::SimulatePlatform;
    use crate::platform::{AgentPing, GuestAddress, ResourceState};
    use crate::topology::spec::AddressFamily;

    fn vm_spec(id: u64) -> ResourceSpec {
        serde_yaml::from_str(&format!("id: {}\nkind: vm\nrole: server\n", id)).unwrap()
    }

    fn fast_policy(timeout_ms: u64) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(5),
            strategy: WaitStrategy::Simple,
            max_delay: Duration::from_millis(10),
        }
    }

    fn iface(name: &str, addrs: &[(&str, AddressFamily)]) -> GuestInterface {
        GuestInterface {
            name: name.to_string(),
            addresses: addrs
                .iter()
                .map(|(a, f)| GuestAddress { address: a.to_string(), family: *f })
                .collect(),
        }
    }

    fn default_network() -> NetworkSpec {
        NetworkSpec::default()
    }

    #[test]
    fn test_select_skips_loopback() {
        let interfaces = vec![
            iface("lo", &[("127.0.0.1", AddressFamily::Ipv4)]),
            iface("eth0", &[("10.0.0.5", AddressFamily::Ipv4)]),
        ];
        let selected = select_address(&interfaces, &default_network(), &DEFAULT_INTERFACE_PATTERN);
        assert_eq!(selected.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_select_respects_family() {
        let interfaces = vec![iface(
            "eth0",
            &[("fe80::1", AddressFamily::Ipv6), ("10.0.0.5", AddressFamily::Ipv4)],
        )];
        let selected = select_address(&interfaces, &default_network(), &DEFAULT_INTERFACE_PATTERN);
        assert_eq!(selected.as_deref(), Some("10.0.0.5"));

        let v6_net: NetworkSpec = serde_yaml::from_str("family: ipv6").unwrap();
        let selected = select_address(&interfaces, &v6_net, &DEFAULT_INTERFACE_PATTERN);
        assert_eq!(selected.as_deref(), Some("fe80::1"));
    }

    #[test]
    fn test_select_respects_interface_pattern() {
        let interfaces = vec![
            iface("eth0", &[("10.0.0.5", AddressFamily::Ipv4)]),
            iface("eth1", &[("192.168.1.5", AddressFamily::Ipv4)]),
        ];
        let net: NetworkSpec = serde_yaml::from_str("interface: \"^eth1$\"").unwrap();
        let pattern = compile_interface_pattern(&net).unwrap();
        let selected = select_address(&interfaces, &net, &pattern);
        assert_eq!(selected.as_deref(), Some("192.168.1.5"));
    }

    #[test]
    fn test_select_none_when_nothing_matches() {
        let interfaces = vec![iface("docker0", &[("172.17.0.1", AddressFamily::Ipv4)])];
        assert_eq!(
            select_address(&interfaces, &default_network(), &DEFAULT_INTERFACE_PATTERN),
            None
        );
    }

    #[test]
    fn test_wait_ready_discovers_address() {
        let platform = SimulatePlatform::new().with_boot_polls(2);
        let spec = vm_spec(301);
        let ensured = platform.ensure(&spec).unwrap();
        let poller = Poller::new(fast_policy(1000));

        let discovered = poller
            .wait_ready(&platform, &spec, &ensured.resource, &CancelToken::new())
            .unwrap();
        assert_eq!(discovered.spec_id, 301);
        assert_eq!(discovered.address, SimulatePlatform::address_for(301));
        // two NotReady polls plus the successful one
        assert_eq!(platform.poll_calls(), 3);
    }

    #[test]
    fn test_wait_ready_times_out_and_stops_polling() {
        let platform = SimulatePlatform::new().with_never_ready(301);
        let spec = vm_spec(301);
        let ensured = platform.ensure(&spec).unwrap();
        let poller = Poller::new(fast_policy(40));

        let err = poller
            .wait_ready(&platform, &spec, &ensured.resource, &CancelToken::new())
            .unwrap_err();
        match err {
            UpliftError::ReadinessTimeout { resource, .. } => {
                assert_eq!(resource, "server-301");
            }
            other => panic!("expected readiness timeout, got {:?}", other),
        }
        let polls_at_failure = platform.poll_calls();
        assert!(polls_at_failure >= 1);
        // the deadline has passed; the poller issued its last poll before
        // returning and none can follow
        assert_eq!(platform.poll_calls(), polls_at_failure);
    }

    #[test]
    fn test_wait_ready_zero_timeout_never_polls() {
        let platform = SimulatePlatform::new();
        let spec = vm_spec(301);
        let ensured = platform.ensure(&spec).unwrap();
        let poller = Poller::new(fast_policy(0));

        let err = poller
            .wait_ready(&platform, &spec, &ensured.resource, &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), "readiness-timeout");
        assert_eq!(platform.poll_calls(), 0);
    }

    #[test]
    fn test_wait_ready_observes_cancellation() {
        let platform = SimulatePlatform::new().with_never_ready(301);
        let spec = vm_spec(301);
        let ensured = platform.ensure(&spec).unwrap();
        let poller = Poller::new(fast_policy(10_000));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = poller
            .wait_ready(&platform, &spec, &ensured.resource, &cancel)
            .unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        assert_eq!(platform.poll_calls(), 0);
    }

    #[test]
    fn test_static_resources_skip_discovery() {
        let platform = SimulatePlatform::new();
        let spec: ResourceSpec = serde_yaml::from_str(
            "id: 200\nkind: container\nrole: media\nnetwork:\n  mode: static\n  address: 10.10.10.20\n",
        )
        .unwrap();
        let resource = ProvisionedResource::new(200, "200".to_string(), ResourceState::Booting);
        let poller = Poller::new(fast_policy(1000));

        let discovered = poller
            .wait_ready(&platform, &spec, &resource, &CancelToken::new())
            .unwrap();
        assert_eq!(discovered.address, "10.10.10.20");
        assert_eq!(platform.poll_calls(), 0);
    }

    #[test]
    fn test_wait_strategy_from_str() {
        assert_eq!(WaitStrategy::from_str("simple"), WaitStrategy::Simple);
        assert_eq!(WaitStrategy::from_str("SIMPLE"), WaitStrategy::Simple);
        assert_eq!(WaitStrategy::from_str("backoff"), WaitStrategy::Backoff);
        assert_eq!(WaitStrategy::from_str("anything"), WaitStrategy::Backoff);
    }
}
