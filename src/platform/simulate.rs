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

//! In-memory platform for `--simulate` runs and tests.
//!
//! Deterministic: resource ids map to fixed addresses, guests become
//! reachable after a configurable number of polls, and failure modes
//! (never-ready guests, transient API errors) can be injected per id.

use crate::error::{Result, UpliftError};
use crate::platform::{
    AgentPing, Ensured, EnsureOutcome, GuestAddress, GuestInterface, Platform,
    ProvisionedResource, ResourceState,
};
use crate::topology::spec::{AddressFamily, NetworkMode, ResourceKind, ResourceSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct SimGuest {
    hostname: String,
    kind: ResourceKind,
    polls: u32,
}

#[derive(Debug, Default)]
struct SimState {
    guests: HashMap<u64, SimGuest>,
    ensure_calls: u64,
    poll_calls: u64,
    transient_failures: HashMap<u64, u32>,
}

pub struct SimulatePlatform {
    state: Mutex<SimState>,
    /// Polls a guest answers NotReady before reporting interfaces.
    boot_polls: u32,
    /// Ids that never report a usable address.
    never_ready: HashSet<u64>,
}

impl SimulatePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            boot_polls: 1,
            never_ready: HashSet::new(),
        }
    }

    pub fn with_boot_polls(mut self, polls: u32) -> Self {
        self.boot_polls = polls;
        self
    }

    /// Make a guest answer NotReady forever; drives timeout scenarios.
    pub fn with_never_ready(mut self, id: u64) -> Self {
        self.never_ready.insert(id);
        self
    }

    /// Make the next `count` ensure calls for `id` fail transiently.
    pub fn with_transient_failures(self, id: u64, count: u32) -> Self {
        self.state.lock().unwrap().transient_failures.insert(id, count);
        self
    }

    pub fn ensure_calls(&self) -> u64 {
        self.state.lock().unwrap().ensure_calls
    }

    pub fn poll_calls(&self) -> u64 {
        self.state.lock().unwrap().poll_calls
    }

    pub fn guest_count(&self) -> usize {
        self.state.lock().unwrap().guests.len()
    }

    /// Fixed address derived from the id, stable across runs.
    pub fn address_for(id: u64) -> String {
        format!("10.0.{}.{}", (id >> 8) & 0xff, id & 0xff)
    }
}

impl Default for SimulatePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimulatePlatform {
    fn name(&self) -> &'static str {
        "simulate"
    }

    fn find(&self, spec: &ResourceSpec) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.guests.get(&spec.id).map(|_| spec.id.to_string()))
    }

    fn ensure(&self, spec: &ResourceSpec) -> Result<Ensured> {
        let mut state = self.state.lock().unwrap();
        state.ensure_calls += 1;

        if let Some(remaining) = state.transient_failures.get_mut(&spec.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(UpliftError::PlatformUnavailable(format!(
                    "simulated 503 for resource {}", spec.id
                )));
            }
        }

        if let Some(existing) = state.guests.get(&spec.id) {
            if existing.kind != spec.kind {
                return Err(UpliftError::ResourceConflict(format!(
                    "id {} already realized as a {}", spec.id, existing.kind.as_str()
                )));
            }
            if existing.hostname != spec.hostname() {
                return Err(UpliftError::ResourceConflict(format!(
                    "id {} already named '{}'", spec.id, existing.hostname
                )));
            }
            return Ok(Ensured {
                resource: ProvisionedResource::new(
                    spec.id,
                    spec.id.to_string(),
                    ResourceState::Booting,
                ),
                outcome: EnsureOutcome::AlreadyExists,
            });
        }

        state.guests.insert(
            spec.id,
            SimGuest { hostname: spec.hostname(), kind: spec.kind, polls: 0 },
        );
        Ok(Ensured {
            resource: ProvisionedResource::new(spec.id, spec.id.to_string(), ResourceState::Booting),
            outcome: EnsureOutcome::Created,
        })
    }

    fn query_interfaces(&self, spec: &ResourceSpec, _handle: &str) -> Result<AgentPing> {
        let mut state = self.state.lock().unwrap();
        state.poll_calls += 1;

        let boot_polls = self.boot_polls;
        let guest = state
            .guests
            .get_mut(&spec.id)
            .ok_or_else(|| UpliftError::PlatformUnavailable(format!("no such guest {}", spec.id)))?;
        guest.polls += 1;

        if self.never_ready.contains(&spec.id) || guest.polls <= boot_polls {
            return Ok(AgentPing::NotReady);
        }

        let address = match spec.network.mode {
            NetworkMode::Static => spec.network.address.clone().unwrap_or_default(),
            NetworkMode::Dhcp => Self::address_for(spec.id),
        };
        Ok(AgentPing::Interfaces(vec![
            GuestInterface {
                name: "lo".to_string(),
                addresses: vec![GuestAddress {
                    address: "127.0.0.1".to_string(),
                    family: AddressFamily::Ipv4,
                }],
            },
            GuestInterface {
                name: "eth0".to_string(),
                addresses: vec![GuestAddress { address, family: AddressFamily::Ipv4 }],
            },
        ]))
    }

    fn destroy(&self, spec: &ResourceSpec) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.guests.remove(&spec.id).is_some())
    }
}
