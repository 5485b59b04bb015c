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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The network address resolved for a provisioned resource.
///
/// At most one address is active per spec id; re-discovery overwrites the
/// previous value, since DHCP leases can change across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredAddress {
    pub spec_id: u64,
    pub address: String,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredAddress {
    pub fn new(spec_id: u64, address: String) -> Self {
        Self { spec_id, address, discovered_at: Utc::now() }
    }
}

/// A named collection of discovered addresses sharing a role.
///
/// Members are keyed by spec id so iteration order is deterministic no
/// matter what order discovery completed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryGroup {
    pub name: String,
    members: BTreeMap<u64, String>,
}

impl InventoryGroup {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), members: BTreeMap::new() }
    }

    /// Insert or overwrite the member's address.
    pub fn add_member(&mut self, spec_id: u64, address: String) {
        self.members.insert(spec_id, address);
    }

    pub fn contains(&self, spec_id: u64) -> bool {
        self.members.contains_key(&spec_id)
    }

    pub fn address_of(&self, spec_id: u64) -> Option<&str> {
        self.members.get(&spec_id).map(|s| s.as_str())
    }

    /// Members in ascending spec-id order.
    pub fn members(&self) -> impl Iterator<Item = (&u64, &String)> {
        self.members.iter()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.members.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
