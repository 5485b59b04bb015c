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

use crate::error::{Result, UpliftError};
use crate::inventory::groups::{DiscoveredAddress, InventoryGroup};
use crate::topology::spec::ResourceSpec;
use std::collections::{BTreeMap, HashMap};

/// Join discovered addresses to their specs and group them by role.
///
/// Pure: the same inputs produce the same mapping regardless of input
/// order. An address whose spec id is not in the topology signals a bug in
/// an upstream phase and fails the resolve outright; dropping it silently
/// would hand the configure phase an incomplete cluster.
pub fn resolve(
    addresses: &[DiscoveredAddress],
    specs: &[ResourceSpec],
) -> Result<BTreeMap<String, InventoryGroup>> {
    let roles_by_id: HashMap<u64, &str> =
        specs.iter().map(|s| (s.id, s.role.as_str())).collect();

    let mut groups: BTreeMap<String, InventoryGroup> = BTreeMap::new();
    for address in addresses.iter() {
        let role = roles_by_id.get(&address.spec_id).ok_or_else(|| {
            UpliftError::UnresolvedRole(format!(
                "discovered address {} belongs to unknown resource id {}",
                address.address, address.spec_id
            ))
        })?;
        groups
            .entry(role.to_string())
            .or_insert_with(|| InventoryGroup::new(role))
            .add_member(address.spec_id, address.address.clone());
    }
    Ok(groups)
}
