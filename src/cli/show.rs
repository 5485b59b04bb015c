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

//! `uplift show`: render the parsed topology and, when a cached bootstrap
//! exists, the resolved inventory groups.

use crate::error::Result;
use crate::run::state::CachedState;
use crate::topology::spec::NetworkMode;
use crate::topology::Topology;
use crate::util::terminal::{banner, table};
use std::path::Path;

pub fn show_topology(topology: &Topology, state_dir: &Path, roles_filter: &[String]) -> Result<()> {
    banner(&format!("TOPOLOGY: {}", topology.name));

    let rows: Vec<Vec<String>> = topology
        .list_specs()
        .iter()
        .filter(|spec| roles_filter.is_empty() || roles_filter.contains(&spec.role))
        .map(|spec| {
            let network = match spec.network.mode {
                NetworkMode::Dhcp => "dhcp".to_string(),
                NetworkMode::Static => {
                    format!("static {}", spec.network.address.as_deref().unwrap_or("?"))
                }
            };
            vec![
                spec.id.to_string(),
                spec.hostname(),
                spec.kind.as_str().to_string(),
                spec.role.clone(),
                spec.placement
                    .clone()
                    .or_else(|| topology.platform.node.clone())
                    .unwrap_or_else(|| "-".to_string()),
                network,
            ]
        })
        .collect();
    table(&["id", "name", "kind", "role", "placement", "network"], &rows);

    println!();
    banner("ROLES");
    let role_rows: Vec<Vec<String>> = topology
        .roles_in_order()
        .iter()
        .filter(|name| roles_filter.is_empty() || roles_filter.contains(name))
        .map(|name| {
            let role = &topology.roles[name.as_str()];
            vec![
                name.clone(),
                role.order.to_string(),
                role.apply.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    table(&["role", "order", "apply"], &role_rows);

    if let Some(cached) = CachedState::load(state_dir, &topology.fingerprint())? {
        println!();
        banner(&format!("CACHED INVENTORY (saved {})", cached.saved_at.format("%Y-%m-%d %H:%M:%S")));
        let mut group_rows: Vec<Vec<String>> = Vec::new();
        for (role, group) in cached.groups.iter() {
            if !roles_filter.is_empty() && !roles_filter.contains(role) {
                continue;
            }
            for (spec_id, address) in group.members() {
                group_rows.push(vec![role.clone(), spec_id.to_string(), address.clone()]);
            }
        }
        table(&["role", "id", "address"], &group_rows);
    }

    Ok(())
}
