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

//! The configure-phase hand-off to the external configuration-management
//! layer.
//!
//! uplift does not configure guests itself. It runs the operator-supplied
//! command once per role group, passing the group through the environment
//! and a rendered inventory file; what that command does with the
//! addresses is its own business.

use crate::error::{Result, UpliftError};
use crate::inventory::groups::InventoryGroup;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct ApplyCommand {
    argv: Vec<String>,
}

impl ApplyCommand {
    pub fn parse(command: &str) -> Result<Self> {
        let argv = shlex::split(command)
            .ok_or_else(|| UpliftError::Apply(format!("unparseable apply command: {}", command)))?;
        if argv.is_empty() {
            return Err(UpliftError::Apply("empty apply command".into()));
        }
        Ok(Self { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Run the command for one role group. The group reaches the command as:
    ///  - `UPLIFT_ROLE`      the role name
    ///  - `UPLIFT_APPLY`     the role's apply label from the topology
    ///  - `UPLIFT_ADDRESSES` comma-separated addresses in spec-id order
    ///  - `UPLIFT_INVENTORY` path to the full inventory JSON
    pub fn run_for_group(
        &self,
        role: &str,
        apply_label: &str,
        group: &InventoryGroup,
        inventory_path: &Path,
    ) -> Result<()> {
        let status = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .env("UPLIFT_ROLE", role)
            .env("UPLIFT_APPLY", apply_label)
            .env("UPLIFT_ADDRESSES", group.addresses().join(","))
            .env("UPLIFT_INVENTORY", inventory_path)
            .status()
            .map_err(|e| UpliftError::Apply(format!("unable to spawn '{}': {}", self.argv[0], e)))?;

        if !status.success() {
            return Err(UpliftError::Apply(format!(
                "'{}' exited with {} for role '{}'",
                self.argv.join(" "),
                status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
                role
            )));
        }
        Ok(())
    }
}

/// Write the resolved inventory for external consumption.
pub fn write_inventory_file(
    state_dir: &Path,
    topology: &str,
    groups: &BTreeMap<String, InventoryGroup>,
) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)?;
    let path = state_dir.join(format!("{}.inventory.json", topology));
    fs::write(&path, serde_json::to_string_pretty(groups)?)?;
    Ok(path)
}
