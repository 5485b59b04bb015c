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
use crate::topology::spec::{NetworkMode, PlatformSection, ResourceSpec, RoleSpec, TopologyFile};
use crate::topology::templar::Templar;
use crate::util::io::read_file;
use crate::util::yaml::{blend_variables, show_yaml_error_in_context};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// The validated resource descriptor store. Specs are held sorted by
/// ascending id so provisioning order is reproducible across runs.
#[derive(Debug, Clone)]
pub struct Topology {
    pub name: String,
    pub platform: PlatformSection,
    pub defaults: serde_yaml::Mapping,
    pub roles: IndexMap<String, RoleSpec>,
    specs: Vec<ResourceSpec>,
}

impl Topology {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_file(path)?;
        let parsed: std::result::Result<TopologyFile, serde_yaml::Error> = serde_yaml::from_str(&text);
        match parsed {
            Ok(file) => Self::from_file(file),
            Err(e) => {
                show_yaml_error_in_context(&e, path);
                Err(UpliftError::Validation(format!("unable to parse topology: {}", path.display())))
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: TopologyFile = serde_yaml::from_str(text)?;
        Self::from_file(file)
    }

    fn from_file(file: TopologyFile) -> Result<Self> {
        if file.resources.is_empty() {
            return Err(UpliftError::Validation(format!(
                "topology '{}' defines no resources", file.name
            )));
        }

        // identity checks come before any template work
        let mut seen: HashMap<u64, String> = HashMap::new();
        for spec in file.resources.iter() {
            if let Some(existing) = seen.insert(spec.id, spec.hostname()) {
                return Err(UpliftError::Validation(format!(
                    "duplicate resource id {} ('{}' and '{}')", spec.id, existing, spec.hostname()
                )));
            }
            match file.roles.get(&spec.role) {
                Some(role) if role.apply.is_some() => {}
                Some(_) => {
                    return Err(UpliftError::Validation(format!(
                        "role '{}' (resource {}) has no apply step defined", spec.role, spec.id
                    )));
                }
                None => {
                    return Err(UpliftError::Validation(format!(
                        "role '{}' (resource {}) is not defined in the roles section", spec.role, spec.id
                    )));
                }
            }
            if spec.network.mode == NetworkMode::Static && spec.network.address.is_none() {
                return Err(UpliftError::Validation(format!(
                    "resource {} uses static addressing but declares no address", spec.id
                )));
            }
            if let Some(pattern) = &spec.network.interface {
                if let Err(e) = regex::Regex::new(pattern) {
                    return Err(UpliftError::Validation(format!(
                        "resource {} has a bad interface pattern '{}': {}", spec.id, pattern, e
                    )));
                }
            }
        }

        let templar = Templar::new();
        let mut specs = Vec::with_capacity(file.resources.len());
        for spec in file.resources.into_iter() {
            specs.push(render_spec(&templar, spec, &file.defaults)?);
        }
        specs.sort_by_key(|s| s.id);

        Ok(Self {
            name: file.name,
            platform: file.platform,
            defaults: file.defaults,
            roles: file.roles,
            specs,
        })
    }

    /// All specs in ascending id order. Idempotent across calls.
    pub fn list_specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    pub fn get_spec(&self, id: u64) -> Option<&ResourceSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn get_role(&self, name: &str) -> Option<&RoleSpec> {
        self.roles.get(name)
    }

    /// Role names sorted by configure order, file order breaking ties.
    pub fn roles_in_order(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = self.roles.keys().cloned().enumerate().collect();
        names.sort_by_key(|(idx, name)| (self.roles[name.as_str()].order, *idx));
        names.into_iter().map(|(_, name)| name).collect()
    }

    /// Template variables for one resource: topology defaults with the
    /// resource's own vars layered on top.
    pub fn vars_for(&self, spec: &ResourceSpec) -> serde_yaml::Mapping {
        let mut blended = serde_yaml::Value::Mapping(self.defaults.clone());
        blend_variables(&mut blended, serde_yaml::Value::Mapping(spec.vars.clone()));
        match blended {
            serde_yaml::Value::Mapping(m) => m,
            _ => serde_yaml::Mapping::new(),
        }
    }

    /// Stable identity of the topology's resource set, used by the run lock
    /// to reject concurrent runs over the same ids.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for spec in self.specs.iter() {
            hasher.update(b"\n");
            hasher.update(spec.id.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

fn render_spec(templar: &Templar, spec: ResourceSpec, defaults: &serde_yaml::Mapping) -> Result<ResourceSpec> {
    let mut vars = serde_yaml::Value::Mapping(defaults.clone());
    blend_variables(&mut vars, serde_yaml::Value::Mapping(spec.vars.clone()));
    let vars = match vars {
        serde_yaml::Value::Mapping(m) => m,
        _ => serde_yaml::Mapping::new(),
    };

    let mut network = spec.network.clone();
    network.address = templar.render_option(&network.address, &vars)?;
    network.interface = templar.render_option(&network.interface, &vars)?;

    let mut extra = HashMap::new();
    for (k, v) in spec.extra.iter() {
        extra.insert(k.clone(), templar.render_string(v, &vars)?);
    }

    Ok(ResourceSpec {
        id: spec.id,
        name: templar.render_option(&spec.name, &vars)?,
        kind: spec.kind,
        role: templar.render_string(&spec.role, &vars)?,
        cores: spec.cores,
        memory: spec.memory,
        disk: templar.render_option(&spec.disk, &vars)?,
        placement: templar.render_option(&spec.placement, &vars)?,
        network,
        vars: spec.vars,
        extra,
    })
}
