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

//! Cached bootstrap output, written after inventory resolution.
//!
//! This is what lets `--start-at configure` skip the earlier phases: the
//! resolved groups are replayed from disk instead of re-discovered. The
//! cache is keyed by topology fingerprint; a changed topology invalidates
//! it. It is never the source of truth — the topology is.

use crate::error::Result;
use crate::inventory::groups::{DiscoveredAddress, InventoryGroup};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedState {
    pub topology: String,
    pub fingerprint: String,
    pub saved_at: DateTime<Utc>,
    pub addresses: Vec<DiscoveredAddress>,
    pub groups: BTreeMap<String, InventoryGroup>,
}

impl CachedState {
    pub fn new(
        topology: &str,
        fingerprint: &str,
        addresses: Vec<DiscoveredAddress>,
        groups: BTreeMap<String, InventoryGroup>,
    ) -> Self {
        Self {
            topology: topology.to_string(),
            fingerprint: fingerprint.to_string(),
            saved_at: Utc::now(),
            addresses,
            groups,
        }
    }

    fn path_for(state_dir: &Path, fingerprint: &str) -> PathBuf {
        state_dir.join(format!("{}.state.json", &fingerprint[..16.min(fingerprint.len())]))
    }

    pub fn save(&self, state_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(state_dir)?;
        let path = Self::path_for(state_dir, &self.fingerprint);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Load the cache for a fingerprint; absent or mismatched caches read
    /// as None so a stale file can never feed configure.
    pub fn load(state_dir: &Path, fingerprint: &str) -> Result<Option<Self>> {
        let path = Self::path_for(state_dir, fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let state: CachedState = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if state.fingerprint != fingerprint {
            return Ok(None);
        }
        Ok(Some(state))
    }
}
