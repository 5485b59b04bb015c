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

//! Declarative topology: the authoritative description of the compute
//! resources one deployment should have.
//!
//! A topology file names each resource once, with a stable numeric id, a
//! role tag, sizing, and an addressing mode. Example:
//!
//! ```yaml
//! name: homelab
//! platform:
//!   api_host: pve.example.com
//!   node: pve1
//!   token_id: "uplift@pam!provision"
//!   token_secret:
//!     env:
//!       var: PVE_TOKEN_SECRET
//! defaults:
//!   bridge: vmbr0
//! resources:
//!   - id: 301
//!     kind: vm
//!     role: server
//!     cores: 2
//!     memory: 2048
//!     network:
//!       mode: dhcp
//! roles:
//!   server:
//!     order: 1
//!     apply: k3s/server.yml
//! ```

pub mod spec;
pub mod store;
pub mod templar;

pub use spec::{AddressFamily, NetworkMode, NetworkSpec, ResourceKind, ResourceSpec, RoleSpec};
pub use store::Topology;
