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

//! The runtime inventory: discovered addresses joined to their roles.
//!
//! Rebuilt fresh each run from platform state; the topology remains the
//! source of truth for what should exist.

pub mod groups;
pub mod resolver;

pub use groups::{DiscoveredAddress, InventoryGroup};
pub use resolver::resolve;
