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

pub mod cli;
pub mod inventory;
pub mod platform;
pub mod readiness;
pub mod run;
pub mod secrets;
pub mod topology;
pub mod util;

pub mod api;
pub mod config;
pub mod error;
pub mod output;

// Re-export commonly used types for library users
pub use api::UpliftRunner;
pub use config::UpliftConfig;
pub use error::{ErrorContext, Result, UpliftError};
pub use inventory::{DiscoveredAddress, InventoryGroup};
pub use output::{LogLevel, NullOutputHandler, OutputHandler, OutputHandlerRef, TerminalOutputHandler};
pub use platform::Platform;
pub use run::{CancelToken, Phase, RunReport, RunStatus};
pub use topology::Topology;
