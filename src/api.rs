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

use crate::config::UpliftConfig;
use crate::error::{Result, UpliftError};
use crate::output::{NullOutputHandler, OutputHandler, OutputHandlerRef};
use crate::platform::proxmox::ProxmoxPlatform;
use crate::platform::simulate::SimulatePlatform;
use crate::platform::Platform;
use crate::run::apply::ApplyCommand;
use crate::run::cancel::CancelToken;
use crate::run::lock::RunLock;
use crate::run::orchestrator::{orchestrate, teardown, RunContext};
use crate::run::report::RunReport;
use crate::topology::Topology;
use std::sync::Arc;

/// Main API for driving an orchestration run
pub struct UpliftRunner {
    config: UpliftConfig,
    output_handler: OutputHandlerRef,
    platform_override: Option<Arc<dyn Platform>>,
    cancel: CancelToken,
}

impl UpliftRunner {
    /// Create a new runner with the given configuration
    pub fn new(config: UpliftConfig) -> Self {
        Self {
            config,
            output_handler: Arc::new(NullOutputHandler),
            platform_override: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set a custom output handler
    pub fn with_output_handler(mut self, handler: Arc<dyn OutputHandler>) -> Self {
        self.output_handler = handler;
        self
    }

    /// Substitute the platform client; used by embedders and tests.
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform_override = Some(platform);
        self
    }

    /// Token an embedder can use to abort the run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the configured phases and return the run report. The report's
    /// `success` field says whether every resource reached the target
    /// phase; per-resource failures do not surface as an Err here.
    pub fn run(&self) -> Result<RunReport> {
        let (ctx, lock) = self.build_context()?;
        let report = orchestrate(&ctx)?;
        lock.release()?;
        Ok(report)
    }

    /// Destroy every realized resource in the topology, highest id first.
    pub fn destroy(&self) -> Result<RunReport> {
        let (ctx, lock) = self.build_context()?;
        let report = teardown(&ctx)?;
        lock.release()?;
        Ok(report)
    }

    fn build_context(&self) -> Result<(RunContext, RunLock)> {
        let topology_path = self.config.topology_path.as_ref().ok_or_else(|| {
            UpliftError::Config("no topology path specified".into())
        })?;
        let topology = Topology::load(topology_path)?;

        let platform: Arc<dyn Platform> = match &self.platform_override {
            Some(p) => Arc::clone(p),
            None if self.config.simulate => Arc::new(SimulatePlatform::new()),
            None => {
                let proxmox = ProxmoxPlatform::from_topology(&topology)?;
                proxmox.verify_version()?;
                Arc::new(proxmox)
            }
        };

        let apply_command = match &self.config.apply_command {
            Some(command) => Some(ApplyCommand::parse(command)?),
            None => None,
        };

        let lock = RunLock::acquire(&self.config.state_dir, &topology.fingerprint())?;

        let ctx = RunContext {
            topology,
            platform,
            output: self.output_handler.clone(),
            cancel: self.cancel.clone(),
            threads: self.config.threads,
            poll_policy: self.config.poll_policy(),
            backoff: self.config.backoff_policy(),
            state_dir: self.config.state_dir.clone(),
            apply_command,
            start_at: self.config.start_at,
            end_at: self.config.end_at,
        };
        Ok((ctx, lock))
    }
}
