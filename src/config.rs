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

use crate::platform::BackoffPolicy;
use crate::readiness::poller::{PollPolicy, WaitStrategy};
use crate::run::phase::Phase;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for running uplift programmatically
#[derive(Clone, Debug)]
pub struct UpliftConfig {
    pub topology_path: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub threads: usize,
    pub verbosity: u32,
    pub simulate: bool,
    pub start_at: Phase,
    pub end_at: Phase,
    pub apply_command: Option<String>,
    pub poll_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_strategy: String,
    pub poll_max_delay_secs: u64,
    pub retry_base_secs: u64,
    pub retry_cap_secs: u64,
    pub retry_max_attempts: u32,
}

impl Default for UpliftConfig {
    fn default() -> Self {
        Self {
            topology_path: None,
            state_dir: PathBuf::from(".uplift"),
            threads: 4,
            verbosity: 0,
            simulate: false,
            start_at: Phase::Infra,
            end_at: Phase::Configure,
            apply_command: None,
            poll_timeout_secs: 300,
            poll_interval_secs: 2,
            poll_strategy: String::from("backoff"),
            poll_max_delay_secs: 30,
            retry_base_secs: 2,
            retry_cap_secs: 60,
            retry_max_attempts: 5,
        }
    }
}

impl UpliftConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.topology_path = Some(path.into());
        self
    }

    pub fn state_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_dir = path.into();
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn simulate(mut self) -> Self {
        self.simulate = true;
        self
    }

    /// Run exactly one phase.
    pub fn phase(mut self, phase: Phase) -> Self {
        self.start_at = phase;
        self.end_at = phase;
        self
    }

    /// Resume at a phase, running it and everything after.
    pub fn start_at(mut self, phase: Phase) -> Self {
        self.start_at = phase;
        self
    }

    pub fn end_at(mut self, phase: Phase) -> Self {
        self.end_at = phase;
        self
    }

    pub fn apply_command(mut self, command: String) -> Self {
        self.apply_command = Some(command);
        self
    }

    pub fn poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn poll_strategy(mut self, strategy: String) -> Self {
        self.poll_strategy = strategy;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(self.poll_timeout_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
            strategy: WaitStrategy::from_str(&self.poll_strategy),
            max_delay: Duration::from_secs(self.poll_max_delay_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(self.retry_base_secs),
            cap: Duration::from_secs(self.retry_cap_secs),
            max_attempts: self.retry_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_platform_guidance() {
        let config = UpliftConfig::new();
        let backoff = config.backoff_policy();
        assert_eq!(backoff.base, Duration::from_secs(2));
        assert_eq!(backoff.cap, Duration::from_secs(60));
        assert_eq!(backoff.max_attempts, 5);
        assert_eq!(config.start_at, Phase::Infra);
        assert_eq!(config.end_at, Phase::Configure);
    }

    #[test]
    fn test_phase_selects_a_single_phase() {
        let config = UpliftConfig::new().phase(Phase::Bootstrap);
        assert_eq!(config.start_at, Phase::Bootstrap);
        assert_eq!(config.end_at, Phase::Bootstrap);
    }

    #[test]
    fn test_poll_policy_conversion() {
        let config = UpliftConfig::new()
            .poll_timeout(60)
            .poll_interval(1)
            .poll_strategy("simple".to_string());
        let policy = config.poll_policy();
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert_eq!(policy.strategy, WaitStrategy::Simple);
    }
}
