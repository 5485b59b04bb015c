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

use crate::error::UpliftError;
use crate::run::phase::RunStatus;
use chrono::{DateTime, Utc};
use guid_create::GUID;
use serde::Serialize;

/// Final state of one spec after a run, failures included.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub spec_id: u64,
    pub name: String,
    pub role: String,
    pub state: String,
    pub address: Option<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl ResourceReport {
    pub fn pending(spec_id: u64, name: String, role: String) -> Self {
        Self {
            spec_id,
            name,
            role,
            state: "pending".to_string(),
            address: None,
            error_kind: None,
            error: None,
        }
    }

    pub fn set_state(&mut self, state: &str) {
        self.state = state.to_string();
    }

    pub fn set_failure(&mut self, error: &UpliftError) {
        self.state = "failed".to_string();
        self.error_kind = Some(error.kind().to_string());
        self.error = Some(error.to_string());
    }

    pub fn is_failed(&self) -> bool {
        self.state == "failed"
    }
}

/// What the operator gets back from one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub topology: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    /// State-machine position the run ended in.
    pub phase_reached: String,
    pub success: bool,
    /// Every spec in id order with its final state.
    pub resources: Vec<ResourceReport>,
    /// Phase-level errors that are not attributable to one resource.
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn new(topology: &str) -> Self {
        Self {
            run_id: GUID::rand().to_string(),
            topology: topology.to_string(),
            started_at: Utc::now(),
            elapsed_secs: 0,
            phase_reached: RunStatus::NotStarted.as_str(),
            success: false,
            resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_failed()).count()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_failure_records_kind_and_message() {
        let mut r = ResourceReport::pending(2, "agent-2".to_string(), "agent".to_string());
        r.set_failure(&UpliftError::ReadinessTimeout {
            resource: "agent-2".to_string(),
            waited_secs: 300,
        });
        assert!(r.is_failed());
        assert_eq!(r.error_kind.as_deref(), Some("readiness-timeout"));
        assert!(r.error.as_deref().unwrap().contains("agent-2"));
    }

    #[test]
    fn test_failed_count() {
        let mut report = RunReport::new("homelab");
        report.resources.push(ResourceReport::pending(1, "a".into(), "server".into()));
        let mut failed = ResourceReport::pending(2, "b".into(), "agent".into());
        failed.set_failure(&UpliftError::Cancelled);
        report.resources.push(failed);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = RunReport::new("homelab");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"topology\": \"homelab\""));
    }
}
