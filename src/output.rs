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
use crate::run::phase::Phase;
use crate::run::report::RunReport;
use inline_colorization::{color_green, color_red, color_reset, color_yellow};
use std::sync::Arc;

/// Trait for handling output from uplift operations
pub trait OutputHandler: Send + Sync {
    fn on_run_start(&self, topology: &str, run_id: &str);

    fn on_phase_start(&self, phase: Phase, resource_count: usize);
    fn on_phase_end(&self, phase: Phase, failed: usize);
    fn on_phase_skipped(&self, phase: Phase);

    // Resource lifecycle events
    fn on_resource_created(&self, _name: &str) {}
    fn on_resource_exists(&self, _name: &str) {}
    fn on_resource_wait(&self, _name: &str, _timeout_secs: u64) {}
    fn on_resource_ready(&self, _name: &str, _address: &str, _elapsed_secs: u64) {}
    fn on_resource_failed(&self, _name: &str, _error: &UpliftError) {}
    fn on_resource_destroyed(&self, _name: &str) {}

    fn on_group_resolved(&self, _role: &str, _member_count: usize) {}
    fn on_apply_start(&self, _role: &str, _program: &str) {}
    fn on_apply_end(&self, _role: &str, _success: bool) {}

    fn on_recap(&self, report: &RunReport);

    fn log(&self, level: LogLevel, message: &str);
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

#[derive(Debug, Clone)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A no-op output handler for when output is not needed
pub struct NullOutputHandler;

impl OutputHandler for NullOutputHandler {
    fn on_run_start(&self, _topology: &str, _run_id: &str) {}
    fn on_phase_start(&self, _phase: Phase, _resource_count: usize) {}
    fn on_phase_end(&self, _phase: Phase, _failed: usize) {}
    fn on_phase_skipped(&self, _phase: Phase) {}
    fn on_recap(&self, _report: &RunReport) {}
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Standard terminal output handler
pub struct TerminalOutputHandler {
    pub verbosity: u32,
}

impl TerminalOutputHandler {
    pub fn new(verbosity: u32) -> Self {
        Self { verbosity }
    }
}

impl OutputHandler for TerminalOutputHandler {
    fn on_run_start(&self, topology: &str, run_id: &str) {
        crate::util::terminal::banner(&format!("TOPOLOGY: {} ({})", topology, run_id));
        println!();
    }

    fn on_phase_start(&self, phase: Phase, resource_count: usize) {
        println!();
        crate::util::terminal::banner(&format!(
            "PHASE: {} => {} resources", phase, resource_count
        ));
    }

    fn on_phase_end(&self, phase: Phase, failed: usize) {
        if failed > 0 {
            println!("{color_red}PHASE {} FAILED{color_reset} ({} resources)", phase, failed);
        }
    }

    fn on_phase_skipped(&self, phase: Phase) {
        println!("{color_yellow}SKIPPED{color_reset} => {} (satisfied by cached state)", phase);
    }

    fn on_resource_created(&self, name: &str) {
        println!("{color_yellow}CREATED{color_reset} => {}", name);
    }

    fn on_resource_exists(&self, name: &str) {
        println!("{color_green}OK{color_reset} => {} (already exists)", name);
    }

    fn on_resource_wait(&self, name: &str, timeout_secs: u64) {
        if self.verbosity > 0 {
            println!("WAIT => {} (timeout: {}s)", name, timeout_secs);
        }
    }

    fn on_resource_ready(&self, name: &str, address: &str, elapsed_secs: u64) {
        println!("{color_green}READY{color_reset} => {} at {} after {}s", name, address, elapsed_secs);
    }

    fn on_resource_failed(&self, name: &str, error: &UpliftError) {
        println!("{color_red}FAILED{color_reset} => {}", name);
        println!("  {}", error);
    }

    fn on_resource_destroyed(&self, name: &str) {
        println!("{color_yellow}DESTROYED{color_reset} => {}", name);
    }

    fn on_group_resolved(&self, role: &str, member_count: usize) {
        println!("GROUP => {} ({} members)", role, member_count);
    }

    fn on_apply_start(&self, role: &str, program: &str) {
        println!();
        crate::util::terminal::banner(&format!("APPLY: {} => {}", role, program));
    }

    fn on_apply_end(&self, role: &str, success: bool) {
        if success {
            println!("{color_green}APPLIED{color_reset} => {}", role);
        } else {
            println!("{color_red}APPLY FAILED{color_reset} => {}", role);
        }
    }

    fn on_recap(&self, report: &RunReport) {
        println!();
        crate::util::terminal::banner("RECAP");
        let rows: Vec<Vec<String>> = report
            .resources
            .iter()
            .map(|r| {
                vec![
                    r.spec_id.to_string(),
                    r.name.clone(),
                    r.role.clone(),
                    r.state.clone(),
                    r.address.clone().unwrap_or_else(|| "-".to_string()),
                    r.error_kind.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        crate::util::terminal::table(&["id", "name", "role", "state", "address", "error"], &rows);
        for error in report.errors.iter() {
            println!("{color_red}ERROR{color_reset}: {}", error);
        }
        let verdict = if report.success {
            format!("{color_green}SUCCESS{color_reset}")
        } else {
            format!("{color_red}FAILED{color_reset}")
        };
        println!(
            "{} : phase={} failed={} elapsed={}s",
            verdict,
            report.phase_reached,
            report.failed_count(),
            report.elapsed_secs
        );
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug if self.verbosity >= 3 => println!("DEBUG: {}", message),
            LogLevel::Info if self.verbosity >= 1 => println!("INFO: {}", message),
            LogLevel::Warning => println!("WARNING: {}", message),
            LogLevel::Error => eprintln!("ERROR: {}", message),
            _ => {}
        }
    }
}

/// Thread-safe wrapper for output handlers
pub type OutputHandlerRef = Arc<dyn OutputHandler>;
