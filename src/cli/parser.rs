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

use crate::util::terminal::{banner, markdown_print};
use std::env;

pub const CLI_MODE_UNSET: u32 = 0;
pub const CLI_MODE_RUN: u32 = 1;
pub const CLI_MODE_SHOW: u32 = 2;
pub const CLI_MODE_DESTROY: u32 = 3;

/// Hand-rolled argument parser for the uplift binary.
pub struct CliParser {
    pub args: Vec<String>,
    pub mode: u32,
    pub needs_help: bool,
    pub needs_version: bool,
    pub topology_path: Option<String>,
    pub state_dir: Option<String>,
    pub threads: usize,
    pub verbosity: u32,
    pub simulate: bool,
    pub phase: Option<String>,
    pub start_at: Option<String>,
    pub apply_cmd: Option<String>,
    pub poll_timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub wait_strategy: Option<String>,
    pub assume_yes: bool,
    pub report_json: bool,
    pub show_roles: Vec<String>,
}

impl CliParser {
    pub fn new() -> Self {
        Self {
            args: env::args().collect(),
            mode: CLI_MODE_UNSET,
            needs_help: false,
            needs_version: false,
            topology_path: None,
            state_dir: None,
            threads: 4,
            verbosity: 0,
            simulate: false,
            phase: None,
            start_at: None,
            apply_cmd: None,
            poll_timeout: None,
            poll_interval: None,
            wait_strategy: None,
            assume_yes: false,
            report_json: false,
            show_roles: Vec::new(),
        }
    }

    pub fn parse(&mut self) -> Result<(), String> {
        let args = self.args.clone();
        if args.len() < 2 {
            self.needs_help = true;
            return Ok(());
        }

        match args[1].as_str() {
            "run" => self.mode = CLI_MODE_RUN,
            "show" => self.mode = CLI_MODE_SHOW,
            "destroy" => self.mode = CLI_MODE_DESTROY,
            "--help" | "-h" | "help" => {
                self.needs_help = true;
                return Ok(());
            }
            "--version" | "version" => {
                self.needs_version = true;
                return Ok(());
            }
            unknown => {
                return Err(format!("unknown mode: {} (expected run, show, or destroy)", unknown));
            }
        }

        let mut iter = args.iter().skip(2);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => self.needs_help = true,
                "-t" | "--topology" => {
                    self.topology_path = Some(required_value(arg, iter.next())?);
                }
                "--state-dir" => {
                    self.state_dir = Some(required_value(arg, iter.next())?);
                }
                "--threads" => {
                    self.threads = parse_number(arg, iter.next())? as usize;
                }
                "--phase" => {
                    self.phase = Some(required_value(arg, iter.next())?);
                }
                "--start-at" => {
                    self.start_at = Some(required_value(arg, iter.next())?);
                }
                "--apply-cmd" => {
                    self.apply_cmd = Some(required_value(arg, iter.next())?);
                }
                "--timeout" => {
                    self.poll_timeout = Some(parse_number(arg, iter.next())?);
                }
                "--poll-interval" => {
                    self.poll_interval = Some(parse_number(arg, iter.next())?);
                }
                "--wait-strategy" => {
                    self.wait_strategy = Some(required_value(arg, iter.next())?);
                }
                "--roles" => {
                    let value = required_value(arg, iter.next())?;
                    self.show_roles = value.split(':').map(|s| s.to_string()).collect();
                }
                "--simulate" => self.simulate = true,
                "--yes" => self.assume_yes = true,
                "--report-json" => self.report_json = true,
                "-v" => self.verbosity += 1,
                "-vv" => self.verbosity += 2,
                "-vvv" => self.verbosity += 3,
                unknown => {
                    return Err(format!("unknown flag: {}", unknown));
                }
            }
        }

        if self.phase.is_some() && self.start_at.is_some() {
            return Err("--phase and --start-at are mutually exclusive".to_string());
        }
        if self.mode != CLI_MODE_UNSET && !self.needs_help && self.topology_path.is_none() {
            return Err("--topology is required".to_string());
        }
        Ok(())
    }

    pub fn show_help(&self) {
        banner(&format!("uplift {} - phased infrastructure bring-up", env!("CARGO_PKG_VERSION")));
        let markdown = "\
|:-|:-|:-\n\
|mode|flags|description\n\
|-|-|-\n\
|run|-t path|drive the topology through infra, bootstrap, configure\n\
|-|-|-\n\
|show|-t path|display the parsed topology and any cached inventory\n\
|-|-|-\n\
|destroy|-t path --yes|tear the topology down, highest id first\n\
|-|-|-\n\
";
        markdown_print(markdown);
        println!();
        println!("common flags:");
        println!("  --phase <infra|bootstrap|configure>   run a single phase");
        println!("  --start-at <phase>                    resume at a phase, using cached state");
        println!("  --apply-cmd '<command>'               configure hand-off command, run per role group");
        println!("  --state-dir <path>                    lease + cache directory (default .uplift)");
        println!("  --threads <n>                         worker pool size (default 4)");
        println!("  --timeout <secs>                      readiness deadline per resource (default 300)");
        println!("  --poll-interval <secs>                readiness poll cadence (default 2)");
        println!("  --wait-strategy <simple|backoff>      poll delay strategy (default backoff)");
        println!("  --roles <r1:r2>                       restrict show output to these roles");
        println!("  --simulate                            in-memory platform, no API calls");
        println!("  --report-json                         print the run report as JSON");
        println!("  -v / -vv / -vvv                       verbosity");
    }

    pub fn show_version(&self) {
        println!("uplift {}", env!("CARGO_PKG_VERSION"));
    }
}

impl Default for CliParser {
    fn default() -> Self {
        Self::new()
    }
}

fn required_value(flag: &str, value: Option<&String>) -> Result<String, String> {
    match value {
        Some(v) => Ok(v.clone()),
        None => Err(format!("{} requires a value", flag)),
    }
}

fn parse_number(flag: &str, value: Option<&String>) -> Result<u64, String> {
    let raw = required_value(flag, value)?;
    raw.parse::<u64>()
        .map_err(|_| format!("{} requires a number, got '{}'", flag, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_for(args: &[&str]) -> CliParser {
        let mut parser = CliParser::new();
        parser.args = args.iter().map(|s| s.to_string()).collect();
        parser
    }

    #[test]
    fn test_no_args_needs_help() {
        let mut parser = parser_for(&["uplift"]);
        parser.parse().unwrap();
        assert!(parser.needs_help);
    }

    #[test]
    fn test_run_mode_with_flags() {
        let mut parser = parser_for(&[
            "uplift", "run", "-t", "homelab.yml", "--threads", "8", "--simulate", "-v",
        ]);
        parser.parse().unwrap();
        assert_eq!(parser.mode, CLI_MODE_RUN);
        assert_eq!(parser.topology_path.as_deref(), Some("homelab.yml"));
        assert_eq!(parser.threads, 8);
        assert!(parser.simulate);
        assert_eq!(parser.verbosity, 1);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let mut parser = parser_for(&["uplift", "launch"]);
        assert!(parser.parse().is_err());
    }

    #[test]
    fn test_missing_topology_rejected() {
        let mut parser = parser_for(&["uplift", "run"]);
        assert!(parser.parse().unwrap_err().contains("--topology"));
    }

    #[test]
    fn test_phase_and_start_at_conflict() {
        let mut parser = parser_for(&[
            "uplift", "run", "-t", "t.yml", "--phase", "infra", "--start-at", "configure",
        ]);
        assert!(parser.parse().unwrap_err().contains("mutually exclusive"));
    }

    #[test]
    fn test_flag_value_missing() {
        let mut parser = parser_for(&["uplift", "run", "-t"]);
        assert!(parser.parse().unwrap_err().contains("requires a value"));
    }

    #[test]
    fn test_roles_split_on_colon() {
        let mut parser = parser_for(&["uplift", "show", "-t", "t.yml", "--roles", "server:agent"]);
        parser.parse().unwrap();
        assert_eq!(parser.show_roles, vec!["server", "agent"]);
    }

    #[test]
    fn test_numeric_flag_validation() {
        let mut parser = parser_for(&["uplift", "run", "-t", "t.yml", "--timeout", "abc"]);
        assert!(parser.parse().unwrap_err().contains("requires a number"));
    }
}
