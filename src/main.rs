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

use std::process;
use std::sync::Arc;
use uplift::cli::parser::{CliParser, CLI_MODE_DESTROY, CLI_MODE_RUN, CLI_MODE_SHOW};
use uplift::cli::show::show_topology;
use uplift::run::phase::Phase;
use uplift::util::io::{expand_path, quit};
use uplift::{Result, Topology, TerminalOutputHandler, UpliftConfig, UpliftError, UpliftRunner};

fn main() {
    match liftoff() {
        Err(e) => quit(&e.to_string()),
        _ => {}
    }
}

fn liftoff() -> Result<()> {
    let mut cli_parser = CliParser::new();
    cli_parser.parse().map_err(UpliftError::Config)?;

    if cli_parser.needs_help {
        cli_parser.show_help();
        return Ok(());
    }
    if cli_parser.needs_version {
        cli_parser.show_version();
        return Ok(());
    }

    let config = build_config(&cli_parser)?;

    if cli_parser.mode == CLI_MODE_SHOW {
        let topology_path = config
            .topology_path
            .as_ref()
            .ok_or_else(|| UpliftError::Config("--topology is required".into()))?;
        let topology = Topology::load(topology_path)?;
        return show_topology(&topology, &config.state_dir, &cli_parser.show_roles);
    }

    let output_handler = Arc::new(TerminalOutputHandler::new(cli_parser.verbosity));
    let runner = UpliftRunner::new(config).with_output_handler(output_handler);

    let report = match cli_parser.mode {
        CLI_MODE_RUN => runner.run()?,
        CLI_MODE_DESTROY => {
            if !cli_parser.assume_yes {
                return Err(UpliftError::Config(
                    "destroy deletes real resources; pass --yes to confirm".into(),
                ));
            }
            runner.destroy()?
        }
        _ => return Err(UpliftError::Config("invalid CLI mode".into())),
    };

    if cli_parser.report_json {
        println!("{}", report.to_json()?);
    }
    if !report.success {
        process::exit(1);
    }
    Ok(())
}

fn build_config(parser: &CliParser) -> Result<UpliftConfig> {
    let mut config = UpliftConfig::new().threads(parser.threads).verbosity(parser.verbosity);

    if let Some(path) = &parser.topology_path {
        config = config.topology(expand_path(path)?);
    }
    if let Some(dir) = &parser.state_dir {
        config = config.state_dir(expand_path(dir)?);
    }
    if let Some(phase) = &parser.phase {
        let phase = Phase::from_str(phase)
            .ok_or_else(|| UpliftError::Config(format!("unknown phase: {}", phase)))?;
        config = config.phase(phase);
    }
    if let Some(phase) = &parser.start_at {
        let phase = Phase::from_str(phase)
            .ok_or_else(|| UpliftError::Config(format!("unknown phase: {}", phase)))?;
        config = config.start_at(phase);
    }
    if let Some(command) = &parser.apply_cmd {
        config = config.apply_command(command.clone());
    }
    if let Some(timeout) = parser.poll_timeout {
        config = config.poll_timeout(timeout);
    }
    if let Some(interval) = parser.poll_interval {
        config = config.poll_interval(interval);
    }
    if let Some(strategy) = &parser.wait_strategy {
        config = config.poll_strategy(strategy.clone());
    }
    if parser.simulate {
        config = config.simulate();
    }

    Ok(config)
}
