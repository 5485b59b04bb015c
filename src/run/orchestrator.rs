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

//! Drives a topology through the infra -> bootstrap -> configure sequence.
//!
//! Phases run strictly in order; within a phase, resources are processed
//! in parallel on a bounded pool. Per-resource errors are collected, never
//! raised mid-phase, so the operator always sees the complete picture of a
//! partial failure in one report.

use crate::error::{Result, UpliftError};
use crate::inventory::groups::{DiscoveredAddress, InventoryGroup};
use crate::inventory::resolver::resolve;
use crate::output::OutputHandlerRef;
use crate::platform::{retry_transient, BackoffPolicy, Ensured, EnsureOutcome, Platform, ProvisionedResource};
use crate::readiness::poller::{PollPolicy, Poller};
use crate::run::apply::{write_inventory_file, ApplyCommand};
use crate::run::cancel::CancelToken;
use crate::run::phase::{Phase, RunStatus};
use crate::run::report::{ResourceReport, RunReport};
use crate::run::state::CachedState;
use crate::topology::Topology;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Everything one orchestration run needs, passed explicitly so runs stay
/// re-entrant and testable with fakes.
pub struct RunContext {
    pub topology: Topology,
    pub platform: Arc<dyn Platform>,
    pub output: OutputHandlerRef,
    pub cancel: CancelToken,
    pub threads: usize,
    pub poll_policy: PollPolicy,
    pub backoff: BackoffPolicy,
    pub state_dir: PathBuf,
    pub apply_command: Option<ApplyCommand>,
    pub start_at: Phase,
    pub end_at: Phase,
}

pub fn orchestrate(ctx: &RunContext) -> Result<RunReport> {
    let started = Instant::now();
    let mut report = RunReport::new(&ctx.topology.name);
    ctx.output.on_run_start(&ctx.topology.name, &report.run_id);

    let specs = ctx.topology.list_specs();
    let fingerprint = ctx.topology.fingerprint();

    let resource_reports: Mutex<BTreeMap<u64, ResourceReport>> = Mutex::new(
        specs
            .iter()
            .map(|s| (s.id, ResourceReport::pending(s.id, s.hostname(), s.role.clone())))
            .collect(),
    );

    let mut status = RunStatus::resuming_at(ctx.start_at);
    let mut handles: BTreeMap<u64, ProvisionedResource> = BTreeMap::new();
    let mut addresses: Vec<DiscoveredAddress> = Vec::new();
    let mut groups: BTreeMap<String, InventoryGroup> = BTreeMap::new();

    // a resume replays the earlier phases' outputs from the cache
    if ctx.start_at > Phase::Infra {
        ctx.output.on_phase_skipped(Phase::Infra);
    }
    if ctx.start_at > Phase::Bootstrap {
        let cached = CachedState::load(&ctx.state_dir, &fingerprint)?.ok_or_else(|| {
            UpliftError::Config(
                "no cached bootstrap state for this topology; run the bootstrap phase first".into(),
            )
        })?;
        ctx.output.on_phase_skipped(Phase::Bootstrap);
        let mut reports = resource_reports.lock().unwrap();
        for address in cached.addresses.iter() {
            if let Some(entry) = reports.get_mut(&address.spec_id) {
                entry.set_state("ready");
                entry.address = Some(address.address.clone());
            }
        }
        drop(reports);
        addresses = cached.addresses;
        groups = cached.groups;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.threads.max(1))
        .build()
        .map_err(|e| UpliftError::Config(format!("unable to build worker pool: {}", e)))?;

    for phase in Phase::all() {
        if phase < ctx.start_at {
            continue;
        }
        if phase > ctx.end_at {
            break;
        }
        if !status.may_start(phase) {
            break;
        }

        let phase_failed = match phase {
            Phase::Infra => run_infra(ctx, &pool, &resource_reports, &mut handles),
            Phase::Bootstrap => {
                let failed = run_bootstrap(ctx, &pool, &resource_reports, &handles, &mut addresses)?;
                groups = resolve(&addresses, specs)?;
                CachedState::new(&ctx.topology.name, &fingerprint, addresses.clone(), groups.clone())
                    .save(&ctx.state_dir)?;
                failed
            }
            Phase::Configure => run_configure(ctx, &groups, &mut report.errors)?,
        };

        if phase_failed > 0 {
            status = RunStatus::Failed(phase);
            report
                .errors
                .push(format!("phase {} failed for {} resource(s)", phase, phase_failed));
        } else if ctx.cancel.is_cancelled() {
            status = RunStatus::Failed(phase);
            report.errors.push(format!("run cancelled during phase {}", phase));
        } else {
            status = RunStatus::completed(phase);
        }
    }

    report.resources = resource_reports.into_inner().unwrap().into_values().collect();
    report.phase_reached = status.as_str();
    report.elapsed_secs = started.elapsed().as_secs();
    report.success = status == RunStatus::completed(ctx.end_at);
    ctx.output.on_recap(&report);
    Ok(report)
}

fn run_infra(
    ctx: &RunContext,
    pool: &rayon::ThreadPool,
    resource_reports: &Mutex<BTreeMap<u64, ResourceReport>>,
    handles: &mut BTreeMap<u64, ProvisionedResource>,
) -> usize {
    let specs = ctx.topology.list_specs();
    ctx.output.on_phase_start(Phase::Infra, specs.len());

    let results: Mutex<Vec<(u64, Result<Ensured>)>> = Mutex::new(Vec::new());
    pool.install(|| {
        specs.par_iter().for_each(|spec| {
            let outcome = if ctx.cancel.is_cancelled() {
                Err(UpliftError::Cancelled)
            } else {
                retry_transient(&ctx.backoff, &ctx.cancel, || ctx.platform.ensure(spec))
            };
            results.lock().unwrap().push((spec.id, outcome));
        });
    });

    let mut failed = 0;
    let mut reports = resource_reports.lock().unwrap();
    let mut results = results.into_inner().unwrap();
    results.sort_by_key(|(id, _)| *id);
    for (id, outcome) in results {
        let entry = reports.get_mut(&id).expect("report entry exists for every spec");
        match outcome {
            Ok(ensured) => {
                match ensured.outcome {
                    EnsureOutcome::Created => ctx.output.on_resource_created(&entry.name),
                    EnsureOutcome::AlreadyExists => ctx.output.on_resource_exists(&entry.name),
                }
                entry.set_state(ensured.resource.state.as_str());
                handles.insert(id, ensured.resource);
            }
            Err(e) => {
                ctx.output.on_resource_failed(&entry.name, &e);
                entry.set_failure(&e);
                failed += 1;
            }
        }
    }
    ctx.output.on_phase_end(Phase::Infra, failed);
    failed
}

fn run_bootstrap(
    ctx: &RunContext,
    pool: &rayon::ThreadPool,
    resource_reports: &Mutex<BTreeMap<u64, ResourceReport>>,
    handles: &BTreeMap<u64, ProvisionedResource>,
    addresses: &mut Vec<DiscoveredAddress>,
) -> Result<usize> {
    let specs = ctx.topology.list_specs();

    // only resources that survived infra are waited on
    let candidates: Vec<_> = specs
        .iter()
        .filter(|spec| {
            let reports = resource_reports.lock().unwrap();
            !reports[&spec.id].is_failed()
        })
        .collect();

    ctx.output.on_phase_start(Phase::Bootstrap, candidates.len());
    let poller = Poller::new(ctx.poll_policy.clone());

    let results: Mutex<Vec<(u64, Result<(DiscoveredAddress, u64)>)>> = Mutex::new(Vec::new());
    pool.install(|| {
        candidates.par_iter().for_each(|spec| {
            let outcome = if ctx.cancel.is_cancelled() {
                Err(UpliftError::Cancelled)
            } else {
                wait_one(ctx, &poller, spec, handles)
            };
            results.lock().unwrap().push((spec.id, outcome));
        });
    });

    let mut failed = 0;
    let mut reports = resource_reports.lock().unwrap();
    let mut results = results.into_inner().unwrap();
    results.sort_by_key(|(id, _)| *id);
    for (id, outcome) in results {
        let entry = reports.get_mut(&id).expect("report entry exists for every spec");
        match outcome {
            Ok((discovered, elapsed_secs)) => {
                ctx.output.on_resource_ready(&entry.name, &discovered.address, elapsed_secs);
                entry.set_state("ready");
                entry.address = Some(discovered.address.clone());
                addresses.push(discovered);
            }
            Err(e) => {
                ctx.output.on_resource_failed(&entry.name, &e);
                entry.set_failure(&e);
                failed += 1;
            }
        }
    }
    // deterministic regardless of completion order
    addresses.sort_by_key(|a| a.spec_id);
    ctx.output.on_phase_end(Phase::Bootstrap, failed);
    Ok(failed)
}

fn wait_one(
    ctx: &RunContext,
    poller: &Poller,
    spec: &crate::topology::spec::ResourceSpec,
    handles: &BTreeMap<u64, ProvisionedResource>,
) -> Result<(DiscoveredAddress, u64)> {
    // a run resuming at bootstrap has no handles yet and adopts from the
    // platform instead
    let resource = match handles.get(&spec.id) {
        Some(r) => r.clone(),
        None => {
            let handle = ctx.platform.find(spec)?.ok_or_else(|| {
                UpliftError::Validation(format!(
                    "resource {} is not realized on the platform; run the infra phase first",
                    spec.id
                ))
            })?;
            ProvisionedResource::new(spec.id, handle, crate::platform::ResourceState::Booting)
        }
    };

    ctx.output.on_resource_wait(&spec.hostname(), ctx.poll_policy.timeout.as_secs());
    let wait_started = Instant::now();
    let discovered = poller.wait_ready(ctx.platform.as_ref(), spec, &resource, &ctx.cancel)?;
    Ok((discovered, wait_started.elapsed().as_secs()))
}

fn run_configure(
    ctx: &RunContext,
    groups: &BTreeMap<String, InventoryGroup>,
    errors: &mut Vec<String>,
) -> Result<usize> {
    let member_count: usize = groups.values().map(|g| g.len()).sum();
    ctx.output.on_phase_start(Phase::Configure, member_count);

    let inventory_path = write_inventory_file(&ctx.state_dir, &ctx.topology.name, groups)?;
    let mut failed = 0;

    for role in ctx.topology.roles_in_order() {
        if ctx.cancel.is_cancelled() {
            errors.push(format!("cancelled before applying role '{}'", role));
            failed += 1;
            break;
        }
        let group = match groups.get(&role) {
            Some(g) if !g.is_empty() => g,
            _ => continue,
        };
        ctx.output.on_group_resolved(&role, group.len());

        if let Some(command) = &ctx.apply_command {
            let label = ctx
                .topology
                .get_role(&role)
                .and_then(|r| r.apply.clone())
                .unwrap_or_default();
            ctx.output.on_apply_start(&role, command.program());
            match command.run_for_group(&role, &label, group, &inventory_path) {
                Ok(()) => ctx.output.on_apply_end(&role, true),
                Err(e) => {
                    ctx.output.on_apply_end(&role, false);
                    errors.push(e.to_string());
                    failed += 1;
                }
            }
        }
    }

    ctx.output.on_phase_end(Phase::Configure, failed);
    Ok(failed)
}

/// Tear the topology down, highest id first so dependents go before the
/// things they lean on.
pub fn teardown(ctx: &RunContext) -> Result<RunReport> {
    let started = Instant::now();
    let mut report = RunReport::new(&ctx.topology.name);
    ctx.output.on_run_start(&ctx.topology.name, &report.run_id);

    let mut failed = 0;
    for spec in ctx.topology.list_specs().iter().rev() {
        let mut entry = ResourceReport::pending(spec.id, spec.hostname(), spec.role.clone());
        if ctx.cancel.is_cancelled() {
            entry.set_failure(&UpliftError::Cancelled);
            failed += 1;
            report.resources.push(entry);
            continue;
        }
        match retry_transient(&ctx.backoff, &ctx.cancel, || ctx.platform.destroy(spec)) {
            Ok(true) => {
                ctx.output.on_resource_destroyed(&entry.name);
                entry.set_state("destroyed");
            }
            Ok(false) => entry.set_state("absent"),
            Err(e) => {
                ctx.output.on_resource_failed(&entry.name, &e);
                entry.set_failure(&e);
                failed += 1;
            }
        }
        report.resources.push(entry);
    }

    report.resources.sort_by_key(|r| r.spec_id);
    report.phase_reached = "teardown".to_string();
    report.elapsed_secs = started.elapsed().as_secs();
    report.success = failed == 0;
    ctx.output.on_recap(&report);
    Ok(report)
}
