// End-to-end orchestration scenarios driven through the simulated platform.

mod common;

use common::{test_config, write_topology, THREE_NODE};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uplift::platform::simulate::SimulatePlatform;
use uplift::run::phase::Phase;
use uplift::run::state::CachedState;
use uplift::{Topology, UpliftRunner};

#[test]
fn test_full_run_groups_by_role() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));

    let runner = UpliftRunner::new(test_config(dir.path(), &topology_path))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    let report = runner.run().unwrap();

    assert!(report.success);
    assert_eq!(report.phase_reached, "configure-done");
    assert_eq!(report.resources.len(), 3);
    assert!(report.resources.iter().all(|r| r.state == "ready"));
    assert_eq!(platform.guest_count(), 3);

    // the resolved inventory: {"server": {1: A1}, "agent": {2: A2, 3: A3}}
    let topology = Topology::load(&topology_path).unwrap();
    let cached = CachedState::load(&dir.path().join("state"), &topology.fingerprint())
        .unwrap()
        .unwrap();
    assert_eq!(cached.groups.len(), 2);
    assert_eq!(
        cached.groups["server"].address_of(1),
        Some(SimulatePlatform::address_for(1).as_str())
    );
    assert_eq!(
        cached.groups["agent"].address_of(2),
        Some(SimulatePlatform::address_for(2).as_str())
    );
    assert_eq!(
        cached.groups["agent"].address_of(3),
        Some(SimulatePlatform::address_for(3).as_str())
    );

    // inventory exported for the configuration-apply collaborator
    let inventory = dir.path().join("state").join("k3s-lab.inventory.json");
    assert!(inventory.exists());
}

#[test]
fn test_rerun_adopts_existing_resources() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));

    let runner = UpliftRunner::new(test_config(dir.path(), &topology_path))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    assert!(runner.run().unwrap().success);
    assert!(runner.run().unwrap().success);

    // three ensure calls per run, no duplicate guests
    assert_eq!(platform.ensure_calls(), 6);
    assert_eq!(platform.guest_count(), 3);
}

#[test]
fn test_partial_readiness_failure() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    // resource 2 boots but never reports an address
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0).with_never_ready(2));

    let runner = UpliftRunner::new(test_config(dir.path(), &topology_path))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    let report = runner.run().unwrap();

    assert!(!report.success);
    assert_eq!(report.phase_reached, "failed(bootstrap)");

    let by_id = |id: u64| report.resources.iter().find(|r| r.spec_id == id).unwrap();
    assert_eq!(by_id(1).state, "ready");
    assert_eq!(by_id(3).state, "ready");
    assert_eq!(by_id(2).state, "failed");
    assert_eq!(by_id(2).error_kind.as_deref(), Some("readiness-timeout"));

    // siblings are still grouped for potential partial configuration
    let topology = Topology::load(&topology_path).unwrap();
    let cached = CachedState::load(&dir.path().join("state"), &topology.fingerprint())
        .unwrap()
        .unwrap();
    assert!(cached.groups["server"].contains(1));
    assert!(cached.groups["agent"].contains(3));
    assert!(!cached.groups["agent"].contains(2));
}

#[test]
fn test_resume_at_configure_skips_earlier_phases() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));

    // first run stops after bootstrap, leaving cached state behind
    let first = UpliftRunner::new(test_config(dir.path(), &topology_path).end_at(Phase::Bootstrap))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    let report = first.run().unwrap();
    assert!(report.success);
    assert_eq!(report.phase_reached, "bootstrap-done");

    let ensures_before = platform.ensure_calls();
    let polls_before = platform.poll_calls();

    // second run goes straight to configure off the cache
    let second =
        UpliftRunner::new(test_config(dir.path(), &topology_path).start_at(Phase::Configure))
            .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    let report = second.run().unwrap();

    assert!(report.success);
    assert_eq!(report.phase_reached, "configure-done");
    // no provisioning, no polling - everything came from the cache
    assert_eq!(platform.ensure_calls(), ensures_before);
    assert_eq!(platform.poll_calls(), polls_before);
    assert!(report.resources.iter().all(|r| r.state == "ready"));
}

#[test]
fn test_resume_at_configure_without_cache_fails() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new());

    let runner =
        UpliftRunner::new(test_config(dir.path(), &topology_path).start_at(Phase::Configure))
            .with_platform(platform as Arc<dyn uplift::Platform>);
    let err = runner.run().unwrap_err();
    assert!(err.to_string().contains("cached bootstrap state"));
}

#[test]
fn test_cancellation_starts_no_new_work() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new());

    let runner = UpliftRunner::new(test_config(dir.path(), &topology_path))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    runner.cancel_token().cancel();
    let report = runner.run().unwrap();

    assert!(!report.success);
    assert_eq!(report.phase_reached, "failed(infra)");
    assert_eq!(platform.ensure_calls(), 0);
    assert!(report
        .resources
        .iter()
        .all(|r| r.error_kind.as_deref() == Some("cancelled")));
}

#[test]
fn test_transient_platform_errors_are_retried() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(
        SimulatePlatform::new()
            .with_boot_polls(0)
            .with_transient_failures(1, 2),
    );

    let mut config = test_config(dir.path(), &topology_path);
    config.retry_base_secs = 0;
    let runner = UpliftRunner::new(config)
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    let report = runner.run().unwrap();

    assert!(report.success);
    // two failed attempts for id 1, one success each for ids 1, 2, 3
    assert_eq!(platform.ensure_calls(), 5);
}

#[test]
fn test_apply_command_runs_per_role_in_order() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));
    let log = dir.path().join("apply.log");

    let config = test_config(dir.path(), &topology_path).apply_command(format!(
        "sh -c 'echo \"$UPLIFT_ROLE=$UPLIFT_ADDRESSES\" >> {}'",
        log.display()
    ));
    let runner =
        UpliftRunner::new(config).with_platform(platform as Arc<dyn uplift::Platform>);
    let report = runner.run().unwrap();
    assert!(report.success);

    let lines: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    // server (order 1) before agent (order 2), addresses in spec-id order
    assert_eq!(
        lines,
        vec![
            format!("server={}", SimulatePlatform::address_for(1)),
            format!(
                "agent={},{}",
                SimulatePlatform::address_for(2),
                SimulatePlatform::address_for(3)
            ),
        ]
    );
}

#[test]
fn test_failing_apply_command_fails_configure() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));

    let config = test_config(dir.path(), &topology_path).apply_command("false".to_string());
    let runner =
        UpliftRunner::new(config).with_platform(platform as Arc<dyn uplift::Platform>);
    let report = runner.run().unwrap();

    assert!(!report.success);
    assert_eq!(report.phase_reached, "failed(configure)");
    assert!(!report.errors.is_empty());
}

#[test]
fn test_destroy_removes_guests_in_reverse_order() {
    let dir = TempDir::new().unwrap();
    let topology_path = write_topology(dir.path(), THREE_NODE);
    let platform = Arc::new(SimulatePlatform::new().with_boot_polls(0));

    let runner = UpliftRunner::new(test_config(dir.path(), &topology_path))
        .with_platform(Arc::clone(&platform) as Arc<dyn uplift::Platform>);
    assert!(runner.run().unwrap().success);
    assert_eq!(platform.guest_count(), 3);

    let report = runner.destroy().unwrap();
    assert!(report.success);
    assert_eq!(platform.guest_count(), 0);
    assert!(report.resources.iter().all(|r| r.state == "destroyed"));

    // destroying an empty topology reports absence, not failure
    let report = runner.destroy().unwrap();
    assert!(report.success);
    assert!(report.resources.iter().all(|r| r.state == "absent"));
}
