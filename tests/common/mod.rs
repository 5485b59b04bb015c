// Common test utilities

use std::fs;
use std::path::{Path, PathBuf};
use uplift::run::phase::Phase;
use uplift::UpliftConfig;

/// The canonical three-node K3s-style topology: one server, two agents.
pub const THREE_NODE: &str = r#"
name: k3s-lab
resources:
  - id: 1
    kind: vm
    role: server
  - id: 2
    kind: vm
    role: agent
  - id: 3
    kind: vm
    role: agent
roles:
  server:
    order: 1
    apply: k3s/server.yml
  agent:
    order: 2
    apply: k3s/agent.yml
"#;

pub fn write_topology(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("topology.yml");
    fs::write(&path, yaml).unwrap();
    path
}

/// Config tuned for fast tests: tight deadlines, state under the temp dir.
pub fn test_config(dir: &Path, topology: &Path) -> UpliftConfig {
    UpliftConfig::new()
        .topology(topology)
        .state_dir(dir.join("state"))
        .threads(2)
        .poll_timeout(2)
        .poll_interval(1)
        .poll_strategy("simple".to_string())
        .end_at(Phase::Configure)
}
