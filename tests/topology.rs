// Topology loading from disk.

mod common;

use common::{write_topology, THREE_NODE};
use tempfile::TempDir;
use uplift::Topology;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_topology(dir.path(), THREE_NODE);

    let topology = Topology::load(&path).unwrap();
    assert_eq!(topology.name, "k3s-lab");
    let ids: Vec<u64> = topology.list_specs().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(topology.roles_in_order(), vec!["server", "agent"]);
}

#[test]
fn test_load_missing_file() {
    let err = Topology::load(std::path::Path::new("/no/such/topology.yml")).unwrap_err();
    assert!(err.to_string().contains("unable to open file"));
}

#[test]
fn test_load_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_topology(dir.path(), "name: broken\nresources: [unclosed\n");
    let err = Topology::load(&path).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_fingerprint_changes_with_resource_set() {
    let dir = TempDir::new().unwrap();
    let a = Topology::load(&write_topology(dir.path(), THREE_NODE)).unwrap();

    let shrunk = r#"
name: k3s-lab
resources:
  - id: 1
    kind: vm
    role: server
roles:
  server:
    order: 1
    apply: k3s/server.yml
  agent:
    order: 2
    apply: k3s/agent.yml
"#;
    let b = Topology::parse(shrunk).unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());
}
