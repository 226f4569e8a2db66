//! File-driven replication: mapping, catalog and source records loaded
//! from disk, through the library and through the `cmdb-pull` binary.

mod common;

use cmdb_pull::{
    load_mappings, AttributeCatalog, AttributeValue, ComplexId, MemorySourceSystem, Replicator,
    StaticCatalog,
};
use common::Fixture;
use std::process::Command;
use std::sync::Arc;

fn node(name: &str) -> ComplexId {
    ComplexId::new(name, "host", "node")
}

fn app(id: &str) -> ComplexId {
    ComplexId::new(id, "app", "running_software")
}

fn db(id: &str) -> ComplexId {
    ComplexId::new(id, "db", "database")
}

#[tokio::test]
async fn replicates_fixture_files() {
    let fixture = Fixture::standard();
    let catalog = Arc::new(StaticCatalog::from_path(&fixture.catalog).unwrap());
    let mappings = load_mappings(
        &fixture.mapping,
        Some(catalog.as_ref() as &dyn AttributeCatalog),
    )
    .unwrap();
    let source = MemorySourceSystem::from_path(&fixture.input).unwrap();

    let replication = Replicator::new(mappings, catalog)
        .replicate_topology(&source)
        .await
        .unwrap();
    let topology = &replication.topology;
    let report = &replication.report;

    assert_eq!(topology.ci_count(), 3);
    assert!(topology.contains(&node("WEB01")));
    assert!(topology.contains(&app("shop")));
    assert!(topology.contains(&db("pg")));

    assert_eq!(topology.link_count(), 2);
    assert!(topology.has_link("composition", &node("WEB01"), &app("shop")));
    assert!(topology.has_link("usage", &app("shop"), &db("pg")));

    let host = topology.get(&node("WEB01")).unwrap();
    assert_eq!(
        host.ci.attribute("name"),
        Some(&AttributeValue::String("web01".to_string()))
    );
    assert_eq!(host.ci.attribute("cpu_count"), Some(&AttributeValue::Int(4)));

    let pg = topology.get(&db("pg")).unwrap();
    assert_eq!(
        pg.ci.attribute("name"),
        Some(&AttributeValue::String("pg-db".to_string()))
    );

    // Unnamed host rejected by its validator
    assert_eq!(report.cis_skipped, 1);
    // blog points at a database that does not exist
    assert_eq!(report.cis_excluded, 1);
    // ghost lost its container
    assert_eq!(report.cis_discarded, 1);
    assert!(report.is_complete());
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn replication_is_deterministic() {
    let fixture = Fixture::standard();
    let mut rendered = Vec::new();
    for _ in 0..3 {
        let catalog = Arc::new(StaticCatalog::from_path(&fixture.catalog).unwrap());
        let mappings = load_mappings(&fixture.mapping, None).unwrap();
        let source = MemorySourceSystem::from_path(&fixture.input).unwrap();
        let replication = Replicator::new(mappings, catalog)
            .replicate_topology(&source)
            .await
            .unwrap();
        rendered.push(serde_json::to_string(&replication.topology).unwrap());
    }
    assert!(rendered.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn malformed_mapping_is_rejected_at_load() {
    let mapping = r#"
cis:
  - source_type: app
    target_type: running_software
    need_relationship: "usage"
"#;
    let fixture = Fixture::write(mapping, common::CATALOG, common::INPUT);
    assert!(load_mappings(&fixture.mapping, None).is_err());
}

#[test]
fn cli_replicate_prints_topology() {
    let fixture = Fixture::standard();
    let output = Command::new(env!("CARGO_BIN_EXE_cmdb-pull"))
        .arg("replicate")
        .arg("--mapping")
        .arg(&fixture.mapping)
        .arg("--catalog")
        .arg(&fixture.catalog)
        .arg("--input")
        .arg(&fixture.input)
        .output()
        .unwrap();

    assert!(output.status.success());
    let topology: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(topology["cis"].as_array().unwrap().len(), 3);
    assert_eq!(topology["links"].as_array().unwrap().len(), 2);
    assert_eq!(topology["cis"][0]["id"], "node: WEB01_host");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 by dependency validation"));
}

#[test]
fn cli_check_summarizes_mapping() {
    let fixture = Fixture::standard();
    let output = Command::new(env!("CARGO_BIN_EXE_cmdb-pull"))
        .arg("check")
        .arg("--mapping")
        .arg(&fixture.mapping)
        .arg("--catalog")
        .arg(&fixture.catalog)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 CI mappings, 2 link mappings"));
    assert!(stdout.contains("needs container"));
}

#[test]
fn cli_reports_missing_input() {
    let fixture = Fixture::standard();
    let output = Command::new(env!("CARGO_BIN_EXE_cmdb-pull"))
        .arg("replicate")
        .arg("--mapping")
        .arg(&fixture.mapping)
        .arg("--catalog")
        .arg(&fixture.catalog)
        .arg("--input")
        .arg(fixture.input.with_file_name("absent.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read input"));
}
