//! Common fixtures for file-driven replication tests
//!
//! A fixture is a temporary directory holding a mapping document, an
//! attribute catalog and a source record file.

use std::path::PathBuf;
use tempfile::TempDir;

pub const MAPPING: &str = r#"
cis:
  - source_type: host
    target_type: node
    id_key: name
    attributes:
      - { name: name, field: name, filters: [lowercase], validators: [not_empty] }
      - { name: cpu_count, field: cpus }
  - source_type: app
    target_type: running_software
    need_container: true
    attributes:
      - { name: name, field: id }
  - source_type: db
    target_type: database
    attributes:
      - { name: name, template: "{id}-db" }
links:
  - source_end1_type: host
    target_end1_type: node
    source_end2_type: app
    target_end2_type: running_software
    target_type: composition
    processor: "reference:apps"
  - source_end1_type: app
    target_end1_type: running_software
    source_end2_type: db
    target_end2_type: database
    target_type: usage
    processor: "reference:db"
    failure_policy: exclude_end1
"#;

pub const CATALOG: &str = r#"
node:
  name: string
  cpu_count: integer
running_software:
  name: string
database:
  name: string
"#;

/// `WEB01` runs `shop` and `blog`; `blog` uses a database that does not
/// exist. The unnamed host is rejected, which strands `ghost`.
pub const INPUT: &str = r#"
{
  "host": [
    { "name": "WEB01", "cpus": "4", "apps": ["shop", "blog"] },
    { "name": "", "apps": ["ghost"] }
  ],
  "app": [
    { "id": "shop", "db": "pg" },
    { "id": "blog", "db": "mysql" },
    { "id": "ghost", "db": "pg" }
  ],
  "db": [
    { "id": "pg" }
  ]
}
"#;

pub struct Fixture {
    // Held so the files outlive the test
    _dir: TempDir,
    pub mapping: PathBuf,
    pub catalog: PathBuf,
    pub input: PathBuf,
}

impl Fixture {
    pub fn write(mapping: &str, catalog: &str, input: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.yaml");
        let catalog_path = dir.path().join("catalog.yaml");
        let input_path = dir.path().join("input.json");
        std::fs::write(&mapping_path, mapping).unwrap();
        std::fs::write(&catalog_path, catalog).unwrap();
        std::fs::write(&input_path, input).unwrap();
        Fixture {
            _dir: dir,
            mapping: mapping_path,
            catalog: catalog_path,
            input: input_path,
        }
    }

    pub fn standard() -> Fixture {
        Self::write(MAPPING, CATALOG, INPUT)
    }
}
