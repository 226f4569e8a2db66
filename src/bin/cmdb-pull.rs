//! cmdb-pull CLI: replicate a topology from recorded source data.
//!
//! Usage:
//!   cmdb-pull replicate --mapping <file> --catalog <file> --input <file> [--pretty] [--verbose]
//!   cmdb-pull check --mapping <file> [--catalog <file>]

use clap::{Parser, Subcommand};
use cmdb_pull::{
    load_mappings, AttributeCatalog, MemorySourceSystem, ReplicationReport, Replicator,
    StaticCatalog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "cmdb-pull",
    version,
    about = "Mapping-driven CMDB topology replication"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate a topology and print it as JSON
    Replicate {
        /// Mapping document (YAML)
        #[arg(long)]
        mapping: PathBuf,
        /// Attribute catalog (YAML)
        #[arg(long)]
        catalog: PathBuf,
        /// Source records (JSON object keyed by source type)
        #[arg(long)]
        input: PathBuf,
        /// Pretty-print the topology
        #[arg(long)]
        pretty: bool,
        /// Log pipeline details to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Validate a mapping document
    Check {
        /// Mapping document (YAML)
        #[arg(long)]
        mapping: PathBuf,
        /// Attribute catalog used to resolve attribute kinds
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_catalog(path: &Path) -> Result<StaticCatalog, String> {
    StaticCatalog::from_path(path)
        .map_err(|e| format!("cannot load catalog '{}': {}", path.display(), e))
}

fn print_report(report: &ReplicationReport) {
    eprintln!(
        "Read {} entities, materialized {} CIs ({} skipped, {} duplicate)",
        report.entities_read, report.cis_materialized, report.cis_skipped, report.cis_duplicate
    );
    eprintln!(
        "Links: {} reported, {} built, {} dropped, {} pruned",
        report.links_reported, report.links_built, report.links_dropped, report.links_pruned
    );
    eprintln!(
        "CIs removed: {} by failure policy, {} by dependency validation",
        report.cis_excluded, report.cis_discarded
    );
    for (link, reason) in &report.link_mapping_failures {
        eprintln!("Warning: link mapping {} failed: {}", link, reason);
    }
}

fn cmd_replicate(mapping: &Path, catalog: &Path, input: &Path, pretty: bool) -> i32 {
    let catalog = match load_catalog(catalog) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mappings = match load_mappings(mapping, Some(catalog.as_ref() as &dyn AttributeCatalog)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot load mapping '{}': {}", mapping.display(), e);
            return 1;
        }
    };
    let source = match MemorySourceSystem::from_path(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot read input '{}': {}", input.display(), e);
            return 1;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 1;
        }
    };
    let replicator = Replicator::new(mappings, catalog);
    let replication = match runtime.block_on(replicator.replicate_topology(&source)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&replication.topology)
    } else {
        serde_json::to_string(&replication.topology)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot serialize topology: {}", e);
            return 1;
        }
    }
    print_report(&replication.report);
    0
}

fn cmd_check(mapping: &Path, catalog: Option<&Path>) -> i32 {
    let catalog = match catalog.map(load_catalog).transpose() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mappings = match load_mappings(
        mapping,
        catalog.as_ref().map(|c| c as &dyn AttributeCatalog),
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    println!(
        "{}: {} CI mappings, {} link mappings",
        mapping.display(),
        mappings.ci_mappings.len(),
        mappings.link_mappings.len()
    );
    for ci in &mappings.ci_mappings {
        let requirement = if ci.is_standalone() {
            "standalone".to_string()
        } else {
            let mut parts = Vec::new();
            if ci.need_container {
                parts.push("container".to_string());
            }
            parts.extend(ci.need_relationship.iter().map(|r| r.to_string()));
            format!("needs {}", parts.join(", "))
        };
        println!(
            "  {:<24} -> {:<24} {}",
            ci.source_type, ci.target_type, requirement
        );
    }
    for link in &mappings.link_mappings {
        println!("  {:<50} {}", link.name(), link.processor);
    }
    0
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Replicate {
            mapping,
            catalog,
            input,
            pretty,
            verbose,
        } => {
            init_logging(verbose);
            cmd_replicate(&mapping, &catalog, &input, pretty)
        }
        Commands::Check { mapping, catalog } => {
            init_logging(false);
            cmd_check(&mapping, catalog.as_deref())
        }
    };
    std::process::exit(code);
}
