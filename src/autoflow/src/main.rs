//! Autoflow — preflight validator for the automation decision core.
//!
//! Loads automation rules, workflow graphs, and experiment definitions from
//! JSON files, runs the structural validators against the stock option
//! catalog, and exits non-zero if anything would be rejected at activation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use autoflow_core::catalog::StaticCatalog;
use autoflow_core::config::AppConfig;
use autoflow_core::error::ValidationError;
use autoflow_experiments::types::ExperimentDefinition;
use autoflow_rules::types::AutomationRule;
use autoflow_workflow::types::WorkflowGraph;

#[derive(Parser, Debug)]
#[command(name = "autoflow")]
#[command(about = "Preflight validation for automation rules, workflow graphs, and experiments")]
#[command(version)]
struct Cli {
    /// JSON file with an array of automation rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// JSON file with an array of workflow graphs
    #[arg(long)]
    graphs: Option<PathBuf>,

    /// JSON file with an array of experiment definitions
    #[arg(long)]
    experiments: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    tracing::debug!(engine = ?config.engine, "Configuration loaded");
    let catalog = StaticCatalog::new();

    let mut invalid = 0usize;

    if let Some(path) = &cli.rules {
        let rules: Vec<AutomationRule> = load_json(path)?;
        info!(count = rules.len(), file = %path.display(), "Checking automation rules");
        for rule in &rules {
            let errors = autoflow_rules::validator::validate(rule, &catalog);
            invalid += report("rule", &rule.name, &errors);
        }
    }

    if let Some(path) = &cli.graphs {
        let graphs: Vec<WorkflowGraph> = load_json(path)?;
        info!(count = graphs.len(), file = %path.display(), "Checking workflow graphs");
        for graph in &graphs {
            let errors = autoflow_workflow::validator::validate(graph);
            invalid += report("graph", &graph.name, &errors);
        }
    }

    if let Some(path) = &cli.experiments {
        let experiments: Vec<ExperimentDefinition> = load_json(path)?;
        info!(count = experiments.len(), file = %path.display(), "Checking experiments");
        for experiment in &experiments {
            let errors = autoflow_experiments::validator::validate(experiment);
            invalid += report("experiment", &experiment.name, &errors);
        }
    }

    if cli.rules.is_none() && cli.graphs.is_none() && cli.experiments.is_none() {
        anyhow::bail!("nothing to check; pass --rules, --graphs, or --experiments");
    }

    if invalid > 0 {
        error!(invalid, "Preflight failed");
        std::process::exit(1);
    }

    info!("Preflight passed; definitions are safe to activate");
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn report(kind: &str, name: &str, errors: &[ValidationError]) -> usize {
    if errors.is_empty() {
        info!(kind, name, "OK");
        0
    } else {
        for e in errors {
            error!(kind, name, field = %e.field, "{}", e.message);
        }
        1
    }
}
