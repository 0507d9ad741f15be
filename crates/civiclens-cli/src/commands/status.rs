//! Status command - move a report through the workflow.

use std::path::PathBuf;

use clap::Args;
use console::style;

use civiclens_core::{JsonFileStore, ReportStore};

use super::load_config;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Report id
    id: String,

    /// New status (e.g. "In Progress", "Resolved")
    status: String,

    /// Report store file (overrides store.path)
    #[arg(short, long)]
    store: Option<PathBuf>,
}

pub async fn run(args: StatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let status = args.status.trim();
    if status.is_empty() {
        anyhow::bail!("Status must not be empty");
    }

    let store_path = args.store.unwrap_or(config.store.path);
    let store = JsonFileStore::open(&store_path).await?;

    let report = store.update_status(&args.id, status).await?;

    println!(
        "{} {} is now {}",
        style("✓").green(),
        report.id,
        style(&report.status).bold()
    );

    Ok(())
}
