//! Nearby command - list reports around a location.

use std::path::PathBuf;

use clap::Args;

use civiclens_core::{nearby_reports, JsonFileStore, Report};

use super::{load_config, or_dash};

/// Arguments for the nearby command.
#[derive(Args)]
pub struct NearbyArgs {
    /// Latitude of the search center
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the search center
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Search radius in meters (default: nearby.default_radius_meters)
    #[arg(short, long)]
    radius: Option<f64>,

    /// Report store file (overrides store.path)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: NearbyFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum NearbyFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: NearbyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let radius = args.radius.unwrap_or(config.nearby.default_radius_meters);
    if !(radius >= 0.0) {
        anyhow::bail!("Radius must be non-negative, got {}", radius);
    }

    let store_path = args.store.unwrap_or(config.store.path);
    let store = JsonFileStore::open(&store_path).await?;

    let reports = nearby_reports(&store, args.lat, args.lon, radius).await?;

    let output = match args.format {
        NearbyFormat::Json => serde_json::to_string_pretty(&reports)?,
        NearbyFormat::Csv => format_csv(&reports)?,
        NearbyFormat::Text => format_text(&reports, radius),
    };
    println!("{}", output.trim_end());

    Ok(())
}

fn format_csv(reports: &[Report]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "category",
        "latitude",
        "longitude",
        "department",
        "status",
        "timestamp",
        "address",
        "city",
        "state",
    ])?;

    for report in reports {
        wtr.write_record([
            report.id.as_str(),
            report.category.as_str(),
            &report.latitude.to_string(),
            &report.longitude.to_string(),
            report.department.as_str(),
            report.status.as_str(),
            &report.timestamp.to_rfc3339(),
            report.address.as_deref().unwrap_or(""),
            report.city.as_deref().unwrap_or(""),
            report.state.as_deref().unwrap_or(""),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(reports: &[Report], radius: f64) -> String {
    if reports.is_empty() {
        return format!("No reports within {} m.", radius);
    }

    let mut output = format!("{} report(s) within {} m:\n", reports.len(), radius);
    for report in reports {
        output.push_str(&format!(
            "\n{}  {}  [{}]\n",
            report.id, report.category, report.status
        ));
        output.push_str(&format!("  Assigned to: {}\n", report.department));
        output.push_str(&format!(
            "  Where:       {}, {}\n",
            or_dash(&report.city),
            or_dash(&report.state)
        ));
        output.push_str(&format!(
            "  Reported:    {}\n",
            report.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    output
}
