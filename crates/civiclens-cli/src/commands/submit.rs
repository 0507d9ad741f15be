//! Submit command - classify a photo and file a report.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use civiclens_core::{
    load_detector, CivicConfig, Geocoder, JsonFileStore, NominatimGeocoder, NoopGeocoder,
    ReportPipeline, SubmissionOutcome,
};

use super::{load_config, or_dash};

/// Arguments for the submit command.
#[derive(Args)]
pub struct SubmitArgs {
    /// Photo of the issue (PNG or JPEG)
    #[arg(required = true)]
    image: PathBuf,

    /// Latitude where the photo was taken
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude where the photo was taken
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Detection model (overrides detection.model_path)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Report store file (overrides store.path)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Skip reverse geocoding
    #[arg(long)]
    offline: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: SubmitFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SubmitFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: SubmitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(model) = &args.model {
        config.detection.model_path = model.clone();
    }
    if let Some(store) = &args.store {
        config.store.path = store.clone();
    }
    config.validate()?;

    if !args.image.exists() {
        anyhow::bail!("Image file not found: {}", args.image.display());
    }
    let image = fs::read(&args.image)?;
    info!("Submitting {} ({} bytes)", args.image.display(), image.len());

    let outcome = if args.offline {
        submit_with(&config, NoopGeocoder, &image, &args).await?
    } else {
        let geocoder = NominatimGeocoder::from_config(&config.geocoding)?;
        submit_with(&config, geocoder, &image, &args).await?
    };

    debug!("Submission finished in {}ms", start.elapsed().as_millis());

    let output = match args.format {
        SubmitFormat::Json => serde_json::to_string_pretty(&outcome)?,
        SubmitFormat::Text => format_text(&outcome),
    };
    println!("{}", output);

    Ok(())
}

async fn submit_with<G: Geocoder>(
    config: &CivicConfig,
    geocoder: G,
    image: &[u8],
    args: &SubmitArgs,
) -> anyhow::Result<SubmissionOutcome> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("Loading detection model...");
    let detector = load_detector(&config.detection);
    let store = JsonFileStore::open(&config.store.path).await?;

    let pipeline = ReportPipeline::from_config(config, detector, geocoder, store);

    pb.set_message("Analyzing photo...");
    let outcome = pipeline.submit(image, args.lat, args.lon).await;
    pb.finish_and_clear();

    Ok(outcome?)
}

fn format_text(outcome: &SubmissionOutcome) -> String {
    match outcome {
        SubmissionOutcome::Rejected => format!(
            "{} No reportable issue found in the photo.",
            style("✗").red()
        ),
        SubmissionOutcome::Duplicate {
            original_id,
            issue,
            assigned_to,
            location,
        } => {
            let mut output = format!(
                "{} Already reported as {}\n",
                style("ℹ").blue(),
                style(original_id).bold()
            );
            output.push_str(&format!("  Issue:       {}\n", issue));
            output.push_str(&format!("  Assigned to: {}\n", assigned_to));
            output.push_str(&format!(
                "  Location:    {}, {} ({:.6}, {:.6})",
                or_dash(&location.city),
                or_dash(&location.state),
                location.lat,
                location.lon
            ));
            output
        }
        SubmissionOutcome::Success {
            report_id,
            issue,
            assigned_to,
            location,
        } => {
            let mut output = format!(
                "{} Report {} created\n",
                style("✓").green(),
                style(report_id).bold()
            );
            output.push_str(&format!("  Issue:       {}\n", issue));
            output.push_str(&format!("  Assigned to: {}\n", assigned_to));
            output.push_str(&format!(
                "  Location:    {}, {} ({:.6}, {:.6})",
                or_dash(&location.city),
                or_dash(&location.state),
                location.lat,
                location.lon
            ));
            output
        }
    }
}
