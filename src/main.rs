use anyhow::Result;
use clap::{ArgGroup, Parser};
use m2m_fetch::m2m::{self, Client};
use m2m_fetch::pipeline::{self, SearchArea};
use m2m_fetch::selection::DatasetSelection;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Search the USGS EROS M2M catalog for scenes in a bounding box and download them.
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("area").required(true).args(["geojson", "bbox"])))]
struct Args {
    /// Path to a GeoJSON file containing polygon(s)
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Literal bounding box
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
        allow_negative_numbers = true
    )]
    bbox: Option<Vec<f64>>,

    /// Output directory for downloaded data
    #[arg(long = "out_dir", default_value = "downloads")]
    out_dir: PathBuf,

    /// TOML file with dataset_name, node, max_results and api_url
    #[arg(long)]
    selection: Option<PathBuf>,

    #[arg(long)]
    dataset: Option<String>,

    #[arg(long)]
    node: Option<String>,

    #[arg(long)]
    max_results: Option<u32>,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let result = run(Args::parse()).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    ExitCode::from(pipeline::exit_status(&result))
}

async fn run(args: Args) -> Result<()> {
    let token = m2m::token_from_env(m2m::TOKEN_ENV)?;

    let selection = match &args.selection {
        Some(path) => DatasetSelection::read(path)?,
        None => DatasetSelection::default(),
    }
    .with_overrides(args.dataset, args.node, args.max_results)?;
    let client = Client::new(&selection.api_url, &token)?;

    let area = match (args.geojson, args.bbox) {
        (Some(path), _) => SearchArea::GeoJson(path),
        (None, Some(values)) => SearchArea::Literal(values),
        (None, None) => anyhow::bail!("Either --geojson or --bbox is required"),
    };

    let summary = pipeline::execute(&client, &selection, &area, &args.out_dir).await?;

    if let Some(report) = &args.report {
        summary.write(report)?;
        info!("Wrote run summary to {}", report.display());
    }
    Ok(())
}
