mod app;
mod archive;
mod color;
mod config;
mod data;
mod error;
mod observations;
mod pipeline;
mod query;
mod series;
mod state;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use eframe::egui;

use app::StellarHrApp;
use archive::{ArchiveClient, FileArchive, GaiaTapClient};
use config::RunConfig;
use data::loader::{load_mass_luminosity, load_table};
use observations::{
    by_calib_level, by_instrument, observations_from_table, science_products, MastClient,
    ObservationQuery, ObservationRecord, CALIBRATED_LEVEL,
};
use pipeline::{run_mass_luminosity, run_target};
use series::{CsvPlotSink, PlotSink};
use state::AppState;

/// Gaia HR diagrams and mass-luminosity relations.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON run configuration (targets, thresholds, luminosity model).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local catalog export to cone-search instead of querying Gaia.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Table with mass and bolometric magnitude columns.
    #[arg(long)]
    mass_luminosity: Option<PathBuf>,

    /// Run without a window and write plot inputs as CSV.
    #[arg(long)]
    headless: bool,

    /// Where headless runs write their CSV files.
    #[arg(long, default_value = "plots")]
    output_dir: PathBuf,

    /// Only run the named targets (repeatable).
    #[arg(long = "target")]
    targets: Vec<String>,

    /// MAST observation export to list HST science products from.
    #[arg(long)]
    observations: Option<PathBuf>,

    /// Query MAST for HST observations around each target.
    #[arg(long)]
    mast: bool,

    /// Instrument used to narrow observation listings.
    #[arg(long, default_value = "ACS/WFC")]
    instrument: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.select(&args.targets);
    if config.targets.is_empty() && !args.targets.is_empty() {
        bail!("no configured target matches {:?}", args.targets);
    }

    if let Some(path) = &args.observations {
        let table = load_table(path).with_context(|| format!("loading {}", path.display()))?;
        list_observations(&observations_from_table(&table)?, &args.instrument);
    }
    if args.mast {
        query_mast(&config, &args.instrument)?;
    }

    if args.headless {
        return run_headless(&args, &config);
    }

    let mut state = AppState::new(config);
    if let Some(path) = &args.catalog {
        state.open_catalog_for_targets(path)?;
    }
    if let Some(path) = &args.mass_luminosity {
        state.open_mass_luminosity(path)?;
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Stellar HR – Gaia HR Diagrams",
        options,
        Box::new(|_cc| Ok(Box::new(StellarHrApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}

fn run_headless(args: &Args, config: &RunConfig) -> Result<()> {
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let mut sink = CsvPlotSink::new(&args.output_dir);

    let client: Box<dyn ArchiveClient> = match &args.catalog {
        Some(path) => Box::new(open_export(path)?),
        None => {
            let gaia = GaiaTapClient::new()?;
            log::info!("Querying {}", gaia.endpoint());
            Box::new(gaia)
        }
    };

    let mut failed = 0;
    for target in &config.targets {
        match run_target(client.as_ref(), target) {
            Ok(run) => sink.submit(run.series),
            Err(e) => {
                log::error!("[{}] {e}", target.name);
                failed += 1;
            }
        }
    }

    if let Some(path) = &args.mass_luminosity {
        let records =
            load_mass_luminosity(path).with_context(|| format!("loading {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mass_luminosity");
        let run = run_mass_luminosity(name, &records, &config.luminosity);
        log::info!(
            "[{name}] {} of {} stars derived, {} skipped.",
            run.derived.len(),
            run.input,
            run.skipped.len()
        );
        sink.submit(run.series);
    }

    log::info!("Wrote {} plot files to {}", sink.written.len(), args.output_dir.display());
    if failed > 0 {
        bail!("{failed} of {} targets failed", config.targets.len());
    }
    Ok(())
}

fn open_export(path: &Path) -> Result<FileArchive> {
    let archive =
        FileArchive::open(path).with_context(|| format!("loading {}", path.display()))?;
    if archive.is_empty() {
        log::warn!("{} contains no sources", path.display());
    }
    Ok(archive)
}

fn list_observations(observations: &[ObservationRecord], instrument: &str) {
    let selected: Vec<&ObservationRecord> = by_instrument(observations, instrument)
        .into_iter()
        .filter(|o| o.calib_level == Some(CALIBRATED_LEVEL))
        .collect();
    log::info!(
        "{} of {} observations are calibrated {instrument} data",
        selected.len(),
        observations.len()
    );
    for o in selected {
        log::info!(
            "{} target={} filters={} exptime={}",
            o.obsid,
            o.target_name.as_deref().unwrap_or("-"),
            o.filters.as_deref().unwrap_or("-"),
            o.t_exptime.map(|t| format!("{t:.0}s")).unwrap_or_else(|| "-".into())
        );
    }
}

fn query_mast(config: &RunConfig, instrument: &str) -> Result<()> {
    let client = MastClient::new()?;
    for target in &config.targets {
        let params = target.query().with_context(|| format!("target '{}'", target.name))?;
        let query = ObservationQuery::hst(*params.coord(), params.radius())?;
        log::info!("[{}] Querying MAST for HST observations.", target.name);
        let observations = client
            .observations(&query)
            .with_context(|| format!("MAST query for '{}'", target.name))?;
        log::info!("[{}] Found {} observations.", target.name, observations.len());

        let by_inst = by_instrument(&observations, instrument);
        let calibrated: Vec<&ObservationRecord> = by_calib_level(&observations, CALIBRATED_LEVEL)
            .into_iter()
            .filter(|o| by_inst.iter().any(|b| b.obsid == o.obsid))
            .collect();
        log::info!(
            "[{}] {} {instrument} observations, {} calibrated.",
            target.name,
            by_inst.len(),
            calibrated.len()
        );

        let products = client.products(&calibrated)?;
        for p in science_products(&products, "drz.fits", 5) {
            log::info!("[{}] {} ({})", target.name, p.product_filename, p.obsid);
        }
    }
    Ok(())
}
