//! Riparia CLI - riparian buffer masks from shoreline, water and stream layers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use riparia_algorithms::riparian::{vector_mask_path, Pipeline, PipelineInputs, RiparianConfig};
use riparia_core::io::{read_geotiff, read_vector_layer, write_geotiff, GeoTiffOptions, PixelType};
use riparia_core::raster::{ExtentMask, Raster, ReferenceGrid};
use riparia_core::vector::{GeometryKind, VectorLayer};
use riparia_core::CRS;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "riparia")]
#[command(author, version, about = "Riparian buffer masks on a reference grid", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (default: one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the riparian mask
    Run(RunArgs),
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// First shoreline layer (GeoJSON polygons)
    #[arg(long)]
    shoreline_a: PathBuf,
    /// Second shoreline layer (GeoJSON polygons)
    #[arg(long)]
    shoreline_b: PathBuf,
    /// Lotic water and reservoirs (GeoJSON polygons)
    #[arg(long)]
    water: PathBuf,
    /// Stream network with channel widths (GeoJSON lines)
    #[arg(long)]
    streams: PathBuf,
    /// Snap raster defining origin, cell size and CRS
    #[arg(long)]
    reference_grid: PathBuf,
    /// Extent-of-interest mask raster; non-zero cells are inside
    #[arg(long)]
    extent: Option<PathBuf>,
    /// Output mask (GeoTIFF, 0/1); the vector mask is written next to it
    /// as `<stem>_vector.geojson`
    #[arg(short, long)]
    output: PathBuf,
    /// Directory for intermediate layers (GeoJSON)
    #[arg(long)]
    intermediates: Option<PathBuf>,
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Working CRS, e.g. EPSG:5070
    #[arg(long)]
    crs: Option<String>,
    /// Riparian width in meters
    #[arg(long)]
    buffer_distance: Option<f64>,
    /// Output cell size in meters
    #[arg(long)]
    cell_size: Option<f64>,
    /// Minimum lotic water area in acres
    #[arg(long)]
    lotic_min_acres: Option<f64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn setup_threads(threads: Option<usize>) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure thread pool")?;
        info!("Using {} threads", n);
    }
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(args: &RunArgs) -> Result<RiparianConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => RiparianConfig::default(),
    };

    if let Some(crs) = &args.crs {
        config.crs = crs.clone();
    }
    if let Some(d) = args.buffer_distance {
        config.buffer_distance_m = d;
    }
    if let Some(c) = args.cell_size {
        config.cell_size_m = c;
    }
    if let Some(a) = args.lotic_min_acres {
        config.lotic_min_acres = a;
    }
    Ok(config)
}

fn read_layer(path: &Path, name: &str, kind: GeometryKind, crs: &CRS) -> Result<VectorLayer> {
    let pb = spinner(&format!("Reading {}...", name));
    let layer = read_vector_layer(path, name, kind, crs)
        .with_context(|| format!("Failed to read {} from {}", name, path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} features", name, layer.len());
    Ok(layer)
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> =
        read_geotiff(path, None).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Raster {}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn write_mask(raster: &Raster<u8>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(
        raster,
        path,
        Some(GeoTiffOptions {
            pixel_type: PixelType::UInt8,
        }),
    )
    .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;
    let crs = pipeline.config().working_crs()?;

    let inputs = PipelineInputs {
        shoreline_a: read_layer(&args.shoreline_a, "shoreline_a", GeometryKind::Polygon, &crs)?,
        shoreline_b: read_layer(&args.shoreline_b, "shoreline_b", GeometryKind::Polygon, &crs)?,
        water: read_layer(&args.water, "water", GeometryKind::Polygon, &crs)?,
        streams: read_layer(&args.streams, "streams", GeometryKind::Line, &crs)?,
    };
    let reference = ReferenceGrid::from_raster(&read_raster(&args.reference_grid)?)
        .context("Reference grid is not usable")?;
    let extent = match &args.extent {
        Some(path) => Some(ExtentMask::from_raster(&read_raster(path)?)),
        None => None,
    };

    let start = Instant::now();
    let output = pipeline
        .run(&inputs, &reference, extent.as_ref())
        .context("Riparian mask run failed")?;
    let elapsed = start.elapsed();

    if let Some(dir) = &args.intermediates {
        let pb = spinner("Writing intermediates...");
        let written = output
            .artifacts
            .write_geojson(dir)
            .with_context(|| format!("Failed to write intermediates to {}", dir.display()))?;
        pb.finish_and_clear();
        info!("{} intermediate layers written to {}", written.len(), dir.display());
    }

    let vector_path = vector_mask_path(&args.output);
    output
        .composite
        .write_geojson(&vector_path)
        .with_context(|| format!("Failed to write vector mask {}", vector_path.display()))?;
    info!("Vector mask: {} features", output.composite.layer().len());

    write_mask(&output.raster, &args.output)?;

    for (stage, time) in &output.timings {
        info!("  {:<10} {:.2?}", stage, time);
    }
    let summary = output.raster.summary();
    done("Riparian mask", &args.output, elapsed);
    println!("  Vector mask: {}", vector_path.display());
    println!(
        "  Riparian cells: {} of {} ({:.1}%)",
        summary.nonzero_count,
        output.raster.len(),
        100.0 * summary.nonzero_count as f64 / output.raster.len().max(1) as f64
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let summary = raster.summary();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!(
        "Valid cells: {} ({:.1}%)",
        summary.valid_count,
        100.0 * summary.valid_count as f64 / raster.len().max(1) as f64
    );
    println!(
        "Riparian (non-zero) cells: {} ({:.1}%)",
        summary.nonzero_count,
        100.0 * summary.nonzero_count as f64 / summary.valid_count.max(1) as f64
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    setup_threads(cli.threads)?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Info { input } => show_info(&input),
    }
}
