use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use banana_suitability::boundary::StaticGeometryProvider;
use banana_suitability::clip::PolygonClipper;
use banana_suitability::config::AnalysisConfig;
use banana_suitability::export::PngExporter;
use banana_suitability::logging::init_logging;
use banana_suitability::pipeline::{run_suitability_analysis, Collaborators, RunSettings};
use banana_suitability::providers::{NullVisualizer, Visualizer};
use banana_suitability::render::PngVisualizer;
use banana_suitability::report;
use banana_suitability::synthetic::SyntheticProvider;

#[derive(Parser, Debug)]
#[command(name = "banana-suitability")]
#[command(about = "Classify land suitability for bananas from environmental rasters")]
struct Args {
    /// JSON run configuration (missing fields use the defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for exports and previews
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for the synthetic data provider
    #[arg(short, long)]
    seed: Option<u64>,

    /// Width of the synthetic rasters in cells
    #[arg(short = 'W', long)]
    width: Option<usize>,

    /// Height of the synthetic rasters in cells
    #[arg(short = 'H', long)]
    height: Option<usize>,

    /// Only run these criteria (comma separated, e.g. "elevation,slope")
    #[arg(long, value_delimiter = ',')]
    criteria: Vec<String>,

    /// Run the criteria one after another instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Skip PNG previews
    #[arg(long)]
    no_render: bool,

    /// Write a JSON report of every criterion's outcome
    #[arg(long)]
    report: Option<PathBuf>,

    /// Dump the effective configuration to this file and continue
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(seed) = args.seed {
        config.synthetic.seed = seed;
    }
    if let Some(width) = args.width {
        config.synthetic.width = width;
    }
    if let Some(height) = args.height {
        config.synthetic.height = height;
    }
    if args.sequential {
        config.parallel = false;
    }
    if args.no_render {
        config.render = false;
    }
    if !args.criteria.is_empty() {
        for name in config.retain_criteria(&args.criteria) {
            warn!(criterion = %name, "unknown criterion ignored");
        }
    }
    if let Some(path) = &args.dump_config {
        config.to_json_file(path)?;
    }

    println!(
        "Banana suitability for {} ({} criteria, seed {})",
        config.region,
        config.criteria.len(),
        config.synthetic.seed
    );
    println!(
        "Synthetic rasters: {}x{}, output: {}",
        config.synthetic.width,
        config.synthetic.height,
        config.output_dir.display()
    );

    let mut geometry = StaticGeometryProvider::with_builtin_regions();
    if let Some(path) = &config.boundaries_file {
        let count = geometry.load_json(path)?;
        info!(count, path = %path.display(), "loaded boundaries");
    }
    let data = SyntheticProvider::new(config.synthetic.clone());
    let exporter = PngExporter::new(&config.output_dir);
    let png_visualizer = PngVisualizer::new(config.output_dir.join("previews"));
    let visualizer: &dyn Visualizer = if config.render {
        &png_visualizer
    } else {
        &NullVisualizer
    };

    let collaborators = Collaborators {
        data: &data,
        geometry: &geometry,
        clipper: &PolygonClipper,
        exporter: &exporter,
        visualizer,
    };
    let settings = RunSettings::from(&config);

    let reports = run_suitability_analysis(&config.criteria, &collaborators, &settings);

    println!();
    report::print_summary(&reports);

    if let Some(path) = &args.report {
        report::write_json(&reports, path)?;
        println!("\nReport written to {}", path.display());
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        eprintln!("{} of {} criteria failed", failed, reports.len());
        std::process::exit(1);
    }
    Ok(())
}
