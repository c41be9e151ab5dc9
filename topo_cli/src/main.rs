//! # Topocalc CLI
//!
//! Command-line front end for `topo_core`.
//!
//! - `compute`: load a `.tpj` project or the four CSV tables, compute every
//!   traverse and sideshot group, print a summary and export the results.
//!   `--save` keeps the tables and settings as a `.tpj` project

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use topo_core::calculations::AngleConvention;
use topo_core::file_io::{
    export_report, load_project, load_tables, resolve_working_dir, save_project, TablePaths,
};
use topo_core::units::AngleUnit;
use topo_core::{ProjectReport, SurveyError, SurveyResult};

#[derive(Parser, Debug)]
#[command(name = "topo_cli")]
#[command(about = "Adjust survey traverses and radiate sideshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a project and export its tables
    Compute(ComputeArgs),
}

#[derive(Args, Debug)]
struct ComputeArgs {
    /// Project file (.tpj)
    #[arg(long, conflicts_with_all = ["known", "traverses", "measurements", "sideshots"])]
    project: Option<PathBuf>,

    /// Known points table (station_id,easting,northing)
    #[arg(long, required_unless_present = "project")]
    known: Option<PathBuf>,

    /// Traverse table (traverse_id,t_type,stations)
    #[arg(long, required_unless_present = "project")]
    traverses: Option<PathBuf>,

    /// Measurement table (from_station,to_station,angle,distance)
    #[arg(long, required_unless_present = "project")]
    measurements: Option<PathBuf>,

    /// Sideshot table (station,bs,target,angle,distance)
    #[arg(long)]
    sideshots: Option<PathBuf>,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Angle unit: deg or gon (overrides the project setting)
    #[arg(long)]
    unit: Option<AngleUnit>,

    /// Angle convention: deflection or backsight (overrides the project setting)
    #[arg(long)]
    convention: Option<AngleConvention>,

    /// Also write the effective project (tables and settings) to a .tpj file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print the full report as JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compute(args) => {
            init_tracing(args.verbose);
            match run_compute(&args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    report_error(&e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "topo_core=debug,topo_cli=debug"
    } else {
        "topo_core=info,topo_cli=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_compute(args: &ComputeArgs) -> SurveyResult<()> {
    let (mut project, input) = match &args.project {
        Some(path) => {
            info!(path = %path.display(), "loading project file");
            (load_project(path)?, path.clone())
        }
        None => {
            let paths = table_paths(args)?;
            info!(traverses = %paths.traverses.display(), "loading tables");
            let input = paths.traverses.clone();
            (load_tables(&paths)?, input)
        }
    };

    if let Some(unit) = args.unit {
        project.settings.angle_unit = unit;
    }
    if let Some(convention) = args.convention {
        project.settings.angle_convention = convention;
    }
    debug!(settings = ?project.settings, "effective settings");

    let out_dir = resolve_working_dir(args.out.as_deref(), &input)?;
    let report = project.compute()?;

    if let Some(path) = &args.save {
        project.touch();
        save_project(&project, path)?;
        info!(path = %path.display(), "project saved");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| SurveyError::SerializationError {
            reason: e.to_string(),
        })?;
        println!("{}", json);
    } else {
        print_summary(&report);
    }

    let written = export_report(&report, &out_dir)?;
    if !args.json {
        println!();
        println!("Exported {} files to {}", written.len(), out_dir.display());
    }
    Ok(())
}

fn table_paths(args: &ComputeArgs) -> SurveyResult<TablePaths> {
    let require = |value: &Option<PathBuf>, field: &str| -> SurveyResult<PathBuf> {
        value.clone().ok_or_else(|| SurveyError::missing_field(field))
    };
    Ok(TablePaths {
        known_points: require(&args.known, "--known")?,
        traverses: require(&args.traverses, "--traverses")?,
        measurements: require(&args.measurements, "--measurements")?,
        sideshots: args.sideshots.clone(),
    })
}

fn print_summary(report: &ProjectReport) {
    let unit = report.settings.angle_unit.symbol();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  {}  ({})", report.project, report.computed_at.format("%Y-%m-%d %H:%M UTC"));
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!(
        "{:<12} {:<16} {:>5} {:>12} {:>10} {:>10} {:>10}",
        "Traverse", "Type", "Stns", "Length", "Ang.mis", "Lin.mis", "Precision"
    );
    for m in &report.metrics {
        println!(
            "{:<12} {:<16} {:>5} {:>12.3} {:>10} {:>10} {:>10} {}",
            m.traverse_id,
            m.kind.type_name(),
            m.station_count,
            m.total_distance,
            fmt_opt(m.angular_misclosure, 4, unit),
            fmt_opt(m.linear_misclosure, 3, "m"),
            m.precision_label(),
            status_icon(m.verified),
        );
    }

    println!();
    println!("Stations:  {}", report.stations.size());
    println!(
        "Sideshots: {} points from {} groups",
        report.sideshot_count,
        report.sideshot_groups.len()
    );

    if !report.diagnostics.is_empty() {
        println!();
        println!("Diagnostics:");
        for d in &report.diagnostics {
            println!("  [{}] {}", d.error.error_code(), d);
        }
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.*}{}", decimals, v, suffix),
        None => "-".to_string(),
    }
}

fn status_icon(verified: bool) -> &'static str {
    if verified { "[OK]" } else { "" }
}

fn report_error(e: &SurveyError) {
    eprintln!("Error: {}", e);
    if let Ok(json) = serde_json::to_string_pretty(e) {
        eprintln!();
        eprintln!("Error JSON:");
        eprintln!("{}", json);
    }
}
