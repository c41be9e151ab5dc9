//! # File I/O Module
//!
//! The thin layer between files and the computation:
//!
//! - **Project files**: `.tpj` JSON with atomic saves and version checks
//! - **Tables**: the four input tables as CSV files
//! - **Export**: coordinate, metrics and station tables as CSV, rounded to
//!   the project's `output_decimals`, plus the full report as JSON
//! - **Working directory**: where outputs go when no directory is given
//!
//! ## Example
//!
//! ```rust,no_run
//! use topo_core::file_io::{export_report, load_project, resolve_working_dir};
//! use std::path::Path;
//!
//! let path = Path::new("survey/parcel17.tpj");
//! let project = load_project(path)?;
//! let report = project.compute()?;
//!
//! let out = resolve_working_dir(None, path)?;
//! export_report(&report, &out)?;
//! # Ok::<(), topo_core::errors::SurveyError>(())
//! ```

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::calculations::traverse::{LegRow, TraverseMetrics};
use crate::errors::{SurveyError, SurveyResult};
use crate::points::{round_to, Container};
use crate::project::{ProjectReport, SurveyProject, SCHEMA_VERSION};
use crate::tables::{read_csv, write_csv, KnownPointRow};

/// Save a project to a file with atomic write semantics.
///
/// The save process:
/// 1. Serialize project to JSON
/// 2. Write to a temporary file (.tmp)
/// 3. Sync to disk (fsync)
/// 4. Rename .tmp over the target (atomic on most filesystems)
pub fn save_project(project: &SurveyProject, path: &Path) -> SurveyResult<()> {
    let json = serde_json::to_string_pretty(project).map_err(|e| SurveyError::SerializationError {
        reason: e.to_string(),
    })?;
    write_atomic(path, json.as_bytes())
}

/// Load a project from a file.
///
/// # Returns
///
/// * `Ok(SurveyProject)` - Successfully loaded project
/// * `Err(SurveyError::VersionMismatch)` - File version is incompatible
/// * `Err(SurveyError::SerializationError)` - Invalid JSON
/// * `Err(SurveyError::FileError)` - I/O error
pub fn load_project(path: &Path) -> SurveyResult<SurveyProject> {
    let contents = read_to_string(path)?;

    let project: SurveyProject =
        serde_json::from_str(&contents).map_err(|e| SurveyError::SerializationError {
            reason: format!("Invalid JSON in {}: {}", path.display(), e),
        })?;

    validate_version(&project.meta.version)?;

    Ok(project)
}

/// Read one input table from a CSV file.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> SurveyResult<Vec<T>> {
    let file = File::open(path).map_err(|e| {
        SurveyError::file_error("open", path.display().to_string(), e.to_string())
    })?;
    read_csv(file).map_err(|e| match e {
        SurveyError::SerializationError { reason } => SurveyError::SerializationError {
            reason: format!("{}: {}", path.display(), reason),
        },
        other => other,
    })
}

/// Paths of the CSV input tables
#[derive(Debug, Clone)]
pub struct TablePaths {
    pub known_points: PathBuf,
    pub traverses: PathBuf,
    pub measurements: PathBuf,
    pub sideshots: Option<PathBuf>,
}

/// Build a project from CSV tables.
///
/// The project is named after the directory holding the traverse table.
pub fn load_tables(paths: &TablePaths) -> SurveyResult<SurveyProject> {
    let name = paths
        .traverses
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut project = SurveyProject::new(name);
    project.known_points = read_table(&paths.known_points)?;
    project.traverses = read_table(&paths.traverses)?;
    project.measurements = read_table(&paths.measurements)?;
    if let Some(sideshots) = &paths.sideshots {
        project.sideshots = read_table(sideshots)?;
    }
    Ok(project)
}

/// Directory that outputs are written to.
///
/// An explicit directory wins. Otherwise the input path is used if it is a
/// directory, or its parent if it is a file.
pub fn resolve_working_dir(explicit: Option<&Path>, input: &Path) -> SurveyResult<PathBuf> {
    if let Some(dir) = explicit {
        if dir.exists() && !dir.is_dir() {
            return Err(SurveyError::configuration(format!(
                "output path '{}' exists and is not a directory",
                dir.display()
            )));
        }
        return Ok(dir.to_path_buf());
    }
    if input.is_dir() {
        return Ok(input.to_path_buf());
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        Some(_) => Ok(PathBuf::from(".")),
        None => Err(SurveyError::configuration(format!(
            "working directory can't be inferred from '{}'; provide an output directory",
            input.display()
        ))),
    }
}

/// Metrics table row as exported
#[derive(Debug, Clone, Serialize)]
struct MetricsRow {
    traverse_id: String,
    t_type: &'static str,
    station_count: usize,
    total_distance: f64,
    angular_misclosure: Option<f64>,
    linear_misclosure: Option<f64>,
    misclosure_easting: Option<f64>,
    misclosure_northing: Option<f64>,
    precision_ratio: Option<f64>,
    precision: String,
    verified: bool,
}

impl MetricsRow {
    fn new(m: &TraverseMetrics, decimals: u32) -> Self {
        let r = |v: Option<f64>| v.map(|x| round_to(x, decimals));
        MetricsRow {
            traverse_id: m.traverse_id.clone(),
            t_type: m.kind.type_name(),
            station_count: m.station_count,
            total_distance: round_to(m.total_distance, decimals),
            angular_misclosure: r(m.angular_misclosure),
            linear_misclosure: r(m.linear_misclosure),
            misclosure_easting: r(m.misclosure_easting),
            misclosure_northing: r(m.misclosure_northing),
            // ratios are small numbers; keep them unrounded
            precision_ratio: m.precision_ratio,
            precision: m.precision_label(),
            verified: m.verified,
        }
    }
}

fn rounded_leg(leg: &LegRow, decimals: u32) -> LegRow {
    let r = |v: f64| round_to(v, decimals);
    LegRow {
        from: leg.from.clone(),
        to: leg.to.clone(),
        angle: leg.angle,
        azimuth: r(leg.azimuth),
        distance: leg.distance,
        departure: leg.departure.map(r),
        latitude: leg.latitude.map(r),
        correction_easting: r(leg.correction_easting),
        correction_northing: r(leg.correction_northing),
        easting: r(leg.easting),
        northing: r(leg.northing),
    }
}

fn station_rows(points: &Container, decimals: u32) -> Vec<KnownPointRow> {
    points
        .sorted()
        .into_iter()
        .map(|p| {
            let p = p.rounded(decimals);
            KnownPointRow::new(p.id, p.easting, p.northing)
        })
        .collect()
}

/// Write every output table of a report into `dir`.
///
/// Files written:
/// - `Project_Traverses_<traverse_id>.csv` - one per computed traverse
/// - `Project_Metrics.csv`
/// - `Project_Stations.csv`
/// - `Project_Sideshots.csv`
/// - `Project_Report.json`
///
/// Returns the paths written, in that order.
pub fn export_report(report: &ProjectReport, dir: &Path) -> SurveyResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| {
        SurveyError::file_error("create directory", dir.display().to_string(), e.to_string())
    })?;
    let decimals = report.settings.output_decimals;
    let mut written = Vec::new();

    let stems = traverse_file_stems(report.traverses.iter().map(|t| t.metrics.traverse_id.as_str()));
    for (traverse, stem) in report.traverses.iter().zip(stems) {
        let rows: Vec<LegRow> = traverse.legs.iter().map(|l| rounded_leg(l, decimals)).collect();
        let path = dir.join(format!("Project_Traverses_{}.csv", stem));
        write_table(&path, &rows)?;
        written.push(path);
    }

    let metrics: Vec<MetricsRow> = report.metrics.iter().map(|m| MetricsRow::new(m, decimals)).collect();
    let path = dir.join("Project_Metrics.csv");
    write_table(&path, &metrics)?;
    written.push(path);

    let path = dir.join("Project_Stations.csv");
    write_table(&path, &station_rows(&report.stations, decimals))?;
    written.push(path);

    let path = dir.join("Project_Sideshots.csv");
    write_table(&path, &station_rows(&report.sideshots, decimals))?;
    written.push(path);

    let json = serde_json::to_string_pretty(report).map_err(|e| SurveyError::SerializationError {
        reason: e.to_string(),
    })?;
    let path = dir.join("Project_Report.json");
    write_atomic(&path, json.as_bytes())?;
    written.push(path);

    info!(dir = %dir.display(), files = written.len(), "report exported");
    Ok(written)
}

/// Serialize rows to a CSV file via a temp file
fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> SurveyResult<()> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rows)?;
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> SurveyResult<()> {
    let tmp_path = tmp_path_for(path);

    let mut tmp_file = File::create(&tmp_path).map_err(|e| {
        SurveyError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.write_all(bytes).map_err(|e| {
        SurveyError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.sync_all().map_err(|e| {
        SurveyError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SurveyError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    Ok(())
}

/// `name.ext` -> `name.ext.tmp`
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn read_to_string(path: &Path) -> SurveyResult<String> {
    let mut file = File::open(path).map_err(|e| {
        SurveyError::file_error("open", path.display().to_string(), e.to_string())
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|e| {
        SurveyError::file_error("read", path.display().to_string(), e.to_string())
    })?;
    Ok(contents)
}

/// Keep traverse ids usable as part of a file name
fn sanitize_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// One file stem per traverse, unique even when ids sanitize to the same
/// text or differ only by case. A clash gets the traverse's position appended.
fn traverse_file_stems<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    let mut stems = Vec::new();
    for (i, id) in ids.enumerate() {
        let mut stem = sanitize_file_stem(id);
        while !used.insert(stem.to_ascii_lowercase()) {
            stem = format!("{}_{}", stem, i + 1);
        }
        stems.push(stem);
    }
    stems
}

/// Validate that a file version is compatible with the current schema.
fn validate_version(file_version: &str) -> SurveyResult<()> {
    let file_parts: Vec<u32> = file_version
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();
    let current_parts: Vec<u32> = SCHEMA_VERSION
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect();

    let mismatch = || SurveyError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    if file_parts.is_empty() || current_parts.is_empty() {
        return Err(mismatch());
    }

    // Major version must match
    if file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    // For 0.x versions a newer minor version may carry breaking changes
    if current_parts[0] == 0
        && file_parts.len() > 1
        && current_parts.len() > 1
        && file_parts[1] > current_parts[1]
    {
        return Err(mismatch());
    }

    Ok(())
}
