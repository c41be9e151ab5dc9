//! # Survey Project
//!
//! `SurveyProject` holds the four input tables and the settings, and runs
//! the computation in declared phases:
//!
//! ```text
//! Known_Points ──► Container ──► Phase::Traverses ──► Container' ──► Phase::Sideshots
//!                                  (declaration order)                (grouped by station/backsight)
//! ```
//!
//! Each phase takes the station registry as an input and hands back an
//! updated one, so a later traverse may start on stations computed by an
//! earlier traverse and every sideshot group sees all traverse results.
//! Entities that fail validation are reported as [`Diagnostic`]s; the batch
//! always runs to the end.
//!
//! Projects serialize to `.tpj` files as human-readable JSON.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::project::SurveyProject;
//! use topo_core::calculations::TraverseKind;
//! use topo_core::tables::{KnownPointRow, MeasurementRow, SideshotRow, TraverseRow};
//!
//! let mut project = SurveyProject::new("Demo");
//! project.known_points = vec![
//!     KnownPointRow::new("A", 0.0, -100.0),
//!     KnownPointRow::new("B", 0.0, 0.0),
//! ];
//! project.traverses = vec![TraverseRow::new("T1", TraverseKind::Open, "A-B-S1")];
//! project.measurements = vec![MeasurementRow::new("B", "S1", 90.0, 25.0)];
//! project.sideshots = vec![SideshotRow::new("S1", "B", "P1", 0.0, 5.0)];
//!
//! let report = project.compute().unwrap();
//! assert!(report.stations.contains("S1"));
//! assert_eq!(report.sideshot_count, 1);
//! assert!(report.diagnostics.is_empty());
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calculations::sideshot::{group_rows, SideshotGroup, SideshotResult};
use crate::calculations::traverse::{LegTable, Traverse, TraverseMetrics, TraverseResult};
use crate::calculations::AngleConvention;
use crate::errors::{Diagnostic, EntityRef, SurveyError, SurveyResult};
use crate::points::container::DEFAULT_COORDINATE_TOLERANCE;
use crate::points::{Container, MergePolicy};
use crate::tables::{KnownPointRow, MeasurementRow, SideshotRow, TraverseRow};
use crate::units::AngleUnit;

/// Current schema version for .tpj files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Root project container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyProject {
    /// Project metadata (version, name, timestamps)
    pub meta: ProjectMetadata,

    /// Angle handling and merge settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// `Known_Points` table
    pub known_points: Vec<KnownPointRow>,

    /// `Traverses` table, computed in this order
    #[serde(default)]
    pub traverses: Vec<TraverseRow>,

    /// `Traverse_Measurements` table
    #[serde(default)]
    pub measurements: Vec<MeasurementRow>,

    /// Sideshot observations
    #[serde(default)]
    pub sideshots: Vec<SideshotRow>,
}

impl SurveyProject {
    /// Create a new empty project.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        SurveyProject {
            meta: ProjectMetadata {
                version: SCHEMA_VERSION.to_string(),
                name: name.into(),
                surveyor: String::new(),
                created: now,
                modified: now,
            },
            settings: GlobalSettings::default(),
            known_points: Vec::new(),
            traverses: Vec::new(),
            measurements: Vec::new(),
            sideshots: Vec::new(),
        }
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }

    /// The control registry built from `Known_Points`.
    pub fn control(&self) -> SurveyResult<Container> {
        Container::from_records(&self.known_points)
    }

    /// Run every phase and collect the results.
    ///
    /// # Returns
    ///
    /// * `Ok(ProjectReport)` - results plus per-entity diagnostics
    /// * `Err(SurveyError)` - only when the settings or the control table
    ///   itself are unusable
    pub fn compute(&self) -> SurveyResult<ProjectReport> {
        self.settings.validate()?;
        let mut stations = self.control()?;
        info!(
            project = %self.meta.name,
            control = stations.size(),
            traverses = self.traverses.len(),
            sideshots = self.sideshots.len(),
            "computing project"
        );

        let mut traverses = Vec::new();
        let mut sideshots = SideshotPhase::default();
        let mut diagnostics = Vec::new();
        for phase in Phase::ORDER {
            match phase {
                Phase::Traverses => {
                    let out = self.run_traverses(stations);
                    stations = out.stations;
                    traverses = out.results;
                    diagnostics.extend(out.diagnostics);
                }
                Phase::Sideshots => {
                    sideshots = self.run_sideshots(&stations);
                    stations = std::mem::take(&mut sideshots.stations);
                    diagnostics.append(&mut sideshots.diagnostics);
                }
            }
        }

        let metrics = traverses.iter().map(|t| t.metrics.clone()).collect();
        Ok(ProjectReport {
            project: self.meta.name.clone(),
            computed_at: Utc::now(),
            settings: self.settings.clone(),
            stations,
            traverses,
            metrics,
            sideshot_count: sideshots.points.size(),
            sideshots: sideshots.points,
            sideshot_groups: sideshots.results,
            diagnostics,
        })
    }

    /// Traverse phase: compute every traverse in declaration order.
    ///
    /// Each traverse resolves its anchors against the registry as it stands
    /// after the traverses before it; its points are merged back in with the
    /// project's [`MergePolicy`].
    pub fn run_traverses(&self, stations: Container) -> TraversePhase {
        let legs = LegTable::from_rows(&self.measurements);
        let policy = self.settings.merge_policy;
        let tolerance = self.settings.coordinate_tolerance;

        let mut stations = stations;
        let mut results: Vec<TraverseResult> = Vec::new();
        let mut diagnostics = Vec::new();
        let mut seen = HashSet::new();

        for row in &self.traverses {
            let entity = EntityRef::Traverse {
                id: row.traverse_id.clone(),
            };
            let exclude = |error: SurveyError, diagnostics: &mut Vec<Diagnostic>| {
                warn!(traverse = %row.traverse_id, code = error.error_code(), "traverse excluded: {}", error);
                diagnostics.push(Diagnostic::new(entity.clone(), Phase::Traverses, error));
            };

            if !seen.insert(row.traverse_id.as_str()) {
                exclude(
                    SurveyError::invalid_input("traverse_id", row.traverse_id.as_str(), "Duplicate traverse id"),
                    &mut diagnostics,
                );
                continue;
            }

            let traverse = Traverse::from_row(row, &legs, &stations);
            let result = match traverse.compute(&self.settings) {
                Ok(result) => result,
                Err(e) => {
                    exclude(e, &mut diagnostics);
                    continue;
                }
            };

            match stations.merge(&result.points, policy, tolerance) {
                Ok(outcome) => {
                    for conflict in outcome.conflicts {
                        warn!(
                            traverse = %row.traverse_id,
                            station = conflict.id(),
                            separation = conflict.separation(),
                            "station already registered with different coordinates"
                        );
                        diagnostics.push(Diagnostic::resolved(entity.clone(), Phase::Traverses, conflict.into_error()));
                    }
                    stations = outcome.container;
                    results.push(result);
                }
                Err(e) => exclude(e, &mut diagnostics),
            }
        }

        info!(
            computed = results.len(),
            excluded = self.traverses.len() - results.len(),
            stations = stations.size(),
            "traverse phase complete"
        );
        TraversePhase {
            stations,
            results,
            diagnostics,
        }
    }

    /// Sideshot phase: radiate every `(station, backsight)` group.
    ///
    /// Groups resolve their station and backsight in `stations` only;
    /// radiated points are detail points and never serve as setups.
    ///
    /// A target that reuses a registered station id is merged against that
    /// station under the project's [`MergePolicy`]: `KeepExisting` drops the
    /// radiated copy, `Replace` moves the station, `Reject` excludes the
    /// group. Either way the returned registry and sideshot points agree.
    pub fn run_sideshots(&self, stations: &Container) -> SideshotPhase {
        let policy = self.settings.merge_policy;
        let tolerance = self.settings.coordinate_tolerance;

        let mut registry = stations.clone();
        let mut points = Container::new();
        let mut results = Vec::new();
        let mut diagnostics = Vec::new();

        for ((station, backsight), observations) in group_rows(&self.sideshots) {
            let entity = EntityRef::SideshotGroup {
                station: station.clone(),
                backsight: backsight.clone(),
            };
            let exclude = |error: SurveyError, diagnostics: &mut Vec<Diagnostic>| {
                warn!(group = %entity, code = error.error_code(), "sideshot group excluded: {}", error);
                diagnostics.push(Diagnostic::new(entity.clone(), Phase::Sideshots, error));
            };

            let group = SideshotGroup::new(station, backsight, observations, stations);
            let result = match group.compute(&self.settings) {
                Ok(result) => result,
                Err(e) => {
                    exclude(e, &mut diagnostics);
                    continue;
                }
            };

            // targets named like registered stations
            let collisions = Container::from_points(
                result.points.iter().filter(|p| registry.contains(&p.id)).cloned(),
            );
            let checked = match registry.merge(&collisions, policy, tolerance) {
                Ok(outcome) => outcome,
                Err(e) => {
                    exclude(e, &mut diagnostics);
                    continue;
                }
            };
            let accepted = Container::from_points(
                result
                    .points
                    .iter()
                    .filter(|p| match checked.container.find(&p.id) {
                        Some(held) if collisions.contains(&p.id) => held.same_position(p, tolerance),
                        _ => true,
                    })
                    .cloned(),
            );

            let merged = match points.merge(&accepted, policy, tolerance) {
                Ok(outcome) => outcome,
                Err(e) => {
                    exclude(e, &mut diagnostics);
                    continue;
                }
            };

            for conflict in &checked.conflicts {
                warn!(group = %entity, station = conflict.id(), "sideshot target reuses a station id");
            }
            for conflict in result.conflicts.iter().chain(&merged.conflicts) {
                warn!(group = %entity, target = conflict.id(), "sideshot target observed twice");
            }
            diagnostics.extend(
                checked
                    .conflicts
                    .into_iter()
                    .chain(result.conflicts.iter().cloned())
                    .chain(merged.conflicts)
                    .map(|c| Diagnostic::resolved(entity.clone(), Phase::Sideshots, c.into_error())),
            );
            registry = checked.container;
            points = merged.container;
            results.push(result);
        }

        let points = points.into_sorted();
        info!(groups = results.len(), points = points.size(), "sideshot phase complete");
        SideshotPhase {
            stations: registry,
            points,
            results,
            diagnostics,
        }
    }
}

impl Default for SurveyProject {
    fn default() -> Self {
        SurveyProject::new("")
    }
}

/// Computation phases, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Traverses,
    Sideshots,
}

impl Phase {
    /// Execution order. Sideshots orient on stations that traverses produce.
    pub const ORDER: [Phase; 2] = [Phase::Traverses, Phase::Sideshots];

    /// The phase whose output this phase reads
    pub fn depends_on(self) -> Option<Phase> {
        match self {
            Phase::Traverses => None,
            Phase::Sideshots => Some(Phase::Traverses),
        }
    }
}

/// Output of [`SurveyProject::run_traverses`]
#[derive(Debug, Clone, Default)]
pub struct TraversePhase {
    /// Registry after merging every computed traverse
    pub stations: Container,
    pub results: Vec<TraverseResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of [`SurveyProject::run_sideshots`]
#[derive(Debug, Clone, Default)]
pub struct SideshotPhase {
    /// Registry after sideshot targets were checked against it
    pub stations: Container,
    /// All radiated points, sorted by id
    pub points: Container,
    pub results: Vec<SideshotResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything a project computation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project: String,
    pub computed_at: DateTime<Utc>,
    pub settings: GlobalSettings,
    /// Control plus every traverse station
    pub stations: Container,
    pub traverses: Vec<TraverseResult>,
    /// One row per computed traverse
    pub metrics: Vec<TraverseMetrics>,
    /// Radiated points, sorted by id
    pub sideshots: Container,
    pub sideshot_count: usize,
    pub sideshot_groups: Vec<SideshotResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProjectReport {
    pub fn computed_traverse_count(&self) -> usize {
        self.traverses.len()
    }

    /// Diagnostics that excluded an entity, as opposed to resolved merges
    pub fn excluded(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.resolved)
    }
}

/// Project metadata stored in the file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    /// Project name
    pub name: String,

    /// Responsible surveyor
    #[serde(default)]
    pub surveyor: String,

    /// When the project was created
    pub created: DateTime<Utc>,

    /// When the project was last modified
    pub modified: DateTime<Utc>,
}

/// Global project settings.
///
/// ## JSON Example
///
/// ```json
/// {
///   "angle_unit": "Gons",
///   "angle_convention": "Backsight",
///   "merge_policy": "KeepExisting",
///   "coordinate_tolerance": 0.000001,
///   "output_decimals": 4
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Unit of recorded angles and reported azimuths
    pub angle_unit: AngleUnit,

    /// How recorded angles relate incoming and outgoing lines
    pub angle_convention: AngleConvention,

    /// Duplicate station id policy for registry merges
    pub merge_policy: MergePolicy,

    /// Coordinates closer than this (m) are the same position
    pub coordinate_tolerance: f64,

    /// Decimal places in exported tables
    pub output_decimals: u32,
}

impl GlobalSettings {
    /// Reject settings the computation cannot work with.
    pub fn validate(&self) -> SurveyResult<()> {
        if !self.coordinate_tolerance.is_finite() || self.coordinate_tolerance < 0.0 {
            return Err(SurveyError::configuration(format!(
                "coordinate_tolerance must be a non-negative number, got {}",
                self.coordinate_tolerance
            )));
        }
        if self.output_decimals > 12 {
            return Err(SurveyError::configuration(format!(
                "output_decimals must be at most 12, got {}",
                self.output_decimals
            )));
        }
        Ok(())
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            angle_unit: AngleUnit::Degrees,
            angle_convention: AngleConvention::Deflection,
            merge_policy: MergePolicy::KeepExisting,
            coordinate_tolerance: DEFAULT_COORDINATE_TOLERANCE,
            output_decimals: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::TraverseKind;
    use crate::geometry::azimuth;
    use crate::points::Point;
    use crate::units::Degrees;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    /// Link traverse B -> S1 -> S2 -> E between lines A-B and E-F.
    fn link_project() -> SurveyProject {
        let mut project = SurveyProject::new("Link");
        project.known_points = vec![
            KnownPointRow::new("A", 0.0, -100.0),
            KnownPointRow::new("B", 0.0, 0.0),
            KnownPointRow::new("E", 100.0, 0.0),
            KnownPointRow::new("F", 100.0, -100.0),
        ];
        project.traverses = vec![TraverseRow::new("T1", TraverseKind::Link, "A-B-S1-S2-E-F")];
        project.measurements = vec![
            MeasurementRow::new("B", "S1", 0.0, 100.0),
            MeasurementRow::new("S1", "S2", 90.0, 100.02),
            MeasurementRow::new("S2", "E", 90.0, 100.0),
            MeasurementRow::new("E", "F", 0.0, 0.0),
        ];
        project
    }

    #[test]
    fn test_project_creation() {
        let project = SurveyProject::new("Parcel 17");
        assert_eq!(project.meta.name, "Parcel 17");
        assert_eq!(project.meta.version, SCHEMA_VERSION);
        assert_eq!(project.settings, GlobalSettings::default());
    }

    #[test]
    fn test_project_serialization() {
        let project = link_project();
        let json = serde_json::to_string_pretty(&project).unwrap();
        assert!(json.contains("LinkTraverse"));
        assert!(json.contains("A-B-S1-S2-E-F"));

        let roundtrip: SurveyProject = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.measurements, project.measurements);
    }

    #[test]
    fn test_settings_default_when_missing() {
        let json = r#"{
            "meta": {"version": "0.1.0", "name": "x",
                     "created": "2024-01-01T00:00:00Z", "modified": "2024-01-01T00:00:00Z"},
            "known_points": [],
            "settings": {"angle_unit": "Gons"}
        }"#;
        let project: SurveyProject = serde_json::from_str(json).unwrap();
        assert_eq!(project.settings.angle_unit, AngleUnit::Gons);
        assert_eq!(project.settings.output_decimals, 4);
        assert!(project.traverses.is_empty());
    }

    #[test]
    fn test_invalid_settings_are_configuration_errors() {
        let mut project = link_project();
        project.settings.coordinate_tolerance = -1.0;
        let err = project.compute().unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_compute_link_project() {
        let report = link_project().compute().unwrap();
        assert_eq!(report.computed_traverse_count(), 1);
        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.stations.size(), 6);
        assert!(report.diagnostics.is_empty());
        assert!(approx_eq(report.metrics[0].linear_misclosure.unwrap(), 0.02, 1e-9));
    }

    #[test]
    fn test_invalid_traverse_excluded_from_metrics() {
        let mut project = link_project();
        project
            .traverses
            .push(TraverseRow::new("T2", TraverseKind::Open, "B-S1-X1"));

        let report = project.compute().unwrap();
        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.metrics[0].traverse_id, "T1");
        assert_eq!(report.diagnostics.len(), 1);
        let diag = &report.diagnostics[0];
        assert_eq!(diag.entity, EntityRef::Traverse { id: "T2".to_string() });
        assert_eq!(diag.phase, Phase::Traverses);
        assert_eq!(diag.error, SurveyError::missing_leg("S1", "X1"));
        assert!(!report.stations.contains("X1"));
    }

    #[test]
    fn test_later_traverse_anchors_on_earlier_result() {
        let mut project = link_project();
        project
            .traverses
            .push(TraverseRow::new("T2", TraverseKind::Open, "S1-S2-X1"));
        project.measurements.push(MeasurementRow::new("S2", "X1", 0.0, 10.0));

        let report = project.compute().unwrap();
        assert_eq!(report.metrics.len(), 2);
        let s2 = report.stations.get("S2").unwrap();
        let x1 = report.stations.get("X1").unwrap();
        let heading = Degrees::from(azimuth(s2, x1)).0;
        let anchor = Degrees::from(azimuth(report.stations.get("S1").unwrap(), s2)).0;
        assert!(approx_eq(heading, anchor, 1e-9));

        // declared before its anchors exist: excluded, not guessed
        project.traverses.reverse();
        let report = project.compute().unwrap();
        assert_eq!(report.metrics.len(), 1);
        assert!(matches!(
            report.diagnostics[0].error,
            SurveyError::UnresolvedAnchor { .. }
        ));
    }

    #[test]
    fn test_adjusted_stations_feed_dependent_link_traverse() {
        let first = link_project().compute().unwrap();

        // second project uses the first one's output as its control
        let mut second = SurveyProject::new("Dependent");
        second.known_points = first
            .stations
            .iter()
            .map(|p| KnownPointRow::new(p.id.clone(), p.easting, p.northing))
            .collect();
        let control = second.control().unwrap();
        let s1 = control.get("S1").unwrap().clone();
        let s2 = control.get("S2").unwrap().clone();
        let e = control.get("E").unwrap().clone();
        let f = control.get("F").unwrap().clone();

        // shared anchor azimuth is carried over unchanged
        let before = azimuth(first.stations.get("S1").unwrap(), first.stations.get("S2").unwrap());
        assert!(approx_eq(azimuth(&s1, &s2).0, before.0, 1e-12));

        // observations generated from the adjusted coordinates
        let y = Point::new("Y", s2.easting + 50.0, s2.northing);
        let deg = |from: &Point, to: &Point| Degrees::from(azimuth(from, to)).0;
        let turn = |incoming: f64, outgoing: f64| (outgoing - incoming).rem_euclid(360.0);
        second.traverses = vec![TraverseRow::new("T2", TraverseKind::Link, "S1-S2-Y-E-F")];
        second.measurements = vec![
            MeasurementRow::new("S2", "Y", turn(deg(&s1, &s2), deg(&s2, &y)), 50.0),
            MeasurementRow::new(
                "Y",
                "E",
                turn(deg(&s2, &y), deg(&y, &e)),
                crate::geometry::distance(&y, &e),
            ),
            MeasurementRow::new("E", "F", turn(deg(&y, &e), deg(&e, &f)), 0.0),
        ];

        let report = second.compute().unwrap();
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        let m = &report.metrics[0];
        assert!(approx_eq(m.angular_misclosure.unwrap(), 0.0, 1e-9));
        assert!(approx_eq(m.linear_misclosure.unwrap(), 0.0, 1e-9));
        let y_out = report.stations.get("Y").unwrap();
        assert!(y_out.same_position(&y, 1e-9));
    }

    #[test]
    fn test_sideshots_use_traverse_stations() {
        let mut project = link_project();
        project.sideshots = vec![
            // from S2 oriented on S1, same angle/distance as the S2 -> E leg
            SideshotRow::new("S2", "S1", "P2", 90.0, 100.0),
            SideshotRow::new("S2", "S1", "P1", 0.0, 10.0),
            SideshotRow::new("Q9", "S1", "P3", 0.0, 10.0),
        ];

        let report = project.compute().unwrap();
        assert_eq!(report.sideshot_count, 2);
        let ids: Vec<_> = report.sideshots.ids().collect();
        assert_eq!(ids, vec!["P1", "P2"]);

        let s2 = report.stations.get("S2").unwrap();
        let p2 = report.sideshots.get("P2").unwrap();
        assert!(approx_eq(p2.easting, s2.easting, 1e-9));
        assert!(approx_eq(p2.northing, s2.northing - 100.0, 1e-9));

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].phase, Phase::Sideshots);
        assert_eq!(report.diagnostics[0].error, SurveyError::unknown_station("Q9"));
    }

    #[test]
    fn test_sideshot_groups_merge_first_wins() {
        let mut project = link_project();
        project.sideshots = vec![
            SideshotRow::new("S1", "B", "P1", 90.0, 10.0),
            SideshotRow::new("S2", "S1", "P1", 0.0, 10.0),
        ];
        let report = project.compute().unwrap();
        assert_eq!(report.sideshot_count, 1);
        assert_eq!(report.excluded().count(), 0);
        assert_eq!(report.diagnostics.len(), 1);
        // group (S1, B) sorts first and keeps P1
        let p1 = report.sideshots.get("P1").unwrap();
        let s1 = report.stations.get("S1").unwrap();
        assert!(approx_eq(p1.easting, s1.easting + 10.0, 1e-6));
    }

    #[test]
    fn test_sideshot_target_reusing_station_id() {
        let mut project = link_project();
        project.sideshots = vec![
            SideshotRow::new("S2", "S1", "E", 0.0, 10.0),
            SideshotRow::new("S2", "S1", "P1", 90.0, 5.0),
        ];

        // default: the station stands, the radiated copy is dropped
        let report = project.compute().unwrap();
        let e = report.stations.get("E").unwrap();
        assert_eq!((e.easting, e.northing), (100.0, 0.0));
        assert!(!report.sideshots.contains("E"));
        assert!(report.sideshots.contains("P1"));
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].resolved);
        assert!(matches!(
            &report.diagnostics[0].error,
            SurveyError::DuplicateStation { station, .. } if station == "E"
        ));

        // reject: the whole group is excluded
        project.settings.merge_policy = MergePolicy::Reject;
        let report = project.compute().unwrap();
        assert_eq!(report.sideshot_count, 0);
        assert_eq!(report.sideshot_groups.len(), 0);
        assert_eq!(report.excluded().count(), 1);
        assert!(matches!(report.diagnostics[0].error, SurveyError::DuplicateStation { .. }));
        assert_eq!(report.stations.get("E").unwrap().easting, 100.0);

        // replace: the station takes the radiated coordinate, both tables agree
        project.settings.merge_policy = MergePolicy::Replace;
        let report = project.compute().unwrap();
        let station = report.stations.get("E").unwrap();
        let radiated = report.sideshots.get("E").unwrap();
        assert!(station.same_position(radiated, 1e-12));
        assert!(station.easting > 105.0);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_duplicate_traverse_id_after_excluded_row() {
        let mut project = link_project();
        project.traverses = vec![
            TraverseRow::new("T1", TraverseKind::Open, "B-S1-X1"),
            TraverseRow::new("T1", TraverseKind::Link, "A-B-S1-S2-E-F"),
        ];

        let report = project.compute().unwrap();
        assert_eq!(report.metrics.len(), 0);
        assert_eq!(report.diagnostics.len(), 2);
        assert!(matches!(report.diagnostics[0].error, SurveyError::UnresolvedAnchor { .. }));
        assert!(matches!(
            &report.diagnostics[1].error,
            SurveyError::InvalidInput { field, .. } if field == "traverse_id"
        ));
    }

    #[test]
    fn test_bad_control_fails_project() {
        let mut project = link_project();
        project.known_points.push(KnownPointRow::new("A", 5.0, 5.0));
        assert!(matches!(project.compute(), Err(SurveyError::DuplicateStation { .. })));
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(Phase::ORDER[0], Phase::Traverses);
        assert_eq!(Phase::Sideshots.depends_on(), Some(Phase::Traverses));
        assert_eq!(Phase::Traverses.depends_on(), None);
    }
}
