//! # topo_core - Survey Traverse Computation Engine
//!
//! `topo_core` computes survey traverses and sideshots from tabular field
//! data. Inputs and outputs are plain serializable types, so a project can be
//! loaded from CSV tables or a `.tpj` JSON file and every result can be
//! exported as-is.
//!
//! ## Design Philosophy
//!
//! - **Fail closed**: an entity that doesn't validate is excluded and reported,
//!   never partially computed
//! - **Explicit state**: the station registry is a value passed between phases
//! - **Rich Errors**: structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use topo_core::calculations::TraverseKind;
//! use topo_core::project::SurveyProject;
//! use topo_core::tables::{KnownPointRow, MeasurementRow, TraverseRow};
//!
//! let mut project = SurveyProject::new("Demo");
//! project.known_points = vec![
//!     KnownPointRow::new("A", 0.0, -100.0),
//!     KnownPointRow::new("B", 0.0, 0.0),
//! ];
//! project.traverses = vec![TraverseRow::new("T1", TraverseKind::Open, "A-B-S1")];
//! project.measurements = vec![MeasurementRow::new("B", "S1", 90.0, 50.0)];
//!
//! let report = project.compute().unwrap();
//! let s1 = report.stations.get("S1").unwrap();
//! assert!((s1.easting - 50.0).abs() < 1e-9);
//! ```
//!
//! ## Modules
//!
//! - [`project`] - Project container, settings and the phase orchestrator
//! - [`calculations`] - Traverse adjustment and sideshot radiation
//! - [`points`] - Points and the station [`Container`]
//! - [`tables`] - Input table rows and CSV codecs
//! - [`geometry`] - Plane coordinate geometry
//! - [`units`] - Angle units
//! - [`errors`] - Structured error types
//! - [`file_io`] - Project files, table loading and export

pub mod calculations;
pub mod errors;
pub mod file_io;
pub mod geometry;
pub mod points;
pub mod project;
pub mod tables;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use errors::{Diagnostic, SurveyError, SurveyResult};
pub use file_io::{export_report, load_project, save_project};
pub use points::{Container, Point};
pub use project::{GlobalSettings, ProjectReport, SurveyProject};
