//! # Points
//!
//! Station coordinates and the registry that holds them.
//!
//! - [`Point`] - one station id with its easting/northing
//! - [`Container`] - id-keyed registry with an explicit duplicate-id policy
//!
//! Coordinate arithmetic (azimuths, distances, polar offsets) is kept out of
//! `Point` and lives in [`crate::geometry`].

pub mod container;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub use container::{Container, MergeConflict, MergeOutcome, MergePolicy};

/// A surveyed or known station.
///
/// Identity is the station id: two points with the same id compare equal
/// even when their coordinates differ. Use [`Point::same_position`] to
/// compare coordinates.
///
/// ## JSON Example
///
/// ```json
/// { "id": "S12", "easting": 475230.512, "northing": 4205117.904 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Station id (e.g., "S12", "T3")
    pub id: String,

    /// Easting (x) in metres
    pub easting: f64,

    /// Northing (y) in metres
    pub northing: f64,
}

impl Point {
    /// Create a new point
    pub fn new(id: impl Into<String>, easting: f64, northing: f64) -> Self {
        Point {
            id: id.into(),
            easting,
            northing,
        }
    }

    /// True when both coordinates agree within `tolerance` metres
    pub fn same_position(&self, other: &Point, tolerance: f64) -> bool {
        (self.easting - other.easting).abs() <= tolerance
            && (self.northing - other.northing).abs() <= tolerance
    }

    /// Copy of this point rounded to `decimals` places (for export)
    pub fn rounded(&self, decimals: u32) -> Point {
        Point::new(
            self.id.clone(),
            round_to(self.easting, decimals),
            round_to(self.northing, decimals),
        )
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Point {}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
