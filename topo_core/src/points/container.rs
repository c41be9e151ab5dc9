//! # Station Container
//!
//! An id-keyed registry of [`Point`]s. Iteration follows insertion order;
//! [`Container::sorted`] gives the id order used for reports.
//!
//! ## Duplicate ids
//!
//! A station id maps to exactly one point. When two registries are merged
//! and both hold the same id:
//!
//! - coordinates equal within the tolerance: not a conflict, one copy kept
//! - otherwise the [`MergePolicy`] decides, and the conflict is reported in
//!   [`MergeOutcome::conflicts`]
//!
//! [`Container::union`] always uses [`MergePolicy::KeepExisting`]: a station
//! that is already registered is never moved by a later result.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::points::{Container, Point};
//!
//! let control = Container::from_points(vec![
//!     Point::new("K1", 1000.0, 5000.0),
//!     Point::new("K2", 1100.0, 5000.0),
//! ]);
//! let computed = Container::from_points(vec![
//!     Point::new("K2", 1100.5, 5000.5),
//!     Point::new("S1", 1050.0, 5080.0),
//! ]);
//!
//! let merged = control.union(&computed);
//! assert_eq!(merged.size(), 3);
//! assert_eq!(merged.get("K2").unwrap().easting, 1100.0);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Point;
use crate::errors::{SurveyError, SurveyResult};
use crate::tables::KnownPointRow;

/// Default tolerance (metres) below which two coordinates for the same id
/// are considered identical.
pub const DEFAULT_COORDINATE_TOLERANCE: f64 = 1e-6;

/// What to do when a merge brings a second, different coordinate for an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// First wins: the point already in the registry is kept
    #[default]
    KeepExisting,
    /// Last wins: the incoming point replaces the registered one
    Replace,
    /// Conflict is an error
    Reject,
}

/// A duplicate id whose coordinates disagreed during a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConflict {
    /// The point that ended up in the merged registry
    pub kept: Point,
    /// The point that was dropped
    pub discarded: Point,
}

impl MergeConflict {
    /// Station id the conflict is about
    pub fn id(&self) -> &str {
        &self.kept.id
    }

    /// Planar separation between the two candidate coordinates
    pub fn separation(&self) -> f64 {
        (self.kept.easting - self.discarded.easting)
            .hypot(self.kept.northing - self.discarded.northing)
    }

    pub fn into_error(self) -> SurveyError {
        SurveyError::DuplicateStation {
            station: self.kept.id,
            existing_e: self.kept.easting,
            existing_n: self.kept.northing,
            incoming_e: self.discarded.easting,
            incoming_n: self.discarded.northing,
        }
    }
}

/// Result of [`Container::merge`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub container: Container,
    pub conflicts: Vec<MergeConflict>,
}

/// Id-keyed point registry.
///
/// Serializes as a plain JSON array of points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Container {
    points: Vec<Point>,
    index: HashMap<String, usize>,
}

impl Container {
    /// Create an empty registry
    pub fn new() -> Self {
        Container::default()
    }

    /// Build a registry from points; a repeated id keeps its first occurrence.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut container = Container::new();
        for point in points {
            container.insert(point);
        }
        container
    }

    /// Build the control registry from `Known_Points` rows.
    ///
    /// Control coordinates must be finite, and a station listed twice must
    /// be listed with the same coordinates.
    pub fn from_records(rows: &[KnownPointRow]) -> SurveyResult<Self> {
        let mut container = Container::new();
        for row in rows {
            let id = row.station_id.trim();
            if id.is_empty() {
                return Err(SurveyError::missing_field("station_id"));
            }
            if !row.easting.is_finite() || !row.northing.is_finite() {
                return Err(SurveyError::invalid_input(
                    format!("Known_Points[{}]", id),
                    format!("({}, {})", row.easting, row.northing),
                    "Coordinates must be finite numbers",
                ));
            }
            let point = Point::new(id, row.easting, row.northing);
            container.push_with(
                point,
                MergePolicy::Reject,
                DEFAULT_COORDINATE_TOLERANCE,
                &mut Vec::new(),
            )?;
        }
        Ok(container)
    }

    /// Insert a point unless its id is already registered.
    ///
    /// Returns `true` if the point was added.
    pub fn insert(&mut self, point: Point) -> bool {
        if self.index.contains_key(&point.id) {
            return false;
        }
        self.index.insert(point.id.clone(), self.points.len());
        self.points.push(point);
        true
    }

    /// Look up a point by id
    pub fn get(&self, id: &str) -> SurveyResult<&Point> {
        self.find(id)
            .ok_or_else(|| SurveyError::unknown_station(id))
    }

    /// Look up a point by id, `None` if absent
    pub fn find(&self, id: &str) -> Option<&Point> {
        self.index.get(id).map(|&i| &self.points[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of registered points
    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.id.as_str())
    }

    /// Points ordered by id
    pub fn sorted(&self) -> Vec<Point> {
        let mut points = self.points.clone();
        points.sort();
        points
    }

    /// Same registry, re-ordered by id
    pub fn into_sorted(self) -> Container {
        let mut points = self.points;
        points.sort();
        Container::from_points(points)
    }

    /// Merge with first-wins semantics.
    ///
    /// Points of `self` are kept; points of `other` are added when their id
    /// is new. Disjoint registries give `size() == self.size() + other.size()`.
    pub fn union(&self, other: &Container) -> Container {
        let mut merged = self.clone();
        for point in other.iter() {
            merged.insert(point.clone());
        }
        merged
    }

    /// Merge under an explicit policy.
    ///
    /// Ids present in both registries with coordinates differing by more
    /// than `tolerance` are conflicts. `KeepExisting` and `Replace` resolve
    /// them and report each one; `Reject` fails on the first.
    pub fn merge(&self, other: &Container, policy: MergePolicy, tolerance: f64) -> SurveyResult<MergeOutcome> {
        let mut container = self.clone();
        let mut conflicts = Vec::new();
        for point in other.iter() {
            container.push_with(point.clone(), policy, tolerance, &mut conflicts)?;
        }
        Ok(MergeOutcome { container, conflicts })
    }

    /// Add one point under `policy`, recording any resolved conflict.
    pub(crate) fn push_with(
        &mut self,
        point: Point,
        policy: MergePolicy,
        tolerance: f64,
        conflicts: &mut Vec<MergeConflict>,
    ) -> SurveyResult<()> {
        let Some(&slot) = self.index.get(&point.id) else {
            self.insert(point);
            return Ok(());
        };

        let existing = &self.points[slot];
        if existing.same_position(&point, tolerance) {
            return Ok(());
        }

        match policy {
            MergePolicy::KeepExisting => {
                conflicts.push(MergeConflict {
                    kept: existing.clone(),
                    discarded: point,
                });
            }
            MergePolicy::Replace => {
                let discarded = std::mem::replace(&mut self.points[slot], point);
                conflicts.push(MergeConflict {
                    kept: self.points[slot].clone(),
                    discarded,
                });
            }
            MergePolicy::Reject => {
                return Err(MergeConflict {
                    kept: existing.clone(),
                    discarded: point,
                }
                .into_error());
            }
        }
        Ok(())
    }
}

impl From<Vec<Point>> for Container {
    fn from(points: Vec<Point>) -> Self {
        Container::from_points(points)
    }
}

impl From<Container> for Vec<Point> {
    fn from(container: Container) -> Self {
        container.points
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
