//! # Sideshots (Radiation)
//!
//! Detail points observed from an occupied station oriented on a backsight.
//! Rows are grouped by `(station, backsight)`; each group is validated and
//! computed on its own.
//!
//! The orientation is the azimuth of the line arriving at the station from
//! the backsight, the same incoming line a traverse turns its angles from.
//! A sideshot recorded with a traverse leg's angle and distance therefore
//! lands on that leg's next station.
//!
//! ```text
//! target_azimuth = turn(azimuth(backsight -> station), angle)
//! target         = station + distance · (sin, cos)(target_azimuth)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use topo_core::calculations::sideshot::{SideshotGroup, SideshotObservation};
//! use topo_core::points::{Container, Point};
//! use topo_core::project::GlobalSettings;
//!
//! let stations = Container::from_points(vec![
//!     Point::new("S1", 0.0, 0.0),
//!     Point::new("S0", 0.0, -10.0),
//! ]);
//! let group = SideshotGroup::new(
//!     "S1",
//!     "S0",
//!     vec![SideshotObservation::new("P1", 90.0, 10.0)],
//!     &stations,
//! );
//!
//! let result = group.compute(&GlobalSettings::default()).unwrap();
//! let p1 = result.points.get("P1").unwrap();
//! assert!((p1.easting - 10.0).abs() < 1e-9);
//! assert!(p1.northing.abs() < 1e-9);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{SurveyError, SurveyResult};
use crate::geometry::{azimuth, polar};
use crate::points::{Container, MergeConflict, Point};
use crate::project::GlobalSettings;
use crate::tables::SideshotRow;

/// One angle/distance observation to a detail point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideshotObservation {
    pub target: String,
    pub angle: f64,
    pub distance: f64,
}

impl SideshotObservation {
    pub fn new(target: impl Into<String>, angle: f64, distance: f64) -> Self {
        SideshotObservation {
            target: target.into(),
            angle,
            distance,
        }
    }
}

/// Group sideshot rows by `(station, backsight)`.
///
/// Groups come back ordered by key; observations keep their row order.
pub fn group_rows(rows: &[SideshotRow]) -> Vec<((String, String), Vec<SideshotObservation>)> {
    let mut groups: BTreeMap<(String, String), Vec<SideshotObservation>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.station.trim().to_string(), row.backsight.trim().to_string()))
            .or_default()
            .push(SideshotObservation::new(row.target.trim(), row.angle, row.distance));
    }
    groups.into_iter().collect()
}

/// Observations taken from one oriented station.
#[derive(Debug, Clone)]
pub struct SideshotGroup {
    station_id: String,
    backsight_id: String,
    station: Option<Point>,
    backsight: Option<Point>,
    observations: Vec<SideshotObservation>,
    problem: Option<SurveyError>,
}

impl SideshotGroup {
    /// Resolve station and backsight against the registry snapshot.
    pub fn new(
        station: impl Into<String>,
        backsight: impl Into<String>,
        observations: Vec<SideshotObservation>,
        stations: &Container,
    ) -> Self {
        let mut group = SideshotGroup {
            station_id: station.into(),
            backsight_id: backsight.into(),
            station: None,
            backsight: None,
            observations,
            problem: None,
        };
        if let Err(e) = group.resolve(stations) {
            group.problem = Some(e);
        }
        group
    }

    fn resolve(&mut self, stations: &Container) -> SurveyResult<()> {
        let station = stations.get(&self.station_id)?.clone();
        let backsight = stations.get(&self.backsight_id)?.clone();
        if station.same_position(&backsight, 0.0) {
            return Err(SurveyError::invalid_geometry(
                format!("{}/{}", self.station_id, self.backsight_id),
                "station and backsight coincide",
            ));
        }
        if self.observations.is_empty() {
            return Err(SurveyError::invalid_geometry(
                format!("{}/{}", self.station_id, self.backsight_id),
                "no observations",
            ));
        }
        for obs in &self.observations {
            if obs.target.is_empty() {
                return Err(SurveyError::missing_field("target"));
            }
            if !obs.angle.is_finite() {
                return Err(SurveyError::invalid_input(
                    format!("angle to {}", obs.target),
                    obs.angle.to_string(),
                    "Angle must be a finite number",
                ));
            }
            if !obs.distance.is_finite() || obs.distance < 0.0 {
                return Err(SurveyError::invalid_input(
                    format!("distance to {}", obs.target),
                    obs.distance.to_string(),
                    "Distance must be a finite, non-negative number",
                ));
            }
        }
        self.station = Some(station);
        self.backsight = Some(backsight);
        Ok(())
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn backsight_id(&self) -> &str {
        &self.backsight_id
    }

    pub fn observations(&self) -> &[SideshotObservation] {
        &self.observations
    }

    pub fn validate(&self) -> SurveyResult<()> {
        match &self.problem {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    pub fn is_validated(&self) -> bool {
        self.problem.is_none()
    }

    /// Radiate every observation.
    ///
    /// A target observed twice in the group is merged with the project's
    /// [`MergePolicy`](crate::points::MergePolicy); under `Reject` a
    /// disagreeing repeat fails the group.
    pub fn compute(&self, settings: &GlobalSettings) -> SurveyResult<SideshotResult> {
        self.validate()?;
        let (Some(station), Some(backsight)) = (&self.station, &self.backsight) else {
            return Err(SurveyError::Internal {
                message: format!("sideshot group {}/{} validated without points", self.station_id, self.backsight_id),
            });
        };

        let unit = settings.angle_unit;
        let orientation = azimuth(backsight, station);

        let mut points = Container::new();
        let mut conflicts = Vec::new();
        let mut shots = Vec::with_capacity(self.observations.len());
        for obs in &self.observations {
            let target_azimuth = settings
                .angle_convention
                .turn(orientation, unit.to_radians(obs.angle));
            let point = polar(obs.target.clone(), station, target_azimuth, obs.distance);
            shots.push(RadiatedPoint {
                target: obs.target.clone(),
                angle: obs.angle,
                azimuth: unit.from_radians(target_azimuth),
                distance: obs.distance,
                easting: point.easting,
                northing: point.northing,
            });
            points.push_with(point, settings.merge_policy, settings.coordinate_tolerance, &mut conflicts)?;
        }

        debug!(
            station = %self.station_id,
            backsight = %self.backsight_id,
            points = points.size(),
            conflicts = conflicts.len(),
            "sideshots radiated"
        );

        Ok(SideshotResult {
            station: self.station_id.clone(),
            backsight: self.backsight_id.clone(),
            orientation: unit.from_radians(orientation),
            shots,
            points,
            conflicts,
        })
    }
}

/// One radiated observation, for the per-group table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiatedPoint {
    pub target: String,
    pub angle: f64,
    /// Azimuth `station -> target`
    pub azimuth: f64,
    pub distance: f64,
    pub easting: f64,
    pub northing: f64,
}

/// Output of [`SideshotGroup::compute`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideshotResult {
    pub station: String,
    pub backsight: String,
    /// Azimuth `backsight -> station`
    pub orientation: f64,
    pub shots: Vec<RadiatedPoint>,
    pub points: Container,
    /// Repeated targets resolved by the merge policy
    pub conflicts: Vec<MergeConflict>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::AngleConvention;
    use crate::points::MergePolicy;
    use crate::units::AngleUnit;

    const EPSILON: f64 = 1e-9;

    fn stations() -> Container {
        Container::from_points(vec![Point::new("S1", 0.0, 0.0), Point::new("S0", 0.0, -10.0)])
    }

    fn group(observations: Vec<SideshotObservation>) -> SideshotGroup {
        SideshotGroup::new("S1", "S0", observations, &stations())
    }

    #[test]
    fn test_right_angle_shot() {
        let result = group(vec![SideshotObservation::new("P1", 90.0, 10.0)])
            .compute(&GlobalSettings::default())
            .unwrap();
        assert!(result.orientation.abs() < EPSILON);
        let p1 = result.points.get("P1").unwrap();
        assert!((p1.easting - 10.0).abs() < EPSILON);
        assert!(p1.northing.abs() < EPSILON);
        assert!((result.shots[0].azimuth - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_backsight_convention() {
        let settings = GlobalSettings {
            angle_convention: AngleConvention::Backsight,
            ..GlobalSettings::default()
        };
        // 90 degrees clockwise from the backsight (south) points west
        let result = group(vec![SideshotObservation::new("P1", 90.0, 10.0)])
            .compute(&settings)
            .unwrap();
        let p1 = result.points.get("P1").unwrap();
        assert!((p1.easting + 10.0).abs() < EPSILON);
        assert!(p1.northing.abs() < EPSILON);
    }

    #[test]
    fn test_gons() {
        let settings = GlobalSettings {
            angle_unit: AngleUnit::Gons,
            ..GlobalSettings::default()
        };
        let result = group(vec![SideshotObservation::new("P1", 50.0, 2f64.sqrt())])
            .compute(&settings)
            .unwrap();
        let p1 = result.points.get("P1").unwrap();
        assert!((p1.easting - 1.0).abs() < EPSILON);
        assert!((p1.northing - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_unknown_station_excluded() {
        let g = SideshotGroup::new("S9", "S0", vec![SideshotObservation::new("P1", 0.0, 1.0)], &stations());
        assert!(!g.is_validated());
        assert_eq!(g.validate().unwrap_err(), SurveyError::unknown_station("S9"));
        assert!(g.compute(&GlobalSettings::default()).is_err());
    }

    #[test]
    fn test_bad_distance_excluded() {
        let g = group(vec![SideshotObservation::new("P1", 0.0, f64::NAN)]);
        assert!(matches!(g.validate(), Err(SurveyError::InvalidInput { .. })));
    }

    #[test]
    fn test_repeated_target_follows_policy() {
        let obs = vec![
            SideshotObservation::new("P1", 90.0, 10.0),
            SideshotObservation::new("P1", 90.0, 10.5),
        ];

        let keep = group(obs.clone()).compute(&GlobalSettings::default()).unwrap();
        assert_eq!(keep.points.size(), 1);
        assert_eq!(keep.conflicts.len(), 1);
        assert!((keep.points.get("P1").unwrap().easting - 10.0).abs() < EPSILON);

        let reject = GlobalSettings {
            merge_policy: MergePolicy::Reject,
            ..GlobalSettings::default()
        };
        assert!(matches!(
            group(obs).compute(&reject),
            Err(SurveyError::DuplicateStation { .. })
        ));
    }

    #[test]
    fn test_group_rows_by_station_and_backsight() {
        let rows = vec![
            SideshotRow::new("S2", "S1", "P3", 10.0, 1.0),
            SideshotRow::new("S1", "S0", "P1", 10.0, 1.0),
            SideshotRow::new("S1", "S0", "P2", 20.0, 2.0),
        ];
        let groups = group_rows(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ("S1".to_string(), "S0".to_string()));
        let targets: Vec<_> = groups[0].1.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(targets, vec!["P1", "P2"]);
    }
}
