//! # Traverse Adjustment
//!
//! Computes station coordinates along a chain of angle/distance legs that
//! starts on a known orientation line and, for Closed and Link traverses,
//! ends on one.
//!
//! ## Station sequence
//!
//! ```text
//! Open    A - B - S1 - S2            start anchor (A, B)
//! Link    A - B - S1 - S2 - E - F    start anchor (A, B), finish anchor (E, F)
//! Closed  A - B - S1 - S2 - B - A    start anchor (A, B), finish = start reversed
//! ```
//!
//! The first pair is the orientation line and carries no measurement. Every
//! following consecutive pair needs a [`MeasurementRow`]: the angle observed
//! at its first station and the distance to the second. On Closed and Link
//! traverses the final pair only contributes its closing angle.
//!
//! ## Adjustment
//!
//! 1. Reference azimuth from the start anchor
//! 2. Azimuths propagated leg by leg with the configured [`AngleConvention`]
//! 3. Angular misclosure against the finish anchor, distributed equally
//!    over all observed angles
//! 4. Provisional coordinates: `ΔE = d·sin(az)`, `ΔN = d·cos(az)`
//! 5. Linear misclosure and precision ratio
//! 6. Compass (Bowditch) rule: correction proportional to cumulative distance
//!
//! Open traverses stop after step 4 and are reported as unverified.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::calculations::traverse::{LegTable, Traverse, TraverseKind};
//! use topo_core::points::{Container, Point};
//! use topo_core::project::GlobalSettings;
//! use topo_core::tables::MeasurementRow;
//!
//! let control = Container::from_points(vec![
//!     Point::new("A", 0.0, -100.0),
//!     Point::new("B", 0.0, 0.0),
//!     Point::new("E", 100.0, 0.0),
//!     Point::new("F", 100.0, -100.0),
//! ]);
//! let legs = LegTable::from_rows(&[
//!     MeasurementRow::new("B", "S1", 0.0, 100.0),
//!     MeasurementRow::new("S1", "S2", 90.0, 100.0),
//!     MeasurementRow::new("S2", "E", 90.0, 100.0),
//!     MeasurementRow::new("E", "F", 0.0, 0.0),
//! ]);
//! let stops = ["A", "B", "S1", "S2", "E", "F"].map(String::from).to_vec();
//!
//! let traverse = Traverse::new("T1", TraverseKind::Link, stops, &legs, &control);
//! assert!(traverse.is_validated());
//!
//! let result = traverse.compute(&GlobalSettings::default()).unwrap();
//! let s2 = result.points.get("S2").unwrap();
//! assert!((s2.easting - 100.0).abs() < 1e-9);
//! assert!((s2.northing - 100.0).abs() < 1e-9);
//! assert!(result.metrics.linear_misclosure.unwrap() < 1e-9);
//! ```
//!
//! [`MeasurementRow`]: crate::tables::MeasurementRow
//! [`AngleConvention`]: crate::calculations::AngleConvention

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{SurveyError, SurveyResult};
use crate::geometry::{azimuth, components, normalize, wrap_signed};
use crate::points::{Container, Point};
use crate::project::GlobalSettings;
use crate::tables::{MeasurementRow, TraverseRow};
use crate::units::Radians;

/// Traverse variant, read from the `t_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraverseKind {
    /// Starts on a known line, ends on an unknown station
    #[serde(rename = "OpenTraverse", alias = "Open")]
    Open,
    /// Starts and closes on the same known line
    #[serde(rename = "ClosedTraverse", alias = "Closed")]
    Closed,
    /// Starts on one known line, closes on another
    #[serde(rename = "LinkTraverse", alias = "Link")]
    Link,
}

impl TraverseKind {
    /// Name as written in the `t_type` column
    pub fn type_name(self) -> &'static str {
        match self {
            TraverseKind::Open => "OpenTraverse",
            TraverseKind::Closed => "ClosedTraverse",
            TraverseKind::Link => "LinkTraverse",
        }
    }

    /// Closed and Link traverses can be checked against a finish anchor
    pub fn has_closure(self) -> bool {
        !matches!(self, TraverseKind::Open)
    }

    /// Shortest station list that still has one measured leg
    fn min_stops(self) -> usize {
        match self {
            TraverseKind::Open => 3,
            TraverseKind::Link => 4,
            TraverseKind::Closed => 5,
        }
    }
}

impl FromStr for TraverseKind {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OpenTraverse" | "Open" => Ok(TraverseKind::Open),
            "ClosedTraverse" | "Closed" => Ok(TraverseKind::Closed),
            "LinkTraverse" | "Link" => Ok(TraverseKind::Link),
            other => Err(SurveyError::invalid_input(
                "t_type",
                other,
                "Expected OpenTraverse, ClosedTraverse or LinkTraverse",
            )),
        }
    }
}

/// Recorded angle (in the project's angle unit) and distance of one leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub angle: f64,
    pub distance: f64,
}

/// `Traverse_Measurements` keyed by `(from_station, to_station)`.
#[derive(Debug, Clone, Default)]
pub struct LegTable {
    legs: HashMap<(String, String), Leg>,
}

impl LegTable {
    /// Index measurement rows. A repeated `(from, to)` pair keeps its first row.
    pub fn from_rows(rows: &[MeasurementRow]) -> Self {
        let mut legs = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = (row.from_station.trim().to_string(), row.to_station.trim().to_string());
            if legs.contains_key(&key) {
                warn!(from = %key.0, to = %key.1, "duplicate measurement row ignored");
                continue;
            }
            legs.insert(
                key,
                Leg {
                    angle: row.angle,
                    distance: row.distance,
                },
            );
        }
        LegTable { legs }
    }

    pub fn get(&self, from: &str, to: &str) -> Option<Leg> {
        self.legs.get(&(from.to_string(), to.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

/// A known line: two control points and the azimuth between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    pub from: Point,
    pub to: Point,
}

impl Anchor {
    fn resolve(from: &str, to: &str, stations: &Container) -> SurveyResult<Anchor> {
        let lookup = |id: &str| {
            stations.find(id).cloned().ok_or_else(|| {
                SurveyError::unresolved_anchor(from, to, format!("station '{}' is not a known point", id))
            })
        };
        let anchor = Anchor {
            from: lookup(from)?,
            to: lookup(to)?,
        };
        if anchor.from.same_position(&anchor.to, 0.0) {
            return Err(SurveyError::unresolved_anchor(from, to, "anchor points coincide"));
        }
        Ok(anchor)
    }

    /// Grid azimuth `from -> to`
    pub fn azimuth(&self) -> Radians {
        azimuth(&self.from, &self.to)
    }
}

/// A measured leg resolved against the station list
#[derive(Debug, Clone)]
struct Observation {
    from: String,
    to: String,
    angle: f64,
    distance: f64,
}

/// A traverse ready for validation and computation.
///
/// Construction resolves anchors and legs against a station snapshot; any
/// failure is kept and reported by [`Traverse::validate`]. A traverse that
/// does not validate is never computed.
#[derive(Debug, Clone)]
pub struct Traverse {
    id: String,
    kind: TraverseKind,
    stops: Vec<String>,
    start: Option<Anchor>,
    finish: Option<Anchor>,
    observations: Vec<Observation>,
    problem: Option<SurveyError>,
}

impl Traverse {
    /// Build from a `Traverses` row
    pub fn from_row(row: &TraverseRow, legs: &LegTable, stations: &Container) -> Self {
        Traverse::new(row.traverse_id.clone(), row.t_type, row.stops(), legs, stations)
    }

    pub fn new(
        id: impl Into<String>,
        kind: TraverseKind,
        stops: Vec<String>,
        legs: &LegTable,
        stations: &Container,
    ) -> Self {
        let mut traverse = Traverse {
            id: id.into(),
            kind,
            stops,
            start: None,
            finish: None,
            observations: Vec::new(),
            problem: None,
        };
        if let Err(e) = traverse.resolve(legs, stations) {
            traverse.problem = Some(e);
        }
        traverse
    }

    fn resolve(&mut self, legs: &LegTable, stations: &Container) -> SurveyResult<()> {
        let n = self.stops.len();
        if self.stops.iter().any(|s| s.is_empty()) {
            return Err(SurveyError::invalid_geometry(&self.id, "blank station id in station list"));
        }
        if n < self.kind.min_stops() {
            return Err(SurveyError::invalid_geometry(
                &self.id,
                format!(
                    "{} needs at least {} stations, got {}",
                    self.kind.type_name(),
                    self.kind.min_stops(),
                    n
                ),
            ));
        }

        let start = Anchor::resolve(&self.stops[0], &self.stops[1], stations)?;
        let finish = match self.kind {
            TraverseKind::Open => None,
            TraverseKind::Closed => {
                if self.stops[n - 2] != self.stops[1] || self.stops[n - 1] != self.stops[0] {
                    return Err(SurveyError::invalid_geometry(
                        &self.id,
                        format!(
                            "closed traverse must end on its start line reversed ({}-{})",
                            self.stops[1], self.stops[0]
                        ),
                    ));
                }
                Some(Anchor {
                    from: start.to.clone(),
                    to: start.from.clone(),
                })
            }
            TraverseKind::Link => {
                let finish = Anchor::resolve(&self.stops[n - 2], &self.stops[n - 1], stations)?;
                let same_line = |a: &Anchor, b: &Anchor| {
                    (a.from.id == b.from.id && a.to.id == b.to.id)
                        || (a.from.id == b.to.id && a.to.id == b.from.id)
                };
                if same_line(&finish, &start) {
                    return Err(SurveyError::invalid_geometry(
                        &self.id,
                        "link traverse needs two distinct anchors",
                    ));
                }
                Some(finish)
            }
        };

        let last = n - 2;
        let mut observations = Vec::with_capacity(last);
        for (i, pair) in self.stops[1..].windows(2).enumerate() {
            let (from, to) = (&pair[0], &pair[1]);
            let leg = legs
                .get(from, to)
                .ok_or_else(|| SurveyError::missing_leg(from.as_str(), to.as_str()))?;
            if !leg.angle.is_finite() {
                return Err(SurveyError::invalid_input(
                    format!("angle {}->{}", from, to),
                    leg.angle.to_string(),
                    "Angle must be a finite number",
                ));
            }
            let closing_only = self.kind.has_closure() && i + 1 == last;
            if !closing_only && (!leg.distance.is_finite() || leg.distance < 0.0) {
                return Err(SurveyError::invalid_input(
                    format!("distance {}->{}", from, to),
                    leg.distance.to_string(),
                    "Distance must be a finite, non-negative number",
                ));
            }
            observations.push(Observation {
                from: from.clone(),
                to: to.clone(),
                angle: leg.angle,
                distance: leg.distance,
            });
        }

        self.start = Some(start);
        self.finish = finish;
        self.observations = observations;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TraverseKind {
        self.kind
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    /// The first problem found while resolving this traverse, if any
    pub fn validate(&self) -> SurveyResult<()> {
        match &self.problem {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    pub fn is_validated(&self) -> bool {
        self.problem.is_none()
    }

    /// Adjust the traverse.
    ///
    /// # Returns
    ///
    /// * `Ok(TraverseResult)` - adjusted points, leg table and metrics
    /// * `Err(SurveyError)` - the validation error if the traverse is invalid
    pub fn compute(&self, settings: &GlobalSettings) -> SurveyResult<TraverseResult> {
        self.validate()?;
        let start = self.start.as_ref().ok_or_else(|| SurveyError::Internal {
            message: format!("traverse {} validated without a start anchor", self.id),
        })?;

        let unit = settings.angle_unit;
        let k = self.observations.len();
        let traversed = if self.kind.has_closure() { k - 1 } else { k };

        // Azimuth propagation from the reference line
        let mut raw = Vec::with_capacity(k);
        let mut current = start.azimuth();
        for obs in &self.observations {
            current = settings.angle_convention.turn(current, unit.to_radians(obs.angle));
            raw.push(current);
        }

        // Angular misclosure, shared equally by the k observed angles
        let angular = self
            .finish
            .as_ref()
            .map(|finish| wrap_signed(raw[k - 1] - finish.azimuth()));
        let azimuths: Vec<Radians> = raw
            .iter()
            .enumerate()
            .map(|(i, &az)| match angular {
                Some(w) => normalize(az - w * ((i + 1) as f64 / k as f64)),
                None => az,
            })
            .collect();

        // Provisional coordinates
        let mut easting = start.to.easting;
        let mut northing = start.to.northing;
        let mut total = 0.0;
        let mut deltas = Vec::with_capacity(traversed);
        let mut provisional = Vec::with_capacity(traversed);
        let mut cumulative = Vec::with_capacity(traversed);
        for (obs, &az) in self.observations.iter().zip(&azimuths).take(traversed) {
            let (de, dn) = components(az, obs.distance);
            easting += de;
            northing += dn;
            total += obs.distance;
            deltas.push((de, dn));
            provisional.push((easting, northing));
            cumulative.push(total);
        }

        // Linear misclosure at the finish station
        let closure = self
            .finish
            .as_ref()
            .map(|finish| (easting - finish.from.easting, northing - finish.from.northing));

        // Compass rule
        let corrections: Vec<(f64, f64)> = cumulative
            .iter()
            .map(|&c| match closure {
                Some((we, wn)) if total > 0.0 => (-we * c / total, -wn * c / total),
                _ => (0.0, 0.0),
            })
            .collect();

        let anchors: Vec<&Point> = [
            Some(&start.from),
            Some(&start.to),
            self.finish.as_ref().map(|f| &f.from),
            self.finish.as_ref().map(|f| &f.to),
        ]
        .into_iter()
        .flatten()
        .collect();
        let known = |id: &str| anchors.iter().find(|p| p.id == id).map(|&p| p.clone());

        let mut points = Container::new();
        points.insert(start.from.clone());
        points.insert(start.to.clone());

        let mut legs = Vec::with_capacity(k);
        for (i, obs) in self.observations.iter().enumerate() {
            let azimuth = unit.from_radians(azimuths[i]);
            if i < traversed {
                let (de, dn) = deltas[i];
                let (pe, pn) = provisional[i];
                let (ce, cn) = corrections[i];
                let point = known(&obs.to).unwrap_or_else(|| Point::new(obs.to.clone(), pe + ce, pn + cn));
                legs.push(LegRow {
                    from: obs.from.clone(),
                    to: obs.to.clone(),
                    angle: obs.angle,
                    azimuth,
                    distance: Some(obs.distance),
                    departure: Some(de),
                    latitude: Some(dn),
                    correction_easting: ce,
                    correction_northing: cn,
                    easting: point.easting,
                    northing: point.northing,
                });
                points.insert(point);
            } else {
                let target = known(&obs.to).ok_or_else(|| SurveyError::Internal {
                    message: format!("closing station {} of traverse {} is not an anchor", obs.to, self.id),
                })?;
                legs.push(LegRow {
                    from: obs.from.clone(),
                    to: obs.to.clone(),
                    angle: obs.angle,
                    azimuth,
                    distance: None,
                    departure: None,
                    latitude: None,
                    correction_easting: 0.0,
                    correction_northing: 0.0,
                    easting: target.easting,
                    northing: target.northing,
                });
                points.insert(target);
            }
        }

        let linear = closure.map(|(we, wn)| we.hypot(wn));
        let metrics = TraverseMetrics {
            traverse_id: self.id.clone(),
            kind: self.kind,
            station_count: points.size(),
            leg_count: traversed,
            total_distance: total,
            angular_misclosure: angular.map(|w| unit.from_radians(w)),
            angular_correction: angular.map(|w| -unit.from_radians(w) / k as f64),
            linear_misclosure: linear,
            misclosure_easting: closure.map(|(we, _)| we),
            misclosure_northing: closure.map(|(_, wn)| wn),
            precision_ratio: linear.filter(|_| total > 0.0).map(|l| l / total),
            verified: self.kind.has_closure(),
        };

        debug!(
            traverse = %self.id,
            kind = self.kind.type_name(),
            stations = metrics.station_count,
            total_distance = total,
            precision = %metrics.precision_label(),
            "traverse adjusted"
        );

        Ok(TraverseResult { metrics, legs, points })
    }
}

/// One row of the per-traverse coordinate table.
///
/// The closing row of a Closed/Link traverse has no distance: it only
/// carries the closing angle, and its coordinates are the known foresight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegRow {
    pub from: String,
    pub to: String,
    /// Recorded angle at `from`
    pub angle: f64,
    /// Adjusted azimuth `from -> to`
    pub azimuth: f64,
    pub distance: Option<f64>,
    /// Unadjusted ΔE
    pub departure: Option<f64>,
    /// Unadjusted ΔN
    pub latitude: Option<f64>,
    /// Compass-rule correction applied to `to`
    pub correction_easting: f64,
    pub correction_northing: f64,
    /// Adjusted coordinates of `to`
    pub easting: f64,
    pub northing: f64,
}

/// Closure metrics of one computed traverse.
///
/// Angular values are in the project's angle unit. Quantities that do not
/// exist for the traverse (closures of an Open traverse, a ratio over zero
/// distance) are `None`.
///
/// ## JSON Example
///
/// ```json
/// {
///   "traverse_id": "T1",
///   "kind": "LinkTraverse",
///   "station_count": 6,
///   "leg_count": 3,
///   "total_distance": 300.03,
///   "angular_misclosure": 0.0021,
///   "angular_correction": -0.000525,
///   "linear_misclosure": 0.031,
///   "misclosure_easting": 0.03,
///   "misclosure_northing": 0.008,
///   "precision_ratio": 0.000103,
///   "verified": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseMetrics {
    pub traverse_id: String,
    pub kind: TraverseKind,
    /// Distinct points in the output, anchors included
    pub station_count: usize,
    /// Legs contributing distance
    pub leg_count: usize,
    pub total_distance: f64,
    /// Computed minus known closing azimuth, wrapped to a half circle
    pub angular_misclosure: Option<f64>,
    /// Correction applied to each observed angle
    pub angular_correction: Option<f64>,
    /// Length of the closure vector
    pub linear_misclosure: Option<f64>,
    pub misclosure_easting: Option<f64>,
    pub misclosure_northing: Option<f64>,
    /// linear_misclosure / total_distance
    pub precision_ratio: Option<f64>,
    /// False for Open traverses (nothing to close on)
    pub verified: bool,
}

impl TraverseMetrics {
    /// N in the customary "1:N" precision, `None` if undefined or exact
    pub fn precision_denominator(&self) -> Option<f64> {
        self.precision_ratio.filter(|&r| r > 0.0).map(|r| 1.0 / r)
    }

    pub fn precision_label(&self) -> String {
        match (self.precision_ratio, self.precision_denominator()) {
            (_, Some(n)) => format!("1:{:.0}", n),
            (Some(_), None) => "exact".to_string(),
            (None, _) => "n/a".to_string(),
        }
    }
}

/// Output of [`Traverse::compute`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseResult {
    pub metrics: TraverseMetrics,
    pub legs: Vec<LegRow>,
    /// One point per distinct stop; anchors keep their known coordinates
    pub points: Container,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::AngleConvention;
    use crate::geometry::distance;
    use crate::units::AngleUnit;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn stops(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Square of side 100 starting at B, oriented north from A.
    fn square_control() -> Container {
        Container::from_points(vec![Point::new("A", 0.0, -10.0), Point::new("B", 0.0, 0.0)])
    }

    fn square_legs(turn: f64) -> LegTable {
        LegTable::from_rows(&[
            MeasurementRow::new("B", "C", turn, 100.0),
            MeasurementRow::new("C", "D", turn, 100.0),
            MeasurementRow::new("D", "E", turn, 100.0),
            MeasurementRow::new("E", "B", turn, 100.0),
            MeasurementRow::new("B", "A", 180.0, 0.0),
        ])
    }

    fn square(turn: f64) -> Traverse {
        Traverse::new(
            "SQ",
            TraverseKind::Closed,
            stops(&["A", "B", "C", "D", "E", "B", "A"]),
            &square_legs(turn),
            &square_control(),
        )
    }

    fn link_control() -> Container {
        Container::from_points(vec![
            Point::new("A", 0.0, -100.0),
            Point::new("B", 0.0, 0.0),
            Point::new("E", 100.0, 0.0),
            Point::new("F", 100.0, -100.0),
        ])
    }

    fn link_rows(s1_s2: f64) -> Vec<MeasurementRow> {
        vec![
            MeasurementRow::new("B", "S1", 0.0, 100.0),
            MeasurementRow::new("S1", "S2", 90.0, s1_s2),
            MeasurementRow::new("S2", "E", 90.0, 100.0),
            MeasurementRow::new("E", "F", 0.0, 0.0),
        ]
    }

    fn link(rows: &[MeasurementRow]) -> Traverse {
        Traverse::new(
            "L1",
            TraverseKind::Link,
            stops(&["A", "B", "S1", "S2", "E", "F"]),
            &LegTable::from_rows(rows),
            &link_control(),
        )
    }

    #[test]
    fn test_exact_closed_traverse_has_zero_misclosure() {
        let result = square(90.0).compute(&GlobalSettings::default()).unwrap();
        let m = &result.metrics;

        assert!(m.verified);
        assert!(approx_eq(m.angular_misclosure.unwrap(), 0.0, EPSILON));
        assert!(approx_eq(m.linear_misclosure.unwrap(), 0.0, EPSILON));
        assert!(approx_eq(m.total_distance, 400.0, EPSILON));
        // ratio defined and (numerically) zero, never a crash
        assert!(m.precision_ratio.unwrap() < 1e-12);

        let c = result.points.get("C").unwrap();
        let d = result.points.get("D").unwrap();
        assert!(approx_eq(c.easting, 100.0, EPSILON) && approx_eq(c.northing, 0.0, EPSILON));
        assert!(approx_eq(d.easting, 100.0, EPSILON) && approx_eq(d.northing, -100.0, EPSILON));
        assert_eq!(result.points.size(), 5);
    }

    #[test]
    fn test_square_angular_correction_closes_azimuths() {
        let result = square(90.01).compute(&GlobalSettings::default()).unwrap();
        let m = &result.metrics;

        // four turns of 90.01 overshoot by 0.04 degrees
        assert!(approx_eq(m.angular_misclosure.unwrap(), 0.04, 1e-9));
        assert!(approx_eq(m.angular_correction.unwrap(), -0.008, 1e-9));

        // closing line lands back on the start line reversed
        let closing = result.legs.last().unwrap();
        assert!(approx_eq(closing.azimuth, 180.0, 1e-9));

        // corrected angles close the figure: 4 turns of 90 plus the 180 closing turn
        let correction = m.angular_correction.unwrap();
        let corrected: f64 = result.legs.iter().map(|l| l.angle + correction).sum();
        assert!(approx_eq(corrected, 540.0, 1e-9));
        let observed: f64 = result.legs.iter().map(|l| l.angle).sum();
        assert!(approx_eq(observed, 540.04, 1e-9));

        // each azimuth is the reference plus the corrected angles so far
        let mut running = 0.0;
        for leg in &result.legs {
            running += leg.angle + correction;
            assert!(approx_eq(leg.azimuth, running.rem_euclid(360.0), 1e-9));
        }

        // finish station is held on its known coordinate
        let b = result.points.get("B").unwrap();
        assert_eq!((b.easting, b.northing), (0.0, 0.0));
    }

    #[test]
    fn test_link_traverse_compass_rule() {
        let result = link(&link_rows(100.03)).compute(&GlobalSettings::default()).unwrap();
        let m = &result.metrics;

        assert!(approx_eq(m.angular_misclosure.unwrap(), 0.0, EPSILON));
        assert!(approx_eq(m.misclosure_easting.unwrap(), 0.03, 1e-9));
        assert!(approx_eq(m.misclosure_northing.unwrap(), 0.0, 1e-9));
        assert!(approx_eq(m.total_distance, 300.03, 1e-9));
        assert!(approx_eq(m.precision_ratio.unwrap(), 0.03 / 300.03, 1e-12));
        assert_eq!(m.leg_count, 3);

        // correction proportional to cumulative distance
        let s1 = result.points.get("S1").unwrap();
        let s2 = result.points.get("S2").unwrap();
        assert!(approx_eq(s1.easting, -0.03 * 100.0 / 300.03, 1e-9));
        assert!(approx_eq(s2.easting, 100.03 - 0.03 * 200.03 / 300.03, 1e-9));
        assert!(approx_eq(s2.northing, 100.0, 1e-9));

        let leg = &result.legs[1];
        assert_eq!(leg.distance, Some(100.03));
        assert!(approx_eq(leg.correction_easting, -0.03 * 200.03 / 300.03, 1e-9));
        assert!(result.legs[3].distance.is_none());

        assert!(m.precision_label().starts_with("1:"));
    }

    #[test]
    fn test_open_traverse_is_unverified_and_unadjusted() {
        let control = Container::from_points(vec![Point::new("A", 0.0, -10.0), Point::new("B", 0.0, 0.0)]);
        let legs = LegTable::from_rows(&[
            MeasurementRow::new("B", "C", 45.0, 10.0),
            MeasurementRow::new("C", "D", -45.0, 5.0),
        ]);
        let tr = Traverse::new("O1", TraverseKind::Open, stops(&["A", "B", "C", "D"]), &legs, &control);
        let result = tr.compute(&GlobalSettings::default()).unwrap();
        let m = &result.metrics;

        assert!(!m.verified);
        assert!(m.angular_misclosure.is_none());
        assert!(m.linear_misclosure.is_none());
        assert!(m.precision_ratio.is_none());
        assert_eq!(m.precision_label(), "n/a");

        let c = result.points.get("C").unwrap();
        let d = result.points.get("D").unwrap();
        let h = 10.0 / 2f64.sqrt();
        assert!(approx_eq(c.easting, h, EPSILON) && approx_eq(c.northing, h, EPSILON));
        assert!(approx_eq(d.easting, h, EPSILON) && approx_eq(d.northing, h + 5.0, EPSILON));
    }

    #[test]
    fn test_missing_leg_fails_validation() {
        let mut rows = link_rows(100.0);
        rows.remove(1);
        let tr = link(&rows);
        assert!(!tr.is_validated());
        assert_eq!(tr.validate().unwrap_err(), SurveyError::missing_leg("S1", "S2"));
        assert!(tr.compute(&GlobalSettings::default()).is_err());
    }

    #[test]
    fn test_unknown_anchor_fails_validation() {
        let control = Container::from_points(vec![Point::new("B", 0.0, 0.0)]);
        let tr = Traverse::new(
            "O1",
            TraverseKind::Open,
            stops(&["A", "B", "C"]),
            &LegTable::from_rows(&[MeasurementRow::new("B", "C", 0.0, 1.0)]),
            &control,
        );
        assert!(matches!(tr.validate(), Err(SurveyError::UnresolvedAnchor { .. })));
    }

    #[test]
    fn test_closed_traverse_must_return_to_start_line() {
        let tr = Traverse::new(
            "SQ",
            TraverseKind::Closed,
            stops(&["A", "B", "C", "D", "E", "B"]),
            &square_legs(90.0),
            &square_control(),
        );
        assert!(matches!(tr.validate(), Err(SurveyError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_link_requires_distinct_anchors() {
        let control = link_control();
        let legs = LegTable::from_rows(&[
            MeasurementRow::new("B", "S1", 0.0, 10.0),
            MeasurementRow::new("S1", "A", 180.0, 10.0),
            MeasurementRow::new("A", "B", 180.0, 0.0),
        ]);
        let tr = Traverse::new("L2", TraverseKind::Link, stops(&["A", "B", "S1", "A", "B"]), &legs, &control);
        assert!(matches!(tr.validate(), Err(SurveyError::InvalidGeometry { .. })));

        // start line reversed is a closed traverse, not a link
        let legs = LegTable::from_rows(&[
            MeasurementRow::new("B", "S1", 0.0, 10.0),
            MeasurementRow::new("S1", "B", 180.0, 10.0),
            MeasurementRow::new("B", "A", 180.0, 0.0),
        ]);
        let tr = Traverse::new("L3", TraverseKind::Link, stops(&["A", "B", "S1", "B", "A"]), &legs, &control);
        assert!(matches!(tr.validate(), Err(SurveyError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_too_short_and_blank_stations() {
        let control = link_control();
        let legs = LegTable::from_rows(&link_rows(100.0));
        let short = Traverse::new("X", TraverseKind::Link, stops(&["A", "B", "E"]), &legs, &control);
        assert!(!short.is_validated());
        let blank = Traverse::new("Y", TraverseKind::Open, stops(&["A", "B", ""]), &legs, &control);
        assert!(!blank.is_validated());
    }

    #[test]
    fn test_negative_distance_rejected() {
        let tr = link(&link_rows(-5.0));
        assert!(matches!(tr.validate(), Err(SurveyError::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_length_traverse_has_undefined_precision() {
        let legs = LegTable::from_rows(&[
            MeasurementRow::new("B", "C", 0.0, 0.0),
            MeasurementRow::new("C", "B", 0.0, 0.0),
            MeasurementRow::new("B", "A", 180.0, 0.0),
        ]);
        let tr = Traverse::new(
            "Z",
            TraverseKind::Closed,
            stops(&["A", "B", "C", "B", "A"]),
            &legs,
            &square_control(),
        );
        let result = tr.compute(&GlobalSettings::default()).unwrap();
        assert_eq!(result.metrics.total_distance, 0.0);
        assert!(result.metrics.precision_ratio.is_none());
        assert_eq!(result.metrics.precision_label(), "n/a");
        let c = result.points.get("C").unwrap();
        assert!(approx_eq(distance(c, &Point::new("B", 0.0, 0.0)), 0.0, EPSILON));
    }

    #[test]
    fn test_backsight_convention_matches_deflection() {
        let deflection = link(&link_rows(100.03)).compute(&GlobalSettings::default()).unwrap();

        let rows: Vec<MeasurementRow> = link_rows(100.03)
            .into_iter()
            .map(|mut r| {
                r.angle += 180.0;
                r
            })
            .collect();
        let settings = GlobalSettings {
            angle_convention: AngleConvention::Backsight,
            ..GlobalSettings::default()
        };
        let backsight = link(&rows).compute(&settings).unwrap();

        for id in ["S1", "S2"] {
            let a = deflection.points.get(id).unwrap();
            let b = backsight.points.get(id).unwrap();
            assert!(a.same_position(b, 1e-9), "{} differs", id);
        }
    }

    #[test]
    fn test_gon_input_matches_degree_input() {
        let degrees = link(&link_rows(100.03)).compute(&GlobalSettings::default()).unwrap();

        let rows: Vec<MeasurementRow> = link_rows(100.03)
            .into_iter()
            .map(|mut r| {
                r.angle /= 0.9;
                r
            })
            .collect();
        let settings = GlobalSettings {
            angle_unit: AngleUnit::Gons,
            ..GlobalSettings::default()
        };
        let gons = link(&rows).compute(&settings).unwrap();

        let a = degrees.points.get("S2").unwrap();
        let b = gons.points.get("S2").unwrap();
        assert!(a.same_position(b, 1e-9));
        assert!(approx_eq(gons.legs[0].azimuth, 0.0, 1e-9) || approx_eq(gons.legs[0].azimuth, 400.0, 1e-9));
    }

    #[test]
    fn test_traverse_kind_parsing() {
        assert_eq!("LinkTraverse".parse::<TraverseKind>().unwrap(), TraverseKind::Link);
        assert_eq!("Closed".parse::<TraverseKind>().unwrap(), TraverseKind::Closed);
        assert!("Loop".parse::<TraverseKind>().is_err());
        assert_eq!(serde_json::to_string(&TraverseKind::Open).unwrap(), "\"OpenTraverse\"");
    }

    #[test]
    fn test_duplicate_measurement_keeps_first() {
        let table = LegTable::from_rows(&[
            MeasurementRow::new("B", "C", 10.0, 1.0),
            MeasurementRow::new("B", "C", 20.0, 2.0),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("B", "C").unwrap().angle, 10.0);
    }
}
