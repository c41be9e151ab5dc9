//! # Survey Calculations
//!
//! Each calculation follows the same pattern:
//!
//! - construct from rows plus the current station [`Container`] snapshot
//! - `validate()` / `is_validated()` - fail closed, never compute partial data
//! - `compute(&settings) -> SurveyResult<*Result>` - pure, returns fresh points
//!
//! ## Available Calculations
//!
//! - [`traverse`] - Open, Closed and Link traverses with compass-rule adjustment
//! - [`sideshot`] - Radiated detail points from an oriented station
//!
//! [`Container`]: crate::points::Container

pub mod sideshot;
pub mod traverse;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geometry::normalize;
use crate::units::Radians;

// Re-export commonly used types
pub use sideshot::{SideshotGroup, SideshotObservation, SideshotResult};
pub use traverse::{LegRow, LegTable, Traverse, TraverseKind, TraverseMetrics, TraverseResult};

/// How a recorded horizontal angle relates the incoming line to the
/// outgoing one.
///
/// The incoming line at a station is the line arriving from its backsight
/// (`backsight -> station`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleConvention {
    /// Angle turned clockwise from the prolongation of the incoming line:
    /// `az_out = az_in + angle`
    #[default]
    Deflection,
    /// Angle turned clockwise from the backsight direction:
    /// `az_out = az_in + angle - 180°`
    Backsight,
}

impl AngleConvention {
    /// Outgoing azimuth for an incoming azimuth and a recorded angle
    pub fn turn(self, incoming: Radians, angle: Radians) -> Radians {
        match self {
            AngleConvention::Deflection => normalize(incoming + angle),
            AngleConvention::Backsight => normalize(incoming + angle - Radians(PI)),
        }
    }
}

impl std::str::FromStr for AngleConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deflection" => Ok(AngleConvention::Deflection),
            "backsight" => Ok(AngleConvention::Backsight),
            other => Err(format!("unknown angle convention '{}' (expected deflection or backsight)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_conventions_agree_up_to_half_circle() {
        let incoming = Radians(0.3);
        let deflection = AngleConvention::Deflection.turn(incoming, Radians(FRAC_PI_2));
        let backsight = AngleConvention::Backsight.turn(incoming, Radians(FRAC_PI_2 + PI));
        assert!((deflection.0 - backsight.0).abs() < 1e-12);
    }

    #[test]
    fn test_turn_wraps() {
        let out = AngleConvention::Deflection.turn(Radians(1.5 * PI), Radians(PI));
        assert!((out.0 - 0.5 * PI).abs() < 1e-12);
    }
}
