//! # Unit Types
//!
//! Type-safe wrappers for angular units. Field books record horizontal
//! angles either in sexagesimal degrees (360 per circle) or in gons
//! (400 per circle); the computation itself runs in radians.
//!
//! Distances and coordinates are plain `f64` metres throughout the crate.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::units::{Degrees, Gons, Radians};
//!
//! let right_angle = Gons(100.0);
//! let deg: Degrees = right_angle.into();
//! assert!((deg.0 - 90.0).abs() < 1e-12);
//!
//! let rad: Radians = deg.into();
//! assert!((rad.0 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Sub};

// ============================================================================
// Angle Units
// ============================================================================

/// Angle in sexagesimal degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Degrees(pub f64);

/// Angle in gons (grads, 400 per full circle)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gons(pub f64);

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Radians(pub f64);

impl From<Degrees> for Radians {
    fn from(deg: Degrees) -> Self {
        Radians(deg.0.to_radians())
    }
}

impl From<Radians> for Degrees {
    fn from(rad: Radians) -> Self {
        Degrees(rad.0.to_degrees())
    }
}

impl From<Gons> for Radians {
    fn from(gon: Gons) -> Self {
        Radians(gon.0 * PI / 200.0)
    }
}

impl From<Radians> for Gons {
    fn from(rad: Radians) -> Self {
        Gons(rad.0 * 200.0 / PI)
    }
}

impl From<Gons> for Degrees {
    fn from(gon: Gons) -> Self {
        Degrees(gon.0 * 0.9)
    }
}

impl From<Degrees> for Gons {
    fn from(deg: Degrees) -> Self {
        Gons(deg.0 / 0.9)
    }
}

/// Unit in which angles are read from and reported to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleUnit {
    /// 360 per circle
    #[default]
    Degrees,
    /// 400 per circle
    Gons,
}

impl AngleUnit {
    /// Convert a raw value in this unit to radians
    pub fn to_radians(self, value: f64) -> Radians {
        match self {
            AngleUnit::Degrees => Degrees(value).into(),
            AngleUnit::Gons => Gons(value).into(),
        }
    }

    /// Convert radians to a raw value in this unit
    pub fn from_radians(self, rad: Radians) -> f64 {
        match self {
            AngleUnit::Degrees => Degrees::from(rad).0,
            AngleUnit::Gons => Gons::from(rad).0,
        }
    }

    /// Short label used in printed tables
    pub fn symbol(self) -> &'static str {
        match self {
            AngleUnit::Degrees => "deg",
            AngleUnit::Gons => "gon",
        }
    }
}

impl std::str::FromStr for AngleUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deg" | "degree" | "degrees" => Ok(AngleUnit::Degrees),
            "gon" | "gons" | "grad" | "grads" => Ok(AngleUnit::Gons),
            other => Err(format!("unknown angle unit '{}' (expected deg or gon)", other)),
        }
    }
}

// ============================================================================
// Arithmetic Implementations (macro to reduce boilerplate)
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Create from raw f64 value
            pub fn new(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

impl_arithmetic!(Degrees);
impl_arithmetic!(Gons);
impl_arithmetic!(Radians);
