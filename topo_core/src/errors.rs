//! # Error Types
//!
//! Structured error types for topo_core. Validation failures carry the
//! station ids involved so a caller can point at the offending row in the
//! input tables.
//!
//! Two tiers exist:
//!
//! - [`SurveyError`] - what went wrong
//! - [`Diagnostic`] - which traverse or sideshot group it happened to, and
//!   in which phase. The orchestrator collects these instead of aborting.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::errors::{SurveyError, SurveyResult};
//!
//! fn validate_distance(distance: f64) -> SurveyResult<()> {
//!     if !distance.is_finite() || distance < 0.0 {
//!         return Err(SurveyError::invalid_input(
//!             "distance",
//!             distance.to_string(),
//!             "Distance must be a finite, non-negative number",
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_distance(-1.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::Phase;

/// Result type alias for topo_core operations
pub type SurveyResult<T> = Result<T, SurveyError>;

/// Structured error type for survey computations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum SurveyError {
    /// An input value is invalid (non-finite, negative, malformed)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A station id is not present in the station registry
    #[error("Unknown station: {station}")]
    UnknownStation { station: String },

    /// No measurement row exists for a leg of a traverse
    #[error("Missing measurement for leg {from} -> {to}")]
    MissingLeg { from: String, to: String },

    /// A traverse anchor could not be resolved to known coordinates
    #[error("Unresolved anchor {backsight} -> {station}: {reason}")]
    UnresolvedAnchor {
        backsight: String,
        station: String,
        reason: String,
    },

    /// The station sequence does not describe a usable traverse
    #[error("Invalid geometry for '{entity}': {reason}")]
    InvalidGeometry { entity: String, reason: String },

    /// Two different coordinates were produced for the same station id
    #[error("Duplicate station '{station}': ({existing_e:.4}, {existing_n:.4}) vs ({incoming_e:.4}, {incoming_n:.4})")]
    DuplicateStation {
        station: String,
        existing_e: f64,
        existing_n: f64,
        incoming_e: f64,
        incoming_n: f64,
    },

    /// Settings or working context cannot be determined
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON or CSV (de)serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SurveyError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        SurveyError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        SurveyError::MissingField {
            field: field.into(),
        }
    }

    /// Create an UnknownStation error
    pub fn unknown_station(station: impl Into<String>) -> Self {
        SurveyError::UnknownStation {
            station: station.into(),
        }
    }

    /// Create a MissingLeg error
    pub fn missing_leg(from: impl Into<String>, to: impl Into<String>) -> Self {
        SurveyError::MissingLeg {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an UnresolvedAnchor error
    pub fn unresolved_anchor(backsight: impl Into<String>, station: impl Into<String>, reason: impl Into<String>) -> Self {
        SurveyError::UnresolvedAnchor {
            backsight: backsight.into(),
            station: station.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidGeometry error
    pub fn invalid_geometry(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        SurveyError::InvalidGeometry {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create a Configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        SurveyError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        SurveyError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Validation errors exclude a single entity; the batch carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SurveyError::InvalidInput { .. }
                | SurveyError::MissingField { .. }
                | SurveyError::UnknownStation { .. }
                | SurveyError::MissingLeg { .. }
                | SurveyError::UnresolvedAnchor { .. }
                | SurveyError::InvalidGeometry { .. }
                | SurveyError::DuplicateStation { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            SurveyError::InvalidInput { .. } => "INVALID_INPUT",
            SurveyError::MissingField { .. } => "MISSING_FIELD",
            SurveyError::UnknownStation { .. } => "UNKNOWN_STATION",
            SurveyError::MissingLeg { .. } => "MISSING_LEG",
            SurveyError::UnresolvedAnchor { .. } => "UNRESOLVED_ANCHOR",
            SurveyError::InvalidGeometry { .. } => "INVALID_GEOMETRY",
            SurveyError::DuplicateStation { .. } => "DUPLICATE_STATION",
            SurveyError::Configuration { .. } => "CONFIGURATION_ERROR",
            SurveyError::FileError { .. } => "FILE_ERROR",
            SurveyError::SerializationError { .. } => "SERIALIZATION_ERROR",
            SurveyError::VersionMismatch { .. } => "VERSION_MISMATCH",
            SurveyError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// The entity a diagnostic refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum EntityRef {
    /// A traverse, by its `traverse_id`
    Traverse { id: String },
    /// A sideshot group, by its `(station, backsight)` key
    SideshotGroup { station: String, backsight: String },
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Traverse { id } => write!(f, "traverse {}", id),
            EntityRef::SideshotGroup { station, backsight } => {
                write!(f, "sideshots {}/{}", station, backsight)
            }
        }
    }
}

/// An entity that was excluded from computation (or a merge conflict that
/// was resolved by policy), recorded alongside the successful results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub entity: EntityRef,
    pub phase: Phase,
    pub error: SurveyError,
    /// The entity was still computed; the merge policy settled the conflict
    #[serde(default)]
    pub resolved: bool,
}

impl Diagnostic {
    /// An entity left out of the results
    pub fn new(entity: EntityRef, phase: Phase, error: SurveyError) -> Self {
        Diagnostic {
            entity,
            phase,
            error,
            resolved: false,
        }
    }

    /// A merge conflict the policy resolved; the entity's results are kept
    pub fn resolved(entity: EntityRef, phase: Phase, error: SurveyError) -> Self {
        Diagnostic {
            resolved: true,
            ..Diagnostic::new(entity, phase, error)
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.phase, self.entity, self.error)
    }
}
