//! # Input Tables
//!
//! Row types for the four tabular inputs, plus CSV (de)serialization over
//! any reader/writer. Column names match the field names below.
//!
//! | Table                   | Columns                                          |
//! |-------------------------|--------------------------------------------------|
//! | `Known_Points`          | `station_id, easting, northing`                  |
//! | `Traverses`             | `traverse_id, t_type, stations`                  |
//! | `Traverse_Measurements` | `from_station, to_station, angle, distance`      |
//! | `Sideshots`             | `station, backsight, target, angle, distance`    |
//!
//! `stations` is a hyphen-delimited list such as `K1-K2-S1-S2-K3-K4`.
//!
//! ## Example
//!
//! ```rust
//! use topo_core::tables::{read_csv, TraverseRow};
//! use topo_core::calculations::TraverseKind;
//!
//! let data = "traverse_id,t_type,stations\nT1,LinkTraverse,K1-K2-S1-K3-K4\n";
//! let rows: Vec<TraverseRow> = read_csv(data.as_bytes()).unwrap();
//! assert_eq!(rows[0].t_type, TraverseKind::Link);
//! assert_eq!(rows[0].stops(), vec!["K1", "K2", "S1", "K3", "K4"]);
//! ```

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::calculations::TraverseKind;
use crate::errors::{SurveyError, SurveyResult};

/// Separator between station ids in the `stations` column
pub const STATION_SEPARATOR: char = '-';

/// A row of `Known_Points`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownPointRow {
    pub station_id: String,
    pub easting: f64,
    pub northing: f64,
}

impl KnownPointRow {
    pub fn new(station_id: impl Into<String>, easting: f64, northing: f64) -> Self {
        KnownPointRow {
            station_id: station_id.into(),
            easting,
            northing,
        }
    }
}

/// A row of `Traverses`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraverseRow {
    pub traverse_id: String,
    pub t_type: TraverseKind,
    /// Hyphen-delimited station ids in occupation order
    pub stations: String,
}

impl TraverseRow {
    pub fn new(traverse_id: impl Into<String>, t_type: TraverseKind, stations: impl Into<String>) -> Self {
        TraverseRow {
            traverse_id: traverse_id.into(),
            t_type,
            stations: stations.into(),
        }
    }

    /// The station list split into ids.
    ///
    /// Blank segments are kept (as empty strings) so validation can report
    /// them instead of silently shortening the traverse.
    pub fn stops(&self) -> Vec<String> {
        self.stations
            .split(STATION_SEPARATOR)
            .map(|s| s.trim().to_string())
            .collect()
    }
}

/// A row of `Traverse_Measurements`.
///
/// `angle` is observed at `from_station`, turned from the incoming line to
/// `to_station`; `distance` is the horizontal distance `from -> to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub from_station: String,
    pub to_station: String,
    pub angle: f64,
    pub distance: f64,
}

impl MeasurementRow {
    pub fn new(from_station: impl Into<String>, to_station: impl Into<String>, angle: f64, distance: f64) -> Self {
        MeasurementRow {
            from_station: from_station.into(),
            to_station: to_station.into(),
            angle,
            distance,
        }
    }
}

/// A sideshot observation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideshotRow {
    pub station: String,
    #[serde(alias = "bs")]
    pub backsight: String,
    pub target: String,
    pub angle: f64,
    pub distance: f64,
}

impl SideshotRow {
    pub fn new(
        station: impl Into<String>,
        backsight: impl Into<String>,
        target: impl Into<String>,
        angle: f64,
        distance: f64,
    ) -> Self {
        SideshotRow {
            station: station.into(),
            backsight: backsight.into(),
            target: target.into(),
            angle,
            distance,
        }
    }
}

/// Deserialize every record of a headed CSV stream.
pub fn read_csv<T: DeserializeOwned, R: Read>(reader: R) -> SurveyResult<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize().enumerate() {
        let row: T = record.map_err(|e| SurveyError::SerializationError {
            reason: format!("CSV record {}: {}", i + 1, e),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Serialize rows as a headed CSV stream.
pub fn write_csv<T: Serialize, W: Write>(writer: W, rows: &[T]) -> SurveyResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(|e| SurveyError::SerializationError {
            reason: e.to_string(),
        })?;
    }
    wtr.flush().map_err(|e| SurveyError::SerializationError {
        reason: e.to_string(),
    })
}
