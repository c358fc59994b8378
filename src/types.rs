//! Core data types for OpenSky state polling.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("coordinates must be finite")]
    NotFinite,
    #[error("latitude range is empty: {min} >= {max}")]
    EmptyLatitude { min: f64, max: f64 },
    #[error("longitude range is empty: {min} >= {max}")]
    EmptyLongitude { min: f64, max: f64 },
}

/// Rectangular lat/lon region used to scope a state query.
///
/// Always satisfies `lat_min < lat_max` and `lon_min < lon_max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    lat_min: f64,
    lon_min: f64,
    lat_max: f64,
    lon_max: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting empty or non-finite ranges.
    pub fn new(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Result<Self, BoundsError> {
        if ![lat_min, lon_min, lat_max, lon_max].iter().all(|v| v.is_finite()) {
            return Err(BoundsError::NotFinite);
        }
        if lat_min >= lat_max {
            return Err(BoundsError::EmptyLatitude {
                min: lat_min,
                max: lat_max,
            });
        }
        if lon_min >= lon_max {
            return Err(BoundsError::EmptyLongitude {
                min: lon_min,
                max: lon_max,
            });
        }
        Ok(Self {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        })
    }

    /// Literal boxes known to be valid at compile time.
    pub(crate) const fn from_literal(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        }
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    /// Query parameters in the order the states endpoint expects.
    pub(crate) fn to_query_string(&self) -> String {
        format!(
            "lamin={}&lomin={}&lamax={}&lomax={}",
            self.lat_min, self.lon_min, self.lat_max, self.lon_max
        )
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] .. [{}, {}]",
            self.lat_min, self.lon_min, self.lat_max, self.lon_max
        )
    }
}

/// One aircraft's snapshot from a state query.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    pub icao24: String,
    pub callsign: Option<String>,
    /// Degrees clockwise from north
    pub true_track: Option<f64>,
    /// Meters
    pub baro_altitude: Option<f64>,
    /// Meters
    pub geo_altitude: Option<f64>,
    /// Ground speed in m/s
    pub velocity: Option<f64>,
    pub spi: bool,
    pub category_code: i64,
}

/// Most recent flight known for an aircraft in the trailing window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightHistoryEntry {
    pub icao24: String,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub est_departure_airport: Option<String>,
    #[serde(default)]
    pub est_arrival_airport: Option<String>,
}

/// A state vector joined with its history and category label.
///
/// Callsign and airports come from the flight history; they stay `None`
/// when no history was available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub icao24: String,
    pub callsign: Option<String>,
    #[serde(rename = "true track (degrees)")]
    pub true_track: Option<f64>,
    #[serde(rename = "barometric altitude (m)")]
    pub baro_altitude: Option<f64>,
    #[serde(rename = "geometric altitude (m)")]
    pub geo_altitude: Option<f64>,
    #[serde(rename = "ground velocity (m/s)")]
    pub velocity: Option<f64>,
    #[serde(rename = "departure airport")]
    pub departure_airport: Option<String>,
    #[serde(rename = "arrival airport")]
    pub arrival_airport: Option<String>,
    #[serde(skip)]
    pub category_code: i64,
    pub category: String,
    #[serde(rename = "SPI")]
    pub spi: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_query_string() {
        let bbox = BoundingBox::new(41.146, -71.862, 42.018, -71.12).unwrap();
        assert_eq!(
            bbox.to_query_string(),
            "lamin=41.146&lomin=-71.862&lamax=42.018&lomax=-71.12"
        );
    }

    #[test]
    fn test_bounding_box_rejects_empty_ranges() {
        assert_eq!(
            BoundingBox::new(42.0, -71.0, 41.0, -70.0),
            Err(BoundsError::EmptyLatitude { min: 42.0, max: 41.0 })
        );
        assert_eq!(
            BoundingBox::new(41.0, -70.0, 42.0, -70.0),
            Err(BoundsError::EmptyLongitude { min: -70.0, max: -70.0 })
        );
        assert_eq!(
            BoundingBox::new(f64::NAN, -71.0, 42.0, -70.0),
            Err(BoundsError::NotFinite)
        );
    }

    #[test]
    fn test_record_serializes_with_display_keys() {
        let record = EnrichedRecord {
            icao24: "abc123".to_string(),
            callsign: Some("JBU123".to_string()),
            true_track: Some(90.5),
            baro_altitude: Some(1000.0),
            geo_altitude: None,
            velocity: Some(120.0),
            departure_airport: Some("KPVD".to_string()),
            arrival_airport: None,
            category_code: 4,
            category: "Large (75-300K lbs)".to_string(),
            spi: false,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["true track (degrees)"], 90.5);
        assert_eq!(value["departure airport"], "KPVD");
        assert!(value["arrival airport"].is_null());
        assert_eq!(value["SPI"], false);
        assert!(value.get("category_code").is_none());
    }
}
