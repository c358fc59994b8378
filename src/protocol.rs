//! JSON body parsers for the OpenSky REST responses.
//!
//! State rows arrive as heterogeneous arrays, so they are decoded by
//! position rather than by field name:
//!
//! ```text
//! [ icao24, callsign, origin_country, time_position, last_contact,
//!   longitude, latitude, baro_altitude, on_ground, velocity,
//!   true_track, vertical_rate, sensors, geo_altitude, squawk,
//!   spi, position_source, category ]
//! ```

use crate::types::{FlightHistoryEntry, StateVector};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("State row {row} has {len} fields, need at least {}", MIN_STATE_FIELDS)]
    ShortRow { row: usize, len: usize },
    #[error("State row {row} has no icao24 address")]
    MissingIcao { row: usize },
}

const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;
const IDX_GEO_ALTITUDE: usize = 13;
const IDX_SPI: usize = 15;
/// Only present when the query asked for `extended=1`
const IDX_CATEGORY: usize = 17;

/// Rows shorter than this are missing the SPI flag
const MIN_STATE_FIELDS: usize = IDX_SPI + 1;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    #[serde(default)]
    states: Option<Vec<Vec<Value>>>,
}

/// Parse a `/api/states/all` body.
///
/// A `null` or missing `states` list is the normal "no traffic" answer and
/// yields an empty vector.
pub fn parse_states(data: &[u8]) -> Result<Vec<StateVector>, ParseError> {
    let response: StatesResponse = serde_json::from_slice(data)?;

    response
        .states
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(row, fields)| parse_state_row(row, fields))
        .collect()
}

fn parse_state_row(row: usize, fields: &[Value]) -> Result<StateVector, ParseError> {
    if fields.len() < MIN_STATE_FIELDS {
        return Err(ParseError::ShortRow {
            row,
            len: fields.len(),
        });
    }

    let icao24 = fields[IDX_ICAO24]
        .as_str()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingIcao { row })?;

    Ok(StateVector {
        icao24,
        callsign: trimmed(fields[IDX_CALLSIGN].as_str()),
        true_track: fields[IDX_TRUE_TRACK].as_f64(),
        baro_altitude: fields[IDX_BARO_ALTITUDE].as_f64(),
        geo_altitude: fields[IDX_GEO_ALTITUDE].as_f64(),
        velocity: fields[IDX_VELOCITY].as_f64(),
        spi: fields[IDX_SPI].as_bool().unwrap_or(false),
        category_code: fields
            .get(IDX_CATEGORY)
            .and_then(Value::as_i64)
            .unwrap_or(0),
    })
}

/// Parse a `/api/flights/aircraft` body and return the most recent entry.
///
/// The service lists flights newest first; an empty list means no history.
pub fn parse_flights(data: &[u8]) -> Result<Option<FlightHistoryEntry>, ParseError> {
    let flights: Vec<FlightHistoryEntry> = serde_json::from_slice(data)?;

    Ok(flights.into_iter().next().map(|mut entry| {
        entry.callsign = trimmed(entry.callsign.as_deref());
        entry.est_departure_airport = trimmed(entry.est_departure_airport.as_deref());
        entry.est_arrival_airport = trimmed(entry.est_arrival_airport.as_deref());
        entry
    }))
}

/// Callsigns are space padded to eight characters.
fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES_BODY: &str = r#"{
        "time": 1700000000,
        "states": [
            ["a1b2c3", "JBU123  ", "United States", 1700000000, 1700000000,
             -71.3, 41.73, 1219.2, false, 112.5, 271.3, -3.2, null, 1249.68,
             "1200", false, 0, 4],
            ["abc123", "", "United States", null, 1700000000,
             null, null, null, true, 0, null, null, null, null,
             null, true, 0]
        ]
    }"#;

    #[test]
    fn test_parse_states() {
        let states = parse_states(STATES_BODY.as_bytes()).unwrap();
        assert_eq!(states.len(), 2);

        let first = &states[0];
        assert_eq!(first.icao24, "a1b2c3");
        assert_eq!(first.callsign.as_deref(), Some("JBU123"));
        assert_eq!(first.baro_altitude, Some(1219.2));
        assert_eq!(first.velocity, Some(112.5));
        assert_eq!(first.true_track, Some(271.3));
        assert_eq!(first.geo_altitude, Some(1249.68));
        assert!(!first.spi);
        assert_eq!(first.category_code, 4);

        // Non-extended row: no category column
        let second = &states[1];
        assert_eq!(second.callsign, None);
        assert_eq!(second.true_track, None);
        assert_eq!(second.velocity, Some(0.0));
        assert!(second.spi);
        assert_eq!(second.category_code, 0);
    }

    #[test]
    fn test_parse_states_null_list_is_empty() {
        let states = parse_states(br#"{"time": 1700000000, "states": null}"#).unwrap();
        assert!(states.is_empty());

        let states = parse_states(br#"{"time": 1700000000}"#).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn test_parse_states_malformed() {
        assert!(matches!(
            parse_states(b"<html>Bad gateway</html>"),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse_states(br#"{"states": [["abc123", "X"]]}"#),
            Err(ParseError::ShortRow { row: 0, len: 2 })
        ));
        assert!(matches!(
            parse_states(
                br#"{"states": [[null, "X", "", 0, 0, 0, 0, 0, false, 0, 0, 0, null, 0, null, false]]}"#
            ),
            Err(ParseError::MissingIcao { row: 0 })
        ));
    }

    #[test]
    fn test_parse_flights_takes_first_entry() {
        let body = br#"[
            {"icao24": "abc123", "firstSeen": 1700000000, "callsign": "JBU123  ",
             "estDepartureAirport": "KJFK", "estArrivalAirport": "KBOS"},
            {"icao24": "abc123", "firstSeen": 1699990000, "callsign": "JBU99",
             "estDepartureAirport": "KBOS", "estArrivalAirport": null}
        ]"#;

        let entry = parse_flights(body).unwrap().unwrap();
        assert_eq!(entry.icao24, "abc123");
        assert_eq!(entry.callsign.as_deref(), Some("JBU123"));
        assert_eq!(entry.est_departure_airport.as_deref(), Some("KJFK"));
        assert_eq!(entry.est_arrival_airport.as_deref(), Some("KBOS"));
    }

    #[test]
    fn test_parse_flights_empty_and_nulls() {
        assert_eq!(parse_flights(b"[]").unwrap(), None);

        let entry = parse_flights(
            br#"[{"icao24": "abc123", "callsign": null, "estDepartureAirport": null}]"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.callsign, None);
        assert_eq!(entry.est_departure_airport, None);
        assert_eq!(entry.est_arrival_airport, None);
    }
}
