//! Record assembly and output sinks.

use crate::types::{EnrichedRecord, FlightHistoryEntry, StateVector};
use parking_lot::Mutex;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;

/// Join a state vector with its (possibly missing) history and label.
pub fn build_record(
    state: &StateVector,
    history: Option<&FlightHistoryEntry>,
    category: String,
) -> EnrichedRecord {
    EnrichedRecord {
        icao24: state.icao24.clone(),
        callsign: history.and_then(|h| h.callsign.clone()),
        true_track: state.true_track,
        baro_altitude: state.baro_altitude,
        geo_altitude: state.geo_altitude,
        velocity: state.velocity,
        departure_airport: history.and_then(|h| h.est_departure_airport.clone()),
        arrival_airport: history.and_then(|h| h.est_arrival_airport.clone()),
        category_code: state.category_code,
        category,
        spi: state.spi,
    }
}

/// Destination for enriched records.
///
/// Implementations serialize concurrent calls; records from one emitter
/// arrive in emit order.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: EnrichedRecord);
}

impl<S: RecordSink + ?Sized> RecordSink for Arc<S> {
    fn emit(&self, record: EnrichedRecord) {
        (**self).emit(record)
    }
}

/// Accumulates records in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EnrichedRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> Vec<EnrichedRecord> {
        self.records.lock().clone()
    }

    /// Take everything collected so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<EnrichedRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn into_records(self) -> Vec<EnrichedRecord> {
        self.records.into_inner()
    }
}

impl RecordSink for CollectingSink {
    fn emit(&self, record: EnrichedRecord) {
        self.records.lock().push(record);
    }
}

/// Writes each record as a human-readable block.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_block(out: &mut W, record: &EnrichedRecord) -> io::Result<()> {
        writeln!(out, "=====================")?;
        writeln!(out, "Callsign: {}", blank(&record.callsign))?;
        writeln!(out, "True track: {} degrees", blank(&record.true_track))?;
        writeln!(out, "Barometric altitude: {} m", blank(&record.baro_altitude))?;
        writeln!(out, "Geometric altitude: {} m", blank(&record.geo_altitude))?;
        writeln!(out, "Ground velocity: {} m/s", blank(&record.velocity))?;
        writeln!(out, "Departure airport: {}", blank(&record.departure_airport))?;
        writeln!(out, "Arrival airport: {}", blank(&record.arrival_airport))?;
        writeln!(out, "Category: {}", record.category)?;
        writeln!(out, "SPI? {}", record.spi)?;
        out.flush()
    }
}

impl<W: Write + Send> RecordSink for ConsoleSink<W> {
    fn emit(&self, record: EnrichedRecord) {
        let mut out = self.out.lock();
        if let Err(e) = Self::write_block(&mut *out, &record) {
            tracing::warn!("Failed to write record for {}: {}", record.icao24, e);
        }
    }
}

fn blank<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Forwards every record to two sinks.
pub struct TeeSink<A, B> {
    first: A,
    second: B,
}

impl<A: RecordSink, B: RecordSink> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: RecordSink, B: RecordSink> RecordSink for TeeSink<A, B> {
    fn emit(&self, record: EnrichedRecord) {
        self.first.emit(record.clone());
        self.second.emit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> StateVector {
        StateVector {
            icao24: "abc123".to_string(),
            callsign: Some("STATE1".to_string()),
            true_track: Some(271.3),
            baro_altitude: Some(1219.2),
            geo_altitude: Some(1249.68),
            velocity: Some(112.5),
            spi: true,
            category_code: 6,
        }
    }

    fn history() -> FlightHistoryEntry {
        FlightHistoryEntry {
            icao24: "abc123".to_string(),
            callsign: Some("JBU123".to_string()),
            est_departure_airport: Some("KJFK".to_string()),
            est_arrival_airport: Some("KPVD".to_string()),
        }
    }

    #[test]
    fn test_build_record_with_history() {
        let record = build_record(&state(), Some(&history()), "Heavy (> 300K lbs)".to_string());
        assert_eq!(record.icao24, "abc123");
        assert_eq!(record.callsign.as_deref(), Some("JBU123"));
        assert_eq!(record.departure_airport.as_deref(), Some("KJFK"));
        assert_eq!(record.arrival_airport.as_deref(), Some("KPVD"));
        assert_eq!(record.true_track, Some(271.3));
        assert_eq!(record.category, "Heavy (> 300K lbs)");
        assert!(record.spi);
    }

    #[test]
    fn test_build_record_without_history_keeps_state_fields() {
        let record = build_record(&state(), None, "Heavy (> 300K lbs)".to_string());
        assert_eq!(record.callsign, None);
        assert_eq!(record.departure_airport, None);
        assert_eq!(record.arrival_airport, None);
        assert_eq!(record.baro_altitude, Some(1219.2));
        assert_eq!(record.geo_altitude, Some(1249.68));
        assert_eq!(record.velocity, Some(112.5));
        assert_eq!(record.category_code, 6);
    }

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        for icao in ["aaaaaa", "bbbbbb", "aaaaaa"] {
            let mut state = state();
            state.icao24 = icao.to_string();
            sink.emit(build_record(&state, None, "Unknown".to_string()));
        }

        let icaos: Vec<_> = sink.snapshot().into_iter().map(|r| r.icao24).collect();
        assert_eq!(icaos, ["aaaaaa", "bbbbbb", "aaaaaa"]);
        assert_eq!(sink.drain().len(), 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_console_sink_renders_blanks() {
        let sink = ConsoleSink::new(Vec::new());
        sink.emit(build_record(&state(), None, "Heavy (> 300K lbs)".to_string()));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "=====================",
                "Callsign: ",
                "True track: 271.3 degrees",
                "Barometric altitude: 1219.2 m",
                "Geometric altitude: 1249.68 m",
                "Ground velocity: 112.5 m/s",
                "Departure airport: ",
                "Arrival airport: ",
                "Category: Heavy (> 300K lbs)",
                "SPI? true",
            ]
        );
    }

    #[test]
    fn test_tee_sink_feeds_both() {
        let first = Arc::new(CollectingSink::new());
        let second = Arc::new(CollectingSink::new());
        let tee = TeeSink::new(Arc::clone(&first), Arc::clone(&second));

        tee.emit(build_record(&state(), Some(&history()), "Unknown".to_string()));

        assert_eq!(first.len(), 1);
        assert_eq!(second.snapshot(), first.snapshot());
    }
}
