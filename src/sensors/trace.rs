//! Recorded sensor traces
//!
//! A trace is newline-delimited JSON, one `SensorEvent` per line:
//!
//! ```text
//! # walk past the neighbours
//! {"kind":"location","location":{"latitude":33.6054,"longitude":-112.3649},"timestamp_ms":0}
//! {"kind":"accelerometer","values":[0.0,9.81,0.0],"timestamp_ms":20}
//! {"kind":"magnetometer","values":[-8.2,-40.0,-20.4],"timestamp_ms":20}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.
//!
//! Timestamps are relative. Declination follows the wall clock unless the
//! driver is given a replay epoch (`EngineDriver::with_replay_epoch`).

use crate::api::events::SensorEvent;
use crate::sensors::SensorSource;
use crate::validation::{EngineError, EngineResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, trace};

pub struct RecordedTrace<R: BufRead> {
    reader: R,
    name: String,
    line_number: usize,
    buffer: String,
}

impl RecordedTrace<BufReader<File>> {
    /// Open a trace file
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EngineError::io(path.display().to_string(), e))?;
        info!(path = %path.display(), "trace_opened");
        let mut trace = RecordedTrace::new(BufReader::new(file));
        trace.name = path.display().to_string();
        Ok(trace)
    }
}

impl<R: BufRead> RecordedTrace<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            name: "<reader>".to_string(),
            line_number: 0,
            buffer: String::new(),
        }
    }

    /// One-based number of the last line read
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read and decode every remaining event, stopping at the first bad line
    pub fn read_all(&mut self) -> EngineResult<Vec<SensorEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }
}

impl<R: BufRead> SensorSource for RecordedTrace<R> {
    fn next_event(&mut self) -> EngineResult<Option<SensorEvent>> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_line(&mut self.buffer)
                .map_err(|e| EngineError::io(self.name.clone(), e))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let event: SensorEvent = serde_json::from_str(line).map_err(|e| EngineError::TraceParse {
                line: self.line_number,
                reason: e.to_string(),
            })?;
            trace!(line = self.line_number, ?event, "trace_event");
            return Ok(Some(event));
        }
    }

    fn describe(&self) -> String {
        format!("trace {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Location;
    use std::io::{Cursor, Write};

    const SAMPLE: &str = r#"
# header comment
{"kind":"location","location":{"latitude":33.6054,"longitude":-112.3649},"timestamp_ms":0}

{"kind":"accelerometer","values":[0.0,9.81,0.0],"timestamp_ms":20}
{"kind":"magnetometer","values":[-8.2,-40.0,-20.4],"timestamp_ms":20}
"#;

    #[test]
    fn test_reads_events_and_skips_comments() {
        let mut trace = RecordedTrace::new(Cursor::new(SAMPLE));
        let events = trace.read_all().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            SensorEvent::Location {
                location: Location::new(33.6054, -112.3649),
                timestamp_ms: 0
            }
        );
        assert_eq!(trace.line_number(), 6);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let text = "{\"kind\":\"shutdown\"}\n\n{\"kind\":\"gyroscope\",\"values\":[0,0,0]}\n";
        let mut trace = RecordedTrace::new(Cursor::new(text));
        assert_eq!(trace.next_event().unwrap(), Some(SensorEvent::Shutdown));
        match trace.next_event() {
            Err(EngineError::TraceParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let mut trace = RecordedTrace::open(file.path()).unwrap();
        assert_eq!(trace.read_all().unwrap().len(), 3);
        assert!(trace.describe().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.jsonl");
        assert!(matches!(RecordedTrace::open(&missing), Err(EngineError::Io { .. })));
    }
}
