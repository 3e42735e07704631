//! # Telemetry Stream
//!
//! Line protocol between the control task and an offline consumer, one
//! record per control iteration:
//!
//! ```text
//! <source-tag>,<elapsed-ms>,<position>\r\n
//! ```
//!
//! A single sentinel line, [`SENTINEL`], ends the stream. Consumers stop
//! reading when they see it and skip lines they cannot parse.

use core::cell::{Cell, RefCell};
use core::fmt;

/// End-of-stream marker, written exactly once.
pub const SENTINEL: &str = "Stahp\r\n";

/// One sample of a step response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub source: &'a str,
    pub elapsed_ms: u64,
    pub position: i32,
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}\r\n", self.source, self.elapsed_ms, self.position)
    }
}

/// A parsed line of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Record(Record<'a>),
    Stop,
}

/// Parse one line (with or without its terminator).
///
/// Returns `None` for anything that is neither the sentinel nor a
/// well-formed record; whitespace around numeric fields is tolerated.
pub fn parse_line(line: &str) -> Option<Line<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == SENTINEL.trim_end() {
        return Some(Line::Stop);
    }

    let mut fields = line.splitn(3, ',');
    let source = fields.next()?;
    let elapsed_ms = fields.next()?.trim().parse().ok()?;
    let position = fields.next()?.trim().parse().ok()?;
    Some(Line::Record(Record {
        source,
        elapsed_ms,
        position,
    }))
}

/// Serial writer shared by reference between a task and the shutdown path.
///
/// Once [`SerialLog::stop`] has written the sentinel, further records are
/// discarded so consumers never see data after the end marker.
pub struct SerialLog<W: fmt::Write> {
    out: RefCell<W>,
    stopped: Cell<bool>,
    written: Cell<u32>,
}

impl<W: fmt::Write> SerialLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
            stopped: Cell::new(false),
            written: Cell::new(0),
        }
    }

    /// Write one record; a no-op after `stop`.
    pub fn record(&self, record: &Record<'_>) -> fmt::Result {
        if self.stopped.get() {
            return Ok(());
        }
        write!(self.out.borrow_mut(), "{}", record)?;
        self.written.set(self.written.get().saturating_add(1));
        Ok(())
    }

    /// Write the sentinel. Returns `Ok(true)` the first time, `Ok(false)`
    /// if the stream was already stopped.
    pub fn stop(&self) -> Result<bool, fmt::Error> {
        if self.stopped.replace(true) {
            return Ok(false);
        }
        self.out.borrow_mut().write_str(SENTINEL)?;
        Ok(true)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Records written so far.
    pub fn records_written(&self) -> u32 {
        self.written.get()
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Consumer side (host)
// ---------------------------------------------------------------------------

#[cfg(feature = "std")]
pub use collect::StepResponse;

#[cfg(feature = "std")]
mod collect {
    use super::{parse_line, Line};
    use std::io::{self, BufRead};
    use std::string::{String, ToString};
    use std::vec::Vec;

    /// Step-response samples grouped by source tag, collected until the
    /// sentinel.
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    pub struct StepResponse {
        series: Vec<(String, Vec<(u64, i32)>)>,
        finished: bool,
        skipped: usize,
    }

    impl StepResponse {
        pub fn new() -> Self {
            Self::default()
        }

        /// Feed one line. Returns `false` once the sentinel has been seen;
        /// later lines are ignored.
        pub fn feed(&mut self, line: &str) -> bool {
            if self.finished {
                return false;
            }
            match parse_line(line) {
                Some(Line::Stop) => {
                    self.finished = true;
                    return false;
                }
                Some(Line::Record(r)) => {
                    let idx = match self.series.iter().position(|(s, _)| s == r.source) {
                        Some(idx) => idx,
                        None => {
                            self.series.push((r.source.to_string(), Vec::new()));
                            self.series.len() - 1
                        }
                    };
                    self.series[idx].1.push((r.elapsed_ms, r.position));
                }
                None => {
                    log::debug!("skipping malformed telemetry line {:?}", line);
                    self.skipped += 1;
                }
            }
            true
        }

        /// Read lines from `reader` until the sentinel or end of input.
        pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
            let mut response = Self::new();
            for line in reader.lines() {
                if !response.feed(&line?) {
                    break;
                }
            }
            Ok(response)
        }

        /// Samples of one source as `(elapsed_ms, position)`.
        pub fn series(&self, source: &str) -> Option<&[(u64, i32)]> {
            self.series
                .iter()
                .find(|(s, _)| s == source)
                .map(|(_, v)| v.as_slice())
        }

        pub fn sources(&self) -> impl Iterator<Item = &str> {
            self.series.iter().map(|(s, _)| s.as_str())
        }

        pub fn is_finished(&self) -> bool {
            self.finished
        }

        /// Lines that were neither records nor the sentinel.
        pub fn skipped(&self) -> usize {
            self.skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[test]
    fn test_record_format() {
        let r = Record {
            source: "Motor 1",
            elapsed_ms: 120,
            position: -42,
        };
        let mut s = String::new();
        fmt::write(&mut s, format_args!("{}", r)).unwrap();
        assert_eq!(s, "Motor 1,120,-42\r\n");
    }

    #[test]
    fn test_parse_record_and_sentinel() {
        assert_eq!(
            parse_line("Motor 2,15, 300 \r\n"),
            Some(Line::Record(Record {
                source: "Motor 2",
                elapsed_ms: 15,
                position: 300
            }))
        );
        assert_eq!(parse_line("Stahp\r\n"), Some(Line::Stop));
        assert_eq!(parse_line("Stahp"), Some(Line::Stop));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("Motor 1,abc,3"), None);
        assert_eq!(parse_line("Motor 1,12"), None);
        assert_eq!(parse_line("Motor 1,12,3,4"), None);
    }

    #[test]
    fn test_sentinel_written_once() {
        let log = SerialLog::new(String::new());
        let rec = Record {
            source: "Motor 1",
            elapsed_ms: 0,
            position: 0,
        };
        log.record(&rec).unwrap();
        assert_eq!(log.stop(), Ok(true));
        assert_eq!(log.stop(), Ok(false));
        log.record(&rec).unwrap();

        assert_eq!(log.records_written(), 1);
        assert_eq!(log.into_inner(), "Motor 1,0,0\r\nStahp\r\n");
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_step_response_collects_until_sentinel() {
        let input = "Motor 1,0,0\r\n\
                     Motor 2,0,5\r\n\
                     garbage\r\n\
                     Motor 1,10,80\r\n\
                     Stahp\r\n\
                     Motor 1,20,160\r\n";
        let resp = StepResponse::from_reader(input.as_bytes()).unwrap();

        assert!(resp.is_finished());
        assert_eq!(resp.skipped(), 1);
        assert_eq!(resp.series("Motor 1"), Some(&[(0, 0), (10, 80)][..]));
        assert_eq!(resp.series("Motor 2"), Some(&[(0, 5)][..]));
        assert_eq!(resp.sources().count(), 2);
    }
}
