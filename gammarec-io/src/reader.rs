//! Raw event tables and pair observation files.

use crate::columns::{raw_columns, RawField, REFERENCE_TIME};
use crate::{Error, Result};
use gammarec_core::{DetectorSetup, RawEvent};
use log::debug;
use memmap2::Mmap;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Streaming reader of a raw CSV event table.
///
/// Columns are matched by name, so their order is free. Every channel of
/// the setup needs its columns; `reference_time` may be left out, and
/// unknown columns are ignored. Empty cells mean NaN (or zero counts).
pub struct RawEventReader<R> {
    lines: Lines<R>,
    layout: Vec<Option<RawField>>,
    n_samples: usize,
    n_counters: usize,
    line: usize,
}

impl RawEventReader<BufReader<File>> {
    /// Opens a raw CSV file.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or its header does not match.
    pub fn open<P: AsRef<Path>>(setup: &DetectorSetup, path: P) -> Result<Self> {
        Self::new(setup, BufReader::new(File::open(path)?))
    }
}

impl<R: BufRead> RawEventReader<R> {
    /// Reads the header from `reader`.
    ///
    /// # Errors
    /// Fails if the header is missing, repeats a column, or lacks a channel
    /// column of the setup.
    pub fn new(setup: &DetectorSetup, reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let missing = || Error::InvalidFormat("raw table has no header".to_string());
        let header = lines.next().ok_or_else(missing)??;

        let mut expected: HashMap<String, RawField> = raw_columns(setup).into_iter().collect();
        let mut seen = HashSet::new();
        let mut layout = Vec::new();
        for name in header.split(',').map(str::trim) {
            if !seen.insert(name) {
                let message = format!("column '{name}' appears twice");
                return Err(Error::InvalidFormat(message));
            }
            let field = expected.remove(name);
            if field.is_none() {
                debug!("ignoring raw column '{name}'");
            }
            layout.push(field);
        }
        expected.remove(REFERENCE_TIME);
        if let Some(missing) = expected.keys().min() {
            return Err(Error::InvalidFormat(format!(
                "raw table lacks column '{missing}' ({} missing)",
                expected.len()
            )));
        }

        Ok(Self {
            lines,
            layout,
            n_samples: setup.n_samples(),
            n_counters: setup.n_counters(),
            line: 1,
        })
    }

    fn parse(&self, row: &str) -> Result<RawEvent> {
        let cells: Vec<&str> = row.split(',').map(str::trim).collect();
        if cells.len() != self.layout.len() {
            return Err(Error::InvalidFormat(format!(
                "line {}: {} cells, header has {}",
                self.line,
                cells.len(),
                self.layout.len()
            )));
        }

        let mut event = RawEvent::empty(self.n_samples, self.n_counters);
        for (cell, field) in cells.iter().zip(&self.layout) {
            let Some(field) = field else { continue };
            match *field {
                RawField::ReferenceTime => event.reference_time = self.float(cell)?,
                RawField::Amplitude(n) => event.samples[n].amplitude = self.float(cell)?,
                RawField::Time(n) => event.samples[n].time = self.float(cell)?,
                RawField::Timestamp(n) => event.samples[n].timestamp = self.float(cell)?,
                RawField::Counts(n) => {
                    event.counts[n] = if cell.is_empty() {
                        0
                    } else {
                        cell.parse().map_err(|e| {
                            Error::InvalidFormat(format!("line {}: '{cell}': {e}", self.line))
                        })?
                    };
                }
            }
        }
        Ok(event)
    }

    fn float(&self, cell: &str) -> Result<f64> {
        if cell.is_empty() {
            return Ok(f64::NAN);
        }
        cell.parse()
            .map_err(|e| Error::InvalidFormat(format!("line {}: '{cell}': {e}", self.line)))
    }
}

impl<R: BufRead> Iterator for RawEventReader<R> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse(&line));
        }
    }
}

/// Reads a whole raw CSV file.
///
/// # Errors
/// Fails on the first malformed line.
pub fn read_raw_events<P: AsRef<Path>>(setup: &DetectorSetup, path: P) -> Result<Vec<RawEvent>> {
    RawEventReader::open(setup, path)?.collect()
}

/// Memory-mapped binary pair file, as written by
/// [`DataFileWriter::write_pairs_binary`](crate::DataFileWriter::write_pairs_binary).
pub struct PairFileReader {
    mmap: Mmap,
    path: PathBuf,
}

/// Bytes per pair: two little-endian f64.
pub const PAIR_SIZE: usize = 16;

impl PairFileReader {
    /// Maps a pair file.
    ///
    /// # Errors
    /// Fails if the file cannot be mapped or its length is not a whole
    /// number of pairs.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() % PAIR_SIZE != 0 {
            return Err(Error::InvalidFormat(format!(
                "{}: {} bytes is not a multiple of {PAIR_SIZE}",
                path.as_ref().display(),
                mmap.len()
            )));
        }
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len() / PAIR_SIZE
    }

    /// Returns true if the file holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Iterates over the `(x, y)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mmap.chunks_exact(PAIR_SIZE).map(|chunk| {
            let (x, y) = chunk.split_at(PAIR_SIZE / 2);
            (le_f64(x), le_f64(y))
        })
    }
}

fn le_f64(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use gammarec_core::{
        ChannelConfig, CounterChannel, CounterDetector, DetectorGroup, EnergySensitiveDetector,
        GroupId,
    };
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn setup() -> DetectorSetup {
        DetectorSetup::new(
            vec![DetectorGroup::new("g")],
            vec![
                EnergySensitiveDetector::new(
                    "ge",
                    GroupId(0),
                    vec![ChannelConfig::identity("a"), ChannelConfig::identity("b")],
                )
                .into(),
                CounterDetector::new("sc", GroupId(0), vec![CounterChannel::new("x")], 1.0)
                    .into(),
            ],
            vec![],
        )
        .unwrap()
    }

    const HEADER: &str = "reference_time,ge_a_amplitude,ge_a_time,ge_a_timestamp,\
                          ge_b_amplitude,ge_b_time,ge_b_timestamp,sc_x_counts";

    #[test]
    fn test_read_rows() {
        let setup = setup();
        let text = format!("{HEADER}\n5,100,2,7,,,,3\n\nNaN,1.5,0,8,2,1,8,\n");
        let events: Vec<RawEvent> = RawEventReader::new(&setup, Cursor::new(text))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].reference_time, 5.0);
        assert_eq!(events[0].samples[0].amplitude, 100.0);
        assert!(!events[0].samples[1].is_present());
        assert_eq!(events[0].counts, vec![3]);
        assert!(events[1].reference_time.is_nan());
        assert_eq!(events[1].samples[1].timestamp, 8.0);
        assert_eq!(events[1].counts, vec![0]);
    }

    #[test]
    fn test_column_order_is_free() {
        let setup = setup();
        let text = "sc_x_counts,ge_b_amplitude,ge_b_time,ge_b_timestamp,extra,\
                    ge_a_amplitude,ge_a_time,ge_a_timestamp\n1,2,3,4,junk,5,6,7\n";
        let events = RawEventReader::new(&setup, Cursor::new(text))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(events[0].counts, vec![1]);
        assert_eq!(events[0].samples[1].amplitude, 2.0);
        assert_eq!(events[0].samples[0].timestamp, 7.0);
        assert!(events[0].reference_time.is_nan());
    }

    #[test]
    fn test_header_errors() {
        let setup = setup();
        let err = RawEventReader::new(&setup, Cursor::new("reference_time,ge_a_amplitude\n"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("lacks column"), "{err}");

        let doubled = format!("{HEADER},ge_a_time\n");
        let err = RawEventReader::new(&setup, Cursor::new(doubled))
            .err()
            .unwrap();
        assert!(err.to_string().contains("appears twice"), "{err}");

        assert!(RawEventReader::new(&setup, Cursor::new("")).is_err());
    }

    #[test]
    fn test_row_errors() {
        let setup = setup();
        let mut reader =
            RawEventReader::new(&setup, Cursor::new(format!("{HEADER}\n1,2\n1,x,0,0,0,0,0,0\n")))
                .unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("'x'"), "{err}");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_pair_file() {
        let mut file = NamedTempFile::new().unwrap();
        for v in [1.0f64, 2.0, -3.5, 4.25] {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        let reader = PairFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.pairs().collect::<Vec<_>>(), vec![(1.0, 2.0), (-3.5, 4.25)]);

        file.write_all(&[0u8; 3]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            PairFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }
}
