//! Event table and pair observation writers.

use crate::columns::{calibrated_columns, raw_columns, RawField};
use crate::Result;
use gammarec_algorithms::EventState;
use gammarec_core::{Detector, DetectorSetup, RawEvent};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for pair observations of one coincidence matrix.
pub struct DataFileWriter {
    writer: BufWriter<File>,
}

impl DataFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Fails if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes pairs as CSV with an `x,y` header.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_pairs_csv(&mut self, pairs: &[(f64, f64)]) -> Result<()> {
        writeln!(self.writer, "x,y")?;

        for (x, y) in pairs {
            writeln!(self.writer, "{x},{y}")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes pairs as binary data.
    ///
    /// Format: for each pair, f64 (x) + f64 (y), little endian.
    /// Total: 16 bytes per pair.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_pairs_binary(&mut self, pairs: &[(f64, f64)]) -> Result<()> {
        for (x, y) in pairs {
            self.writer.write_all(&x.to_le_bytes())?;
            self.writer.write_all(&y.to_le_bytes())?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes one text line.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_line(&mut self, line: fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// CSV writer of raw events, readable by
/// [`RawEventReader`](crate::RawEventReader).
pub struct RawEventWriter<W: Write> {
    writer: W,
    fields: Vec<RawField>,
}

impl RawEventWriter<BufWriter<File>> {
    /// Creates a raw CSV file and writes its header.
    ///
    /// # Errors
    /// Fails if the file cannot be created.
    pub fn create<P: AsRef<Path>>(setup: &DetectorSetup, path: P) -> Result<Self> {
        Self::new(setup, BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> RawEventWriter<W> {
    /// Writes the header to `writer`.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn new(setup: &DetectorSetup, mut writer: W) -> Result<Self> {
        let (names, fields): (Vec<String>, Vec<RawField>) = raw_columns(setup).into_iter().unzip();
        writeln!(writer, "{}", names.join(","))?;
        Ok(Self { writer, fields })
    }

    /// Appends one event.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_event(&mut self, event: &RawEvent) -> Result<()> {
        let row: Vec<String> = self
            .fields
            .iter()
            .map(|field| match *field {
                RawField::ReferenceTime => event.reference_time.to_string(),
                RawField::Amplitude(n) => event.samples[n].amplitude.to_string(),
                RawField::Time(n) => event.samples[n].time.to_string(),
                RawField::Timestamp(n) => event.samples[n].timestamp.to_string(),
                RawField::Counts(n) => event.counts[n].to_string(),
            })
            .collect();
        writeln!(self.writer, "{}", row.join(","))?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// CSV writer of calibrated per-event values.
pub struct CalibratedWriter<'a, W: Write> {
    setup: &'a DetectorSetup,
    writer: W,
    row: Vec<String>,
}

impl<'a> CalibratedWriter<'a, BufWriter<File>> {
    /// Creates a calibrated CSV file and writes its header.
    ///
    /// # Errors
    /// Fails if the file cannot be created.
    pub fn create<P: AsRef<Path>>(setup: &'a DetectorSetup, path: P) -> Result<Self> {
        Self::new(setup, BufWriter::new(File::create(path)?))
    }
}

impl<'a, W: Write> CalibratedWriter<'a, W> {
    /// Writes the header to `writer`.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn new(setup: &'a DetectorSetup, mut writer: W) -> Result<Self> {
        let columns = calibrated_columns(setup);
        writeln!(writer, "{}", columns.join(","))?;
        Ok(Self {
            setup,
            writer,
            row: Vec::with_capacity(columns.len()),
        })
    }

    /// Appends the event last processed by `state`.
    ///
    /// Counter columns hold the totals accumulated so far.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_event(&mut self, state: &EventState) -> Result<()> {
        let setup = self.setup;
        self.row.clear();
        self.row.push(
            state
                .event_index()
                .map_or_else(String::new, |index| index.to_string()),
        );
        for (index, detector) in setup.detectors().iter().enumerate() {
            match detector {
                Detector::EnergySensitive(d) => {
                    for channel in state.detector_channels(setup, index) {
                        self.row.extend(
                            [
                                channel.energy,
                                channel.time,
                                channel.timestamp,
                                channel.time_vs_rf,
                            ]
                            .map(|v| v.to_string()),
                        );
                    }
                    if d.is_multi_channel() {
                        let result = state.result(index);
                        self.row.extend(
                            [result.energy, result.time, result.time_vs_rf].map(|v| v.to_string()),
                        );
                    }
                }
                Detector::Counter(_) => {
                    self.row
                        .extend(state.counts(setup, index).iter().map(ToString::to_string));
                }
            }
        }
        writeln!(self.writer, "{}", self.row.join(","))?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
