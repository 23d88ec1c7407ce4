//! gammarec-io: setup files and event tables for gammarec.
//!
//! Setups are read from JSON, raw events from CSV tables, and results are
//! written as calibrated CSV tables, single-event observation files, and
//! pair observation files (CSV or memory-mappable binary).
//!

mod columns;
mod config;
mod error;
mod reader;
mod spectra;
mod writer;

pub use columns::{calibrated_columns, raw_columns, RawField, EVENT, REFERENCE_TIME};
pub use config::{setup_from_file, setup_from_json};
pub use error::{Error, Result};
pub use reader::{read_raw_events, PairFileReader, RawEventReader, PAIR_SIZE};
pub use spectra::{
    SpectraWriter, ADDBACK_FILE, CHANNEL_ENERGY_FILE, ENERGY_VS_TIME_FILE, RAW_AMPLITUDE_FILE,
    TIME_DIFFERENCE_FILE,
};
pub use writer::{CalibratedWriter, DataFileWriter, RawEventWriter};
