//! gammarec-core: Core types for detector event reconstruction.
//!
//! This crate provides calibration functions, channel and detector
//! definitions, coincidence matrix definitions and the validated
//! [`DetectorSetup`] that the reconstruction engine borrows.
//!

pub mod calibration;
pub mod channel;
pub mod detector;
pub mod error;
pub mod event;
pub mod group;
pub mod matrix;
pub mod setup;
pub mod window;

pub use calibration::{
    Calibration, DriftSegment, DriftingCalibration, FnCalibration, Polynomial,
    PolynomialCalibration,
};
pub use channel::{ChannelConfig, ChannelState, CounterChannel};
pub use detector::{
    AddbackWindows, CounterDetector, Detector, EnergySensitiveDetector, NonCoincidentPolicy,
};
pub use error::{Error, Result};
pub use event::{RawEvent, RawSample};
pub use group::{DetectorGroup, GroupId, HistogramAxis};
pub use matrix::CoincidenceMatrix;
pub use setup::DetectorSetup;
pub use window::{RfGate, Window};
