//! Synthetic data for gammarec.
//!
//! [`InverseCalibration`] turns a calibration function around so calibrated
//! targets can be expressed as raw digitizer values, and [`Sampler`] uses it
//! to build sets of raw events with known addback, single-channel,
//! background, coincidence and counter content.

#![warn(missing_docs)]

mod inverse;
mod sampler;

pub use inverse::{InverseCalibration, DEFAULT_SAMPLES};
pub use sampler::{sample_background_time, split_up_energy, Sampler, SamplerConfig};
