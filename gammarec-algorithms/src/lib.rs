//! gammarec-algorithms: Event reconstruction algorithms.
//!
//! This crate provides:
//! - **Addback** - time-windowed clustering of the channels of one detector
//! - **Coincidences** - lazy energy pair streams per coincidence matrix
//! - **Reconstruction** - reusable per-event state and sequential/parallel drivers
//! - **Spectra** - per-channel energy and raw amplitude, energy-vs-time,
//!   time-difference and addback observations
//!
#![warn(missing_docs)]

mod addback;
mod coincidence;
mod reconstruction;
pub mod spectra;

pub use addback::{AddbackPhase, AddbackResult, AddbackState};
pub use coincidence::{coincidence_pairs, CoincidenceFills};
pub use reconstruction::{reconstruct, reconstruct_parallel, EventState};
pub use spectra::{
    addback_sums, channel_energies, energy_vs_time, raw_amplitudes, time_differences,
    TimeDifference,
};
