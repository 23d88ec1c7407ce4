//! Raw per-event input records.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw digitizer values of one channel for one event. NaN marks an absent value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Raw amplitude.
    pub amplitude: f64,
    /// Raw time.
    pub time: f64,
    /// Raw timestamp.
    pub timestamp: f64,
}

impl RawSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(amplitude: f64, time: f64, timestamp: f64) -> Self {
        Self {
            amplitude,
            time,
            timestamp,
        }
    }

    /// A channel that did not fire.
    #[must_use]
    pub const fn absent() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    /// Returns true if the amplitude is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.amplitude.is_nan()
    }
}

impl Default for RawSample {
    fn default() -> Self {
        Self::absent()
    }
}

/// One raw event as delivered by the event table.
///
/// `samples` holds one entry per energy-sensitive channel and `counts` one
/// entry per counter channel, both in the flat order defined by
/// [`DetectorSetup`](crate::DetectorSetup).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// Raw RF reference time, in TDC units. NaN if not recorded.
    pub reference_time: f64,
    /// Energy-sensitive channel samples.
    pub samples: Vec<RawSample>,
    /// Counter channel increments.
    pub counts: Vec<i64>,
}

impl RawEvent {
    /// Creates an event where no channel fired.
    #[must_use]
    pub fn empty(n_samples: usize, n_counters: usize) -> Self {
        Self {
            reference_time: f64::NAN,
            samples: vec![RawSample::absent(); n_samples],
            counts: vec![0; n_counters],
        }
    }

    /// Marks every channel as absent and clears counter increments.
    pub fn reset(&mut self) {
        self.reference_time = f64::NAN;
        self.samples.fill(RawSample::absent());
        self.counts.fill(0);
    }
}
