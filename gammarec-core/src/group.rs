//! Detector groups: configuration shared by several detectors.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key of a [`DetectorGroup`] inside a [`DetectorSetup`](crate::DetectorSetup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(pub usize);

/// Histogram axis: range and bin count. Consumed by the histogram layer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramAxis {
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub minimum: f64,
    /// Upper edge of the last bin.
    pub maximum: f64,
}

impl HistogramAxis {
    /// Creates an axis.
    #[must_use]
    pub const fn new(n_bins: usize, minimum: f64, maximum: f64) -> Self {
        Self {
            n_bins,
            minimum,
            maximum,
        }
    }

    /// Width of one bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.maximum - self.minimum) / self.n_bins as f64
    }

    fn validate(&self, group: &str, axis: &str) -> Result<()> {
        if self.n_bins == 0 || !(self.minimum < self.maximum) {
            return Err(Error::InvalidGroup {
                group: group.to_string(),
                message: format!(
                    "{axis} axis needs at least one bin and minimum < maximum, \
                     got {} bins on [{}, {}]",
                    self.n_bins, self.minimum, self.maximum
                ),
            });
        }
        Ok(())
    }
}

/// Calibration and histogram parameters shared by many detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorGroup {
    /// Group name.
    pub name: String,
    /// Raw amplitude axis. Also the inversion domain for synthetic amplitudes.
    pub raw_amplitude: HistogramAxis,
    /// Raw time axis. Also the inversion domain for synthetic times.
    pub raw_time: HistogramAxis,
    /// Calibrated energy axis.
    pub energy: HistogramAxis,
    /// Time difference axis.
    pub time_difference: HistogramAxis,
    /// Calibrated time per raw TDC unit, used for the RF reference.
    pub tdc_resolution: f64,
}

impl DetectorGroup {
    /// Creates a group with 16-bit raw axes and a unit TDC resolution.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_amplitude: HistogramAxis::new(65_536, 0.0, 65_536.0),
            raw_time: HistogramAxis::new(65_536, 0.0, 65_536.0),
            energy: HistogramAxis::new(16_384, 0.0, 16_384.0),
            time_difference: HistogramAxis::new(1000, -500.0, 500.0),
            tdc_resolution: 1.0,
        }
    }

    /// Sets the raw amplitude axis.
    #[must_use]
    pub fn with_raw_amplitude(mut self, axis: HistogramAxis) -> Self {
        self.raw_amplitude = axis;
        self
    }

    /// Sets the raw time axis.
    #[must_use]
    pub fn with_raw_time(mut self, axis: HistogramAxis) -> Self {
        self.raw_time = axis;
        self
    }

    /// Sets the energy axis.
    #[must_use]
    pub fn with_energy(mut self, axis: HistogramAxis) -> Self {
        self.energy = axis;
        self
    }

    /// Sets the time difference axis.
    #[must_use]
    pub fn with_time_difference(mut self, axis: HistogramAxis) -> Self {
        self.time_difference = axis;
        self
    }

    /// Sets the TDC resolution.
    #[must_use]
    pub fn with_tdc_resolution(mut self, tdc_resolution: f64) -> Self {
        self.tdc_resolution = tdc_resolution;
        self
    }

    /// Converts a raw RF reference time to calibrated time.
    #[inline]
    #[must_use]
    pub fn rf_time(&self, raw_reference_time: f64) -> f64 {
        raw_reference_time * self.tdc_resolution
    }

    /// Checks axes and TDC resolution.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGroup`] describing the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        if !(self.tdc_resolution > 0.0) {
            return Err(Error::InvalidGroup {
                group: self.name.clone(),
                message: format!(
                    "TDC resolution must be positive, got {}",
                    self.tdc_resolution
                ),
            });
        }
        self.raw_amplitude.validate(&self.name, "raw amplitude")?;
        self.raw_time.validate(&self.name, "raw time")?;
        self.energy.validate(&self.name, "energy")?;
        self.time_difference.validate(&self.name, "time difference")
    }
}
