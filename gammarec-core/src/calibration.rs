//! Calibration functions mapping raw digitizer values to physical quantities.
//!
//! Every calibration returns NaN for a NaN raw input, so that "channel did
//! not fire" survives calibration as a single NaN check downstream.

use crate::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-channel calibration.
///
/// Implementations must be deterministic and free of side effects. The
/// amplitude calibration may depend on the event index to model gain drift.
pub trait Calibration: Send + Sync + fmt::Debug {
    /// Maps a raw amplitude to an energy.
    fn calibrate_amplitude(&self, raw_amplitude: f64, event_index: u64) -> f64;

    /// Maps a raw time to a calibrated time.
    fn calibrate_time(&self, raw_time: f64) -> f64;
}

/// Polynomial with ascending coefficients, `c0 + c1 x + c2 x^2 + ...`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polynomial {
    /// Coefficients, constant term first.
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    /// Creates a polynomial from ascending coefficients.
    #[must_use]
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// The identity `f(x) = x`.
    #[must_use]
    pub fn identity() -> Self {
        Self::linear(0.0, 1.0)
    }

    /// `offset + slope * x`.
    #[must_use]
    pub fn linear(offset: f64, slope: f64) -> Self {
        Self {
            coefficients: vec![offset, slope],
        }
    }

    /// Evaluates the polynomial using Horner's scheme.
    #[inline]
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc.mul_add(x, c))
    }
}

/// Time-independent polynomial calibration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolynomialCalibration {
    /// Raw amplitude to energy.
    pub amplitude: Polynomial,
    /// Raw time to calibrated time.
    pub time: Polynomial,
}

impl PolynomialCalibration {
    /// Creates a calibration from amplitude and time polynomials.
    #[must_use]
    pub fn new(amplitude: Polynomial, time: Polynomial) -> Self {
        Self { amplitude, time }
    }
}

impl Default for PolynomialCalibration {
    fn default() -> Self {
        Self {
            amplitude: Polynomial::identity(),
            time: Polynomial::identity(),
        }
    }
}

impl Calibration for PolynomialCalibration {
    #[inline]
    fn calibrate_amplitude(&self, raw_amplitude: f64, _event_index: u64) -> f64 {
        self.amplitude.eval(raw_amplitude)
    }

    #[inline]
    fn calibrate_time(&self, raw_time: f64) -> f64 {
        self.time.eval(raw_time)
    }
}

/// Amplitude calibration valid from `first_event` onwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriftSegment {
    /// First event index this segment applies to.
    pub first_event: u64,
    /// Raw amplitude to energy for this segment.
    pub amplitude: Polynomial,
}

/// Amplitude calibration that changes with the event index (gain drift).
///
/// The segment with the greatest `first_event <= event_index` applies.
/// Events before the first boundary use the first segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftingCalibration {
    segments: Vec<DriftSegment>,
    time: Polynomial,
}

impl DriftingCalibration {
    /// Creates a drifting calibration. Segments are sorted by `first_event`.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if `segments` is empty or two segments
    /// start at the same event.
    pub fn new(mut segments: Vec<DriftSegment>, time: Polynomial) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::ConfigError(
                "drifting calibration needs at least one segment".to_string(),
            ));
        }
        segments.sort_by_key(|s| s.first_event);
        if let Some(w) = segments
            .windows(2)
            .find(|w| w[0].first_event == w[1].first_event)
        {
            return Err(Error::ConfigError(format!(
                "drifting calibration has two segments starting at event {}",
                w[0].first_event
            )));
        }
        Ok(Self { segments, time })
    }

    /// Segments in ascending order of `first_event`.
    #[must_use]
    pub fn segments(&self) -> &[DriftSegment] {
        &self.segments
    }

    fn segment_for(&self, event_index: u64) -> &DriftSegment {
        let k = self
            .segments
            .partition_point(|s| s.first_event <= event_index);
        &self.segments[k.saturating_sub(1)]
    }
}

impl Calibration for DriftingCalibration {
    fn calibrate_amplitude(&self, raw_amplitude: f64, event_index: u64) -> f64 {
        self.segment_for(event_index).amplitude.eval(raw_amplitude)
    }

    fn calibrate_time(&self, raw_time: f64) -> f64 {
        self.time.eval(raw_time)
    }
}

/// Calibration built from two closures.
///
/// NaN inputs short-circuit to NaN before the closures run.
pub struct FnCalibration<A, T> {
    amplitude: A,
    time: T,
}

impl<A, T> FnCalibration<A, T>
where
    A: Fn(f64, u64) -> f64 + Send + Sync,
    T: Fn(f64) -> f64 + Send + Sync,
{
    /// Wraps an amplitude and a time closure.
    pub fn new(amplitude: A, time: T) -> Self {
        Self { amplitude, time }
    }
}

impl<A, T> fmt::Debug for FnCalibration<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCalibration").finish_non_exhaustive()
    }
}

impl<A, T> Calibration for FnCalibration<A, T>
where
    A: Fn(f64, u64) -> f64 + Send + Sync,
    T: Fn(f64) -> f64 + Send + Sync,
{
    fn calibrate_amplitude(&self, raw_amplitude: f64, event_index: u64) -> f64 {
        if raw_amplitude.is_nan() {
            return f64::NAN;
        }
        (self.amplitude)(raw_amplitude, event_index)
    }

    fn calibrate_time(&self, raw_time: f64) -> f64 {
        if raw_time.is_nan() {
            return f64::NAN;
        }
        (self.time)(raw_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_eval() {
        let p = Polynomial::new(vec![1.0, 2.0, 3.0]);
        // 1 + 2*2 + 3*4
        assert_relative_eq!(p.eval(2.0), 17.0);
        assert_relative_eq!(Polynomial::default().eval(5.0), 0.0);
    }

    #[test]
    fn test_nan_propagates() {
        let cal = PolynomialCalibration::new(Polynomial::linear(10.0, 0.5), Polynomial::identity());
        assert!(cal.calibrate_amplitude(f64::NAN, 0).is_nan());
        assert!(cal.calibrate_time(f64::NAN).is_nan());

        // An empty polynomial would otherwise map NaN to 0.
        assert!(Polynomial::default().eval(f64::NAN).is_nan());
    }

    #[test]
    fn test_drifting_segment_selection() {
        let cal = DriftingCalibration::new(
            vec![
                DriftSegment {
                    first_event: 100,
                    amplitude: Polynomial::linear(0.0, 2.0),
                },
                DriftSegment {
                    first_event: 10,
                    amplitude: Polynomial::linear(0.0, 1.0),
                },
            ],
            Polynomial::identity(),
        )
        .unwrap();

        assert_eq!(cal.segments()[0].first_event, 10);
        // Before the first boundary the first segment applies.
        assert_relative_eq!(cal.calibrate_amplitude(50.0, 0), 50.0);
        assert_relative_eq!(cal.calibrate_amplitude(50.0, 99), 50.0);
        assert_relative_eq!(cal.calibrate_amplitude(50.0, 100), 100.0);
        assert_relative_eq!(cal.calibrate_amplitude(50.0, 1_000_000), 100.0);
    }

    #[test]
    fn test_drifting_rejects_bad_segments() {
        assert!(DriftingCalibration::new(Vec::new(), Polynomial::identity()).is_err());

        let seg = DriftSegment {
            first_event: 3,
            amplitude: Polynomial::identity(),
        };
        let result = DriftingCalibration::new(vec![seg.clone(), seg], Polynomial::identity());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_fn_calibration() {
        let cal = FnCalibration::new(|a, n| a + n as f64, |t| 2.0 * t);
        assert_relative_eq!(cal.calibrate_amplitude(1.0, 2), 3.0);
        assert_relative_eq!(cal.calibrate_time(4.0), 8.0);
        assert!(cal.calibrate_amplitude(f64::NAN, 2).is_nan());
    }
}
