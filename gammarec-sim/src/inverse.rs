//! Sampled inverse of a calibration function.

use gammarec_core::{Error, Result};

/// Number of forward samples used by [`InverseCalibration::build`].
pub const DEFAULT_SAMPLES: usize = 1000;

/// Piecewise-linear approximation of `f^-1` built from evenly spaced
/// samples of a forward calibration `f`.
///
/// The inverse is well defined only for monotonic `f`. For other inputs the
/// samples are still ordered by value and interpolated, which yields the
/// nearest bracket rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseCalibration {
    /// `(f(x), x)` pairs ordered by `f(x)`.
    points: Vec<(f64, f64)>,
    spacing: f64,
}

impl InverseCalibration {
    /// Inverts `f` over `[lower, upper]` with [`DEFAULT_SAMPLES`] samples.
    ///
    /// # Errors
    /// See [`InverseCalibration::with_samples`].
    pub fn build<F: Fn(f64) -> f64>(f: F, lower: f64, upper: f64) -> Result<Self> {
        Self::with_samples(f, lower, upper, DEFAULT_SAMPLES)
    }

    /// Inverts `f` over `[lower, upper]` with `n_samples` samples, both
    /// endpoints included. Samples where `f` is NaN are dropped.
    ///
    /// # Errors
    /// Returns [`Error::Inversion`] for an empty or non-finite domain, fewer
    /// than two samples, or fewer than two samples with a defined value.
    #[allow(clippy::cast_precision_loss)]
    pub fn with_samples<F: Fn(f64) -> f64>(
        f: F,
        lower: f64,
        upper: f64,
        n_samples: usize,
    ) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(Error::Inversion(format!(
                "domain [{lower}, {upper}] must be finite and non-empty"
            )));
        }
        if n_samples < 2 {
            return Err(Error::Inversion(format!(
                "at least 2 samples are needed, got {n_samples}"
            )));
        }

        let spacing = (upper - lower) / (n_samples - 1) as f64;
        let mut points: Vec<(f64, f64)> = (0..n_samples)
            .map(|k| {
                let x = if k == n_samples - 1 {
                    upper
                } else {
                    lower + k as f64 * spacing
                };
                (f(x), x)
            })
            .filter(|(y, _)| !y.is_nan())
            .collect();

        if points.len() < 2 {
            return Err(Error::Inversion(format!(
                "calibration is defined at only {} of {n_samples} samples on [{lower}, {upper}]",
                points.len()
            )));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(Self { points, spacing })
    }

    /// Evaluates the inverse at `value`.
    ///
    /// Values outside the sampled range are extrapolated linearly from the
    /// first or last bracket. NaN maps to NaN.
    #[must_use]
    pub fn eval(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        let k = self.points.partition_point(|&(y, _)| y <= value);
        let i = k.clamp(1, self.points.len() - 1) - 1;
        let (y0, x0) = self.points[i];
        let (y1, x1) = self.points[i + 1];
        if y1 == y0 {
            return x0;
        }
        x0 + (value - y0) * (x1 - x0) / (y1 - y0)
    }

    /// Sampled `(f(x), x)` pairs ordered by `f(x)`.
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Distance between neighbouring domain samples.
    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Smallest and largest sampled value of `f`.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.points[0].0, self.points[self.points.len() - 1].0)
    }
}
