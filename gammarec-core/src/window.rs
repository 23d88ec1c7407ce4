//! Closed intervals used for coincidence windows and RF gates.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Window {
    /// Lower edge (inclusive).
    pub lower: f64,
    /// Upper edge (inclusive).
    pub upper: f64,
}

impl Window {
    /// Creates a window without validating it.
    #[must_use]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// The whole real line. NaN is still rejected.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Symmetric window `[-half_width, half_width]`.
    #[must_use]
    pub fn symmetric(half_width: f64) -> Self {
        Self::new(-half_width.abs(), half_width.abs())
    }

    /// Returns true if `value` lies inside the window. NaN never does.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Checks that the edges are ordered and not NaN.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] naming `context`.
    pub fn validate(&self, context: impl Into<String>) -> Result<()> {
        if self.lower <= self.upper {
            Ok(())
        } else {
            Err(Error::InvalidWindow {
                context: context.into(),
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl From<(f64, f64)> for Window {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self::new(lower, upper)
    }
}

/// Acceptance predicate on a channel's time relative to the accelerator RF.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RfGate {
    /// Accepts every value, including NaN (no RF reference recorded).
    #[default]
    Open,
    /// Accepts values inside the window.
    Window(Window),
}

impl RfGate {
    /// Returns true if `time_vs_rf` passes the gate.
    #[inline]
    #[must_use]
    pub fn accepts(&self, time_vs_rf: f64) -> bool {
        match self {
            Self::Open => true,
            Self::Window(window) => window.contains(time_vs_rf),
        }
    }
}
