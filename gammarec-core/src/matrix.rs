//! Coincidence matrix definitions.

use crate::group::HistogramAxis;
use crate::window::Window;

/// A two-dimensional coincidence matrix.
///
/// The evaluator pairs every firing channel of the `x_data` detectors with
/// every firing channel of the `y_data` detectors. A matrix with empty
/// `y_data` is accepted but never filled.
#[derive(Debug, Clone, PartialEq)]
pub struct CoincidenceMatrix {
    /// Matrix name.
    pub name: String,
    /// Detector indices on the horizontal axis.
    pub x_data: Vec<usize>,
    /// Detector indices on the vertical axis.
    pub y_data: Vec<usize>,
    /// Horizontal axis.
    pub x_axis: HistogramAxis,
    /// Vertical axis.
    pub y_axis: HistogramAxis,
    /// Also record every pair with swapped coordinates.
    pub symmetrize: bool,
    /// Optional gate on `time_x - time_y`.
    pub time_window: Option<Window>,
}

impl CoincidenceMatrix {
    /// Creates an unsymmetrized, ungated matrix with default axes.
    pub fn new(name: impl Into<String>, x_data: Vec<usize>, y_data: Vec<usize>) -> Self {
        let axis = HistogramAxis::new(4096, 0.0, 16_384.0);
        Self {
            name: name.into(),
            x_data,
            y_data,
            x_axis: axis,
            y_axis: axis,
            symmetrize: false,
            time_window: None,
        }
    }

    /// Sets both axes.
    #[must_use]
    pub fn with_axes(mut self, x_axis: HistogramAxis, y_axis: HistogramAxis) -> Self {
        self.x_axis = x_axis;
        self.y_axis = y_axis;
        self
    }

    /// Enables or disables symmetrization.
    #[must_use]
    pub fn with_symmetrize(mut self, symmetrize: bool) -> Self {
        self.symmetrize = symmetrize;
        self
    }

    /// Gates pairs on their time difference.
    #[must_use]
    pub fn with_time_window(mut self, window: Window) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Returns true if the matrix can produce fills.
    #[must_use]
    pub fn is_fillable(&self) -> bool {
        !self.y_data.is_empty()
    }
}
