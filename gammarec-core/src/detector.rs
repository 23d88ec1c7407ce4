//! Detectors: a closed set of variants over ordered channel lists.

use crate::channel::{ChannelConfig, CounterChannel};
use crate::group::GroupId;
use crate::window::Window;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Treatment of a channel that fired outside a seed's addback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NonCoincidentPolicy {
    /// The channel is consumed without merging and cannot seed a later
    /// cluster. At most one cluster per detector and event.
    #[default]
    Discard,
    /// The channel is left alone and may seed its own cluster later.
    Reseed,
}

/// Strictly upper-triangular matrix of addback coincidence windows.
///
/// Row `i` holds the windows on `time_i - time_j` for every `j > i`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddbackWindows {
    rows: Vec<Vec<Window>>,
}

impl AddbackWindows {
    /// Every pair coincident, for `n_channels` channels.
    #[must_use]
    pub fn unbounded(n_channels: usize) -> Self {
        let rows = (0..n_channels.saturating_sub(1))
            .map(|i| vec![Window::unbounded(); n_channels - i - 1])
            .collect();
        Self { rows }
    }

    /// Validates the shape of `rows` against `n_channels`.
    ///
    /// # Errors
    /// [`Error::AddbackWindowRows`] or [`Error::AddbackWindowEntries`] when the
    /// dimensions are wrong, [`Error::InvalidWindow`] for inverted windows.
    pub fn new(detector: &str, n_channels: usize, rows: Vec<Vec<Window>>) -> Result<Self> {
        let windows = Self { rows };
        windows.validate(detector, n_channels)?;
        Ok(windows)
    }

    /// Checks the matrix against `n_channels` channels of `detector`.
    ///
    /// # Errors
    /// See [`AddbackWindows::new`].
    pub fn validate(&self, detector: &str, n_channels: usize) -> Result<()> {
        let expected_rows = n_channels.saturating_sub(1);
        if self.rows.len() != expected_rows {
            return Err(Error::AddbackWindowRows {
                detector: detector.to_string(),
                channels: n_channels,
                expected: expected_rows,
                found: self.rows.len(),
            });
        }
        for (i, row) in self.rows.iter().enumerate() {
            let expected = n_channels - i - 1;
            if row.len() != expected {
                return Err(Error::AddbackWindowEntries {
                    detector: detector.to_string(),
                    row: i,
                    expected,
                    found: row.len(),
                });
            }
            for (k, window) in row.iter().enumerate() {
                window.validate(format!(
                    "detector '{detector}': addback window ({i}, {})",
                    i + k + 1
                ))?;
            }
        }
        Ok(())
    }

    /// Window for the channel pair `(i, j)`, `i < j`.
    ///
    /// # Panics
    /// Panics if `i >= j` or `j` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Window {
        assert!(i < j, "addback windows are indexed with i < j");
        self.rows[i][j - i - 1]
    }

    /// Returns true if `time_i - time_j` lies in the window of pair `(i, j)`.
    #[inline]
    #[must_use]
    pub fn coincident(&self, i: usize, j: usize, time_i: f64, time_j: f64) -> bool {
        self.get(i, j).contains(time_i - time_j)
    }

    /// Rows of the matrix.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Window>] {
        &self.rows
    }
}

/// Detector that measures energy and time per channel.
#[derive(Debug, Clone)]
pub struct EnergySensitiveDetector {
    /// Detector name.
    pub name: String,
    /// Shared group.
    pub group: GroupId,
    /// Channels in addback order.
    pub channels: Vec<ChannelConfig>,
    /// Addback coincidence windows.
    pub addback_windows: AddbackWindows,
    /// Out-of-window channel treatment during addback.
    pub policy: NonCoincidentPolicy,
}

impl EnergySensitiveDetector {
    /// Creates a detector whose channels are always coincident.
    pub fn new(name: impl Into<String>, group: GroupId, channels: Vec<ChannelConfig>) -> Self {
        let addback_windows = AddbackWindows::unbounded(channels.len());
        Self {
            name: name.into(),
            group,
            channels,
            addback_windows,
            policy: NonCoincidentPolicy::default(),
        }
    }

    /// Replaces the addback windows.
    ///
    /// # Errors
    /// Fails if the window matrix does not match the channel count.
    pub fn with_addback_windows(mut self, rows: Vec<Vec<Window>>) -> Result<Self> {
        self.addback_windows = AddbackWindows::new(&self.name, self.channels.len(), rows)?;
        Ok(self)
    }

    /// Sets the out-of-window policy.
    #[must_use]
    pub fn with_policy(mut self, policy: NonCoincidentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns true if the detector takes part in addback.
    #[inline]
    #[must_use]
    pub fn is_multi_channel(&self) -> bool {
        self.channels.len() > 1
    }
}

/// Detector whose channels count trigger pulses.
#[derive(Debug, Clone)]
pub struct CounterDetector {
    /// Detector name.
    pub name: String,
    /// Shared group.
    pub group: GroupId,
    /// Counter channels.
    pub channels: Vec<CounterChannel>,
    /// Trigger frequency of the scaler module in Hz.
    pub trigger_frequency: f64,
}

impl CounterDetector {
    /// Creates a counter detector.
    pub fn new(
        name: impl Into<String>,
        group: GroupId,
        channels: Vec<CounterChannel>,
        trigger_frequency: f64,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            channels,
            trigger_frequency,
        }
    }
}

/// Closed set of detector variants.
#[derive(Debug, Clone)]
pub enum Detector {
    /// Energy and time per channel; takes part in addback and coincidences.
    EnergySensitive(EnergySensitiveDetector),
    /// Scaler channels.
    Counter(CounterDetector),
}

impl Detector {
    /// Detector name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::EnergySensitive(d) => &d.name,
            Self::Counter(d) => &d.name,
        }
    }

    /// Group key.
    #[must_use]
    pub fn group(&self) -> GroupId {
        match self {
            Self::EnergySensitive(d) => d.group,
            Self::Counter(d) => d.group,
        }
    }

    /// Number of channels.
    #[must_use]
    pub fn n_channels(&self) -> usize {
        match self {
            Self::EnergySensitive(d) => d.channels.len(),
            Self::Counter(d) => d.channels.len(),
        }
    }

    /// The energy-sensitive view, if this is one.
    #[must_use]
    pub fn as_energy_sensitive(&self) -> Option<&EnergySensitiveDetector> {
        match self {
            Self::EnergySensitive(d) => Some(d),
            Self::Counter(_) => None,
        }
    }

    /// The counter view, if this is one.
    #[must_use]
    pub fn as_counter(&self) -> Option<&CounterDetector> {
        match self {
            Self::Counter(d) => Some(d),
            Self::EnergySensitive(_) => None,
        }
    }
}

impl From<EnergySensitiveDetector> for Detector {
    fn from(detector: EnergySensitiveDetector) -> Self {
        Self::EnergySensitive(detector)
    }
}

impl From<CounterDetector> for Detector {
    fn from(detector: CounterDetector) -> Self {
        Self::Counter(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(n: usize) -> Vec<ChannelConfig> {
        (0..n)
            .map(|i| ChannelConfig::identity(format!("c{i}")))
            .collect()
    }

    #[test]
    fn test_unbounded_windows_shape() {
        let windows = AddbackWindows::unbounded(4);
        assert_eq!(windows.rows().len(), 3);
        assert_eq!(windows.rows()[0].len(), 3);
        assert_eq!(windows.rows()[2].len(), 1);
        assert!(windows.coincident(0, 3, 1e300, -1e300));

        assert!(AddbackWindows::unbounded(1).rows().is_empty());
        assert!(AddbackWindows::unbounded(0).rows().is_empty());
    }

    #[test]
    fn test_window_indexing() {
        let w = |x: f64| Window::new(-x, x);
        let rows = vec![vec![w(1.0), w(2.0)], vec![w(3.0)]];
        let windows = AddbackWindows::new("d", 3, rows).unwrap();
        assert_eq!(windows.get(0, 1), w(1.0));
        assert_eq!(windows.get(0, 2), w(2.0));
        assert_eq!(windows.get(1, 2), w(3.0));
        assert!(windows.coincident(1, 2, 3.0, 0.5));
        assert!(!windows.coincident(0, 1, 3.0, 0.5));
    }

    #[test]
    fn test_wrong_row_count() {
        let result = EnergySensitiveDetector::new("clover", GroupId(0), channels(4))
            .with_addback_windows(vec![vec![Window::unbounded(); 3]]);
        let err = result.unwrap_err();
        assert_eq!(
            err,
            Error::AddbackWindowRows {
                detector: "clover".to_string(),
                channels: 4,
                expected: 3,
                found: 1,
            }
        );
        assert!(err.to_string().contains("exactly 3 rows"));
    }

    #[test]
    fn test_wrong_entry_count() {
        let rows = vec![vec![Window::unbounded(); 2], vec![Window::unbounded(); 2]];
        let result = EnergySensitiveDetector::new("clover", GroupId(0), channels(3))
            .with_addback_windows(rows);
        assert!(matches!(
            result,
            Err(Error::AddbackWindowEntries {
                row: 1,
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_inverted_addback_window() {
        let result = EnergySensitiveDetector::new("d", GroupId(0), channels(2))
            .with_addback_windows(vec![vec![Window::new(1.0, -1.0)]]);
        assert!(matches!(result, Err(Error::InvalidWindow { .. })));
    }

    #[test]
    fn test_detector_variants() {
        let es: Detector = EnergySensitiveDetector::new("ge", GroupId(1), channels(2)).into();
        assert_eq!(es.name(), "ge");
        assert_eq!(es.group(), GroupId(1));
        assert_eq!(es.n_channels(), 2);
        assert!(es.as_energy_sensitive().unwrap().is_multi_channel());
        assert!(es.as_counter().is_none());

        let counter: Detector = CounterDetector::new(
            "scaler",
            GroupId(0),
            vec![CounterChannel::new("trigger")],
            100.0,
        )
        .into();
        assert!(counter.as_energy_sensitive().is_none());
        assert_eq!(counter.as_counter().unwrap().channels.len(), 1);
    }
}
