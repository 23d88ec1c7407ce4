//! Detector channels: static configuration and per-event calibrated state.

use crate::calibration::{Calibration, PolynomialCalibration};
use crate::event::RawSample;
use crate::window::RfGate;
use std::sync::Arc;

/// Static configuration of an energy-sensitive channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel name, unique within its detector.
    pub name: String,
    /// Raw-to-physical calibration.
    pub calibration: Arc<dyn Calibration>,
    /// Raw amplitudes at or below this value are treated as "not fired".
    pub threshold: f64,
    /// Gate on the time relative to the RF reference.
    pub rf_gate: RfGate,
}

impl ChannelConfig {
    /// Creates a channel with an open RF gate and no threshold.
    pub fn new(name: impl Into<String>, calibration: Arc<dyn Calibration>) -> Self {
        Self {
            name: name.into(),
            calibration,
            threshold: f64::NEG_INFINITY,
            rf_gate: RfGate::Open,
        }
    }

    /// Creates an uncalibrated channel (identity amplitude and time).
    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(PolynomialCalibration::default()))
    }

    /// Sets the raw amplitude threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the RF gate.
    #[must_use]
    pub fn with_rf_gate(mut self, rf_gate: RfGate) -> Self {
        self.rf_gate = rf_gate;
        self
    }

    /// Returns true if `raw_amplitude` is present and strictly above threshold.
    #[inline]
    #[must_use]
    pub fn above_threshold(&self, raw_amplitude: f64) -> bool {
        raw_amplitude > self.threshold
    }

    /// Calibrates `raw` into `state`.
    ///
    /// `rf_time` is the calibrated RF reference time of the event. The result
    /// depends only on the arguments, so calling this twice for the same
    /// event yields the same state.
    pub fn calibrate(
        &self,
        raw: &RawSample,
        rf_time: f64,
        event_index: u64,
        state: &mut ChannelState,
    ) {
        state.energy = if self.above_threshold(raw.amplitude) {
            self.calibration
                .calibrate_amplitude(raw.amplitude, event_index)
        } else {
            f64::NAN
        };
        state.time = self.calibration.calibrate_time(raw.time);
        state.timestamp = raw.timestamp;
        state.time_vs_rf = state.time - rf_time;
    }

    /// Returns true if the channel's RF gate accepts its calibrated state.
    #[inline]
    #[must_use]
    pub fn rf_gate_accepts(&self, state: &ChannelState) -> bool {
        self.rf_gate.accepts(state.time_vs_rf)
    }
}

/// Calibrated values of one channel for the current event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    /// Calibrated energy, NaN if the channel did not fire.
    pub energy: f64,
    /// Calibrated time.
    pub time: f64,
    /// Timestamp.
    pub timestamp: f64,
    /// Calibrated time minus the event's RF reference time.
    pub time_vs_rf: f64,
}

impl ChannelState {
    /// Returns every value to NaN.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns true if the channel fired this event.
    #[inline]
    #[must_use]
    pub fn fired(&self) -> bool {
        !self.energy.is_nan()
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            energy: f64::NAN,
            time: f64::NAN,
            timestamp: f64::NAN,
            time_vs_rf: f64::NAN,
        }
    }
}

/// Static configuration of a counter (scaler) channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterChannel {
    /// Channel name.
    pub name: String,
}

impl CounterChannel {
    /// Creates a counter channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Polynomial;
    use crate::window::Window;
    use approx::assert_relative_eq;

    fn channel() -> ChannelConfig {
        ChannelConfig::new(
            "c0",
            Arc::new(PolynomialCalibration::new(
                Polynomial::linear(1.0, 2.0),
                Polynomial::linear(0.0, 0.5),
            )),
        )
    }

    #[test]
    fn test_calibrate() {
        let ch = channel();
        let mut state = ChannelState::default();
        assert!(!state.fired());

        ch.calibrate(&RawSample::new(10.0, 40.0, 7.0), 5.0, 0, &mut state);
        assert_relative_eq!(state.energy, 21.0);
        assert_relative_eq!(state.time, 20.0);
        assert_relative_eq!(state.timestamp, 7.0);
        assert_relative_eq!(state.time_vs_rf, 15.0);
        assert!(state.fired());
    }

    #[test]
    fn test_calibrate_is_idempotent() {
        let ch = channel();
        let raw = RawSample::new(10.0, 40.0, 7.0);
        let mut once = ChannelState::default();
        ch.calibrate(&raw, 5.0, 3, &mut once);
        let mut twice = once;
        ch.calibrate(&raw, 5.0, 3, &mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_threshold_and_absent() {
        let ch = channel().with_threshold(10.0);
        let mut state = ChannelState::default();

        ch.calibrate(&RawSample::new(10.0, 1.0, 0.0), 0.0, 0, &mut state);
        assert!(state.energy.is_nan(), "threshold is exclusive");

        ch.calibrate(&RawSample::absent(), 0.0, 0, &mut state);
        assert!(state.energy.is_nan());
        assert!(state.time.is_nan());

        state.reset();
        assert!(state.time_vs_rf.is_nan());
    }

    #[test]
    fn test_rf_gate() {
        let ch = channel().with_rf_gate(RfGate::Window(Window::new(0.0, 10.0)));
        let mut state = ChannelState::default();
        ch.calibrate(&RawSample::new(1.0, 10.0, 0.0), 0.0, 0, &mut state);
        assert!(ch.rf_gate_accepts(&state));
        ch.calibrate(&RawSample::new(1.0, 10.0, 0.0), -6.0, 0, &mut state);
        assert!(!ch.rf_gate_accepts(&state));
    }
}
