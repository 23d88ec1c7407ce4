//! Synthetic raw events for exercising a detector setup end to end.
//!
//! Calibrated target values are turned into raw values through sampled
//! inverse calibrations, so reconstructing the generated events with the
//! same setup recovers the targets up to the interpolation error.

use crate::inverse::{InverseCalibration, DEFAULT_SAMPLES};
use gammarec_core::{Detector, DetectorSetup, Error, RawEvent, RawSample, Result, Window};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Energies, times and counter rates of the generated events.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Full-energy peak, in calibrated units.
    pub gamma_energy: f64,
    /// Calibrated time of prompt events.
    pub gamma_time: f64,
    /// Energy of background events.
    pub background_energy: f64,
    /// Range background times are drawn from.
    pub background_time: Window,
    /// Part of `background_time` that background events avoid.
    pub background_excluded: Window,
    /// RF reference time, converted to TDC units per group.
    pub reference_time: f64,
    /// Counter pulses per set, divided by each detector's trigger frequency.
    pub counter_increment: f64,
    /// Seed of the random number generator.
    pub seed: u64,
    /// Forward samples per inverse calibration.
    pub inversion_samples: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            gamma_energy: 1000.0,
            gamma_time: 20.0,
            background_energy: 500.0,
            background_time: Window::new(-100.0, 100.0),
            background_excluded: Window::new(-10.0, 10.0),
            reference_time: 10.0,
            counter_increment: 1000.0,
            seed: 0,
            inversion_samples: DEFAULT_SAMPLES,
        }
    }
}

impl SamplerConfig {
    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the full-energy peak and prompt time.
    #[must_use]
    pub fn with_gamma(mut self, energy: f64, time: f64) -> Self {
        self.gamma_energy = energy;
        self.gamma_time = time;
        self
    }

    fn validate(&self) -> Result<()> {
        self.background_time.validate("background time range")?;
        self.background_excluded
            .validate("excluded background time range")?;
        if background_span(self.background_time, self.background_excluded) <= 0.0 {
            return Err(Error::ConfigError(format!(
                "excluded range [{}, {}] leaves nothing of background range [{}, {}]",
                self.background_excluded.lower,
                self.background_excluded.upper,
                self.background_time.lower,
                self.background_time.upper
            )));
        }
        Ok(())
    }
}

/// Splits `energy` across channels in proportion to `weights`.
///
/// A single channel receives the whole energy regardless of its weight.
#[must_use]
pub fn split_up_energy(energy: f64, weights: &[f64]) -> Vec<f64> {
    if weights.len() == 1 {
        return vec![energy];
    }
    let normalization = 1.0 / weights.iter().sum::<f64>();
    weights.iter().map(|w| energy * w * normalization).collect()
}

fn background_span(range: Window, excluded: Window) -> f64 {
    (excluded.lower - range.lower).max(0.0) + (range.upper - excluded.upper).max(0.0)
}

/// Maps a uniform number `u` in `[0, 1)` to a time in `range` outside
/// `excluded`, uniformly over the allowed length.
#[must_use]
pub fn sample_background_time(range: Window, excluded: Window, u: f64) -> f64 {
    let below = (excluded.lower - range.lower).max(0.0);
    let position = u * background_span(range, excluded);
    if position < below {
        range.lower + position
    } else {
        excluded.upper + (position - below)
    }
}

#[derive(Debug, Clone)]
struct ChannelInverse {
    amplitude: InverseCalibration,
    time: InverseCalibration,
}

/// Generator of synthetic raw events for a [`DetectorSetup`].
///
/// One call to [`Sampler::generate_set`] produces, for every
/// energy-sensitive detector in order:
/// 1. an event whose energy is shared by all of its channels,
/// 2. per channel, a full-energy event and an off-time background event,
/// 3. per later energy-sensitive detector, a shared-energy event in both,
///
/// followed by one event per counter detector carrying its increments.
#[derive(Debug)]
pub struct Sampler<'a> {
    setup: &'a DetectorSetup,
    config: SamplerConfig,
    inverses: Vec<ChannelInverse>,
    rng: StdRng,
    timestamp: f64,
}

impl<'a> Sampler<'a> {
    /// Builds the inverse calibrations of every energy-sensitive channel
    /// over its group's raw axes.
    ///
    /// Amplitude calibrations are inverted as they apply to event 0.
    ///
    /// # Errors
    /// Fails if the background windows are unusable or a calibration
    /// cannot be inverted over its group's raw range.
    pub fn new(setup: &'a DetectorSetup, config: SamplerConfig) -> Result<Self> {
        config.validate()?;

        let mut inverses = Vec::with_capacity(setup.n_samples());
        for (_, detector) in setup.energy_sensitive() {
            let group = setup.group(detector.group);
            for channel in &detector.channels {
                let calibration = &channel.calibration;
                let amplitude = InverseCalibration::with_samples(
                    |x| calibration.calibrate_amplitude(x, 0),
                    group.raw_amplitude.minimum,
                    group.raw_amplitude.maximum,
                    config.inversion_samples,
                )
                .map_err(|e| invert_error(&detector.name, &channel.name, e))?;
                let time = InverseCalibration::with_samples(
                    |x| calibration.calibrate_time(x),
                    group.raw_time.minimum,
                    group.raw_time.maximum,
                    config.inversion_samples,
                )
                .map_err(|e| invert_error(&detector.name, &channel.name, e))?;
                inverses.push(ChannelInverse { amplitude, time });
            }
        }
        debug!(
            "sampler ready: {} inverted channels, seed {}",
            inverses.len(),
            config.seed
        );

        Ok(Self {
            setup,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            inverses,
            timestamp: 0.0,
        })
    }

    /// Timestamp the next non-counter event will carry.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Restarts the random sequence and timestamps.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.timestamp = 0.0;
    }

    /// Generates `n_sets` consecutive sets of events.
    pub fn generate(&mut self, n_sets: usize) -> Vec<RawEvent> {
        let mut events = Vec::new();
        for _ in 0..n_sets {
            events.extend(self.generate_set());
        }
        events
    }

    /// Generates one set of events, see [`Sampler`].
    pub fn generate_set(&mut self) -> Vec<RawEvent> {
        let setup = self.setup;
        let energy_sensitive: Vec<usize> = setup.energy_sensitive().map(|(i, _)| i).collect();
        let mut events = Vec::new();

        for (k, &first) in energy_sensitive.iter().enumerate() {
            let weights = self.uniform_weights(setup.detectors()[first].n_channels());

            let mut event = self.blank(first);
            self.fill_shared(&mut event, first, &weights);
            self.emit(&mut events, event);

            for flat in setup.channel_range(first) {
                let mut event = self.blank(first);
                self.fill_channel(
                    &mut event,
                    flat,
                    self.config.gamma_energy,
                    self.config.gamma_time,
                );
                self.emit(&mut events, event);

                let u: f64 = self.rng.gen();
                let time = sample_background_time(
                    self.config.background_time,
                    self.config.background_excluded,
                    u,
                );
                let mut event = self.blank(first);
                self.fill_channel(&mut event, flat, self.config.background_energy, time);
                self.emit(&mut events, event);
            }

            for &second in &energy_sensitive[k + 1..] {
                let second_weights = self.uniform_weights(setup.detectors()[second].n_channels());
                let mut event = self.blank(first);
                self.fill_shared(&mut event, first, &weights);
                self.fill_shared(&mut event, second, &second_weights);
                self.emit(&mut events, event);
            }
        }

        for (index, detector) in setup.detectors().iter().enumerate() {
            if let Detector::Counter(counter) = detector {
                let mut event = RawEvent::empty(setup.n_samples(), setup.n_counters());
                let increment =
                    counter_increment(self.config.counter_increment, counter.trigger_frequency);
                event.counts[setup.channel_range(index)].fill(increment);
                events.push(event);
            }
        }
        events
    }

    fn uniform_weights(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.rng.gen::<f64>()).collect()
    }

    fn blank(&self, detector: usize) -> RawEvent {
        let setup = self.setup;
        let group = setup.group(setup.detectors()[detector].group());
        let mut event = RawEvent::empty(setup.n_samples(), setup.n_counters());
        event.reference_time = self.config.reference_time / group.tdc_resolution;
        event
    }

    fn fill_channel(&self, event: &mut RawEvent, flat: usize, energy: f64, time: f64) {
        let inverse = &self.inverses[flat];
        event.samples[flat] = RawSample::new(
            inverse.amplitude.eval(energy),
            inverse.time.eval(time),
            self.timestamp,
        );
    }

    fn fill_shared(&self, event: &mut RawEvent, detector: usize, weights: &[f64]) {
        let energies = split_up_energy(self.config.gamma_energy, weights);
        for (flat, energy) in self.setup.channel_range(detector).zip(energies) {
            self.fill_channel(event, flat, energy, self.config.gamma_time);
        }
    }

    fn emit(&mut self, events: &mut Vec<RawEvent>, event: RawEvent) {
        events.push(event);
        self.timestamp += 1.0;
    }
}

#[allow(clippy::cast_possible_truncation)]
fn counter_increment(pulses: f64, trigger_frequency: f64) -> i64 {
    (pulses / trigger_frequency) as i64
}

fn invert_error(detector: &str, channel: &str, error: Error) -> Error {
    match error {
        Error::Inversion(message) => Error::Inversion(format!("{detector}/{channel}: {message}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_split_up_energy() {
        assert_eq!(split_up_energy(1000.0, &[0.3]), vec![1000.0]);
        let parts = split_up_energy(1000.0, &[1.0, 3.0]);
        assert_relative_eq!(parts[0], 250.0);
        assert_relative_eq!(parts[1], 750.0);
        let total: f64 = split_up_energy(1000.0, &[0.2, 0.9, 0.4]).iter().sum();
        assert_relative_eq!(total, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_background_time_avoids_excluded_range() {
        let range = Window::new(-100.0, 100.0);
        let excluded = Window::new(-10.0, 10.0);
        assert_relative_eq!(sample_background_time(range, excluded, 0.0), -100.0);
        assert_relative_eq!(sample_background_time(range, excluded, 0.25), -55.0);
        assert_relative_eq!(sample_background_time(range, excluded, 0.5), 10.0);
        assert_relative_eq!(sample_background_time(range, excluded, 0.75), 55.0);
        for i in 0..100 {
            let t = sample_background_time(range, excluded, f64::from(i) / 100.0);
            assert!(!(-10.0..10.0).contains(&t), "{t}");
            assert!((-100.0..=100.0).contains(&t));
        }
    }

    #[test]
    fn test_invalid_background_windows() {
        let config = SamplerConfig {
            background_excluded: Window::new(-200.0, 200.0),
            ..SamplerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(SamplerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_counter_increment_truncates() {
        assert_eq!(counter_increment(1000.0, 3.0), 333);
        assert_eq!(counter_increment(1000.0, 0.5), 2000);
    }
}
