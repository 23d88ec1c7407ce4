//! Single-event observation streams for the histogram layer.

use crate::reconstruction::EventState;
use gammarec_core::{ChannelConfig, DetectorSetup, RawEvent};

/// Time difference between two channels of different detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDifference {
    /// First detector (lower index).
    pub detector_a: usize,
    /// Channel of the first detector.
    pub channel_a: usize,
    /// Second detector.
    pub detector_b: usize,
    /// Channel of the second detector.
    pub channel_b: usize,
    /// `time_a - time_b`.
    pub value: f64,
}

fn channel_configs(setup: &DetectorSetup, index: usize) -> &[ChannelConfig] {
    setup.detectors()[index]
        .as_energy_sensitive()
        .map_or(&[][..], |d| d.channels.as_slice())
}

/// `(channel, energy)` of every channel of detector `index` that fired.
///
/// No RF gate is applied. Counter detectors yield nothing.
pub fn channel_energies<'a>(
    setup: &'a DetectorSetup,
    state: &'a EventState,
    index: usize,
) -> impl Iterator<Item = (usize, f64)> + 'a {
    state
        .detector_channels(setup, index)
        .iter()
        .enumerate()
        .filter(|(_, channel)| channel.fired())
        .map(|(n, channel)| (n, channel.energy))
}

/// `(channel, raw amplitude)` of every channel of detector `index` whose
/// amplitude is above threshold and whose raw time is positive.
///
/// Reads the uncalibrated event, so it needs no [`EventState`].
pub fn raw_amplitudes<'a>(
    setup: &'a DetectorSetup,
    raw: &'a RawEvent,
    index: usize,
) -> impl Iterator<Item = (usize, f64)> + 'a {
    let samples = raw
        .samples
        .get(setup.channel_range(index))
        .unwrap_or_default();
    channel_configs(setup, index)
        .iter()
        .zip(samples)
        .enumerate()
        .filter(|(_, (config, sample))| {
            config.above_threshold(sample.amplitude) && sample.time > 0.0
        })
        .map(|(n, (_, sample))| (n, sample.amplitude))
}

/// `(channel, energy, time)` of every channel of detector `index` that
/// fired and passes its RF gate.
pub fn energy_vs_time<'a>(
    setup: &'a DetectorSetup,
    state: &'a EventState,
    index: usize,
) -> impl Iterator<Item = (usize, f64, f64)> + 'a {
    channel_configs(setup, index)
        .iter()
        .zip(state.detector_channels(setup, index))
        .enumerate()
        .filter(|(_, (config, channel))| {
            channel.fired() && config.rf_gate_accepts(channel)
        })
        .map(|(n, (_, channel))| (n, channel.energy, channel.time))
}

/// Time differences of every pair of firing channels in different
/// detectors, first detector index lower than the second.
pub fn time_differences<'a>(
    setup: &'a DetectorSetup,
    state: &'a EventState,
) -> impl Iterator<Item = TimeDifference> + 'a {
    let fired = move |index: usize| {
        state
            .detector_channels(setup, index)
            .iter()
            .enumerate()
            .filter(|(_, c)| c.fired())
    };
    let n = setup.detectors().len();
    (0..n).flat_map(move |detector_a| {
        fired(detector_a).flat_map(move |(channel_a, a)| {
            (detector_a + 1..n).flat_map(move |detector_b| {
                fired(detector_b).map(move |(channel_b, b)| TimeDifference {
                    detector_a,
                    channel_a,
                    detector_b,
                    channel_b,
                    value: a.time - b.time,
                })
            })
        })
    })
}

/// Every finalized cluster sum of multi-channel detector `index`.
///
/// Single-channel and counter detectors never run addback and yield nothing.
pub fn addback_sums(state: &EventState, index: usize) -> impl Iterator<Item = f64> + '_ {
    state.addback(index).clusters()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gammarec_core::{
        ChannelConfig, CounterChannel, CounterDetector, DetectorGroup, EnergySensitiveDetector,
        GroupId, RawSample,
    };

    fn setup() -> DetectorSetup {
        DetectorSetup::new(
            vec![DetectorGroup::new("g")],
            vec![
                EnergySensitiveDetector::new(
                    "clover",
                    GroupId(0),
                    vec![
                        ChannelConfig::identity("a").with_threshold(10.0),
                        ChannelConfig::identity("b").with_threshold(10.0),
                        ChannelConfig::identity("c").with_threshold(10.0),
                    ],
                )
                .into(),
                CounterDetector::new("scaler", GroupId(0), vec![CounterChannel::new("x")], 1.0)
                    .into(),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    fn event() -> RawEvent {
        let mut event = RawEvent::empty(3, 1);
        event.reference_time = 0.0;
        event.samples[0] = RawSample::new(50.0, 4.0, 1.0);
        event.samples[1] = RawSample::new(5.0, 4.0, 1.0);
        event.samples[2] = RawSample::new(70.0, -2.0, 1.0);
        event.counts[0] = 3;
        event
    }

    #[test]
    fn test_raw_amplitudes_need_threshold_and_positive_time() {
        let setup = setup();
        let raw = event();
        assert_eq!(
            raw_amplitudes(&setup, &raw, 0).collect::<Vec<_>>(),
            vec![(0, 50.0)]
        );
        assert_eq!(raw_amplitudes(&setup, &raw, 1).count(), 0);
    }

    #[test]
    fn test_channel_energies_ignore_time_sign() {
        let setup = setup();
        let mut state = EventState::new(&setup);
        state.process(&setup, &event(), 0).unwrap();
        assert_eq!(
            channel_energies(&setup, &state, 0).collect::<Vec<_>>(),
            vec![(0, 50.0), (2, 70.0)]
        );
        assert_eq!(channel_energies(&setup, &state, 1).count(), 0);
    }
}
