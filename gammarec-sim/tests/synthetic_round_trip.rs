#![allow(clippy::float_cmp)]
use approx::assert_relative_eq;
use gammarec_algorithms::{reconstruct, EventState};
use gammarec_core::{
    ChannelConfig, CoincidenceMatrix, CounterChannel, CounterDetector, DetectorGroup,
    DetectorSetup, EnergySensitiveDetector, GroupId, Polynomial, PolynomialCalibration,
    RawEvent,
};
use gammarec_sim::{Sampler, SamplerConfig};
use std::sync::Arc;

const EVENTS_PER_SET: usize = 14;

fn setup() -> DetectorSetup {
    let quadratic = Arc::new(PolynomialCalibration::new(
        Polynomial::new(vec![0.0, 0.5, 1e-6]),
        Polynomial::identity(),
    ));
    let clover = EnergySensitiveDetector::new(
        "clover",
        GroupId(0),
        (0..4)
            .map(|i| ChannelConfig::new(format!("{i}"), quadratic.clone()))
            .collect(),
    );
    let labr = EnergySensitiveDetector::new(
        "labr",
        GroupId(1),
        vec![ChannelConfig::new(
            "0",
            Arc::new(PolynomialCalibration::new(
                Polynomial::linear(-2.0, 0.25),
                Polynomial::linear(0.0, 0.5),
            )),
        )],
    );
    let scaler = CounterDetector::new(
        "scaler",
        GroupId(0),
        vec![CounterChannel::new("a"), CounterChannel::new("b")],
        4.0,
    );
    DetectorSetup::new(
        vec![
            DetectorGroup::new("hpge"),
            DetectorGroup::new("labr").with_tdc_resolution(0.5),
        ],
        vec![clover.into(), labr.into(), scaler.into()],
        vec![CoincidenceMatrix::new("clover_labr", vec![0], vec![1])],
    )
    .unwrap()
}

fn fingerprint(events: &[RawEvent]) -> Vec<u64> {
    events
        .iter()
        .flat_map(|e| {
            e.samples
                .iter()
                .flat_map(|s| [s.amplitude.to_bits(), s.time.to_bits(), s.timestamp.to_bits()])
                .chain(std::iter::once(e.reference_time.to_bits()))
        })
        .collect()
}

#[test]
fn test_set_layout() {
    let setup = setup();
    let mut sampler = Sampler::new(&setup, SamplerConfig::default()).unwrap();
    let events = sampler.generate(2);
    assert_eq!(events.len(), 2 * EVENTS_PER_SET);
    // Counter events carry no timestamp.
    assert_relative_eq!(sampler.timestamp(), 2.0 * (EVENTS_PER_SET as f64 - 1.0));

    let fired = |e: &RawEvent| e.samples.iter().filter(|s| s.is_present()).count();
    let expected = [4, 1, 1, 1, 1, 1, 1, 1, 1, 5, 1, 1, 1, 0];
    for (event, n) in events.iter().zip(expected) {
        assert_eq!(fired(event), n);
    }
    assert_eq!(events[13].counts, vec![250, 250]);
    assert!(events[13].reference_time.is_nan());
    assert!(events[..13].iter().all(|e| e.counts == vec![0, 0]));
}

#[test]
fn test_reconstruction_recovers_targets() {
    let setup = setup();
    let mut sampler = Sampler::new(&setup, SamplerConfig::default()).unwrap();
    let events = sampler.generate_set();
    let mut state = EventState::new(&setup);

    // Shared-energy event in the clover.
    state.process(&setup, &events[0], 0).unwrap();
    let result = state.result(0);
    assert_relative_eq!(result.energy, 1000.0, epsilon = 0.1);
    assert_relative_eq!(result.time, 20.0, epsilon = 1e-6);
    assert_relative_eq!(result.time_vs_rf, 10.0, epsilon = 1e-6);
    assert_eq!(state.addback(0).clusters().count(), 1);

    // Full-energy and background events in clover channel 0.
    state.process(&setup, &events[1], 1).unwrap();
    assert_relative_eq!(state.channels()[0].energy, 1000.0, epsilon = 0.1);
    assert_relative_eq!(state.channels()[0].timestamp, 1.0);
    state.process(&setup, &events[2], 2).unwrap();
    assert_relative_eq!(state.channels()[0].energy, 500.0, epsilon = 0.1);
    let background = state.channels()[0].time;
    let spread = background.abs();
    assert!(spread > 10.0 - 1e-6 && spread <= 100.0 + 1e-6);

    // Single-channel detector with its own TDC resolution.
    state.process(&setup, &events[10], 10).unwrap();
    assert_relative_eq!(state.detector_energy(1), 1000.0, epsilon = 1e-6);
    assert_relative_eq!(state.result(1).time, 20.0, epsilon = 1e-6);
    assert_relative_eq!(state.result(1).time_vs_rf, 10.0, epsilon = 1e-6);

    state.process(&setup, &events[13], 13).unwrap();
    assert_eq!(state.counts(&setup, 2), &[250, 250]);
}

#[test]
fn test_coincident_event_fills_matrix() {
    let setup = setup();
    let mut sampler = Sampler::new(&setup, SamplerConfig::default()).unwrap();
    let events = sampler.generate_set();
    let fills = reconstruct(&setup, &events, 0).unwrap();

    // Only the two-detector event has both sides firing.
    let pairs = &fills.pairs[0];
    assert_eq!(pairs.len(), 4);
    assert_relative_eq!(pairs.iter().map(|p| p.0).sum::<f64>(), 1000.0, epsilon = 0.1);
    for &(_, y) in pairs {
        assert_relative_eq!(y, 1000.0, epsilon = 1e-6);
    }
}

#[test]
fn test_seeded_reproducibility() {
    let setup = setup();
    let a = Sampler::new(&setup, SamplerConfig::default().with_seed(3))
        .unwrap()
        .generate(3);
    let b = Sampler::new(&setup, SamplerConfig::default().with_seed(3))
        .unwrap()
        .generate(3);
    let c = Sampler::new(&setup, SamplerConfig::default().with_seed(4))
        .unwrap()
        .generate(3);
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_ne!(fingerprint(&a), fingerprint(&c));

    let mut sampler = Sampler::new(&setup, SamplerConfig::default().with_seed(3)).unwrap();
    let _ = sampler.generate(1);
    sampler.reset();
    assert_eq!(fingerprint(&sampler.generate(3)), fingerprint(&a));
}

#[test]
fn test_inversion_error_names_channel() {
    let flat = EnergySensitiveDetector::new(
        "dead",
        GroupId(0),
        vec![ChannelConfig::new(
            "x",
            Arc::new(PolynomialCalibration::new(
                Polynomial::new(vec![f64::NAN]),
                Polynomial::identity(),
            )),
        )],
    );
    let setup =
        DetectorSetup::new(vec![DetectorGroup::new("g")], vec![flat.into()], vec![]).unwrap();
    let err = Sampler::new(&setup, SamplerConfig::default()).unwrap_err();
    assert!(err.to_string().contains("dead/x"), "{err}");
}
