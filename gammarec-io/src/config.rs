//! JSON setup files.
//!
//! Detectors refer to groups by name and matrices refer to detectors by
//! name; both are resolved to indices here. Every field except names and
//! channel lists is optional.
//!
//! ```json
//! {
//!   "groups": [{ "name": "hpge", "tdc_resolution": 0.1 }],
//!   "detectors": [
//!     {
//!       "kind": "energy_sensitive",
//!       "name": "clover1",
//!       "group": "hpge",
//!       "channels": [
//!         { "name": "A", "calibration": { "amplitude": [0.0, 0.5] }, "threshold": 20.0 },
//!         { "name": "B", "rf_gate": [-5.0, 5.0] }
//!       ],
//!       "addback_windows": [[[-10.0, 10.0]]],
//!       "non_coincident": "reseed"
//!     },
//!     { "kind": "counter", "name": "scaler", "group": "hpge",
//!       "channels": [{ "name": "beam" }], "trigger_frequency": 1000.0 }
//!   ],
//!   "matrices": [{ "name": "gg", "x": ["clover1"], "y": ["clover1"], "symmetrize": true }]
//! }
//! ```

use crate::{Error, Result};
use gammarec_core::{
    Calibration, ChannelConfig, CoincidenceMatrix, CounterChannel, CounterDetector, Detector,
    DetectorGroup, DetectorSetup, DriftSegment, DriftingCalibration, EnergySensitiveDetector,
    GroupId, HistogramAxis, NonCoincidentPolicy, Polynomial, PolynomialCalibration, RfGate, Window,
};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonSetup {
    groups: Vec<JsonGroup>,
    detectors: Vec<JsonDetector>,
    #[serde(default)]
    matrices: Vec<JsonMatrix>,
}

#[derive(Deserialize, Clone, Copy)]
struct JsonAxis {
    n_bins: usize,
    minimum: f64,
    maximum: f64,
}

impl From<JsonAxis> for HistogramAxis {
    fn from(axis: JsonAxis) -> Self {
        HistogramAxis::new(axis.n_bins, axis.minimum, axis.maximum)
    }
}

#[derive(Deserialize)]
struct JsonGroup {
    name: String,
    tdc_resolution: Option<f64>,
    raw_amplitude: Option<JsonAxis>,
    raw_time: Option<JsonAxis>,
    energy: Option<JsonAxis>,
    time_difference: Option<JsonAxis>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonDetector {
    EnergySensitive {
        name: String,
        group: String,
        channels: Vec<JsonChannel>,
        addback_windows: Option<Vec<Vec<[f64; 2]>>>,
        #[serde(default)]
        non_coincident: JsonPolicy,
    },
    Counter {
        name: String,
        group: String,
        channels: Vec<JsonCounterChannel>,
        #[serde(default = "default_trigger_frequency")]
        trigger_frequency: f64,
    },
}

fn default_trigger_frequency() -> f64 {
    1.0
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum JsonPolicy {
    #[default]
    Discard,
    Reseed,
}

impl From<JsonPolicy> for NonCoincidentPolicy {
    fn from(policy: JsonPolicy) -> Self {
        match policy {
            JsonPolicy::Discard => NonCoincidentPolicy::Discard,
            JsonPolicy::Reseed => NonCoincidentPolicy::Reseed,
        }
    }
}

#[derive(Deserialize)]
struct JsonChannel {
    name: String,
    #[serde(default)]
    calibration: JsonCalibration,
    threshold: Option<f64>,
    rf_gate: Option<[f64; 2]>,
}

/// Ascending polynomial coefficients. A `drift` list replaces `amplitude`
/// with event-index segments.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct JsonCalibration {
    amplitude: Option<Vec<f64>>,
    time: Option<Vec<f64>>,
    drift: Option<Vec<JsonDriftSegment>>,
}

#[derive(Deserialize)]
struct JsonDriftSegment {
    first_event: u64,
    amplitude: Vec<f64>,
}

#[derive(Deserialize)]
struct JsonCounterChannel {
    name: String,
}

#[derive(Deserialize)]
struct JsonMatrix {
    name: String,
    x: Vec<String>,
    #[serde(default)]
    y: Vec<String>,
    #[serde(default)]
    symmetrize: bool,
    time_window: Option<[f64; 2]>,
    x_axis: Option<JsonAxis>,
    y_axis: Option<JsonAxis>,
}

/// Loads a setup from a JSON file.
///
/// # Errors
/// Fails on unreadable files, malformed JSON, unknown group or detector
/// names, and every configuration error [`DetectorSetup::new`] reports.
pub fn setup_from_file<P: AsRef<Path>>(path: P) -> Result<DetectorSetup> {
    let file = File::open(path.as_ref())?;
    let json: JsonSetup = serde_json::from_reader(BufReader::new(file))?;
    let setup = from_json_setup(json)?;
    info!(
        "loaded setup {}: {} detectors, {} matrices",
        path.as_ref().display(),
        setup.detectors().len(),
        setup.matrices().len()
    );
    Ok(setup)
}

/// Loads a setup from a JSON string.
///
/// # Errors
/// See [`setup_from_file`].
pub fn setup_from_json(json: &str) -> Result<DetectorSetup> {
    let json: JsonSetup = serde_json::from_str(json)?;
    from_json_setup(json)
}

fn from_json_setup(json: JsonSetup) -> Result<DetectorSetup> {
    let group_ids: HashMap<String, GroupId> = json
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| (g.name.clone(), GroupId(i)))
        .collect();
    let lookup_group = |detector: &str, group: &str| {
        group_ids.get(group).copied().ok_or_else(|| {
            Error::InvalidFormat(format!(
                "detector '{detector}' references unknown group '{group}'"
            ))
        })
    };

    let mut detectors = Vec::with_capacity(json.detectors.len());
    for detector in json.detectors {
        detectors.push(match detector {
            JsonDetector::EnergySensitive {
                name,
                group,
                channels,
                addback_windows,
                non_coincident,
            } => {
                let group = lookup_group(&name, &group)?;
                let channels = channels
                    .into_iter()
                    .map(|c| channel_config(&name, c))
                    .collect::<Result<Vec<_>>>()?;
                let mut detector = EnergySensitiveDetector::new(name, group, channels)
                    .with_policy(non_coincident.into());
                if let Some(rows) = addback_windows {
                    let rows = rows
                        .into_iter()
                        .map(|row| row.into_iter().map(window).collect())
                        .collect();
                    detector = detector.with_addback_windows(rows)?;
                }
                Detector::from(detector)
            }
            JsonDetector::Counter {
                name,
                group,
                channels,
                trigger_frequency,
            } => {
                let group = lookup_group(&name, &group)?;
                let channels = channels
                    .into_iter()
                    .map(|c| CounterChannel::new(c.name))
                    .collect();
                Detector::from(CounterDetector::new(name, group, channels, trigger_frequency))
            }
        });
    }

    let groups = json.groups.into_iter().map(detector_group).collect();

    let detector_ids: HashMap<String, usize> = detectors
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name().to_string(), i))
        .collect();
    let resolve = |matrix: &str, names: &[String]| {
        names
            .iter()
            .map(|n| {
                detector_ids.get(n.as_str()).copied().ok_or_else(|| {
                    Error::InvalidFormat(format!(
                        "matrix '{matrix}' references unknown detector '{n}'"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
    };

    let mut matrices = Vec::with_capacity(json.matrices.len());
    for m in json.matrices {
        let x_data = resolve(&m.name, &m.x)?;
        let y_data = resolve(&m.name, &m.y)?;
        let mut matrix =
            CoincidenceMatrix::new(m.name, x_data, y_data).with_symmetrize(m.symmetrize);
        if let Some(axis) = m.x_axis {
            matrix.x_axis = axis.into();
        }
        if let Some(axis) = m.y_axis {
            matrix.y_axis = axis.into();
        }
        if let Some(bounds) = m.time_window {
            matrix = matrix.with_time_window(window(bounds));
        }
        matrices.push(matrix);
    }

    Ok(DetectorSetup::new(groups, detectors, matrices)?)
}

fn window([lower, upper]: [f64; 2]) -> Window {
    Window::new(lower, upper)
}

fn detector_group(json: JsonGroup) -> DetectorGroup {
    let mut group = DetectorGroup::new(json.name);
    if let Some(tdc_resolution) = json.tdc_resolution {
        group = group.with_tdc_resolution(tdc_resolution);
    }
    if let Some(axis) = json.raw_amplitude {
        group = group.with_raw_amplitude(axis.into());
    }
    if let Some(axis) = json.raw_time {
        group = group.with_raw_time(axis.into());
    }
    if let Some(axis) = json.energy {
        group = group.with_energy(axis.into());
    }
    if let Some(axis) = json.time_difference {
        group = group.with_time_difference(axis.into());
    }
    group
}

fn channel_config(detector: &str, json: JsonChannel) -> Result<ChannelConfig> {
    let calibration = calibration(detector, &json.name, json.calibration)?;
    let mut channel = ChannelConfig::new(json.name, calibration);
    if let Some(threshold) = json.threshold {
        channel = channel.with_threshold(threshold);
    }
    if let Some(gate) = json.rf_gate {
        channel = channel.with_rf_gate(RfGate::Window(window(gate)));
    }
    Ok(channel)
}

fn polynomial(coefficients: Option<Vec<f64>>) -> Polynomial {
    coefficients.map_or_else(Polynomial::identity, Polynomial::new)
}

fn calibration(
    detector: &str,
    channel: &str,
    json: JsonCalibration,
) -> Result<Arc<dyn Calibration>> {
    let time = polynomial(json.time);
    match (json.drift, json.amplitude) {
        (Some(_), Some(_)) => Err(Error::InvalidFormat(format!(
            "{detector}/{channel}: calibration has both 'amplitude' and 'drift'"
        ))),
        (Some(segments), None) => {
            let segments = segments
                .into_iter()
                .map(|s| DriftSegment {
                    first_event: s.first_event,
                    amplitude: Polynomial::new(s.amplitude),
                })
                .collect();
            Ok(Arc::new(DriftingCalibration::new(segments, time)?))
        }
        (None, amplitude) => Ok(Arc::new(PolynomialCalibration::new(
            polynomial(amplitude),
            time,
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use gammarec_core::Error as CoreError;

    const SETUP: &str = r#"{
        "groups": [
            { "name": "hpge", "tdc_resolution": 0.5,
              "raw_amplitude": { "n_bins": 1024, "minimum": 0.0, "maximum": 4096.0 } },
            { "name": "scalers" }
        ],
        "detectors": [
            { "kind": "energy_sensitive", "name": "clover", "group": "hpge",
              "channels": [
                  { "name": "A", "calibration": { "amplitude": [1.0, 2.0] }, "threshold": 10.0 },
                  { "name": "B", "rf_gate": [-5.0, 5.0] },
                  { "name": "C", "calibration": { "drift": [
                      { "first_event": 0, "amplitude": [0.0, 1.0] },
                      { "first_event": 50, "amplitude": [0.0, 1.5] }
                  ] } }
              ],
              "addback_windows": [[[-10.0, 10.0], [-20.0, 20.0]], [[-1.0, 1.0]]],
              "non_coincident": "reseed" },
            { "kind": "energy_sensitive", "name": "labr", "group": "hpge",
              "channels": [{ "name": "0" }] },
            { "kind": "counter", "name": "scaler", "group": "scalers",
              "channels": [{ "name": "beam" }, { "name": "clock" }], "trigger_frequency": 100.0 }
        ],
        "matrices": [
            { "name": "clover_labr", "x": ["clover"], "y": ["labr"], "symmetrize": true,
              "time_window": [-50.0, 50.0] },
            { "name": "singles", "x": ["labr"] }
        ]
    }"#;

    #[test]
    fn test_load_full_setup() {
        let setup = setup_from_json(SETUP).unwrap();
        assert_eq!(setup.groups().len(), 2);
        assert_eq!(setup.groups()[0].tdc_resolution, 0.5);
        assert_eq!(setup.groups()[0].raw_amplitude.n_bins, 1024);
        assert_eq!(setup.n_samples(), 4);
        assert_eq!(setup.n_counters(), 2);

        let clover = setup.detectors()[0].as_energy_sensitive().unwrap();
        assert_eq!(clover.policy, NonCoincidentPolicy::Reseed);
        assert_eq!(clover.addback_windows.get(0, 2), Window::new(-20.0, 20.0));
        assert_eq!(clover.channels[0].threshold, 10.0);
        assert_eq!(clover.channels[0].calibration.calibrate_amplitude(3.0, 0), 7.0);
        assert_eq!(clover.channels[2].calibration.calibrate_amplitude(2.0, 60), 3.0);
        assert_eq!(
            clover.channels[1].rf_gate,
            RfGate::Window(Window::new(-5.0, 5.0))
        );

        let scaler = setup.detectors()[2].as_counter().unwrap();
        assert_eq!(scaler.trigger_frequency, 100.0);

        let matrix = &setup.matrices()[0];
        assert_eq!((matrix.x_data.clone(), matrix.y_data.clone()), (vec![0], vec![1]));
        assert!(matrix.symmetrize);
        assert_eq!(matrix.time_window, Some(Window::new(-50.0, 50.0)));
        assert!(!setup.matrices()[1].is_fillable());
    }

    #[test]
    fn test_unknown_names() {
        let json = r#"{ "groups": [], "detectors": [
            { "kind": "energy_sensitive", "name": "d", "group": "nope", "channels": [{ "name": "0" }] }
        ] }"#;
        let err = setup_from_json(json).unwrap_err().to_string();
        assert!(err.contains("unknown group 'nope'"), "{err}");

        let json = r#"{ "groups": [{ "name": "g" }], "detectors": [
            { "kind": "energy_sensitive", "name": "d", "group": "g", "channels": [{ "name": "0" }] }
        ], "matrices": [{ "name": "m", "x": ["d"], "y": ["ghost"] }] }"#;
        let err = setup_from_json(json).unwrap_err().to_string();
        assert!(err.contains("unknown detector 'ghost'"), "{err}");
    }

    #[test]
    fn test_window_dimension_error() {
        let json = r#"{ "groups": [{ "name": "g" }], "detectors": [
            { "kind": "energy_sensitive", "name": "d", "group": "g",
              "channels": [{ "name": "0" }, { "name": "1" }, { "name": "2" }],
              "addback_windows": [[[-1.0, 1.0]]] }
        ] }"#;
        assert!(matches!(
            setup_from_json(json),
            Err(Error::CoreError(CoreError::AddbackWindowRows { .. }))
        ));
    }

    #[test]
    fn test_zero_trigger_frequency() {
        let json = r#"{ "groups": [{ "name": "g" }], "detectors": [
            { "kind": "counter", "name": "scaler", "group": "g",
              "channels": [{ "name": "beam" }], "trigger_frequency": 0.0 }
        ] }"#;
        assert!(matches!(
            setup_from_json(json),
            Err(Error::CoreError(CoreError::InvalidTriggerFrequency { .. }))
        ));
    }

    #[test]
    fn test_conflicting_calibration() {
        let json = r#"{ "groups": [{ "name": "g" }], "detectors": [
            { "kind": "energy_sensitive", "name": "d", "group": "g",
              "channels": [{ "name": "0", "calibration": {
                  "amplitude": [0.0, 1.0], "drift": [{ "first_event": 0, "amplitude": [1.0] }] } }] }
        ] }"#;
        assert!(matches!(setup_from_json(json), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(setup_from_json("{"), Err(Error::Json(_))));
        assert!(matches!(
            setup_from_json(r#"{ "groups": [], "detectors": [{ "kind": "pmt", "name": "x" }] }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_setup_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.json");
        std::fs::write(&path, SETUP).unwrap();
        let setup = setup_from_file(&path).unwrap();
        assert_eq!(setup.detector_index("scaler"), Some(2));
        assert!(setup_from_file(dir.path().join("missing.json")).is_err());
    }
}
