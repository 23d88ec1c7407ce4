//! The validated, immutable analysis configuration.

use crate::detector::{Detector, EnergySensitiveDetector};
use crate::group::{DetectorGroup, GroupId};
use crate::matrix::CoincidenceMatrix;
use crate::window::RfGate;
use crate::{Error, Result};
use log::{debug, warn};
use std::ops::Range;

/// Groups, detectors and coincidence matrices of one analysis.
///
/// Built once with [`DetectorSetup::new`], which validates every cross
/// reference. Nothing mutates a setup afterwards; per-event state lives
/// elsewhere and borrows the setup.
#[derive(Debug, Clone)]
pub struct DetectorSetup {
    groups: Vec<DetectorGroup>,
    detectors: Vec<Detector>,
    matrices: Vec<CoincidenceMatrix>,
    /// First flat channel index of each detector, among channels of its kind.
    offsets: Vec<usize>,
    n_samples: usize,
    n_counters: usize,
}

impl DetectorSetup {
    /// Validates and assembles a setup.
    ///
    /// # Errors
    /// Returns the first configuration error found: invalid groups, empty
    /// detectors, unknown group keys, addback window matrices that do not
    /// match their channel count, non-positive trigger frequencies, inverted
    /// RF or matrix windows, and coincidence matrices referencing missing or
    /// counter detectors.
    pub fn new(
        groups: Vec<DetectorGroup>,
        detectors: Vec<Detector>,
        matrices: Vec<CoincidenceMatrix>,
    ) -> Result<Self> {
        for group in &groups {
            group.validate()?;
        }

        let mut offsets = Vec::with_capacity(detectors.len());
        let mut n_samples = 0;
        let mut n_counters = 0;
        for detector in &detectors {
            if detector.n_channels() == 0 {
                return Err(Error::EmptyDetector(detector.name().to_string()));
            }
            let GroupId(group) = detector.group();
            if group >= groups.len() {
                return Err(Error::UnknownGroup {
                    detector: detector.name().to_string(),
                    group,
                    groups: groups.len(),
                });
            }
            match detector {
                Detector::EnergySensitive(d) => {
                    d.addback_windows.validate(&d.name, d.channels.len())?;
                    for channel in &d.channels {
                        if let RfGate::Window(window) = channel.rf_gate {
                            window.validate(format!(
                                "detector '{}' channel '{}': RF gate",
                                d.name, channel.name
                            ))?;
                        }
                    }
                    offsets.push(n_samples);
                    n_samples += d.channels.len();
                }
                Detector::Counter(d) => {
                    if !(d.trigger_frequency > 0.0 && d.trigger_frequency.is_finite()) {
                        return Err(Error::InvalidTriggerFrequency {
                            detector: d.name.clone(),
                            frequency: d.trigger_frequency,
                        });
                    }
                    offsets.push(n_counters);
                    n_counters += d.channels.len();
                }
            }
        }

        for matrix in &matrices {
            for (axis, indices) in [("x", &matrix.x_data), ("y", &matrix.y_data)] {
                for &index in indices {
                    let Some(detector) = detectors.get(index) else {
                        return Err(Error::DetectorIndexOutOfRange {
                            matrix: matrix.name.clone(),
                            axis,
                            index,
                            detectors: detectors.len(),
                        });
                    };
                    if detector.as_energy_sensitive().is_none() {
                        return Err(Error::NotEnergySensitive {
                            matrix: matrix.name.clone(),
                            detector: detector.name().to_string(),
                        });
                    }
                }
            }
            if let Some(window) = matrix.time_window {
                window.validate(format!("coincidence matrix '{}': time window", matrix.name))?;
            }
            if !matrix.is_fillable() {
                warn!(
                    "coincidence matrix '{}' has no y detectors and will not be filled",
                    matrix.name
                );
            }
        }

        debug!(
            "detector setup: {} groups, {} detectors ({} energy channels, {} counter channels), \
             {} coincidence matrices",
            groups.len(),
            detectors.len(),
            n_samples,
            n_counters,
            matrices.len()
        );

        Ok(Self {
            groups,
            detectors,
            matrices,
            offsets,
            n_samples,
            n_counters,
        })
    }

    /// All groups.
    #[must_use]
    pub fn groups(&self) -> &[DetectorGroup] {
        &self.groups
    }

    /// Group by key. Keys of configured detectors are always valid.
    #[must_use]
    pub fn group(&self, id: GroupId) -> &DetectorGroup {
        &self.groups[id.0]
    }

    /// All detectors, in configuration order.
    #[must_use]
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// All coincidence matrices.
    #[must_use]
    pub fn matrices(&self) -> &[CoincidenceMatrix] {
        &self.matrices
    }

    /// Index of the detector called `name`.
    #[must_use]
    pub fn detector_index(&self, name: &str) -> Option<usize> {
        self.detectors.iter().position(|d| d.name() == name)
    }

    /// Energy-sensitive detectors with their indices.
    pub fn energy_sensitive(&self) -> impl Iterator<Item = (usize, &EnergySensitiveDetector)> {
        self.detectors
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_energy_sensitive().map(|d| (i, d)))
    }

    /// Flat range of detector `index`'s channels in [`RawEvent::samples`](crate::RawEvent)
    /// or [`RawEvent::counts`](crate::RawEvent), depending on its kind.
    #[must_use]
    pub fn channel_range(&self, index: usize) -> Range<usize> {
        let start = self.offsets[index];
        start..start + self.detectors[index].n_channels()
    }

    /// Total energy-sensitive channels.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Total counter channels.
    #[must_use]
    pub fn n_counters(&self) -> usize {
        self.n_counters
    }
}
