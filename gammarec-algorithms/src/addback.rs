//! Addback clustering within one detector.
//!
//! Key characteristics:
//! - Channels are visited in configured order; the first unflagged channel
//!   that fired seeds a cluster
//! - Later channels merge into the seed if `time_seed - time_j` lies in the
//!   pair's addback window
//! - The cluster time is the time of its most energetic channel
//! - The detector result is the cluster with the largest sum, first formed
//!   wins ties
//! - O(N^2) in the channel count

use gammarec_core::{ChannelState, EnergySensitiveDetector, NonCoincidentPolicy};

/// Progress of the addback pass for the current event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddbackPhase {
    /// Reset, nothing processed.
    #[default]
    Idle,
    /// Clusters are being formed.
    Clustering,
    /// Every channel has been visited and the result is final.
    Finalized,
}

/// Detector-level addback result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddbackResult {
    /// Summed energy of the winning cluster, NaN if nothing fired.
    pub energy: f64,
    /// Time of the winning cluster's leading channel.
    pub time: f64,
    /// RF-relative time of the winning cluster's leading channel.
    pub time_vs_rf: f64,
    /// Index of the winning cluster's leading channel.
    pub leading: Option<usize>,
}

impl AddbackResult {
    /// Result of an event in which no channel fired.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            energy: f64::NAN,
            time: f64::NAN,
            time_vs_rf: f64::NAN,
            leading: None,
        }
    }

    /// Result of a single channel, used for single-channel detectors.
    #[must_use]
    pub fn from_channel(index: usize, channel: &ChannelState) -> Self {
        if channel.fired() {
            Self {
                energy: channel.energy,
                time: channel.time,
                time_vs_rf: channel.time_vs_rf,
                leading: Some(index),
            }
        } else {
            Self::empty()
        }
    }
}

impl Default for AddbackResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Reusable per-detector addback state.
///
/// Slot `i` of the accumulators holds a cluster sum only if channel `i`
/// seeded a cluster this event; other slots stay NaN.
#[derive(Debug, Clone, Default)]
pub struct AddbackState {
    skip: Vec<bool>,
    energies: Vec<f64>,
    times: Vec<f64>,
    leading: Vec<usize>,
    phase: AddbackPhase,
    result: AddbackResult,
}

impl AddbackState {
    /// Allocates state for `n_channels` channels.
    #[must_use]
    pub fn new(n_channels: usize) -> Self {
        let mut state = Self {
            skip: vec![false; n_channels],
            energies: vec![f64::NAN; n_channels],
            times: vec![f64::NAN; n_channels],
            leading: vec![0; n_channels],
            phase: AddbackPhase::Idle,
            result: AddbackResult::empty(),
        };
        state.reset();
        state
    }

    /// Clears skip flags, accumulators and the result.
    pub fn reset(&mut self) {
        self.skip.fill(false);
        self.energies.fill(f64::NAN);
        self.times.fill(f64::NAN);
        for (i, leading) in self.leading.iter_mut().enumerate() {
            *leading = i;
        }
        self.phase = AddbackPhase::Idle;
        self.result = AddbackResult::empty();
    }

    /// Runs addback over `channels`, the calibrated states of `detector`.
    ///
    /// # Panics
    /// Panics if `channels` or this state do not match the detector's
    /// channel count.
    pub fn run(
        &mut self,
        detector: &EnergySensitiveDetector,
        channels: &[ChannelState],
    ) -> AddbackResult {
        let n = detector.channels.len();
        assert_eq!(channels.len(), n, "channel states do not match detector '{}'", detector.name);
        assert_eq!(self.skip.len(), n, "addback state does not match detector '{}'", detector.name);

        self.reset();
        self.phase = AddbackPhase::Clustering;

        for seed in 0..n {
            if self.skip[seed] || !channels[seed].fired() {
                continue;
            }

            let mut sum = channels[seed].energy;
            let mut leading = seed;

            for j in seed + 1..n {
                if self.skip[j] {
                    continue;
                }
                if !channels[j].fired() {
                    self.skip[j] = true;
                } else if detector.addback_windows.coincident(
                    seed,
                    j,
                    channels[seed].time,
                    channels[j].time,
                ) {
                    sum += channels[j].energy;
                    self.skip[j] = true;
                    if channels[j].energy > channels[leading].energy {
                        leading = j;
                    }
                } else if detector.policy == NonCoincidentPolicy::Discard {
                    self.skip[j] = true;
                }
            }

            self.energies[seed] = sum;
            self.times[seed] = channels[leading].time;
            self.leading[seed] = leading;
            self.skip[seed] = true;
        }

        self.result = self.select(channels);
        self.phase = AddbackPhase::Finalized;
        self.result
    }

    /// Picks the cluster with the largest sum. Strict comparison, so the
    /// first formed cluster wins ties.
    fn select(&self, channels: &[ChannelState]) -> AddbackResult {
        let mut best = AddbackResult::empty();
        for (slot, &energy) in self.energies.iter().enumerate() {
            if energy.is_nan() {
                continue;
            }
            if best.energy.is_nan() || energy > best.energy {
                let leading = self.leading[slot];
                best = AddbackResult {
                    energy,
                    time: self.times[slot],
                    time_vs_rf: channels[leading].time_vs_rf,
                    leading: Some(leading),
                };
            }
        }
        best
    }

    /// Skip flags after the last pass.
    #[must_use]
    pub fn skipped(&self) -> &[bool] {
        &self.skip
    }

    /// Accumulated energy per seed slot (NaN for non-seeds).
    #[must_use]
    pub fn cluster_energies(&self) -> &[f64] {
        &self.energies
    }

    /// Cluster time per seed slot (NaN for non-seeds).
    #[must_use]
    pub fn cluster_times(&self) -> &[f64] {
        &self.times
    }

    /// Finalized cluster sums in seed order.
    pub fn clusters(&self) -> impl Iterator<Item = f64> + '_ {
        self.energies.iter().copied().filter(|e| !e.is_nan())
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> AddbackPhase {
        self.phase
    }

    /// Result of the last pass.
    #[must_use]
    pub fn result(&self) -> AddbackResult {
        self.result
    }
}
