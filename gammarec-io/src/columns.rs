//! Column names of event tables.
//!
//! Raw tables name channel columns `<detector>_<channel>_amplitude`,
//! `_time`, `_timestamp` or `_counts`. Calibrated tables use `_e`, `_t`,
//! `_ts`, `_t_vs_RF` per channel and `<detector>_addback_energy`,
//! `_addback_time`, `_addback_time_vs_time_RF` per multi-channel detector.

use gammarec_core::{Detector, DetectorSetup};

/// Column of the raw RF reference time.
pub const REFERENCE_TIME: &str = "reference_time";

/// Column of the event index in calibrated tables.
pub const EVENT: &str = "event";

/// One column of a raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawField {
    /// Raw RF reference time.
    ReferenceTime,
    /// Amplitude of flat sample `n`.
    Amplitude(usize),
    /// Time of flat sample `n`.
    Time(usize),
    /// Timestamp of flat sample `n`.
    Timestamp(usize),
    /// Increment of flat counter `n`.
    Counts(usize),
}

/// Raw columns in write order.
#[must_use]
pub fn raw_columns(setup: &DetectorSetup) -> Vec<(String, RawField)> {
    let mut columns = vec![(REFERENCE_TIME.to_string(), RawField::ReferenceTime)];
    for (index, detector) in setup.detectors().iter().enumerate() {
        let range = setup.channel_range(index);
        match detector {
            Detector::EnergySensitive(d) => {
                for (channel, flat) in d.channels.iter().zip(range) {
                    let prefix = format!("{}_{}", d.name, channel.name);
                    columns.push((format!("{prefix}_amplitude"), RawField::Amplitude(flat)));
                    columns.push((format!("{prefix}_time"), RawField::Time(flat)));
                    columns.push((format!("{prefix}_timestamp"), RawField::Timestamp(flat)));
                }
            }
            Detector::Counter(d) => {
                for (channel, flat) in d.channels.iter().zip(range) {
                    columns.push((
                        format!("{}_{}_counts", d.name, channel.name),
                        RawField::Counts(flat),
                    ));
                }
            }
        }
    }
    columns
}

/// Calibrated column names in write order.
#[must_use]
pub fn calibrated_columns(setup: &DetectorSetup) -> Vec<String> {
    let mut columns = vec![EVENT.to_string()];
    for detector in setup.detectors() {
        match detector {
            Detector::EnergySensitive(d) => {
                for channel in &d.channels {
                    let prefix = format!("{}_{}", d.name, channel.name);
                    columns.extend(
                        ["e", "t", "ts", "t_vs_RF"].map(|suffix| format!("{prefix}_{suffix}")),
                    );
                }
                if d.is_multi_channel() {
                    columns.extend(
                        ["addback_energy", "addback_time", "addback_time_vs_time_RF"]
                            .map(|suffix| format!("{}_{suffix}", d.name)),
                    );
                }
            }
            Detector::Counter(d) => {
                columns.extend(
                    d.channels
                        .iter()
                        .map(|c| format!("{}_{}_counts", d.name, c.name)),
                );
            }
        }
    }
    columns
}
