//! Single-event observation files.
//!
//! Every observation stream of `gammarec_algorithms::spectra` goes to its
//! own CSV file in one directory. Rows start with the event index and name
//! detectors and channels.

use crate::writer::DataFileWriter;
use crate::Result;
use gammarec_algorithms::{
    addback_sums, channel_energies, energy_vs_time, raw_amplitudes, time_differences, EventState,
};
use gammarec_core::{DetectorSetup, RawEvent};
use log::info;
use std::path::{Path, PathBuf};

/// Calibrated energy per channel.
pub const CHANNEL_ENERGY_FILE: &str = "channel_energy.csv";
/// Raw amplitude per channel.
pub const RAW_AMPLITUDE_FILE: &str = "raw_amplitude.csv";
/// RF-gated energy and time per channel.
pub const ENERGY_VS_TIME_FILE: &str = "energy_vs_time.csv";
/// Time differences between channels of different detectors.
pub const TIME_DIFFERENCE_FILE: &str = "time_difference.csv";
/// Addback cluster sums per multi-channel detector.
pub const ADDBACK_FILE: &str = "addback.csv";

/// Writer of the observation files of a directory.
pub struct SpectraWriter<'a> {
    setup: &'a DetectorSetup,
    dir: PathBuf,
    channel_energy: DataFileWriter,
    raw_amplitude: DataFileWriter,
    energy_vs_time: DataFileWriter,
    time_difference: DataFileWriter,
    addback: DataFileWriter,
    rows: usize,
}

impl<'a> SpectraWriter<'a> {
    /// Creates `dir` if needed and every observation file in it.
    ///
    /// # Errors
    /// Fails if the directory or a file cannot be created.
    pub fn create<P: AsRef<Path>>(setup: &'a DetectorSetup, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let open = |name: &str, header: &str| -> Result<DataFileWriter> {
            let mut writer = DataFileWriter::create(dir.join(name))?;
            writer.write_line(format_args!("{header}"))?;
            Ok(writer)
        };
        Ok(Self {
            setup,
            dir: dir.to_path_buf(),
            channel_energy: open(CHANNEL_ENERGY_FILE, "event,detector,channel,energy")?,
            raw_amplitude: open(RAW_AMPLITUDE_FILE, "event,detector,channel,amplitude")?,
            energy_vs_time: open(ENERGY_VS_TIME_FILE, "event,detector,channel,energy,time")?,
            time_difference: open(
                TIME_DIFFERENCE_FILE,
                "event,detector_a,channel_a,detector_b,channel_b,time_difference",
            )?,
            addback: open(ADDBACK_FILE, "event,detector,energy")?,
            rows: 0,
        })
    }

    /// Appends the observations of one event.
    ///
    /// `raw` must be the event last processed by `state`.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn write_event(&mut self, raw: &RawEvent, state: &EventState) -> Result<()> {
        let setup = self.setup;
        let event = state
            .event_index()
            .map_or_else(String::new, |index| index.to_string());

        for (index, detector) in setup.energy_sensitive() {
            let name = &detector.name;
            for (n, amplitude) in raw_amplitudes(setup, raw, index) {
                let channel = channel_name(setup, index, n);
                self.raw_amplitude
                    .write_line(format_args!("{event},{name},{channel},{amplitude}"))?;
                self.rows += 1;
            }
            for (n, energy) in channel_energies(setup, state, index) {
                let channel = channel_name(setup, index, n);
                self.channel_energy
                    .write_line(format_args!("{event},{name},{channel},{energy}"))?;
                self.rows += 1;
            }
            for (n, energy, time) in energy_vs_time(setup, state, index) {
                let channel = channel_name(setup, index, n);
                self.energy_vs_time
                    .write_line(format_args!("{event},{name},{channel},{energy},{time}"))?;
                self.rows += 1;
            }
            for energy in addback_sums(state, index) {
                self.addback
                    .write_line(format_args!("{event},{name},{energy}"))?;
                self.rows += 1;
            }
        }

        for diff in time_differences(setup, state) {
            self.time_difference.write_line(format_args!(
                "{event},{},{},{},{},{}",
                setup.detectors()[diff.detector_a].name(),
                channel_name(setup, diff.detector_a, diff.channel_a),
                setup.detectors()[diff.detector_b].name(),
                channel_name(setup, diff.detector_b, diff.channel_b),
                diff.value
            ))?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Flushes every file.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn finish(mut self) -> Result<()> {
        for writer in [
            &mut self.channel_energy,
            &mut self.raw_amplitude,
            &mut self.energy_vs_time,
            &mut self.time_difference,
            &mut self.addback,
        ] {
            writer.flush()?;
        }
        info!("wrote {} observations to {}", self.rows, self.dir.display());
        Ok(())
    }
}

fn channel_name(setup: &DetectorSetup, detector: usize, channel: usize) -> &str {
    setup.detectors()[detector]
        .as_energy_sensitive()
        .map_or("", |d| d.channels[channel].name.as_str())
}
