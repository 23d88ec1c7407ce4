//! Per-event reconstruction: calibration, addback and counter accumulation.

use crate::addback::{AddbackResult, AddbackState};
use crate::coincidence::{coincidence_pairs, CoincidenceFills};
use gammarec_core::{ChannelState, Detector, DetectorSetup, Error, RawEvent, Result};
use log::debug;
use rayon::prelude::*;

/// Mutable state of one event, reused across events.
///
/// Allocated once per setup (and once per worker when processing in
/// parallel). Every calibrated value is reset at the start of
/// [`EventState::process`], so nothing leaks from one event into the next.
#[derive(Debug, Clone)]
pub struct EventState {
    channels: Vec<ChannelState>,
    addback: Vec<AddbackState>,
    results: Vec<AddbackResult>,
    counter_totals: Vec<i64>,
    event_index: Option<u64>,
}

impl EventState {
    /// Allocates state matching `setup`.
    #[must_use]
    pub fn new(setup: &DetectorSetup) -> Self {
        let addback = setup
            .detectors()
            .iter()
            .map(|d| match d {
                Detector::EnergySensitive(d) => AddbackState::new(d.channels.len()),
                Detector::Counter(_) => AddbackState::new(0),
            })
            .collect();
        Self {
            channels: vec![ChannelState::default(); setup.n_samples()],
            addback,
            results: vec![AddbackResult::empty(); setup.detectors().len()],
            counter_totals: vec![0; setup.n_counters()],
            event_index: None,
        }
    }

    /// Returns every calibrated value and addback result to NaN.
    ///
    /// Counter totals are kept; see [`EventState::clear_counters`].
    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(ChannelState::reset);
        self.addback.iter_mut().for_each(AddbackState::reset);
        self.results.fill(AddbackResult::empty());
        self.event_index = None;
    }

    /// Sets every counter total to zero.
    pub fn clear_counters(&mut self) {
        self.counter_totals.fill(0);
    }

    /// Calibrates `raw`, runs addback for every multi-channel detector and
    /// adds the counter increments.
    ///
    /// # Errors
    /// Returns [`Error::EventShape`] if `raw` does not match the setup.
    pub fn process(
        &mut self,
        setup: &DetectorSetup,
        raw: &RawEvent,
        event_index: u64,
    ) -> Result<()> {
        if raw.samples.len() != setup.n_samples() || raw.counts.len() != setup.n_counters() {
            return Err(Error::EventShape {
                samples: raw.samples.len(),
                counts: raw.counts.len(),
                expected_samples: setup.n_samples(),
                expected_counts: setup.n_counters(),
            });
        }

        self.reset();
        self.event_index = Some(event_index);

        for (index, detector) in setup.detectors().iter().enumerate() {
            let range = setup.channel_range(index);
            match detector {
                Detector::EnergySensitive(d) => {
                    let rf_time = setup.group(d.group).rf_time(raw.reference_time);
                    let states = &mut self.channels[range.clone()];
                    for ((config, sample), state) in d
                        .channels
                        .iter()
                        .zip(&raw.samples[range])
                        .zip(states.iter_mut())
                    {
                        config.calibrate(sample, rf_time, event_index, state);
                    }
                    self.results[index] = if d.is_multi_channel() {
                        self.addback[index].run(d, states)
                    } else {
                        AddbackResult::from_channel(0, &states[0])
                    };
                }
                Detector::Counter(_) => {
                    for (total, increment) in self.counter_totals[range.clone()]
                        .iter_mut()
                        .zip(&raw.counts[range])
                    {
                        *total += increment;
                    }
                }
            }
        }
        Ok(())
    }

    /// Index of the event last processed.
    #[must_use]
    pub fn event_index(&self) -> Option<u64> {
        self.event_index
    }

    /// Calibrated states of all energy-sensitive channels, flat.
    #[must_use]
    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    /// Calibrated states of detector `index`'s channels.
    ///
    /// Empty for counter detectors.
    #[must_use]
    pub fn detector_channels(&self, setup: &DetectorSetup, index: usize) -> &[ChannelState] {
        match setup.detectors()[index] {
            Detector::EnergySensitive(_) => &self.channels[setup.channel_range(index)],
            Detector::Counter(_) => &[],
        }
    }

    /// Addback state of detector `index`.
    #[must_use]
    pub fn addback(&self, index: usize) -> &AddbackState {
        &self.addback[index]
    }

    /// Detector-level result: the addback triple for multi-channel
    /// detectors, the channel's own values for single-channel detectors.
    #[must_use]
    pub fn result(&self, index: usize) -> AddbackResult {
        self.results[index]
    }

    /// Detector-level energy, see [`EventState::result`].
    #[must_use]
    pub fn detector_energy(&self, index: usize) -> f64 {
        self.results[index].energy
    }

    /// Accumulated counts of counter detector `index`. Empty for
    /// energy-sensitive detectors.
    #[must_use]
    pub fn counts(&self, setup: &DetectorSetup, index: usize) -> &[i64] {
        match setup.detectors()[index] {
            Detector::Counter(_) => &self.counter_totals[setup.channel_range(index)],
            Detector::EnergySensitive(_) => &[],
        }
    }

    /// Pair observations of coincidence matrix `matrix` for this event.
    pub fn pairs<'a>(
        &'a self,
        setup: &'a DetectorSetup,
        matrix: usize,
    ) -> impl Iterator<Item = (f64, f64)> + 'a {
        coincidence_pairs(setup, &setup.matrices()[matrix], &self.channels)
    }

    /// Appends this event's pair observations of every matrix to `fills`.
    pub fn fill(&self, setup: &DetectorSetup, fills: &mut CoincidenceFills) {
        for (matrix, pairs) in fills.pairs.iter_mut().enumerate() {
            pairs.extend(self.pairs(setup, matrix));
        }
    }
}

/// Processes `events` in order, numbering them from `first_index`.
///
/// # Errors
/// Stops at the first event that does not match the setup.
pub fn reconstruct(
    setup: &DetectorSetup,
    events: &[RawEvent],
    first_index: u64,
) -> Result<CoincidenceFills> {
    let mut state = EventState::new(setup);
    let mut fills = CoincidenceFills::new(setup);
    for (index, raw) in (first_index..).zip(events) {
        state.process(setup, raw, index)?;
        state.fill(setup, &mut fills);
    }
    debug!(
        "reconstructed {} events from index {first_index}: {} pairs",
        events.len(),
        fills.len()
    );
    Ok(fills)
}

/// Parallel version of [`reconstruct`].
///
/// Each rayon worker owns a private [`EventState`]; per-event fills are
/// merged in event order, so the output equals the sequential one.
///
/// # Errors
/// Fails if any event does not match the setup.
pub fn reconstruct_parallel(
    setup: &DetectorSetup,
    events: &[RawEvent],
    first_index: u64,
) -> Result<CoincidenceFills> {
    let per_event = events
        .par_iter()
        .enumerate()
        .map_init(
            || EventState::new(setup),
            |state, (offset, raw)| {
                let mut fills = CoincidenceFills::new(setup);
                state.process(setup, raw, first_index + offset as u64)?;
                state.fill(setup, &mut fills);
                Ok(fills)
            },
        )
        .collect::<Result<Vec<_>>>()?;

    let mut fills = CoincidenceFills::new(setup);
    for event in &per_event {
        fills.merge(event);
    }
    debug!(
        "reconstructed {} events from index {first_index} on {} threads: {} pairs",
        events.len(),
        rayon::current_num_threads(),
        fills.len()
    );
    Ok(fills)
}
