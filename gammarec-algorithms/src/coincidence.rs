//! Cross-detector coincidence evaluation.

use gammarec_core::{ChannelConfig, ChannelState, CoincidenceMatrix, DetectorSetup};
use std::iter;

/// A channel taking part in a coincidence, with its configuration.
#[derive(Clone, Copy)]
struct Participant<'a> {
    config: &'a ChannelConfig,
    state: &'a ChannelState,
}

impl Participant<'_> {
    fn energy(&self) -> f64 {
        self.state.energy
    }
}

/// Firing channels (energy > 0) of the given detectors.
fn participants<'a>(
    setup: &'a DetectorSetup,
    detectors: &'a [usize],
    channels: &'a [ChannelState],
) -> impl Iterator<Item = Participant<'a>> + Clone + 'a {
    detectors.iter().flat_map(move |&index| {
        let configs = setup.detectors()[index]
            .as_energy_sensitive()
            .map_or(&[][..], |d| d.channels.as_slice());
        let states = if configs.is_empty() {
            &[][..]
        } else {
            &channels[setup.channel_range(index)]
        };
        configs
            .iter()
            .zip(states)
            .map(|(config, state)| Participant { config, state })
            .filter(|p| p.energy() > 0.0)
    })
}

/// Returns true if the pair passes the RF gates of both channels and the
/// matrix time window. A zero time difference is an ordinary value here.
fn gate(matrix: &CoincidenceMatrix, a: Participant<'_>, b: Participant<'_>) -> bool {
    a.config.rf_gate_accepts(a.state)
        && b.config.rf_gate_accepts(b.state)
        && matrix
            .time_window
            .map_or(true, |w| w.contains(a.state.time - b.state.time))
}

/// Lazily yields the `(x, y)` energy pairs of `matrix` for one event.
///
/// `channels` are the flat calibrated states of the event. With
/// `symmetrize` every pair is followed by its swapped counterpart. A matrix
/// with empty `y_data` yields nothing.
pub fn coincidence_pairs<'a>(
    setup: &'a DetectorSetup,
    matrix: &'a CoincidenceMatrix,
    channels: &'a [ChannelState],
) -> impl Iterator<Item = (f64, f64)> + 'a {
    let ys = participants(setup, &matrix.y_data, channels);
    participants(setup, &matrix.x_data, channels)
        .flat_map(move |a| ys.clone().map(move |b| (a, b)))
        .filter(move |&(a, b)| gate(matrix, a, b))
        .flat_map(move |(a, b)| {
            let (x, y) = (a.energy(), b.energy());
            iter::once((x, y)).chain(matrix.symmetrize.then_some((y, x)))
        })
}

/// Pair observations per coincidence matrix, in event order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoincidenceFills {
    /// One list per matrix, in setup order.
    pub pairs: Vec<Vec<(f64, f64)>>,
}

impl CoincidenceFills {
    /// Empty fills for every matrix of `setup`.
    #[must_use]
    pub fn new(setup: &DetectorSetup) -> Self {
        Self {
            pairs: vec![Vec::new(); setup.matrices().len()],
        }
    }

    /// Appends `other`'s pairs matrix by matrix.
    pub fn merge(&mut self, other: &CoincidenceFills) {
        for (mine, theirs) in self.pairs.iter_mut().zip(&other.pairs) {
            mine.extend_from_slice(theirs);
        }
    }

    /// Total number of pairs over all matrices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.iter().map(Vec::len).sum()
    }

    /// Returns true if no matrix has any pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(Vec::is_empty)
    }
}
