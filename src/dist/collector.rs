use rayon::prelude::*;

use super::collective::Communicator;
use super::partition;
use crate::dsp::spectrogram::Spectrogram;
use crate::dsp::stft::LocalBlock;
use crate::dsp::Real;
use crate::error::{try_zeroed, CollectiveError, StftError};

/// Receive counts and displacements of a cyclic gather, in elements.
///
/// Derived from `(n_frames, n_bins, worker_count)` alone, so every rank
/// computes the same layout without exchanging counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatherLayout {
    pub n_frames: usize,
    pub n_bins: usize,
    pub counts: Vec<usize>,
    pub displs: Vec<usize>,
}

impl GatherLayout {
    pub fn cyclic(n_frames: usize, n_bins: usize, worker_count: usize) -> Self {
        let counts: Vec<usize> = partition::all_counts(n_frames, worker_count)
            .into_iter()
            .map(|frames| frames * n_bins)
            .collect();
        let displs = counts
            .iter()
            .scan(0usize, |offset, &count| {
                let at = *offset;
                *offset += count;
                Some(at)
            })
            .collect();
        Self {
            n_frames,
            n_bins,
            counts,
            displs,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Turn the rank-grouped gather buffer into frame order.
///
/// Frame `i` lives in rank `i mod P`'s block at position `i div P`.
pub fn reorder_cyclic<T: Real>(gathered: &[T], layout: &GatherLayout) -> Result<Vec<T>, CollectiveError> {
    if gathered.len() != layout.total() {
        return Err(CollectiveError::GatherLength {
            expected: layout.total(),
            actual: gathered.len(),
        });
    }
    let n_bins = layout.n_bins;
    let workers = layout.worker_count();
    let mut global: Vec<T> = try_zeroed("global spectrogram", layout.n_frames * n_bins)?;
    if n_bins == 0 || workers == 0 {
        return Ok(global);
    }

    global
        .par_chunks_mut(n_bins)
        .enumerate()
        .for_each(|(frame, row)| {
            let node = partition::owner_of(frame, workers);
            let round = partition::round_of(frame, workers);
            let src = layout.displs[node] + round * n_bins;
            row.copy_from_slice(&gathered[src..src + n_bins]);
        });

    Ok(global)
}

/// Collective: gather every rank's block and rebuild the frame-ordered
/// spectrogram on the coordinator. Other ranks get `None`.
pub fn gather_spectrogram<T, C>(
    comm: &C,
    block: Result<LocalBlock<T>, StftError>,
    n_frames: usize,
    n_bins: usize,
) -> Result<Option<Spectrogram<T>>, CollectiveError>
where
    T: Real,
    C: Communicator<T> + ?Sized,
{
    let layout = GatherLayout::cyclic(n_frames, n_bins, comm.size());
    let gathered = comm.gather(block.map(LocalBlock::into_inner), &layout)?;

    let Some(gathered) = gathered else {
        return Ok(None);
    };
    let global = reorder_cyclic(&gathered, &layout)?;
    drop(gathered);

    Ok(Spectrogram::from_rows(global, n_frames, n_bins))
}
