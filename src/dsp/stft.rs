use indicatif::ProgressBar;
use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::fft;
#[cfg(test)]
use super::spectrogram::Spectrogram;
use super::window::{self, WindowType};
use super::Real;
use crate::config::AnalysisConfig;
use crate::dist::partition;
use crate::error::{try_zeroed, StftError};

/// `1 + (n_samples - N) / hop` full frames, or zero when the signal is shorter
/// than one frame.
pub fn frame_count(n_samples: usize, frame_size: usize, hop: usize) -> usize {
    if hop == 0 || n_samples < frame_size {
        return 0;
    }
    1 + (n_samples - frame_size) / hop
}

/// Non-redundant bins of a real-input transform of length `frame_size`.
pub fn bin_count(frame_size: usize) -> usize {
    frame_size / 2 + 1
}

/// Magnitude spectra of the frames one worker owns, ascending by frame index.
#[derive(Debug)]
pub struct LocalBlock<T> {
    pub rank: usize,
    pub n_frames: usize,
    pub n_bins: usize,
    data: Vec<T>,
}

impl<T> LocalBlock<T> {
    pub fn new(rank: usize, n_frames: usize, n_bins: usize, data: Vec<T>) -> Self {
        Self {
            rank,
            n_frames,
            n_bins,
            data,
        }
    }

    pub fn local_frames(&self) -> usize {
        if self.n_bins == 0 {
            0
        } else {
            self.data.len() / self.n_bins
        }
    }

    /// Hand the buffer over to the gather.
    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}

/// Per-thread buffers reused across frames.
struct FrameScratch<T> {
    samples: Vec<T>,
    spectrum: Vec<Complex<T>>,
}

impl<T: Real> FrameScratch<T> {
    fn new(frame_size: usize) -> Self {
        Self {
            samples: vec![T::zero(); frame_size],
            spectrum: vec![Complex::new(T::zero(), T::zero()); frame_size],
        }
    }
}

/// Window one frame, transform it and write `|X[k]|` for the first `out.len()` bins.
fn magnitude_spectrum<T: Real>(
    frame: &[T],
    kind: WindowType,
    scratch: &mut FrameScratch<T>,
    out: &mut [T],
) {
    scratch.samples.copy_from_slice(frame);
    window::apply(&mut scratch.samples, kind);

    for (c, &x) in scratch.spectrum.iter_mut().zip(scratch.samples.iter()) {
        *c = Complex::new(x, T::zero());
    }
    fft::forward(&mut scratch.spectrum);

    for (m, c) in out.iter_mut().zip(scratch.spectrum.iter()) {
        *m = (c.re * c.re + c.im * c.im).sqrt();
    }
}

/// Compute the STFT rows owned by `rank` under the cyclic plan.
pub fn compute_local_block<T: Real>(
    samples: &[T],
    cfg: &AnalysisConfig,
    rank: usize,
    worker_count: usize,
    progress: Option<&ProgressBar>,
) -> Result<LocalBlock<T>, StftError> {
    cfg.validate()?;

    let n_frames = cfg.frame_count(samples.len());
    let n_bins = cfg.n_bins();
    let frames: Vec<usize> = partition::owned_frames(rank, n_frames, worker_count).collect();
    let local_frames = frames.len();
    let mut data: Vec<T> = try_zeroed("local block", local_frames * n_bins)?;

    log::debug!(
        "rank {}: computing {} of {} frames ({} bins each)",
        rank,
        local_frames,
        n_frames,
        n_bins
    );

    data.par_chunks_mut(n_bins)
        .zip(frames.par_iter())
        .for_each_init(
            || FrameScratch::new(cfg.frame_size),
            |scratch, (row, &frame)| {
                let span = partition::frame_span(frame, cfg.frame_size, cfg.hop);
                magnitude_spectrum(&samples[span], cfg.window, scratch, row);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
            },
        );

    Ok(LocalBlock::new(rank, n_frames, n_bins, data))
}

/// Single-process STFT over every frame.
#[cfg(test)]
pub fn compute_sequential<T: Real>(
    samples: &[T],
    cfg: &AnalysisConfig,
) -> Result<Spectrogram<T>, StftError> {
    let block = compute_local_block(samples, cfg, 0, 1, None)?;
    let (n_frames, n_bins) = (block.n_frames, block.n_bins);
    Ok(Spectrogram::from_rows(block.into_inner(), n_frames, n_bins)
        .unwrap_or_else(|| Spectrogram::empty(n_bins)))
}
