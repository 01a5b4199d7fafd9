//! One analysis run across a fixed group of worker threads.
//!
//! Every rank executes [`run_rank`]: receive the broadcast samples, compute
//! its cyclic share of the STFT, join the gather. Only the coordinator gets
//! the frame-ordered spectrogram back and runs the tempo estimator on it.

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::thread;

use crate::audio::analysis;
use crate::audio::features::AnalysisResult;
use crate::config::AnalysisConfig;
use crate::dist::collective::{Communicator, ThreadCommunicator};
use crate::dist::collector;
use crate::dsp::spectrogram::Spectrogram;
use crate::dsp::stft;
use crate::dsp::Real;

/// Everything the coordinator holds at the end of a run.
pub struct RunReport<T> {
    pub spectrogram: Spectrogram<T>,
    pub analysis: AnalysisResult<T>,
}

/// Body shared by all ranks. Returns `Some` on the coordinator only.
pub fn run_rank<T, C>(
    comm: &C,
    cfg: &AnalysisConfig,
    root_samples: Option<Arc<[T]>>,
    progress: Option<&ProgressBar>,
) -> Result<Option<RunReport<T>>>
where
    T: Real,
    C: Communicator<T> + ?Sized,
{
    let rank = comm.rank();
    let samples = comm
        .broadcast(root_samples)
        .with_context(|| format!("rank {}: sample broadcast failed", rank))?;

    let n_frames = cfg.frame_count(samples.len());
    let n_bins = cfg.n_bins();

    let block = stft::compute_local_block(&samples, cfg, rank, comm.size(), progress);
    match &block {
        Ok(b) => log::debug!("rank {}: local block ready ({} frames)", b.rank, b.local_frames()),
        Err(e) if e.is_bad_parameters() => log::error!("rank {}: bad STFT parameters: {}", rank, e),
        Err(e) => log::error!("rank {}: local STFT failed: {}", rank, e),
    }

    let gathered = collector::gather_spectrogram(comm, block, n_frames, n_bins)
        .with_context(|| format!("rank {}: spectrogram gather failed", rank))?;
    debug_assert_eq!(gathered.is_some(), comm.is_coordinator());

    let Some(spectrogram) = gathered else {
        return Ok(None);
    };
    log::info!(
        "Global spectrogram assembled: {} frames x {} bins",
        spectrogram.n_frames(),
        spectrogram.n_bins()
    );

    let analysis = analysis::analyze(&spectrogram, &samples, cfg);
    Ok(Some(RunReport {
        spectrogram,
        analysis,
    }))
}

fn frame_progress(n_frames: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(n_frames as u64);
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
    {
        Ok(style) => pb.set_style(style.progress_chars("=>-")),
        Err(e) => log::debug!("Progress template rejected: {}", e),
    }
    pb
}

/// Run the whole pipeline with `worker_count` ranks on scoped threads.
///
/// Any failure on any rank fails the run; there is no partial result.
pub fn run<T: Real>(
    samples: Vec<T>,
    cfg: &AnalysisConfig,
    worker_count: usize,
    show_progress: bool,
) -> Result<RunReport<T>> {
    cfg.validate().context("Invalid analysis parameters")?;
    let worker_count = worker_count.max(1);

    let n_frames = cfg.frame_count(samples.len());
    log::info!(
        "STFT: {} frames (N={}, hop={}, window={}) across {} worker(s)",
        n_frames,
        cfg.frame_size,
        cfg.hop,
        cfg.window.name(),
        worker_count
    );

    let pb = frame_progress(n_frames, show_progress);
    let samples: Arc<[T]> = samples.into();
    let mut group = ThreadCommunicator::<T>::group(worker_count);
    let coordinator = group.remove(0);

    let report = thread::scope(|s| {
        let pb = &pb;
        let handles: Vec<_> = group
            .into_iter()
            .map(|comm| s.spawn(move || run_rank(&comm, cfg, None, Some(pb)).map(|_| ())))
            .collect();

        let report = run_rank(&coordinator, cfg, Some(samples), Some(pb));
        // release the coordinator's channels so no worker waits on a dead peer
        drop(coordinator);

        let mut worker_failure = None;
        for (i, handle) in handles.into_iter().enumerate() {
            let rank = i + 1;
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(anyhow!("rank {} panicked", rank)));
            if let Err(e) = outcome {
                log::debug!("rank {} finished with error: {:#}", rank, e);
                worker_failure.get_or_insert(e);
            }
        }

        let report = report?;
        if let Some(e) = worker_failure {
            return Err(e);
        }
        report.context("Coordinator finished without a spectrogram")
    });

    pb.finish_and_clear();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::window::WindowType;

    fn click_track(sample_rate: u32, seconds: f64, beat_interval: usize, offset: usize) -> Vec<f64> {
        let len = (sample_rate as f64 * seconds) as usize;
        let mut samples = vec![0.0; len];
        let mut beat = offset;
        while beat < len {
            for i in 0..120.min(len - beat) {
                let t = i as f64 / sample_rate as f64;
                samples[beat + i] =
                    (2.0 * std::f64::consts::PI * 1000.0 * t).sin() * (-(i as f64) / 30.0).exp();
            }
            beat += beat_interval;
        }
        samples
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            sample_rate: 8000,
            frame_size: 256,
            hop: 80,
            window: WindowType::Hann,
            bpm_min: 60.0,
            bpm_max: 200.0,
        }
    }

    #[test]
    fn worker_count_does_not_change_the_spectrogram() {
        let cfg = test_config();
        let samples = click_track(cfg.sample_rate, 3.0, 4000, 700);
        let reference = stft::compute_sequential(&samples, &cfg).unwrap();

        let single = run(samples.clone(), &cfg, 1, false).unwrap();
        let quad = run(samples.clone(), &cfg, 4, false).unwrap();
        assert_eq!(single.spectrogram.n_frames(), reference.n_frames());
        assert_eq!(quad.spectrogram.n_frames(), reference.n_frames());

        for frame in 0..reference.n_frames() {
            for (a, b) in quad.spectrogram.row(frame).iter().zip(single.spectrogram.row(frame)) {
                assert!((a - b).abs() <= 1e-12 * (1.0 + b.abs()), "frame {}", frame);
            }
            assert_eq!(single.spectrogram.row(frame), reference.row(frame));
        }
        assert_eq!(single.analysis.bpm, quad.analysis.bpm);
    }

    #[test]
    fn odd_worker_counts_match_sequential_in_single_precision() {
        let cfg = test_config();
        let samples: Vec<f32> = click_track(cfg.sample_rate, 2.0, 3000, 0)
            .into_iter()
            .map(|s| s as f32)
            .collect();
        let reference = stft::compute_sequential(&samples, &cfg).unwrap();
        for workers in [3, 7] {
            let report = run(samples.clone(), &cfg, workers, false).unwrap();
            assert_eq!(report.spectrogram, reference, "workers={}", workers);
        }
    }

    #[test]
    fn recovers_click_track_tempo() {
        // 4000 samples per beat at 8 kHz = 120 BPM; hop 80 gives 100 frames/s
        let cfg = test_config();
        let samples = click_track(cfg.sample_rate, 10.0, 4000, 1000);
        let report = run(samples, &cfg, 4, false).unwrap();
        assert_eq!(report.analysis.best_lag, 50);
        assert!((report.analysis.bpm - 120.0).abs() < 1e-6);
        assert_eq!(report.analysis.flux[0], 0.0);
        assert!(report.analysis.flux.iter().all(|&f| f >= 0.0));
    }

    #[test]
    fn short_input_yields_empty_result() {
        let cfg = test_config();
        let report = run(vec![0.2f32; 100], &cfg, 3, false).unwrap();
        assert!(report.spectrogram.is_empty());
        assert_eq!(report.analysis.n_frames(), 0);
        assert_eq!(report.analysis.bpm, 0.0);
    }

    #[test]
    fn more_workers_than_frames() {
        let cfg = test_config();
        let samples = click_track(cfg.sample_rate, 0.05, 4000, 0);
        let reference = stft::compute_sequential(&samples, &cfg).unwrap();
        assert!(reference.n_frames() < 8);
        let report = run(samples, &cfg, 8, false).unwrap();
        assert_eq!(report.spectrogram, reference);
    }

    #[test]
    fn invalid_parameters_fail_before_spawning() {
        let cfg = AnalysisConfig {
            frame_size: 1000,
            ..test_config()
        };
        let err = run(vec![0.0f32; 4000], &cfg, 4, false).err().unwrap();
        assert!(format!("{:#}", err).contains("not a power of two"));
    }
}
