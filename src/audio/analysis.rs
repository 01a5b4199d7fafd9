use rayon::prelude::*;

use super::features::{self, AnalysisResult};
use crate::config::AnalysisConfig;
use crate::dsp::spectrogram::Spectrogram;
use crate::dsp::Real;

/// Tempo picked from the autocorrelation of the onset curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub best_lag: usize,
}

impl TempoEstimate {
    pub const NONE: TempoEstimate = TempoEstimate {
        bpm: 0.0,
        best_lag: 0,
    };
}

/// Full estimation pass over a frame-ordered spectrogram.
pub fn analyze<T: Real>(spec: &Spectrogram<T>, samples: &[T], cfg: &AnalysisConfig) -> AnalysisResult<T> {
    let frame_rate = cfg.frame_rate();

    if spec.is_empty() {
        log::warn!("Signal shorter than one frame ({} samples), nothing to analyze", samples.len());
    }
    log::info!("Onset flux over {} frames...", spec.n_frames());
    let flux = spectral_flux(spec);

    log::info!("Autocorrelation...");
    let acf = autocorrelation(&flux);

    let tempo = estimate_tempo(&acf, frame_rate, cfg.bpm_min, cfg.bpm_max);
    if tempo.best_lag == 0 {
        log::warn!(
            "No tempo peak in [{:.0}, {:.0}] BPM",
            cfg.bpm_min,
            cfg.bpm_max
        );
    } else {
        log::info!(
            "Tempo: {:.2} BPM (lag {} frames at {:.2} frames/s)",
            tempo.bpm,
            tempo.best_lag,
            frame_rate
        );
    }

    AnalysisResult {
        bpm: tempo.bpm,
        best_lag: tempo.best_lag,
        frame_rate,
        rms: features::rms_curve(samples, cfg, spec.n_frames()),
        centroid_hz: features::centroid_curve(spec, cfg),
        rolloff_hz: features::rolloff_curve(spec, cfg),
        flux,
    }
}

/// Summed positive magnitude change against the previous frame.
pub fn spectral_flux<T: Real>(spec: &Spectrogram<T>) -> Vec<T> {
    let mut flux = vec![T::zero(); spec.n_frames()];
    for t in 1..spec.n_frames() {
        flux[t] = spec
            .row(t)
            .iter()
            .zip(spec.row(t - 1))
            .map(|(&cur, &prev)| (cur - prev).max(T::zero()))
            .sum();
    }
    flux
}

/// `acf[lag] = sum_t x[t] * x[t + lag]` for every lag in `0..x.len()`.
pub fn autocorrelation<T: Real>(signal: &[T]) -> Vec<T> {
    let n = signal.len();
    (0..n)
        .into_par_iter()
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(&a, &b)| a * b)
                .sum()
        })
        .collect()
}

/// Lag range `[min, max]` (frames) matching `[bpm_max, bpm_min]`, clamped to
/// the curve. `None` when the range is empty.
pub fn lag_window(bpm_min: f64, bpm_max: f64, frame_rate: f64, acf_len: usize) -> Option<(usize, usize)> {
    if acf_len == 0 || bpm_min <= 0.0 || bpm_max <= 0.0 || frame_rate <= 0.0 {
        return None;
    }
    let lag_max = ((60.0 / bpm_min) * frame_rate).floor() as usize;
    let lag_max = lag_max.min(acf_len - 1);
    // lag 0 is the signal energy, never a period
    let lag_min = (((60.0 / bpm_max) * frame_rate).ceil() as usize).max(1);
    (lag_min <= lag_max).then_some((lag_min, lag_max))
}

/// Highest autocorrelation peak inside the BPM range, first lag wins ties.
pub fn estimate_tempo<T: Real>(acf: &[T], frame_rate: f64, bpm_min: f64, bpm_max: f64) -> TempoEstimate {
    let Some((lag_min, lag_max)) = lag_window(bpm_min, bpm_max, frame_rate, acf.len()) else {
        return TempoEstimate::NONE;
    };

    let mut best_value = T::zero();
    let mut best_lag = 0;
    for (lag, &value) in acf.iter().enumerate().take(lag_max + 1).skip(lag_min) {
        if value > best_value {
            best_value = value;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return TempoEstimate::NONE;
    }
    let period_s = best_lag as f64 / frame_rate;
    TempoEstimate {
        bpm: 60.0 / period_s,
        best_lag,
    }
}
