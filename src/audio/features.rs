use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::dist::partition;
use crate::dsp::spectrogram::Spectrogram;
use crate::dsp::Real;

/// Fraction of spectral energy below the rolloff frequency.
pub const ROLLOFF_FRACTION: f64 = 0.85;

/// Output of the coordinator's estimation pass, one entry per frame.
#[derive(Clone, Debug)]
pub struct AnalysisResult<T> {
    /// Estimated tempo, `0.0` when no peak was found.
    pub bpm: f64,
    /// Autocorrelation lag (frames) the tempo came from, `0` with no peak.
    pub best_lag: usize,
    /// Frames per second of every curve below.
    pub frame_rate: f64,
    /// Half-wave rectified spectral flux; `flux[0] == 0`.
    pub flux: Vec<T>,
    /// RMS of the raw frame samples.
    pub rms: Vec<T>,
    pub centroid_hz: Vec<T>,
    pub rolloff_hz: Vec<T>,
}

impl<T: Real> AnalysisResult<T> {
    pub fn n_frames(&self) -> usize {
        self.flux.len()
    }

    /// Start time of `frame` in seconds.
    pub fn time_of(&self, frame: usize) -> f64 {
        frame as f64 / self.frame_rate
    }

    pub fn found_tempo(&self) -> bool {
        self.best_lag != 0
    }
}

/// Centre frequency of `bin` in Hz.
fn bin_hz(bin: usize, cfg: &AnalysisConfig) -> f64 {
    bin as f64 * cfg.sample_rate as f64 / cfg.frame_size as f64
}

/// RMS of each frame's unwindowed samples.
pub fn rms_curve<T: Real>(samples: &[T], cfg: &AnalysisConfig, n_frames: usize) -> Vec<T> {
    (0..n_frames)
        .into_par_iter()
        .map(|frame| {
            let span = partition::frame_span(frame, cfg.frame_size, cfg.hop);
            let chunk = &samples[span];
            let energy: T = chunk.iter().map(|&s| s * s).sum();
            (energy / T::lit(chunk.len() as f64)).sqrt()
        })
        .collect()
}

/// Magnitude-weighted mean frequency per frame.
pub fn centroid_curve<T: Real>(spec: &Spectrogram<T>, cfg: &AnalysisConfig) -> Vec<T> {
    spec.rows()
        .map(|row| {
            let total: T = row.iter().copied().sum();
            if total.as_f64() <= 1e-10 {
                return T::zero();
            }
            let weighted: T = row
                .iter()
                .enumerate()
                .map(|(k, &mag)| T::lit(bin_hz(k, cfg)) * mag)
                .sum();
            weighted / total
        })
        .collect()
}

/// Lowest frequency below which `ROLLOFF_FRACTION` of the frame energy lies.
pub fn rolloff_curve<T: Real>(spec: &Spectrogram<T>, cfg: &AnalysisConfig) -> Vec<T> {
    spec.rows()
        .map(|row| {
            let total: f64 = row.iter().map(|&m| (m * m).as_f64()).sum();
            if total <= 1e-20 {
                return T::zero();
            }
            let threshold = ROLLOFF_FRACTION * total;
            let mut cumulative = 0.0;
            for (k, &m) in row.iter().enumerate() {
                cumulative += (m * m).as_f64();
                if cumulative >= threshold {
                    return T::lit(bin_hz(k, cfg));
                }
            }
            T::lit(bin_hz(row.len() - 1, cfg))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AnalysisConfig {
        AnalysisConfig {
            sample_rate: 8000,
            frame_size: 8,
            hop: 4,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn rms_of_constant_frames() {
        let samples = vec![0.5f64; 16];
        let rms = rms_curve(&samples, &cfg(), 3);
        assert_eq!(rms.len(), 3);
        for v in rms {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn rms_uses_each_frame_span() {
        let mut samples = vec![0.0f32; 12];
        samples[8..12].iter_mut().for_each(|s| *s = 1.0);
        let rms = rms_curve(&samples, &cfg(), 2);
        assert!(rms[0].abs() < 1e-6);
        assert!((rms[1] - 0.5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn centroid_of_single_bin() {
        // bin 2 at 8 kHz / 8 points = 2000 Hz
        let spec = Spectrogram::from_rows(vec![0.0f64, 0.0, 3.0, 0.0, 0.0], 1, 5).unwrap();
        let c = centroid_curve(&spec, &cfg());
        assert!((c[0] - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn silent_frame_has_zero_centroid_and_rolloff() {
        let spec = Spectrogram::from_rows(vec![0.0f32; 5], 1, 5).unwrap();
        assert_eq!(centroid_curve(&spec, &cfg()), vec![0.0]);
        assert_eq!(rolloff_curve(&spec, &cfg()), vec![0.0]);
    }

    #[test]
    fn rolloff_finds_energy_edge() {
        // energies 1, 1, 16, 1, 1 -> 85% of 20 reached at bin 2
        let spec = Spectrogram::from_rows(vec![1.0f64, 1.0, 4.0, 1.0, 1.0], 1, 5).unwrap();
        let r = rolloff_curve(&spec, &cfg());
        assert!((r[0] - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn result_time_axis() {
        let result = AnalysisResult::<f32> {
            bpm: 0.0,
            best_lag: 0,
            frame_rate: 50.0,
            flux: vec![0.0; 3],
            rms: vec![0.0; 3],
            centroid_hz: vec![0.0; 3],
            rolloff_hz: vec![0.0; 3],
        };
        assert_eq!(result.n_frames(), 3);
        assert!((result.time_of(2) - 0.04).abs() < 1e-12);
        assert!(!result.found_tempo());
    }
}
