use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dsp::stft;
use crate::dsp::window::WindowType;
use crate::error::StftError;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_FRAME_SIZE: usize = 2048;
pub const DEFAULT_HOP: usize = 512;
pub const DEFAULT_BPM_MIN: f64 = 60.0;
pub const DEFAULT_BPM_MAX: f64 = 200.0;

/// Contents of `spectempo.toml`. Every section and key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stft: StftConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Deserialize)]
pub struct StftConfig {
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_hop")]
    pub hop: usize,
    #[serde(default)]
    pub window: WindowType,
}

#[derive(Debug, Deserialize)]
pub struct TempoConfig {
    #[serde(default = "default_bpm_min")]
    pub bpm_min: f64,
    #[serde(default = "default_bpm_max")]
    pub bpm_max: f64,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Defaults to the available hardware parallelism when unset.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Floating-point width the pipeline runs in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F64,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            hop: default_hop(),
            window: WindowType::default(),
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm_min: default_bpm_min(),
            bpm_max: default_bpm_max(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: None,
            precision: Precision::default(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_frame_size() -> usize { DEFAULT_FRAME_SIZE }
fn default_hop() -> usize { DEFAULT_HOP }
fn default_bpm_min() -> f64 { DEFAULT_BPM_MIN }
fn default_bpm_max() -> f64 { DEFAULT_BPM_MAX }
fn default_output_dir() -> PathBuf { "results".into() }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Immutable parameters of one analysis run, shared read-only by every worker.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    /// Frame length `N`; must be a power of two.
    pub frame_size: usize,
    pub hop: usize,
    pub window: WindowType,
    pub bpm_min: f64,
    pub bpm_max: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            hop: DEFAULT_HOP,
            window: WindowType::default(),
            bpm_min: DEFAULT_BPM_MIN,
            bpm_max: DEFAULT_BPM_MAX,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), StftError> {
        if self.frame_size < 2 {
            return Err(StftError::FrameTooShort(self.frame_size));
        }
        if !self.frame_size.is_power_of_two() {
            return Err(StftError::NotPowerOfTwo(self.frame_size));
        }
        if self.hop == 0 {
            return Err(StftError::ZeroHop);
        }
        if self.sample_rate == 0 {
            return Err(StftError::InvalidSampleRate);
        }
        let bpm_ok = self.bpm_min.is_finite()
            && self.bpm_max.is_finite()
            && self.bpm_min > 0.0
            && self.bpm_max >= self.bpm_min;
        if !bpm_ok {
            return Err(StftError::InvalidBpmRange {
                min: self.bpm_min,
                max: self.bpm_max,
            });
        }
        Ok(())
    }

    pub fn n_bins(&self) -> usize {
        stft::bin_count(self.frame_size)
    }

    pub fn frame_count(&self, n_samples: usize) -> usize {
        stft::frame_count(n_samples, self.frame_size, self.hop)
    }

    /// Frames per second of any per-frame curve.
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.stft.frame_size, 2048);
        assert_eq!(cfg.stft.hop, 512);
        assert_eq!(cfg.stft.window, WindowType::Hann);
        assert_eq!(cfg.tempo.bpm_min, 60.0);
        assert_eq!(cfg.tempo.bpm_max, 200.0);
        assert_eq!(cfg.run.precision, Precision::F32);
        assert_eq!(cfg.run.output_dir, PathBuf::from("results"));
        assert!(cfg.run.workers.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let cfg: Config = toml::from_str(
            r#"
            [stft]
            frame_size = 1024
            hop = 256
            window = "hamming"

            [tempo]
            bpm_min = 60.0
            bpm_max = 180.0

            [run]
            workers = 3
            precision = "f64"
            output_dir = "out"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.stft.frame_size, 1024);
        assert_eq!(cfg.stft.window, WindowType::Hamming);
        assert_eq!(cfg.tempo.bpm_max, 180.0);
        assert_eq!(cfg.run.workers, Some(3));
        assert_eq!(cfg.run.precision, Precision::F64);
    }

    #[test]
    fn unknown_window_in_file_falls_back_to_rectangular() {
        let cfg: Config = toml::from_str(
            r#"
            [stft]
            window = "blackman"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.stft.window, WindowType::Rectangular);
        assert_eq!(cfg.stft.frame_size, 2048);

        let cfg: Config = toml::from_str("[stft]\nwindow = \"Hann\"").unwrap();
        assert_eq!(cfg.stft.window, WindowType::Hann);
    }

    #[test]
    fn default_analysis_config_is_valid() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.n_bins(), 1025);
        assert!((cfg.frame_rate() - 86.1328125).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_parameters() {
        let base = AnalysisConfig::default();

        let cfg = AnalysisConfig { frame_size: 1000, ..base.clone() };
        assert_eq!(cfg.validate(), Err(StftError::NotPowerOfTwo(1000)));

        let cfg = AnalysisConfig { frame_size: 1, ..base.clone() };
        assert_eq!(cfg.validate(), Err(StftError::FrameTooShort(1)));

        let cfg = AnalysisConfig { hop: 0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(StftError::ZeroHop));

        let cfg = AnalysisConfig { sample_rate: 0, ..base.clone() };
        assert_eq!(cfg.validate(), Err(StftError::InvalidSampleRate));

        let cfg = AnalysisConfig { bpm_min: 200.0, bpm_max: 60.0, ..base };
        assert!(matches!(cfg.validate(), Err(StftError::InvalidBpmRange { .. })));
    }
}
