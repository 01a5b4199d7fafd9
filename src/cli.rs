use clap::Parser;
use std::path::PathBuf;

use crate::config::Precision;

#[derive(Parser, Debug)]
#[command(name = "spectempo", about = "Distributed STFT tempo and onset-strength analyzer")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Config file (default: ./spectempo.toml, then ~/.config/spectempo/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for the CSV artifacts
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of workers sharing the STFT (default: available cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Frame length N in samples, power of two
    #[arg(long)]
    pub frame_size: Option<usize>,

    /// Hop between frames in samples
    #[arg(long)]
    pub hop: Option<usize>,

    /// Analysis window: rectangular, hann, hamming
    #[arg(long)]
    pub window: Option<String>,

    /// Lower bound of the tempo search
    #[arg(long)]
    pub bpm_min: Option<f64>,

    /// Upper bound of the tempo search
    #[arg(long)]
    pub bpm_max: Option<f64>,

    /// Floating-point precision of the pipeline
    #[arg(long, value_enum)]
    pub precision: Option<Precision>,

    /// Skip writing spectrogram.csv
    #[arg(long)]
    pub no_spectrogram: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_invocation() {
        let cli = Cli::try_parse_from(["spectempo", "song.wav"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("song.wav"));
        assert!(cli.workers.is_none());
        assert!(cli.precision.is_none());
        assert!(!cli.no_spectrogram);
    }

    #[test]
    fn all_overrides() {
        let cli = Cli::try_parse_from([
            "spectempo",
            "song.flac",
            "-w",
            "4",
            "-o",
            "out",
            "--frame-size",
            "1024",
            "--hop",
            "256",
            "--window",
            "hamming",
            "--bpm-min",
            "70",
            "--bpm-max",
            "180",
            "--precision",
            "f64",
            "--no-spectrogram",
        ])
        .unwrap();
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.frame_size, Some(1024));
        assert_eq!(cli.hop, Some(256));
        assert_eq!(cli.window.as_deref(), Some("hamming"));
        assert_eq!(cli.bpm_min, Some(70.0));
        assert_eq!(cli.bpm_max, Some(180.0));
        assert_eq!(cli.precision, Some(Precision::F64));
        assert!(cli.no_spectrogram);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["spectempo"]).is_err());
    }
}
