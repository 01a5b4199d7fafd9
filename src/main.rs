mod audio;
mod cli;
mod config;
mod dist;
mod dsp;
mod error;
mod export;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use audio::decode::DecodedAudio;
use cli::Cli;
use config::{AnalysisConfig, Config, Precision};
use dsp::window::WindowType;
use dsp::Real;

/// Run parameters after merging defaults, config file and command line.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    frame_size: usize,
    hop: usize,
    window: WindowType,
    bpm_min: f64,
    bpm_max: f64,
    workers: usize,
    precision: Precision,
    output_dir: PathBuf,
    write_spectrogram: bool,
}

impl Settings {
    /// Command-line values win over the config file.
    fn resolve(cli: &Cli, file: Config) -> Self {
        let workers = cli
            .workers
            .or(file.run.workers)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
        Self {
            frame_size: cli.frame_size.unwrap_or(file.stft.frame_size),
            hop: cli.hop.unwrap_or(file.stft.hop),
            window: cli
                .window
                .as_deref()
                .map_or(file.stft.window, WindowType::from_name),
            bpm_min: cli.bpm_min.unwrap_or(file.tempo.bpm_min),
            bpm_max: cli.bpm_max.unwrap_or(file.tempo.bpm_max),
            workers: workers.max(1),
            precision: cli.precision.unwrap_or(file.run.precision),
            output_dir: cli.output_dir.clone().unwrap_or(file.run.output_dir),
            write_spectrogram: !cli.no_spectrogram,
        }
    }

    fn analysis_config(&self, sample_rate: u32) -> AnalysisConfig {
        AnalysisConfig {
            sample_rate,
            frame_size: self.frame_size,
            hop: self.hop,
            window: self.window,
            bpm_min: self.bpm_min,
            bpm_max: self.bpm_max,
        }
    }
}

/// Explicit `--config`, else `./spectempo.toml`, else the user config dirs.
fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("spectempo.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("spectempo").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectempo").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let file_config = match find_config_path(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Ignoring config {}: {:#}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    let settings = Settings::resolve(&cli, file_config);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("spectempo - distributed STFT tempo analysis");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output directory: {}", settings.output_dir.display());
    log::info!(
        "Workers: {}, precision: {:?}, BPM range: [{}, {}]",
        settings.workers,
        settings.precision,
        settings.bpm_min,
        settings.bpm_max
    );

    log::info!("Decoding audio...");
    let audio = audio::decode::decode_file(&cli.input)?;
    let cfg = settings.analysis_config(audio.sample_rate);

    match settings.precision {
        Precision::F32 => analyze_and_export::<f32>(&audio, &cfg, &settings),
        Precision::F64 => analyze_and_export::<f64>(&audio, &cfg, &settings),
    }
}

fn analyze_and_export<T: Real>(audio: &DecodedAudio, cfg: &AnalysisConfig, settings: &Settings) -> Result<()> {
    let report = pipeline::run(audio.samples_as::<T>(), cfg, settings.workers, true)?;

    log::info!("Writing results...");
    export::csv::export_run(
        &settings.output_dir,
        &report.spectrogram,
        &report.analysis,
        settings.write_spectrogram,
    )?;

    if report.analysis.found_tempo() {
        println!("Estimated tempo: {:.2} BPM", report.analysis.bpm);
    } else {
        println!(
            "No tempo found in [{}, {}] BPM (bpm = 0.00)",
            cfg.bpm_min, cfg.bpm_max
        );
    }
    log::info!("Done! Output: {}", settings.output_dir.display());
    Ok(())
}
