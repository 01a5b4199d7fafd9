use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::audio::features::AnalysisResult;
use crate::dsp::spectrogram::Spectrogram;
use crate::dsp::Real;

pub const SPECTROGRAM_FILE: &str = "spectrogram.csv";
pub const ANALYSIS_FILE: &str = "analysis_results.csv";
pub const ANALYSIS_HEADER: &str = "time_s,flux,rms,centroid_hz,rolloff_hz,bpm";

/// One row per frame, bins comma-separated, no header.
pub fn write_spectrogram<W: Write, T: Real>(out: &mut W, spec: &Spectrogram<T>) -> Result<()> {
    for row in spec.rows() {
        for (k, mag) in row.iter().enumerate() {
            if k > 0 {
                out.write_all(b",")?;
            }
            write!(out, "{:.6}", mag)?;
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Per-frame curves plus the run's BPM repeated on every row.
pub fn write_analysis<W: Write, T: Real>(out: &mut W, result: &AnalysisResult<T>) -> Result<()> {
    writeln!(out, "{}", ANALYSIS_HEADER)?;
    for t in 0..result.n_frames() {
        writeln!(
            out,
            "{:.6},{:.6},{:.6},{:.2},{:.2},{:.2}",
            result.time_of(t),
            result.flux[t],
            result.rms[t],
            result.centroid_hz[t],
            result.rolloff_hz[t],
            result.bpm
        )?;
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write the run's artifacts into `dir`, creating it if needed.
/// Returns the paths written.
pub fn export_run<T: Real>(
    dir: &Path,
    spec: &Spectrogram<T>,
    result: &AnalysisResult<T>,
    include_spectrogram: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let mut written = Vec::new();

    if include_spectrogram {
        let path = dir.join(SPECTROGRAM_FILE);
        let mut out = create(&path)?;
        write_spectrogram(&mut out, spec)
            .and_then(|_| out.flush().map_err(Into::into))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!(
            "Spectrogram written: {} ({} frames x {} bins)",
            path.display(),
            spec.n_frames(),
            spec.n_bins()
        );
        written.push(path);
    }

    let path = dir.join(ANALYSIS_FILE);
    let mut out = create(&path)?;
    write_analysis(&mut out, result)
        .and_then(|_| out.flush().map_err(Into::into))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Analysis results written: {}", path.display());
    written.push(path);

    Ok(written)
}
