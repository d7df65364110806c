//! Per-step fragmentation log and run summary
//!
//! The log holds one page-weighted fragmentation score per line. The summary
//! is written as a flat JSON object next to the log
//! (`run.txt` -> `run_summary.txt`).

use crate::error::{PoolError, Result};
use crate::fragmentation::Measure;
use crate::pool::BlockPool;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Statistics over one recorded run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Moving average with a window of `ceil(steps / 10)`
    pub moving_avg: Vec<f64>,
    /// Wall time between `start_timer` and `stop_timer`, seconds
    pub duration: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub max: f64,
    pub min: f64,
    pub steps: usize,
    /// RFC 3339 timestamp of when the summary was computed
    pub recorded_at: String,
}

/// Appends the pool's fragmentation score to a log file once per step
#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    writer: BufWriter<File>,
    start: Option<Instant>,
    stop: Option<Instant>,
}

impl Recorder {
    /// Create the log file, truncating any previous contents
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        Ok(Recorder {
            path,
            writer: BufWriter::new(file),
            start: None,
            stop: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start_timer(&mut self) {
        self.start = Some(Instant::now());
        self.stop = None;
    }

    pub fn stop_timer(&mut self) {
        self.stop = Some(Instant::now());
    }

    /// Append the current page-weighted fragmentation score
    pub fn record(&mut self, pool: &BlockPool) -> Result<()> {
        writeln!(self.writer, "{}", pool.fragmented(Measure::Pages))?;
        Ok(())
    }

    /// Read the log back and compute the run statistics
    pub fn summarize(&mut self) -> Result<Summary> {
        self.writer.flush()?;
        let data = read_scores(&self.path)?;
        if data.is_empty() {
            return Err(PoolError::EmptyRecording);
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let duration = match (self.start, self.stop) {
            (Some(start), Some(stop)) => {
                (stop.duration_since(start).as_secs_f64() * 10_000.0).round() / 10_000.0
            }
            _ => 0.0,
        };

        Ok(Summary {
            moving_avg: moving_average(&data, default_window(data.len())),
            duration,
            mean,
            std: variance.sqrt(),
            max: data.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: data.iter().copied().fold(f64::INFINITY, f64::min),
            steps: data.len(),
            recorded_at: Utc::now().to_rfc3339(),
        })
    }

    /// Summarize and write the summary JSON next to the log
    ///
    /// Returns the path of the summary file.
    pub fn write_summary(&mut self) -> Result<PathBuf> {
        let summary = self.summarize()?;
        let path = summary_path(&self.path);

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, &summary)?;
        writer.flush()?;
        tracing::info!("Wrote summary to {:?}", path);

        Ok(path)
    }

    /// Truncate the log
    pub fn clear(&mut self) -> Result<()> {
        // Pending lines must land before the truncation, not after it
        self.writer.flush()?;
        self.writer = BufWriter::new(File::create(&self.path)?);
        Ok(())
    }
}

/// Path of the summary for a log: `<stem>_summary.<ext>`
pub fn summary_path(log: &Path) -> PathBuf {
    let stem = log
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");
    let ext = log.extension().and_then(|s| s.to_str()).unwrap_or("json");
    log.with_file_name(format!("{}_summary.{}", stem, ext))
}

fn read_scores(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim().parse::<f64>().map_err(|e| {
                PoolError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad score '{}': {}", line, e),
                ))
            })
        })
        .collect()
}

/// Window used by the summary: a tenth of the run, rounded up
pub fn default_window(len: usize) -> usize {
    ((len + 9) / 10).max(1)
}

/// Averages over every full window ("valid" mode, `len - window + 1` values)
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > data.len() {
        return Vec::new();
    }
    data.windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}
