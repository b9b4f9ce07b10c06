use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::Config;
use crate::merge::MergeJob;
use crate::stats::RunStats;

/// Simple file logger for merge operations with buffered writes
pub struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    /// Create a new file logger, writing to ~/logs/download-mux/download_mux_<timestamp>.log
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::in_directory(&home_dir.join("logs").join(env!("CARGO_PKG_NAME")))
    }

    /// Create a new file logger in the given directory.
    pub fn in_directory(log_dir: &Path) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let log_path = Self::log_path(log_dir);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn log_path(log_dir: &Path) -> PathBuf {
        log_dir.join(format!(
            "download_mux_{}.log",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ))
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log when starting the program
    pub(crate) fn log_init(&mut self, config: &Config) {
        let _ = writeln!(
            self.writer,
            "[{}] INIT \"{}\"",
            Self::timestamp(),
            config.root.display()
        );
        let _ = writeln!(self.writer, "  output_extension: {}", config.output_extension);
        let _ = writeln!(self.writer, "  video_extensions: {:?}", config.video_extensions);
        let _ = writeln!(self.writer, "  dryrun: {}", config.dryrun);
        let _ = writeln!(self.writer, "  verbose: {}", config.verbose);
        let _ = self.writer.flush();
    }

    /// Log when starting a merge
    pub(crate) fn log_start(&mut self, job: &MergeJob) {
        let tracks: Vec<&str> = job.subtitles().iter().map(|track| track.label.title).collect();
        let _ = writeln!(
            self.writer,
            "[{}] START   \"{}\" | Subtitles: {}",
            Self::timestamp(),
            job.folder().display(),
            if tracks.is_empty() {
                "none".to_string()
            } else {
                tracks.join(", ")
            }
        );
        let _ = self.writer.flush();
    }

    /// Log when a merge finishes successfully
    pub(crate) fn log_success(&mut self, folder: &Path, output: &Path, duration: Duration) {
        let _ = writeln!(
            self.writer,
            "[{}] SUCCESS \"{}\" -> \"{}\" | Time: {}",
            Self::timestamp(),
            folder.display(),
            output.display(),
            crate::format_duration(duration)
        );
        let _ = self.writer.flush();
    }

    /// Log a folder that was skipped
    pub(crate) fn log_skip(&mut self, folder: &Path, reason: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] SKIP    \"{}\" | {}",
            Self::timestamp(),
            folder.display(),
            reason
        );
        let _ = self.writer.flush();
    }

    /// Log a non-fatal problem
    pub(crate) fn log_warning(&mut self, folder: &Path, message: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] WARNING \"{}\" | {}",
            Self::timestamp(),
            folder.display(),
            message
        );
        let _ = self.writer.flush();
    }

    /// Log when a merge fails
    pub(crate) fn log_failure(&mut self, folder: &Path, error: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] ERROR   \"{}\" | {}",
            Self::timestamp(),
            folder.display(),
            error
        );
        let _ = self.writer.flush();
    }

    /// Log final statistics
    pub(crate) fn log_stats(&mut self, stats: &RunStats) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Folders merged:  {}", stats.folders_merged);
        let _ = writeln!(self.writer, "  Folders failed:  {}", stats.folders_failed);
        let _ = writeln!(self.writer, "  Folders skipped: {}", stats.total_skipped());
        if stats.total_skipped() > 0 {
            let _ = writeln!(self.writer, "    - Already organized: {}", stats.skipped_done);
            let _ = writeln!(self.writer, "    - Multiple videos:   {}", stats.skipped_multi);
            let _ = writeln!(self.writer, "    - No video:          {}", stats.skipped_empty);
            let _ = writeln!(self.writer, "    - Output exists:     {}", stats.skipped_existing);
        }
        if stats.cleanup_warnings > 0 {
            let _ = writeln!(self.writer, "  Folders not removed: {}", stats.cleanup_warnings);
        }
        if stats.aborted {
            let _ = writeln!(self.writer, "  Aborted by user");
        }
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            crate::format_duration(stats.total_duration)
        );
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}
