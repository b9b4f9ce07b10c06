use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Result;
use colored::Colorize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::inspect::{self, FolderVerdict, ReadyFolder};
use crate::logger::FileLogger;
use crate::merge::{Ffmpeg, MergeJob, MergeOutcome, RemuxEngine};
use crate::stats::RunStats;
use crate::{print_error, print_warning};

/// Walks a directory tree bottom-up and merges every ready download folder.
pub struct DownloadMux<E: RemuxEngine = Ffmpeg> {
    config: Config,
    engine: E,
    logger: Option<RefCell<FileLogger>>,
}

impl DownloadMux<Ffmpeg> {
    /// Create a runner that uses ffmpeg and writes a log file.
    ///
    /// Fails if ffmpeg is not available, unless this is a dryrun.
    pub fn new(config: Config) -> Result<Self> {
        if !config.dryrun {
            Ffmpeg::check_available()?;
        }

        let logger = if config.dryrun {
            None
        } else {
            match FileLogger::new() {
                Ok(logger) => Some(RefCell::new(logger)),
                Err(error) => {
                    print_warning!("Continuing without log file: {error:#}");
                    None
                }
            }
        };

        Ok(Self {
            config,
            engine: Ffmpeg,
            logger,
        })
    }
}

impl<E: RemuxEngine> DownloadMux<E> {
    /// Create a runner with a custom remux engine and no log file.
    pub const fn with_engine(config: Config, engine: E) -> Self {
        Self {
            config,
            engine,
            logger: None,
        }
    }

    /// Process the whole tree and return the run statistics.
    pub fn run(&self) -> RunStats {
        self.run_until_aborted(&AtomicBool::new(false))
    }

    /// Process the whole tree, stopping before the next folder once `abort` is set.
    /// A merge that has already started always runs to completion.
    pub fn run_until_aborted(&self, abort: &AtomicBool) -> RunStats {
        let mut stats = RunStats::default();
        self.log(|logger| logger.log_init(&self.config));

        for folder in self.gather_folders() {
            if abort.load(Ordering::SeqCst) {
                stats.aborted = true;
                break;
            }
            if !folder.is_dir() {
                continue;
            }
            self.process_folder(&folder, &mut stats);
        }

        self.log(|logger| logger.log_stats(&stats));
        stats
    }

    /// Collect all directories under the root, children before their parent.
    ///
    /// The list is gathered up front so that removing merged folders does not
    /// interfere with the traversal.
    fn gather_folders(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.config.root)
            .min_depth(1)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    print_warning!("Failed to read directory entry: {error}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    /// Inspect a single folder and merge it if it is ready.
    fn process_folder(&self, folder: &Path, stats: &mut RunStats) {
        let verdict = inspect::inspect(folder, &self.config);
        let ready = match verdict {
            FolderVerdict::Ready(ready) => ready,
            skip => {
                self.report_skip(folder, &skip);
                stats.add_skip(&skip);
                return;
            }
        };

        let start = Instant::now();
        let outcome = self.merge_folder(folder, ready);
        let duration = start.elapsed();

        match &outcome {
            MergeOutcome::Merged { output, cleanup_error } => {
                println!(
                    "{}",
                    format!(
                        "✓ Merged in {}: {}\n",
                        crate::format_duration(duration),
                        self.display_path(output)
                    )
                    .green()
                );
                self.log(|logger| logger.log_success(folder, output, duration));
                if let Some(error) = cleanup_error {
                    print_warning!("{error}");
                    self.log(|logger| logger.log_warning(folder, error));
                }
            }
            MergeOutcome::DryRun { .. } => {}
            MergeOutcome::OutputExists { .. } => {
                if self.config.verbose {
                    println!("⊘ Skipped {}: {outcome}", self.display_path(folder));
                }
                self.log(|logger| logger.log_skip(folder, &outcome.to_string()));
            }
            MergeOutcome::Failed { error } => {
                print_error!("Failed to merge {}: {error}\n", self.display_path(folder));
                self.log(|logger| logger.log_failure(folder, error));
            }
        }

        stats.add_outcome(&outcome, duration);
    }

    /// Build and run the merge for a ready folder.
    fn merge_folder(&self, folder: &Path, ready: ReadyFolder) -> MergeOutcome {
        let job = match MergeJob::new(folder, ready, &self.config.output_extension) {
            Ok(job) => job,
            Err(error) => {
                return MergeOutcome::Failed {
                    error: format!("{error:#}"),
                };
            }
        };

        // Checked again right before running so nothing is printed for folders that were
        // merged already, and so that a file created in the meantime is not overwritten.
        if job.output_exists() {
            return MergeOutcome::OutputExists {
                path: job.output_path().to_path_buf(),
            };
        }

        println!(
            "{}",
            format!("Merging: {}", self.display_path(folder)).bold().magenta()
        );
        for track in job.subtitles() {
            println!("  -> Adding track: {}", track.label);
        }

        if self.config.dryrun {
            println!("{} {}\n", "[DRYRUN]".bold(), job.command_line());
            return MergeOutcome::DryRun {
                output: job.output_path().to_path_buf(),
            };
        }
        if self.config.verbose {
            println!("{}", job.command_line());
        }

        self.log(|logger| logger.log_start(&job));
        job.execute(&self.engine)
    }

    fn report_skip(&self, folder: &Path, verdict: &FolderVerdict) {
        match verdict {
            FolderVerdict::Ready(_) => {}
            FolderVerdict::SkipMulti { videos } => {
                print_warning!(
                    "Skipping folder with multiple videos: {} ({})",
                    self.display_path(folder),
                    videos.join(", ")
                );
                self.log(|logger| logger.log_skip(folder, &verdict.to_string()));
            }
            FolderVerdict::SkipDone | FolderVerdict::SkipEmpty => {
                if self.config.verbose {
                    println!("⊘ Skipped {}: {verdict}", self.display_path(folder));
                }
            }
        }
    }

    fn display_path(&self, path: &Path) -> String {
        crate::get_relative_path_or_filename(path, &self.config.root)
    }

    fn log(&self, write: impl FnOnce(&mut FileLogger)) {
        if let Some(logger) = &self.logger {
            write(&mut logger.borrow_mut());
        }
    }
}
