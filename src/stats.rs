use std::time::Duration;

use colored::Colorize;

use crate::inspect::FolderVerdict;
use crate::merge::MergeOutcome;

/// Statistics for a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub(crate) folders_merged: usize,
    pub(crate) folders_failed: usize,
    pub(crate) folders_dryrun: usize,
    pub(crate) skipped_done: usize,
    pub(crate) skipped_multi: usize,
    pub(crate) skipped_empty: usize,
    pub(crate) skipped_existing: usize,
    pub(crate) cleanup_warnings: usize,
    pub(crate) aborted: bool,
    pub(crate) total_duration: Duration,
}

impl RunStats {
    /// Record a folder that was not merged because of its contents.
    pub(crate) const fn add_skip(&mut self, verdict: &FolderVerdict) {
        match verdict {
            FolderVerdict::Ready(_) => {}
            FolderVerdict::SkipDone => self.skipped_done += 1,
            FolderVerdict::SkipMulti { .. } => self.skipped_multi += 1,
            FolderVerdict::SkipEmpty => self.skipped_empty += 1,
        }
    }

    pub(crate) fn add_outcome(&mut self, outcome: &MergeOutcome, duration: Duration) {
        self.total_duration += duration;
        match outcome {
            MergeOutcome::Merged { cleanup_error, .. } => {
                self.folders_merged += 1;
                if cleanup_error.is_some() {
                    self.cleanup_warnings += 1;
                }
            }
            MergeOutcome::DryRun { .. } => self.folders_dryrun += 1,
            MergeOutcome::OutputExists { .. } => self.skipped_existing += 1,
            MergeOutcome::Failed { .. } => self.folders_failed += 1,
        }
    }

    /// Number of folders merged into a new output file.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.folders_merged
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.folders_failed
    }

    #[must_use]
    pub const fn total_skipped(&self) -> usize {
        self.skipped_done + self.skipped_multi + self.skipped_empty + self.skipped_existing
    }

    #[must_use]
    pub const fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn print_summary(&self) {
        println!("{}", "\n--- Merge Summary ---".bold().magenta());
        println!("Folders merged:         {}", self.folders_merged);
        if self.folders_dryrun > 0 {
            println!("Folders to merge:       {}", self.folders_dryrun);
        }
        println!(
            "Folders failed:         {}",
            if self.folders_failed > 0 {
                self.folders_failed.to_string().red()
            } else {
                "0".normal()
            }
        );
        if self.cleanup_warnings > 0 {
            println!(
                "Folders not removed:    {}",
                self.cleanup_warnings.to_string().yellow()
            );
        }
        println!("Folders skipped:        {}", self.total_skipped());
        if self.total_skipped() > 0 {
            println!("  - Already organized:  {}", self.skipped_done);
            println!("  - Multiple videos:    {}", self.skipped_multi);
            println!("  - No video:           {}", self.skipped_empty);
            println!("  - Output exists:      {}", self.skipped_existing);
        }
        println!(
            "Total time:             {}",
            crate::format_duration(self.total_duration)
        );
        println!();

        if self.aborted {
            println!("{}", "Aborted by user".bold().red());
        }
        if self.folders_merged == 0 {
            println!("No new downloads to merge (organized folders were skipped)");
        } else {
            println!(
                "{}",
                format!("All done, merged {} new video(s)", self.folders_merged).bold().green()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn outcomes_are_counted() {
        let mut stats = RunStats::default();
        stats.add_outcome(
            &MergeOutcome::Merged {
                output: PathBuf::from("a.mkv"),
                cleanup_error: None,
            },
            Duration::from_secs(2),
        );
        stats.add_outcome(
            &MergeOutcome::Merged {
                output: PathBuf::from("b.mkv"),
                cleanup_error: Some("Permission denied".to_string()),
            },
            Duration::from_secs(3),
        );
        stats.add_outcome(
            &MergeOutcome::Failed {
                error: "ffmpeg failed".to_string(),
            },
            Duration::from_secs(1),
        );
        stats.add_outcome(
            &MergeOutcome::OutputExists {
                path: PathBuf::from("c.mkv"),
            },
            Duration::ZERO,
        );

        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.cleanup_warnings, 1);
        assert_eq!(stats.skipped_existing, 1);
        assert_eq!(stats.total_duration, Duration::from_secs(6));
    }

    #[test]
    fn skips_are_counted_by_verdict() {
        let mut stats = RunStats::default();
        stats.add_skip(&FolderVerdict::SkipDone);
        stats.add_skip(&FolderVerdict::SkipEmpty);
        stats.add_skip(&FolderVerdict::SkipEmpty);
        stats.add_skip(&FolderVerdict::SkipMulti {
            videos: vec!["a.mp4".to_string(), "b.mp4".to_string()],
        });

        assert_eq!(stats.skipped_done, 1);
        assert_eq!(stats.skipped_empty, 2);
        assert_eq!(stats.skipped_multi, 1);
        assert_eq!(stats.total_skipped(), 4);
        assert_eq!(stats.processed(), 0);
    }

    #[test]
    fn dryrun_is_not_processed() {
        let mut stats = RunStats::default();
        stats.add_outcome(
            &MergeOutcome::DryRun {
                output: PathBuf::from("a.mkv"),
            },
            Duration::ZERO,
        );
        assert_eq!(stats.processed(), 0);
        assert_eq!(stats.folders_dryrun, 1);
    }
}
