//! Remux a ready download folder into a single container file.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::config::TEMP_MARKER;
use crate::inspect::ReadyFolder;
use crate::subtitle::{DANMAKU_LANGUAGE, SubtitleTrack};

const FFMPEG: &str = "ffmpeg";
const FFMPEG_DEFAULT_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-loglevel", "error", "-y"];

/// Exit status and captured stderr of a finished remux process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxStatus {
    /// `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub diagnostics: String,
}

/// External program that remuxes the given inputs into one output file.
///
/// The last argument is always the output path.
pub trait RemuxEngine {
    /// Run the remux and block until it exits.
    ///
    /// # Errors
    /// Returns an error if the process could not be started.
    fn remux(&self, args: &[OsString]) -> io::Result<RemuxStatus>;
}

impl<F> RemuxEngine for F
where
    F: Fn(&[OsString]) -> io::Result<RemuxStatus>,
{
    fn remux(&self, args: &[OsString]) -> io::Result<RemuxStatus> {
        self(args)
    }
}

/// Runs the `ffmpeg` binary found in `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ffmpeg;

/// Everything needed to merge one folder.
#[derive(Debug, Clone)]
pub struct MergeJob {
    folder: PathBuf,
    folder_name: String,
    video: PathBuf,
    cover: Option<PathBuf>,
    subtitles: Vec<SubtitleTrack>,
    output_path: PathBuf,
    temp_path: PathBuf,
}

/// Result of merging a single folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Output file was created.
    /// `cleanup_error` is set if the source folder could not be removed afterwards.
    Merged {
        output: PathBuf,
        cleanup_error: Option<String>,
    },
    /// Dryrun, nothing was executed.
    DryRun { output: PathBuf },
    /// Output file already exists, nothing was done.
    OutputExists { path: PathBuf },
    /// Merge failed and the source folder was left as is.
    Failed { error: String },
}

impl RemuxStatus {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

impl Ffmpeg {
    /// Check that ffmpeg can be executed.
    pub fn check_available() -> Result<()> {
        let status = Command::new(FFMPEG)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => anyhow::bail!("ffmpeg -version failed with status: {status}"),
            Err(_) => anyhow::bail!("ffmpeg not found. Install ffmpeg first and make sure it is in PATH"),
        }
    }
}

impl RemuxEngine for Ffmpeg {
    fn remux(&self, args: &[OsString]) -> io::Result<RemuxStatus> {
        let mut cmd = Command::new(FFMPEG);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let output = cmd.output()?;
        Ok(RemuxStatus {
            exit_code: output.status.code(),
            diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl MergeJob {
    /// Create the merge job for a ready folder.
    /// Output and temp files are placed in the parent directory of the folder.
    pub fn new(folder: &Path, ready: ReadyFolder, output_extension: &str) -> Result<Self> {
        let parent = folder
            .parent()
            .with_context(|| format!("Failed to get parent directory of {}", folder.display()))?;
        let folder_name = crate::get_normalized_dir_name(folder)?;
        let output_path = parent.join(format!("{folder_name}.{output_extension}"));
        let temp_path = parent.join(format!("{TEMP_MARKER}{folder_name}.{output_extension}"));

        Ok(Self {
            folder: folder.to_path_buf(),
            folder_name,
            video: ready.video,
            cover: ready.cover,
            subtitles: ready.subtitles,
            output_path,
            temp_path,
        })
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    #[must_use]
    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    #[must_use]
    pub fn subtitles(&self) -> &[SubtitleTrack] {
        &self.subtitles
    }

    #[must_use]
    pub fn output_exists(&self) -> bool {
        self.output_path.exists()
    }

    /// Build the ffmpeg arguments.
    ///
    /// Input 0 is the video with all its streams, followed by the cover and the subtitles.
    /// Every stream is copied as is, except the cover which becomes an attached picture.
    #[must_use]
    pub fn ffmpeg_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = FFMPEG_DEFAULT_ARGS.iter().map(OsString::from).collect();

        let mut inputs: Vec<&Path> = vec![self.video.as_path()];
        inputs.extend(self.cover.as_deref());
        inputs.extend(self.subtitles.iter().map(|track| track.path.as_path()));

        for input in &inputs {
            args.push("-i".into());
            args.push(input.as_os_str().to_os_string());
        }
        for index in 0..inputs.len() {
            args.push("-map".into());
            args.push(index.to_string().into());
        }

        args.push("-metadata".into());
        args.push(format!("title={}", self.folder_name).into());

        if self.cover.is_some() {
            args.extend(
                [
                    "-c:v:1",
                    "mjpeg",
                    "-disposition:v:1",
                    "attached_pic",
                    "-metadata:s:v:1",
                    "title=Cover",
                ]
                .map(OsString::from),
            );
        }

        for (index, track) in self.subtitles.iter().enumerate() {
            let stream = format!("-metadata:s:s:{index}");
            args.push(stream.clone().into());
            args.push(format!("title={}", track.label.title).into());
            if track.label.is_danmaku() {
                args.push(stream.into());
                args.push(format!("language={DANMAKU_LANGUAGE}").into());
            }
        }

        // Last codec option wins, so the cover is copied as is too.
        args.extend(["-c", "copy"].map(OsString::from));
        args.push(self.temp_path.as_os_str().to_os_string());
        args
    }

    /// Printable ffmpeg command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(FFMPEG.to_string())
            .chain(self.ffmpeg_args().iter().map(|arg| {
                let arg = arg.to_string_lossy();
                if arg.contains(char::is_whitespace) {
                    format!("\"{arg}\"")
                } else {
                    arg.into_owned()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the merge.
    ///
    /// Output goes to the temp file first and is renamed to the final path only after the
    /// engine succeeds. The source folder is removed last, and failing to remove it does not
    /// change the outcome.
    pub fn execute(&self, engine: &impl RemuxEngine) -> MergeOutcome {
        if self.output_exists() {
            return MergeOutcome::OutputExists {
                path: self.output_path.clone(),
            };
        }

        let status = match engine.remux(&self.ffmpeg_args()) {
            Ok(status) => status,
            Err(error) => {
                self.remove_temp_file();
                return MergeOutcome::Failed {
                    error: format!("Failed to execute ffmpeg: {error}"),
                };
            }
        };

        if !status.success() {
            self.remove_temp_file();
            let code = status.exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string());
            let error = if status.diagnostics.is_empty() {
                format!("ffmpeg failed with status: {code}")
            } else {
                format!("ffmpeg failed with status {code}: {}", status.diagnostics)
            };
            return MergeOutcome::Failed { error };
        }

        if let Err(error) = self.promote_temp_file() {
            self.remove_temp_file();
            return MergeOutcome::Failed {
                error: format!("{error:#}"),
            };
        }

        let cleanup_error = fs::remove_dir_all(&self.folder)
            .err()
            .map(|error| format!("Failed to remove folder {}: {error}", self.folder.display()));

        MergeOutcome::Merged {
            output: self.output_path.clone(),
            cleanup_error,
        }
    }

    /// Move the finished temp file to the output path.
    fn promote_temp_file(&self) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(&self.output_path).with_context(|| {
                format!("Failed to remove existing output file {}", self.output_path.display())
            })?;
        }
        fs::rename(&self.temp_path, &self.output_path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                self.temp_path.display(),
                self.output_path.display()
            )
        })
    }

    fn remove_temp_file(&self) {
        if self.temp_path.exists() {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

impl MergeOutcome {
    /// True if a new output file was created.
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merged { output, .. } => write!(f, "Merged: {}", output.display()),
            Self::DryRun { output } => write!(f, "Would create: {}", output.display()),
            Self::OutputExists { path } => write!(f, "Output file already exists: \"{}\"", path.display()),
            Self::Failed { error } => write!(f, "Failed: {error}"),
        }
    }
}

/// Run the child in a new process group so Ctrl+C is only received by this program,
/// which then finishes the current folder before stopping.
fn isolate_process_group(cmd: &mut Command) {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
}
