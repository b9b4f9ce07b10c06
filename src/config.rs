use std::path::PathBuf;

use itertools::Itertools;

/// Container format for merged output files.
/// A folder holding a file with this extension is considered already organized.
pub const OUTPUT_EXTENSION: &str = "mkv";

/// Source video formats produced by the downloader.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Cover image formats.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Subtitle formats.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["ass", "srt"];

/// Marker for staging files written during a merge.
/// Any file whose name contains it is never treated as merge input.
///
/// This also hides merged outputs of folders whose name contains the marker,
/// for example `My temp_mix.mkv`. Such a file does not mark its parent folder as
/// organized, so a parent holding one loose video is merged and removed with it.
pub const TEMP_MARKER: &str = "temp_";

/// Final config for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) root: PathBuf,
    pub(crate) output_extension: String,
    pub(crate) video_extensions: Vec<String>,
    pub(crate) dryrun: bool,
    pub(crate) verbose: bool,
}

impl Config {
    /// Create config for the given root directory with default extensions.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            output_extension: OUTPUT_EXTENSION.to_string(),
            video_extensions: Self::lowercase_vec(VIDEO_EXTENSIONS),
            dryrun: false,
            verbose: false,
        }
    }

    /// Only print what would be done without running ffmpeg or touching files.
    #[must_use]
    pub const fn with_dryrun(mut self, dryrun: bool) -> Self {
        self.dryrun = dryrun;
        self
    }

    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the source video extensions.
    /// The output extension is never accepted as a source.
    #[must_use]
    pub fn with_video_extensions(mut self, extensions: &[impl AsRef<str>]) -> Self {
        let output_extension = self.output_extension.clone();
        self.video_extensions = Self::lowercase_vec(extensions)
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty() && *ext != output_extension)
            .unique()
            .collect();
        self
    }

    #[must_use]
    pub const fn root(&self) -> &PathBuf {
        &self.root
    }

    #[must_use]
    pub fn output_extension(&self) -> &str {
        &self.output_extension
    }

    #[must_use]
    pub fn video_extensions(&self) -> &[String] {
        &self.video_extensions
    }

    #[must_use]
    pub const fn dryrun(&self) -> bool {
        self.dryrun
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Convert a slice of strings to lowercase.
    fn lowercase_vec(slice: &[impl AsRef<str>]) -> Vec<String> {
        slice.iter().map(|s| s.as_ref().to_lowercase()).collect()
    }
}
