//! Track labels for subtitle files, derived from the file name only.

use std::fmt;
use std::path::{Path, PathBuf};

/// Language tag for danmaku tracks, which are always Chinese fansub content.
pub const DANMAKU_LANGUAGE: &str = "chi";

/// Language hints checked in order for plain subtitle files.
/// Each entry holds the name keywords, track title and language code.
const LANGUAGE_HINTS: &[(&[&str], &str, &str)] = &[
    (&["中文", "chs"], "Chinese Subtitles", "chi"),
    (&["日语", "jpn"], "Japanese Subtitles", "jpn"),
    (&["英语", "eng"], "English Subtitles", "eng"),
];

/// Subtitle file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleKind {
    /// Advanced SubStation Alpha, used for danmaku overlays.
    Ass,
    /// SubRip.
    Srt,
    Other,
}

/// Display title and language for one subtitle file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleLabel {
    pub title: &'static str,
    pub language: Option<&'static str>,
    pub kind: SubtitleKind,
}

/// A subtitle file with its derived track label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub label: SubtitleLabel,
}

impl SubtitleKind {
    fn from_extension(extension: &str) -> Self {
        match extension {
            "ass" => Self::Ass,
            "srt" => Self::Srt,
            _ => Self::Other,
        }
    }
}

impl SubtitleLabel {
    /// Derive the track label from a subtitle file name.
    ///
    /// ```rust
    /// use download_mux::subtitle::SubtitleLabel;
    ///
    /// let label = SubtitleLabel::from_file_name("video.ENG.srt");
    /// assert_eq!(label.title, "English Subtitles");
    /// assert_eq!(label.language, Some("eng"));
    /// ```
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Self {
        let path = Path::new(file_name);
        let extension = crate::path_to_file_extension_string(path);
        let name = crate::path_to_file_stem_string(path).to_lowercase();

        match SubtitleKind::from_extension(&extension) {
            SubtitleKind::Ass => Self {
                title: "ASS Danmaku",
                language: Some(DANMAKU_LANGUAGE),
                kind: SubtitleKind::Ass,
            },
            SubtitleKind::Srt => LANGUAGE_HINTS
                .iter()
                .find(|(keywords, _, _)| keywords.iter().any(|keyword| name.contains(keyword)))
                .map_or(
                    Self {
                        title: "SRT Subtitles",
                        language: None,
                        kind: SubtitleKind::Srt,
                    },
                    |&(_, title, language)| Self {
                        title,
                        language: Some(language),
                        kind: SubtitleKind::Srt,
                    },
                ),
            SubtitleKind::Other => Self {
                title: "Unknown Subtitles",
                language: None,
                kind: SubtitleKind::Other,
            },
        }
    }

    /// Danmaku tracks go first in the output file.
    #[must_use]
    pub const fn is_danmaku(&self) -> bool {
        matches!(self.kind, SubtitleKind::Ass)
    }
}

impl SubtitleTrack {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let label = SubtitleLabel::from_file_name(&crate::path_to_filename_string(&path));
        Self { path, label }
    }
}

/// Stable sort with danmaku tracks first.
pub fn sort_danmaku_first(tracks: &mut [SubtitleTrack]) {
    tracks.sort_by_key(|track| !track.label.is_danmaku());
}

impl fmt::Display for SubtitleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.language {
            Some(language) => write!(f, "{} [{language}]", self.title),
            None => write!(f, "{}", self.title),
        }
    }
}
