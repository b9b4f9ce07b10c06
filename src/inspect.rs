//! Folder classification.
//!
//! A folder listing is first turned into a [`FolderSnapshot`] where every file gets exactly one
//! [`FileRole`], and the snapshot is then classified into a [`FolderVerdict`].
//! Only the listing touches the filesystem, so the decision rules can be tested on plain names.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{Config, IMAGE_EXTENSIONS, SUBTITLE_EXTENSIONS, TEMP_MARKER};
use crate::subtitle::{self, SubtitleTrack};

/// Role of a single file in a download folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Source video to be remuxed.
    Video,
    /// Finished output container.
    Finished,
    /// Cover image candidate.
    Image,
    Subtitle,
    /// Staging file left by an earlier merge.
    Temp,
    Other,
}

/// One regular file in a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub(crate) file_name: OsString,
    pub(crate) name: String,
    pub(crate) role: FileRole,
}

/// Regular files of a single folder with their roles, ordered by file name.
#[derive(Debug, Clone, Default)]
pub struct FolderSnapshot {
    entries: Vec<SnapshotEntry>,
}

/// Resources of a folder that can be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyFolder {
    pub video: PathBuf,
    pub cover: Option<PathBuf>,
    /// Subtitle tracks with danmaku first.
    pub subtitles: Vec<SubtitleTrack>,
}

/// Classification result for a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderVerdict {
    /// Exactly one source video and no finished output.
    Ready(ReadyFolder),
    /// Folder already contains a finished output file and must not be touched.
    SkipDone,
    /// Several source videos, so there is no way to tell which one to merge.
    SkipMulti { videos: Vec<String> },
    /// No source video, or the folder could not be read.
    SkipEmpty,
}

impl FileRole {
    /// Assign the role for a file name.
    ///
    /// The temp marker check comes first so staging files never count as input,
    /// whatever their extension.
    #[must_use]
    pub fn from_file_name(name: &str, config: &Config) -> Self {
        if name.contains(TEMP_MARKER) {
            return Self::Temp;
        }

        let extension = crate::path_to_file_extension_string(Path::new(name));
        if extension.is_empty() {
            return Self::Other;
        }

        if extension == config.output_extension {
            Self::Finished
        } else if config.video_extensions.contains(&extension) {
            Self::Video
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Self::Image
        } else if SUBTITLE_EXTENSIONS.contains(&extension.as_str()) {
            Self::Subtitle
        } else {
            Self::Other
        }
    }
}

impl SnapshotEntry {
    fn new(file_name: OsString, config: &Config) -> Self {
        let name = crate::os_str_to_string(&file_name);
        let role = FileRole::from_file_name(&name, config);
        Self { file_name, name, role }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn role(&self) -> FileRole {
        self.role
    }
}

impl FolderSnapshot {
    /// Build a snapshot from plain file names.
    /// Names are sorted so the result does not depend on listing order.
    pub fn from_file_names<I, S>(names: I, config: &Config) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut entries: Vec<SnapshotEntry> = names
            .into_iter()
            .map(|name| SnapshotEntry::new(name.into(), config))
            .collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self { entries }
    }

    /// Read the regular files directly inside `folder`.
    ///
    /// Returns `None` if the folder cannot be listed.
    #[must_use]
    pub fn read(folder: &Path, config: &Config) -> Option<Self> {
        let entries: Vec<walkdir::DirEntry> = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<_, _>>()
            .ok()?;

        let entries = entries
            .into_iter()
            // `Path::is_file` follows symlinks, so linked files are included.
            .filter(|entry| entry.path().is_file())
            .map(|entry| SnapshotEntry::new(entry.file_name().to_os_string(), config))
            .collect();

        Some(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    fn with_role(&self, role: FileRole) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter().filter(move |entry| entry.role == role)
    }
}

/// Classify a folder snapshot.
///
/// The checks run in a fixed order and the first match wins:
/// finished output, no video, several videos, and finally ready.
#[must_use]
pub fn classify(snapshot: &FolderSnapshot, folder: &Path) -> FolderVerdict {
    if snapshot.with_role(FileRole::Finished).next().is_some() {
        return FolderVerdict::SkipDone;
    }

    let videos: Vec<&SnapshotEntry> = snapshot.with_role(FileRole::Video).collect();
    let video = match videos.as_slice() {
        [] => return FolderVerdict::SkipEmpty,
        [video] => folder.join(&video.file_name),
        _ => {
            return FolderVerdict::SkipMulti {
                videos: videos.iter().map(|entry| entry.name.clone()).collect(),
            };
        }
    };

    // First image wins, unless a later one is named "cover".
    let mut cover: Option<&SnapshotEntry> = None;
    for image in snapshot.with_role(FileRole::Image) {
        let stem = crate::path_to_file_stem_string(Path::new(&image.name)).to_lowercase();
        if cover.is_none() || stem.contains("cover") {
            cover = Some(image);
        }
    }

    let mut subtitles: Vec<SubtitleTrack> = snapshot
        .with_role(FileRole::Subtitle)
        .map(|entry| SubtitleTrack::new(folder.join(&entry.file_name)))
        .collect();
    subtitle::sort_danmaku_first(&mut subtitles);

    FolderVerdict::Ready(ReadyFolder {
        video,
        cover: cover.map(|entry| folder.join(&entry.file_name)),
        subtitles,
    })
}

/// Inspect a folder on disk.
///
/// A folder that cannot be read is treated as empty.
#[must_use]
pub fn inspect(folder: &Path, config: &Config) -> FolderVerdict {
    FolderSnapshot::read(folder, config).map_or(FolderVerdict::SkipEmpty, |snapshot| classify(&snapshot, folder))
}

impl FolderVerdict {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Display for FolderVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => write!(f, "Ready"),
            Self::SkipDone => write!(f, "Already contains a finished file"),
            Self::SkipMulti { videos } => write!(f, "Contains {} videos", videos.len()),
            Self::SkipEmpty => write!(f, "No video found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::{self, File};

    use tempfile::tempdir;

    fn config() -> Config {
        Config::new(PathBuf::from("/mv"))
    }

    fn classify_names(names: &[&str]) -> FolderVerdict {
        let snapshot = FolderSnapshot::from_file_names(names.iter().copied(), &config());
        classify(&snapshot, Path::new("/mv/Song"))
    }

    fn ready(names: &[&str]) -> ReadyFolder {
        match classify_names(names) {
            FolderVerdict::Ready(ready) => ready,
            other => panic!("Expected ready folder, got {other:?}"),
        }
    }

    fn subtitle_names(ready: &ReadyFolder) -> Vec<String> {
        ready
            .subtitles
            .iter()
            .map(|track| crate::path_to_filename_string(&track.path))
            .collect()
    }

    #[test]
    fn roles_are_assigned_by_extension() {
        let config = config();
        assert_eq!(FileRole::from_file_name("video.mp4", &config), FileRole::Video);
        assert_eq!(FileRole::from_file_name("VIDEO.MP4", &config), FileRole::Video);
        assert_eq!(FileRole::from_file_name("done.mkv", &config), FileRole::Finished);
        assert_eq!(FileRole::from_file_name("cover.jpeg", &config), FileRole::Image);
        assert_eq!(FileRole::from_file_name("poster.PNG", &config), FileRole::Image);
        assert_eq!(FileRole::from_file_name("danmaku.ass", &config), FileRole::Subtitle);
        assert_eq!(FileRole::from_file_name("sub.srt", &config), FileRole::Subtitle);
        assert_eq!(FileRole::from_file_name("notes.txt", &config), FileRole::Other);
        assert_eq!(FileRole::from_file_name("README", &config), FileRole::Other);
    }

    #[test]
    fn temp_marker_overrides_every_extension() {
        let config = config();
        for name in ["temp_Song.mkv", "temp_video.mp4", "old_temp_cover.jpg", "temp_sub.ass"] {
            assert_eq!(FileRole::from_file_name(name, &config), FileRole::Temp, "{name}");
        }
    }

    #[test]
    fn roles_follow_configured_video_extensions() {
        let config = config().with_video_extensions(&["flv"]);
        assert_eq!(FileRole::from_file_name("video.flv", &config), FileRole::Video);
        assert_eq!(FileRole::from_file_name("video.mp4", &config), FileRole::Other);
    }

    #[test]
    fn finished_file_means_done() {
        assert_eq!(classify_names(&["video.mp4", "done.mkv"]), FolderVerdict::SkipDone);
        assert_eq!(classify_names(&["done.mkv"]), FolderVerdict::SkipDone);
        assert_eq!(
            classify_names(&["a.mp4", "b.mp4", "c.mkv", "cover.jpg"]),
            FolderVerdict::SkipDone
        );
    }

    #[test]
    fn no_video_means_empty() {
        assert_eq!(classify_names(&[]), FolderVerdict::SkipEmpty);
        assert_eq!(classify_names(&["cover.jpg", "sub.ass", "notes.txt"]), FolderVerdict::SkipEmpty);
    }

    #[test]
    fn several_videos_means_multi() {
        assert_eq!(
            classify_names(&["b.mp4", "a.mp4"]),
            FolderVerdict::SkipMulti {
                videos: vec!["a.mp4".to_string(), "b.mp4".to_string()]
            }
        );
    }

    #[test]
    fn single_video_is_ready() {
        let ready = ready(&["video.mp4", "cover.jpg", "sub_en.srt", "sub.ass"]);
        assert_eq!(ready.video, PathBuf::from("/mv/Song/video.mp4"));
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/cover.jpg")));
        assert_eq!(subtitle_names(&ready), ["sub.ass", "sub_en.srt"]);
    }

    #[test]
    fn ready_without_extras() {
        let ready = ready(&["video.mp4", "notes.txt"]);
        assert_eq!(ready.cover, None);
        assert!(ready.subtitles.is_empty());
    }

    #[test]
    fn temp_files_are_invisible_in_every_branch() {
        // Would be done
        assert!(classify_names(&["video.mp4", "temp_Song.mkv"]).is_ready());
        // Would be multi
        assert!(classify_names(&["video.mp4", "temp_video.mp4"]).is_ready());
        // Would be ready
        assert_eq!(classify_names(&["temp_video.mp4"]), FolderVerdict::SkipEmpty);
        // Extras are ignored too
        let ready = ready(&["video.mp4", "temp_cover.jpg", "temp_sub.ass"]);
        assert_eq!(ready.cover, None);
        assert!(ready.subtitles.is_empty());
    }

    #[test]
    fn first_image_is_cover_by_default() {
        let ready = ready(&["video.mp4", "b.jpg", "a.png"]);
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/a.png")));
    }

    #[test]
    fn cover_named_image_overrides_position() {
        let ready = ready(&["video.mp4", "a.jpg", "z_Cover.png"]);
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/z_Cover.png")));
    }

    #[test]
    fn earlier_images_do_not_override_cover() {
        let ready = ready(&["video.mp4", "cover.jpg", "thumb.jpg"]);
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/cover.jpg")));
    }

    #[test]
    fn output_with_temp_marker_does_not_mark_folder_done() {
        let ready = ready(&["loose.mp4", "My temp_mix.mkv"]);
        assert_eq!(ready.video, PathBuf::from("/mv/Song/loose.mp4"));
    }

    #[test]
    fn last_cover_named_image_wins() {
        let ready = ready(&["video.mp4", "a_cover.jpg", "b.jpg", "z_cover.png"]);
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/z_cover.png")));
    }

    #[test]
    fn only_cover_named_image_wins_when_listed_first() {
        let ready = ready(&["video.mp4", "a_cover.jpg", "b.jpg", "c.png"]);
        assert_eq!(ready.cover, Some(PathBuf::from("/mv/Song/a_cover.jpg")));
    }

    #[test]
    fn subtitles_are_danmaku_first_and_stable() {
        let ready = ready(&["video.mp4", "1.srt", "2.ass", "3.srt", "4.ass"]);
        assert_eq!(subtitle_names(&ready), ["2.ass", "4.ass", "1.srt", "3.srt"]);
    }

    #[test]
    fn read_lists_only_regular_files() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("video.mp4")).unwrap();
        File::create(dir.path().join("sub.ass")).unwrap();
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let snapshot = FolderSnapshot::read(dir.path(), &config()).unwrap();
        let names: Vec<&str> = snapshot.entries().iter().map(SnapshotEntry::name).collect();
        assert_eq!(names, ["sub.ass", "video.mp4"]);
        assert_eq!(snapshot.entries()[1].role(), FileRole::Video);
    }

    #[test]
    fn inspect_ready_folder_on_disk() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("Song_A");
        fs::create_dir(&folder).unwrap();
        for name in ["video.mp4", "cover.jpg", "sub.ass", "sub_en.srt", "temp_Song_A.mkv"] {
            File::create(folder.join(name)).unwrap();
        }

        let FolderVerdict::Ready(ready) = inspect(&folder, &config()) else {
            panic!("Expected ready folder");
        };
        assert_eq!(ready.video, folder.join("video.mp4"));
        assert_eq!(ready.cover, Some(folder.join("cover.jpg")));
        assert_eq!(subtitle_names(&ready), ["sub.ass", "sub_en.srt"]);
    }

    #[test]
    fn inspect_missing_folder_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(inspect(&dir.path().join("missing"), &config()), FolderVerdict::SkipEmpty);
    }
}
