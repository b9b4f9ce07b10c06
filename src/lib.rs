//! Merge downloaded video folders into single MKV files.
//!
//! A download folder holds one source video together with an optional cover image
//! and subtitle files. Each such folder is remuxed with ffmpeg into
//! `<folder name>.mkv` in the parent directory, after which the folder is removed.

pub mod config;
pub mod inspect;
pub mod logger;
pub mod merge;
pub mod stats;
pub mod subtitle;
pub mod walker;

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Command;
use clap_complete::Shell;
use colored::Colorize;
use unicode_normalization::UnicodeNormalization;

pub use config::Config;
pub use inspect::{FolderVerdict, ReadyFolder};
pub use merge::{Ffmpeg, MergeOutcome, RemuxEngine, RemuxStatus};
pub use walker::DownloadMux;

/// Get the directory name from a Path with special characters retained.
///
/// The name is composed to NFC on macOS only. Other platforms keep the name as stored.
pub fn get_normalized_dir_name(path: &Path) -> Result<String> {
    let dir_name = os_str_to_string(path.file_name().context("Failed to get directory name")?);

    // macOS file APIs return names in NFD (Normalization Form Decomposed),
    // which would leak into the output file name and title.
    if cfg!(target_os = "macos") {
        Ok(dir_name.nfc().collect::<String>())
    } else {
        Ok(dir_name)
    }
}

/// Resolves the provided input path to an absolute directory path.
///
/// If `path` is `None`, the current working directory is used.
/// The function verifies that the provided path exists and is a directory,
/// returning an error if it does not.
/// ```rust
/// use std::path::Path;
/// use download_mux::resolve_input_path;
///
/// let path = Path::new("src");
/// let absolute_path = resolve_input_path(Some(path)).unwrap();
/// assert!(absolute_path.is_absolute());
/// ```
#[inline]
pub fn resolve_input_path(path: Option<&Path>) -> Result<PathBuf> {
    // Only valid UTF-8 paths are trimmed, anything else is used as given.
    let input_path = path.map(|p| p.to_str().map_or_else(|| p.to_path_buf(), |s| PathBuf::from(s.trim())));

    let dirpath = match input_path {
        Some(dirpath) if !dirpath.as_os_str().is_empty() => dirpath,
        _ => env::current_dir().context("Failed to get current working directory")?,
    };
    if !dirpath.exists() {
        anyhow::bail!(
            "Input path does not exist or is not accessible: '{}'",
            dirpath.display()
        );
    }
    if !dirpath.is_dir() {
        anyhow::bail!("Input path is not a directory: '{}'", dirpath.display());
    }

    let absolute_input_path = dunce::canonicalize(&dirpath)?;

    // Canonicalize fails for network drives on Windows :(
    if path_to_string(&absolute_input_path).starts_with(r"\\?") && !path_to_string(&dirpath).starts_with(r"\\?") {
        Ok(dirpath)
    } else {
        Ok(absolute_input_path)
    }
}

/// Gets the relative path or filename from a full path based on a root directory.
///
/// If the full path is within the root directory, the function returns the relative path.
/// Otherwise, it returns just the filename. If the filename cannot be determined, the
/// full path is returned.
///
/// ```rust
/// use std::path::Path;
/// use download_mux::get_relative_path_or_filename;
///
/// let root = Path::new("/root/dir");
/// let full_path = root.join("subdir/video.mkv");
/// let relative_path = get_relative_path_or_filename(&full_path, root);
/// assert_eq!(relative_path, "subdir/video.mkv");
///
/// let outside_path = Path::new("/other/dir/video.mkv");
/// let relative_or_filename = get_relative_path_or_filename(&outside_path, root);
/// assert_eq!(relative_or_filename, "video.mkv");
/// ```
#[must_use]
pub fn get_relative_path_or_filename(full_path: &Path, root: &Path) -> String {
    if full_path == root {
        return full_path.file_name().unwrap_or_default().to_string_lossy().to_string();
    }
    full_path.strip_prefix(root).map_or_else(
        |_| {
            full_path.file_name().map_or_else(
                || full_path.display().to_string(),
                |name| name.to_string_lossy().to_string(),
            )
        },
        |relative_path| relative_path.display().to_string(),
    )
}

/// Convert `OsStr` to String with invalid Unicode handling.
pub fn os_str_to_string(name: &OsStr) -> String {
    name.to_str().map_or_else(
        || name.to_string_lossy().replace('\u{FFFD}', ""),
        std::string::ToString::to_string,
    )
}

/// Convert given path to string with invalid Unicode handling.
pub fn path_to_string(path: &Path) -> String {
    path.to_str().map_or_else(
        || path.to_string_lossy().to_string().replace('\u{FFFD}', ""),
        std::string::ToString::to_string,
    )
}

/// Convert given path to filename string with invalid Unicode handling.
#[must_use]
pub fn path_to_filename_string(path: &Path) -> String {
    os_str_to_string(path.file_name().unwrap_or_default())
}

/// Convert given path to file stem string with invalid Unicode handling.
#[must_use]
pub fn path_to_file_stem_string(path: &Path) -> String {
    os_str_to_string(path.file_stem().unwrap_or_default())
}

/// Convert given path to file extension lowercase string with invalid Unicode handling.
#[must_use]
pub fn path_to_file_extension_string(path: &Path) -> String {
    os_str_to_string(path.extension().unwrap_or_default()).to_lowercase()
}

#[inline]
pub fn print_error(message: &str) {
    eprintln!("{}", format!("Error: {message}").red());
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::print_error(&format!($($arg)*))
    };
}

#[inline]
pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow());
}

#[macro_export]
macro_rules! print_warning {
    ($($arg:tt)*) => {
        $crate::print_warning(&format!($($arg)*))
    };
}

/// Format duration as a human-readable string
#[must_use]
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Generate a shell completion script for the given shell.
pub fn generate_shell_completion(shell: Shell, mut command: Command, install: bool, command_name: &str) -> Result<()> {
    if install {
        let out_dir = get_shell_completion_dir(shell, command_name)?;
        let path = clap_complete::generate_to(shell, &mut command, command_name, out_dir)?;
        println!("Completion file generated to: {}", path.display());
    } else {
        clap_complete::generate(shell, &mut command, command_name, &mut std::io::stdout());
    }
    Ok(())
}

/// Determine the appropriate directory for storing shell completions.
///
/// First checks if the user-specific directory exists,
/// then checks for the global directory.
/// If neither exist, creates and uses the user-specific dir.
fn get_shell_completion_dir(shell: Shell, name: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;

    // Special handling for oh-my-zsh.
    // Create custom "plugin", which will then have to be loaded in .zshrc
    if shell == Shell::Zsh {
        let omz_plugins = home.join(".oh-my-zsh/custom/plugins");
        if omz_plugins.exists() {
            let plugin_dir = omz_plugins.join(name);
            std::fs::create_dir_all(&plugin_dir)?;
            return Ok(plugin_dir);
        }
    }

    let user_dir = match shell {
        Shell::PowerShell => {
            if cfg!(windows) {
                home.join(r"Documents\PowerShell\completions")
            } else {
                home.join(".config/powershell/completions")
            }
        }
        Shell::Bash => home.join(".bash_completion.d"),
        Shell::Elvish => home.join(".elvish"),
        Shell::Fish => home.join(".config/fish/completions"),
        Shell::Zsh => home.join(".zsh/completions"),
        _ => anyhow::bail!("Unsupported shell"),
    };

    if user_dir.exists() {
        return Ok(user_dir);
    }

    let global_dir = match shell {
        Shell::PowerShell => user_dir.clone(),
        Shell::Bash => PathBuf::from("/etc/bash_completion.d"),
        Shell::Fish => PathBuf::from("/usr/share/fish/completions"),
        Shell::Zsh => PathBuf::from("/usr/share/zsh/site-functions"),
        _ => anyhow::bail!("Unsupported shell"),
    };

    if global_dir.exists() {
        return Ok(global_dir);
    }

    std::fs::create_dir_all(&user_dir)?;
    Ok(user_dir)
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    use std::fs::File;
    use std::time::Duration;

    use tempfile::tempdir;

    #[test]
    fn test_resolve_input_path_valid() {
        let dir = tempdir().unwrap();
        let resolved = resolve_input_path(Some(dir.path()));
        assert!(resolved.is_ok());
        assert!(resolved.unwrap().is_absolute());
    }

    #[test]
    fn test_resolve_input_path_nonexistent() {
        let path = Path::new("nonexistent");
        let resolved = resolve_input_path(Some(path));
        assert!(resolved.is_err());
    }

    #[test]
    fn test_resolve_input_path_file_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("video.mp4");
        File::create(&file).unwrap();
        assert!(resolve_input_path(Some(&file)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_input_path_non_utf8_directory() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join(OsStr::from_bytes(b"mv\xFF"));
        if std::fs::create_dir(&target).is_err() {
            // Filesystem rejects non UTF-8 names
            return;
        }

        let resolved = resolve_input_path(Some(&target)).unwrap();
        assert_eq!(resolved, dunce::canonicalize(&target).unwrap());
        assert_ne!(resolved, dunce::canonicalize(env::current_dir().unwrap()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_input_path_missing_non_utf8_is_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join(OsStr::from_bytes(b"missing\xFF"));
        assert!(resolve_input_path(Some(&target)).is_err());
    }

    #[test]
    fn test_resolve_input_path_empty() {
        let path = Path::new("  \n");
        let resolved = resolve_input_path(Some(path));
        assert!(resolved.is_ok());
        assert_eq!(resolved.unwrap(), dunce::canonicalize(env::current_dir().unwrap()).unwrap());
    }

    #[test]
    fn test_resolve_input_path_default() {
        let resolved = resolve_input_path(None);
        assert!(resolved.is_ok());
        assert_eq!(resolved.unwrap(), dunce::canonicalize(env::current_dir().unwrap()).unwrap());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_normalized_dir_name_composes_characters() {
        let decomposed = PathBuf::from("/music/Mo\u{0308}tley");
        assert_eq!(get_normalized_dir_name(&decomposed).unwrap(), "M\u{f6}tley");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_normalized_dir_name_keeps_stored_form() {
        let decomposed = PathBuf::from("/music/Mo\u{0308}tley");
        assert_eq!(get_normalized_dir_name(&decomposed).unwrap(), "Mo\u{0308}tley");
        let composed = PathBuf::from("/music/M\u{f6}tley");
        assert_eq!(get_normalized_dir_name(&composed).unwrap(), "M\u{f6}tley");
    }

    #[test]
    fn test_normalized_dir_name_keeps_cjk() {
        let path = PathBuf::from("/mv/【可不】Kyu-kurarin");
        assert_eq!(get_normalized_dir_name(&path).unwrap(), "【可不】Kyu-kurarin");
    }

    #[test]
    fn test_path_to_file_extension_string_is_lowercase() {
        assert_eq!(path_to_file_extension_string(Path::new("Cover.JPG")), "jpg");
        assert_eq!(path_to_file_extension_string(Path::new("README")), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }
}
