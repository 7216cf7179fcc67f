use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::metadata::SourceKind;

/// Extensions treated as audiobook audio
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "m4b", "m4a", "mp4", "mp3", "flac", "ogg", "opus", "aac", "wav",
];

/// Check if a path has an audio extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Whether a file belongs to the MP4 family that mp4ameta can read
pub fn is_mp4_family(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            matches!(
                ext.to_string_lossy().to_lowercase().as_str(),
                "m4b" | "m4a" | "mp4"
            )
        })
        .unwrap_or(false)
}

/// Audio files making up a release, sorted by path.
///
/// A file path yields itself; a directory is walked recursively.
pub fn audio_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::unavailable(
            SourceKind::Embedded,
            format!("{} does not exist", path.display()),
            false,
        ));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();

    // Sort by path for consistent chapter order
    files.sort();

    Ok(files)
}
