//! Local media file resolution.

use std::path::{Path, PathBuf};

use crate::error::{ControlError, ControlResult};

/// Resolve a media request against one feed's media directory.
///
/// With `search_by_num` the request's leading digits select any file sharing
/// that numeric prefix; candidates are scanned in sorted order so the result
/// is deterministic. Otherwise only the exact name matches.
pub fn resolve_media(
    root: &Path,
    feed: &str,
    name: &str,
    search_by_num: bool,
) -> ControlResult<PathBuf> {
    let dir = root.join(feed);

    if search_by_num {
        let prefix: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        if prefix.is_empty() {
            return Err(ControlError::Validation(format!(
                "'{}' has no numeric prefix to search by",
                name
            )));
        }
        let mut candidates: Vec<String> = std::fs::read_dir(&dir)
            .map_err(|_| not_found(feed, name))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|file| file.starts_with(&prefix))
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .map(|file| dir.join(file))
            .ok_or_else(|| not_found(feed, name))
    } else {
        let path = dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(not_found(feed, name))
        }
    }
}

fn not_found(feed: &str, name: &str) -> ControlError {
    ControlError::NotFound(format!("no media for '{}' matching '{}'", feed, name))
}
