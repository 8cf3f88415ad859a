use crate::error::PlaylistFileError;
use crate::model::{MediaKind, Track};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "flv"];

pub fn media_kind_for(path: &Path) -> Option<MediaKind> {
    let ext = path.extension().and_then(OsStr::to_str)?;
    if AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
    {
        return Some(MediaKind::Audio);
    }
    VIDEO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
        .then_some(MediaKind::Video)
}

/// Recursively collects playable media under `root` in path order.
pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut tracks: Vec<Track> = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let kind = media_kind_for(entry.path())?;
            let cleaned = crate::config::strip_windows_verbatim_prefix(entry.path());
            Some(Track::new(cleaned.to_string_lossy(), kind))
        })
        .collect();

    tracks.sort_by(|a, b| a.location.cmp(&b.location));
    tracks
}

/// Turns a user-supplied path into tracks: folders are scanned, single files
/// are accepted when their extension is known.
pub fn tracks_for_path(path: &Path) -> Vec<Track> {
    if path.is_dir() {
        return scan_folder(path);
    }
    match media_kind_for(path) {
        Some(kind) => vec![Track::new(path.to_string_lossy(), kind)],
        None => Vec::new(),
    }
}

/// Serializes locations as a flat JSON array, `["a", "b"]`.
pub fn encode_playlist(locations: &[String]) -> String {
    let items: Vec<String> = locations
        .iter()
        .map(|location| {
            serde_json::to_string(location).unwrap_or_else(|_| String::from("\"\""))
        })
        .collect();
    format!("[{}]", items.join(", "))
}

pub fn decode_playlist(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(raw.trim_start_matches('\u{feff}'))
}

pub fn save_playlist_file(path: &Path, locations: &[String]) -> Result<(), PlaylistFileError> {
    fs::write(path, encode_playlist(locations)).map_err(|source| PlaylistFileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_playlist_file(path: &Path) -> Result<Vec<Track>, PlaylistFileError> {
    let raw = fs::read_to_string(path).map_err(|source| PlaylistFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let locations = decode_playlist(&raw).map_err(|source| PlaylistFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(locations.into_iter().map(Track::from_location).collect())
}
