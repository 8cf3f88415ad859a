use std::path::PathBuf;
use thiserror::Error;

/// Media could not be analysed. Only the waveform suffers from this.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("unsupported media {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },
    #[error("no audio stream in {0}")]
    NoAudio(PathBuf),
    #[error("empty audio stream")]
    Empty,
    #[error("invalid stream parameters: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("unable to open {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("nothing loaded")]
    NotLoaded,
    #[error("playback failed: {0}")]
    Playback(String),
}

#[derive(Debug, Error)]
pub enum PlaylistFileError {
    #[error("failed to read playlist {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write playlist {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("playlist {path} is not a JSON array of strings")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to play {path}: {source}")]
    BackendLoad {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("playlist is empty")]
    EmptyPlaylist,
    #[error("track index {0} is out of range")]
    NoSuchTrack(usize),
    #[error("seek needs a loaded track with a known duration")]
    SeekUnavailable,
    #[error(transparent)]
    PlaylistFile(#[from] PlaylistFileError),
}
