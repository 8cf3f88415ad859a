use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "REPEAT",
            Self::All => "REPEAT (ALL)",
            Self::One => "REPEAT (ONE)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub location: String,
    pub media_kind: MediaKind,
}

impl Track {
    pub fn new(location: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            location: location.into(),
            media_kind,
        }
    }

    /// Builds a track from a location, classifying it by extension. Unknown
    /// extensions are treated as audio so the backend still gets a chance.
    pub fn from_location(location: impl Into<String>) -> Self {
        let location = location.into();
        let media_kind =
            crate::library::media_kind_for(Path::new(&location)).unwrap_or(MediaKind::Audio);
        Self {
            location,
            media_kind,
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.location)
    }

    pub fn display_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.location.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default)]
    pub shuffle_enabled: bool,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_wave_half_width_seconds")]
    pub wave_half_width_seconds: f64,
    #[serde(default)]
    pub last_playlist: Vec<String>,
}

fn default_volume() -> f32 {
    0.7
}

fn default_tick_interval_ms() -> u64 {
    300
}

fn default_wave_half_width_seconds() -> f64 {
    0.1
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            repeat_mode: RepeatMode::default(),
            shuffle_enabled: false,
            tick_interval_ms: default_tick_interval_ms(),
            wave_half_width_seconds: default_wave_half_width_seconds(),
            last_playlist: Vec::new(),
        }
    }
}
