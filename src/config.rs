use crate::model::PersistedState;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "wavedeck";
const STATE_FILE: &str = "state.json";
const LOG_FILE: &str = "wavedeck.log";
pub const CONFIG_DIR_ENV: &str = "WAVEDECK_CONFIG_DIR";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_root()?.join(STATE_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_config_dir()?.join(LOG_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_state() -> Result<PersistedState> {
    let path = state_path()?;
    if !path.exists() {
        return Ok(PersistedState::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let mut state: PersistedState = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))?;
    sanitize(&mut state);
    Ok(state)
}

pub fn save_state(state: &PersistedState) -> Result<()> {
    ensure_config_dir()?;
    let path = state_path()?;
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// Hand-edited state files should not be able to stall the tick loop.
fn sanitize(state: &mut PersistedState) {
    let defaults = PersistedState::default();
    if !state.volume.is_finite() {
        state.volume = defaults.volume;
    }
    state.volume = state.volume.clamp(0.0, 1.0);
    state.tick_interval_ms = state.tick_interval_ms.clamp(16, 5_000);
    if !state.wave_half_width_seconds.is_finite() || state.wave_half_width_seconds <= 0.0 {
        state.wave_half_width_seconds = defaults.wave_half_width_seconds;
    }
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
