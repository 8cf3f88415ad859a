pub mod decode;

use crate::error::BackendError;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Position value reported when nothing is playing or the track has run out.
pub const NOT_PLAYING: i64 = -1;

pub trait PlaybackBackend {
    fn load(&mut self, path: &Path) -> Result<(), BackendError>;
    /// Starts the loaded media from `start_offset_seconds`, replacing whatever
    /// was playing.
    fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    /// Milliseconds of playback, or a negative value when idle or finished.
    fn position_millis(&self) -> i64;
    /// Whether `position_millis` restarts from zero on every `play` call
    /// instead of reporting the absolute media position.
    fn position_is_relative(&self) -> bool {
        false
    }
}

impl<T: PlaybackBackend + ?Sized> PlaybackBackend for Box<T> {
    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        (**self).load(path)
    }

    fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError> {
        (**self).play(start_offset_seconds)
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn resume(&mut self) {
        (**self).resume();
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume);
    }

    fn position_millis(&self) -> i64 {
        (**self).position_millis()
    }

    fn position_is_relative(&self) -> bool {
        (**self).position_is_relative()
    }
}

pub struct RodioBackend {
    stream: OutputStream,
    sink: Sink,
    loaded: Option<PathBuf>,
    volume: f32,
}

impl RodioBackend {
    pub fn new() -> anyhow::Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;
        Ok(Self {
            stream,
            sink,
            loaded: None,
            volume: 1.0,
        })
    }

    fn open_output_stream() -> anyhow::Result<(OutputStream, Sink)> {
        use anyhow::Context;

        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    let host = rodio::cpal::default_host();
                    let devices: Vec<_> = host.output_devices().ok().into_iter().flatten().collect();
                    for device in devices {
                        let name = device.name().unwrap_or_default();
                        let opened = OutputStreamBuilder::from_device(device)
                            .context("failed to open fallback output device")
                            .and_then(|builder| {
                                builder
                                    .with_error_callback(|_| {})
                                    .open_stream_or_fallback()
                                    .context("failed to start fallback output stream")
                            });
                        if let Ok(stream) = opened {
                            log::info!("default output failed, using {name}");
                            return Ok(stream);
                        }
                    }
                    Err(default_err.context("no usable audio output device"))
                }
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }

    fn open_source(path: &Path) -> Result<impl Source + Send + 'static, BackendError> {
        let file = File::open(path).map_err(|err| BackendError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Decoder::try_from(file).map_err(|err| BackendError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

impl PlaybackBackend for RodioBackend {
    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        // Probe now so an unplayable file fails at load time.
        Self::open_source(path)?;
        self.sink.stop();
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError> {
        let path = self.loaded.clone().ok_or(BackendError::NotLoaded)?;
        let source = Self::open_source(&path)?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.set_volume(self.volume);
        self.sink.append(source);

        if start_offset_seconds > 0.0 {
            let target = Duration::from_secs_f64(start_offset_seconds);
            if let Err(err) = self.sink.try_seek(target) {
                // Never leave the source running from 0:00 after a failed seek.
                self.sink.stop();
                return Err(BackendError::Seek(format!("{err:?}")));
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn position_millis(&self) -> i64 {
        if self.loaded.is_none() || self.sink.empty() {
            return NOT_PLAYING;
        }
        i64::try_from(self.sink.get_pos().as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Clock-only backend for machines without an audio device. Positions are
/// relative to the last `play` call, matching simple mixer-style engines.
pub struct NullBackend {
    loaded: Option<PathBuf>,
    playing: bool,
    paused: bool,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    remaining: Option<Duration>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            loaded: None,
            playing: false,
            paused: false,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            remaining: None,
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        position
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackBackend for NullBackend {
    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        self.stop();
        self.track_duration = Self::estimate_duration(path);
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError> {
        if self.loaded.is_none() {
            return Err(BackendError::NotLoaded);
        }
        let start = Duration::try_from_secs_f64(start_offset_seconds.max(0.0))
            .map_err(|err| BackendError::Seek(err.to_string()))?;
        self.playing = true;
        self.paused = false;
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.remaining = self
            .track_duration
            .map(|duration| duration.saturating_sub(start));
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.playing {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn position_millis(&self) -> i64 {
        if !self.playing {
            return NOT_PLAYING;
        }
        let position = self.current_position();
        if let Some(remaining) = self.remaining
            && position >= remaining
        {
            return NOT_PLAYING;
        }
        i64::try_from(position.as_millis()).unwrap_or(i64::MAX)
    }

    fn position_is_relative(&self) -> bool {
        true
    }
}
