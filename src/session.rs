use crate::audio::PlaybackBackend;
use crate::audio::decode::SampleDecoder;
use crate::clock::{ClockReading, TransportClock, TransportState};
use crate::error::{BackendError, SessionError};
use crate::library;
use crate::model::{Direction, PersistedState, RepeatMode, Track};
use crate::playlist::PlaylistNavigator;
use crate::samples::SampleStore;
use crate::waveform::{self, WaveformSink, WaveformWindow};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Loading => "Loading",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

/// Identifies one sample-preparation request. Only the ticket from the most
/// recent track change is accepted back.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareTicket {
    generation: u64,
    track: Track,
}

impl PrepareTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing was asked of the backend.
    Idle,
    Position(TransportState),
    /// The previous track ended and playback moved to this index.
    TrackChanged(usize),
    Stopped,
}

pub struct PlaybackSession<B: PlaybackBackend, D: SampleDecoder> {
    backend: B,
    decoder: D,
    navigator: PlaylistNavigator,
    samples: SampleStore,
    clock: TransportClock,
    transport: TransportState,
    window: WaveformWindow,
    state: SessionState,
    intended_playing: bool,
    generation: u64,
    defer_preparation: bool,
    pending: Option<PrepareTicket>,
    volume: f32,
    half_width_seconds: f64,
    tick_interval_ms: u64,
    pub status: String,
    pub dirty: bool,
}

impl<B: PlaybackBackend, D: SampleDecoder> PlaybackSession<B, D> {
    pub fn new(backend: B, decoder: D) -> Self {
        Self::from_persisted(backend, decoder, PersistedState::default())
    }

    pub fn from_persisted(backend: B, decoder: D, state: PersistedState) -> Self {
        Self::with_navigator(backend, decoder, state, PlaylistNavigator::new())
    }

    /// Like [`Self::from_persisted`] but with a caller-supplied navigator, so
    /// shuffle order can be made reproducible.
    pub fn with_navigator(
        backend: B,
        decoder: D,
        state: PersistedState,
        mut navigator: PlaylistNavigator,
    ) -> Self {
        navigator.repeat_mode = state.repeat_mode;
        navigator.shuffle_enabled = state.shuffle_enabled;
        navigator.replace(
            state
                .last_playlist
                .into_iter()
                .map(Track::from_location)
                .collect(),
        );

        let mut session = Self {
            backend,
            decoder,
            navigator,
            samples: SampleStore::empty(),
            clock: TransportClock::new(None),
            transport: TransportState::stopped(),
            window: WaveformWindow::zeroed(),
            state: SessionState::Idle,
            intended_playing: false,
            generation: 0,
            defer_preparation: false,
            pending: None,
            volume: 0.0,
            half_width_seconds: state.wave_half_width_seconds,
            tick_interval_ms: state.tick_interval_ms,
            status: String::from("Ready"),
            dirty: true,
        };
        session.apply_volume(state.volume);
        session
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            volume: self.volume,
            repeat_mode: self.navigator.repeat_mode,
            shuffle_enabled: self.navigator.shuffle_enabled,
            tick_interval_ms: self.tick_interval_ms,
            wave_half_width_seconds: self.half_width_seconds,
            last_playlist: self.navigator.locations(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn window(&self) -> &WaveformWindow {
        &self.window
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn navigator(&self) -> &PlaylistNavigator {
        &self.navigator
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.navigator.current()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.clock.duration_seconds()
    }

    pub fn desync_count(&self) -> u32 {
        self.clock.desync_count()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    pub fn is_intended_playing(&self) -> bool {
        self.intended_playing
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// When enabled, track changes leave sample preparation to the caller via
    /// [`Self::take_pending_preparation`] instead of decoding inline.
    pub fn set_deferred_preparation(&mut self, enabled: bool) {
        self.defer_preparation = enabled;
    }

    pub fn take_pending_preparation(&mut self) -> Option<PrepareTicket> {
        self.pending.take()
    }

    pub fn play_index(&mut self, index: usize) -> Result<(), SessionError> {
        self.select_for_play(index)?;
        self.start_selected(self.defer_preparation)
    }

    pub fn play_index_deferred(&mut self, index: usize) -> Result<PrepareTicket, SessionError> {
        self.select_for_play(index)?;
        self.start_selected(true)?;
        self.pending.take().ok_or(SessionError::NoSuchTrack(index))
    }

    /// Installs samples prepared elsewhere. Returns false for a ticket that
    /// has been overtaken by a later track change.
    pub fn accept_samples(&mut self, ticket: &PrepareTicket, store: SampleStore) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding samples for {} (generation {} != {})",
                ticket.track.location,
                ticket.generation,
                self.generation
            );
            return false;
        }
        if self.pending.as_ref() == Some(ticket) {
            self.pending = None;
        }
        self.install_samples(store);
        true
    }

    /// Plays the selected track, or the first one when nothing is selected.
    pub fn play(&mut self) -> Result<(), SessionError> {
        if self.navigator.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }
        let index = self.navigator.current_index().unwrap_or(0);
        self.play_index(index)
    }

    pub fn pause(&mut self) {
        if self.state != SessionState::Playing {
            return;
        }
        self.backend.pause();
        self.state = SessionState::Paused;
        self.intended_playing = false;
        self.transport.is_playing = false;
        self.set_status("Paused");
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused => {
                self.backend.resume();
                self.state = SessionState::Playing;
                self.intended_playing = true;
                self.transport.is_playing = true;
                self.set_status("Resumed");
                Ok(())
            }
            SessionState::Playing | SessionState::Loading => Ok(()),
            SessionState::Idle | SessionState::Stopped => self.play(),
        }
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Playing {
            self.pause();
            Ok(())
        } else {
            self.resume()
        }
    }

    pub fn stop(&mut self) {
        self.backend.stop();
        self.halt();
        self.set_status("Stopped");
    }

    /// Polls the backend once. While playing this either hands a fresh
    /// waveform window to `sink` or handles the end of the current track.
    pub fn tick(&mut self, sink: &mut dyn WaveformSink) -> TickOutcome {
        if self.state != SessionState::Playing {
            return TickOutcome::Idle;
        }

        match self.clock.tick(&self.backend) {
            ClockReading::Position(transport) => {
                self.transport = transport;
                self.window = waveform::window(
                    &self.samples,
                    transport.elapsed_seconds,
                    self.half_width_seconds,
                );
                sink.present(&self.window);
                TickOutcome::Position(transport)
            }
            ClockReading::EndOfTrack if self.intended_playing => self.handle_end_of_track(),
            ClockReading::EndOfTrack => {
                self.halt();
                TickOutcome::Stopped
            }
        }
    }

    pub fn seek(&mut self, fraction: f64) -> Result<(), SessionError> {
        let Some(duration) = self.clock.duration_seconds() else {
            return Err(SessionError::SeekUnavailable);
        };
        let Some(track) = self.navigator.current().cloned() else {
            return Err(SessionError::SeekUnavailable);
        };
        if !fraction.is_finite() {
            return Err(SessionError::SeekUnavailable);
        }

        let target = fraction.clamp(0.0, 1.0) * duration;
        if let Err(err) = self.backend.play(target) {
            log::warn!("seek to {target:.2}s failed ({err}), reloading {}", track.location);
            if let Err(source) = self.load_and_play(track.path(), target) {
                return Err(self.fail_track(&track, source));
            }
        }

        self.clock.rebase(target);
        self.transport = TransportState {
            elapsed_seconds: target,
            is_playing: true,
        };
        self.window = waveform::window(&self.samples, target, self.half_width_seconds);
        self.state = SessionState::Playing;
        self.intended_playing = true;
        self.set_status(&format!("Seek to {}", format_clock(target)));
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.apply_volume(volume);
        self.set_status(&format!("Volume {}%", (self.volume * 100.0).round() as u32));
    }

    pub fn next(&mut self) -> Result<(), SessionError> {
        self.step(Direction::Next)
    }

    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.step(Direction::Previous)
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let enabled = self.navigator.toggle_shuffle();
        self.set_status(if enabled { "Shuffle on" } else { "Shuffle off" });
        enabled
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        let mode = self.navigator.cycle_repeat();
        self.set_status(mode.label());
        mode
    }

    /// Enqueues a single media file or everything playable under a folder.
    pub fn add_path(&mut self, path: &Path) -> usize {
        if path.is_dir() {
            return self.add_folder(path);
        }
        let found = library::tracks_for_path(path);
        if found.is_empty() {
            self.set_status(&format!("Unsupported file: {}", path.display()));
            return 0;
        }
        self.enqueue(found)
    }

    pub fn add_folder(&mut self, folder: &Path) -> usize {
        let found = library::scan_folder(folder);
        if found.is_empty() {
            self.set_status(&format!("No media found in {}", folder.display()));
            return 0;
        }
        self.enqueue(found)
    }

    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        let was_current = self.navigator.current_index() == Some(index);
        let removed = self.navigator.remove(index)?;
        if was_current {
            self.backend.stop();
            self.halt();
            self.invalidate_preparation();
        }
        self.set_status(&format!("Removed {}", removed.display_name()));
        Some(removed)
    }

    pub fn clear_playlist(&mut self) {
        self.backend.stop();
        self.halt();
        self.navigator.clear();
        self.invalidate_preparation();
        self.set_status("Playlist cleared");
    }

    /// Replaces the playlist with the file's contents. Playback stops.
    pub fn load_playlist(&mut self, file: &Path) -> Result<usize, SessionError> {
        let tracks = match library::load_playlist_file(file) {
            Ok(tracks) => tracks,
            Err(err) => {
                self.set_status(&format!("Failed to load playlist: {err}"));
                return Err(err.into());
            }
        };
        let count = tracks.len();

        self.backend.stop();
        self.halt();
        self.navigator.replace(tracks);
        self.invalidate_preparation();
        log::info!("loaded {count} tracks from {}", file.display());
        self.set_status(&format!("Loaded {count} tracks"));
        Ok(count)
    }

    pub fn save_playlist(&mut self, file: &Path) -> Result<(), SessionError> {
        if let Err(err) = library::save_playlist_file(file, &self.navigator.locations()) {
            self.set_status(&format!("Failed to save playlist: {err}"));
            return Err(err.into());
        }
        self.set_status(&format!("Saved playlist to {}", file.display()));
        Ok(())
    }

    fn step(&mut self, direction: Direction) -> Result<(), SessionError> {
        if self.navigator.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }
        match self.navigator.advance(direction) {
            Some(index) => self.play_index(index),
            None => {
                self.set_status(match direction {
                    Direction::Next => "End of playlist",
                    Direction::Previous => "Start of playlist",
                });
                Ok(())
            }
        }
    }

    fn handle_end_of_track(&mut self) -> TickOutcome {
        let target = match self.navigator.repeat_mode {
            RepeatMode::One => self
                .navigator
                .current_index()
                .or_else(|| self.navigator.advance(Direction::Next)),
            RepeatMode::All | RepeatMode::None => self.navigator.advance(Direction::Next),
        };

        let Some(index) = target else {
            self.halt();
            self.set_status("Playlist finished");
            return TickOutcome::Stopped;
        };

        match self.play_index(index) {
            Ok(()) => TickOutcome::TrackChanged(index),
            Err(_) => TickOutcome::Stopped,
        }
    }

    fn select_for_play(&mut self, index: usize) -> Result<(), SessionError> {
        if self.navigator.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }
        if !self.navigator.select(index) {
            return Err(SessionError::NoSuchTrack(index));
        }
        Ok(())
    }

    fn start_selected(&mut self, defer: bool) -> Result<(), SessionError> {
        let Some(track) = self.navigator.current().cloned() else {
            return Err(SessionError::EmptyPlaylist);
        };

        self.state = SessionState::Loading;
        self.generation = self.generation.wrapping_add(1);
        self.transport = TransportState::stopped();
        self.window = WaveformWindow::zeroed();
        self.clock.reset();
        self.pending = None;

        if defer {
            self.install_samples(SampleStore::empty());
            self.pending = Some(PrepareTicket {
                generation: self.generation,
                track: track.clone(),
            });
        } else {
            self.install_samples(SampleStore::prepare(&track, &self.decoder));
        }

        if let Err(source) = self.load_and_play(track.path(), 0.0) {
            return Err(self.fail_track(&track, source));
        }

        self.state = SessionState::Playing;
        self.intended_playing = true;
        log::info!("playing {} ({:?})", track.location, track.media_kind);
        self.set_status(&format!("Playing {}", track.display_name()));
        Ok(())
    }

    fn load_and_play(&mut self, path: &Path, offset_seconds: f64) -> Result<(), BackendError> {
        self.backend.load(path)?;
        self.backend.play(offset_seconds)
    }

    fn install_samples(&mut self, store: SampleStore) {
        let duration = store.duration_seconds();
        self.samples = store;
        self.clock.set_duration(Some(duration));
    }

    fn fail_track(&mut self, track: &Track, source: BackendError) -> SessionError {
        log::warn!("unable to play {}: {source}", track.location);
        self.backend.stop();
        self.pending = None;
        self.halt();
        self.set_status(&format!("Unable to play {}: {source}", track.display_name()));
        SessionError::BackendLoad {
            path: track.path().to_path_buf(),
            source,
        }
    }

    /// Drops the prepared track's samples and turns any outstanding ticket
    /// stale, for when the playing track leaves the playlist.
    fn invalidate_preparation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
        self.samples = SampleStore::empty();
        self.clock.set_duration(None);
    }

    fn halt(&mut self) {
        self.state = SessionState::Stopped;
        self.intended_playing = false;
        self.transport = TransportState::stopped();
        self.window = WaveformWindow::zeroed();
        self.clock.reset();
    }

    fn apply_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.volume);
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

/// `m:ss` for positions and durations shown to the user.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0) as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NOT_PLAYING;
    use crate::audio::decode::DecodedAudio;
    use crate::error::DecodeError;
    use crate::model::MediaKind;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Vec<String>,
        loaded: bool,
        position: i64,
        volume: f32,
        fail_load_for: Option<String>,
        fail_next_seek: bool,
        fail_every_seek: bool,
    }

    impl PlaybackBackend for RecordingBackend {
        fn load(&mut self, path: &Path) -> Result<(), BackendError> {
            let location = path.to_string_lossy().to_string();
            self.calls.push(format!("load {location}"));
            if self.fail_load_for.as_deref() == Some(location.as_str()) {
                return Err(BackendError::Load {
                    path: path.to_path_buf(),
                    reason: String::from("corrupt"),
                });
            }
            self.loaded = true;
            Ok(())
        }

        fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError> {
            self.calls.push(format!("play {start_offset_seconds:.3}"));
            if !self.loaded {
                return Err(BackendError::NotLoaded);
            }
            if start_offset_seconds > 0.0 && (self.fail_next_seek || self.fail_every_seek) {
                self.fail_next_seek = false;
                return Err(BackendError::Seek(String::from("not seekable")));
            }
            self.position = (start_offset_seconds * 1_000.0) as i64;
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.push(String::from("pause"));
        }

        fn resume(&mut self) {
            self.calls.push(String::from("resume"));
        }

        fn stop(&mut self) {
            self.calls.push(String::from("stop"));
            self.position = NOT_PLAYING;
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn position_millis(&self) -> i64 {
            self.position
        }
    }

    /// Ten seconds of a square wave at 1 kHz, 16-bit mono.
    struct ToneDecoder;

    impl SampleDecoder for ToneDecoder {
        fn decode(&self, _path: &Path) -> Result<DecodedAudio, DecodeError> {
            Ok(DecodedAudio {
                channel_count: 1,
                sample_width_bits: 16,
                sample_rate: 1_000,
                raw_samples: (0..10_000)
                    .map(|idx| if idx % 2 == 0 { 16_000 } else { -16_000 })
                    .collect(),
            })
        }
    }

    struct BrokenDecoder;

    impl SampleDecoder for BrokenDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
            Err(DecodeError::NoAudio(path.to_path_buf()))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: usize,
        last: Option<WaveformWindow>,
    }

    impl WaveformSink for CountingSink {
        fn present(&mut self, window: &WaveformWindow) {
            self.frames += 1;
            self.last = Some(*window);
        }
    }

    fn session_with(names: &[&str]) -> PlaybackSession<RecordingBackend, ToneDecoder> {
        let state = PersistedState {
            last_playlist: names.iter().map(|name| name.to_string()).collect(),
            ..PersistedState::default()
        };
        PlaybackSession::with_navigator(
            RecordingBackend::default(),
            ToneDecoder,
            state,
            PlaylistNavigator::seeded(5),
        )
    }

    #[test]
    fn restores_persisted_settings() {
        let session = session_with(&["a.mp3", "b.mkv"]);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.volume(), 0.7);
        assert_eq!(session.backend().volume, 0.7);
        assert_eq!(session.navigator().len(), 2);
        assert_eq!(session.navigator().tracks()[1].media_kind, MediaKind::Video);
        assert!(session.window().is_silent());
    }

    #[test]
    fn play_index_loads_and_starts_from_zero() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(1).expect("play");

        assert_eq!(session.state(), SessionState::Playing);
        assert!(session.is_intended_playing());
        assert_eq!(session.backend().calls, vec!["load b.mp3", "play 0.000"]);
        assert_eq!(session.duration_seconds(), Some(10.0));
        assert_eq!(session.status, "Playing b.mp3");
    }

    #[test]
    fn play_on_empty_playlist_is_a_no_op() {
        let mut session = session_with(&[]);
        assert!(matches!(session.play(), Err(SessionError::EmptyPlaylist)));
        assert!(matches!(session.next(), Err(SessionError::EmptyPlaylist)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.backend().calls.is_empty());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut session = session_with(&["a.mp3"]);
        assert!(matches!(
            session.play_index(3),
            Err(SessionError::NoSuchTrack(3))
        ));
    }

    #[test]
    fn play_without_selection_starts_first_track() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play().expect("play");
        assert_eq!(session.navigator().current_index(), Some(0));
    }

    #[test]
    fn tick_hands_window_to_sink() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().position = 5_000;

        let mut sink = CountingSink::default();
        let outcome = session.tick(&mut sink);

        let TickOutcome::Position(transport) = outcome else {
            panic!("expected a position, got {outcome:?}");
        };
        assert_eq!(transport.elapsed_seconds, 5.0);
        assert!(transport.is_playing);
        assert_eq!(sink.frames, 1);
        let presented = sink.last.expect("window");
        assert!((presented.peak() - 1.0).abs() < 1e-6);
        assert_eq!(&presented, session.window());
    }

    #[test]
    fn tick_is_idle_unless_playing() {
        let mut session = session_with(&["a.mp3"]);
        let mut sink = CountingSink::default();
        assert_eq!(session.tick(&mut sink), TickOutcome::Idle);

        session.play_index(0).expect("play");
        session.pause();
        assert_eq!(session.tick(&mut sink), TickOutcome::Idle);
        assert_eq!(sink.frames, 0);
    }

    #[test]
    fn repeat_one_replays_the_same_track() {
        let mut session = session_with(&["a.mp3", "b.mp3", "c.mp3"]);
        session.cycle_repeat();
        assert_eq!(session.cycle_repeat(), RepeatMode::One);
        session.play_index(1).expect("play");
        session.backend_mut().calls.clear();
        session.backend_mut().position = NOT_PLAYING;

        let outcome = session.tick(&mut CountingSink::default());

        assert_eq!(outcome, TickOutcome::TrackChanged(1));
        assert_eq!(session.backend().calls, vec!["load b.mp3", "play 0.000"]);
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn end_of_track_without_repeat_moves_on() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().position = NOT_PLAYING;

        assert_eq!(
            session.tick(&mut CountingSink::default()),
            TickOutcome::TrackChanged(1)
        );
        assert_eq!(session.current_track().map(|t| t.location.as_str()), Some("b.mp3"));
    }

    #[test]
    fn end_of_last_track_stops() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(1).expect("play");
        session.backend_mut().position = 4_000;
        session.tick(&mut CountingSink::default());
        session.backend_mut().position = NOT_PLAYING;

        assert_eq!(session.tick(&mut CountingSink::default()), TickOutcome::Stopped);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_intended_playing());
        assert!(session.window().is_silent());
        assert_eq!(session.transport(), TransportState::stopped());
    }

    #[test]
    fn end_of_last_track_wraps_with_repeat_all() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.cycle_repeat();
        session.play_index(1).expect("play");
        session.backend_mut().position = NOT_PLAYING;
        assert_eq!(
            session.tick(&mut CountingSink::default()),
            TickOutcome::TrackChanged(0)
        );
    }

    #[test]
    fn backend_load_error_leaves_session_stopped() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.backend_mut().fail_load_for = Some(String::from("b.mp3"));

        let err = session.play_index(1).expect_err("load should fail");
        match err {
            SessionError::BackendLoad { path, .. } => assert_eq!(path, Path::new("b.mp3")),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_intended_playing());
        assert!(session.status.contains("Unable to play b.mp3"));
    }

    #[test]
    fn failed_auto_advance_stops() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.backend_mut().fail_load_for = Some(String::from("b.mp3"));
        session.play_index(0).expect("play");
        session.backend_mut().position = NOT_PLAYING;

        assert_eq!(session.tick(&mut CountingSink::default()), TickOutcome::Stopped);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn seek_falls_back_to_reload() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().fail_next_seek = true;
        session.backend_mut().calls.clear();

        session.seek(0.5).expect("seek");

        assert_eq!(
            session.backend().calls,
            vec!["play 5.000", "load a.mp3", "play 5.000"]
        );
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.transport().elapsed_seconds, 5.0);
    }

    #[test]
    fn failed_seek_reload_silences_the_backend() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().fail_every_seek = true;
        session.backend_mut().calls.clear();

        let err = session.seek(0.5).expect_err("reload fails too");
        assert!(matches!(err, SessionError::BackendLoad { .. }));
        assert_eq!(
            session.backend().calls,
            vec!["play 5.000", "load a.mp3", "play 5.000", "stop"]
        );
        assert_eq!(session.backend().position_millis(), NOT_PLAYING);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.tick(&mut CountingSink::default()), TickOutcome::Idle);
    }

    #[test]
    fn failed_load_stops_the_backend() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().fail_load_for = Some(String::from("b.mp3"));

        session.play_index(1).expect_err("load should fail");
        assert_eq!(session.backend().calls.last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn seek_from_pause_resumes_playing() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");
        session.pause();
        session.seek(0.25).expect("seek");
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.backend().position, 2_500);
    }

    #[test]
    fn seek_needs_a_known_duration() {
        let mut session = PlaybackSession::from_persisted(
            RecordingBackend::default(),
            BrokenDecoder,
            PersistedState {
                last_playlist: vec![String::from("a.mp3")],
                ..PersistedState::default()
            },
        );
        session.play_index(0).expect("playback works without samples");
        assert!(session.samples().is_empty());
        assert!(matches!(session.seek(0.5), Err(SessionError::SeekUnavailable)));
    }

    #[test]
    fn stale_deferred_samples_are_discarded() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        let first = session.play_index_deferred(0).expect("first");
        let second = session.play_index_deferred(1).expect("second");
        assert!(session.samples().is_empty());
        assert_eq!(second.track().location, "b.mp3");

        let ready = SampleStore::from_amplitudes(vec![0.5; 4_000], 4.0);
        assert!(!session.accept_samples(&first, ready.clone()));
        assert!(session.samples().is_empty());

        assert!(session.accept_samples(&second, ready));
        assert_eq!(session.samples().len(), 4_000);
        assert_eq!(session.duration_seconds(), Some(4.0));
    }

    #[test]
    fn samples_for_a_track_that_left_the_playlist_are_discarded() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("list.json");
        let ready = SampleStore::from_amplitudes(vec![0.5; 1_000], 10.0);

        let mut session = session_with(&["a.mp3", "b.mp3"]);
        let cleared = session.play_index_deferred(0).expect("ticket");
        session.clear_playlist();
        assert!(!session.accept_samples(&cleared, ready.clone()));
        assert!(session.samples().is_empty());
        assert_eq!(session.duration_seconds(), None);

        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.save_playlist(&file).expect("save");
        let replaced = session.play_index_deferred(1).expect("ticket");
        session.load_playlist(&file).expect("load");
        assert!(!session.accept_samples(&replaced, ready.clone()));
        assert_eq!(session.duration_seconds(), None);

        let mut session = session_with(&["a.mp3", "b.mp3"]);
        let removed = session.play_index_deferred(1).expect("ticket");
        session.remove_track(1).expect("removed");
        assert!(session.take_pending_preparation().is_none());
        assert!(!session.accept_samples(&removed, ready));
        assert!(session.samples().is_empty());
        assert_eq!(session.current_track(), None);
    }

    #[test]
    fn removing_another_track_keeps_the_ticket_valid() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        let ticket = session.play_index_deferred(1).expect("ticket");
        session.remove_track(0).expect("removed");

        let ready = SampleStore::from_amplitudes(vec![0.5; 1_000], 10.0);
        assert!(session.accept_samples(&ticket, ready));
        assert_eq!(session.duration_seconds(), Some(10.0));
        assert_eq!(session.current_track().map(|t| t.location.as_str()), Some("b.mp3"));
    }

    #[test]
    fn deferred_mode_queues_a_ticket_per_track_change() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.set_deferred_preparation(true);
        session.next().expect("next");

        let ticket = session.take_pending_preparation().expect("ticket");
        assert_eq!(ticket.track().location, "a.mp3");
        assert!(session.take_pending_preparation().is_none());
        assert!(session.samples().is_empty());
    }

    #[test]
    fn stop_zeroes_transport_and_window() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().position = 3_000;
        session.tick(&mut CountingSink::default());
        assert!(!session.window().is_silent());

        session.stop();

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.window().is_silent());
        assert_eq!(session.transport(), TransportState::stopped());
        assert_eq!(session.backend().calls.last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn pause_and_resume_use_the_backend() {
        let mut session = session_with(&["a.mp3"]);
        session.play_index(0).expect("play");

        session.toggle_play_pause().expect("pause");
        assert_eq!(session.state(), SessionState::Paused);
        session.toggle_play_pause().expect("resume");
        assert_eq!(session.state(), SessionState::Playing);

        let calls = &session.backend().calls;
        assert_eq!(&calls[calls.len() - 2..], ["pause", "resume"]);
    }

    #[test]
    fn resume_after_stop_restarts_selection() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(1).expect("play");
        session.stop();
        session.resume().expect("resume");
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.current_track().map(|t| t.location.as_str()), Some("b.mp3"));
    }

    #[test]
    fn volume_is_clamped() {
        let mut session = session_with(&[]);
        session.set_volume(1.7);
        assert_eq!(session.volume(), 1.0);
        assert_eq!(session.backend().volume, 1.0);

        session.set_volume(-0.2);
        assert_eq!(session.volume(), 0.0);

        session.set_volume(f32::NAN);
        assert_eq!(session.volume(), 0.0);
    }

    #[test]
    fn previous_at_start_without_repeat_stays_put() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(0).expect("play");
        session.backend_mut().calls.clear();

        session.previous().expect("previous");
        assert!(session.backend().calls.is_empty());
        assert_eq!(session.status, "Start of playlist");
    }

    #[test]
    fn removing_the_playing_track_stops() {
        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.play_index(1).expect("play");
        let removed = session.remove_track(1).expect("removed");
        assert_eq!(removed.location, "b.mp3");
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.navigator().current_index(), None);
    }

    #[test]
    fn playlist_file_replaces_tracks_and_stops() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("list.json");

        let mut session = session_with(&["a.mp3", "b.mp3"]);
        session.save_playlist(&file).expect("save");
        assert_eq!(
            std::fs::read_to_string(&file).expect("read"),
            r#"["a.mp3", "b.mp3"]"#
        );

        session.clear_playlist();
        assert!(session.navigator().is_empty());

        session.play_index(0).expect_err("nothing to play");
        assert_eq!(session.load_playlist(&file).expect("load"), 2);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.navigator().current_index(), None);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            session.load_playlist(&missing),
            Err(SessionError::PlaylistFile(_))
        ));
        assert_eq!(session.navigator().len(), 2);
    }

    #[test]
    fn persisted_state_reflects_session() {
        let mut session = session_with(&["a.mp3"]);
        session.toggle_shuffle();
        session.cycle_repeat();
        session.set_volume(0.25);

        let state = session.persisted_state();
        assert!(state.shuffle_enabled);
        assert_eq!(state.repeat_mode, RepeatMode::All);
        assert_eq!(state.volume, 0.25);
        assert_eq!(state.last_playlist, vec![String::from("a.mp3")]);
    }

    #[test]
    fn clock_format_is_minutes_and_seconds() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(65.9), "1:05");
        assert_eq!(format_clock(-3.0), "0:00");
        assert_eq!(format_clock(f64::NAN), "0:00");
    }
}
