use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use wavedeck::audio::decode::SymphoniaDecoder;
use wavedeck::audio::{NOT_PLAYING, PlaybackBackend};
use wavedeck::error::BackendError;
use wavedeck::loader::SampleLoader;
use wavedeck::model::{PersistedState, RepeatMode};
use wavedeck::playlist::PlaylistNavigator;
use wavedeck::session::{PlaybackSession, SessionState, TickOutcome};
use wavedeck::waveform::{VIEWPORT_N, WaveformSink, WaveformWindow};

#[derive(Default)]
struct ScriptedBackend {
    loads: Vec<String>,
    position: i64,
    loaded: bool,
}

impl PlaybackBackend for ScriptedBackend {
    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        self.loads.push(
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self, start_offset_seconds: f64) -> Result<(), BackendError> {
        if !self.loaded {
            return Err(BackendError::NotLoaded);
        }
        self.position = (start_offset_seconds * 1_000.0) as i64;
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {
        self.position = NOT_PLAYING;
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn position_millis(&self) -> i64 {
        self.position
    }
}

#[derive(Default)]
struct Frames(Vec<WaveformWindow>);

impl WaveformSink for Frames {
    fn present(&mut self, window: &WaveformWindow) {
        self.0.push(*window);
    }
}

fn write_tone_wav(path: &Path, sample_rate: u32, seconds: u32) {
    let frames = sample_rate * seconds;
    let data_size = frames * 2;
    let mut bytes = Vec::with_capacity(44 + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for idx in 0..frames {
        let value: i16 = if idx % 4 < 2 { 12_000 } else { -12_000 };
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes).expect("wav fixture");
}

fn session_for(
    folder: &Path,
) -> PlaybackSession<ScriptedBackend, SymphoniaDecoder> {
    let mut session = PlaybackSession::with_navigator(
        ScriptedBackend::default(),
        SymphoniaDecoder::new(),
        PersistedState::default(),
        PlaylistNavigator::seeded(42),
    );
    assert_eq!(session.add_folder(folder), 2);
    session
}

#[test]
fn folder_playback_runs_through_the_playlist() {
    let dir = tempdir().expect("tempdir");
    write_tone_wav(&dir.path().join("01-first.wav"), 8_000, 2);
    write_tone_wav(&dir.path().join("02-second.wav"), 8_000, 1);
    fs::write(dir.path().join("cover.jpg"), b"not media").expect("write");

    let mut session = session_for(dir.path());
    session.play().expect("play");
    assert_eq!(session.duration_seconds(), Some(2.0));
    assert_eq!(session.samples().len(), 16_000);

    let mut frames = Frames::default();
    session.backend_mut().position = 1_000;
    assert!(matches!(session.tick(&mut frames), TickOutcome::Position(_)));
    let window = frames.0.last().expect("window");
    assert_eq!(window.samples().len(), VIEWPORT_N);
    assert!((window.peak() - 1.0).abs() < 1e-6);

    session.backend_mut().position = NOT_PLAYING;
    assert_eq!(session.tick(&mut frames), TickOutcome::TrackChanged(1));
    assert_eq!(session.duration_seconds(), Some(1.0));

    session.backend_mut().position = NOT_PLAYING;
    assert_eq!(session.tick(&mut frames), TickOutcome::Stopped);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.window().is_silent());
    assert_eq!(
        session.backend().loads,
        vec!["01-first.wav", "02-second.wav"]
    );
}

#[test]
fn repeat_one_reloads_the_same_track_on_end_signal() {
    let dir = tempdir().expect("tempdir");
    write_tone_wav(&dir.path().join("a.wav"), 8_000, 1);
    write_tone_wav(&dir.path().join("b.wav"), 8_000, 1);

    let mut session = session_for(dir.path());
    session.cycle_repeat();
    assert_eq!(session.cycle_repeat(), RepeatMode::One);
    session.play_index(0).expect("play");

    session.backend_mut().position = NOT_PLAYING;
    assert_eq!(
        session.tick(&mut Frames::default()),
        TickOutcome::TrackChanged(0)
    );
    assert_eq!(session.backend().loads, vec!["a.wav", "a.wav"]);
}

#[test]
fn seek_moves_the_waveform_and_the_clock() {
    let dir = tempdir().expect("tempdir");
    write_tone_wav(&dir.path().join("a.wav"), 8_000, 2);
    write_tone_wav(&dir.path().join("b.wav"), 8_000, 2);

    let mut session = session_for(dir.path());
    session.play_index(0).expect("play");
    session.seek(0.75).expect("seek");
    assert_eq!(session.transport().elapsed_seconds, 1.5);
    assert_eq!(session.backend().position, 1_500);
    assert!(!session.window().is_silent());
}

#[test]
fn playlist_file_survives_a_restart() {
    let dir = tempdir().expect("tempdir");
    let media = dir.path().join("media");
    fs::create_dir(&media).expect("mkdir");
    write_tone_wav(&media.join("a.wav"), 8_000, 1);
    write_tone_wav(&media.join("b.wav"), 8_000, 1);
    let list = dir.path().join("list.json");

    let mut session = session_for(&media);
    session.save_playlist(&list).expect("save");
    let saved = session.persisted_state();

    let raw = fs::read_to_string(&list).expect("read");
    assert!(raw.starts_with("[\"") && raw.contains("\", \""));

    let mut restored = PlaybackSession::from_persisted(
        ScriptedBackend::default(),
        SymphoniaDecoder::new(),
        PersistedState::default(),
    );
    assert_eq!(restored.load_playlist(&list).expect("load"), 2);
    assert_eq!(restored.navigator().locations(), saved.last_playlist);
}

#[test]
fn background_loader_feeds_the_session() {
    let dir = tempdir().expect("tempdir");
    write_tone_wav(&dir.path().join("a.wav"), 8_000, 2);
    write_tone_wav(&dir.path().join("b.wav"), 8_000, 1);

    let loader = SampleLoader::spawn(SymphoniaDecoder::new()).expect("spawn");
    let mut session = session_for(dir.path());
    let stale = session.play_index_deferred(0).expect("first ticket");
    let current = session.play_index_deferred(1).expect("second ticket");

    assert!(loader.request(stale.clone()));
    assert!(loader.request(current.clone()));

    let mut accepted = false;
    for _ in 0..500 {
        if let Some(prepared) = loader.try_recv() {
            accepted |= session.accept_samples(&prepared.ticket, prepared.store);
            if accepted {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(accepted);
    assert_eq!(session.duration_seconds(), Some(1.0));
    assert!(!session.accept_samples(&stale, session.samples().clone()));
}
