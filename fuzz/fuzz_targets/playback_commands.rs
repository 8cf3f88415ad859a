#![no_main]

use libfuzzer_sys::fuzz_target;
use wavedeck::audio::NullBackend;
use wavedeck::audio::decode::SymphoniaDecoder;
use wavedeck::model::PersistedState;
use wavedeck::playlist::PlaylistNavigator;
use wavedeck::session::PlaybackSession;
use wavedeck::waveform::{WaveformSink, WaveformWindow};

struct Discard;

impl WaveformSink for Discard {
    fn present(&mut self, _window: &WaveformWindow) {}
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, commands)) = data.split_first() else {
        return;
    };

    let state = PersistedState {
        last_playlist: (0..usize::from(first % 16))
            .map(|idx| format!("missing_{idx}.mp3"))
            .collect(),
        ..PersistedState::default()
    };
    let mut session = PlaybackSession::with_navigator(
        NullBackend::new(),
        SymphoniaDecoder::new(),
        state,
        PlaylistNavigator::seeded(u64::from(first)),
    );

    for byte in commands {
        let arg = usize::from(byte >> 4);
        let _ = match byte % 12 {
            0 => session.play_index(arg),
            1 => session.next(),
            2 => session.previous(),
            3 => session.toggle_play_pause(),
            4 => session.seek(f64::from(byte >> 4) / 15.0),
            5 => {
                session.stop();
                Ok(())
            }
            6 => {
                session.toggle_shuffle();
                Ok(())
            }
            7 => {
                session.cycle_repeat();
                Ok(())
            }
            8 => {
                session.set_volume(f32::from(byte >> 4) / 10.0);
                Ok(())
            }
            9 => {
                session.remove_track(arg);
                Ok(())
            }
            10 => {
                let _ = session.tick(&mut Discard);
                Ok(())
            }
            _ => {
                let _ = session.play_index_deferred(arg);
                Ok(())
            }
        };

        if let Some(index) = session.navigator().current_index() {
            assert!(index < session.navigator().len());
        }
        assert!((0.0..=1.0).contains(&session.volume()));
        assert!(
            session
                .window()
                .samples()
                .iter()
                .all(|value| (0.0..=1.0).contains(value))
        );
    }
});
