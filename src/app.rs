use crate::audio::decode::{SampleDecoder, SymphoniaDecoder};
use crate::audio::{NullBackend, PlaybackBackend, RodioBackend};
use crate::config;
use crate::error::SessionError;
use crate::loader::SampleLoader;
use crate::session::{PlaybackSession, SessionState};
use crate::ui::WaveformView;
use crate::waveform::WaveformSink;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Default, Clone)]
pub struct LaunchOptions {
    pub paths: Vec<PathBuf>,
    pub playlist: Option<PathBuf>,
    pub null_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    OpenCommand,
    Quit,
}

pub fn run(options: LaunchOptions) -> Result<()> {
    let state = config::load_state()?;
    let backend = open_backend(options.null_audio);
    let mut session = PlaybackSession::from_persisted(backend, SymphoniaDecoder::new(), state);

    let loader = match SampleLoader::spawn(SymphoniaDecoder::new()) {
        Ok(loader) => {
            session.set_deferred_preparation(true);
            Some(loader)
        }
        Err(err) => {
            log::warn!("decoding waveforms inline: {err:#}");
            None
        }
    };

    apply_launch_options(&mut session, &options);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let tick_interval = Duration::from_millis(session.tick_interval_ms());
    let mut waveform = WaveformView::new();
    let mut command_mode = false;
    let mut command_buffer = String::new();
    let mut cursor = 0_usize;
    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        sync_loader(&mut session, loader.as_ref());

        if last_tick.elapsed() >= tick_interval {
            if session.state() == SessionState::Playing {
                session.tick(&mut waveform);
                session.dirty = true;
            }
            last_tick = Instant::now();
        }

        if session.dirty {
            terminal.draw(|frame| {
                crate::ui::draw(
                    frame,
                    &session,
                    &waveform,
                    cursor,
                    &command_buffer,
                    command_mode,
                )
            })?;
            session.dirty = false;
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            session.dirty = true;
            continue;
        };

        if key.kind != KeyEventKind::Press {
            continue;
        }

        if command_mode {
            match key.code {
                KeyCode::Esc => {
                    command_mode = false;
                    command_buffer.clear();
                    session.dirty = true;
                }
                KeyCode::Enter => {
                    run_command(&mut session, &command_buffer);
                    command_mode = false;
                    command_buffer.clear();
                    session.dirty = true;
                }
                KeyCode::Backspace => {
                    command_buffer.pop();
                    session.dirty = true;
                }
                KeyCode::Char(ch) => {
                    command_buffer.push(ch);
                    session.dirty = true;
                }
                _ => {}
            }
        } else {
            match handle_key(&mut session, &mut cursor, key) {
                KeyAction::Continue => {}
                KeyAction::OpenCommand => {
                    command_mode = true;
                    session.dirty = true;
                }
                KeyAction::Quit => break Ok(()),
            }
        }

        // Stop and track changes clear the session's window.
        if session.state() != SessionState::Playing {
            waveform.present(session.window());
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    session.stop();
    let save_result = config::save_state(&session.persisted_state());
    result?;
    save_result?;
    Ok(())
}

fn open_backend(null_audio: bool) -> Box<dyn PlaybackBackend> {
    if null_audio {
        log::info!("audio output disabled, using null backend");
        return Box::new(NullBackend::new());
    }
    match RodioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            log::warn!("audio output unavailable, using null backend: {err:#}");
            Box::new(NullBackend::new())
        }
    }
}

fn apply_launch_options<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    options: &LaunchOptions,
) {
    if let Some(playlist) = &options.playlist {
        // Status already carries the failure.
        let _ = session.load_playlist(playlist);
    }
    for path in &options.paths {
        session.add_path(path);
    }
}

/// Hands pending preparation requests to the worker and installs whatever it
/// has finished.
fn sync_loader<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    loader: Option<&SampleLoader>,
) {
    let Some(loader) = loader else {
        return;
    };

    if let Some(ticket) = session.take_pending_preparation()
        && !loader.request(ticket)
    {
        session.set_deferred_preparation(false);
    }

    while let Some(prepared) = loader.try_recv() {
        if session.accept_samples(&prepared.ticket, prepared.store) {
            session.dirty = true;
        }
    }
}

fn handle_key<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    cursor: &mut usize,
    key: KeyEvent,
) -> KeyAction {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyAction::Quit;
        }
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Char(':') => return KeyAction::OpenCommand,
        KeyCode::Char(' ') => {
            let result = session.toggle_play_pause();
            report(session, result);
        }
        KeyCode::Left => {
            let result = session.previous();
            report(session, result);
        }
        KeyCode::Right => {
            let result = session.next();
            report(session, result);
        }
        KeyCode::Up => session.set_volume(session.volume() + VOLUME_STEP),
        KeyCode::Down => session.set_volume(session.volume() - VOLUME_STEP),
        KeyCode::Char('s') => session.stop(),
        KeyCode::Char('z') => {
            session.toggle_shuffle();
        }
        KeyCode::Char('r') => {
            session.cycle_repeat();
        }
        KeyCode::Char('j') | KeyCode::PageDown => {
            let last = session.navigator().len().saturating_sub(1);
            *cursor = (*cursor + 1).min(last);
            session.dirty = true;
        }
        KeyCode::Char('k') | KeyCode::PageUp => {
            *cursor = cursor.saturating_sub(1);
            session.dirty = true;
        }
        KeyCode::Enter => {
            let result = session.play_index(*cursor);
            report(session, result);
        }
        KeyCode::Delete | KeyCode::Char('d') => {
            session.remove_track(*cursor);
            *cursor = (*cursor).min(session.navigator().len().saturating_sub(1));
        }
        KeyCode::Char(digit @ '0'..='9') => {
            let tenths = f64::from(digit.to_digit(10).unwrap_or(0));
            let result = session.seek(tenths / 10.0);
            report(session, result);
        }
        _ => {}
    }
    KeyAction::Continue
}

/// Surfaces command failures in the status line. The session already reports
/// backend and playlist-file failures itself; an empty playlist stays quiet.
fn report<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    result: Result<(), SessionError>,
) {
    match result {
        Ok(()) | Err(SessionError::EmptyPlaylist) => {}
        Err(SessionError::BackendLoad { .. }) | Err(SessionError::PlaylistFile(_)) => {}
        Err(err) => {
            session.status = err.to_string();
            session.dirty = true;
        }
    }
}

fn run_command<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    raw: &str,
) {
    let input = raw.trim();
    if input.is_empty() {
        set_status(session, "No command");
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => set_status(
            session,
            "Commands: add <path> | load <file> | save <file> | clear | play <n> | remove <n> | seek <percent> | volume <percent>",
        ),
        "add" => {
            if rest.is_empty() {
                set_status(session, "Usage: add <path>");
            } else {
                session.add_path(Path::new(rest));
            }
        }
        "load" => {
            if rest.is_empty() {
                set_status(session, "Usage: load <file.json>");
            } else {
                let _ = session.load_playlist(Path::new(rest));
            }
        }
        "save" => {
            if rest.is_empty() {
                set_status(session, "Usage: save <file.json>");
            } else {
                let _ = session.save_playlist(Path::new(rest));
            }
        }
        "clear" => session.clear_playlist(),
        "play" => match parse_position(rest) {
            Some(index) => {
                let result = session.play_index(index);
                report(session, result);
            }
            None => set_status(session, "Usage: play <n>"),
        },
        "remove" => match parse_position(rest) {
            Some(index) => {
                if session.remove_track(index).is_none() {
                    set_status(session, "No such track");
                }
            }
            None => set_status(session, "Usage: remove <n>"),
        },
        "seek" => match parse_percent(rest) {
            Some(percent) => {
                let result = session.seek(percent / 100.0);
                report(session, result);
            }
            None => set_status(session, "Usage: seek <0-100>"),
        },
        "volume" => match parse_percent(rest) {
            Some(percent) => session.set_volume((percent / 100.0) as f32),
            None => set_status(session, "Usage: volume <0-100>"),
        },
        _ => set_status(session, "Unknown command. Use :help"),
    }
}

/// One-based track numbers as typed by the user.
fn parse_position(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

fn parse_percent(raw: &str) -> Option<f64> {
    let value = raw.trim_end_matches('%').parse::<f64>().ok()?;
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

fn set_status<B: PlaybackBackend, D: SampleDecoder>(
    session: &mut PlaybackSession<B, D>,
    message: &str,
) {
    session.status = message.to_string();
    session.dirty = true;
}
