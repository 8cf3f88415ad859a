use crate::audio::PlaybackBackend;
use crate::audio::decode::SampleDecoder;
use crate::model::MediaKind;
use crate::session::{PlaybackSession, SessionState, format_clock};
use crate::waveform::{VIEWPORT_N, WaveformSink, WaveformWindow};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Sparkline};

const APP_TITLE_WITH_VERSION: &str = "wavedeck v0.1.0  ";
const SPARKLINE_MAX: u64 = 100;

/// Terminal-side copy of the latest waveform window, pre-scaled for
/// [`Sparkline`].
#[derive(Debug, Clone)]
pub struct WaveformView {
    bars: Vec<u64>,
}

impl WaveformView {
    pub fn new() -> Self {
        Self {
            bars: vec![0; VIEWPORT_N],
        }
    }

    pub fn bars(&self) -> &[u64] {
        &self.bars
    }

    /// Picks `width` evenly spaced bars so the whole window fits the panel.
    pub fn fit(&self, width: usize) -> Vec<u64> {
        if width == 0 {
            return Vec::new();
        }
        if width >= self.bars.len() {
            return self.bars.clone();
        }
        (0..width)
            .map(|column| self.bars[column * self.bars.len() / width])
            .collect()
    }
}

impl Default for WaveformView {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformSink for WaveformView {
    fn present(&mut self, window: &WaveformWindow) {
        for (bar, value) in self.bars.iter_mut().zip(window.samples()) {
            *bar = (value.clamp(0.0, 1.0) * SPARKLINE_MAX as f32).round() as u64;
        }
    }
}

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    video: Color,
    selected_bg: Color,
}

fn palette() -> Palette {
    Palette {
        bg: Color::Rgb(10, 15, 24),
        panel_bg: Color::Rgb(19, 29, 43),
        panel_alt_bg: Color::Rgb(24, 38, 58),
        border: Color::Rgb(69, 121, 176),
        text: Color::Rgb(214, 228, 248),
        muted: Color::Rgb(149, 173, 204),
        accent: Color::Rgb(100, 203, 184),
        alert: Color::Rgb(249, 174, 88),
        video: Color::Rgb(156, 186, 255),
        selected_bg: Color::Rgb(34, 55, 82),
    }
}

pub fn draw<B: PlaybackBackend, D: SampleDecoder>(
    frame: &mut Frame,
    session: &PlaybackSession<B, D>,
    waveform: &WaveformView,
    cursor: usize,
    command_buffer: &str,
    command_mode: bool,
) {
    let colors = palette();
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(9),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, session, vertical[0], &colors);
    draw_playlist(frame, session, cursor, vertical[1], &colors);

    let waveform_bars = waveform.fit(vertical[2].width.saturating_sub(2) as usize);
    let sparkline = Sparkline::default()
        .block(panel_block(
            "Waveform",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .data(waveform_bars.iter().copied())
        .max(SPARKLINE_MAX)
        .style(Style::default().fg(colors.accent));
    frame.render_widget(sparkline, vertical[2]);

    draw_transport(frame, session, vertical[3], &colors);

    let footer = if command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(colors.alert)),
            Span::styled(command_buffer, Style::default().fg(colors.text)),
        ])
    } else {
        Line::from(vec![
            Span::styled(
                "Space play/pause, </> prev/next, ^/v volume, 0-9 seek, s stop, z shuffle, r repeat, : command, q quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(session.status.as_str(), Style::default().fg(colors.text)),
        ])
    };
    frame.render_widget(
        Paragraph::new(footer).block(panel_block(
            "Message",
            colors.panel_bg,
            colors.text,
            colors.border,
        )),
        vertical[4],
    );
}

fn draw_header<B: PlaybackBackend, D: SampleDecoder>(
    frame: &mut Frame,
    session: &PlaybackSession<B, D>,
    area: Rect,
    colors: &Palette,
) {
    let navigator = session.navigator();
    let shuffle = if navigator.shuffle_enabled {
        "SHUFFLE (ON)"
    } else {
        "SHUFFLE"
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", navigator.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(session.state().label(), Style::default().fg(colors.alert)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(shuffle, Style::default().fg(colors.text)),
        Span::styled("  ", Style::default()),
        Span::styled(
            navigator.repeat_mode.label(),
            Style::default().fg(colors.text),
        ),
    ]))
    .block(panel_block(
        "Status",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(header, area);
}

fn draw_playlist<B: PlaybackBackend, D: SampleDecoder>(
    frame: &mut Frame,
    session: &PlaybackSession<B, D>,
    cursor: usize,
    area: Rect,
    colors: &Palette,
) {
    let navigator = session.navigator();
    let playing = navigator.current_index();
    let items: Vec<ListItem> = navigator
        .tracks()
        .iter()
        .enumerate()
        .map(|(idx, track)| {
            let marker = if Some(idx) == playing { "  > " } else { "    " };
            let style = match track.media_kind {
                MediaKind::Audio => Style::default().fg(colors.text),
                MediaKind::Video => Style::default().fg(colors.video),
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.display_name(), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!navigator.is_empty()).then(|| cursor.min(navigator.len() - 1)));

    let list = List::new(items)
        .block(panel_block(
            "Playlist",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_transport<B: PlaybackBackend, D: SampleDecoder>(
    frame: &mut Frame,
    session: &PlaybackSession<B, D>,
    area: Rect,
    colors: &Palette,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    let elapsed = session.transport().elapsed_seconds;
    let duration = session.duration_seconds();
    let title = session
        .current_track()
        .map(|track| track.display_name())
        .unwrap_or_else(|| String::from("-"));

    let timeline = Gauge::default()
        .block(panel_block(
            &title,
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .gauge_style(Style::default().fg(colors.accent).bg(colors.panel_alt_bg))
        .ratio(progress_ratio(elapsed, duration))
        .label(timeline_label(elapsed, duration, session.state()));
    frame.render_widget(timeline, columns[0]);

    let volume = Gauge::default()
        .block(panel_block(
            "Volume",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .gauge_style(Style::default().fg(colors.alert).bg(colors.panel_alt_bg))
        .ratio(f64::from(session.volume()).clamp(0.0, 1.0))
        .label(format!("{:>3}%", (session.volume() * 100.0).round() as u16));
    frame.render_widget(volume, columns[1]);
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn progress_ratio(elapsed: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(total) if total > 0.0 => (elapsed / total).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn timeline_label(elapsed: f64, duration: Option<f64>, state: SessionState) -> String {
    match duration {
        Some(total) => format!(
            "{} / -{}  {}",
            format_clock(elapsed),
            format_clock(total - elapsed),
            state.label()
        ),
        None => format!("{} / --:--  {}", format_clock(elapsed), state.label()),
    }
}
