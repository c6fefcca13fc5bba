//! Transport bar rendering.
//!
//! Displays the playback state, position, tempo, and status messages.

use crate::app::{format_time, App};
use crate::playback::SchedulerState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Renders the transport bar at the top of the screen.
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(13), // Playback state
            Constraint::Length(24), // Position
            Constraint::Length(12), // Tempo
            Constraint::Min(20),    // Status/help
        ])
        .split(inner);

    let play_status = match app.playback_state() {
        SchedulerState::Playing => Span::styled(
            " [>] PLAY ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        SchedulerState::Paused => Span::styled(
            " [||] PAUSE ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        SchedulerState::Idle => Span::styled(
            " [.] STOP ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    frame.render_widget(Paragraph::new(Line::from(play_status)), chunks[0]);

    let elapsed = app.elapsed_seconds();
    let total = app
        .session()
        .map(|session| session.total_duration_seconds())
        .unwrap_or(0.0);
    let position_widget = Paragraph::new(Line::from(vec![
        Span::styled("Pos: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{} / {}", format_time(elapsed), format_time(total)),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(position_widget, chunks[1]);

    if let Some(session) = app.session() {
        let bpm = session.tempo_map().bpm_at_seconds(elapsed);
        let tempo_widget = Paragraph::new(Line::from(vec![
            Span::styled("BPM: ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:.0}", bpm), Style::default().fg(Color::White)),
        ]));
        frame.render_widget(tempo_widget, chunks[2]);
    }

    let status_line = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        build_help_line()
    };
    frame.render_widget(Paragraph::new(status_line), chunks[3]);
}

/// Key bindings, shown when there is no status message.
fn build_help_line() -> Line<'static> {
    let key_style = Style::default().fg(Color::Yellow);
    let bracket_style = Style::default().fg(Color::DarkGray);
    let desc_style = Style::default().fg(Color::DarkGray);

    let mut spans = Vec::new();
    for (key, desc) in [
        ("Space", "Play "),
        ("←→", "Seek "),
        ("Home", "Restart "),
        ("s", "Stop "),
        ("q", "Quit"),
    ] {
        spans.push(Span::styled("[", bracket_style));
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled("]", bracket_style));
        spans.push(Span::styled(desc, desc_style));
    }
    Line::from(spans)
}
