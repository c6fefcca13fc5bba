//! Falling note rendering.
//!
//! Notes fall from the top of the area toward the keyboard below it. The
//! bottom edge of the area is the strike line, and the full height covers the
//! lookahead window.

use super::{channel_color, rgb, KeyLayout, BACKGROUND};
use crate::app::App;
use crate::projector::NoteRect;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

/// Blends a note color for display.
///
/// The color is first scaled by `brightness`, then mixed toward the
/// background by `1 - opacity`.
pub fn shade(base: (u8, u8, u8), opacity: f64, brightness: f64) -> Color {
    let opacity = opacity.clamp(0.0, 1.0);
    let mix = |c: u8, bg: u8| -> u8 {
        let lit = (c as f64 * brightness).min(255.0);
        (bg as f64 + (lit - bg as f64) * opacity).round().clamp(0.0, 255.0) as u8
    };
    Color::Rgb(
        mix(base.0, BACKGROUND.0),
        mix(base.1, BACKGROUND.1),
        mix(base.2, BACKGROUND.2),
    )
}

/// Terminal rows covered by `rect`, clipped to `area`.
fn rows(rect: &NoteRect, area: Rect, rows_per_second: f64) -> std::ops::Range<u16> {
    let (top, bottom) = rect.screen_span(rows_per_second, area.bottom() as f64);
    let first = top.floor();
    // Very short notes still get a row
    let end = bottom.ceil().max(first + 1.0);

    let first = first.max(area.top() as f64) as u16;
    let end = end.min(area.bottom() as f64).max(area.top() as f64) as u16;
    first..end.max(first)
}

/// Renders the falling notes of the current frame.
///
/// Returns the key layout used, so the keyboard can line up with it.
pub fn render_notes(frame: &mut Frame, area: Rect, app: &App) -> KeyLayout {
    let title = match app.session() {
        Some(session) => format!(" {} ", session.name()),
        None => " No score loaded ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::LEFT | Borders::RIGHT | Borders::TOP)
        .border_style(Style::default().fg(Color::Gray))
        .style(Style::default().bg(rgb(BACKGROUND)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let keys = KeyLayout::fit(inner, app.pitch_range);
    let lookahead = app.frame.lookahead_seconds;
    if inner.height == 0 || lookahead <= 0.0 {
        return keys;
    }
    let rows_per_second = inner.height as f64 / lookahead;

    let buf = frame.buffer_mut();
    for rect in &app.frame.notes {
        let Some(x) = keys.column(rect.pitch) else {
            continue;
        };
        let color = shade(channel_color(rect.channel), rect.opacity, rect.brightness);
        // Leave a gap between neighbouring keys when there is room
        let width = if keys.key_width > 2 {
            keys.key_width - 1
        } else {
            keys.key_width
        };

        for y in rows(rect, inner, rows_per_second) {
            for dx in 0..width {
                if let Some(cell) = buf.cell_mut((x + dx, y)) {
                    cell.set_symbol(" ").set_bg(color);
                }
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(top_offset_seconds: f64, height_seconds: f64) -> NoteRect {
        NoteRect {
            channel: 0,
            pitch: 60,
            top_offset_seconds,
            height_seconds,
            opacity: 1.0,
            highlighted: false,
            brightness: 1.0,
        }
    }

    #[test]
    fn test_shade_full_and_transparent() {
        assert_eq!(shade((200, 100, 50), 1.0, 1.0), Color::Rgb(200, 100, 50));
        assert_eq!(
            shade((200, 100, 50), 0.0, 1.0),
            Color::Rgb(BACKGROUND.0, BACKGROUND.1, BACKGROUND.2)
        );
    }

    #[test]
    fn test_shade_brightens_and_saturates() {
        assert_eq!(shade((100, 200, 0), 1.0, 1.5), Color::Rgb(150, 255, 0));
    }

    #[test]
    fn test_rows_for_upcoming_note() {
        // 20 rows over 4 seconds: 5 rows per second, strike line at row 20
        let area = Rect::new(0, 0, 10, 20);
        assert_eq!(rows(&rect(1.0, 1.0), area, 5.0), 10..15);
    }

    #[test]
    fn test_rows_clipped_at_strike_line() {
        let area = Rect::new(0, 0, 10, 20);
        // Struck half a second ago, one second long
        assert_eq!(rows(&rect(-0.5, 1.0), area, 5.0), 17..20);
        // Entirely in the past
        assert!(rows(&rect(-2.0, 1.0), area, 5.0).is_empty());
    }

    #[test]
    fn test_rows_clipped_at_top() {
        let area = Rect::new(0, 2, 10, 20);
        assert_eq!(rows(&rect(3.0, 2.0), area, 5.0), 2..7);
    }

    #[test]
    fn test_short_note_gets_one_row() {
        let area = Rect::new(0, 0, 10, 20);
        assert_eq!(rows(&rect(1.0, 0.01), area, 5.0).len(), 1);
    }
}
