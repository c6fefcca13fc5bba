//! Piano keyboard display.
//!
//! Sits under the falling notes and lights up every key that is sounding, in
//! the color of the channel playing it.

use super::{channel_color, rgb, KeyLayout};
use crate::midi::{is_black_key, note_to_name};
use crate::playback::NoteKey;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;
use std::collections::BTreeSet;

/// Channel sounding `pitch`, lowest channel first.
fn sounding_channel(keys: &BTreeSet<NoteKey>, pitch: u8) -> Option<u8> {
    keys.iter().find(|key| key.pitch == pitch).map(|key| key.channel)
}

/// Style of one key.
fn key_style(pitch: u8, sounding: Option<u8>) -> Style {
    match sounding {
        Some(channel) => Style::default()
            .fg(Color::Black)
            .bg(rgb(channel_color(channel)))
            .add_modifier(Modifier::BOLD),
        None if is_black_key(pitch) => Style::default().fg(Color::White).bg(Color::DarkGray),
        None => Style::default().fg(Color::Black).bg(Color::White),
    }
}

/// Renders the piano keyboard at the bottom of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `layout` - Key columns, as used by the note area above
/// * `sounding` - Keys currently sounding
pub fn render_keyboard(
    frame: &mut Frame,
    area: Rect,
    layout: KeyLayout,
    sounding: &BTreeSet<NoteKey>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 {
        return;
    }

    let buf = frame.buffer_mut();
    for pitch in layout.pitches() {
        let Some(x) = layout.column(pitch) else {
            continue;
        };
        let style = key_style(pitch, sounding_channel(sounding, pitch));
        for dx in 0..layout.key_width {
            for y in inner.top()..inner.bottom() {
                if let Some(cell) = buf.cell_mut((x + dx, y)) {
                    cell.set_symbol(" ").set_style(style);
                }
            }
        }
    }

    // Octave labels on each C, drawn over the keys they run into
    let label_style = Style::default().fg(Color::Black);
    for pitch in layout.pitches().filter(|p| p % 12 == 0) {
        let Some(x) = layout.column(pitch) else {
            continue;
        };
        let room = inner.right().saturating_sub(x) as usize;
        buf.set_stringn(
            x,
            inner.bottom() - 1,
            note_to_name(pitch),
            room,
            label_style,
        );
    }
}
