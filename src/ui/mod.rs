//! Terminal user interface components.
//!
//! This module draws one [`RenderFrame`](crate::projector::RenderFrame):
//! the transport bar, the falling notes, and the keyboard they land on.

mod keyboard;
mod notes;
mod transport;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color;
use ratatui::Frame;

pub use keyboard::render_keyboard;
pub use notes::{render_notes, shade};
pub use transport::render_transport;

/// Background behind the falling notes; faded notes blend toward it.
pub const BACKGROUND: (u8, u8, u8) = (20, 20, 20);

/// One color per MIDI channel.
const CHANNEL_COLORS: [(u8, u8, u8); 16] = [
    (80, 160, 255),
    (255, 140, 60),
    (110, 220, 110),
    (230, 90, 200),
    (240, 220, 80),
    (90, 220, 220),
    (255, 100, 100),
    (170, 130, 255),
    (160, 200, 60),
    (200, 200, 200), // Percussion
    (255, 180, 200),
    (60, 180, 140),
    (220, 160, 100),
    (120, 140, 220),
    (200, 120, 120),
    (140, 200, 255),
];

/// Base color for a channel.
pub fn channel_color(channel: u8) -> (u8, u8, u8) {
    CHANNEL_COLORS[channel as usize % CHANNEL_COLORS.len()]
}

pub fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

/// Maps pitches onto terminal columns.
///
/// Shared by the note area and the keyboard so a falling note lands exactly
/// on its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    /// Column of the lowest visible key.
    pub x: u16,
    pub low: u8,
    pub high: u8,
    /// Columns per key; 0 when nothing fits.
    pub key_width: u16,
}

impl KeyLayout {
    /// Fits the pitch range `(low, high)` into `area`.
    ///
    /// Keys are widened to fill the area when the range is narrow. When the
    /// range is wider than the area, the middle of it is shown one column per
    /// key.
    pub fn fit(area: Rect, (low, high): (u8, u8)) -> Self {
        let (low, high) = (low.min(high), low.max(high));
        let span = (high - low) as u16 + 1;

        if area.width == 0 {
            return Self {
                x: area.x,
                low,
                high,
                key_width: 0,
            };
        }

        if span <= area.width {
            let key_width = area.width / span;
            let used = key_width * span;
            Self {
                x: area.x + (area.width - used) / 2,
                low,
                high,
                key_width,
            }
        } else {
            let visible = area.width;
            let center = (low as u16 + high as u16) / 2;
            let first = center
                .saturating_sub(visible / 2)
                .clamp(low as u16, high as u16 + 1 - visible);
            Self {
                x: area.x,
                low: first as u8,
                high: (first + visible - 1) as u8,
                key_width: 1,
            }
        }
    }

    /// First column of `pitch`, or `None` if it is not visible.
    pub fn column(&self, pitch: u8) -> Option<u16> {
        if self.key_width == 0 || pitch < self.low || pitch > self.high {
            return None;
        }
        Some(self.x + (pitch - self.low) as u16 * self.key_width)
    }

    pub fn pitches(&self) -> impl Iterator<Item = u8> {
        let (low, high) = if self.key_width == 0 {
            (1, 0)
        } else {
            (self.low, self.high)
        };
        low..=high
    }
}

/// Renders the complete UI.
///
/// The layout is divided into:
/// - Top: Transport with playback state and position
/// - Center: Falling notes
/// - Bottom: Piano keyboard showing sounding keys
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(6),    // Falling notes
            Constraint::Length(4), // Keyboard
        ])
        .split(frame.area());

    render_transport(frame, chunks[0], app);
    let keys = render_notes(frame, chunks[1], app);
    render_keyboard(frame, chunks[2], keys, &app.frame.keyboard);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_range_widens_keys() {
        let layout = KeyLayout::fit(Rect::new(0, 0, 40, 10), (60, 71));
        assert_eq!(layout.key_width, 3);
        assert_eq!(layout.x, 2);
        assert_eq!(layout.column(60), Some(2));
        assert_eq!(layout.column(61), Some(5));
        assert_eq!(layout.column(72), None);
    }

    #[test]
    fn test_wide_range_is_centered() {
        let layout = KeyLayout::fit(Rect::new(0, 0, 10, 10), (0, 127));
        assert_eq!(layout.key_width, 1);
        assert_eq!(layout.low, 58);
        assert_eq!(layout.high, 67);
        assert_eq!(layout.pitches().count(), 10);
    }

    #[test]
    fn test_wide_range_clamped_to_low_end() {
        let layout = KeyLayout::fit(Rect::new(0, 0, 10, 10), (0, 12));
        assert_eq!(layout.low, 1);
        assert_eq!(layout.high, 10);

        let layout = KeyLayout::fit(Rect::new(0, 0, 10, 10), (0, 14));
        assert_eq!((layout.low, layout.high), (2, 11));
    }

    #[test]
    fn test_zero_width_shows_nothing() {
        let layout = KeyLayout::fit(Rect::new(0, 0, 0, 10), (60, 72));
        assert_eq!(layout.column(60), None);
        assert_eq!(layout.pitches().count(), 0);
    }
}
