//! The panels of the main screen. Each one is a scene node; the panel set
//! places them, routes input and runs their phases.

pub mod compose;
pub mod confirm;
pub mod detail;
pub mod feed;
pub mod notice;
pub mod ticker;
pub mod title;

pub use compose::{ComposeEvent, ComposePanel};
pub use confirm::{ConfirmEvent, ConfirmPanel};
pub use detail::{DetailEvent, DetailPanel};
pub use feed::FeedPanel;
pub use notice::NoticePanel;
pub use ticker::TickerPanel;
pub use title::TitlePanel;

use ratatui::style::Color;

use crate::tui::event::TuiEvent;
use crate::tui::palette::cube;

/// A panel that consumes terminal input while it has focus.
pub trait EventHandler {
    /// The type of high-level event this panel emits.
    type Event;

    /// Handle a low-level `TuiEvent` and optionally return a high-level event.
    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event>;
}

/// A cube colour scaled by `factor`, for pulsing bars.
pub(crate) fn glow([r, g, b]: [u8; 3], factor: f32) -> Color {
    let scale = |c: u8| (c as f32 * factor).round().clamp(0.0, 5.0) as u8;
    cube(scale(r), scale(g), scale(b))
}
