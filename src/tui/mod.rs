//! # TUI Adapter
//!
//! The ratatui-specific layer. Owns the terminal, runs the fixed-rate
//! loop and hands input to the panel set.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Frame Loop
//!
//! ```text
//! wait for input or the next frame
//!   → drain coordinator queues → apply input → tick → draw → render
//!   → flush the surface to the terminal
//! ```
//!
//! Panels paint into a persistent surface buffer that survives between
//! frames, so a frame in which nothing painted skips the flush entirely.
//! ratatui diffs against the previous frame and only writes changed cells.

mod columns;
pub mod desktop;
pub mod event;
mod line;
pub mod palette;
pub mod panel_set;
pub mod panels;
pub mod scene;

use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::{debug, info};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use crate::client::TimelineClient;
use crate::coordinator::Coordinator;
use crate::core::config::ResolvedConfig;
use crate::core::post::User;
use crate::core::services::Services;
use crate::core::state::App;
use crate::tui::desktop::SystemDesktop;
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};
use crate::tui::panel_set::PanelSet;

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Unsupported terminals ignore the keyboard protocol; it only makes
        // a bare Esc arrive without the escape-sequence delay.
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste
        );
    }
}

/// Frames due since `start` that have not been ticked yet, at least one.
fn frames_due(start: Instant, fps: u32, ticked: u64) -> u64 {
    let due = (start.elapsed().as_secs_f64() * fps as f64) as u64;
    due.saturating_sub(ticked).max(1)
}

/// Runs the client until the user quits. Must be called inside a tokio
/// runtime; the coordinator spawns its workers on it.
pub fn run(
    config: ResolvedConfig,
    client: Arc<dyn TimelineClient>,
    viewer: User,
) -> std::io::Result<()> {
    info!("Signed in as {} via {} client", viewer.at_handle(), client.name());
    let fps = config.fps.max(1);
    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    let mut app = App::new(config, Services::system()).with_viewer(viewer);
    let coordinator = Coordinator::start(client);

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    let size = terminal.size()?;
    let mut surface = Buffer::empty(Rect::new(0, 0, size.width, size.height));
    let desktop = Box::new(SystemDesktop::default());
    let mut panels = PanelSet::new(&app, size.width, size.height, desktop);

    let start = Instant::now();
    let mut ticked: u64 = 0;
    let mut next_frame = start;

    loop {
        let wait = next_frame.saturating_duration_since(Instant::now());
        let first_event = poll_event_timeout(wait);

        let drained = coordinator.drain(&mut app);
        panels.apply_drained(&drained);

        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if let Some(request) = panels.consume_input(&mut app, &event) {
                let id = coordinator.dispatch(&mut app, request);
                debug!("Dispatched action {id}");
            }
            if let TuiEvent::Resize(width, height) = event {
                surface = Buffer::empty(Rect::new(0, 0, width, height));
                terminal.clear()?;
                panels.repaint_all();
            }
        }
        if app.should_quit {
            info!("Quit requested");
            break;
        }

        if Instant::now() < next_frame {
            continue;
        }
        let frames = frames_due(start, fps, ticked);
        ticked += frames;
        next_frame += frame_time * frames as u32;

        panels.tick(&mut app, frames);
        if panels.draw(&app) && panels.render(&mut surface) {
            terminal.draw(|frame| {
                let area = frame.area().intersection(surface.area);
                let buffer = frame.buffer_mut();
                for y in area.top()..area.bottom() {
                    for x in area.left()..area.right() {
                        if let (Some(src), Some(dst)) =
                            (surface.cell((x, y)), buffer.cell_mut((x, y)))
                        {
                            *dst = src.clone();
                        }
                    }
                }
            })?;
        }
    }

    ratatui::restore();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_least_one_frame_is_always_due() {
        let start = Instant::now();
        assert_eq!(frames_due(start, 60, 0), 1);
        assert_eq!(frames_due(start, 60, 1000), 1);
    }

    #[test]
    fn late_frames_are_caught_up_in_one_tick() {
        let start = Instant::now() - Duration::from_millis(500);
        let frames = frames_due(start, 60, 0);
        assert!((30..=32).contains(&frames));
    }
}
