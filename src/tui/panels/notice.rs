use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use unicode_width::UnicodeWidthStr;

use crate::tui::panels::glow;
use crate::tui::scene::{Node, NodeBase, SceneContext, put};

/// Cells around the text: `" ░▒▓ "` and `" ▓▒░ "`.
const FRAME: u16 = 10;

/// A short message centered on its row, fading out over a fixed time.
pub struct NoticePanel {
    base: NodeBase,
    /// The whole row the notice is centered in
    row: Rect,
    text: String,
    remaining: u64,
    total: u64,
    color: Option<Color>,
}

impl NoticePanel {
    pub fn new(row: Rect) -> Self {
        let mut base = NodeBase::new(Rect::new(row.x, row.y, 0, 1));
        base.set_visible(false);
        Self {
            base,
            row,
            text: String::new(),
            remaining: 0,
            total: 0,
            color: None,
        }
    }

    /// Shows `text` for `frames` frames.
    pub fn show(&mut self, text: impl Into<String>, frames: u64) {
        self.text = text.into();
        self.total = frames.max(1);
        self.remaining = self.total;
        self.color = None;
        self.recenter();
        self.base.set_visible(true);
        self.base.request_recompute();
    }

    pub fn is_showing(&self) -> bool {
        self.base.is_visible()
    }

    fn recenter(&mut self) {
        let width = (self.text.width() as u16 + FRAME).min(self.row.width);
        let x = self.row.x + (self.row.width - width) / 2;
        self.base.set_area(Rect::new(x, self.row.y, width, 1));
    }
}

impl Node for NoticePanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, frames: u64, _ctx: &SceneContext) {
        if !self.base.is_visible() {
            return;
        }
        self.remaining = self.remaining.saturating_sub(frames);
        if self.remaining == 0 {
            self.base.set_visible(false);
            return;
        }
        let left = self.remaining as f32 / self.total as f32;
        let color = glow([5, 5, 1], left);
        if self.color != Some(color) {
            self.color = Some(color);
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let color = self.color.unwrap_or_else(|| glow([5, 5, 1], 1.0));
        let edge = Style::default().fg(color);
        let body = edge.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        let text = format!(" {} ", self.text);
        let canvas = self.base.canvas_mut();
        let x = put(canvas, 0, 0, " ░▒▓", edge);
        let x = put(canvas, x, 0, &text, body);
        put(canvas, x, 0, "▓▒░ ", edge);
    }

    fn resize(&mut self, row: Rect) {
        self.row = Rect::new(row.x, row.y, row.width, 1);
        self.recenter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;
    use crate::tui::palette::Palette;
    use ratatui::buffer::Buffer;

    #[test]
    fn centered_then_hidden_after_the_timer() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut notice = NoticePanel::new(Rect::new(0, 3, 40, 1));
        assert!(!notice.is_showing());

        notice.show("Copied", 10);
        assert_eq!(notice.base().area(), Rect::new(12, 3, 16, 1));
        notice.tick(1, &ctx);
        notice.draw(&ctx);
        let mut surface = Buffer::empty(Rect::new(0, 0, 40, 5));
        let area = surface.area;
        notice.render(&mut surface, area);
        let row: String = (12..28).map(|x| surface[(x, 3)].symbol().to_string()).collect();
        assert_eq!(row, " ░▒▓ Copied ▓▒░ ");
        assert!(surface[(17, 3)].modifier.contains(Modifier::REVERSED));

        notice.tick(8, &ctx);
        assert!(notice.is_showing());
        notice.tick(1, &ctx);
        assert!(!notice.is_showing());
        assert!(notice.base().needs_paint());
    }

    #[test]
    fn fades_toward_black() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut notice = NoticePanel::new(Rect::new(0, 0, 40, 1));
        notice.show("x", 100);
        notice.tick(1, &ctx);
        let early = notice.color;
        notice.tick(80, &ctx);
        assert_ne!(notice.color, early);
        assert_eq!(notice.color, Some(glow([5, 5, 1], 0.19)));
    }
}
