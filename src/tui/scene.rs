//! # Scene Nodes
//!
//! Every visible element is a node with its own off-screen canvas. The
//! loop drives all nodes through three phases per frame:
//!
//! ```text
//! tick(frames)  advance time-driven state, maybe request a recompute
//! draw()        recompute the canvas if requested (or never drawn yet),
//!               then mark the node for painting; returns "paint pending"
//! render()      copy the canvas onto the shared surface, clipped, and
//!               clear the pending flag
//! ```
//!
//! Recomputing (layout, colour lookups) happens at most once per change.
//! Painting is cheap and can be requested on its own, e.g. when only the
//! scroll position moved. Composite nodes run their own phase first and
//! then their children's, so children paint over their parent.

use chrono::{DateTime, Utc};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use unicode_width::UnicodeWidthStr;

use crate::core::state::App;
use crate::tui::palette::Palette;

/// Read-only view of the world handed to every node.
pub struct SceneContext<'a> {
    pub app: &'a App,
    pub palette: &'a Palette,
    /// Frames since the loop started
    pub frame: u64,
    pub now: DateTime<Utc>,
}

impl<'a> SceneContext<'a> {
    pub fn new(app: &'a App, palette: &'a Palette, frame: u64) -> Self {
        Self {
            app,
            palette,
            frame,
            now: app.services().clock.now(),
        }
    }

    pub fn fps(&self) -> u32 {
        self.app.config.fps
    }
}

/// Placement, canvas and dirty flags shared by all nodes.
#[derive(Debug, Clone)]
pub struct NodeBase {
    area: Rect,
    visible: bool,
    canvas: Buffer,
    needs_recompute: bool,
    needs_paint: bool,
}

impl NodeBase {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            visible: true,
            canvas: Buffer::empty(Rect::new(0, 0, area.width, area.height)),
            needs_recompute: true,
            needs_paint: false,
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn width(&self) -> u16 {
        self.area.width
    }

    pub fn height(&self) -> u16 {
        self.area.height
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.needs_paint = true;
        }
    }

    /// The node-local canvas; (0, 0) is the node's top-left cell.
    pub fn canvas(&self) -> &Buffer {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Buffer {
        &mut self.canvas
    }

    pub fn request_recompute(&mut self) {
        self.needs_recompute = true;
    }

    pub fn request_paint(&mut self) {
        self.needs_paint = true;
    }

    pub fn needs_recompute(&self) -> bool {
        self.needs_recompute
    }

    pub fn needs_paint(&self) -> bool {
        self.needs_paint
    }

    /// Moves and resizes. A size change replaces the canvas and forces a
    /// recompute; a pure move only needs a paint.
    pub fn set_area(&mut self, area: Rect) {
        if area.width != self.area.width || area.height != self.area.height {
            self.canvas = Buffer::empty(Rect::new(0, 0, area.width, area.height));
            self.needs_recompute = true;
        }
        if area != self.area {
            self.needs_paint = true;
        }
        self.area = area;
    }

    fn finish_recompute(&mut self) {
        self.needs_recompute = false;
        self.needs_paint = true;
    }

    /// Copies the canvas onto `surface` inside `clip`. Returns whether
    /// anything was pending.
    pub fn paint(&mut self, surface: &mut Buffer, clip: Rect) -> bool {
        if !self.needs_paint {
            return false;
        }
        self.needs_paint = false;
        if !self.visible {
            return true;
        }
        let target = self.area.intersection(clip).intersection(surface.area);
        for y in target.top()..target.bottom() {
            for x in target.left()..target.right() {
                let local = (x - self.area.x, y - self.area.y);
                if let (Some(src), Some(dst)) = (self.canvas.cell(local), surface.cell_mut((x, y)))
                {
                    *dst = src.clone();
                }
            }
        }
        true
    }
}

pub trait Node {
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Advances time-driven state by `frames`.
    fn tick(&mut self, _frames: u64, _ctx: &SceneContext) {}

    /// Regenerates the canvas from current state.
    fn recompute(&mut self, ctx: &SceneContext);

    /// Recomputes if requested, then reports whether a paint is pending.
    fn draw(&mut self, ctx: &SceneContext) -> bool {
        draw_own(self, ctx)
    }

    fn render(&mut self, surface: &mut Buffer, clip: Rect) -> bool {
        self.base_mut().paint(surface, clip)
    }

    /// New placement; containers forward a forced recompute to children.
    fn resize(&mut self, area: Rect) {
        self.base_mut().set_area(area);
    }

    /// Forces the next draw to recompute.
    fn invalidate(&mut self) {
        self.base_mut().request_recompute();
    }
}

/// The default draw phase. Composite nodes call this for themselves before
/// drawing their children.
pub fn draw_own<N: Node + ?Sized>(node: &mut N, ctx: &SceneContext) -> bool {
    if node.base().needs_recompute() {
        node.base_mut().canvas_mut().reset();
        node.recompute(ctx);
        node.base_mut().finish_recompute();
    }
    node.base().needs_paint()
}

// ============================================================================
// Canvas Helpers
// ============================================================================

/// Writes `text` at (x, y), cut at the canvas edge. Returns the x after it.
pub fn put(canvas: &mut Buffer, x: u16, y: u16, text: &str, style: Style) -> u16 {
    put_bounded(canvas, x, y, text, style, canvas.area.width)
}

/// Like [`put`] but never writes at or past column `right`.
pub fn put_bounded(canvas: &mut Buffer, x: u16, y: u16, text: &str, style: Style, right: u16) -> u16 {
    let right = right.min(canvas.area.width);
    if x >= right || y >= canvas.area.height {
        return x;
    }
    let (end, _) = canvas.set_stringn(x, y, text, (right - x) as usize, style);
    end
}

/// Writes `text` right-aligned so it ends at column `right`.
pub fn put_right(canvas: &mut Buffer, right: u16, y: u16, text: &str, style: Style) -> u16 {
    let width = text.width() as u16;
    put(canvas, right.saturating_sub(width), y, text, style)
}

/// Writes `text` centered on row `y`. Returns the left column used.
pub fn put_centered(canvas: &mut Buffer, y: u16, text: &str, style: Style) -> u16 {
    let x = canvas.area.width.saturating_sub(text.width() as u16) / 2;
    put(canvas, x, y, text, style);
    x
}

/// Paints a full-width row of spaces in `style`.
pub fn fill_row(canvas: &mut Buffer, y: u16, style: Style) {
    if y >= canvas.area.height {
        return;
    }
    let row = Rect::new(0, y, canvas.area.width, 1);
    for x in row.left()..row.right() {
        if let Some(cell) = canvas.cell_mut((x, y)) {
            cell.set_symbol(" ");
        }
    }
    canvas.set_style(row, style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;

    struct Counter {
        base: NodeBase,
        label: &'static str,
        recomputes: usize,
    }

    impl Node for Counter {
        fn base(&self) -> &NodeBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut NodeBase {
            &mut self.base
        }
        fn recompute(&mut self, _ctx: &SceneContext) {
            self.recomputes += 1;
            put(self.base.canvas_mut(), 0, 0, self.label, Style::default());
        }
    }

    fn counter(area: Rect, label: &'static str) -> Counter {
        Counter {
            base: NodeBase::new(area),
            label,
            recomputes: 0,
        }
    }

    #[test]
    fn first_draw_recomputes_then_only_on_request() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut node = counter(Rect::new(0, 0, 5, 1), "hi");
        let mut surface = Buffer::empty(Rect::new(0, 0, 10, 2));
        let area = surface.area;

        assert!(node.draw(&ctx));
        assert!(node.render(&mut surface, area));
        assert!(!node.draw(&ctx));
        assert!(!node.render(&mut surface, area));
        assert_eq!(node.recomputes, 1);

        node.base_mut().request_paint();
        assert!(node.draw(&ctx));
        assert_eq!(node.recomputes, 1);

        node.invalidate();
        node.draw(&ctx);
        node.draw(&ctx);
        assert_eq!(node.recomputes, 2);
    }

    #[test]
    fn render_copies_at_position_and_clips() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut node = counter(Rect::new(3, 1, 5, 1), "hello");
        let mut surface = Buffer::empty(Rect::new(0, 0, 10, 2));

        node.draw(&ctx);
        node.render(&mut surface, Rect::new(0, 0, 6, 2));
        assert_eq!(surface, Buffer::with_lines(["          ", "   hel    "]));
    }

    #[test]
    fn resize_forces_recompute_move_only_paints() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut node = counter(Rect::new(0, 0, 5, 1), "x");
        node.draw(&ctx);
        let mut surface = Buffer::empty(Rect::new(0, 0, 10, 2));
        let area = surface.area;
        node.render(&mut surface, area);

        node.resize(Rect::new(0, 1, 5, 1));
        assert!(!node.base().needs_recompute());
        assert!(node.base().needs_paint());

        node.resize(Rect::new(0, 1, 7, 1));
        node.draw(&ctx);
        assert_eq!(node.recomputes, 2);
    }

    #[test]
    fn hidden_nodes_consume_paint_without_writing() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut node = counter(Rect::new(0, 0, 5, 1), "x");
        node.base_mut().set_visible(false);
        let mut surface = Buffer::empty(Rect::new(0, 0, 5, 1));
        let area = surface.area;
        node.draw(&ctx);
        assert!(node.render(&mut surface, area));
        assert_eq!(surface, Buffer::with_lines(["     "]));
    }

    #[test]
    fn helpers_respect_bounds() {
        let mut canvas = Buffer::empty(Rect::new(0, 0, 8, 2));
        assert_eq!(put_bounded(&mut canvas, 2, 0, "abcdef", Style::default(), 5), 5);
        put_right(&mut canvas, 8, 1, "xy", Style::default());
        assert_eq!(canvas, Buffer::with_lines(["  abc   ", "      xy"]));
        assert_eq!(put(&mut canvas, 9, 0, "z", Style::default()), 9);
    }
}
