//! # Feed Panel
//!
//! Shows the visible window of the current view, one [`LineNode`] per row,
//! with a scrollbar in the last column.
//!
//! ```text
//!   ┌──────────── rows: width - 1 ────────────┐┌ scrollbar
//!   │  >  L @bob              > hello ...  3m ││o
//!   │     R @cat                RT @bob... 9m ││|
//!   │       Streaming... /                    ││o
//! ```
//!
//! Row nodes are cached by what they show, so scrolling only moves them;
//! only rows whose content changed recompute. The panel's own canvas is
//! just the scrollbar and the blank background, recomputed when the set
//! of visible rows or the scroll position changes.

use std::collections::HashMap;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};

use crate::core::post::PostId;
use crate::core::state::App;
use crate::core::store::{PostRef, ReplyTree};
use crate::core::view::Line;
use crate::tui::line::{LineNode, LineProps, Relation, TRAILER_WIDTH};
use crate::tui::palette::{self, basic};
use crate::tui::scene::{Node, NodeBase, SceneContext, draw_own, put};

/// Body cells a reveal is allowed to take before its arrival is forgotten.
const REVEAL_CELLS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LineKey {
    Post(PostId),
    Fold(PostId),
    Marker,
}

impl LineKey {
    fn of(line: &Line) -> Self {
        match line {
            Line::Post(id) => LineKey::Post(*id),
            Line::Fold(ids) => LineKey::Fold(ids.first().copied().unwrap_or_default()),
            Line::StreamMarker => LineKey::Marker,
        }
    }
}

pub struct FeedPanel {
    base: NodeBase,
    tab: usize,
    nodes: HashMap<LineKey, LineNode>,
    /// Keys of the visible rows, top to bottom
    rows: Vec<LineKey>,
    /// `(top, len)` of the view at the last tick
    scroll: (usize, usize),
    /// Frame each post was first shown at, while its reveal may run
    arrivals: HashMap<PostId, u64>,
}

impl FeedPanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            tab: 0,
            nodes: HashMap::new(),
            rows: Vec::new(),
            scroll: (0, 0),
            arrivals: HashMap::new(),
        }
    }

    pub fn tab(&self) -> usize {
        self.tab
    }

    /// Switches to another view. Every row is rebuilt.
    pub fn set_tab(&mut self, tab: usize) {
        if tab != self.tab {
            self.tab = tab;
            self.clear_rows();
        }
    }

    /// Rows available for lines.
    pub fn height(&self) -> usize {
        self.base.height() as usize
    }

    /// Width of one row; the last column holds the scrollbar.
    fn row_width(&self) -> u16 {
        self.base.width().saturating_sub(1)
    }

    /// Records when freshly shown posts appeared so their reveal can run.
    pub fn note_arrivals(&mut self, shown: &[PostId], frame: u64) {
        for id in shown {
            self.arrivals.entry(*id).or_insert(frame);
        }
    }

    /// Keeps the view's viewport in step with the panel.
    pub fn sync(&self, app: &mut App) {
        let height = self.height();
        if let Some(view) = app.store.view_mut(self.tab)
            && view.height() != height
        {
            view.set_height(height);
        }
    }

    /// View line index under a screen position, from the last tick.
    pub fn line_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.base.area();
        if column < area.left() || column >= area.right() || row < area.top() || row >= area.bottom()
        {
            return None;
        }
        let (top, len) = self.scroll;
        let index = top + (row - area.y) as usize;
        (index < len).then_some(index)
    }

    fn clear_rows(&mut self) {
        self.nodes.clear();
        self.rows.clear();
        self.base.request_recompute();
    }

    fn prune_arrivals(&mut self, ctx: &SceneContext) {
        let speed = ctx.app.config.reveal_speed.max(f32::EPSILON);
        let window = ((REVEAL_CELLS + TRAILER_WIDTH) as f32 * ctx.fps() as f32 / speed) as u64;
        self.arrivals
            .retain(|_, arrived| ctx.frame.saturating_sub(*arrived) <= window);
    }
}

impl Node for FeedPanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, frames: u64, ctx: &SceneContext) {
        self.prune_arrivals(ctx);
        let Some(view) = ctx.app.store.view(self.tab) else {
            return;
        };
        let store = &ctx.app.store;
        let selected = view.selected_post().and_then(|id| store.fetch(id));
        let tree = store.reply_tree();
        let area = self.base.area();
        let width = self.row_width();

        let mut rows = Vec::with_capacity(self.height());
        for (offset, entry) in view
            .lines()
            .iter()
            .enumerate()
            .skip(view.top())
            .take(self.height())
        {
            let key = LineKey::of(&entry.line);
            let post = entry.line.post_id().and_then(|id| store.fetch(id));
            let relation = match (post, selected) {
                (Some(post), Some(selected)) if offset != view.selected() => {
                    relation(post, selected, tree)
                }
                _ => Relation::None,
            };
            let node = self
                .nodes
                .entry(key.clone())
                .or_insert_with(|| LineNode::new(entry.line.clone(), width));
            if node.line() != &entry.line {
                *node = LineNode::new(entry.line.clone(), width);
            }
            let y = area.y + (offset - view.top()) as u16;
            node.resize(Rect::new(area.x, y, width, 1));
            node.set_props(LineProps {
                revision: entry.revision,
                selected: offset == view.selected(),
                relation,
                arrived: entry
                    .line
                    .post_id()
                    .and_then(|id| self.arrivals.get(&id).copied()),
            });
            node.tick(frames, ctx);
            rows.push(key);
        }

        self.nodes.retain(|key, _| rows.contains(key));
        let scroll = (view.top(), view.len());
        if rows != self.rows || scroll != self.scroll {
            self.base.request_recompute();
        }
        self.rows = rows;
        self.scroll = scroll;
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let height = self.height();
        let x = self.row_width();
        let (top, len) = self.scroll;
        let canvas = self.base.canvas_mut();
        let gray = Style::default().fg(palette::CHROME);
        for y in 0..height as u16 {
            put(canvas, x, y, "|", gray);
        }
        if height == 0 || len == 0 {
            return;
        }
        let (start, end) = scrollbar(height, top, len);
        let white = Style::default().fg(basic(1, 1, 1, 1));
        for y in start + 1..end {
            put(canvas, x, y as u16, "|", white);
        }
        let end_cap = white.add_modifier(Modifier::BOLD);
        put(canvas, x, start as u16, "o", end_cap);
        put(canvas, x, end as u16, "o", end_cap);
    }

    fn draw(&mut self, ctx: &SceneContext) -> bool {
        let mut pending = draw_own(self, ctx);
        for node in self.nodes.values_mut() {
            pending |= node.draw(ctx);
        }
        pending
    }

    fn render(&mut self, surface: &mut Buffer, clip: Rect) -> bool {
        let painted = self.base.paint(surface, clip);
        if painted {
            // The background just covered every row.
            for node in self.nodes.values_mut() {
                node.base_mut().request_paint();
            }
        }
        let clip = clip.intersection(self.base.area());
        let mut any = painted;
        for node in self.nodes.values_mut() {
            any |= node.render(surface, clip);
        }
        any
    }

    fn resize(&mut self, area: Rect) {
        self.base.set_area(area);
        self.clear_rows();
    }
}

/// First and last scrollbar rows of the thumb.
fn scrollbar(height: usize, top: usize, len: usize) -> (usize, usize) {
    let last = height.saturating_sub(1) as f32;
    let start = (last * top as f32 / len as f32).floor() as usize;
    let bottom = (top + height).min(len);
    let end = (last * bottom as f32 / len as f32).ceil() as usize;
    (start.min(height - 1), end.clamp(start, height - 1))
}

/// How the row showing `line` relates to the selected post.
pub fn relation(line: PostRef<'_>, selected: PostRef<'_>, tree: &ReplyTree) -> Relation {
    if line.post().repost_of == Some(selected.id()) {
        return Relation::RepostOfSelected;
    }
    if selected.post().repost_of == Some(line.id()) {
        return Relation::OriginalOfSelected;
    }
    let same_author = line.author().id == selected.author().id;
    if tree.ids.len() > 1 && (tree.contains(line.id()) || tree.contains(line.root().id())) {
        return if same_author {
            Relation::ReplyTreeSameAuthor
        } else {
            Relation::ReplyTreeOtherAuthor
        };
    }
    if same_author {
        Relation::SameAuthor
    } else {
        Relation::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Incoming;
    use crate::core::post::Post;
    use crate::test_support::{post, reply, repost, test_app, user};
    use crate::tui::palette::Palette;

    fn app_with(height: usize, posts: Vec<Post>) -> App {
        let mut app = test_app();
        app.store.view_mut(0).unwrap().set_height(height);
        for p in posts {
            app.store.ingest(Incoming::new(p));
        }
        app
    }

    fn frame(panel: &mut FeedPanel, app: &App, surface: &mut Buffer, frame: u64) {
        let palette = Palette::default();
        let ctx = SceneContext::new(app, &palette, frame);
        panel.tick(1, &ctx);
        panel.draw(&ctx);
        let clip = surface.area;
        panel.render(surface, clip);
    }

    fn row(surface: &Buffer, y: u16, range: std::ops::Range<u16>) -> String {
        range.map(|x| surface[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn rows_follow_the_view_window() {
        let bob = user(2, "bob");
        let app = app_with(
            4,
            vec![post(1, bob.clone(), "one"), post(2, bob.clone(), "two"), post(3, bob, "three")],
        );
        let mut panel = FeedPanel::new(Rect::new(0, 2, 60, 4));
        let mut surface = Buffer::empty(Rect::new(0, 0, 60, 8));
        frame(&mut panel, &app, &mut surface, 0);

        assert_eq!(row(&surface, 2, 7..11), "@bob");
        assert_eq!(row(&surface, 2, 26..29), "one");
        assert_eq!(row(&surface, 4, 26..31), "three");
        assert_eq!(row(&surface, 5, 0..3), "  >");
        assert_eq!(row(&surface, 5, 7..19), "Streaming...");
        assert_eq!(row(&surface, 2, 59..60), "o");
        assert_eq!(row(&surface, 3, 59..60), "|");
        assert_eq!(row(&surface, 5, 59..60), "o");
    }

    #[test]
    fn scrolling_moves_rows_without_recomputing_them() {
        let bob = user(2, "bob");
        let posts = (1..=6).map(|i| post(i, bob.clone(), &format!("p{i}"))).collect();
        let mut app = app_with(3, posts);
        let mut panel = FeedPanel::new(Rect::new(0, 0, 60, 3));
        let mut surface = Buffer::empty(Rect::new(0, 0, 60, 3));
        app.store.view_mut(0).unwrap().select(4);
        frame(&mut panel, &app, &mut surface, 0);
        assert_eq!(row(&surface, 0, 26..28), "p5");

        app.store.view_mut(0).unwrap().scroll_to(3);
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        panel.tick(1, &ctx);
        let moved = panel.nodes[&LineKey::Post(5)].base();
        assert!(!moved.needs_recompute());
        assert!(moved.needs_paint());

        panel.draw(&ctx);
        panel.render(&mut surface, Rect::new(0, 0, 60, 3));
        assert_eq!(row(&surface, 0, 26..28), "p4");
        assert_eq!(row(&surface, 1, 26..28), "p5");
        assert_eq!(panel.line_at(3, 1), Some(4));
        assert_eq!(panel.line_at(3, 7), None);
    }

    #[test]
    fn scrollbar_thumb_tracks_position() {
        assert_eq!(scrollbar(5, 0, 3), (0, 4));
        assert_eq!(scrollbar(5, 10, 20), (2, 3));
        assert_eq!(scrollbar(5, 15, 20), (3, 4));
        assert_eq!(scrollbar(1, 3, 9), (0, 0));
    }

    #[test]
    fn relations_to_the_selected_post() {
        let bob = user(2, "bob");
        let cat = user(3, "cat");
        let original = post(1, bob.clone(), "root");
        let mut app = app_with(
            10,
            vec![
                original.clone(),
                post(2, bob.clone(), "again"),
                repost(3, cat.clone(), &original),
                post(4, cat.clone(), "unrelated"),
            ],
        );
        let store = &app.store;
        let selected = store.fetch(1).unwrap();
        let tree = store.reply_tree();
        assert_eq!(relation(store.fetch(2).unwrap(), selected, tree), Relation::SameAuthor);
        assert_eq!(relation(store.fetch(3).unwrap(), selected, tree), Relation::RepostOfSelected);
        assert_eq!(relation(store.fetch(4).unwrap(), selected, tree), Relation::None);
        assert_eq!(
            relation(selected, store.fetch(3).unwrap(), tree),
            Relation::OriginalOfSelected
        );

        app.store.ingest(Incoming::new(reply(5, cat, "@bob yes", 1)));
        app.store.ingest(Incoming::new(reply(6, bob, "@cat ok", 5)));
        app.store.rebuild_reply_tree(Some(1));
        let store = &app.store;
        let selected = store.fetch(1).unwrap();
        let tree = store.reply_tree();
        assert_eq!(
            relation(store.fetch(5).unwrap(), selected, tree),
            Relation::ReplyTreeOtherAuthor
        );
        assert_eq!(
            relation(store.fetch(6).unwrap(), selected, tree),
            Relation::ReplyTreeSameAuthor
        );
    }

    #[test]
    fn switching_tabs_rebuilds_rows() {
        let app = app_with(4, vec![post(1, user(2, "bob"), "one")]);
        let mut panel = FeedPanel::new(Rect::new(0, 0, 40, 4));
        let mut surface = Buffer::empty(Rect::new(0, 0, 40, 4));
        frame(&mut panel, &app, &mut surface, 0);
        assert_eq!(panel.nodes.len(), 2);

        panel.set_tab(0);
        assert_eq!(panel.nodes.len(), 2);
        panel.set_tab(1);
        assert!(panel.nodes.is_empty());
        assert!(panel.base().needs_recompute());
    }
}
