//! # Feed Rows
//!
//! One node per visible line of a view. A row recomputes only when its
//! stamp changes: everything the canvas is derived from (line revision,
//! selection, relation, avatar generations, age label, reveal position).
//! Moving a row to another screen position is a pure repaint.
//!
//! New posts ease in: a green trailer of random glyphs sweeps across the
//! body and the text appears behind it. Posts with wide characters skip
//! the effect, since a cut through a double-width glyph corrupts the row.

use chrono::TimeDelta;
use rand::Rng;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};

use crate::core::pieces::{Piece, Pieces};
use crate::core::post::{EntityKind, MediaKind, Post, UserId};
use crate::core::store::PostRef;
use crate::core::view::Line;
use crate::tui::columns::{ColumnBounds, ColumnKind};
use crate::tui::palette::{self, RoleStyle, basic, cube, hsv};
use crate::tui::scene::{Node, NodeBase, SceneContext, put, put_bounded, put_right};

pub const TRAILER_WIDTH: usize = 20;
const TRAILER_TAIL: &str = "▒▒▒▓";
const SPINNER: [&str; 4] = ["–", "\\", "|", "/"];

/// How a row relates to the selected row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Relation {
    #[default]
    None,
    SameAuthor,
    RepostOfSelected,
    OriginalOfSelected,
    ReplyTreeSameAuthor,
    ReplyTreeOtherAuthor,
}

/// What the feed panel tells a row each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineProps {
    pub revision: u64,
    pub selected: bool,
    pub relation: Relation,
    /// Frame the post was first shown; `None` shows it fully revealed
    pub arrived: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamp {
    props: LineProps,
    generations: Vec<u64>,
    age: String,
    trailer: Option<usize>,
    spinner: usize,
}

pub struct LineNode {
    base: NodeBase,
    columns: ColumnBounds,
    line: Line,
    props: LineProps,
    stamp: Option<Stamp>,
}

impl LineNode {
    pub fn new(line: Line, width: u16) -> Self {
        Self {
            base: NodeBase::new(Rect::new(0, 0, width, 1)),
            columns: ColumnBounds::resolve(width),
            line,
            props: LineProps::default(),
            stamp: None,
        }
    }

    pub fn line(&self) -> &Line {
        &self.line
    }

    pub fn set_props(&mut self, props: LineProps) {
        self.props = props;
    }

    fn stamp(&self, ctx: &SceneContext) -> Stamp {
        let mut stamp = Stamp {
            props: self.props,
            generations: Vec::new(),
            age: String::new(),
            trailer: None,
            spinner: 0,
        };
        match &self.line {
            Line::Post(id) => {
                if let Some(post) = ctx.app.store.fetch(*id) {
                    stamp.generations = avatar_users(post)
                        .map(|u| ctx.app.images.generation(u))
                        .collect();
                    stamp.age = age_label(ctx.now - post.post().created_at).0;
                    stamp.trailer = trailer_head(post.pieces(), self.props.arrived, ctx);
                }
            }
            Line::Fold(_) => {}
            Line::StreamMarker => stamp.spinner = (ctx.frame / 3 % 4) as usize,
        }
        stamp
    }
}

impl Node for LineNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, _frames: u64, ctx: &SceneContext) {
        let stamp = self.stamp(ctx);
        if self.stamp.as_ref() != Some(&stamp) {
            self.stamp = Some(stamp);
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, ctx: &SceneContext) {
        if self.columns.width() != self.base.width() {
            self.columns = ColumnBounds::resolve(self.base.width());
        }
        let columns = &self.columns;
        let canvas = self.base.canvas_mut();
        let selected = self.props.selected;
        if selected {
            let bold_white = Style::default()
                .fg(basic(1, 1, 1, 1))
                .add_modifier(Modifier::BOLD);
            put_bounded(
                canvas,
                columns.get(ColumnKind::Selection).start,
                0,
                "  >",
                bold_white,
                columns.get(ColumnKind::Selection).end,
            );
        }
        let gray = Style::default().fg(palette::CHROME);
        match &self.line {
            Line::Post(id) => {
                if let Some(post) = ctx.app.store.fetch(*id) {
                    let trailer = self.stamp.as_ref().and_then(|s| s.trailer);
                    paint_post(canvas, columns, post, self.props.relation, trailer, ctx);
                }
            }
            Line::Fold(ids) => {
                let label = format!("··· {} posts ···", ids.len());
                let x = columns.get(ColumnKind::Username).start;
                put(canvas, x, 0, &label, gray);
            }
            Line::StreamMarker => {
                let x = columns.get(ColumnKind::Username).start;
                put(canvas, x, 0, "Streaming...", gray);
                let spinner = self.stamp.as_ref().map_or(0, |s| s.spinner);
                put(canvas, x + 13, 0, SPINNER[spinner], gray);
            }
        }
    }
}

// ============================================================================
// Post Row
// ============================================================================

/// Users whose avatar tints something in this row.
fn avatar_users(post: PostRef<'_>) -> impl Iterator<Item = UserId> + '_ {
    std::iter::once(post.author().id).chain(post.pieces().iter().filter_map(|p| mention_user(p)))
}

fn mention_user(piece: &Piece) -> Option<UserId> {
    match piece.entity.as_ref().map(|e| &e.kind) {
        Some(EntityKind::Mention { user_id, .. }) => Some(*user_id),
        _ => None,
    }
}

/// Trailer head position in body cells, or `None` once fully revealed.
fn trailer_head(pieces: &Pieces, arrived: Option<u64>, ctx: &SceneContext) -> Option<usize> {
    let arrived = arrived?;
    if pieces.has_wide_characters() {
        return None;
    }
    let frames = ctx.frame.saturating_sub(arrived) as f32;
    let head = (frames * ctx.app.config.reveal_speed / ctx.fps() as f32) as usize;
    (head < pieces.width() + TRAILER_WIDTH).then_some(head)
}

fn paint_post(
    canvas: &mut Buffer,
    columns: &ColumnBounds,
    post: PostRef<'_>,
    relation: Relation,
    trailer: Option<usize>,
    ctx: &SceneContext,
) {
    let images = &ctx.app.images;

    // A repost row shows the state of the post it shares.
    let root = post.root();
    let flags = columns.get(ColumnKind::Flags);
    if let Some((offset, text, color)) = flag(root.post(), root.is_own()) {
        put_bounded(canvas, flags.start + offset, 0, &text, Style::default().fg(color), flags.end);
    }

    let username = columns.get(ColumnKind::Username);
    paint_username(
        canvas,
        (username.start, 0),
        username.end,
        &post.author().at_handle(),
        images.get(post.author().id),
        Modifier::empty(),
    );

    if let Some((symbol, style)) = relation_symbol(relation) {
        let relations = columns.get(ColumnKind::Relations);
        put_bounded(canvas, relations.start, 0, symbol, style, relations.end);
    }

    let body = columns.get(ColumnKind::Body);
    let mut x = body.start;
    for piece in post.pieces().iter() {
        x = match ctx.palette.column(piece.role) {
            RoleStyle::Hidden => x,
            RoleStyle::Username(modifiers) => {
                let summary = mention_user(piece).and_then(|u| images.get(u));
                paint_username(canvas, (x, 0), body.end, &piece.text, summary, modifiers)
            }
            RoleStyle::Whitespace(style) | RoleStyle::Plain(style) => {
                put_bounded(canvas, x, 0, &piece.text, style, body.end)
            }
        };
    }
    if let Some(head) = trailer {
        paint_reveal(canvas, body.start, body.end, head, post.pieces().width());
    }

    if let Some(marker) = media_marker(root.post()) {
        let entities = columns.get(ColumnKind::Entities);
        let style = Style::default()
            .fg(basic(1, 1, 1, 0))
            .add_modifier(Modifier::BOLD);
        put_bounded(canvas, entities.start, 0, &marker, style, entities.end);
    }

    let time = columns.get(ColumnKind::Time);
    if !time.is_empty() {
        let (label, color) = age_label(ctx.now - post.post().created_at);
        put_right(canvas, time.end, 0, &label, Style::default().fg(color));
    }
}

/// Draws a username one cell at a time, tinted by the avatar gradient.
pub fn paint_username(
    canvas: &mut Buffer,
    (x, y): (u16, u16),
    right: u16,
    name: &str,
    summary: Option<&crate::core::images::ImageSummary>,
    modifiers: Modifier,
) -> u16 {
    let mut cursor = x;
    let mut buf = [0u8; 4];
    for (i, ch) in name.chars().enumerate() {
        let style = palette::username_style(summary, i, modifiers);
        cursor = put_bounded(canvas, cursor, y, ch.encode_utf8(&mut buf), style, right);
    }
    cursor
}

/// Hides the body behind the trailer and draws the trailer itself.
fn paint_reveal(canvas: &mut Buffer, left: u16, right: u16, head: usize, text_width: usize) {
    let tail = head.saturating_sub(TRAILER_WIDTH);
    let shown = tail.min(text_width);
    for x in (left as usize + shown)..(right as usize) {
        if let Some(cell) = canvas.cell_mut((x as u16, 0)) {
            cell.reset();
        }
    }

    let green = Style::default().fg(basic(0, 1, 0, 1));
    let mut rng = rand::thread_rng();
    let tail_glyphs: Vec<char> = TRAILER_TAIL.chars().collect();
    let end = head.min(text_width);
    for pos in tail..end {
        let x = left as usize + pos;
        if x >= right as usize {
            break;
        }
        let j = pos + TRAILER_WIDTH - head;
        let (glyph, style) = if j == TRAILER_WIDTH - 1 {
            (' ', green.add_modifier(Modifier::REVERSED))
        } else if j >= TRAILER_WIDTH - 1 - tail_glyphs.len() {
            (tail_glyphs[j + tail_glyphs.len() + 1 - TRAILER_WIDTH], green)
        } else {
            (rng.gen_range(33u8..127) as char, green)
        };
        if let Some(cell) = canvas.cell_mut((x as u16, 0)) {
            cell.set_char(glyph).set_style(style);
        }
    }
}

/// Favourite/repost marker: `(offset, text, colour)`.
fn flag(post: &Post, own: bool) -> Option<(u16, String, Color)> {
    let count = |n: u32| if n >= 10 { "+".to_string() } else { n.to_string() };
    let red = cube(5, 0, 0);
    let green = cube(0, 5, 0);
    if own {
        if post.favorite_count > 0 {
            Some((0, count(post.favorite_count), red))
        } else if post.repost_count > 0 {
            Some((1, count(post.repost_count), green))
        } else {
            None
        }
    } else if post.favorited {
        Some((0, "L".to_string(), red))
    } else if post.reposted {
        Some((1, "R".to_string(), green))
    } else {
        None
    }
}

fn relation_symbol(relation: Relation) -> Option<(&'static str, Style)> {
    let bold = |r, g, b| {
        Style::default()
            .fg(cube(r, g, b))
            .add_modifier(Modifier::BOLD)
    };
    match relation {
        Relation::None => None,
        Relation::SameAuthor => Some((">", bold(4, 4, 1))),
        Relation::RepostOfSelected => Some((">", bold(0, 4, 0))),
        Relation::OriginalOfSelected => Some(("<", bold(0, 4, 0))),
        Relation::ReplyTreeSameAuthor => Some((">", bold(4, 4, 1).add_modifier(Modifier::REVERSED))),
        Relation::ReplyTreeOtherAuthor => Some((">", bold(5, 3, 3).add_modifier(Modifier::REVERSED))),
    }
}

/// `img`, `i:N`, `vid` or `gif` for posts with media.
pub fn media_marker(post: &Post) -> Option<String> {
    let mut media = post.media();
    let first = media.next()?;
    Some(match first {
        MediaKind::Photo => {
            let count = 1 + media.count();
            if count == 1 {
                "img".to_string()
            } else {
                format!("i:{count}")
            }
        }
        MediaKind::Video => "vid".to_string(),
        MediaKind::AnimatedGif => "gif".to_string(),
    })
}

/// Compact age (`42s`, `5m`, `3h`, `2d`) and its colour: fresh posts are
/// bright and saturated, old ones fade to grey.
pub fn age_label(age: TimeDelta) -> (String, Color) {
    let secs = age.num_seconds().max(0);
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        secs / 3_600 % 24,
        secs / 60 % 60,
        secs % 60,
    );
    if days > 0 {
        (format!("{days}d"), hsv(40.0 / 60.0, 0.0, 0.5))
    } else if hours > 0 {
        let h = (hours - 1) as f32;
        (
            format!("{hours}h"),
            hsv(40.0 / 60.0, 1.0 - h / 23.0, 1.0 - h / 46.0),
        )
    } else if minutes > 0 {
        let hue = (30.0 / 60.0 - minutes as f32 / 60.0 * 50.0 / 60.0).rem_euclid(1.0);
        (format!("{minutes}m"), hsv(hue, 1.0, 1.0))
    } else {
        (
            format!("{seconds}s"),
            hsv(30.0 / 60.0, seconds as f32 / 60.0, 1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Incoming;
    use crate::core::images::{ImageResult, ImageSummary};
    use crate::core::post::{Entity, EntityKind, MediaKind};
    use crate::core::state::App;
    use crate::test_support::{post, repost, test_app, user};
    use crate::tui::palette::Palette;

    fn cells(canvas: &Buffer, range: std::ops::Range<u16>) -> String {
        range.map(|x| canvas[(x, 0)].symbol().to_string()).collect()
    }

    fn draw(node: &mut LineNode, app: &App, frame: u64) -> bool {
        let palette = Palette::default();
        let ctx = SceneContext::new(app, &palette, frame);
        node.tick(1, &ctx);
        node.draw(&ctx)
    }

    fn app_with(posts: Vec<Post>) -> App {
        let mut app = test_app();
        for p in posts {
            app.store.ingest(Incoming::new(p));
        }
        app
    }

    #[test]
    fn age_labels_pick_the_largest_unit() {
        assert_eq!(age_label(TimeDelta::seconds(42)).0, "42s");
        assert_eq!(age_label(TimeDelta::seconds(5 * 60 + 3)).0, "5m");
        assert_eq!(age_label(TimeDelta::hours(3)).0, "3h");
        assert_eq!(age_label(TimeDelta::days(2) + TimeDelta::hours(5)).0, "2d");
        assert_eq!(age_label(TimeDelta::seconds(-5)).0, "0s");
        assert_eq!(age_label(TimeDelta::days(9)).1, cube(3, 3, 3));
    }

    #[test]
    fn flags_distinguish_own_posts() {
        let mut p = post(1, user(2, "bob"), "x");
        assert_eq!(flag(&p, false), None);
        p.reposted = true;
        assert_eq!(flag(&p, false), Some((1, "R".into(), cube(0, 5, 0))));
        p.favorited = true;
        assert_eq!(flag(&p, false), Some((0, "L".into(), cube(5, 0, 0))));

        let mut own = post(2, user(100, "me"), "x");
        own.repost_count = 3;
        assert_eq!(flag(&own, true), Some((1, "3".into(), cube(0, 5, 0))));
        own.favorite_count = 12;
        assert_eq!(flag(&own, true), Some((0, "+".into(), cube(5, 0, 0))));
    }

    #[test]
    fn media_markers() {
        let mut p = post(1, user(2, "bob"), "look");
        assert_eq!(media_marker(&p), None);
        let media = |kind| Entity {
            start: 0,
            end: 4,
            kind: EntityKind::Media {
                kind,
                url: "u".into(),
                display_url: "d".into(),
                expanded_url: "e".into(),
            },
        };
        p.entities = vec![media(MediaKind::Photo)];
        assert_eq!(media_marker(&p).as_deref(), Some("img"));
        p.entities.push(media(MediaKind::Photo));
        assert_eq!(media_marker(&p).as_deref(), Some("i:2"));
        p.entities = vec![media(MediaKind::AnimatedGif)];
        assert_eq!(media_marker(&p).as_deref(), Some("gif"));
    }

    #[test]
    fn post_row_lays_out_columns() {
        let app = app_with(vec![post(1, user(2, "bob"), "hello world")]);
        let mut node = LineNode::new(Line::Post(1), 60);
        node.set_props(LineProps {
            selected: true,
            ..Default::default()
        });
        assert!(draw(&mut node, &app, 0));

        let canvas = node.base().canvas();
        assert_eq!(cells(canvas, 0..3), "  >");
        assert_eq!(cells(canvas, 7..11), "@bob");
        assert_eq!(cells(canvas, 26..37), "hello world");
        assert_eq!(cells(canvas, 57..60), "30s");
    }

    #[test]
    fn unchanged_stamp_skips_recompute() {
        let app = app_with(vec![post(1, user(2, "bob"), "hi")]);
        let mut node = LineNode::new(Line::Post(1), 60);
        assert!(draw(&mut node, &app, 0));
        node.render(&mut Buffer::empty(Rect::new(0, 0, 60, 1)), Rect::new(0, 0, 60, 1));
        assert!(!draw(&mut node, &app, 1));

        node.set_props(LineProps {
            revision: 1,
            ..Default::default()
        });
        assert!(draw(&mut node, &app, 2));
    }

    #[test]
    fn new_avatar_summary_recomputes_the_row() {
        let mut app = app_with(vec![post(1, user(2, "bob"), "hi")]);
        let mut node = LineNode::new(Line::Post(1), 60);
        assert!(draw(&mut node, &app, 0));
        node.render(&mut Buffer::empty(Rect::new(0, 0, 60, 1)), Rect::new(0, 0, 60, 1));
        assert!(!draw(&mut node, &app, 1));

        let red = [255, 0, 0];
        app.images.publish(ImageResult {
            user_id: 2,
            summary: ImageSummary::from_palette("https://img.example/bob.png", [red, red], 4),
        });
        assert!(draw(&mut node, &app, 2));
        assert_eq!(node.base().canvas()[(7, 0)].fg, palette::avatar_color(red));
    }

    #[test]
    fn repost_row_shows_the_shared_post_flags() {
        let mut original = post(1, user(2, "bob"), "hi");
        original.favorited = true;
        let shared = repost(3, user(4, "cat"), &original);
        let mut app = test_app();
        app.store.ingest(Incoming {
            post: shared,
            original: Some(original),
        });
        let mut node = LineNode::new(Line::Post(3), 60);
        draw(&mut node, &app, 0);
        assert_eq!(cells(node.base().canvas(), 4..5), "L");
    }

    #[test]
    fn columns_follow_a_width_change() {
        let app = app_with(vec![post(1, user(2, "bob"), "hi")]);
        let mut node = LineNode::new(Line::Post(1), 60);
        draw(&mut node, &app, 0);
        node.resize(Rect::new(0, 0, 80, 1));
        draw(&mut node, &app, 1);
        assert_eq!(node.columns, ColumnBounds::resolve(80));
        assert_eq!(cells(node.base().canvas(), 77..80), "30s");
    }

    #[test]
    fn reveal_hides_text_behind_the_trailer() {
        let app = app_with(vec![post(1, user(2, "bob"), "abcdefghijklmnopqrstuvwxyz")]);
        let mut node = LineNode::new(Line::Post(1), 80);
        node.set_props(LineProps {
            arrived: Some(0),
            ..Default::default()
        });

        // Default speed is one cell per frame at the default rate.
        draw(&mut node, &app, 25);
        let canvas = node.base().canvas();
        assert_eq!(cells(canvas, 26..31), "abcde");
        assert_eq!(cells(canvas, 46..51), "▒▒▒▓ ");
        assert!(canvas[(50, 0)].modifier.contains(Modifier::REVERSED));
        assert_eq!(cells(canvas, 51..53), "  ");

        draw(&mut node, &app, 200);
        let canvas = node.base().canvas();
        assert_eq!(cells(canvas, 26..52), "abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn wide_posts_skip_the_reveal() {
        let app = app_with(vec![post(1, user(2, "bob"), "日本語")]);
        let mut node = LineNode::new(Line::Post(1), 80);
        node.set_props(LineProps {
            arrived: Some(0),
            ..Default::default()
        });
        draw(&mut node, &app, 1);
        assert_eq!(node.base().canvas()[(26, 0)].symbol(), "日");
    }

    #[test]
    fn marker_spins() {
        let app = test_app();
        let mut node = LineNode::new(Line::StreamMarker, 40);
        draw(&mut node, &app, 0);
        assert_eq!(cells(node.base().canvas(), 7..19), "Streaming...");
        assert!(draw(&mut node, &app, 3));
        assert_eq!(node.base().canvas()[(20, 0)].symbol(), "\\");
    }
}
