//! # Detail Panel
//!
//! The selected post over several rows. Line-break glyphs start a new
//! row here instead of showing as symbols. When the post replies to a
//! stored post, the parent is shown underneath.
//!
//! ```text
//! row 0  ███ @bob << @cat ████████████ ♥ 3 ⟳ 1  2024-05-01 12:00:00  web ███
//! row 2        hello @ann, see example.com/x
//!              second line
//! row 5        ^ ^ ^
//! row 6        @ann              what do you think?
//! ```
//!
//! With focus, Left/Right step an entity cursor through the mentions,
//! hashtags, links and media of the post; pieces of one entity highlight
//! together.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use unicode_width::UnicodeWidthChar;

use crate::core::images::ImageSummary;
use crate::core::pieces::{Piece, PieceRole, Pieces};
use crate::core::post::{EntityKind, PostId};
use crate::core::state::App;
use crate::core::store::PostRef;
use crate::tui::columns::{ColumnKind, left_of};
use crate::tui::event::TuiEvent;
use crate::tui::line::paint_username;
use crate::tui::palette::{self, RoleStyle, basic, username_style};
use crate::tui::panels::EventHandler;
use crate::tui::scene::{Node, NodeBase, SceneContext, fill_row, put, put_right};

const BODY_ROW: u16 = 2;
const PARENT_MARK_ROW: u16 = 5;
const PARENT_ROW: u16 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailEvent {
    /// Put this text on the clipboard
    Copy(String),
    /// Open this URL in a browser
    Open(String),
    Exit,
}

/// Something the entity cursor can land on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    group: usize,
    copy: String,
    open: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Shown {
    post: Option<PostId>,
    revision: u64,
    focused: bool,
    cursor: Option<usize>,
    generations: Vec<u64>,
}

pub struct DetailPanel {
    base: NodeBase,
    shown: Shown,
    targets: Vec<Target>,
    /// Text and permalink of the whole post
    post_text: String,
    permalink: String,
}

impl DetailPanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            shown: Shown::default(),
            targets: Vec::new(),
            post_text: String::new(),
            permalink: String::new(),
        }
    }

    pub fn post(&self) -> Option<PostId> {
        self.shown.post
    }

    /// Points the panel at `post`. The entity cursor resets when the post
    /// changes.
    pub fn show(&mut self, app: &App, post: Option<PostId>, revision: u64) {
        if post != self.shown.post || revision != self.shown.revision {
            if post != self.shown.post {
                self.shown.cursor = None;
            }
            self.shown.post = post;
            self.shown.revision = revision;
            self.collect_targets(app);
            self.base.request_recompute();
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        if focused != self.shown.focused {
            self.shown.focused = focused;
            if !focused {
                self.shown.cursor = None;
            }
            self.base.request_recompute();
        }
    }

    fn collect_targets(&mut self, app: &App) {
        self.targets.clear();
        self.post_text.clear();
        self.permalink.clear();
        let Some(post) = self.shown.post.and_then(|id| app.store.fetch(id)) else {
            return;
        };
        let root = post.root();
        let web = &app.config.web_url;
        self.post_text = root.pieces().plain_text();
        self.permalink = root.post().permalink(web);
        for index in root.pieces().linking() {
            if let Some(piece) = root.pieces().get(index)
                && let Some(target) = target(piece, web)
            {
                self.targets.push(target);
            }
        }
        if let Some(cursor) = self.shown.cursor
            && cursor >= self.targets.len()
        {
            self.shown.cursor = None;
        }
    }

    fn step(&mut self, delta: isize) {
        if self.targets.is_empty() {
            return;
        }
        let len = self.targets.len() as isize;
        let next = match self.shown.cursor {
            None if delta < 0 => len - 1,
            None => 0,
            Some(i) => (i as isize + delta).rem_euclid(len),
        };
        self.shown.cursor = Some(next as usize);
        self.base.request_recompute();
    }

    fn selected_target(&self) -> Option<&Target> {
        self.shown.cursor.and_then(|i| self.targets.get(i))
    }

    fn highlighted_group(&self) -> Option<usize> {
        self.selected_target().map(|t| t.group)
    }
}

/// What copying and opening an entity piece means.
fn target(piece: &Piece, web: &str) -> Option<Target> {
    let web = web.trim_end_matches('/');
    let entity = piece.entity.as_ref()?;
    let (copy, open) = match &entity.kind {
        EntityKind::Mention { handle, .. } => (format!("@{handle}"), format!("{web}/{handle}")),
        EntityKind::Hashtag { tag } => (format!("#{tag}"), format!("{web}/hashtag/{tag}")),
        EntityKind::Link { expanded_url, .. } | EntityKind::Media { expanded_url, .. } => {
            (expanded_url.clone(), expanded_url.clone())
        }
    };
    Some(Target {
        group: piece.group,
        copy,
        open,
    })
}

impl EventHandler for DetailPanel {
    type Event = DetailEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<DetailEvent> {
        match event {
            TuiEvent::Left | TuiEvent::Char('h') => {
                self.step(-1);
                None
            }
            TuiEvent::Right | TuiEvent::Char('l') | TuiEvent::Tab => {
                self.step(1);
                None
            }
            TuiEvent::Char('y') => Some(DetailEvent::Copy(
                self.selected_target()
                    .map_or_else(|| self.post_text.clone(), |t| t.copy.clone()),
            )),
            TuiEvent::Char('Y') => Some(DetailEvent::Copy(self.permalink.clone())),
            TuiEvent::Char('o') => Some(DetailEvent::Open(
                self.selected_target()
                    .map_or_else(|| self.permalink.clone(), |t| t.open.clone()),
            )),
            TuiEvent::Escape | TuiEvent::Enter | TuiEvent::Char('q') => Some(DetailEvent::Exit),
            _ => None,
        }
    }
}

impl Node for DetailPanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, _frames: u64, ctx: &SceneContext) {
        let Some(post) = self.shown.post.and_then(|id| ctx.app.store.fetch(id)) else {
            return;
        };
        let mut users = vec![post.author().id, post.root().author().id];
        if let Some(parent) = post.parent() {
            users.push(parent.author().id);
        }
        let generations: Vec<u64> = users.iter().map(|u| ctx.app.images.generation(*u)).collect();
        if generations != self.shown.generations {
            self.shown.generations = generations;
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, ctx: &SceneContext) {
        let highlight = self.highlighted_group();
        let focused = self.shown.focused;
        let width = self.base.width();
        let height = self.base.height();
        let canvas = self.base.canvas_mut();

        let bar = Style::default()
            .fg(if focused { basic(0, 1, 1, 1) } else { palette::CHROME })
            .add_modifier(Modifier::REVERSED);
        fill_row(canvas, 0, bar);

        let Some(post) = self.shown.post.and_then(|id| ctx.app.store.fetch(id)) else {
            return;
        };
        paint_infobar(canvas, post, bar, width);

        let left = left_of(ColumnKind::Username);
        let right = width.saturating_sub(2);
        let parent = post.parent();
        let bottom = if parent.is_some() {
            PARENT_MARK_ROW.min(height)
        } else {
            height
        };
        let root = post.root();
        let mut flow = Flow {
            x: left,
            y: BODY_ROW,
            left,
            right,
            bottom,
        };
        flow.pieces(canvas, root.pieces(), highlight, ctx);

        if let Some(parent) = parent {
            let gray = Style::default().fg(palette::CHROME);
            put(canvas, left, PARENT_MARK_ROW, " ^ ^ ^ ", gray);
            paint_username(
                canvas,
                (left, PARENT_ROW),
                left_of(ColumnKind::Body),
                &parent.author().at_handle(),
                ctx.app.images.get(parent.author().id),
                Modifier::empty(),
            );
            let body = left_of(ColumnKind::Body);
            let mut flow = Flow {
                x: body,
                y: PARENT_ROW,
                left: body,
                right,
                bottom: height,
            };
            flow.pieces(canvas, parent.root().pieces(), None, ctx);
        }
    }
}

fn paint_infobar(canvas: &mut Buffer, post: PostRef<'_>, bar: Style, width: u16) {
    let root = post.root();
    let strong = bar.add_modifier(Modifier::BOLD);
    let mut author = root.author().at_handle();
    if root.id() != post.id() {
        author.push_str(&format!(" << {}", post.author().at_handle()));
    }
    let end = put(canvas, left_of(ColumnKind::Username), 0, &author, strong);

    let created = root
        .post()
        .created_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");
    let info = format!(
        " ♥ {} ⟳ {}  {}  {} ",
        root.post().favorite_count,
        root.post().repost_count,
        created,
        root.post().source
    );
    let right = width.saturating_sub(3);
    if right as usize > end as usize + unicode_width::UnicodeWidthStr::width(info.as_str()) {
        put_right(canvas, right, 0, &info, bar);
    }
}

/// A text cursor that wraps at `right` and stops at `bottom`.
struct Flow {
    x: u16,
    y: u16,
    left: u16,
    right: u16,
    bottom: u16,
}

impl Flow {
    fn newline(&mut self) {
        self.x = self.left;
        self.y += 1;
    }

    fn put_char(&mut self, canvas: &mut Buffer, ch: char, style: Style) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            return;
        }
        if self.x + width > self.right {
            self.newline();
        }
        if self.y >= self.bottom {
            return;
        }
        let mut buf = [0u8; 4];
        self.x = put(canvas, self.x, self.y, ch.encode_utf8(&mut buf), style);
    }

    fn pieces(
        &mut self,
        canvas: &mut Buffer,
        pieces: &Pieces,
        highlight: Option<usize>,
        ctx: &SceneContext,
    ) {
        let selected = Style::default()
            .fg(basic(1, 1, 1, 1))
            .add_modifier(Modifier::BOLD | Modifier::REVERSED);
        for piece in pieces.iter() {
            if self.y >= self.bottom {
                return;
            }
            let highlighted = highlight == Some(piece.group) && piece.entity.is_some();
            match ctx.palette.detail(piece.role) {
                RoleStyle::Hidden => {}
                RoleStyle::Whitespace(style) => match piece.role {
                    PieceRole::Whitespace(glyph) if glyph.is_line_break() => self.newline(),
                    _ => {
                        for _ in 0..4 {
                            self.put_char(canvas, ' ', style);
                        }
                    }
                },
                RoleStyle::Username(modifiers) => {
                    let summary = mention_summary(piece, ctx);
                    for (i, ch) in piece.text.chars().enumerate() {
                        let style = if highlighted {
                            selected
                        } else {
                            username_style(summary, i, modifiers)
                        };
                        self.put_char(canvas, ch, style);
                    }
                }
                RoleStyle::Plain(style) => {
                    let style = if highlighted { selected } else { style };
                    for ch in piece.text.chars() {
                        self.put_char(canvas, ch, style);
                    }
                }
            }
        }
    }
}

fn mention_summary<'a>(piece: &Piece, ctx: &SceneContext<'a>) -> Option<&'a ImageSummary> {
    match piece.entity.as_ref().map(|e| &e.kind) {
        Some(EntityKind::Mention { user_id, .. }) => ctx.app.images.get(*user_id),
        _ => None,
    }
}
