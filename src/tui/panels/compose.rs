//! Compose panel: a one-row editor for a new post or a reply.
//!
//! A trailing `\` followed by Enter inserts a line break instead of
//! sending, so multi-line posts can be typed without a modifier key.

use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use unicode_width::UnicodeWidthStr;

use crate::core::action::ActionRequest;
use crate::core::post::{PostId, User};
use crate::core::state::App;
use crate::core::store::PostRef;
use crate::tui::columns::{ColumnKind, left_of};
use crate::tui::event::TuiEvent;
use crate::tui::palette::{self, basic, cube};
use crate::tui::panels::{EventHandler, glow};
use crate::tui::scene::{Node, NodeBase, SceneContext, fill_row, put, put_right};

pub const MAX_LENGTH: usize = 280;

const BAR_ROW: u16 = 1;
const TEXT_ROW: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeEvent {
    Submit {
        text: String,
        reply_to: Option<PostId>,
    },
    Cancel,
}

pub struct ComposePanel {
    base: NodeBase,
    text: String,
    reply_to: Option<PostId>,
    glow: ratatui::style::Color,
}

impl ComposePanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            text: String::new(),
            reply_to: None,
            glow: cube(0, 3, 5),
        }
    }

    /// Starts a new draft, replacing whatever was typed before.
    pub fn open(&mut self, reply_to: Option<PostId>, prefill: String) {
        self.text = prefill;
        self.reply_to = reply_to;
        self.base.request_recompute();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn delete_word(&mut self) {
        let kept = self.text.trim_end().len();
        self.text.truncate(kept);
        let start = self
            .text
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());
        self.text.truncate(start);
    }
}

impl EventHandler for ComposePanel {
    type Event = ComposeEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<ComposeEvent> {
        match event {
            TuiEvent::Char(c) => self.text.push(*c),
            TuiEvent::Paste(data) => self.text.push_str(&data.replace("\r\n", "\n")),
            TuiEvent::Backspace => {
                self.text.pop();
            }
            TuiEvent::DeleteWord => self.delete_word(),
            TuiEvent::Enter if self.text.ends_with('\\') => {
                self.text.pop();
                self.text.push('\n');
            }
            TuiEvent::Enter => {
                if self.text.trim().is_empty() {
                    return None;
                }
                return Some(ComposeEvent::Submit {
                    text: std::mem::take(&mut self.text),
                    reply_to: self.reply_to.take(),
                });
            }
            TuiEvent::Escape => return Some(ComposeEvent::Cancel),
            _ => return None,
        }
        self.base.request_recompute();
        None
    }
}

impl Node for ComposePanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, _frames: u64, ctx: &SceneContext) {
        let phase = ctx.frame as f32 / ctx.fps().max(1) as f32 * std::f32::consts::TAU;
        let color = glow([0, 3, 5], 0.7 + 0.3 * phase.sin());
        if color != self.glow {
            self.glow = color;
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let width = self.base.width();
        let bar = Style::default()
            .fg(self.glow)
            .add_modifier(Modifier::REVERSED);
        let gray = Style::default().fg(palette::CHROME);
        let label = if self.reply_to.is_some() {
            " COMPOSE REPLY "
        } else {
            " COMPOSE UPDATE "
        };
        let length = self.text.chars().count();
        let counter = format!(" {length} / {MAX_LENGTH} ");
        let counter_style = if length > MAX_LENGTH {
            Style::default()
                .fg(cube(5, 0, 0))
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            bar.add_modifier(Modifier::BOLD)
        };
        let shown = visible_tail(&self.text, width.saturating_sub(left_of(ColumnKind::Username) + 2));

        let canvas = self.base.canvas_mut();
        let left = left_of(ColumnKind::Username);
        put(canvas, left, 0, " v v v ", gray);
        fill_row(canvas, BAR_ROW, bar);
        put(canvas, left, BAR_ROW, label, bar.add_modifier(Modifier::BOLD));
        put_right(canvas, width.saturating_sub(3), BAR_ROW, &counter, counter_style);

        put(
            canvas,
            0,
            TEXT_ROW,
            "  >",
            Style::default()
                .fg(basic(1, 1, 1, 1))
                .add_modifier(Modifier::BOLD),
        );
        let x = put(canvas, left, TEXT_ROW, &shown, Style::default().fg(basic(1, 1, 1, 1)));
        put(canvas, x, TEXT_ROW, "␣", Style::default().fg(basic(0, 1, 1, 1)));
    }
}

/// The end of `text` that fits in `width` cells, line breaks shown as `↵`.
fn visible_tail(text: &str, width: u16) -> String {
    let display: String = text
        .chars()
        .map(|c| match c {
            '\n' => '↵',
            '\t' => ' ',
            c => c,
        })
        .collect();
    let mut start = 0;
    let mut rest = display.as_str();
    while rest.width() > width as usize {
        let Some(c) = rest.chars().next() else {
            break;
        };
        start += c.len_utf8();
        rest = &display[start..];
    }
    rest.to_string()
}

/// Draft text for a reply: the author, and with `all` everyone the post
/// mentions, minus the viewer.
pub fn reply_prefill(post: PostRef<'_>, viewer: Option<&User>, all: bool) -> String {
    let root = post.root();
    let mut handles = vec![root.author().handle.clone()];
    if all {
        handles.extend(root.post().mentioned_handles());
        if post.id() != root.id() {
            handles.push(post.author().handle.clone());
        }
    }
    let mut out = String::new();
    let mut seen: Vec<String> = Vec::new();
    for handle in handles {
        let lower = handle.to_lowercase();
        let is_viewer = viewer.is_some_and(|v| v.handle.eq_ignore_ascii_case(&handle));
        if is_viewer || seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        out.push('@');
        out.push_str(&handle);
        out.push(' ');
    }
    out
}

/// The request a submitted draft becomes. A reply that does not mention
/// the author of its target goes out as a plain post.
pub fn request_for(app: &App, text: String, reply_to: Option<PostId>) -> ActionRequest {
    let target = reply_to.and_then(|id| app.store.fetch(id));
    match target {
        Some(target) => {
            let needle = format!("@{}", target.author().handle.to_lowercase());
            if text.to_lowercase().contains(&needle) {
                ActionRequest::Reply {
                    text,
                    to: target.id(),
                }
            } else {
                ActionRequest::Post { text }
            }
        }
        None => ActionRequest::Post { text },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Incoming;
    use crate::test_support::{mention, post, repost, test_app, user};
    use crate::tui::palette::Palette;

    fn typed(panel: &mut ComposePanel, text: &str) {
        for c in text.chars() {
            panel.handle_event(&TuiEvent::Char(c));
        }
    }

    fn row(panel: &ComposePanel, y: u16, range: std::ops::Range<u16>) -> String {
        range
            .map(|x| panel.base().canvas()[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn backslash_enter_inserts_a_line_break() {
        let mut panel = ComposePanel::new(Rect::new(0, 0, 60, 4));
        typed(&mut panel, "one\\");
        assert_eq!(panel.handle_event(&TuiEvent::Enter), None);
        typed(&mut panel, "two");
        assert_eq!(panel.text(), "one\ntwo");
        assert_eq!(
            panel.handle_event(&TuiEvent::Enter),
            Some(ComposeEvent::Submit {
                text: "one\ntwo".into(),
                reply_to: None
            })
        );
        assert_eq!(panel.text(), "");
    }

    #[test]
    fn empty_drafts_are_not_sent() {
        let mut panel = ComposePanel::new(Rect::new(0, 0, 60, 4));
        typed(&mut panel, "   ");
        assert_eq!(panel.handle_event(&TuiEvent::Enter), None);
        assert_eq!(panel.handle_event(&TuiEvent::Escape), Some(ComposeEvent::Cancel));
    }

    #[test]
    fn delete_word_and_backspace() {
        let mut panel = ComposePanel::new(Rect::new(0, 0, 60, 4));
        typed(&mut panel, "hello big world  ");
        panel.handle_event(&TuiEvent::DeleteWord);
        assert_eq!(panel.text(), "hello big ");
        panel.handle_event(&TuiEvent::Backspace);
        assert_eq!(panel.text(), "hello big");
        panel.handle_event(&TuiEvent::DeleteWord);
        panel.handle_event(&TuiEvent::DeleteWord);
        assert_eq!(panel.text(), "");
    }

    #[test]
    fn draws_label_counter_and_text() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut panel = ComposePanel::new(Rect::new(0, 0, 60, 4));
        panel.open(Some(1), "@bob ".into());
        typed(&mut panel, "hi");
        panel.draw(&ctx);

        assert_eq!(row(&panel, 1, 7..22), " COMPOSE REPLY ");
        assert_eq!(row(&panel, 1, 48..57), " 7 / 280 ");
        assert_eq!(row(&panel, 3, 0..3), "  >");
        assert_eq!(row(&panel, 3, 7..15), "@bob hi␣");
    }

    #[test]
    fn counter_turns_red_past_the_limit() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut panel = ComposePanel::new(Rect::new(0, 0, 60, 4));
        panel.open(None, "x".repeat(MAX_LENGTH + 1));
        panel.draw(&ctx);
        let counter = " 281 / 280 ";
        let start = 57 - counter.len() as u16;
        assert_eq!(row(&panel, 1, start..57), counter);
        assert_eq!(panel.base().canvas()[(start, 1)].fg, cube(5, 0, 0));
        // The text scrolls so the end stays visible.
        assert_eq!(row(&panel, 3, 57..59), "x␣");
    }

    #[test]
    fn reply_prefill_lists_author_then_mentions() {
        let mut app = test_app();
        let text = "@me and @ann look";
        let mut p = post(1, user(2, "bob"), text);
        p.entities = vec![mention(text, "@me", 100), mention(text, "@ann", 7)];
        app.store.ingest(Incoming::new(p.clone()));
        app.store.ingest(Incoming::new(repost(2, user(3, "cat"), &p)));

        let viewer = app.viewer();
        let single = app.store.fetch(1).unwrap();
        assert_eq!(reply_prefill(single, viewer, false), "@bob ");
        assert_eq!(reply_prefill(single, viewer, true), "@bob @ann ");
        let shared = app.store.fetch(2).unwrap();
        assert_eq!(reply_prefill(shared, viewer, true), "@bob @ann @cat ");
    }

    #[test]
    fn reply_without_the_author_becomes_a_post() {
        let mut app = test_app();
        app.store.ingest(Incoming::new(post(1, user(2, "Bob"), "hi")));
        assert_eq!(
            request_for(&app, "@bob sure".into(), Some(1)),
            ActionRequest::Reply {
                text: "@bob sure".into(),
                to: 1
            }
        );
        assert_eq!(
            request_for(&app, "sure".into(), Some(1)),
            ActionRequest::Post {
                text: "sure".into()
            }
        );
        assert_eq!(
            request_for(&app, "@bob sure".into(), Some(99)),
            ActionRequest::Post {
                text: "@bob sure".into()
            }
        );
    }
}
