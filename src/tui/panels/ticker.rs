//! # Activity Ticker
//!
//! Two rows at the bottom of the screen.
//!
//! ```text
//! IN   ◄── post  reply  fav            events from the stream scroll left
//! OUT                      fav  post ──►  outgoing actions pile up right
//! ```
//!
//! An outgoing action enters at the left edge and eases toward the right,
//! stopping next to the one before it. Once finished it lingers, turns
//! into noise halfway through its decay, and is then retired from the
//! tracker. The ones behind it slide on to close the gap.

use rand::Rng;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};

use crate::core::action::{ActionId, ActionStatus, OutgoingAction};
use crate::core::event::{NotificationKind, TickerKind};
use crate::tui::palette::{self, cube};
use crate::tui::scene::{Node, NodeBase, SceneContext, put};

const OUT_ROW: u16 = 0;
const IN_ROW: u16 = 1;
/// Fraction of the remaining distance an action moves per frame
const SLIDE: f32 = 0.1;
/// Frames a finished action stays on screen
const DECAY: u32 = 30;
/// Past this many decay frames the label turns to noise
const NOISE: u32 = 15;
/// Incoming events are dropped once they scroll this far past the left edge
const SENTINEL: i32 = -10;

struct Outgoing {
    id: ActionId,
    label: &'static str,
    status: ActionStatus,
    x: f32,
    decay: u32,
}

impl Outgoing {
    fn width(&self) -> u16 {
        self.label.len() as u16 + 2
    }

    fn color(&self) -> Color {
        match self.status {
            ActionStatus::Queued => palette::CHROME,
            ActionStatus::Started => cube(5, 5, 0),
            ActionStatus::Success => cube(0, 5, 0),
            ActionStatus::Failure => cube(4, 0, 0),
        }
    }
}

struct IncomingItem {
    kind: TickerKind,
    x: i32,
}

/// Label and colour of an incoming event.
fn incoming_label(kind: TickerKind) -> (&'static str, Color) {
    match kind {
        TickerKind::Post => ("post", cube(3, 5, 5)),
        TickerKind::Reply => ("reply", cube(5, 4, 3)),
        TickerKind::Repost => ("RT", cube(0, 5, 0)),
        TickerKind::Delete => ("delete", cube(5, 1, 1)),
        TickerKind::Notification(kind) => match kind {
            NotificationKind::Favorite => ("fav", cube(5, 1, 3)),
            NotificationKind::Unfavorite => ("unfav", cube(3, 1, 2)),
            NotificationKind::Repost => ("RT", cube(0, 5, 0)),
            NotificationKind::Follow => ("follow", cube(5, 5, 1)),
            NotificationKind::Unfollow => ("unfollow", cube(3, 3, 1)),
            NotificationKind::Other => ("event", palette::CHROME),
        },
    }
}

pub struct TickerPanel {
    base: NodeBase,
    outgoing: Vec<Outgoing>,
    incoming: Vec<IncomingItem>,
    /// Decayed actions the tracker has not dropped yet
    retired: Vec<ActionId>,
}

impl TickerPanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            retired: Vec::new(),
        }
    }

    /// Queues stream events to scroll in from the right.
    pub fn push_incoming(&mut self, kinds: &[TickerKind]) {
        let width = self.base.width() as i32;
        for kind in kinds {
            let x = self.incoming.last().map_or(width, |last| {
                let (label, _) = incoming_label(last.kind);
                (last.x + label.len() as i32 + 2).max(width)
            });
            self.incoming.push(IncomingItem { kind: *kind, x });
        }
        if !kinds.is_empty() {
            self.base.request_recompute();
        }
    }

    /// Actions whose decay ran out. The caller drops them from the tracker.
    pub fn take_retired(&mut self) -> Vec<ActionId> {
        std::mem::take(&mut self.retired)
    }

    fn sync_actions<'a>(&mut self, actions: impl Iterator<Item = &'a OutgoingAction>) {
        for action in actions {
            if self.retired.contains(&action.id) {
                continue;
            }
            match self.outgoing.iter_mut().find(|o| o.id == action.id) {
                Some(entry) => entry.status = action.status,
                None => self.outgoing.push(Outgoing {
                    id: action.id,
                    label: action.request.label(),
                    status: action.status,
                    x: 0.0,
                    decay: 0,
                }),
            }
        }
    }

    fn advance_outgoing(&mut self, frames: u64) {
        let frames = frames.min(u32::MAX as u64) as u32;
        for entry in &mut self.outgoing {
            if entry.status.is_finished() {
                entry.decay = entry.decay.saturating_add(frames);
            }
        }
        let retired: Vec<ActionId> = self
            .outgoing
            .iter()
            .filter(|o| o.decay >= DECAY)
            .map(|o| o.id)
            .collect();
        self.outgoing.retain(|o| o.decay < DECAY);
        self.retired.extend(retired);

        let mut right = self.base.width() as f32;
        for entry in &mut self.outgoing {
            let target = (right - entry.width() as f32).max(0.0);
            for _ in 0..frames {
                entry.x += (target - entry.x) * SLIDE;
            }
            right = target - 1.0;
        }
    }

    fn advance_incoming(&mut self, frames: u64) {
        let step = frames.min(i32::MAX as u64) as i32;
        for item in &mut self.incoming {
            item.x -= step;
        }
        self.incoming.retain(|item| item.x > SENTINEL);
    }
}

impl Node for TickerPanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, frames: u64, ctx: &SceneContext) {
        let busy = !self.outgoing.is_empty() || !self.incoming.is_empty();
        self.sync_actions(ctx.app.actions.iter());
        self.advance_outgoing(frames);
        self.advance_incoming(frames);
        if busy || !self.outgoing.is_empty() || !self.incoming.is_empty() {
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let width = self.base.width() as i32;
        let mut rng = rand::thread_rng();
        let outgoing: Vec<(u16, String, Style)> = self
            .outgoing
            .iter()
            .map(|entry| {
                let text = if entry.decay > NOISE {
                    (0..entry.label.len())
                        .map(|_| rng.gen_range(33u8..127) as char)
                        .collect()
                } else {
                    entry.label.to_string()
                };
                let mut style = Style::default().fg(entry.color());
                if entry.status == ActionStatus::Failure {
                    style = style.add_modifier(Modifier::BOLD);
                }
                (entry.x.round() as u16, format!(" {text} "), style)
            })
            .collect();

        let canvas = self.base.canvas_mut();
        for (x, text, style) in &outgoing {
            put(canvas, *x, OUT_ROW, text, *style);
        }
        for item in &self.incoming {
            let (label, color) = incoming_label(item.kind);
            let text = format!(" {label} ");
            // Clip what has already scrolled past the left edge.
            let skip = (-item.x).max(0) as usize;
            if item.x >= width || skip >= text.len() {
                continue;
            }
            put(
                canvas,
                item.x.max(0) as u16,
                IN_ROW,
                &text[skip..],
                Style::default().fg(color),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{ActionRequest, ActionUpdate};
    use crate::test_support::{epoch, test_app};
    use crate::tui::palette::Palette;

    fn row(panel: &TickerPanel, y: u16) -> String {
        (0..panel.base().width())
            .map(|x| panel.base().canvas()[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn incoming_events_scroll_left_and_drop_off() {
        let app = test_app();
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut ticker = TickerPanel::new(Rect::new(0, 0, 20, 2));
        ticker.push_incoming(&[TickerKind::Post, TickerKind::Delete]);

        ticker.tick(6, &ctx);
        ticker.draw(&ctx);
        assert_eq!(row(&ticker, IN_ROW), format!("{}post ", " ".repeat(15)));

        ticker.tick(14, &ctx);
        ticker.draw(&ctx);
        assert!(row(&ticker, IN_ROW).starts_with(" post  delete "));

        ticker.tick(2, &ctx);
        ticker.draw(&ctx);
        assert!(row(&ticker, IN_ROW).starts_with("ost  delete "));

        ticker.tick(30, &ctx);
        assert!(ticker.incoming.is_empty());
    }

    #[test]
    fn outgoing_actions_slide_right_then_retire() {
        let mut app = test_app();
        let id = app.actions.queue(ActionRequest::Favorite(1));
        let palette = Palette::default();
        let mut ticker = TickerPanel::new(Rect::new(0, 0, 20, 2));
        {
            let ctx = SceneContext::new(&app, &palette, 0);
            ticker.tick(1, &ctx);
            assert!(ticker.outgoing[0].x > 0.0);
            ticker.tick(200, &ctx);
            ticker.draw(&ctx);
            assert!(row(&ticker, OUT_ROW).ends_with(" fav "));
        }

        app.actions.apply(
            ActionUpdate::Finished {
                id,
                result: Err("boom".into()),
            },
            epoch(),
        );
        let ctx = SceneContext::new(&app, &palette, 0);
        ticker.tick(1, &ctx);
        ticker.draw(&ctx);
        assert_eq!(ticker.base().canvas()[(16, OUT_ROW)].fg, cube(4, 0, 0));

        ticker.tick(DECAY as u64, &ctx);
        assert!(ticker.outgoing.is_empty());
        // Not re-added while the tracker still holds it.
        ticker.tick(1, &ctx);
        assert!(ticker.outgoing.is_empty());
        assert_eq!(ticker.take_retired(), vec![id]);
    }

    #[test]
    fn later_actions_stop_next_to_earlier_ones() {
        let mut app = test_app();
        app.actions.queue(ActionRequest::Favorite(1));
        app.actions.queue(ActionRequest::Repost(1));
        let palette = Palette::default();
        let ctx = SceneContext::new(&app, &palette, 0);
        let mut ticker = TickerPanel::new(Rect::new(0, 0, 30, 2));
        ticker.tick(300, &ctx);
        ticker.draw(&ctx);
        assert!(row(&ticker, OUT_ROW).ends_with(" RT   fav "));
    }
}
