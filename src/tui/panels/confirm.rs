use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};

use crate::core::action::ActionRequest;
use crate::tui::columns::{ColumnKind, left_of};
use crate::tui::event::TuiEvent;
use crate::tui::palette;
use crate::tui::panels::{EventHandler, glow};
use crate::tui::scene::{Node, NodeBase, SceneContext, fill_row, put};

const BAR_ROW: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent {
    Accept(ActionRequest),
    Deny,
}

/// Asks before a repost or a delete goes out.
pub struct ConfirmPanel {
    base: NodeBase,
    pending: Option<ActionRequest>,
    glow: Option<Color>,
}

impl ConfirmPanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            pending: None,
            glow: None,
        }
    }

    pub fn ask(&mut self, request: ActionRequest) {
        self.pending = Some(request);
        self.base.request_recompute();
    }

    pub fn pending(&self) -> Option<&ActionRequest> {
        self.pending.as_ref()
    }

    /// Keys that accept, the question, and the bar colour.
    fn prompt(&self) -> Option<(&'static [char], &'static str, [u8; 3])> {
        match self.pending.as_ref()? {
            ActionRequest::Repost(_) => Some((
                &['e', 'y', 'Y'][..],
                " Really repost this post? eyY/nN ",
                [1, 5, 1],
            )),
            ActionRequest::Delete(_) => Some((
                &['d', 'y', 'Y'][..],
                " Really delete this post? dyY/nN ",
                [5, 1, 1],
            )),
            _ => Some((&['y', 'Y'][..], " Really? yY/nN ", [5, 5, 1])),
        }
    }
}

impl EventHandler for ConfirmPanel {
    type Event = ConfirmEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<ConfirmEvent> {
        let (accept, _, _) = self.prompt()?;
        let accepted = match event {
            TuiEvent::Enter => true,
            TuiEvent::Char(c) if accept.contains(c) => true,
            TuiEvent::Char('n' | 'N') | TuiEvent::Escape => false,
            _ => return None,
        };
        let request = self.pending.take()?;
        Some(if accepted {
            ConfirmEvent::Accept(request)
        } else {
            ConfirmEvent::Deny
        })
    }
}

impl Node for ConfirmPanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn tick(&mut self, _frames: u64, ctx: &SceneContext) {
        let Some((_, _, rgb)) = self.prompt() else {
            return;
        };
        let phase = ctx.frame as f32 / ctx.fps().max(1) as f32 * std::f32::consts::TAU;
        let color = glow(rgb, 0.7 + 0.3 * phase.sin());
        if self.glow != Some(color) {
            self.glow = Some(color);
            self.base.request_recompute();
        }
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let Some((_, question, rgb)) = self.prompt() else {
            return;
        };
        let bar = Style::default()
            .fg(self.glow.unwrap_or_else(|| glow(rgb, 1.0)))
            .add_modifier(Modifier::REVERSED);
        let left = left_of(ColumnKind::Username);
        let canvas = self.base.canvas_mut();
        put(canvas, left, 0, " v v v ", Style::default().fg(palette::CHROME));
        fill_row(canvas, BAR_ROW, bar);
        put(canvas, left, BAR_ROW, question, bar.add_modifier(Modifier::BOLD));
    }
}
