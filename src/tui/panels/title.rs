use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use unicode_width::UnicodeWidthStr;

use crate::tui::columns::{ColumnKind, left_of};
use crate::tui::palette::basic;
use crate::tui::scene::{Node, NodeBase, SceneContext, fill_row, put, put_right};

/// What the title bar shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleState {
    pub focused: bool,
    pub tabs: Vec<String>,
    pub current: usize,
    pub viewer: String,
}

/// Tab strip, current user and the column headers.
pub struct TitlePanel {
    base: NodeBase,
    state: TitleState,
}

impl TitlePanel {
    pub fn new(area: Rect) -> Self {
        Self {
            base: NodeBase::new(area),
            state: TitleState::default(),
        }
    }

    pub fn set_state(&mut self, state: TitleState) {
        if state != self.state {
            self.state = state;
            self.base.request_recompute();
        }
    }
}

impl Node for TitlePanel {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn recompute(&mut self, _ctx: &SceneContext) {
        let strong = Modifier::BOLD | Modifier::REVERSED;
        let (bar, label) = if self.state.focused {
            (basic(0, 1, 1, 1), basic(0, 1, 1, 0))
        } else {
            (basic(0, 0, 0, 1), basic(0, 0, 0, 1))
        };
        let bar = Style::default().fg(bar).add_modifier(strong);
        let label = Style::default().fg(label).add_modifier(strong);
        let dim = Style::default().fg(basic(0, 0, 0, 1)).add_modifier(strong);
        let width = self.base.width();
        let canvas = self.base.canvas_mut();

        let mut x = 3;
        for (i, name) in self.state.tabs.iter().enumerate() {
            let text = format!(" {}:{} ", i + 1, name.to_uppercase());
            let style = if i == self.state.current { label } else { dim };
            x = put(canvas, x, 1, &text, style) + 1;
        }

        if !self.state.viewer.is_empty() {
            let user = format!(" CURRENT USER: @{} ", self.state.viewer);
            let right = width.saturating_sub(3);
            if right as usize >= x as usize + user.width() {
                put_right(canvas, right, 1, &user, label);
            }
        }

        fill_row(canvas, 2, bar);
        put(canvas, left_of(ColumnKind::Username), 2, "USER", bar);
        put(canvas, left_of(ColumnKind::Body), 2, "POST", bar);
    }
}
