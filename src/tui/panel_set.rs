//! # Panel Set
//!
//! Places the panels, routes input by mode and runs the node phases in
//! paint order.
//!
//! ```text
//!  y 0      title     (4 rows)
//!  y 4      feed      (H - 17 rows)
//!  y H-12   detail    (9 rows)
//!  y H-7      compose (4 rows, compose mode only)
//!  y H-6      confirm (3 rows, confirm mode only)
//!  y H-4      notice  (1 row, centered, while showing)
//!  y H-2    ticker    (2 rows)
//! ```
//!
//! Compose, confirm and notice sit on top of the detail panel. When one of
//! them hides, whatever it covered is painted again.

use std::rc::Rc;

use log::{debug, info};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use crate::coordinator::Drained;
use crate::core::action::ActionRequest;
use crate::core::post::PostId;
use crate::core::state::App;
use crate::core::view::{Line, ViewFilter};
use crate::tui::desktop::{Desktop, copy_with_notice, open_with_notice};
use crate::tui::event::TuiEvent;
use crate::tui::palette::Palette;
use crate::tui::panels::compose::{reply_prefill, request_for};
use crate::tui::panels::title::TitleState;
use crate::tui::panels::{
    ComposeEvent, ComposePanel, ConfirmEvent, ConfirmPanel, DetailEvent, DetailPanel,
    EventHandler, FeedPanel, NoticePanel, TickerPanel, TitlePanel,
};
use crate::tui::scene::{Node, SceneContext};

/// Rows the mouse wheel scrolls per notch.
const WHEEL_STEP: isize = 3;
/// Tabs reachable with the number keys.
const MAX_TABS: usize = 9;

/// Modal input mode: determines which panel keystrokes go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Timeline,
    /// Entity cursor in the detail panel
    Detail,
    Compose,
    Confirm,
}

/// Absolute placement of every panel for one terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub title: Rect,
    pub feed: Rect,
    pub detail: Rect,
    pub compose: Rect,
    pub confirm: Rect,
    pub notice: Rect,
    pub ticker: Rect,
}

impl Layout {
    pub fn new(width: u16, height: u16) -> Self {
        let from_bottom = |rows: u16| height.saturating_sub(rows);
        Self {
            title: Rect::new(0, 0, width, 4.min(height)),
            feed: Rect::new(0, 4, width, height.saturating_sub(17).max(1)),
            detail: Rect::new(0, from_bottom(12), width, 9),
            compose: Rect::new(0, from_bottom(7), width, 4),
            confirm: Rect::new(0, from_bottom(6), width, 3),
            notice: Rect::new(0, from_bottom(4), width, 1),
            ticker: Rect::new(0, from_bottom(2), width, 2),
        }
    }
}

pub struct PanelSet {
    mode: Mode,
    layout: Layout,
    palette: Rc<Palette>,
    desktop: Box<dyn Desktop>,
    /// First key of a two-key command (`gg`, `zt`, `zz`, `zb`)
    prefix: Option<char>,
    /// Post the reply tree was last built around
    tree_seed: Option<PostId>,
    frame: u64,
    title: TitlePanel,
    feed: FeedPanel,
    detail: DetailPanel,
    notice: NoticePanel,
    compose: ComposePanel,
    confirm: ConfirmPanel,
    ticker: TickerPanel,
}

impl PanelSet {
    pub fn new(app: &App, width: u16, height: u16, desktop: Box<dyn Desktop>) -> Self {
        let layout = Layout::new(width, height);
        let mut compose = ComposePanel::new(layout.compose);
        compose.base_mut().set_visible(false);
        let mut confirm = ConfirmPanel::new(layout.confirm);
        confirm.base_mut().set_visible(false);
        Self {
            mode: Mode::Timeline,
            layout,
            palette: Rc::new(Palette::from_config(&app.config.colors)),
            desktop,
            prefix: None,
            tree_seed: None,
            frame: 0,
            title: TitlePanel::new(layout.title),
            feed: FeedPanel::new(layout.feed),
            detail: DetailPanel::new(layout.detail),
            notice: NoticePanel::new(layout.notice),
            compose,
            confirm,
            ticker: TickerPanel::new(layout.ticker),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tab(&self) -> usize {
        self.feed.tab()
    }

    /// Panels in paint order.
    fn nodes_mut(&mut self) -> [&mut dyn Node; 7] {
        [
            &mut self.title,
            &mut self.feed,
            &mut self.detail,
            &mut self.notice,
            &mut self.compose,
            &mut self.confirm,
            &mut self.ticker,
        ]
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        debug!("Mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.compose.base_mut().set_visible(mode == Mode::Compose);
        self.confirm.base_mut().set_visible(mode == Mode::Confirm);
        self.detail.set_focused(mode == Mode::Detail);
        self.detail.base_mut().request_paint();
        if self.notice.is_showing() {
            self.notice.base_mut().request_paint();
        }
    }

    fn notify(&mut self, app: &App, text: impl Into<String>) {
        let frames = (app.config.notice_seconds * app.config.fps as f32).round() as u64;
        self.notice.show(text, frames);
    }

    // ========================================================================
    // Loop Phases
    // ========================================================================

    /// Feeds what the coordinator applied into the animations.
    pub fn apply_drained(&mut self, drained: &Drained) {
        self.feed.note_arrivals(&drained.shown, self.frame);
        self.ticker.push_incoming(&drained.incoming);
    }

    /// Brings app-side state in line with the panels, then advances every
    /// visible panel by `frames`.
    pub fn tick(&mut self, app: &mut App, frames: u64) {
        self.frame += frames;
        for id in self.ticker.take_retired() {
            app.actions.retire(id);
        }
        self.feed.sync(app);

        let tab = self.feed.tab();
        let (selected, revision) = app
            .store
            .view(tab)
            .map(|view| {
                let revision = view.line(view.selected()).map_or(0, |l| l.revision);
                (view.selected_post(), revision)
            })
            .unwrap_or((None, 0));
        if selected.is_some() && selected != self.tree_seed {
            app.store.rebuild_reply_tree(selected);
            self.tree_seed = selected;
        }
        self.detail.show(app, selected, revision);
        self.title.set_state(TitleState {
            focused: self.mode == Mode::Timeline,
            tabs: app.store.views().iter().map(|v| v.name.clone()).collect(),
            current: tab,
            viewer: app.viewer().map(|v| v.at_handle()).unwrap_or_default(),
        });

        let frame = self.frame;
        let palette = Rc::clone(&self.palette);
        let ctx = SceneContext::new(app, &palette, frame);
        for node in self.nodes_mut() {
            if node.base().is_visible() {
                node.tick(frames, &ctx);
            }
        }
    }

    /// Recomputes whatever changed. Returns whether anything waits to be
    /// rendered.
    pub fn draw(&mut self, app: &App) -> bool {
        let palette = Rc::clone(&self.palette);
        let ctx = SceneContext::new(app, &palette, self.frame);
        let mut pending = false;
        for node in self.nodes_mut() {
            if node.base().is_visible() || node.base().needs_paint() {
                pending |= node.draw(&ctx);
            }
        }
        pending
    }

    /// Paints pending panels onto `surface` in order. A panel that hid
    /// gets the panels under it painted again; a panel that painted gets
    /// the ones above it painted again. Returns whether anything painted.
    pub fn render(&mut self, surface: &mut Buffer) -> bool {
        let clip = surface.area;
        let nodes = self.nodes_mut();
        let vacated: Vec<Rect> = nodes
            .iter()
            .filter(|n| !n.base().is_visible() && n.base().needs_paint())
            .map(|n| n.base().area())
            .collect();

        let mut painted: Vec<Rect> = Vec::new();
        for node in nodes {
            let area = node.base().area();
            if node.base().is_visible()
                && vacated
                    .iter()
                    .chain(painted.iter())
                    .any(|r| r.intersects(area))
            {
                node.base_mut().request_paint();
            }
            if node.render(surface, clip) && node.base().is_visible() {
                painted.push(area);
            }
        }
        !painted.is_empty() || !vacated.is_empty()
    }

    /// Paints every visible panel again on the next render, e.g. after
    /// the surface was replaced.
    pub fn repaint_all(&mut self) {
        for node in self.nodes_mut() {
            node.base_mut().request_paint();
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        let layout = Layout::new(width, height);
        if layout == self.layout {
            return;
        }
        info!("Resized to {width}x{height}");
        self.layout = layout;
        self.title.resize(layout.title);
        self.feed.resize(layout.feed);
        self.detail.resize(layout.detail);
        self.notice.resize(layout.notice);
        self.compose.resize(layout.compose);
        self.confirm.resize(layout.confirm);
        self.ticker.resize(layout.ticker);
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Routes one input event. Returns an action to dispatch, if the event
    /// produced one.
    pub fn consume_input(&mut self, app: &mut App, event: &TuiEvent) -> Option<ActionRequest> {
        match event {
            TuiEvent::ForceQuit => {
                app.should_quit = true;
                return None;
            }
            TuiEvent::Resize(width, height) => {
                self.resize(*width, *height);
                return None;
            }
            _ => {}
        }
        match self.mode {
            Mode::Compose => match self.compose.handle_event(event)? {
                ComposeEvent::Submit { text, reply_to } => {
                    self.set_mode(Mode::Timeline);
                    Some(request_for(app, text, reply_to))
                }
                ComposeEvent::Cancel => {
                    self.set_mode(Mode::Timeline);
                    None
                }
            },
            Mode::Confirm => match self.confirm.handle_event(event)? {
                ConfirmEvent::Accept(request) => {
                    self.set_mode(Mode::Timeline);
                    Some(request)
                }
                ConfirmEvent::Deny => {
                    self.set_mode(Mode::Timeline);
                    None
                }
            },
            Mode::Detail => {
                let detail_event = self.detail.handle_event(event)?;
                self.apply_detail_event(app, detail_event);
                None
            }
            Mode::Timeline => self.timeline_key(app, event),
        }
    }

    fn apply_detail_event(&mut self, app: &App, event: DetailEvent) {
        let notice = match event {
            DetailEvent::Copy(text) => copy_with_notice(self.desktop.as_mut(), &text),
            DetailEvent::Open(url) => open_with_notice(self.desktop.as_mut(), &url),
            DetailEvent::Exit => {
                self.set_mode(Mode::Timeline);
                return;
            }
        };
        self.notify(app, notice);
    }

    fn timeline_key(&mut self, app: &mut App, event: &TuiEvent) -> Option<ActionRequest> {
        let tab = self.feed.tab();
        if let Some(prefix) = self.prefix.take() {
            let view = app.store.view_mut(tab)?;
            let selected = view.selected() as isize;
            let height = view.height() as isize;
            match (prefix, event) {
                ('g', TuiEvent::Char('g')) => view.select(0),
                ('z', TuiEvent::Char('t')) => view.scroll_to(selected),
                ('z', TuiEvent::Char('z')) => view.scroll_to(selected - height / 2),
                ('z', TuiEvent::Char('b')) => view.scroll_to(selected - height + 1),
                _ => {}
            }
            return None;
        }

        match event {
            TuiEvent::Char(c @ ('g' | 'z')) => self.prefix = Some(*c),
            TuiEvent::Char('q') => app.should_quit = true,
            TuiEvent::Char('j') | TuiEvent::Down => self.move_selection(app, |v| v.select_relative(1)),
            TuiEvent::Char('k') | TuiEvent::Up => self.move_selection(app, |v| v.select_relative(-1)),
            TuiEvent::PageDown => self.move_selection(app, |v| {
                let height = v.height() as isize;
                v.select_relative(height)
            }),
            TuiEvent::PageUp => self.move_selection(app, |v| {
                let height = v.height() as isize;
                v.select_relative(-height)
            }),
            TuiEvent::Home => self.move_selection(app, |v| v.select(0)),
            TuiEvent::End | TuiEvent::Char('G') => {
                self.move_selection(app, |v| v.select(v.len() as isize - 1))
            }
            TuiEvent::Char('H') => self.move_selection(app, |v| v.select(v.top() as isize)),
            TuiEvent::Char('M') => self.move_selection(app, |v| {
                let shown = v.height().min(v.len() - v.top());
                v.select((v.top() + shown.saturating_sub(1) / 2) as isize)
            }),
            TuiEvent::Char('L') => self.move_selection(app, |v| {
                v.select((v.top() + v.height()) as isize - 1)
            }),
            TuiEvent::Char(']') => self.select_related(app, true),
            TuiEvent::Char('[') => self.select_related(app, false),
            TuiEvent::ScrollDown => self.move_selection(app, |v| v.scroll_relative(WHEEL_STEP)),
            TuiEvent::ScrollUp => self.move_selection(app, |v| v.scroll_relative(-WHEEL_STEP)),
            TuiEvent::Click(column, row) => {
                if let Some(index) = self.feed.line_at(*column, *row) {
                    self.move_selection(app, |v| v.select(index as isize));
                }
            }
            TuiEvent::Enter | TuiEvent::Tab => {
                if self.detail.post().is_some() {
                    self.set_mode(Mode::Detail);
                }
            }
            TuiEvent::Char('y' | 'Y' | 'o') => {
                if let Some(detail_event) = self.detail.handle_event(event) {
                    self.apply_detail_event(app, detail_event);
                }
            }
            TuiEvent::Char('n') => self.start_compose(None, String::new()),
            TuiEvent::Char(c @ ('r' | 'R')) => {
                let post = self.selected(app)?;
                let post = app.store.fetch(post)?;
                let prefill = reply_prefill(post, app.viewer(), *c == 'R');
                self.start_compose(Some(post.root().id()), prefill);
            }
            TuiEvent::Char('f') => return Some(ActionRequest::Favorite(self.selected_root(app)?)),
            TuiEvent::Char('F') => {
                return Some(ActionRequest::Unfavorite(self.selected_root(app)?));
            }
            TuiEvent::Char('t') => {
                let root = self.selected_root(app)?;
                self.ask(ActionRequest::Repost(root));
            }
            TuiEvent::Char('D') => {
                let id = self.selected(app)?;
                if app.store.fetch(id).is_some_and(|p| p.is_own()) {
                    self.ask(ActionRequest::Delete(id));
                } else {
                    self.notify(app, "Not your post");
                }
            }
            TuiEvent::Char(c @ '1'..='9') => {
                let index = *c as usize - '1' as usize;
                if index < app.store.views().len() {
                    self.switch_tab(index);
                }
            }
            TuiEvent::Char('u') => self.open_author_tab(app),
            TuiEvent::Char('T') => self.open_thread_tab(app),
            TuiEvent::Char('x') => {
                if app.store.close_view(tab) {
                    info!("Closed tab {tab}");
                    self.switch_tab(tab - 1);
                }
            }
            TuiEvent::Char('c') => self.toggle_fold(app),
            _ => {}
        }
        None
    }

    fn move_selection(&mut self, app: &mut App, change: impl FnOnce(&mut crate::core::view::View)) {
        if let Some(view) = app.store.view_mut(self.feed.tab()) {
            change(view);
        }
    }

    fn selected(&self, app: &App) -> Option<PostId> {
        app.store.view(self.feed.tab())?.selected_post()
    }

    /// The selected post, or the original when it is a repost.
    fn selected_root(&self, app: &App) -> Option<PostId> {
        let id = self.selected(app)?;
        Some(app.store.fetch(id)?.root().id())
    }

    fn start_compose(&mut self, reply_to: Option<PostId>, prefill: String) {
        self.compose.open(reply_to, prefill);
        self.set_mode(Mode::Compose);
    }

    fn ask(&mut self, request: ActionRequest) {
        self.confirm.ask(request);
        self.set_mode(Mode::Confirm);
    }

    fn switch_tab(&mut self, index: usize) {
        self.feed.set_tab(index);
        self.tree_seed = None;
    }

    /// Next or previous post related to the selection: along the reply
    /// tree when there is one, otherwise by the same author.
    fn select_related(&mut self, app: &mut App, forward: bool) {
        let tab = self.feed.tab();
        let Some(view) = app.store.view(tab) else {
            return;
        };
        let Some(current) = view.selected_post() else {
            return;
        };
        let tree = app.store.reply_tree();
        let target = if tree.ids.len() > 1 && tree.contains(current) {
            let mut ids: Vec<PostId> = tree.ids.clone();
            if !forward {
                ids.reverse();
            }
            ids.into_iter()
                .filter(|id| if forward { *id > current } else { *id < current })
                .find_map(|id| view.find(id))
        } else {
            let author = app.store.fetch(current).map(|p| p.author().id);
            let lines = view.lines();
            let same_author = |index: &usize| {
                lines[*index]
                    .line
                    .post_id()
                    .and_then(|id| app.store.fetch(id))
                    .is_some_and(|p| Some(p.author().id) == author)
            };
            let selected = view.selected();
            if forward {
                (selected + 1..lines.len()).find(same_author)
            } else {
                (0..selected).rev().find(same_author)
            }
        };
        if let Some(index) = target {
            self.move_selection(app, |v| v.select(index as isize));
        }
    }

    fn open_author_tab(&mut self, app: &mut App) {
        let Some(author) = self
            .selected(app)
            .and_then(|id| app.store.fetch(id))
            .map(|p| p.root().author().clone())
        else {
            return;
        };
        let name = author.at_handle();
        let existing = app.store.views().iter().position(|v| v.name == name);
        let index = match existing {
            Some(index) => index,
            None if app.store.views().len() < MAX_TABS => {
                app.store.create_view(name, ViewFilter::Author(author.id))
            }
            None => {
                self.notify(app, "Too many tabs");
                return;
            }
        };
        self.switch_tab(index);
    }

    fn open_thread_tab(&mut self, app: &mut App) {
        let Some(seed) = self.selected(app) else {
            return;
        };
        if app.store.views().len() >= MAX_TABS {
            self.notify(app, "Too many tabs");
            return;
        }
        let ids = app.store.rebuild_reply_tree(Some(seed)).ids.iter().copied().collect();
        let index = app.store.create_view(format!("thread {seed}"), ViewFilter::Thread(ids));
        if let Some(view) = app.store.view_mut(index) {
            view.select_post(seed);
        }
        self.switch_tab(index);
    }

    /// Unfolds the selected fold line, or folds the run of consecutive
    /// posts by the selected post's author starting at the selection.
    fn toggle_fold(&mut self, app: &mut App) {
        let tab = self.feed.tab();
        let Some(view) = app.store.view(tab) else {
            return;
        };
        let selected = view.selected();
        let line = view.line(selected).map(|l| l.line.clone());
        let run_end = match line {
            Some(Line::Fold(_)) => {
                self.move_selection(app, |v| {
                    v.unfold(selected);
                });
                return;
            }
            Some(Line::Post(id)) => {
                let author = app.store.fetch(id).map(|p| p.author().id);
                let mut end = selected;
                while let Some(next) = view.line(end + 1).and_then(|l| l.line.post_id())
                    && app.store.fetch(next).map(|p| p.author().id) == author
                {
                    end += 1;
                }
                end
            }
            _ => return,
        };
        if run_end == selected {
            self.notify(app, "Nothing to fold");
            return;
        }
        self.move_selection(app, |v| {
            v.fold(selected, run_end);
        });
    }
}
