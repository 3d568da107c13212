//! # Views
//!
//! A view is one tab: an ordered list of lines with its own selection and
//! scroll offset. Lines hold post ids, never posts; everything displayed
//! resolves through the store.
//!
//! The last line is always the stream marker. Selecting it means
//! "following the live feed": new posts appended while it is selected
//! keep the selection pinned to the bottom.

use std::collections::BTreeSet;

use crate::core::post::{Post, PostId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Post(PostId),
    /// Consecutive posts collapsed into one row
    Fold(Vec<PostId>),
    StreamMarker,
}

impl Line {
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            Line::Post(id) => Some(*id),
            _ => None,
        }
    }

    fn wraps(&self, id: PostId) -> bool {
        match self {
            Line::Post(p) => *p == id,
            Line::Fold(ids) => ids.contains(&id),
            Line::StreamMarker => false,
        }
    }
}

/// A line plus the revision of the content it shows. The store bumps the
/// revision whenever something the line displays changes; renderers
/// compare it with the revision they last computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub line: Line,
    pub revision: u64,
}

/// Membership predicate for posts shown after the view was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewFilter {
    Everything,
    Author(UserId),
    /// Grows as replies to members arrive
    Thread(BTreeSet<PostId>),
    /// Only what was put there explicitly
    Nothing,
}

impl ViewFilter {
    fn absorb(&mut self, post: &Post) -> bool {
        match self {
            ViewFilter::Everything => true,
            ViewFilter::Author(id) => post.author.id == *id,
            ViewFilter::Thread(ids) => {
                let member = ids.contains(&post.id)
                    || post.in_reply_to.is_some_and(|parent| ids.contains(&parent));
                if member {
                    ids.insert(post.id);
                }
                member
            }
            ViewFilter::Nothing => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct View {
    pub name: String,
    filter: ViewFilter,
    lines: Vec<LineEntry>,
    selected: usize,
    top: usize,
    height: usize,
}

impl View {
    pub fn new(name: impl Into<String>, filter: ViewFilter) -> Self {
        Self {
            name: name.into(),
            filter,
            lines: vec![LineEntry {
                line: Line::StreamMarker,
                revision: 0,
            }],
            selected: 0,
            top: 0,
            height: 1,
        }
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    /// Number of lines, stream marker included. Never zero.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() <= 1
    }

    pub fn lines(&self) -> &[LineEntry] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&LineEntry> {
        self.lines.get(index)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn marker_index(&self) -> usize {
        self.lines.len() - 1
    }

    pub fn is_following(&self) -> bool {
        self.selected == self.marker_index()
    }

    pub fn selected_post(&self) -> Option<PostId> {
        self.lines.get(self.selected).and_then(|l| l.line.post_id())
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.lines.iter().any(|l| l.line.wraps(id))
    }

    pub fn find(&self, id: PostId) -> Option<usize> {
        self.lines.iter().position(|l| l.line.wraps(id))
    }

    /// Runs the membership predicate against a newly shown post.
    pub fn accepts(&mut self, post: &Post) -> bool {
        self.filter.absorb(post)
    }

    /// Appends `id` just above the stream marker. Returns false when the
    /// view already shows it.
    pub fn append(&mut self, id: PostId) -> bool {
        if self.contains(id) {
            return false;
        }
        let following = self.is_following();
        let at = self.marker_index();
        self.lines.insert(
            at,
            LineEntry {
                line: Line::Post(id),
                revision: 0,
            },
        );
        if following {
            self.select(self.marker_index() as isize);
        }
        true
    }

    /// Removes every line wrapping `id`. Fold lines shrink and vanish when
    /// empty. Selection stays on the same line where possible.
    pub fn remove(&mut self, id: PostId) -> bool {
        let mut removed = false;
        let mut index = 0;
        while index < self.lines.len() {
            let entry = &mut self.lines[index];
            let drop_line = match &mut entry.line {
                Line::Post(p) => *p == id,
                Line::Fold(ids) => {
                    let before = ids.len();
                    ids.retain(|p| *p != id);
                    if ids.len() != before {
                        entry.revision += 1;
                        removed = true;
                    }
                    ids.is_empty()
                }
                Line::StreamMarker => false,
            };
            if drop_line {
                self.lines.remove(index);
                removed = true;
                if index < self.selected {
                    self.selected -= 1;
                }
                if index < self.top {
                    self.top -= 1;
                }
            } else {
                index += 1;
            }
        }
        if removed {
            self.select(self.selected as isize);
        }
        removed
    }

    /// Bumps the revision of every line showing `id`.
    pub fn invalidate(&mut self, id: PostId) {
        for entry in self.lines.iter_mut().filter(|l| l.line.wraps(id)) {
            entry.revision += 1;
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in &mut self.lines {
            entry.revision += 1;
        }
    }

    /// Clamps into `[0, len-1]` and scrolls so the selection is visible.
    pub fn select(&mut self, index: isize) {
        self.selected = clamp(index, self.lines.len());
        if self.selected < self.top {
            self.top = self.selected;
        } else if self.selected >= self.top + self.height {
            self.top = self.selected + 1 - self.height;
        }
    }

    pub fn select_relative(&mut self, delta: isize) {
        self.select(self.selected as isize + delta);
    }

    /// Selects the line holding `id`, if the view has one.
    pub fn select_post(&mut self, id: PostId) -> bool {
        match self.find(id) {
            Some(index) => {
                self.select(index as isize);
                true
            }
            None => false,
        }
    }

    /// Clamps into `[0, len-1]` and moves the selection back inside the
    /// visible window if the scroll left it outside.
    pub fn scroll_to(&mut self, index: isize) {
        self.top = clamp(index, self.lines.len());
        let bottom = (self.top + self.height - 1).min(self.marker_index());
        if self.selected < self.top {
            self.selected = self.top;
        } else if self.selected > bottom {
            self.selected = bottom;
        }
    }

    pub fn scroll_relative(&mut self, delta: isize) {
        self.scroll_to(self.top as isize + delta);
    }

    /// Sets the viewport height, keeping the selection visible.
    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        // Keep the window full when the viewport grows.
        self.top = self.top.min(self.lines.len().saturating_sub(self.height));
        self.select(self.selected as isize);
    }

    /// Collapses the lines `from..=to` (post lines only) into one fold line.
    pub fn fold(&mut self, from: usize, to: usize) -> bool {
        if from >= to || to >= self.marker_index() {
            return false;
        }
        let mut ids = Vec::with_capacity(to - from + 1);
        for entry in &self.lines[from..=to] {
            match &entry.line {
                Line::Post(id) => ids.push(*id),
                Line::Fold(inner) => ids.extend(inner.iter().copied()),
                Line::StreamMarker => return false,
            }
        }
        let collapsed = to - from;
        self.lines.splice(
            from..=to,
            [LineEntry {
                line: Line::Fold(ids),
                revision: 0,
            }],
        );
        if self.selected > to {
            self.selected -= collapsed;
        } else if self.selected >= from {
            self.selected = from;
        }
        if self.top > from {
            self.top = self.top.saturating_sub(collapsed).max(from);
        }
        self.select(self.selected as isize);
        true
    }

    /// Expands the fold line at `index` back into post lines.
    pub fn unfold(&mut self, index: usize) -> bool {
        let ids = match self.lines.get(index) {
            Some(LineEntry {
                line: Line::Fold(ids),
                ..
            }) => ids.clone(),
            _ => return false,
        };
        let added = ids.len() - 1;
        self.lines.splice(
            index..=index,
            ids.into_iter().map(|id| LineEntry {
                line: Line::Post(id),
                revision: 0,
            }),
        );
        if self.selected > index {
            self.selected += added;
        }
        self.select(self.selected as isize);
        true
    }
}

fn clamp(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}
