//! # Post Store
//!
//! The authoritative index of every fetched post, plus the views (tabs)
//! that show subsets of them.
//!
//! ```text
//!   records: id → PostRecord { post, pieces }
//!   reposts_of: original id → { repost ids }     (invalidates repost lines)
//!   replies_to: target id → [reply ids]          (reply tree back-pointers)
//!   views: [View]                                 (hold ids, never posts)
//! ```
//!
//! Only the UI thread touches the store. Every mutation bumps the
//! revision of the lines it affects so renderers recompute them on the
//! next draw.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use log::debug;

use crate::core::event::{Incoming, Notification, NotificationKind};
use crate::core::pieces::{Pieces, Segmenter};
use crate::core::post::{Post, PostId, User};
use crate::core::services::Services;
use crate::core::view::{View, ViewFilter};

#[derive(Debug)]
struct PostRecord {
    post: Post,
    pieces: Pieces,
}

/// The currently displayed reply tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplyTree {
    pub seed: Option<PostId>,
    /// Ascending by id, no duplicates
    pub ids: Vec<PostId>,
}

impl ReplyTree {
    pub fn contains(&self, id: PostId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
}

pub struct PostStore {
    services: Services,
    viewer: Option<User>,
    records: HashMap<PostId, PostRecord>,
    /// Shown posts in the order they were first shown
    arrival: Vec<PostId>,
    reposts_of: HashMap<PostId, BTreeSet<PostId>>,
    replies_to: HashMap<PostId, Vec<PostId>>,
    reply_tree: ReplyTree,
    views: Vec<View>,
}

/// Read-only access to a stored post and its derived display state.
#[derive(Clone, Copy)]
pub struct PostRef<'a> {
    store: &'a PostStore,
    record: &'a PostRecord,
}

impl<'a> PostRef<'a> {
    pub fn post(&self) -> &'a Post {
        &self.record.post
    }

    pub fn id(&self) -> PostId {
        self.record.post.id
    }

    pub fn author(&self) -> &'a User {
        &self.record.post.author
    }

    pub fn pieces(&self) -> &'a Pieces {
        &self.record.pieces
    }

    /// The reposted post, when this is a repost and the original is stored.
    pub fn original(&self) -> Option<PostRef<'a>> {
        self.record
            .post
            .repost_of
            .and_then(|id| self.store.fetch(id))
    }

    /// The post whose content this line shows: the original for a
    /// resolvable repost, else the post itself.
    pub fn root(&self) -> PostRef<'a> {
        self.original().unwrap_or(*self)
    }

    pub fn parent(&self) -> Option<PostRef<'a>> {
        self.root()
            .record
            .post
            .in_reply_to
            .and_then(|id| self.store.fetch(id))
    }

    pub fn is_own(&self) -> bool {
        self.store
            .viewer
            .as_ref()
            .is_some_and(|v| v.id == self.record.post.author.id)
    }

    pub fn mentions_viewer(&self) -> bool {
        self.store
            .viewer
            .as_ref()
            .is_some_and(|v| self.root().record.post.mentions(&v.handle))
    }
}

impl PostStore {
    pub fn new(services: Services) -> Self {
        let mut store = Self {
            services,
            viewer: None,
            records: HashMap::new(),
            arrival: Vec::new(),
            reposts_of: HashMap::new(),
            replies_to: HashMap::new(),
            reply_tree: ReplyTree::default(),
            views: Vec::new(),
        };
        store.create_view("home", ViewFilter::Everything);
        store
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn viewer(&self) -> Option<&User> {
        self.viewer.as_ref()
    }

    /// Sets the signed-in user. Text roles depend on it, so every cached
    /// segmentation is rebuilt.
    pub fn set_viewer(&mut self, viewer: User) {
        self.viewer = Some(viewer);
        let ids: Vec<PostId> = self.records.keys().copied().collect();
        for id in ids {
            self.resegment(id);
        }
        for view in &mut self.views {
            view.invalidate_all();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fetch(&self, id: PostId) -> Option<PostRef<'_>> {
        self.records.get(&id).map(|record| PostRef {
            store: self,
            record,
        })
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.records.get(&id).map(|r| &r.post)
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn replies_to(&self, id: PostId) -> &[PostId] {
        self.replies_to.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reposts_of(&self, id: PostId) -> impl Iterator<Item = PostId> + '_ {
        self.reposts_of.get(&id).into_iter().flatten().copied()
    }

    /// Indexes `post`, replacing any post stored under the same id. Does not
    /// add it to any view. Returns true when an existing post was replaced.
    pub fn insert(&mut self, post: Post) -> bool {
        let id = post.id;
        let replaced = match self.records.remove(&id) {
            Some(old) => {
                if let Some(original) = old.post.repost_of
                    && Some(original) != post.repost_of
                {
                    self.unlink_repost(original, id);
                }
                if let Some(parent) = old.post.in_reply_to
                    && Some(parent) != post.in_reply_to
                {
                    self.unlink_reply(parent, id);
                }
                true
            }
            None => false,
        };

        if let Some(original) = post.repost_of {
            self.reposts_of.entry(original).or_default().insert(id);
        }
        let parent = post.in_reply_to;
        if let Some(parent) = parent {
            let replies = self.replies_to.entry(parent).or_default();
            if !replies.contains(&id) {
                replies.push(id);
            }
        }

        self.records.insert(
            id,
            PostRecord {
                post,
                pieces: Pieces::default(),
            },
        );
        self.resegment(id);

        if replaced {
            debug!("Replaced post {id}");
            self.invalidate(id);
        }
        self.refresh_reposts(id);

        if let Some(parent) = parent
            && self.reply_tree.contains(parent)
        {
            self.rebuild_reply_tree(None);
        }
        replaced
    }

    /// Appends an indexed post to every view whose filter accepts it.
    /// Showing a post twice is a no-op.
    pub fn show(&mut self, id: PostId) {
        let Some(record) = self.records.get(&id) else {
            return;
        };
        if !self.arrival.contains(&id) {
            self.arrival.push(id);
        }
        for view in &mut self.views {
            if view.accepts(&record.post) {
                view.append(id);
            }
        }
    }

    /// Indexes a delivered post (its original first, index only) and shows it.
    pub fn ingest(&mut self, incoming: Incoming) {
        let Incoming { post, original } = incoming;
        if let Some(original) = original {
            self.insert(original);
        }
        let id = post.id;
        self.insert(post);
        self.show(id);
    }

    /// Removes `id` from every view and the index. Reposts of it survive
    /// and render with a placeholder. Deleting an unknown id is a no-op.
    pub fn delete(&mut self, id: PostId) -> bool {
        for view in &mut self.views {
            view.remove(id);
        }
        self.arrival.retain(|p| *p != id);

        let Some(record) = self.records.remove(&id) else {
            return false;
        };
        debug!("Deleted post {id}");

        if let Some(parent) = record.post.in_reply_to {
            self.unlink_reply(parent, id);
        }
        if let Some(original) = record.post.repost_of {
            self.unlink_repost(original, id);
        }
        self.refresh_reposts(id);

        if self.reply_tree.seed == Some(id) {
            self.reply_tree = ReplyTree::default();
        } else if self.reply_tree.contains(id) {
            self.rebuild_reply_tree(None);
        }
        true
    }

    /// Applies a favorite/repost notification. When the target is the
    /// viewer's own post the public counter moves; otherwise the
    /// notification describes the viewer acting, and the viewer's flag
    /// flips.
    pub fn apply_notification(&mut self, notification: &Notification) {
        let Some(target) = &notification.target else {
            return;
        };
        let own = self
            .viewer
            .as_ref()
            .is_some_and(|v| v.id == target.author.id);
        let Some(record) = self.records.get_mut(&target.id) else {
            return;
        };
        let post = &mut record.post;
        match (notification.kind, own) {
            (NotificationKind::Favorite, true) => post.favorite_count += 1,
            (NotificationKind::Unfavorite, true) => {
                post.favorite_count = post.favorite_count.saturating_sub(1)
            }
            (NotificationKind::Repost, true) => post.repost_count += 1,
            (NotificationKind::Favorite, false) => post.favorited = true,
            (NotificationKind::Unfavorite, false) => post.favorited = false,
            (NotificationKind::Repost, false) => post.reposted = true,
            _ => return,
        }
        self.invalidate(target.id);
    }

    /// Bumps every line showing `id`, or a repost of `id`.
    pub fn invalidate(&mut self, id: PostId) {
        let reposts: Vec<PostId> = self.reposts_of(id).collect();
        for view in &mut self.views {
            view.invalidate(id);
            for repost in &reposts {
                view.invalidate(*repost);
            }
        }
    }

    // ========================================================================
    // Reply Tree
    // ========================================================================

    pub fn reply_tree(&self) -> &ReplyTree {
        &self.reply_tree
    }

    /// Rebuilds the reply tree around `seed`, or around the previous seed
    /// when `None`.
    ///
    /// Children are absorbed breadth-first through the reply back-pointers,
    /// then the `in_reply_to` chain is walked upward until the first
    /// ancestor that is not stored.
    pub fn rebuild_reply_tree(&mut self, seed: Option<PostId>) -> &ReplyTree {
        let seed = seed.or(self.reply_tree.seed);
        let Some(seed) = seed.filter(|id| self.records.contains_key(id)) else {
            self.reply_tree = ReplyTree::default();
            return &self.reply_tree;
        };

        let mut seen: HashSet<PostId> = HashSet::from([seed]);
        let mut ids = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(id) = queue.pop_front() {
            for child in self.replies_to(id) {
                if self.records.contains_key(child) && seen.insert(*child) {
                    ids.push(*child);
                    queue.push_back(*child);
                }
            }
        }

        let mut current = seed;
        while let Some(parent) = self.records.get(&current).and_then(|r| r.post.in_reply_to) {
            if !self.records.contains_key(&parent) || !seen.insert(parent) {
                break;
            }
            ids.push(parent);
            current = parent;
        }

        ids.sort_unstable();
        let old = std::mem::replace(
            &mut self.reply_tree,
            ReplyTree {
                seed: Some(seed),
                ids,
            },
        );
        // Relation markers change on both the old and the new members.
        let touched: BTreeSet<PostId> = old
            .ids
            .into_iter()
            .chain(self.reply_tree.ids.iter().copied())
            .collect();
        for view in &mut self.views {
            for id in &touched {
                view.invalidate(*id);
            }
        }
        &self.reply_tree
    }

    pub fn clear_reply_tree(&mut self) {
        self.reply_tree = ReplyTree::default();
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }

    pub fn view_mut(&mut self, index: usize) -> Option<&mut View> {
        self.views.get_mut(index)
    }

    /// Creates a view and fills it with every already shown post its
    /// filter accepts. Returns the view's index.
    pub fn create_view(&mut self, name: impl Into<String>, filter: ViewFilter) -> usize {
        let mut view = View::new(name, filter);
        for id in &self.arrival {
            if let Some(record) = self.records.get(id)
                && view.accepts(&record.post)
            {
                view.append(*id);
            }
        }
        self.views.push(view);
        self.views.len() - 1
    }

    /// Closes a view. The first view is permanent.
    pub fn close_view(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.views.len() {
            return false;
        }
        self.views.remove(index);
        true
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn resegment(&mut self, id: PostId) {
        let Some(record) = self.records.get(&id) else {
            return;
        };
        let original = record
            .post
            .repost_of
            .and_then(|o| self.records.get(&o))
            .map(|r| &r.post);
        let pieces = Segmenter::new(&self.services.decoder, self.viewer.as_ref())
            .segment(&record.post, original);
        if let Some(record) = self.records.get_mut(&id) {
            record.pieces = pieces;
        }
    }

    /// Re-resolves the original of every repost of `id`.
    fn refresh_reposts(&mut self, id: PostId) {
        let reposts: Vec<PostId> = self.reposts_of(id).collect();
        for repost in reposts {
            self.resegment(repost);
            for view in &mut self.views {
                view.invalidate(repost);
            }
        }
    }

    fn unlink_reply(&mut self, parent: PostId, child: PostId) {
        if let Some(replies) = self.replies_to.get_mut(&parent) {
            replies.retain(|r| *r != child);
            if replies.is_empty() {
                self.replies_to.remove(&parent);
            }
        }
    }

    fn unlink_repost(&mut self, original: PostId, repost: PostId) {
        if let Some(reposts) = self.reposts_of.get_mut(&original) {
            reposts.remove(&repost);
            if reposts.is_empty() {
                self.reposts_of.remove(&original);
            }
        }
    }
}

impl std::fmt::Debug for PostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStore")
            .field("posts", &self.records.len())
            .field("views", &self.views.len())
            .field("reply_tree", &self.reply_tree)
            .finish()
    }
}
