//! # Posts
//!
//! The immutable feed item and the structured spans inside its text.
//!
//! A `Post` is never edited in place. A changed post (new counts, new
//! viewer flags) arrives as a fresh value and is re-inserted into the
//! store under the same id.

use chrono::{DateTime, Utc};

/// Opaque post identifier. Numeric order is chronological order.
pub type PostId = u64;

/// Opaque user identifier.
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: UserId,
    /// Screen name without the leading `@`
    pub handle: String,
    pub avatar_url: String,
}

impl User {
    /// `@handle`, the form shown in every column.
    pub fn at_handle(&self) -> String {
        format!("@{}", self.handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Mention {
        user_id: UserId,
        handle: String,
    },
    Hashtag {
        tag: String,
    },
    Link {
        url: String,
        display_url: String,
        expanded_url: String,
    },
    Media {
        kind: MediaKind,
        url: String,
        display_url: String,
        expanded_url: String,
    },
}

/// A structured span of a post's text.
///
/// `start..end` is a byte range into `Post::text`, always on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author: User,
    /// Raw body text, still HTML-escaped the way the service delivers it
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub favorite_count: u32,
    pub repost_count: u32,
    /// The viewer has favorited this post
    pub favorited: bool,
    /// The viewer has reposted this post
    pub reposted: bool,
    pub repost_of: Option<PostId>,
    pub in_reply_to: Option<PostId>,
    pub entities: Vec<Entity>,
    /// Name of the client the post was made with
    pub source: String,
}

impl Post {
    pub fn is_repost(&self) -> bool {
        self.repost_of.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.media().next().is_some()
    }

    pub fn media(&self) -> impl Iterator<Item = MediaKind> + '_ {
        self.entities.iter().filter_map(|e| match e.kind {
            EntityKind::Media { kind, .. } => Some(kind),
            _ => None,
        })
    }

    /// Handles mentioned in this post, in text order, without duplicates.
    pub fn mentioned_handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = Vec::new();
        for entity in &self.entities {
            if let EntityKind::Mention { handle, .. } = &entity.kind
                && !handles.iter().any(|h| h.eq_ignore_ascii_case(handle))
            {
                handles.push(handle.clone());
            }
        }
        handles
    }

    /// Whether the text mentions `handle` (case-insensitive).
    pub fn mentions(&self, handle: &str) -> bool {
        let needle = format!("@{}", handle.to_lowercase());
        self.text.to_lowercase().contains(&needle)
    }

    /// Public permalink for this post under `web_base`.
    pub fn permalink(&self, web_base: &str) -> String {
        format!(
            "{}/{}/status/{}",
            web_base.trim_end_matches('/'),
            self.author.handle,
            self.id
        )
    }
}
