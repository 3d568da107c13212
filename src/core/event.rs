//! # Stream Events
//!
//! The discriminated union produced by the streaming connection and the
//! initial timeline backfill. Applied to the store in arrival order, once
//! per UI tick, by the coordinator.

use crate::core::post::{Post, PostId, User};

/// A post as delivered by the service, with the original attached when
/// the post is a repost.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub post: Post,
    pub original: Option<Post>,
}

impl Incoming {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            original: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Favorite,
    Unfavorite,
    Repost,
    Follow,
    Unfollow,
    /// Anything the client does not act on (list events, profile updates, ...)
    Other,
}

impl NotificationKind {
    /// Parses the service's event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "favorite" => Self::Favorite,
            "unfavorite" => Self::Unfavorite,
            "retweet" | "repost" => Self::Repost,
            "follow" => Self::Follow,
            "unfollow" => Self::Unfollow,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub actor: User,
    /// The post the notification is about, if any
    pub target: Option<Post>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    NewPost(Box<Incoming>),
    DeletedPost(PostId),
    Notification(Notification),
}

impl StreamEvent {
    /// Short label used by the activity ticker's IN row.
    pub fn ticker_kind(&self) -> TickerKind {
        match self {
            StreamEvent::NewPost(incoming) if incoming.post.is_repost() => TickerKind::Repost,
            StreamEvent::NewPost(incoming) if incoming.post.is_reply() => TickerKind::Reply,
            StreamEvent::NewPost(_) => TickerKind::Post,
            StreamEvent::DeletedPost(_) => TickerKind::Delete,
            StreamEvent::Notification(n) => TickerKind::Notification(n.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerKind {
    Post,
    Reply,
    Repost,
    Delete,
    Notification(NotificationKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{post, user};

    #[test]
    fn notification_names_parse() {
        assert_eq!(NotificationKind::from_name("favorite"), NotificationKind::Favorite);
        assert_eq!(NotificationKind::from_name("retweet"), NotificationKind::Repost);
        assert_eq!(NotificationKind::from_name("list_member_added"), NotificationKind::Other);
    }

    #[test]
    fn ticker_kind_distinguishes_replies_and_reposts() {
        let mut reply = post(2, user(1, "a"), "@b hi");
        reply.in_reply_to = Some(1);
        let mut repost = post(3, user(1, "a"), "RT @b: hi");
        repost.repost_of = Some(1);

        assert_eq!(
            StreamEvent::NewPost(Box::new(Incoming::new(reply))).ticker_kind(),
            TickerKind::Reply
        );
        assert_eq!(
            StreamEvent::NewPost(Box::new(Incoming::new(repost))).ticker_kind(),
            TickerKind::Repost
        );
        assert_eq!(StreamEvent::DeletedPost(9).ticker_kind(), TickerKind::Delete);
    }
}
