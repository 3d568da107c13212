//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc::Sender;

use crate::client::{ClientError, TimelineClient};
use crate::core::config::ResolvedConfig;
use crate::core::event::{Incoming, StreamEvent};
use crate::core::post::{Entity, EntityKind, Post, PostId, User};
use crate::core::services::{FixedClock, Services};
use crate::core::state::App;
use crate::core::store::PostStore;

/// The instant every test clock is frozen at.
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn user(id: u64, handle: &str) -> User {
    User {
        id,
        handle: handle.to_string(),
        avatar_url: format!("https://img.example/{handle}.png"),
    }
}

/// A post created 30 seconds before [`epoch`].
pub fn post(id: PostId, author: User, text: &str) -> Post {
    Post {
        id,
        author,
        text: text.to_string(),
        created_at: epoch() - TimeDelta::seconds(30),
        favorite_count: 0,
        repost_count: 0,
        favorited: false,
        reposted: false,
        repost_of: None,
        in_reply_to: None,
        entities: Vec::new(),
        source: "test".to_string(),
    }
}

pub fn reply(id: PostId, author: User, text: &str, to: PostId) -> Post {
    let mut p = post(id, author, text);
    p.in_reply_to = Some(to);
    p
}

pub fn repost(id: PostId, author: User, original: &Post) -> Post {
    let text = format!("RT @{}: {}", original.author.handle, original.text);
    let mut p = post(id, author, &text);
    p.repost_of = Some(original.id);
    p
}

fn span(text: &str, needle: &str) -> (usize, usize) {
    let start = text.find(needle).unwrap();
    (start, start + needle.len())
}

pub fn mention(text: &str, at_handle: &str, user_id: u64) -> Entity {
    let (start, end) = span(text, at_handle);
    Entity {
        start,
        end,
        kind: EntityKind::Mention {
            user_id,
            handle: at_handle.trim_start_matches('@').to_string(),
        },
    }
}

pub fn hashtag(text: &str, tag: &str) -> Entity {
    let (start, end) = span(text, tag);
    Entity {
        start,
        end,
        kind: EntityKind::Hashtag {
            tag: tag.trim_start_matches('#').to_string(),
        },
    }
}

pub fn link(text: &str, url: &str, display_url: &str) -> Entity {
    let (start, end) = span(text, url);
    Entity {
        start,
        end,
        kind: EntityKind::Link {
            url: url.to_string(),
            display_url: display_url.to_string(),
            expanded_url: format!("https://{display_url}"),
        },
    }
}

pub fn test_services() -> Services {
    Services::new(Arc::new(FixedClock(epoch())))
}

/// A store with the viewer `@me` (id 100).
pub fn test_store() -> PostStore {
    let mut store = PostStore::new(test_services());
    store.set_viewer(user(100, "me"));
    store
}

/// An app with the viewer `@me` (id 100) and default config.
pub fn test_app() -> App {
    App::new(ResolvedConfig::default(), test_services()).with_viewer(user(100, "me"))
}

/// A two-colour PNG avatar.
pub fn avatar_png() -> Vec<u8> {
    let img = image::ImageBuffer::from_fn(4, 4, |x, _| {
        image::Rgb(if x < 3 { [20u8, 40, 200] } else { [220u8, 30, 30] })
    });
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// An in-memory client with canned answers. Every call is recorded by
/// method name; anything without a canned answer fails with HTTP 500.
#[derive(Default)]
pub struct ScriptedClient {
    pub home: Vec<Post>,
    pub mentions: Vec<Post>,
    pub favorite_result: Option<Post>,
    pub post_result: Option<Post>,
    pub live: Vec<StreamEvent>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn unavailable() -> ClientError {
        ClientError::Api {
            status: 500,
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl TimelineClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        self.record("current_user");
        Ok(user(100, "me"))
    }

    async fn home_timeline(&self) -> Result<Vec<Incoming>, ClientError> {
        self.record("home_timeline");
        Ok(self.home.iter().cloned().map(Incoming::new).collect())
    }

    async fn mentions_timeline(&self) -> Result<Vec<Incoming>, ClientError> {
        self.record("mentions_timeline");
        Ok(self.mentions.iter().cloned().map(Incoming::new).collect())
    }

    async fn post(&self, _text: &str, _in_reply_to: Option<PostId>) -> Result<Post, ClientError> {
        self.record("post");
        self.post_result.clone().ok_or_else(Self::unavailable)
    }

    async fn favorite(&self, _id: PostId) -> Result<Post, ClientError> {
        self.record("favorite");
        self.favorite_result.clone().ok_or_else(Self::unavailable)
    }

    async fn unfavorite(&self, _id: PostId) -> Result<Post, ClientError> {
        self.record("unfavorite");
        Err(Self::unavailable())
    }

    async fn repost(&self, _id: PostId) -> Result<Post, ClientError> {
        self.record("repost");
        Err(Self::unavailable())
    }

    async fn delete(&self, _id: PostId) -> Result<(), ClientError> {
        self.record("delete");
        Err(Self::unavailable())
    }

    async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, ClientError> {
        self.record("fetch_bytes");
        Ok(avatar_png())
    }

    async fn stream(&self, sender: Sender<StreamEvent>) -> Result<(), ClientError> {
        self.record("stream");
        for event in self.live.clone() {
            sender
                .send(event)
                .await
                .map_err(|_| ClientError::ChannelClosed)?;
        }
        Ok(())
    }
}
