//! Wire types for the service's JSON, and their translation into domain
//! types.
//!
//! The service reports entity positions as code point indices. Domain
//! entities use byte offsets, so every index is converted here, once.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::ClientError;
use crate::core::event::{Incoming, Notification, NotificationKind, StreamEvent};
use crate::core::post::{Entity, EntityKind, MediaKind, Post, User};

// ============================================================================
// Service JSON Types
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
pub struct WireUser {
    pub id: u64,
    pub screen_name: String,
    #[serde(default)]
    pub profile_image_url_https: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WirePost {
    pub id: u64,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub user: WireUser,
    pub created_at: String,
    #[serde(default)]
    pub favorite_count: u32,
    #[serde(default)]
    pub retweet_count: u32,
    #[serde(default)]
    pub favorited: Option<bool>,
    #[serde(default)]
    pub retweeted: Option<bool>,
    #[serde(default)]
    pub in_reply_to_status_id: Option<u64>,
    #[serde(default)]
    pub retweeted_status: Option<Box<WirePost>>,
    #[serde(default)]
    pub entities: WireEntities,
    #[serde(default)]
    pub extended_entities: Option<WireEntities>,
    #[serde(default)]
    pub source: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WireEntities {
    #[serde(default)]
    pub user_mentions: Vec<WireMention>,
    #[serde(default)]
    pub hashtags: Vec<WireHashtag>,
    #[serde(default)]
    pub urls: Vec<WireUrl>,
    #[serde(default)]
    pub media: Vec<WireMedia>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireMention {
    pub id: u64,
    pub screen_name: String,
    pub indices: [usize; 2],
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireHashtag {
    pub text: String,
    pub indices: [usize; 2],
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireUrl {
    pub url: String,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub expanded_url: Option<String>,
    pub indices: [usize; 2],
}

#[derive(Deserialize, Debug, Clone)]
pub struct WireMedia {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub display_url: String,
    pub expanded_url: String,
    pub indices: [usize; 2],
}

#[derive(Deserialize, Debug)]
struct WireDelete {
    delete: WireDeleteBody,
}

#[derive(Deserialize, Debug)]
struct WireDeleteBody {
    status: WireDeletedStatus,
}

#[derive(Deserialize, Debug)]
struct WireDeletedStatus {
    id: u64,
}

#[derive(Deserialize, Debug)]
struct WireEvent {
    event: String,
    source: WireUser,
    #[serde(default)]
    target_object: Option<WirePost>,
}

// ============================================================================
// Translation Layer
// ============================================================================

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ClientError> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ClientError::Parse(format!("bad created_at {raw:?}: {e}")))
}

/// Byte offset of code point `index` in `text`, clamped to the end.
fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map_or(text.len(), |(offset, _)| offset)
}

impl From<WireUser> for User {
    fn from(user: WireUser) -> Self {
        User {
            id: user.id,
            handle: user.screen_name,
            avatar_url: user
                .profile_image_url_https
                .or(user.profile_image_url)
                .unwrap_or_default(),
        }
    }
}

impl WireEntities {
    fn into_entities(self, text: &str) -> Vec<Entity> {
        let span = |[start, end]: [usize; 2]| (byte_offset(text, start), byte_offset(text, end));
        let mut entities = Vec::new();
        for m in self.user_mentions {
            let (start, end) = span(m.indices);
            entities.push(Entity {
                start,
                end,
                kind: EntityKind::Mention {
                    user_id: m.id,
                    handle: m.screen_name,
                },
            });
        }
        for h in self.hashtags {
            let (start, end) = span(h.indices);
            entities.push(Entity {
                start,
                end,
                kind: EntityKind::Hashtag { tag: h.text },
            });
        }
        for u in self.urls {
            let (start, end) = span(u.indices);
            let display_url = u.display_url.unwrap_or_else(|| u.url.clone());
            entities.push(Entity {
                start,
                end,
                kind: EntityKind::Link {
                    expanded_url: u.expanded_url.unwrap_or_else(|| u.url.clone()),
                    url: u.url,
                    display_url,
                },
            });
        }
        for m in self.media {
            let (start, end) = span(m.indices);
            let kind = match m.kind.as_str() {
                "video" => MediaKind::Video,
                "animated_gif" => MediaKind::AnimatedGif,
                _ => MediaKind::Photo,
            };
            entities.push(Entity {
                start,
                end,
                kind: EntityKind::Media {
                    kind,
                    url: m.url,
                    display_url: m.display_url,
                    expanded_url: m.expanded_url,
                },
            });
        }
        entities
    }
}

impl WirePost {
    /// Converts into a post. The embedded original, if any, is dropped
    /// here; see [`WirePost::into_incoming`].
    pub fn into_post(self) -> Result<Post, ClientError> {
        let text = self.full_text.or(self.text).unwrap_or_default();
        let mut entities = match self.extended_entities {
            // Extended entities carry every media item; plain entities only the first.
            Some(extended) if !extended.media.is_empty() => {
                let mut base = self.entities;
                base.media = extended.media;
                base
            }
            _ => self.entities,
        }
        .into_entities(&text);
        entities.sort_by_key(|e| e.start);

        Ok(Post {
            id: self.id,
            created_at: parse_created_at(&self.created_at)?,
            author: self.user.into(),
            favorite_count: self.favorite_count,
            repost_count: self.retweet_count,
            favorited: self.favorited.unwrap_or(false),
            reposted: self.retweeted.unwrap_or(false),
            repost_of: self.retweeted_status.as_ref().map(|o| o.id),
            in_reply_to: self.in_reply_to_status_id,
            entities,
            source: self.source,
            text,
        })
    }

    /// Converts into a post plus its original when it is a repost.
    pub fn into_incoming(mut self) -> Result<Incoming, ClientError> {
        let original = self
            .retweeted_status
            .take()
            .map(|o| o.into_post())
            .transpose()?;
        let mut post = self.into_post()?;
        post.repost_of = original.as_ref().map(|o| o.id);
        Ok(Incoming { post, original })
    }
}

/// Parses one line of the event stream. Blank keep-alive lines and
/// message kinds the client does not use yield `Ok(None)`.
pub fn parse_stream_line(line: &str) -> Result<Option<StreamEvent>, ClientError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| ClientError::Parse(e.to_string()))?;
    let parse_err = |e: serde_json::Error| ClientError::Parse(e.to_string());

    if value.get("delete").is_some() {
        let delete: WireDelete = serde_json::from_value(value).map_err(parse_err)?;
        return Ok(Some(StreamEvent::DeletedPost(delete.delete.status.id)));
    }
    if value.get("event").is_some() {
        let event: WireEvent = serde_json::from_value(value).map_err(parse_err)?;
        let target = event.target_object.map(WirePost::into_post).transpose()?;
        return Ok(Some(StreamEvent::Notification(Notification {
            kind: NotificationKind::from_name(&event.event),
            actor: event.source.into(),
            target,
        })));
    }
    if value.get("id").is_some() && value.get("user").is_some() {
        let post: WirePost = serde_json::from_value(value).map_err(parse_err)?;
        return Ok(Some(StreamEvent::NewPost(Box::new(post.into_incoming()?))));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet_json(id: u64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "full_text": text,
            "user": { "id": 7, "screen_name": "ann", "profile_image_url_https": "https://img/ann.png" },
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "favorite_count": 2,
            "retweet_count": 1,
            "favorited": true,
            "source": "web"
        })
    }

    #[test]
    fn converts_code_point_indices_to_bytes() {
        let mut json = tweet_json(1, "héllo @bob");
        json["entities"] = serde_json::json!({
            "user_mentions": [{ "id": 2, "screen_name": "bob", "indices": [6, 10] }]
        });
        let wire: WirePost = serde_json::from_value(json).unwrap();
        let post = wire.into_post().unwrap();
        let e = &post.entities[0];
        assert_eq!(&post.text[e.start..e.end], "@bob");
        assert!(post.favorited);
        assert_eq!(post.author.avatar_url, "https://img/ann.png");
    }

    #[test]
    fn created_at_formats() {
        assert!(parse_created_at("Wed Oct 10 20:19:24 +0000 2018").is_ok());
        assert!(parse_created_at("2018-10-10T20:19:24Z").is_ok());
        assert!(matches!(parse_created_at("yesterday"), Err(ClientError::Parse(_))));
    }

    #[test]
    fn repost_carries_its_original() {
        let mut json = tweet_json(2, "RT @bob: hi");
        json["retweeted_status"] = tweet_json(1, "hi");
        let incoming = serde_json::from_value::<WirePost>(json)
            .unwrap()
            .into_incoming()
            .unwrap();
        assert_eq!(incoming.post.repost_of, Some(1));
        assert_eq!(incoming.original.unwrap().id, 1);
    }

    #[test]
    fn extended_media_replaces_plain_media() {
        let mut json = tweet_json(1, "pics https://t.co/a");
        let media = |n: u32| {
            serde_json::json!({
                "type": "photo", "url": "https://t.co/a",
                "display_url": format!("pic/{n}"), "expanded_url": "x", "indices": [5, 19]
            })
        };
        json["entities"] = serde_json::json!({ "media": [media(1)] });
        json["extended_entities"] = serde_json::json!({ "media": [media(1), media(2)] });
        let post = serde_json::from_value::<WirePost>(json)
            .unwrap()
            .into_post()
            .unwrap();
        assert_eq!(post.media().count(), 2);
    }

    #[test]
    fn stream_lines_dispatch_by_shape() {
        assert_eq!(parse_stream_line("   ").unwrap(), None);
        assert_eq!(parse_stream_line(r#"{"friends":[1,2]}"#).unwrap(), None);

        let delete = parse_stream_line(r#"{"delete":{"status":{"id":42,"user_id":1}}}"#).unwrap();
        assert_eq!(delete, Some(StreamEvent::DeletedPost(42)));

        let post = parse_stream_line(&tweet_json(5, "hey").to_string()).unwrap();
        assert!(matches!(post, Some(StreamEvent::NewPost(p)) if p.post.id == 5));

        let event = serde_json::json!({
            "event": "favorite",
            "source": { "id": 9, "screen_name": "fan" },
            "target": { "id": 7, "screen_name": "ann" },
            "target_object": tweet_json(5, "hey"),
        });
        match parse_stream_line(&event.to_string()).unwrap() {
            Some(StreamEvent::Notification(n)) => {
                assert_eq!(n.kind, NotificationKind::Favorite);
                assert_eq!(n.actor.handle, "fan");
                assert_eq!(n.target.unwrap().id, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_stream_line_is_a_parse_error() {
        assert!(matches!(parse_stream_line("{nope"), Err(ClientError::Parse(_))));
    }
}
