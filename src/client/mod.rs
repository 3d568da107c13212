//! # Timeline Client
//!
//! The network collaborator. A pull surface for one-off REST calls (only
//! ever awaited inside worker tasks, never on the UI thread) and a push
//! surface that forwards the live stream as typed events.

pub mod http;
pub mod wire;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::core::event::{Incoming, StreamEvent};
use crate::core::post::{Post, PostId, User};

pub use http::HttpClient;

/// Errors that can occur talking to the service.
#[derive(Debug)]
pub enum ClientError {
    /// Client misconfigured (missing token, bad URL). Not retryable.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// The service answered with an error status.
    Api { status: u16, message: String },
    /// Failed to parse the service's response.
    Parse(String),
    /// The receiving side of the event channel went away.
    ChannelClosed,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Config(msg) => write!(f, "config error: {msg}"),
            ClientError::Network(msg) => write!(f, "network error: {msg}"),
            ClientError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ClientError::Parse(msg) => write!(f, "parse error: {msg}"),
            ClientError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ClientError {}

#[async_trait]
pub trait TimelineClient: Send + Sync {
    /// Returns the name of the client.
    fn name(&self) -> &str;

    /// The signed-in user.
    async fn current_user(&self) -> Result<User, ClientError>;

    async fn home_timeline(&self) -> Result<Vec<Incoming>, ClientError>;

    async fn mentions_timeline(&self) -> Result<Vec<Incoming>, ClientError>;

    /// Publishes a post, optionally as a reply.
    async fn post(&self, text: &str, in_reply_to: Option<PostId>) -> Result<Post, ClientError>;

    /// Returns the target with its updated counts and flags.
    async fn favorite(&self, id: PostId) -> Result<Post, ClientError>;

    async fn unfavorite(&self, id: PostId) -> Result<Post, ClientError>;

    /// Returns the new repost.
    async fn repost(&self, id: PostId) -> Result<Post, ClientError>;

    async fn delete(&self, id: PostId) -> Result<(), ClientError>;

    /// Raw bytes behind a URL (avatars).
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ClientError>;

    /// Streams live events into `sender` until the connection ends.
    async fn stream(&self, sender: Sender<StreamEvent>) -> Result<(), ClientError>;
}
