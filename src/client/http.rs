//! HTTP implementation of [`TimelineClient`] against the v1.1-shaped REST
//! API and its line-delimited JSON user stream.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::Sender;

use crate::client::wire::{WirePost, WireUser, parse_stream_line};
use crate::client::{ClientError, TimelineClient};
use crate::core::event::{Incoming, StreamEvent};
use crate::core::post::{Post, PostId, User};

const TIMELINE_PAGE: &str = "200";

pub struct HttpClient {
    base_url: String,
    stream_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: String, stream_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            stream_url: stream_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        debug!("Response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("API error: {} - {}", status, message);
            return Err(ClientError::Api { status, message });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn timeline(&self, path: &str) -> Result<Vec<Incoming>, ClientError> {
        let posts: Vec<WirePost> = self
            .json(
                self.client
                    .get(format!("{}/{path}", self.base_url))
                    .query(&[("count", TIMELINE_PAGE), ("tweet_mode", "extended")]),
            )
            .await?;
        info!("Fetched {} posts from {path}", posts.len());
        posts.into_iter().map(WirePost::into_incoming).collect()
    }

    async fn post_action(&self, url: String) -> Result<Post, ClientError> {
        let post: WirePost = self
            .json(self.client.post(url).query(&[("tweet_mode", "extended")]))
            .await?;
        post.into_post()
    }
}

#[async_trait]
impl TimelineClient for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        let user: WireUser = self
            .json(
                self.client
                    .get(format!("{}/account/verify_credentials.json", self.base_url)),
            )
            .await?;
        Ok(user.into())
    }

    async fn home_timeline(&self) -> Result<Vec<Incoming>, ClientError> {
        self.timeline("statuses/home_timeline.json").await
    }

    async fn mentions_timeline(&self) -> Result<Vec<Incoming>, ClientError> {
        self.timeline("statuses/mentions_timeline.json").await
    }

    async fn post(&self, text: &str, in_reply_to: Option<PostId>) -> Result<Post, ClientError> {
        let mut query = vec![("status", text.to_string())];
        if let Some(id) = in_reply_to {
            query.push(("in_reply_to_status_id", id.to_string()));
        }
        let post: WirePost = self
            .json(
                self.client
                    .post(format!("{}/statuses/update.json", self.base_url))
                    .query(&query),
            )
            .await?;
        post.into_post()
    }

    async fn favorite(&self, id: PostId) -> Result<Post, ClientError> {
        self.post_action(format!("{}/favorites/create.json?id={id}", self.base_url))
            .await
    }

    async fn unfavorite(&self, id: PostId) -> Result<Post, ClientError> {
        self.post_action(format!("{}/favorites/destroy.json?id={id}", self.base_url))
            .await
    }

    async fn repost(&self, id: PostId) -> Result<Post, ClientError> {
        self.post_action(format!("{}/statuses/retweet/{id}.json", self.base_url))
            .await
    }

    async fn delete(&self, id: PostId) -> Result<(), ClientError> {
        self.send(
            self.client
                .post(format!("{}/statuses/destroy/{id}.json", self.base_url)),
        )
        .await?;
        Ok(())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                message: format!("fetching {url}"),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn stream(&self, sender: Sender<StreamEvent>) -> Result<(), ClientError> {
        let response = self
            .send(self.client.get(format!("{}/user.json", self.stream_url)))
            .await?;
        info!("Stream connected");

        // Bytes, not text: a chunk may end inside a multi-byte character.
        let mut chunks = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut event_count = 0usize;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(e.to_string()))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if forward_line(&String::from_utf8_lossy(&line), &sender).await? {
                    event_count += 1;
                }
            }
        }

        if forward_line(&String::from_utf8_lossy(&buffer), &sender).await? {
            event_count += 1;
        }

        info!("Stream ended after {event_count} events");
        Ok(())
    }
}

/// Parses one stream line and sends the event, if any. Returns whether an
/// event went out.
async fn forward_line(line: &str, sender: &Sender<StreamEvent>) -> Result<bool, ClientError> {
    match parse_stream_line(line) {
        Ok(Some(event)) => {
            sender
                .send(event)
                .await
                .map_err(|_| ClientError::ChannelClosed)?;
            Ok(true)
        }
        Ok(None) => Ok(false),
        // One bad message should not drop the connection.
        Err(e) => {
            warn!("Skipping stream message: {e}");
            Ok(false)
        }
    }
}
