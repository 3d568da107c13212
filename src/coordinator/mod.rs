//! # Concurrency Coordinator
//!
//! Merges three asynchronous sources into the single-threaded UI loop.
//!
//! ```text
//!  stream task ──► tokio chan ──► forwarder ──┐
//!  image worker ─────────────────────────────┼──► std mpsc ──► drain() (UI thread)
//!  action tasks (one per action) ────────────┘
//! ```
//!
//! `drain()` runs once per tick and applies, in this order: stream events
//! (arrival order), image summaries, action status reports. Workers never
//! touch the store; they only push onto queues. Dropping the coordinator
//! abandons in-flight tasks, whose late sends then fail harmlessly.

pub mod actions;
pub mod images;

use std::sync::{Arc, mpsc};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc as async_mpsc;

use crate::client::{ClientError, TimelineClient};
use crate::core::action::{ActionId, ActionOutcome, ActionRequest, ActionUpdate};
use crate::core::event::{Incoming, StreamEvent, TickerKind};
use crate::core::images::ImageResult;
use crate::core::post::PostId;
use crate::core::state::App;

pub use images::ImageRequests;

const STREAM_BUFFER: usize = 256;
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// What one drain applied, for the panels that animate it.
#[derive(Debug, Default)]
pub struct Drained {
    /// One entry per stream event, in arrival order
    pub incoming: Vec<TickerKind>,
    /// Posts that were ingested and shown, in order
    pub shown: Vec<PostId>,
    pub images: usize,
    pub actions: Vec<ActionId>,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.images == 0 && self.actions.is_empty()
    }
}

pub struct Coordinator {
    client: Arc<dyn TimelineClient>,
    stream_rx: mpsc::Receiver<StreamEvent>,
    image_rx: mpsc::Receiver<ImageResult>,
    action_tx: mpsc::Sender<ActionUpdate>,
    action_rx: mpsc::Receiver<ActionUpdate>,
    image_requests: ImageRequests,
}

impl Coordinator {
    /// Starts the image worker and the stream task (backfill, then the
    /// live stream with reconnects). Must be called inside a tokio runtime.
    pub fn start(client: Arc<dyn TimelineClient>) -> Self {
        let (stream_tx, stream_rx) = mpsc::channel();
        spawn_stream(client.clone(), stream_tx);
        Self::with_stream(client, stream_rx)
    }

    /// Like [`Coordinator::start`] but with the stream events supplied by
    /// the caller.
    pub fn with_stream(
        client: Arc<dyn TimelineClient>,
        stream_rx: mpsc::Receiver<StreamEvent>,
    ) -> Self {
        let (image_tx, image_rx) = mpsc::channel();
        let (action_tx, action_rx) = mpsc::channel();
        let image_requests = images::spawn_image_worker(client.clone(), image_tx);
        Self {
            client,
            stream_rx,
            image_rx,
            action_tx,
            action_rx,
            image_requests,
        }
    }

    /// Queues `request` in the tracker and runs it on its own task.
    /// Identical requests are not merged.
    pub fn dispatch(&self, app: &mut App, request: ActionRequest) -> ActionId {
        let id = app.actions.queue(request.clone());
        actions::spawn_action(self.client.clone(), id, request, self.action_tx.clone());
        id
    }

    /// Applies everything that arrived since the last call. Never blocks.
    pub fn drain(&self, app: &mut App) -> Drained {
        let mut drained = Drained::default();

        while let Ok(event) = self.stream_rx.try_recv() {
            drained.incoming.push(event.ticker_kind());
            self.apply_stream_event(app, event, &mut drained);
        }

        while let Ok(result) = self.image_rx.try_recv() {
            drained.images += 1;
            app.images.publish(result);
        }

        while let Ok(update) = self.action_rx.try_recv() {
            drained.actions.push(update.id());
            let now = app.services().clock.now();
            if let Some(outcome) = app.actions.apply(update, now) {
                self.apply_outcome(app, outcome, &mut drained);
            }
        }

        if !drained.is_empty() {
            debug!(
                "Drained {} stream events, {} images, {} action updates",
                drained.incoming.len(),
                drained.images,
                drained.actions.len()
            );
        }
        drained
    }

    fn apply_stream_event(&self, app: &mut App, event: StreamEvent, drained: &mut Drained) {
        match event {
            StreamEvent::NewPost(incoming) => drained.shown.push(self.ingest(app, *incoming)),
            StreamEvent::DeletedPost(id) => {
                app.store.delete(id);
            }
            StreamEvent::Notification(notification) => {
                app.store.apply_notification(&notification);
            }
        }
    }

    fn apply_outcome(&self, app: &mut App, outcome: ActionOutcome, drained: &mut Drained) {
        match outcome {
            ActionOutcome::Created(post) => {
                drained.shown.push(self.ingest(app, Incoming::new(post)));
            }
            ActionOutcome::Updated(post) => {
                app.store.insert(post);
            }
            ActionOutcome::Deleted(id) => {
                app.store.delete(id);
            }
        }
    }

    fn ingest(&self, app: &mut App, incoming: Incoming) -> PostId {
        for author in std::iter::once(&incoming.post.author)
            .chain(incoming.original.as_ref().map(|o| &o.author))
        {
            if app.images.is_stale(author.id, &author.avatar_url) {
                self.image_requests.request(author);
            }
        }
        let id = incoming.post.id;
        app.store.ingest(incoming);
        id
    }
}

// ============================================================================
// Stream Task
// ============================================================================

fn spawn_stream(client: Arc<dyn TimelineClient>, events: mpsc::Sender<StreamEvent>) {
    let (tx, mut rx) = async_mpsc::channel::<StreamEvent>(STREAM_BUFFER);

    // Forward into the std channel the UI thread drains.
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if events.send(event).is_err() {
                info!("Stream receiver dropped, stopping forwarder");
                return;
            }
        }
    });

    tokio::spawn(async move {
        if let Err(ClientError::ChannelClosed) = backfill(client.as_ref(), &tx).await {
            return;
        }
        let mut delay = RECONNECT_MIN;
        loop {
            match client.stream(tx.clone()).await {
                Ok(()) => {
                    info!("Stream closed by server, reconnecting");
                    delay = RECONNECT_MIN;
                }
                Err(ClientError::ChannelClosed) => return,
                Err(e) => {
                    warn!("Stream failed: {e}, retrying in {}s", delay.as_secs());
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RECONNECT_MAX);
                    continue;
                }
            }
            tokio::time::sleep(RECONNECT_MIN).await;
        }
    });
}

/// Home timeline plus mentions, merged ascending by id without duplicates,
/// pushed ahead of any live event.
pub async fn backfill(
    client: &dyn TimelineClient,
    tx: &async_mpsc::Sender<StreamEvent>,
) -> Result<usize, ClientError> {
    let mut posts = Vec::new();
    for (name, page) in [
        ("home", client.home_timeline().await),
        ("mentions", client.mentions_timeline().await),
    ] {
        match page {
            Ok(mut page) => posts.append(&mut page),
            Err(e) => warn!("Backfill of {name} timeline failed: {e}"),
        }
    }
    posts.sort_by_key(|p: &Incoming| p.post.id);
    posts.dedup_by_key(|p| p.post.id);

    let count = posts.len();
    for incoming in posts {
        tx.send(StreamEvent::NewPost(Box::new(incoming)))
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
    }
    info!("Backfilled {count} posts");
    Ok(count)
}
