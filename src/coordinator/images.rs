//! The avatar summary worker: one long-lived task draining an unbounded
//! request queue, one request at a time.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};

use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use unicode_width::UnicodeWidthStr;

use crate::client::{ClientError, TimelineClient};
use crate::core::images::{ImageResult, summarize};
use crate::core::post::{User, UserId};

/// Handle for queueing avatar summaries. Cheap to clone.
#[derive(Clone)]
pub struct ImageRequests {
    tx: UnboundedSender<User>,
}

impl ImageRequests {
    /// Queues a summary for `user`'s current avatar. Never blocks.
    pub fn request(&self, user: &User) {
        if user.avatar_url.is_empty() {
            return;
        }
        if self.tx.send(user.clone()).is_err() {
            debug!("Image worker gone, dropping request for @{}", user.handle);
        }
    }
}

/// Spawns the worker. Results land on `results`; the worker exits when
/// either side of it is dropped.
pub fn spawn_image_worker(
    client: Arc<dyn TimelineClient>,
    results: mpsc::Sender<ImageResult>,
) -> ImageRequests {
    let (tx, rx) = unbounded_channel();
    tokio::spawn(image_worker(client, rx, results));
    ImageRequests { tx }
}

async fn image_worker(
    client: Arc<dyn TimelineClient>,
    mut requests: UnboundedReceiver<User>,
    results: mpsc::Sender<ImageResult>,
) {
    info!("Image worker started");
    // URL each user's published summary was computed from.
    let mut summarized: HashMap<UserId, String> = HashMap::new();

    while let Some(user) = requests.recv().await {
        if summarized.get(&user.id) == Some(&user.avatar_url) {
            continue;
        }
        summarized.remove(&user.id);

        match summarize_avatar(client.as_ref(), &user).await {
            Ok(result) => {
                summarized.insert(user.id, user.avatar_url.clone());
                if results.send(result).is_err() {
                    info!("Image result receiver dropped, stopping worker");
                    return;
                }
            }
            // Not retried; the username keeps its fallback colouring.
            Err(e) => warn!("Avatar summary for @{} failed: {e}", user.handle),
        }
    }
    info!("Image request queue closed, stopping worker");
}

async fn summarize_avatar(
    client: &dyn TimelineClient,
    user: &User,
) -> Result<ImageResult, ClientError> {
    let bytes = client.fetch_bytes(&user.avatar_url).await?;
    let url = user.avatar_url.clone();
    let width = user.at_handle().width();

    let summary = tokio::task::spawn_blocking(move || summarize(&url, &bytes, width))
        .await
        .map_err(|e| ClientError::Parse(e.to_string()))?
        .map_err(|e| ClientError::Parse(e.to_string()))?;

    debug!("Summarized avatar for @{}: {:?}", user.handle, summary.palette);
    Ok(ImageResult {
        user_id: user.id,
        summary,
    })
}
