//! Fire-and-forget execution of outgoing actions, one task per action.

use std::sync::{Arc, mpsc};

use log::{info, warn};

use crate::client::{ClientError, TimelineClient};
use crate::core::action::{ActionId, ActionOutcome, ActionRequest, ActionUpdate};

/// Spawns `request` on its own task. Status reports go to `updates`; if
/// the receiver is gone by then they are silently discarded.
pub fn spawn_action(
    client: Arc<dyn TimelineClient>,
    id: ActionId,
    request: ActionRequest,
    updates: mpsc::Sender<ActionUpdate>,
) {
    info!("Spawning outgoing action {} ({})", request.label(), id);
    tokio::spawn(async move {
        if updates.send(ActionUpdate::Started(id)).is_err() {
            return;
        }
        let result = execute(client.as_ref(), &request).await;
        if let Err(e) = &result {
            warn!("Outgoing action {} ({}) failed: {e}", request.label(), id);
        }
        let _ = updates.send(ActionUpdate::Finished {
            id,
            result: result.map_err(|e| e.to_string()),
        });
    });
}

async fn execute(
    client: &dyn TimelineClient,
    request: &ActionRequest,
) -> Result<ActionOutcome, ClientError> {
    match request {
        ActionRequest::Post { text } => client.post(text, None).await.map(ActionOutcome::Created),
        ActionRequest::Reply { text, to } => client
            .post(text, Some(*to))
            .await
            .map(ActionOutcome::Created),
        ActionRequest::Favorite(id) => client.favorite(*id).await.map(ActionOutcome::Updated),
        ActionRequest::Unfavorite(id) => client.unfavorite(*id).await.map(ActionOutcome::Updated),
        ActionRequest::Repost(id) => client.repost(*id).await.map(ActionOutcome::Created),
        ActionRequest::Delete(id) => client.delete(*id).await.map(|_| ActionOutcome::Deleted(*id)),
    }
}
