//! # Outgoing Actions
//!
//! Every network mutation the user triggers (post, reply, favorite,
//! repost, delete) becomes an `OutgoingAction`. The coordinator runs each
//! one on its own task and reports back through `ActionUpdate`s; the UI
//! only ever reads the status.
//!
//! ```text
//! Queued ──► Started ──► Success
//!                   └──► Failure
//! ```
//!
//! Transitions only move forward and each happens at most once. Nothing is
//! retried. Finished actions stay in the tracker until the activity ticker
//! retires them.

use uuid::Uuid;

use crate::core::post::{Post, PostId};

pub type ActionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Post { text: String },
    Reply { text: String, to: PostId },
    Favorite(PostId),
    Unfavorite(PostId),
    Repost(PostId),
    Delete(PostId),
}

impl ActionRequest {
    /// Short name shown on the activity ticker.
    pub fn label(&self) -> &'static str {
        match self {
            ActionRequest::Post { .. } => "post",
            ActionRequest::Reply { .. } => "reply",
            ActionRequest::Favorite(_) => "fav",
            ActionRequest::Unfavorite(_) => "unfav",
            ActionRequest::Repost(_) => "RT",
            ActionRequest::Delete(_) => "delete",
        }
    }

    pub fn target(&self) -> Option<PostId> {
        match self {
            ActionRequest::Post { .. } => None,
            ActionRequest::Reply { to, .. } => Some(*to),
            ActionRequest::Favorite(id)
            | ActionRequest::Unfavorite(id)
            | ActionRequest::Repost(id)
            | ActionRequest::Delete(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionStatus {
    Queued,
    Started,
    Success,
    Failure,
}

impl ActionStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ActionStatus::Success | ActionStatus::Failure)
    }
}

/// What a successful action hands back for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A new post (or repost) created by the viewer
    Created(Post),
    /// The target post with fresh counts and flags
    Updated(Post),
    Deleted(PostId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionUpdate {
    Started(ActionId),
    Finished {
        id: ActionId,
        result: Result<ActionOutcome, String>,
    },
}

impl ActionUpdate {
    pub fn id(&self) -> ActionId {
        match self {
            ActionUpdate::Started(id) => *id,
            ActionUpdate::Finished { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingAction {
    pub id: ActionId,
    pub request: ActionRequest,
    pub status: ActionStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Error text for a failure; `None` until finished or on success
    pub error: Option<String>,
}

/// Ordered set of in-flight and recently finished actions.
#[derive(Debug, Default)]
pub struct ActionTracker {
    actions: Vec<OutgoingAction>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new action in the `Queued` state.
    pub fn queue(&mut self, request: ActionRequest) -> ActionId {
        let id = Uuid::new_v4();
        self.actions.push(OutgoingAction {
            id,
            request,
            status: ActionStatus::Queued,
            started_at: None,
            error: None,
        });
        id
    }

    /// Applies a status report. Reports for unknown (already retired)
    /// actions and backward transitions are ignored. Returns the outcome of
    /// a successful finish so the caller can apply it to the store.
    pub fn apply(
        &mut self,
        update: ActionUpdate,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<ActionOutcome> {
        let Some(action) = self.actions.iter_mut().find(|a| a.id == update.id()) else {
            log::debug!("Dropping update for retired action {}", update.id());
            return None;
        };
        match update {
            ActionUpdate::Started(_) => {
                if action.status == ActionStatus::Queued {
                    action.status = ActionStatus::Started;
                    action.started_at = Some(now);
                }
                None
            }
            ActionUpdate::Finished { result, .. } => {
                if action.status.is_finished() {
                    return None;
                }
                if action.started_at.is_none() {
                    action.started_at = Some(now);
                }
                match result {
                    Ok(outcome) => {
                        action.status = ActionStatus::Success;
                        Some(outcome)
                    }
                    Err(message) => {
                        action.status = ActionStatus::Failure;
                        action.error = Some(message);
                        None
                    }
                }
            }
        }
    }

    /// Removes a finished action. The relative order of the rest is kept.
    pub fn retire(&mut self, id: ActionId) -> bool {
        let before = self.actions.len();
        self.actions
            .retain(|a| !(a.id == id && a.status.is_finished()));
        self.actions.len() != before
    }

    pub fn get(&self, id: ActionId) -> Option<&OutgoingAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutgoingAction> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
