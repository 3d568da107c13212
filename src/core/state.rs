//! # Application State
//!
//! Core business state for Twepic. This module contains domain logic only,
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── config: ResolvedConfig    // resolved settings
//! ├── store: PostStore          // posts, views, reply tree
//! ├── images: ImageCache        // avatar summaries by user id
//! ├── actions: ActionTracker    // outgoing actions in flight
//! └── should_quit: bool         // checked once per loop iteration
//! ```
//!
//! Only the UI thread holds an `App`. Background tasks talk to it through
//! the coordinator's queues.

use crate::core::action::ActionTracker;
use crate::core::config::ResolvedConfig;
use crate::core::images::ImageCache;
use crate::core::post::User;
use crate::core::services::Services;
use crate::core::store::PostStore;

pub struct App {
    pub config: ResolvedConfig,
    pub store: PostStore,
    pub images: ImageCache,
    pub actions: ActionTracker,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: ResolvedConfig, services: Services) -> Self {
        Self {
            config,
            store: PostStore::new(services),
            images: ImageCache::new(),
            actions: ActionTracker::new(),
            should_quit: false,
        }
    }

    pub fn with_viewer(mut self, viewer: User) -> Self {
        self.store.set_viewer(viewer);
        self
    }

    pub fn viewer(&self) -> Option<&User> {
        self.store.viewer()
    }

    pub fn services(&self) -> &Services {
        self.store.services()
    }
}
