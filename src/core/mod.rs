//! # Core Application Logic
//!
//! The timeline domain. It knows nothing about any specific UI technology
//! or about the network.
//!
//! ```text
//!   client (network) ──► coordinator ──► ┌──────────── CORE ────────────┐
//!                                        │  store: posts, views, tree   │
//!                                        │  actions: outgoing requests  │
//!                                        │  images: avatar summaries    │
//!                                        └──────────────┬───────────────┘
//!                                                       ▼
//!                                                tui (ratatui)
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all application state in one place
//! - [`store`] and [`view`]: the post index and the tabs that show it
//! - [`pieces`]: post text split into styled, width-measured pieces
//! - [`action`]: outgoing actions and their status
//! - [`images`]: two-colour avatar summaries

pub mod action;
pub mod config;
pub mod event;
pub mod images;
pub mod pieces;
pub mod post;
pub mod services;
pub mod state;
pub mod store;
pub mod view;
