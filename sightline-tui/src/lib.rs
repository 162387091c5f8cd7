//! Sightline terminal front end.
//!
//! Drives a [`sightline_core::GridEngine`] from keyboard input, query
//! responses and streamed identity batches.

pub mod api_client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod keys;
pub mod logging;
pub mod nav;
pub mod notifications;
pub mod persistence;
pub mod state;
pub mod theme;
pub mod views;
pub mod widgets;
