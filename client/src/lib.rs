//! Terminal client for the adaptive chatbot backend.
//!
//! [`api`] wraps the HTTP contract, [`state`] holds the client-visible state
//! and its transitions, [`app`] turns key presses into requests and folds the
//! results back in, and [`ui`] draws it all.

pub mod api;
pub mod app;
pub mod app_event;
pub mod config;
pub mod state;
pub mod ui;
