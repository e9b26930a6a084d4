//! HTTP server components
//!
//! Axum application setup and request handlers for the proxy API.

pub mod app;
pub mod handlers;

pub use app::{AppState, build_state, create_app};
