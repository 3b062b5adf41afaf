//! HTTP server for Wriders

pub mod http;

pub use http::{handle_request, run, AppState};
