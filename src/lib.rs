//! Wriders - publishing and reading serialized books
//!
//! Authors publish books chapter by chapter, optionally grouped into series.
//! Readers follow books, favorite books and chapters, mark chapters read and
//! discuss them in threaded comments. Reading time is estimated from each
//! reader's measured words-per-minute.
//!
//! ## Layers
//!
//! - **routes**: HTTP/JSON surface with the `{success, data}` envelope
//! - **services**: validation, visibility and ownership rules per resource
//! - **db**: storage traits with MongoDB and in-memory backends
//! - **auth**: JWT sessions, Argon2 passwords, roles and access predicates

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, WridersError};
