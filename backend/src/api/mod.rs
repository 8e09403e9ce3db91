//! HTTP API module.
//!
//! This module provides the HTTP server, wire types and the diagnostic log
//! stream for the Samplefindr backend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
