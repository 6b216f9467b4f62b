//! Transport layer for gambit.
//!
//! Currently provides HTTP lobby routes and WebSocket game traffic via axum.

pub mod http;

pub use http::{ServerConfig, serve};
