//! Backend REST boundary for the Carebot chat client.
//!
//! Contains the API configuration, the wire protocol types, and the
//! reqwest-backed client. This crate is the only place in the workspace
//! that talks HTTP.

pub mod client;
pub mod config;
pub mod protocol;

pub use client::{ChatApi, HttpChatApi};
pub use config::ApiConfig;
