//! Domain models and pure state logic for the Carebot chat client.
//!
//! Everything here is presentation-independent: the message log, the session
//! entity, the quick-action catalog, dynamic forms with local validation,
//! the aggregate dispatch state with its reducer, and the storage capability
//! trait. Network and persistence live in sibling crates.

pub mod error;
pub mod form;
pub mod message;
pub mod quick_action;
pub mod session;
pub mod state;
pub mod storage;

// Re-export common error type
pub use error::CarebotError;
