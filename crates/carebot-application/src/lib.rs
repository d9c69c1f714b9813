//! Application layer: conversation orchestration over the core state machine.

pub mod controller;
pub mod session_manager;

pub use controller::ConversationController;
pub use session_manager::SessionManager;
