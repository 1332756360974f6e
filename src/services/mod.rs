//! External collaborators module
//!
//! Notification delivery and remote session sync live here.

pub mod notifications;
pub mod session_sync;

// Re-export main types
pub use notifications::*;
pub use session_sync::*;
