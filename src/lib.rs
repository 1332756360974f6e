//! Study Timer - A background timer-state service
//!
//! This library tracks concurrent study timers in memory, mirrors them to a
//! SQLite store for recovery across restarts, and announces elapsed-time
//! milestones.

pub mod config;
pub mod protocol;
pub mod state;
pub mod store;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, TimerController, TimerRegistry};
pub use store::Store;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
