//! State management module
//!
//! This module contains the timer records, the registry that holds them and
//! the controller that drives their state machine.

pub mod app_state;
pub mod controller;
pub mod registry;
pub mod timer_record;

// Re-export main types
pub use app_state::AppState;
pub use controller::TimerController;
pub use registry::TimerRegistry;
pub use timer_record::{StudySessionRecord, TimerRecord, TimerSnapshot};
