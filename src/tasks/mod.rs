//! Background tasks module
//!
//! This module contains the command loop and the milestone timers it arms.

pub mod command_loop;
pub mod milestones;

// Re-export main types
pub use command_loop::{command_loop, spawn_command_loop, Inbound, LoopStatus, SyncOutcome};
pub use milestones::{plan, MilestoneScheduler, PlannedMilestone, MILESTONE_MINUTES};
