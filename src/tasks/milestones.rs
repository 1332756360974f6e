//! Milestone notification scheduling

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::services::NotificationEmitter;

/// Elapsed minutes at which a running timer announces itself
pub const MILESTONE_MINUTES: [u32; 3] = [25, 50, 60];

/// A milestone that is still ahead of `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMilestone {
    pub minutes: u32,
    pub delay: Duration,
}

/// Milestones for a timer started at `start_time` that have not yet passed.
///
/// Milestones whose instant is at or before `now` are dropped, never fired late.
/// So are milestones whose instant falls outside the representable range.
pub fn plan(start_time: DateTime<Utc>, now: DateTime<Utc>) -> Vec<PlannedMilestone> {
    MILESTONE_MINUTES
        .iter()
        .filter_map(|&minutes| {
            let fire_at =
                start_time.checked_add_signed(chrono::Duration::minutes(i64::from(minutes)))?;
            let delay = fire_at.signed_duration_since(now).to_std().ok()?;
            if delay.is_zero() {
                return None;
            }
            Some(PlannedMilestone { minutes, delay })
        })
        .collect()
}

/// Spawns one delayed task per upcoming milestone.
///
/// Every set scheduled for a timer shares a cancellation token. Tokens are only
/// triggered when `cancel_on_change` is set; otherwise milestones keep firing
/// after the timer is paused, stopped or restarted.
pub struct MilestoneScheduler {
    notifier: Arc<dyn NotificationEmitter>,
    cancel_on_change: bool,
    armed: HashMap<String, CancellationToken>,
}

impl MilestoneScheduler {
    pub fn new(notifier: Arc<dyn NotificationEmitter>, cancel_on_change: bool) -> Self {
        Self {
            notifier,
            cancel_on_change,
            armed: HashMap::new(),
        }
    }

    /// Arm milestones for `timer_id`, returning the minute marks scheduled
    pub fn schedule(&mut self, timer_id: &str, start_time: DateTime<Utc>) -> Vec<u32> {
        self.release(timer_id);

        let planned = plan(start_time, Utc::now());
        let token = CancellationToken::new();

        for milestone in &planned {
            let notifier = Arc::clone(&self.notifier);
            let token = token.clone();
            let timer_id = timer_id.to_string();
            let PlannedMilestone { minutes, delay } = *milestone;

            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep(delay) => {
                        info!("Timer {} reached {} minutes", timer_id, minutes);
                        notifier.notify_milestone(&timer_id, minutes);
                    }
                    _ = token.cancelled() => {
                        debug!("Cancelled {}-minute milestone for {}", minutes, timer_id);
                    }
                }
            });
        }

        let minutes: Vec<u32> = planned.iter().map(|m| m.minutes).collect();
        debug!("Scheduled milestones {:?} for {}", minutes, timer_id);
        self.armed.insert(timer_id.to_string(), token);
        minutes
    }

    pub fn timer_paused(&mut self, timer_id: &str) {
        self.release(timer_id);
    }

    pub fn timer_stopped(&mut self, timer_id: &str) {
        self.release(timer_id);
    }

    /// Number of timers with a tracked milestone set
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    fn release(&mut self, timer_id: &str) {
        if let Some(token) = self.armed.remove(timer_id) {
            if self.cancel_on_change {
                token.cancel();
            }
        }
    }
}
