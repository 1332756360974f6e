//! Timer record and snapshot structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable and in-memory representation of one study timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub timer_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    pub subject: String,
    pub user_id: String,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub paused_time: Option<DateTime<Utc>>,
    /// Seconds banked by the caller across earlier run/pause cycles.
    /// Advisory only, stored exactly as given.
    pub accumulated_time: f64,
}

impl TimerRecord {
    /// Create a running timer record
    pub fn running(
        timer_id: String,
        start_time: DateTime<Utc>,
        subject: String,
        user_id: String,
        accumulated_time: f64,
    ) -> Self {
        Self {
            timer_id,
            start_time,
            subject,
            user_id,
            is_active: true,
            paused_time: None,
            accumulated_time,
        }
    }

    /// Mark the timer paused at `at`, replacing the banked seconds
    pub fn pause(&mut self, at: DateTime<Utc>, accumulated_time: f64) {
        self.is_active = false;
        self.paused_time = Some(at);
        self.accumulated_time = accumulated_time;
    }

    /// Whole seconds elapsed since `start_time`, measured at `now` while running
    /// or at the pause instant otherwise
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let end = match (self.is_active, self.paused_time) {
            (false, Some(paused)) => paused,
            _ => now,
        };
        end.signed_duration_since(self.start_time)
            .num_seconds()
            .max(0) as u64
    }

    /// Build a read-only view of this record at `now`
    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        TimerSnapshot {
            timer_id: self.timer_id.clone(),
            elapsed: self.elapsed_seconds(now),
            is_active: self.is_active,
            subject: self.subject.clone(),
            start_time: self.start_time,
        }
    }
}

/// Point-in-time view of a timer returned by queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub timer_id: String,
    /// Whole seconds
    pub elapsed: u64,
    pub is_active: bool,
    pub subject: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
}

/// Queued study session awaiting remote delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionRecord {
    pub id: i64,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}
