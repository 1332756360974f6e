//! In-memory timer registry

use std::collections::HashMap;

use super::TimerRecord;

/// Live mapping of timer ids to their records.
///
/// Constructed once at process start and handed to the controller; it is the
/// source of truth for queries while the process lives and is lost on restart.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: HashMap<String, TimerRecord>,
}

impl TimerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the record stored under its timer id
    pub fn upsert(&mut self, record: TimerRecord) -> Option<TimerRecord> {
        self.timers.insert(record.timer_id.clone(), record)
    }

    pub fn get(&self, timer_id: &str) -> Option<&TimerRecord> {
        self.timers.get(timer_id)
    }

    pub fn get_mut(&mut self, timer_id: &str) -> Option<&mut TimerRecord> {
        self.timers.get_mut(timer_id)
    }

    pub fn remove(&mut self, timer_id: &str) -> Option<TimerRecord> {
        self.timers.remove(timer_id)
    }

    pub fn contains(&self, timer_id: &str) -> bool {
        self.timers.contains_key(timer_id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
