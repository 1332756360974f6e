//! Timer state machine
//!
//! Each timer moves `ABSENT -> RUNNING -> PAUSED -> (RUNNING | ABSENT)`. The
//! registry is updated synchronously; the store mirror is written through on
//! detached tasks, so a store failure leaves the two out of step until the
//! next write for that timer. Nothing is retried.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    store::{Pending, Store},
    tasks::MilestoneScheduler,
};

use super::{TimerRecord, TimerRegistry, TimerSnapshot};

pub struct TimerController {
    registry: TimerRegistry,
    store: Store,
    milestones: MilestoneScheduler,
    writes: Vec<JoinHandle<()>>,
}

impl TimerController {
    pub fn new(registry: TimerRegistry, store: Store, milestones: MilestoneScheduler) -> Self {
        Self {
            registry,
            store,
            milestones,
            writes: Vec::new(),
        }
    }

    /// Create or overwrite a running timer
    pub fn start(
        &mut self,
        timer_id: &str,
        start_time: DateTime<Utc>,
        subject: &str,
        user_id: &str,
        accumulated_time: f64,
    ) {
        let record = TimerRecord::running(
            timer_id.to_string(),
            start_time,
            subject.to_string(),
            user_id.to_string(),
            accumulated_time,
        );

        let pending = self.store.put_timer(&record);
        if self.registry.upsert(record).is_some() {
            debug!("Timer {} restarted, previous state replaced", timer_id);
        }
        self.write_through(format!("put timer {}", timer_id), pending);

        let scheduled = self.milestones.schedule(timer_id, start_time);
        info!(
            "Timer {} started for {} ({} milestones pending)",
            timer_id,
            subject,
            scheduled.len()
        );
    }

    /// Pause a timer, banking the caller's accumulated seconds. Absent timers are ignored.
    pub fn pause(&mut self, timer_id: &str, accumulated_time: f64) {
        let Some(record) = self.registry.get_mut(timer_id) else {
            debug!("Pause ignored, timer {} not found", timer_id);
            return;
        };

        record.pause(Utc::now(), accumulated_time);
        let pending = self.store.put_timer(record);
        self.write_through(format!("put timer {}", timer_id), pending);
        self.milestones.timer_paused(timer_id);

        info!("Timer {} paused with {}s accumulated", timer_id, accumulated_time);
    }

    /// Forget a timer everywhere. Absent timers are ignored.
    pub fn stop(&mut self, timer_id: &str) {
        if self.registry.remove(timer_id).is_none() {
            debug!("Stop ignored, timer {} not found", timer_id);
            return;
        }

        let pending = self.store.delete_timer(timer_id);
        self.write_through(format!("delete timer {}", timer_id), pending);
        self.milestones.timer_stopped(timer_id);

        info!("Timer {} stopped", timer_id);
    }

    /// Snapshot from the registry at this instant
    pub fn query(&self, timer_id: &str) -> Option<TimerSnapshot> {
        self.registry
            .get(timer_id)
            .map(|record| record.snapshot(Utc::now()))
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    /// Load persisted timers the registry does not know about.
    ///
    /// Running timers get their remaining milestones re-armed.
    pub async fn restore(&mut self) -> anyhow::Result<usize> {
        let persisted = self.store.load_timers().wait().await?;
        let mut restored = 0;

        for record in persisted {
            if self.registry.contains(&record.timer_id) {
                continue;
            }
            if record.is_active {
                self.milestones.schedule(&record.timer_id, record.start_time);
            }
            debug!("Restored timer {} (active={})", record.timer_id, record.is_active);
            self.registry.upsert(record);
            restored += 1;
        }

        info!("Restored {} timers from the store", restored);
        Ok(restored)
    }

    /// Wait for every write-through issued so far
    pub async fn settle(&mut self) {
        for handle in self.writes.drain(..) {
            if let Err(e) = handle.await {
                error!("Store write task failed: {}", e);
            }
        }
    }

    /// Number of write-throughs not yet finished
    pub fn pending_writes(&self) -> usize {
        self.writes.iter().filter(|h| !h.is_finished()).count()
    }

    fn write_through(&mut self, action: String, pending: Pending<()>) {
        self.writes.retain(|handle| !handle.is_finished());
        self.writes.push(tokio::spawn(async move {
            match pending.wait().await {
                Ok(()) => debug!("Store: {}", action),
                Err(e) => error!("Store write failed ({}): {:#}", action, e),
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::services::{NotificationPermission, RecordingNotifier};

    struct Harness {
        controller: TimerController,
        store: Store,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("store.db"));
        let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
        let controller = TimerController::new(
            TimerRegistry::new(),
            store.clone(),
            MilestoneScheduler::new(notifier, false),
        );
        Harness {
            controller,
            store,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_ends_absent() {
        let mut h = harness();
        let start = Utc::now();

        h.controller.start("t1", start, "math", "u1", 0.0);
        h.controller.pause("t1", 30.0);
        h.controller.start("t1", Utc::now(), "math", "u1", 30.0);
        h.controller.stop("t1");
        h.controller.settle().await;

        assert!(h.controller.query("t1").is_none());
        assert!(h.store.load_timer("t1").wait().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn running_elapsed_follows_clock() {
        let mut h = harness();
        h.controller
            .start("t1", Utc::now() - Duration::seconds(90), "math", "u1", 0.0);

        let snapshot = h.controller.query("t1").unwrap();
        assert!(snapshot.is_active);
        assert!((90..=91).contains(&snapshot.elapsed), "elapsed {}", snapshot.elapsed);
    }

    #[tokio::test]
    async fn paused_elapsed_is_frozen() {
        let mut h = harness();
        h.controller
            .start("t1", Utc::now() - Duration::seconds(120), "math", "u1", 0.0);
        h.controller.pause("t1", 120.0);

        let before = h.controller.query("t1").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let after = h.controller.query("t1").unwrap();

        assert!(!after.is_active);
        assert_eq!(before.elapsed, after.elapsed);
        assert!((120..=121).contains(&after.elapsed));
    }

    #[tokio::test]
    async fn absent_pause_and_stop_touch_nothing() {
        let mut h = harness();

        h.controller.pause("ghost", 10.0);
        h.controller.stop("ghost");

        assert_eq!(h.controller.pending_writes(), 0);
        assert!(h.controller.writes.is_empty());
        assert!(h.controller.query("ghost").is_none());
        assert!(h.controller.registry().is_empty());
        assert!(!h.store.is_open());
    }

    #[tokio::test]
    async fn second_start_replaces_every_field() {
        let mut h = harness();
        let first = Utc::now() - Duration::minutes(10);
        let second = Utc::now() - Duration::minutes(1);

        h.controller.start("t1", first, "math", "u1", 100.0);
        h.controller.pause("t1", 200.0);
        h.controller.start("t1", second, "biology", "u2", 5.0);
        h.controller.settle().await;

        let record = h.controller.registry().get("t1").unwrap().clone();
        assert_eq!(record.start_time, second);
        assert_eq!(record.subject, "biology");
        assert_eq!(record.user_id, "u2");
        assert_eq!(record.accumulated_time, 5.0);
        assert!(record.is_active);
        assert!(record.paused_time.is_none());

        let stored = h.store.load_timer("t1").wait().await.unwrap();
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn pause_is_mirrored_to_store() {
        let mut h = harness();
        h.controller.start("t1", Utc::now(), "math", "u1", 0.0);
        h.controller.pause("t1", 42.0);
        h.controller.settle().await;

        let stored = h.store.load_timer("t1").wait().await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(stored.paused_time.is_some());
        assert_eq!(stored.accumulated_time, 42.0);
    }

    #[tokio::test]
    async fn restore_reloads_persisted_timers() {
        let mut h = harness();
        h.controller.start("running", Utc::now(), "math", "u1", 0.0);
        h.controller.start("paused", Utc::now(), "art", "u1", 0.0);
        h.controller.pause("paused", 60.0);
        h.controller.settle().await;

        let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
        let mut fresh = TimerController::new(
            TimerRegistry::new(),
            h.store.clone(),
            MilestoneScheduler::new(notifier, false),
        );
        assert!(fresh.query("running").is_none());

        assert_eq!(fresh.restore().await.unwrap(), 2);
        assert!(fresh.query("running").unwrap().is_active);
        assert!(!fresh.query("paused").unwrap().is_active);
        assert_eq!(fresh.restore().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn restore_rearms_remaining_milestones() {
        let h = harness();
        let start = Utc::now() - Duration::minutes(25) + Duration::milliseconds(100);
        let running = TimerRecord::running("t1".into(), start, "math".into(), "u1".into(), 0.0);
        let mut paused = TimerRecord::running("t2".into(), start, "art".into(), "u1".into(), 0.0);
        paused.pause(Utc::now(), 10.0);
        h.store.put_timer(&running).wait().await.unwrap();
        h.store.put_timer(&paused).wait().await.unwrap();

        let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
        let mut fresh = TimerController::new(
            TimerRegistry::new(),
            h.store.clone(),
            MilestoneScheduler::new(notifier.clone(), false),
        );
        assert_eq!(fresh.restore().await.unwrap(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(notifier.shown(), vec![("t1".to_string(), 25)]);
    }

    #[tokio::test]
    async fn store_failure_does_not_reach_caller() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
        let mut controller = TimerController::new(
            TimerRegistry::new(),
            Store::new(dir.path()),
            MilestoneScheduler::new(notifier, false),
        );

        controller.start("t1", Utc::now(), "math", "u1", 0.0);
        controller.settle().await;

        assert!(controller.query("t1").is_some());
    }
}
