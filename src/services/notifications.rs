//! User-visible milestone notifications

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Whether the host lets us show notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    Unsupported,
}

/// A rendered milestone notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneNotification {
    pub timer_id: String,
    pub minutes_elapsed: u32,
    pub title: String,
    pub body: String,
}

impl MilestoneNotification {
    pub fn new(timer_id: &str, minutes_elapsed: u32) -> Self {
        Self {
            timer_id: timer_id.to_string(),
            minutes_elapsed,
            title: "Study milestone reached".to_string(),
            body: format!("You've been studying for {} minutes. Keep it up!", minutes_elapsed),
        }
    }

    /// Tag used to collapse repeated notifications for one timer
    pub fn tag(&self) -> String {
        format!("timer-{}", self.timer_id)
    }
}

/// Sink for milestone notifications.
///
/// `notify_milestone` performs the capability check, so callers can fire and
/// forget: without a granted permission the notification is skipped silently.
pub trait NotificationEmitter: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    fn show(&self, notification: MilestoneNotification);

    fn notify_milestone(&self, timer_id: &str, minutes_elapsed: u32) {
        let permission = self.permission();
        if permission != NotificationPermission::Granted {
            debug!(
                "Skipping {}-minute notification for {}: permission {:?}",
                minutes_elapsed, timer_id, permission
            );
            return;
        }
        self.show(MilestoneNotification::new(timer_id, minutes_elapsed));
    }
}

/// Emitter that surfaces notifications through the service log
#[derive(Debug, Clone)]
pub struct LogNotifier {
    permission: NotificationPermission,
}

impl LogNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self { permission }
    }
}

impl NotificationEmitter for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, notification: MilestoneNotification) {
        info!(
            tag = %notification.tag(),
            "{}: {}",
            notification.title,
            notification.body
        );
    }
}

/// Emitter that keeps every shown notification in memory
#[cfg(test)]
#[derive(Debug)]
pub struct RecordingNotifier {
    permission: NotificationPermission,
    shown: std::sync::Mutex<Vec<MilestoneNotification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            shown: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// `(timer_id, minutes)` pairs in the order they were shown
    pub fn shown(&self) -> Vec<(String, u32)> {
        let shown = self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        shown
            .iter()
            .map(|n| (n.timer_id.clone(), n.minutes_elapsed))
            .collect()
    }
}

#[cfg(test)]
impl NotificationEmitter for RecordingNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, notification: MilestoneNotification) {
        self.shown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granted_permission_shows_notification() {
        let notifier = RecordingNotifier::new(NotificationPermission::Granted);
        notifier.notify_milestone("t1", 25);
        assert_eq!(notifier.shown(), vec![("t1".to_string(), 25)]);
    }

    #[test]
    fn missing_permission_skips_silently() {
        for permission in [NotificationPermission::Denied, NotificationPermission::Unsupported] {
            let notifier = RecordingNotifier::new(permission);
            notifier.notify_milestone("t1", 50);
            assert!(notifier.shown().is_empty());
        }
    }

    #[test]
    fn notification_text_mentions_minutes() {
        let notification = MilestoneNotification::new("t9", 60);
        assert!(notification.body.contains("60 minutes"));
        assert_eq!(notification.tag(), "timer-t9");
    }
}
