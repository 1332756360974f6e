//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, warn};

use crate::{
    config::Config,
    protocol::{parse_message, Command, MessageError, TimerRef, TimerStateReply},
    services::{LogNotifier, NotificationEmitter, NoopSink, SessionSink, SyncDispatcher},
    store::Store,
    tasks::{spawn_command_loop, Inbound, LoopStatus, MilestoneScheduler, SyncOutcome},
};

use super::{TimerController, TimerRegistry};

/// Shared handle to the running service: the command loop inbox plus metadata
#[derive(Debug)]
pub struct AppState {
    /// Inbox of the command loop that owns all timer state
    commands: mpsc::Sender<Inbound>,
    /// Latest status published by the command loop
    status_rx: watch::Receiver<LoopStatus>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last command tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    /// Wire up the store, registry and controller with the default collaborators
    pub async fn launch(config: &Config) -> Arc<Self> {
        let notifier = Arc::new(LogNotifier::new(config.notifications));
        Self::launch_with(config, notifier, Arc::new(NoopSink)).await
    }

    /// Wire up the service with explicit notification and sync collaborators
    pub async fn launch_with(
        config: &Config,
        notifier: Arc<dyn NotificationEmitter>,
        sink: Arc<dyn SessionSink>,
    ) -> Arc<Self> {
        let store = Store::new(&config.db_path);
        let milestones = MilestoneScheduler::new(notifier, config.cancel_milestones);
        let mut controller = TimerController::new(TimerRegistry::new(), store.clone(), milestones);

        if config.restore_timers {
            if let Err(e) = controller.restore().await {
                error!("Failed to restore timers from {}: {:#}", store.path().display(), e);
            }
        }

        let sync = SyncDispatcher::with_sink(store, sink);
        let (commands, status_rx) = spawn_command_loop(controller, sync);

        Arc::new(Self::new(config.port, config.host.clone(), commands, status_rx))
    }

    /// Create an AppState around an already running command loop
    pub fn new(
        port: u16,
        host: String,
        commands: mpsc::Sender<Inbound>,
        status_rx: watch::Receiver<LoopStatus>,
    ) -> Self {
        Self {
            commands,
            status_rx,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Decode and dispatch one protocol message.
    ///
    /// Unknown types and bad payloads are logged and ignored (`Ok(None)`);
    /// only a message without a string `type` is an error.
    pub async fn handle_message(&self, message: Value) -> Result<Option<TimerStateReply>, MessageError> {
        let command = match parse_message(message) {
            Ok(command) => command,
            Err(MessageError::Malformed) => return Err(MessageError::Malformed),
            Err(e) => {
                warn!("Ignoring message: {}", e);
                return Ok(None);
            }
        };

        if command.expects_reply() {
            Ok(Some(self.request_state(command).await))
        } else {
            self.dispatch(command).await;
            Ok(None)
        }
    }

    /// Send a command without waiting for its effects
    pub async fn dispatch(&self, command: Command) {
        self.record_action(command.kind());
        let inbound = Inbound::Command { command, reply: None };
        if let Err(e) = self.commands.send(inbound).await {
            error!("Command loop is gone, dropping {:?}", e.0);
        }
    }

    /// Current snapshot of `timer_id`, null when unknown
    pub async fn timer_state(&self, timer_id: &str) -> TimerStateReply {
        self.request_state(Command::GetTimerState(TimerRef {
            timer_id: timer_id.to_string(),
        }))
        .await
    }

    async fn request_state(&self, command: Command) -> TimerStateReply {
        self.record_action(command.kind());
        let (reply_tx, reply_rx) = oneshot::channel();
        let inbound = Inbound::Command {
            command,
            reply: Some(reply_tx),
        };

        if self.commands.send(inbound).await.is_err() {
            error!("Command loop is gone, answering timer state with null");
            return TimerStateReply::new(None);
        }

        reply_rx.await.unwrap_or_else(|_| {
            error!("Command loop dropped a timer state request");
            TimerStateReply::new(None)
        })
    }

    /// Deliver a connectivity-restored signal
    pub async fn request_sync(&self, tag: &str) -> SyncOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let inbound = Inbound::SyncRequested {
            tag: tag.to_string(),
            reply: Some(reply_tx),
        };

        if self.commands.send(inbound).await.is_err() {
            error!("Command loop is gone, sync request dropped");
            return SyncOutcome::Failed;
        }
        reply_rx.await.unwrap_or(SyncOutcome::Failed)
    }

    /// Wait until every store write issued by earlier commands has finished
    pub async fn settle(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Inbound::Settle(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Latest status published by the command loop
    pub fn loop_status(&self) -> LoopStatus {
        *self.status_rx.borrow()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last command information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }
}
