//! Command loop background task
//!
//! The loop owns the timer controller. Messages are handled one at a time in
//! arrival order; only store writes and sync flushes outlive their handler.

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    protocol::{Command, TimerStateReply},
    services::{FlushReport, SyncDispatcher, SYNC_TAG},
    state::TimerController,
};

/// Capacity of the inbound message queue
pub const INBOUND_QUEUE: usize = 256;

/// Work accepted by the command loop
#[derive(Debug)]
pub enum Inbound {
    /// A protocol command; `reply` is set for `GET_TIMER_STATE`
    Command {
        command: Command,
        reply: Option<oneshot::Sender<TimerStateReply>>,
    },
    /// Connectivity restored, tagged by the caller
    SyncRequested {
        tag: String,
        reply: Option<oneshot::Sender<SyncOutcome>>,
    },
    /// Resolve once every timer write and session enqueue issued so far has finished
    Settle(oneshot::Sender<()>),
}

/// Result of a connectivity-restored signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The tag was not ours
    Ignored,
    Flushed(FlushReport),
    Failed,
}

/// Published after each handled message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStatus {
    pub live_timers: usize,
    pub handled: u64,
}

/// Spawn the loop and return its inbox and status feed
pub fn spawn_command_loop(
    controller: TimerController,
    sync: SyncDispatcher,
) -> (mpsc::Sender<Inbound>, watch::Receiver<LoopStatus>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let (status_tx, status_rx) = watch::channel(LoopStatus {
        live_timers: controller.registry().len(),
        handled: 0,
    });

    tokio::spawn(command_loop(controller, sync, inbound_rx, status_tx));
    (inbound_tx, status_rx)
}

/// Handle inbound messages until every sender is gone
pub async fn command_loop(
    mut controller: TimerController,
    sync: SyncDispatcher,
    mut inbound: mpsc::Receiver<Inbound>,
    status_tx: watch::Sender<LoopStatus>,
) {
    info!("Starting command loop");
    let mut handled = 0u64;
    let mut enqueues: Vec<JoinHandle<()>> = Vec::new();

    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::Command { command, reply } => {
                enqueues.retain(|handle| !handle.is_finished());
                if let Some(enqueue) = handle_command(&mut controller, &sync, command, reply) {
                    enqueues.push(enqueue);
                }
            }
            Inbound::SyncRequested { tag, reply } => handle_sync(&sync, tag, reply),
            Inbound::Settle(done) => {
                controller.settle().await;
                for handle in enqueues.drain(..) {
                    if let Err(e) = handle.await {
                        error!("Session enqueue task failed: {}", e);
                    }
                }
                if done.send(()).is_err() {
                    debug!("Settle requester went away");
                }
            }
        }

        handled += 1;
        status_tx.send_replace(LoopStatus {
            live_timers: controller.registry().len(),
            handled,
        });
    }

    info!("Command loop finished after {} messages", handled);
}

/// Apply one command; a session enqueue hands back its write task
fn handle_command(
    controller: &mut TimerController,
    sync: &SyncDispatcher,
    command: Command,
    reply: Option<oneshot::Sender<TimerStateReply>>,
) -> Option<JoinHandle<()>> {
    debug!("Handling {}", command.kind());

    match command {
        Command::StartTimer(start) => controller.start(
            &start.timer_id,
            start.start_time,
            &start.subject,
            &start.user_id,
            start.accumulated_time,
        ),
        Command::PauseTimer(pause) => controller.pause(&pause.timer_id, pause.accumulated_time),
        Command::StopTimer(stop) => controller.stop(&stop.timer_id),
        Command::GetTimerState(query) => {
            let snapshot = controller.query(&query.timer_id);
            match reply {
                Some(reply) => {
                    if reply.send(TimerStateReply::new(snapshot)).is_err() {
                        warn!("Timer state requester for {} went away", query.timer_id);
                    }
                }
                None => warn!("Timer state for {} requested without a reply channel", query.timer_id),
            }
        }
        Command::SyncStudySession(session) => {
            let pending = sync.enqueue(&session);
            return Some(tokio::spawn(async move {
                match pending.wait().await {
                    Ok(id) => debug!("Queued study session {}", id),
                    Err(e) => error!("Failed to queue study session: {:#}", e),
                }
            }));
        }
    }
    None
}

fn handle_sync(
    sync: &SyncDispatcher,
    tag: String,
    reply: Option<oneshot::Sender<SyncOutcome>>,
) {
    if tag != SYNC_TAG {
        debug!("Ignoring sync request with tag {}", tag);
        if let Some(reply) = reply {
            let _ = reply.send(SyncOutcome::Ignored);
        }
        return;
    }

    let sync = sync.clone();
    tokio::spawn(async move {
        let outcome = match sync.flush().await {
            Ok(report) => SyncOutcome::Flushed(report),
            Err(e) => {
                error!("Study session sync failed: {:#}", e);
                SyncOutcome::Failed
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    });
}
