//! Queueing of study sessions for remote delivery

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    state::StudySessionRecord,
    store::{Pending, Store},
};

/// Background-sync tag that triggers a flush
pub const SYNC_TAG: &str = "study-session-sync";

/// Remote collaborator that accepts queued sessions.
///
/// Returns the keys it accepted; only those are removed from the queue.
pub trait SessionSink: Send + Sync {
    fn deliver(&self, sessions: &[StudySessionRecord]) -> anyhow::Result<Vec<i64>>;
}

/// Sink used until a sync backend exists: accepts nothing
#[derive(Debug, Default, Clone)]
pub struct NoopSink;

impl SessionSink for NoopSink {
    fn deliver(&self, sessions: &[StudySessionRecord]) -> anyhow::Result<Vec<i64>> {
        debug!("No sync backend configured, keeping {} sessions queued", sessions.len());
        Ok(Vec::new())
    }
}

/// Outcome of one flush pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub pending: usize,
    pub delivered: usize,
}

/// Appends sessions to the durable queue and hands them to a sink on flush
#[derive(Clone)]
pub struct SyncDispatcher {
    store: Store,
    sink: Arc<dyn SessionSink>,
}

impl SyncDispatcher {
    pub fn new(store: Store) -> Self {
        Self::with_sink(store, Arc::new(NoopSink))
    }

    pub fn with_sink(store: Store, sink: Arc<dyn SessionSink>) -> Self {
        Self { store, sink }
    }

    /// Queue a session payload; the write proceeds whether or not the result is awaited
    pub fn enqueue(&self, session: &serde_json::Value) -> Pending<i64> {
        self.store.add_session(session)
    }

    /// Offer every queued session to the sink and drop the delivered ones
    pub async fn flush(&self) -> anyhow::Result<FlushReport> {
        let pending = self.store.pending_sessions().wait().await?;
        if pending.is_empty() {
            return Ok(FlushReport::default());
        }

        let delivered = match self.sink.deliver(&pending) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Session delivery failed, keeping {} queued: {:#}", pending.len(), e);
                Vec::new()
            }
        };

        let removed = if delivered.is_empty() {
            0
        } else {
            self.store.remove_sessions(delivered).wait().await?
        };

        info!("Session sync: {} pending, {} delivered", pending.len(), removed);
        Ok(FlushReport {
            pending: pending.len().saturating_sub(removed),
            delivered: removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AcceptFirst;

    impl SessionSink for AcceptFirst {
        fn deliver(&self, sessions: &[StudySessionRecord]) -> anyhow::Result<Vec<i64>> {
            Ok(sessions.iter().take(1).map(|s| s.id).collect())
        }
    }

    #[tokio::test]
    async fn noop_sink_keeps_everything_queued() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = SyncDispatcher::new(Store::new(dir.path().join("store.db")));

        dispatcher.enqueue(&json!({"subject": "math"})).wait().await.unwrap();
        dispatcher.enqueue(&json!({"subject": "art"})).wait().await.unwrap();

        let report = dispatcher.flush().await.unwrap();
        assert_eq!(report, FlushReport { pending: 2, delivered: 0 });
    }

    #[tokio::test]
    async fn delivered_sessions_leave_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("store.db"));
        let dispatcher = SyncDispatcher::with_sink(store.clone(), Arc::new(AcceptFirst));

        dispatcher.enqueue(&json!(1)).wait().await.unwrap();
        dispatcher.enqueue(&json!(2)).wait().await.unwrap();

        let report = dispatcher.flush().await.unwrap();
        assert_eq!(report, FlushReport { pending: 1, delivered: 1 });

        let remaining = store.pending_sessions().wait().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, json!(2));
    }

    /// Queues one more session mid-delivery and claims it along with the snapshot
    struct LateArrival {
        store: Store,
    }

    impl SessionSink for LateArrival {
        fn deliver(&self, sessions: &[StudySessionRecord]) -> anyhow::Result<Vec<i64>> {
            let _ = self.store.add_session(&json!("late"));
            let mut ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
            ids.extend(sessions.iter().map(|s| s.id).max().map(|id| id + 1));
            Ok(ids)
        }
    }

    #[tokio::test]
    async fn sink_claiming_unseen_sessions_does_not_underflow() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("store.db"));
        let sink = Arc::new(LateArrival { store: store.clone() });
        let dispatcher = SyncDispatcher::with_sink(store.clone(), sink);

        dispatcher.enqueue(&json!(1)).wait().await.unwrap();
        dispatcher.enqueue(&json!(2)).wait().await.unwrap();

        let report = dispatcher.flush().await.unwrap();
        assert_eq!(report, FlushReport { pending: 0, delivered: 3 });
        assert!(store.pending_sessions().wait().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_queue_flush_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = SyncDispatcher::new(Store::new(dir.path().join("store.db")));
        assert_eq!(dispatcher.flush().await.unwrap(), FlushReport::default());
    }
}
