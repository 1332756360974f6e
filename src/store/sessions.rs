use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::state::StudySessionRecord;

use super::{parse_datetime, Pending, Store};

impl Store {
    /// Append a session payload and return its assigned key
    pub fn add_session(&self, payload: &serde_json::Value) -> Pending<i64> {
        let payload = payload.to_string();
        self.submit(move |conn| {
            conn.execute(
                "INSERT INTO study_sessions (payload, enqueued_at) VALUES (?1, ?2)",
                params![payload, Utc::now().to_rfc3339()],
            )
            .context("failed to queue study session")?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Every queued session, oldest first
    pub fn pending_sessions(&self) -> Pending<Vec<StudySessionRecord>> {
        self.submit(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload, enqueued_at FROM study_sessions ORDER BY id",
            )?;
            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                let payload: String = row.get(1)?;
                let enqueued_at: String = row.get(2)?;
                sessions.push(StudySessionRecord {
                    id: row.get(0)?,
                    payload: serde_json::from_str(&payload)
                        .context("stored session payload is not valid JSON")?,
                    enqueued_at: parse_datetime(&enqueued_at)?,
                });
            }
            Ok(sessions)
        })
    }

    /// Remove delivered sessions, returning how many rows went away
    pub fn remove_sessions(&self, ids: Vec<i64>) -> Pending<usize> {
        self.submit(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM study_sessions WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute(params![id])?;
                }
            }
            tx.commit().context("failed to remove delivered sessions")?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sessions_are_append_only_with_fresh_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("store.db"));

        let first = store.add_session(&json!({"minutes": 25})).wait().await.unwrap();
        let second = store.add_session(&json!({"minutes": 25})).wait().await.unwrap();
        assert!(second > first);

        let pending = store.pending_sessions().wait().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[0].payload, json!({"minutes": 25}));
    }

    #[tokio::test]
    async fn removed_keys_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("store.db"));

        let first = store.add_session(&json!("a")).wait().await.unwrap();
        assert_eq!(store.remove_sessions(vec![first, 999]).wait().await.unwrap(), 1);

        let next = store.add_session(&json!("b")).wait().await.unwrap();
        assert!(next > first);
        assert_eq!(store.pending_sessions().wait().await.unwrap().len(), 1);
    }
}
