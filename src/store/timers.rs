use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::state::TimerRecord;

use super::{parse_datetime, Pending, Store};

const TIMER_COLUMNS: &str =
    "timer_id, start_time, subject, user_id, is_active, paused_time, accumulated_time";

fn row_to_timer(row: &Row) -> Result<TimerRecord> {
    let start_time: String = row.get("start_time")?;
    let paused_time: Option<String> = row.get("paused_time")?;

    Ok(TimerRecord {
        timer_id: row.get("timer_id")?,
        start_time: parse_datetime(&start_time)?,
        subject: row.get("subject")?,
        user_id: row.get("user_id")?,
        is_active: row.get("is_active")?,
        paused_time: paused_time.as_deref().map(parse_datetime).transpose()?,
        accumulated_time: row.get("accumulated_time")?,
    })
}

impl Store {
    /// Insert or replace the record stored under its timer id
    pub fn put_timer(&self, record: &TimerRecord) -> Pending<()> {
        let record = record.clone();
        self.submit(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO timers (timer_id, start_time, subject, user_id, is_active, paused_time, accumulated_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.timer_id,
                    record.start_time.to_rfc3339(),
                    record.subject,
                    record.user_id,
                    record.is_active,
                    record.paused_time.map(|dt| dt.to_rfc3339()),
                    record.accumulated_time,
                ],
            )
            .with_context(|| format!("failed to put timer {}", record.timer_id))?;
            Ok(())
        })
    }

    /// Delete the record for `timer_id`; deleting a missing key is not an error
    pub fn delete_timer(&self, timer_id: &str) -> Pending<()> {
        let timer_id = timer_id.to_string();
        self.submit(move |conn| {
            conn.execute("DELETE FROM timers WHERE timer_id = ?1", params![timer_id])
                .with_context(|| format!("failed to delete timer {timer_id}"))?;
            Ok(())
        })
    }

    pub fn load_timer(&self, timer_id: &str) -> Pending<Option<TimerRecord>> {
        let timer_id = timer_id.to_string();
        self.submit(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMER_COLUMNS} FROM timers WHERE timer_id = ?1"
            ))?;
            let row = stmt
                .query_row(params![timer_id], |row| Ok(row_to_timer(row)))
                .optional()?;
            row.transpose()
        })
    }

    pub fn load_timers(&self) -> Pending<Vec<TimerRecord>> {
        self.submit(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMER_COLUMNS} FROM timers ORDER BY timer_id"
            ))?;
            let mut rows = stmt.query([])?;
            let mut timers = Vec::new();
            while let Some(row) = rows.next()? {
                timers.push(row_to_timer(row)?);
            }
            Ok(timers)
        })
    }
}
