//! Message protocol
//!
//! Every inbound message is a JSON object `{ "type": ..., "data": ... }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state::TimerSnapshot;

pub const START_TIMER: &str = "START_TIMER";
pub const PAUSE_TIMER: &str = "PAUSE_TIMER";
pub const STOP_TIMER: &str = "STOP_TIMER";
pub const GET_TIMER_STATE: &str = "GET_TIMER_STATE";
pub const SYNC_STUDY_SESSION: &str = "SYNC_STUDY_SESSION";
pub const TIMER_STATE: &str = "TIMER_STATE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimer {
    pub timer_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub accumulated_time: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseTimer {
    pub timer_id: String,
    #[serde(default)]
    pub accumulated_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRef {
    pub timer_id: String,
}

/// A decoded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartTimer(StartTimer),
    PauseTimer(PauseTimer),
    StopTimer(TimerRef),
    GetTimerState(TimerRef),
    SyncStudySession(Value),
}

impl Command {
    /// Protocol name of this command
    pub fn kind(&self) -> &'static str {
        match self {
            Command::StartTimer(_) => START_TIMER,
            Command::PauseTimer(_) => PAUSE_TIMER,
            Command::StopTimer(_) => STOP_TIMER,
            Command::GetTimerState(_) => GET_TIMER_STATE,
            Command::SyncStudySession(_) => SYNC_STUDY_SESSION,
        }
    }

    /// Whether the sender expects a reply message
    pub fn expects_reply(&self) -> bool {
        matches!(self, Command::GetTimerState(_))
    }
}

/// Why a message could not be turned into a command
#[derive(Error, Debug)]
pub enum MessageError {
    /// Not an object with a string `type`
    #[error("message must be an object with a string type")]
    Malformed,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: serde::de::DeserializeOwned>(kind: &'static str, data: Value) -> Result<T, MessageError> {
    serde_json::from_value(data).map_err(|source| MessageError::InvalidPayload { kind, source })
}

/// Decode one inbound message
pub fn parse_message(message: Value) -> Result<Command, MessageError> {
    let Envelope { kind, data } =
        serde_json::from_value(message).map_err(|_| MessageError::Malformed)?;

    match kind.as_str() {
        START_TIMER => payload(START_TIMER, data).map(Command::StartTimer),
        PAUSE_TIMER => payload(PAUSE_TIMER, data).map(Command::PauseTimer),
        STOP_TIMER => payload(STOP_TIMER, data).map(Command::StopTimer),
        GET_TIMER_STATE => payload(GET_TIMER_STATE, data).map(Command::GetTimerState),
        SYNC_STUDY_SESSION => Ok(Command::SyncStudySession(data)),
        _ => Err(MessageError::UnknownType(kind)),
    }
}

/// Reply to `GET_TIMER_STATE`; `data` is null when the timer is unknown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStateReply {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<TimerSnapshot>,
}

impl TimerStateReply {
    pub fn new(data: Option<TimerSnapshot>) -> Self {
        Self {
            kind: TIMER_STATE.to_string(),
            data,
        }
    }
}
