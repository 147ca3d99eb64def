use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort room publisher.
///
/// Callers treat every error as non-fatal: a notification outage must never
/// fail the operation that produced the event.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, room: &str, event: &str, payload: Value) -> Result<(), EventBusError>;
}

/// Envelope delivered to room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Practitioner(Uuid),
    Consultation(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Practitioner(id) => write!(f, "practitioner:{}", id),
            Room::Consultation(id) => write!(f, "consultation:{}", id),
        }
    }
}

impl FromStr for Room {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid room name: {}", s))?;
        let id = Uuid::parse_str(id).map_err(|_| format!("Invalid room id: {}", id))?;

        match kind {
            "practitioner" => Ok(Room::Practitioner(id)),
            "consultation" => Ok(Room::Consultation(id)),
            _ => Err(format!("Unknown room kind: {}", kind)),
        }
    }
}
