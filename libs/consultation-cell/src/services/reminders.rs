// libs/consultation-cell/src/services/reminders.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::SupabaseClient;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderType {
    DayBefore,
    HourBefore,
    FifteenMinutesBefore,
}

impl ReminderType {
    pub const ALL: [ReminderType; 3] = [
        ReminderType::DayBefore,
        ReminderType::HourBefore,
        ReminderType::FifteenMinutesBefore,
    ];

    pub fn lead_time(&self) -> Duration {
        match self {
            ReminderType::DayBefore => Duration::hours(24),
            ReminderType::HourBefore => Duration::hours(1),
            ReminderType::FifteenMinutesBefore => Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledReminder {
    pub consultation_id: Uuid,
    pub reminder_type: ReminderType,
    pub send_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Reminder storage error: {0}")]
    Storage(String),
}

/// Reminder delivery lives elsewhere; the core only books and cancels them.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Books reminders ahead of `scheduled_date`. `None` books every type.
    /// Returns how many were booked.
    async fn schedule_reminders(
        &self,
        consultation_id: Uuid,
        scheduled_date: DateTime<Utc>,
        types: Option<&[ReminderType]>,
    ) -> Result<usize, ReminderError>;

    async fn cancel_reminders(&self, consultation_id: Uuid) -> Result<(), ReminderError>;
}

/// Reminders whose send time is still ahead of `now`.
pub fn plan_reminders(
    consultation_id: Uuid,
    scheduled_date: DateTime<Utc>,
    types: Option<&[ReminderType]>,
    now: DateTime<Utc>,
) -> Vec<ScheduledReminder> {
    types
        .unwrap_or(&ReminderType::ALL[..])
        .iter()
        .filter_map(|reminder_type| {
            // dates at the edge of the calendar have no representable send time
            let send_at = scheduled_date.checked_sub_signed(reminder_type.lead_time())?;
            Some(ScheduledReminder {
                consultation_id,
                reminder_type: *reminder_type,
                send_at,
            })
        })
        .filter(|reminder| reminder.send_at > now)
        .collect()
}

pub struct SupabaseReminderScheduler {
    client: SupabaseClient,
}

impl SupabaseReminderScheduler {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReminderScheduler for SupabaseReminderScheduler {
    async fn schedule_reminders(
        &self,
        consultation_id: Uuid,
        scheduled_date: DateTime<Utc>,
        types: Option<&[ReminderType]>,
    ) -> Result<usize, ReminderError> {
        let planned = plan_reminders(consultation_id, scheduled_date, types, Utc::now());
        if planned.is_empty() {
            debug!("No reminders left to book for consultation {}", consultation_id);
            return Ok(0);
        }

        let rows: Vec<Value> = planned
            .iter()
            .map(|r| {
                json!({
                    "consultation_id": r.consultation_id,
                    "reminder_type": r.reminder_type,
                    "send_at": r.send_at,
                    "status": "PENDING",
                })
            })
            .collect();

        let _: Vec<Value> = self
            .client
            .upsert("consultation_reminders", "consultation_id,reminder_type", Value::Array(rows))
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        info!("Booked {} reminders for consultation {}", planned.len(), consultation_id);
        Ok(planned.len())
    }

    async fn cancel_reminders(&self, consultation_id: Uuid) -> Result<(), ReminderError> {
        let path = format!(
            "/rest/v1/consultation_reminders?consultation_id=eq.{}&status=eq.PENDING",
            consultation_id
        );
        let cancelled: Vec<Value> = self
            .client
            .request(reqwest::Method::PATCH, &path, Some(json!({"status": "CANCELLED"})))
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        info!("Cancelled {} reminders for consultation {}", cancelled.len(), consultation_id);
        Ok(())
    }
}

/// Keeps booked reminders in memory; used when Supabase is not configured.
#[derive(Clone, Default)]
pub struct InMemoryReminderScheduler {
    pending: Arc<RwLock<HashMap<Uuid, Vec<ScheduledReminder>>>>,
}

impl InMemoryReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_for(&self, consultation_id: Uuid) -> Vec<ScheduledReminder> {
        self.pending
            .read()
            .await
            .get(&consultation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReminderScheduler for InMemoryReminderScheduler {
    async fn schedule_reminders(
        &self,
        consultation_id: Uuid,
        scheduled_date: DateTime<Utc>,
        types: Option<&[ReminderType]>,
    ) -> Result<usize, ReminderError> {
        let planned = plan_reminders(consultation_id, scheduled_date, types, Utc::now());
        let count = planned.len();
        self.pending.write().await.insert(consultation_id, planned);
        Ok(count)
    }

    async fn cancel_reminders(&self, consultation_id: Uuid) -> Result<(), ReminderError> {
        self.pending.write().await.remove(&consultation_id);
        Ok(())
    }
}
