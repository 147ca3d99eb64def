// libs/consultation-cell/src/services/context.rs
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use realtime_cell::{EventBus, Room};
use shared_config::AppConfig;
use video_conferencing_cell::{MediaSessionAdapter, RouterProvision};

use crate::error::ConsultationError;
use crate::models::{Consultation, MediaSessionView, UserProfile, UserRole};
use crate::services::reminders::ReminderScheduler;
use crate::store::ConsultationRepository;

/// Collaborators shared by every engine. Cheap to clone.
#[derive(Clone)]
pub struct ConsultationContext {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn ConsultationRepository>,
    pub media: Arc<dyn MediaSessionAdapter>,
    pub events: Arc<dyn EventBus>,
    pub reminders: Arc<dyn ReminderScheduler>,
}

impl ConsultationContext {
    pub fn new(
        config: Arc<AppConfig>,
        repository: Arc<dyn ConsultationRepository>,
        media: Arc<dyn MediaSessionAdapter>,
        events: Arc<dyn EventBus>,
        reminders: Arc<dyn ReminderScheduler>,
    ) -> Self {
        Self {
            config,
            repository,
            media,
            events,
            reminders,
        }
    }

    pub fn retention_hours(&self) -> i64 {
        self.config.consultation_retention_hours
    }

    pub async fn load_consultation(&self, id: Uuid) -> Result<Consultation, ConsultationError> {
        self.repository
            .find_consultation(id)
            .await?
            .ok_or_else(ConsultationError::consultation_not_found)
    }

    /// `what` names the user in the NotFound message.
    pub async fn load_user(&self, id: Uuid, what: &str) -> Result<UserProfile, ConsultationError> {
        self.repository
            .find_user(id)
            .await?
            .ok_or_else(|| ConsultationError::user_not_found(what))
    }

    pub async fn load_user_with_role(
        &self,
        id: Uuid,
        what: &str,
        role: UserRole,
    ) -> Result<UserProfile, ConsultationError> {
        let user = self.load_user(id, what).await?;
        if !user.has_role(role) {
            return Err(ConsultationError::BadRequest(format!(
                "{} does not have the {:?} role",
                what, role
            )));
        }
        Ok(user)
    }

    /// Publishes without ever failing the caller.
    pub async fn notify(&self, room: Room, event: &str, payload: Value) {
        let room_name = room.to_string();
        match self.events.publish(&room_name, event, payload).await {
            Ok(()) => debug!("Notified {} with {}", room_name, event),
            Err(e) => warn!("Failed to publish {} to {}: {}", event, room_name, e),
        }
    }

    /// Get-or-create the consultation's media router. This sits on the
    /// critical path of join and admit.
    pub async fn ensure_media_session(
        &self,
        consultation_id: Uuid,
    ) -> Result<RouterProvision, ConsultationError> {
        self.media.ensure_router(consultation_id).await.map_err(|e| {
            error!("Media session for consultation {} unavailable: {}", consultation_id, e);
            ConsultationError::Internal("Failed to start media session".to_string())
        })
    }

    /// Announces a router only to the caller that created it.
    pub async fn announce_media_session(&self, provision: &RouterProvision) {
        if !provision.created {
            return;
        }
        let consultation_id = provision.router.consultation_id;
        self.notify(
            Room::Consultation(consultation_id),
            "media_session_live",
            serde_json::json!({
                "consultation_id": consultation_id,
                "router_id": provision.router.id,
            }),
        )
        .await;
    }

    pub fn media_view(provision: &RouterProvision) -> MediaSessionView {
        MediaSessionView {
            id: provision.router.id.clone(),
            active: true,
        }
    }
}

/// Unwraps a version-guarded write. A lost race is reported, never retried.
pub fn require_applied(
    consultation_id: Uuid,
    outcome: crate::store::UpdateOutcome,
) -> Result<Consultation, ConsultationError> {
    use crate::store::UpdateOutcome;

    match outcome {
        UpdateOutcome::Applied(consultation) => Ok(consultation),
        UpdateOutcome::VersionConflict { actual } => {
            warn!(
                "Consultation {} changed concurrently (now at version {})",
                consultation_id, actual
            );
            Err(ConsultationError::stale_state())
        }
        UpdateOutcome::NotFound => Err(ConsultationError::consultation_not_found()),
    }
}
