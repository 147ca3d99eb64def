// libs/consultation-cell/src/services/admission.rs
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use realtime_cell::Room;
use video_conferencing_cell::RouterProvision;

use crate::error::ConsultationError;
use crate::models::{
    AdmitPatientResponse, Consultation, ConsultationPatch, ConsultationStatus,
    JoinConsultationResponse, Participant, UserRole,
};
use crate::services::authorization::{can_admit, can_join_as_practitioner};
use crate::services::context::{require_applied, ConsultationContext};

/// Join, admit and leave. Every state change is guarded on the version read
/// at the start of the call.
pub struct AdmissionService {
    ctx: ConsultationContext,
}

impl AdmissionService {
    pub fn new(ctx: &ConsultationContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    #[instrument(skip(self))]
    pub async fn join_as_patient(
        &self,
        consultation_id: Uuid,
        patient_id: Uuid,
    ) -> Result<JoinConsultationResponse, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        ensure_joinable(&consultation)?;

        self.ctx
            .load_user_with_role(patient_id, "Patient", UserRole::Patient)
            .await?;

        let participant = self
            .ctx
            .repository
            .find_participant(consultation_id, patient_id)
            .await?
            .ok_or_else(|| {
                ConsultationError::Forbidden(
                    "Patient is not registered for this consultation".to_string(),
                )
            })?;

        if let Some(other) = self
            .ctx
            .repository
            .find_active_consultation_for_user(patient_id, Some(consultation_id))
            .await?
        {
            warn!(
                "Patient {} tried to join {} while active on {}",
                patient_id, consultation_id, other.id
            );
            return Err(ConsultationError::Conflict(
                "Patient is already active in another consultation".to_string(),
            ));
        }

        // SCHEDULED -> WAITING is one-way; any later status is left alone
        let current = if consultation.status == ConsultationStatus::Scheduled {
            let outcome = self
                .ctx
                .repository
                .conditional_update(
                    consultation_id,
                    consultation.version,
                    ConsultationPatch::status(ConsultationStatus::Waiting),
                )
                .await?;
            let waiting = require_applied(consultation_id, outcome)?;
            info!("Consultation {} moved to WAITING", consultation_id);
            waiting
        } else {
            consultation
        };

        self.ctx
            .repository
            .upsert_participant(Participant {
                is_active: true,
                joined_at: Some(Utc::now()),
                ..participant
            })
            .await?;

        let provision = self.ctx.ensure_media_session(consultation_id).await?;

        if let Some(owner_id) = current.owner_id {
            self.ctx
                .notify(
                    Room::Practitioner(owner_id),
                    "patient_waiting",
                    json!({
                        "consultation_id": consultation_id,
                        "patient_id": patient_id,
                        "status": current.status,
                    }),
                )
                .await;
        }
        self.ctx.announce_media_session(&provision).await;

        self.join_response(&current, &provision, "Joined consultation", None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn join_as_practitioner(
        &self,
        consultation_id: Uuid,
        practitioner_id: Uuid,
    ) -> Result<JoinConsultationResponse, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        let practitioner = self.ctx.load_user(practitioner_id, "Practitioner").await?;
        can_join_as_practitioner(&practitioner, &consultation).into_result()?;
        ensure_joinable(&consultation)?;

        let existing = self
            .ctx
            .repository
            .find_participant(consultation_id, practitioner_id)
            .await?;
        self.ctx
            .repository
            .upsert_participant(Participant {
                consultation_id,
                user_id: practitioner_id,
                role: existing.as_ref().map(|p| p.role).unwrap_or(UserRole::Practitioner),
                is_active: true,
                is_beneficiary: existing.map(|p| p.is_beneficiary).unwrap_or(false),
                joined_at: Some(Utc::now()),
            })
            .await?;

        let current = if consultation.status == ConsultationStatus::Active {
            consultation
        } else {
            if !consultation.status.can_transition_to(ConsultationStatus::Active) {
                return Err(ConsultationError::BadRequest(format!(
                    "Consultation cannot be started from {}",
                    consultation.status
                )));
            }
            let outcome = self
                .ctx
                .repository
                .conditional_update(
                    consultation_id,
                    consultation.version,
                    activation_patch(&consultation),
                )
                .await?;
            let active = require_applied(consultation_id, outcome)?;
            info!(
                "Practitioner {} started consultation {} ({} -> ACTIVE)",
                practitioner_id, consultation_id, consultation.status
            );
            active
        };

        let provision = self.ctx.ensure_media_session(consultation_id).await?;
        self.ctx.announce_media_session(&provision).await;
        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "practitioner_joined",
                json!({
                    "consultation_id": consultation_id,
                    "practitioner_id": practitioner_id,
                }),
            )
            .await;

        let session_url = self.ctx.config.session_url(&consultation_id.to_string());
        self.join_response(
            &current,
            &provision,
            "Joined consultation as practitioner",
            Some(session_url),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn admit_patient(
        &self,
        consultation_id: Uuid,
        requester_id: Uuid,
    ) -> Result<AdmitPatientResponse, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        let requester = self.ctx.load_user(requester_id, "Requester").await?;
        can_admit(&requester, &consultation).into_result()?;

        if consultation.status != ConsultationStatus::Waiting {
            return Err(ConsultationError::BadRequest(
                "Consultation is not in waiting state".to_string(),
            ));
        }

        let outcome = self
            .ctx
            .repository
            .conditional_update(
                consultation_id,
                consultation.version,
                activation_patch(&consultation),
            )
            .await
            .map_err(|e| {
                error!("Admitting patient into {} failed: {}", consultation_id, e);
                ConsultationError::Internal("Failed to admit patient".to_string())
            })?;

        let admitted = require_applied(consultation_id, outcome)?;

        info!(
            "Admitted patient into consultation {} (version {} -> {})",
            consultation_id, consultation.version, admitted.version
        );

        let provision = self.ctx.ensure_media_session(consultation_id).await?;

        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "consultation_status",
                json!({
                    "consultation_id": consultation_id,
                    "status": ConsultationStatus::Active,
                    "admitted_by": requester_id,
                }),
            )
            .await;
        self.ctx.announce_media_session(&provision).await;

        Ok(AdmitPatientResponse {
            success: true,
            status_code: 200,
            message: "Patient admitted".to_string(),
            consultation_id,
        })
    }

    /// Disconnects a participant. Status and version are untouched.
    #[instrument(skip(self))]
    pub async fn leave(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Participant, ConsultationError> {
        self.ctx.load_consultation(consultation_id).await?;

        let participant = self
            .ctx
            .repository
            .find_participant(consultation_id, user_id)
            .await?
            .ok_or_else(|| {
                ConsultationError::Forbidden("Not a participant of this consultation".to_string())
            })?;

        let left = Participant {
            is_active: false,
            ..participant
        };
        self.ctx.repository.upsert_participant(left.clone()).await?;

        info!("User {} left consultation {}", user_id, consultation_id);
        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "participant_left",
                json!({
                    "consultation_id": consultation_id,
                    "user_id": user_id,
                    "role": left.role,
                }),
            )
            .await;

        Ok(left)
    }

    async fn join_response(
        &self,
        consultation: &Consultation,
        provision: &RouterProvision,
        message: &str,
        session_url: Option<String>,
    ) -> Result<JoinConsultationResponse, ConsultationError> {
        let participants = self.ctx.repository.list_participants(consultation.id).await?;
        let messages = self.ctx.repository.list_messages(consultation.id).await?;

        Ok(JoinConsultationResponse {
            success: true,
            status_code: 200,
            message: message.to_string(),
            consultation_id: consultation.id,
            status: consultation.status,
            participants,
            messages,
            media_session: ConsultationContext::media_view(provision),
            session_url,
        })
    }
}

fn ensure_joinable(consultation: &Consultation) -> Result<(), ConsultationError> {
    if consultation.status.is_closed() {
        return Err(ConsultationError::BadRequest(format!(
            "Consultation is {} and can no longer be joined",
            consultation.status
        )));
    }
    Ok(())
}

fn activation_patch(consultation: &Consultation) -> ConsultationPatch {
    ConsultationPatch {
        status: Some(ConsultationStatus::Active),
        started_at: consultation.started_at.is_none().then(Utc::now),
        ..Default::default()
    }
}
