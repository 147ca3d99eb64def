// libs/consultation-cell/src/services/lifecycle.rs
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use realtime_cell::Room;

use crate::error::ConsultationError;
use crate::models::{
    Consultation, ConsultationDetails, ConsultationPatch, ConsultationStatus,
    CreateConsultationRequest, CreateConsultationResponse, EndAction, EndConsultationResponse,
    NewConsultation, Participant, UserProfile, UserRole,
};
use crate::services::authorization::{can_assign, can_create, can_end, can_view};
use crate::services::context::{require_applied, ConsultationContext};
use crate::services::policy::deletion_deadline;

/// Creation, practitioner assignment and termination.
pub struct ConsultationLifecycleService {
    ctx: ConsultationContext,
}

impl ConsultationLifecycleService {
    pub fn new(ctx: &ConsultationContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_consultation(
        &self,
        request: CreateConsultationRequest,
        requester_id: Uuid,
    ) -> Result<CreateConsultationResponse, ConsultationError> {
        let requester = self.ctx.load_user(requester_id, "Requester").await?;
        can_create(&requester, request.patient_id).into_result()?;

        let patient = self
            .ctx
            .load_user_with_role(request.patient_id, "Patient", UserRole::Patient)
            .await?;

        let status = match request.owner_id {
            Some(owner_id) => {
                self.load_practitioner(owner_id).await?;
                self.ensure_patient_lane_free(patient.id, None).await?;
                ConsultationStatus::Scheduled
            }
            None => ConsultationStatus::Draft,
        };

        let new = NewConsultation {
            id: Uuid::new_v4(),
            status,
            owner_id: request.owner_id,
            scheduled_date: request.scheduled_date,
            reminder_enabled: request.reminder_enabled.unwrap_or(true),
            group_id: request.group_id,
            speciality_id: request.speciality_id,
        };
        let booked_patient = Participant {
            consultation_id: new.id,
            user_id: patient.id,
            role: UserRole::Patient,
            is_active: false,
            is_beneficiary: true,
            joined_at: None,
        };

        let consultation = self
            .ctx
            .repository
            .insert_consultation(new, vec![booked_patient])
            .await?;

        info!(
            "Created consultation {} in {} for patient {}",
            consultation.id, consultation.status, patient.id
        );

        self.book_reminders(&consultation).await;

        Ok(CreateConsultationResponse {
            id: consultation.id,
            status: consultation.status,
            owner_id: consultation.owner_id,
            patient_id: patient.id,
            scheduled_date: consultation.scheduled_date,
            group_id: consultation.group_id,
            version: consultation.version,
        })
    }

    #[instrument(skip(self))]
    pub async fn assign_practitioner(
        &self,
        consultation_id: Uuid,
        practitioner_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Consultation, ConsultationError> {
        let admin = self.ctx.load_user(admin_id, "Requester").await?;
        can_assign(&admin).into_result()?;

        let consultation = self.ctx.load_consultation(consultation_id).await?;
        if consultation.status != ConsultationStatus::Draft {
            return Err(ConsultationError::BadRequest(format!(
                "Practitioners can only be assigned to draft consultations (currently {})",
                consultation.status
            )));
        }

        let practitioner = self.load_practitioner(practitioner_id).await?;

        for participant in self.ctx.repository.list_participants(consultation_id).await? {
            if participant.role == UserRole::Patient && participant.is_beneficiary {
                self.ensure_patient_lane_free(participant.user_id, Some(consultation_id))
                    .await?;
            }
        }

        let patch = ConsultationPatch {
            status: Some(ConsultationStatus::Scheduled),
            owner_id: Some(practitioner.id),
            ..Default::default()
        };
        let outcome = self
            .ctx
            .repository
            .conditional_update(consultation_id, consultation.version, patch)
            .await?;
        let updated = require_applied(consultation_id, outcome)?;

        info!(
            "Assigned practitioner {} to consultation {} (version {})",
            practitioner.id, consultation_id, updated.version
        );

        self.book_reminders(&updated).await;
        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "consultation_status",
                json!({
                    "consultation_id": consultation_id,
                    "status": updated.status,
                    "owner_id": practitioner.id,
                }),
            )
            .await;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn end_consultation(
        &self,
        consultation_id: Uuid,
        requester_id: Uuid,
        action: EndAction,
    ) -> Result<EndConsultationResponse, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        let requester = self.ctx.load_user(requester_id, "Requester").await?;
        can_end(&requester, &consultation).into_result()?;

        if !consultation.status.is_open_lane() {
            return Err(ConsultationError::BadRequest(format!(
                "Consultation cannot be ended from {}",
                consultation.status
            )));
        }

        let now = Utc::now();
        let patch = match action {
            EndAction::Close => ConsultationPatch {
                status: Some(ConsultationStatus::Completed),
                closed_at: Some(now),
                deletion_scheduled_at: Some(deletion_deadline(now, self.ctx.retention_hours())),
                deactivate_participants: true,
                ..Default::default()
            },
            EndAction::KeepOpen | EndAction::TerminateOpen => ConsultationPatch {
                status: Some(ConsultationStatus::TerminatedOpen),
                deactivate_participants: true,
                ..Default::default()
            },
        };

        let outcome = self
            .ctx
            .repository
            .conditional_update(consultation_id, consultation.version, patch)
            .await?;
        let ended = require_applied(consultation_id, outcome)?;

        info!(
            "Consultation {} ended with {:?}: {} -> {}",
            consultation_id, action, consultation.status, ended.status
        );

        // every side effect below is independent and non-fatal
        if let Err(e) = self
            .ctx
            .media
            .cleanup_router_for_consultation(consultation_id)
            .await
        {
            warn!("Failed to tear down media for consultation {}: {}", consultation_id, e);
        }

        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "consultation_ended",
                json!({
                    "consultation_id": consultation_id,
                    "status": ended.status,
                    "action": action,
                    "ended_by": requester_id,
                }),
            )
            .await;

        if let Err(e) = self.ctx.reminders.cancel_reminders(consultation_id).await {
            warn!("Failed to cancel reminders for consultation {}: {}", consultation_id, e);
        }

        let closed = ended.status == ConsultationStatus::Completed;
        Ok(EndConsultationResponse {
            success: true,
            message: if closed {
                "Consultation closed".to_string()
            } else {
                "Consultation ended and left open".to_string()
            },
            consultation_id,
            status: ended.status,
            deletion_scheduled_at: ended.deletion_scheduled_at.filter(|_| closed),
            retention_hours: closed.then(|| self.ctx.retention_hours()),
        })
    }

    pub async fn get_consultation(
        &self,
        consultation_id: Uuid,
        requester_id: Uuid,
    ) -> Result<ConsultationDetails, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        let requester = self.ctx.load_user(requester_id, "Requester").await?;
        let membership = self
            .ctx
            .repository
            .find_participant(consultation_id, requester_id)
            .await?;
        can_view(&requester, &consultation, membership.as_ref()).into_result()?;

        let participants = self.ctx.repository.list_participants(consultation_id).await?;
        Ok(ConsultationDetails {
            consultation,
            participants,
        })
    }

    /// Owners must exist and be practitioners; both failures are bad input.
    async fn load_practitioner(&self, id: Uuid) -> Result<UserProfile, ConsultationError> {
        match self.ctx.repository.find_user(id).await? {
            Some(user) if user.has_role(UserRole::Practitioner) => Ok(user),
            Some(_) => Err(ConsultationError::BadRequest(
                "Assigned user is not a practitioner".to_string(),
            )),
            None => Err(ConsultationError::BadRequest(
                "Assigned practitioner does not exist".to_string(),
            )),
        }
    }

    async fn ensure_patient_lane_free(
        &self,
        patient_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<(), ConsultationError> {
        if let Some(existing) = self
            .ctx
            .repository
            .find_open_consultation_for_patient(patient_id, excluding)
            .await?
        {
            warn!(
                "Patient {} already has open consultation {} ({})",
                patient_id, existing.id, existing.status
            );
            return Err(ConsultationError::Conflict(
                "Patient already has an open consultation".to_string(),
            ));
        }
        Ok(())
    }

    async fn book_reminders(&self, consultation: &Consultation) {
        let Some(scheduled_date) = consultation.scheduled_date else {
            return;
        };
        if !consultation.reminder_enabled {
            return;
        }

        match self
            .ctx
            .reminders
            .schedule_reminders(consultation.id, scheduled_date, None)
            .await
        {
            Ok(count) => info!("Booked {} reminders for consultation {}", count, consultation.id),
            Err(e) => warn!(
                "Failed to book reminders for consultation {}: {}",
                consultation.id, e
            ),
        }
    }
}
