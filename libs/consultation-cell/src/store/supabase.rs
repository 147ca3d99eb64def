// libs/consultation-cell/src/store/supabase.rs
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use super::{ConsultationRepository, RepositoryError, UpdateOutcome};
use crate::models::{
    Consultation, ConsultationPatch, ConsultationStatus, Message, NewConsultation, Participant,
    UserProfile,
};

const OPEN_LANE_FILTER: &str = "status=in.(SCHEDULED,WAITING,ACTIVE)";

/// PostgREST-backed repository. The conditional write is the
/// `cas_update_consultation` database function.
#[derive(Clone)]
pub struct SupabaseConsultationStore {
    client: SupabaseClient,
}

impl SupabaseConsultationStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn get_rows<T>(&self, path: &str) -> Result<Vec<T>, RepositoryError>
    where
        T: DeserializeOwned,
    {
        self.client
            .request::<Vec<T>>(Method::GET, path, None)
            .await
            .map_err(backend_error)
    }

    async fn first_row<T>(&self, path: &str) -> Result<Option<T>, RepositoryError>
    where
        T: DeserializeOwned,
    {
        Ok(self.get_rows(path).await?.into_iter().next())
    }

    async fn open_consultation_among(
        &self,
        participant_path: &str,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        let rows: Vec<Participant> = self.get_rows(participant_path).await?;

        let ids: Vec<String> = rows
            .iter()
            .map(|p| p.consultation_id)
            .filter(|id| Some(*id) != excluding)
            .map(|id| id.to_string())
            .collect();

        if ids.is_empty() {
            return Ok(None);
        }

        let path = format!(
            "/rest/v1/consultations?id=in.({})&{}&limit=1",
            ids.join(","),
            OPEN_LANE_FILTER
        );
        self.first_row(&path).await
    }
}

fn backend_error(err: anyhow::Error) -> RepositoryError {
    let message = err.to_string();
    if message.starts_with("Conflict") {
        RepositoryError::Duplicate(message)
    } else {
        RepositoryError::Backend(message)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait]
impl ConsultationRepository for SupabaseConsultationStore {
    async fn find_consultation(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError> {
        self.first_row(&format!("/rest/v1/consultations?id=eq.{}&select=*", id))
            .await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        self.first_row(&format!(
            "/rest/v1/profiles?id=eq.{}&select=id,role,first_name,last_name,country",
            id
        ))
        .await
    }

    async fn insert_consultation(
        &self,
        new: NewConsultation,
        participants: Vec<Participant>,
    ) -> Result<Consultation, RepositoryError> {
        let body = json!({
            "id": new.id,
            "status": new.status,
            "owner_id": new.owner_id,
            "version": 1,
            "scheduled_date": new.scheduled_date,
            "reminder_enabled": new.reminder_enabled,
            "group_id": new.group_id,
            "speciality_id": new.speciality_id,
        });

        let rows: Vec<Consultation> = self
            .client
            .request(Method::POST, "/rest/v1/consultations", Some(body))
            .await
            .map_err(backend_error)?;

        let consultation = rows
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Decode("insert returned no row".to_string()))?;

        if !participants.is_empty() {
            let _: Vec<Value> = self
                .client
                .upsert(
                    "consultation_participants",
                    "consultation_id,user_id",
                    encode(&participants)?,
                )
                .await
                .map_err(backend_error)?;
        }

        debug!("Inserted consultation {} at version {}", consultation.id, consultation.version);
        Ok(consultation)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: ConsultationPatch,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let args = json!({
            "p_id": id,
            "p_expected_version": expected_version,
            "p_patch": encode(&patch)?,
            "p_deactivate_participants": patch.deactivate_participants,
        });

        let rows: Vec<Consultation> = self
            .client
            .rpc("cas_update_consultation", args)
            .await
            .map_err(backend_error)?;

        if let Some(updated) = rows.into_iter().next() {
            return Ok(UpdateOutcome::Applied(updated));
        }

        // no row back: either the id is unknown or the guard failed
        match self.find_consultation(id).await? {
            None => Ok(UpdateOutcome::NotFound),
            Some(current) => {
                warn!(
                    "Conditional update on consultation {} lost: expected version {}, found {}",
                    id, expected_version, current.version
                );
                Ok(UpdateOutcome::VersionConflict {
                    actual: current.version,
                })
            }
        }
    }

    async fn find_participant(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, RepositoryError> {
        self.first_row(&format!(
            "/rest/v1/consultation_participants?consultation_id=eq.{}&user_id=eq.{}",
            consultation_id, user_id
        ))
        .await
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        let _: Vec<Value> = self
            .client
            .upsert(
                "consultation_participants",
                "consultation_id,user_id",
                encode(&participant)?,
            )
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list_participants(
        &self,
        consultation_id: Uuid,
    ) -> Result<Vec<Participant>, RepositoryError> {
        self.get_rows(&format!(
            "/rest/v1/consultation_participants?consultation_id=eq.{}&order=joined_at.asc.nullsfirst",
            consultation_id
        ))
        .await
    }

    async fn find_active_consultation_for_user(
        &self,
        user_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        let path = format!(
            "/rest/v1/consultation_participants?user_id=eq.{}&is_active=eq.true",
            user_id
        );
        self.open_consultation_among(&path, excluding).await
    }

    async fn find_open_consultation_for_patient(
        &self,
        patient_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        let path = format!(
            "/rest/v1/consultation_participants?user_id=eq.{}&role=eq.PATIENT",
            patient_id
        );
        self.open_consultation_among(&path, excluding).await
    }

    async fn list_owned_consultations(
        &self,
        owner_id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        self.get_rows(&format!(
            "/rest/v1/consultations?owner_id=eq.{}&status=eq.{}",
            owner_id, status
        ))
        .await
    }

    async fn list_messages(&self, consultation_id: Uuid) -> Result<Vec<Message>, RepositoryError> {
        self.get_rows(&format!(
            "/rest/v1/consultation_messages?consultation_id=eq.{}&order=id.asc",
            consultation_id
        ))
        .await
    }

    async fn append_message(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Message, RepositoryError> {
        let body = json!({
            "consultation_id": consultation_id,
            "user_id": user_id,
            "content": content,
        });

        let rows: Vec<Message> = self
            .client
            .request(Method::POST, "/rest/v1/consultation_messages", Some(body))
            .await
            .map_err(backend_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Decode("insert returned no row".to_string()))
    }
}
