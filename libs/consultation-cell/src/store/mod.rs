//! Persistence seam for consultations, participants and messages.
//!
//! All state changes to a consultation row go through
//! [`ConsultationRepository::conditional_update`], a compare-and-swap on
//! `version`. Participant and message writes are per-row upserts keyed by
//! their natural identity.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Consultation, ConsultationPatch, ConsultationStatus, Message, NewConsultation, Participant,
    UserProfile,
};

pub use memory::InMemoryConsultationStore;
pub use supabase::SupabaseConsultationStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

/// Result of a version-guarded write.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The patch was applied; carries the row as written.
    Applied(Consultation),
    NotFound,
    /// Another writer got there first.
    VersionConflict { actual: i64 },
}

#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn find_consultation(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError>;

    /// Inserts the consultation at version 1 together with its initial participants.
    async fn insert_consultation(
        &self,
        consultation: NewConsultation,
        participants: Vec<Participant>,
    ) -> Result<Consultation, RepositoryError>;

    /// Applies `patch` only if the stored version equals `expected_version`,
    /// bumping the version by one. When `patch.deactivate_participants` is set
    /// every participant is deactivated in the same write.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: ConsultationPatch,
    ) -> Result<UpdateOutcome, RepositoryError>;

    async fn find_participant(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, RepositoryError>;

    async fn upsert_participant(&self, participant: Participant) -> Result<(), RepositoryError>;

    async fn list_participants(
        &self,
        consultation_id: Uuid,
    ) -> Result<Vec<Participant>, RepositoryError>;

    /// A consultation in SCHEDULED, WAITING or ACTIVE on which `user_id` is an
    /// active participant, other than `excluding`.
    async fn find_active_consultation_for_user(
        &self,
        user_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError>;

    /// A consultation in SCHEDULED, WAITING or ACTIVE booked for `patient_id`,
    /// connected or not, other than `excluding`.
    async fn find_open_consultation_for_patient(
        &self,
        patient_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError>;

    async fn list_owned_consultations(
        &self,
        owner_id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Vec<Consultation>, RepositoryError>;

    /// Messages ordered by id.
    async fn list_messages(&self, consultation_id: Uuid) -> Result<Vec<Message>, RepositoryError>;

    async fn append_message(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Message, RepositoryError>;
}
