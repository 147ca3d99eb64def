//! In-process store used when Supabase is not configured, and by the tests.
//!
//! Every table lives behind one lock so a conditional write and the
//! participant deactivation it requests are observed together.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ConsultationRepository, RepositoryError, UpdateOutcome};
use crate::models::{
    Consultation, ConsultationPatch, ConsultationStatus, Message, NewConsultation, Participant,
    UserProfile, UserRole,
};

#[derive(Default)]
struct Tables {
    consultations: HashMap<Uuid, Consultation>,
    participants: HashMap<(Uuid, Uuid), Participant>,
    messages: Vec<Message>,
    users: HashMap<Uuid, UserProfile>,
    next_message_id: i64,
}

impl Tables {
    fn participants_of(&self, consultation_id: Uuid) -> impl Iterator<Item = &Participant> {
        self.participants
            .values()
            .filter(move |p| p.consultation_id == consultation_id)
    }

    fn open_consultation_where<F>(&self, excluding: Option<Uuid>, predicate: F) -> Option<Consultation>
    where
        F: Fn(&Participant) -> bool,
    {
        self.participants
            .values()
            .filter(|p| Some(p.consultation_id) != excluding && predicate(*p))
            .filter_map(|p| self.consultations.get(&p.consultation_id))
            .find(|c| c.status.is_open_lane())
            .cloned()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryConsultationStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile. Profiles are owned by the identity service in
    /// production; here they have to be seeded.
    pub async fn insert_user(&self, profile: UserProfile) {
        self.tables.write().await.users.insert(profile.id, profile);
    }

    pub async fn consultation_count(&self) -> usize {
        self.tables.read().await.consultations.len()
    }
}

#[async_trait]
impl ConsultationRepository for InMemoryConsultationStore {
    async fn find_consultation(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError> {
        Ok(self.tables.read().await.consultations.get(&id).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_consultation(
        &self,
        new: NewConsultation,
        participants: Vec<Participant>,
    ) -> Result<Consultation, RepositoryError> {
        let mut tables = self.tables.write().await;

        if tables.consultations.contains_key(&new.id) {
            return Err(RepositoryError::Duplicate(format!("consultation {}", new.id)));
        }

        let now = Utc::now();
        let consultation = Consultation {
            id: new.id,
            status: new.status,
            owner_id: new.owner_id,
            version: 1,
            scheduled_date: new.scheduled_date,
            started_at: None,
            closed_at: None,
            deletion_scheduled_at: None,
            reminder_enabled: new.reminder_enabled,
            group_id: new.group_id,
            speciality_id: new.speciality_id,
            created_at: now,
            updated_at: now,
        };

        tables.consultations.insert(consultation.id, consultation.clone());
        for participant in participants {
            tables
                .participants
                .insert((participant.consultation_id, participant.user_id), participant);
        }

        Ok(consultation)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: ConsultationPatch,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let mut tables = self.tables.write().await;

        let Some(consultation) = tables.consultations.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if consultation.version != expected_version {
            debug!(
                "Version conflict on consultation {}: expected {}, found {}",
                id, expected_version, consultation.version
            );
            return Ok(UpdateOutcome::VersionConflict {
                actual: consultation.version,
            });
        }

        patch.apply(consultation);
        consultation.version += 1;
        consultation.updated_at = Utc::now();
        let updated = consultation.clone();

        if patch.deactivate_participants {
            for participant in tables.participants.values_mut() {
                if participant.consultation_id == id {
                    participant.is_active = false;
                }
            }
        }

        Ok(UpdateOutcome::Applied(updated))
    }

    async fn find_participant(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .participants
            .get(&(consultation_id, user_id))
            .cloned())
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .participants
            .insert((participant.consultation_id, participant.user_id), participant);
        Ok(())
    }

    async fn list_participants(
        &self,
        consultation_id: Uuid,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut participants: Vec<Participant> =
            tables.participants_of(consultation_id).cloned().collect();
        participants.sort_by_key(|p| (p.joined_at, p.user_id));
        Ok(participants)
    }

    async fn find_active_consultation_for_user(
        &self,
        user_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.open_consultation_where(excluding, |p| p.user_id == user_id && p.is_active))
    }

    async fn find_open_consultation_for_patient(
        &self,
        patient_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.open_consultation_where(excluding, |p| {
            p.user_id == patient_id && p.role == UserRole::Patient
        }))
    }

    async fn list_owned_consultations(
        &self,
        owner_id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .consultations
            .values()
            .filter(|c| c.owner_id == Some(owner_id) && c.status == status)
            .cloned()
            .collect())
    }

    async fn list_messages(&self, consultation_id: Uuid) -> Result<Vec<Message>, RepositoryError> {
        // ids are handed out in insertion order
        Ok(self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.consultation_id == consultation_id)
            .cloned()
            .collect())
    }

    async fn append_message(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Message, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.next_message_id += 1;

        let message = Message {
            id: tables.next_message_id,
            consultation_id,
            user_id,
            content,
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }
}
