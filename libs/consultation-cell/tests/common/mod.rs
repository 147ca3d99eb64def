#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use consultation_cell::models::{
    Consultation, ConsultationPatch, ConsultationStatus, CreateConsultationRequest, Message,
    NewConsultation, Participant, UserProfile, UserRole,
};
use consultation_cell::services::lifecycle::ConsultationLifecycleService;
use consultation_cell::services::reminders::{ReminderError, ReminderScheduler, ReminderType};
use consultation_cell::store::{
    ConsultationRepository, InMemoryConsultationStore, RepositoryError, UpdateOutcome,
};
use consultation_cell::ConsultationContext;
use realtime_cell::{EventBus, EventBusError};
use shared_utils::test_utils::TestConfig;
use video_conferencing_cell::{
    MediaRouter, MediaSessionAdapter, MediaSessionError, RouterProvision, RouterRegistry,
};

// ==============================================================================
// TEST DOUBLES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub room: String,
    pub event: String,
    pub payload: Value,
}

/// Records every publish; can be switched to fail.
#[derive(Default)]
pub struct RecordingEventBus {
    published: Mutex<Vec<PublishedEvent>>,
    failing: AtomicBool,
}

impl RecordingEventBus {
    pub fn failing() -> Self {
        let bus = Self::default();
        bus.failing.store(true, Ordering::SeqCst);
        bus
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn named(&self, event: &str) -> Vec<PublishedEvent> {
        self.events().into_iter().filter(|e| e.event == event).collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, room: &str, event: &str, payload: Value) -> Result<(), EventBusError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventBusError::Unavailable("bus offline".to_string()));
        }
        self.published.lock().unwrap().push(PublishedEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Media provider that is down.
pub struct UnavailableMedia;

#[async_trait]
impl MediaSessionAdapter for UnavailableMedia {
    async fn get_router(&self, _: Uuid) -> Result<Option<MediaRouter>, MediaSessionError> {
        Ok(None)
    }

    async fn create_router_for_consultation(
        &self,
        _: Uuid,
    ) -> Result<RouterProvision, MediaSessionError> {
        Err(MediaSessionError::CloudflareApiError {
            message: "HTTP 503".to_string(),
        })
    }

    async fn cleanup_router_for_consultation(&self, _: Uuid) -> Result<(), MediaSessionError> {
        Err(MediaSessionError::CloudflareApiError {
            message: "HTTP 503".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingReminders {
    pub scheduled: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
    pub cancelled: Mutex<Vec<Uuid>>,
    failing: AtomicBool,
}

impl RecordingReminders {
    pub fn failing() -> Self {
        let reminders = Self::default();
        reminders.failing.store(true, Ordering::SeqCst);
        reminders
    }
}

#[async_trait]
impl ReminderScheduler for RecordingReminders {
    async fn schedule_reminders(
        &self,
        consultation_id: Uuid,
        scheduled_date: DateTime<Utc>,
        _types: Option<&[ReminderType]>,
    ) -> Result<usize, ReminderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReminderError::Storage("reminder table locked".to_string()));
        }
        self.scheduled
            .lock()
            .unwrap()
            .push((consultation_id, scheduled_date));
        Ok(3)
    }

    async fn cancel_reminders(&self, consultation_id: Uuid) -> Result<(), ReminderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReminderError::Storage("reminder table locked".to_string()));
        }
        self.cancelled.lock().unwrap().push(consultation_id);
        Ok(())
    }
}

/// Delegates to the in-memory store. When armed, the next conditional write
/// is preceded by a competing write that bumps the version.
pub struct RacingStore {
    inner: InMemoryConsultationStore,
    armed: AtomicBool,
}

impl RacingStore {
    pub fn new(inner: InMemoryConsultationStore) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }

    pub fn lose_next_write(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsultationRepository for RacingStore {
    async fn find_consultation(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError> {
        self.inner.find_consultation(id).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        self.inner.find_user(id).await
    }

    async fn insert_consultation(
        &self,
        consultation: NewConsultation,
        participants: Vec<Participant>,
    ) -> Result<Consultation, RepositoryError> {
        self.inner.insert_consultation(consultation, participants).await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: ConsultationPatch,
    ) -> Result<UpdateOutcome, RepositoryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.inner
                .conditional_update(id, expected_version, ConsultationPatch::default())
                .await?;
        }
        self.inner.conditional_update(id, expected_version, patch).await
    }

    async fn find_participant(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participant>, RepositoryError> {
        self.inner.find_participant(consultation_id, user_id).await
    }

    async fn upsert_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        self.inner.upsert_participant(participant).await
    }

    async fn list_participants(
        &self,
        consultation_id: Uuid,
    ) -> Result<Vec<Participant>, RepositoryError> {
        self.inner.list_participants(consultation_id).await
    }

    async fn find_active_consultation_for_user(
        &self,
        user_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        self.inner
            .find_active_consultation_for_user(user_id, excluding)
            .await
    }

    async fn find_open_consultation_for_patient(
        &self,
        patient_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Consultation>, RepositoryError> {
        self.inner
            .find_open_consultation_for_patient(patient_id, excluding)
            .await
    }

    async fn list_owned_consultations(
        &self,
        owner_id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        self.inner.list_owned_consultations(owner_id, status).await
    }

    async fn list_messages(&self, consultation_id: Uuid) -> Result<Vec<Message>, RepositoryError> {
        self.inner.list_messages(consultation_id).await
    }

    async fn append_message(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Message, RepositoryError> {
        self.inner
            .append_message(consultation_id, user_id, content)
            .await
    }
}

// ==============================================================================
// HARNESS
// ==============================================================================

pub struct Harness {
    pub store: InMemoryConsultationStore,
    pub racing: Arc<RacingStore>,
    pub media: Arc<dyn MediaSessionAdapter>,
    pub registry: Option<RouterRegistry>,
    pub events: Arc<RecordingEventBus>,
    pub reminders: Arc<RecordingReminders>,
    pub ctx: ConsultationContext,
}

pub struct HarnessBuilder {
    media: Option<Arc<dyn MediaSessionAdapter>>,
    events: RecordingEventBus,
    reminders: RecordingReminders,
    retention_hours: i64,
}

impl HarnessBuilder {
    pub fn with_unavailable_media(mut self) -> Self {
        self.media = Some(Arc::new(UnavailableMedia));
        self
    }

    pub fn with_failing_events(mut self) -> Self {
        self.events = RecordingEventBus::failing();
        self
    }

    pub fn with_failing_reminders(mut self) -> Self {
        self.reminders = RecordingReminders::failing();
        self
    }

    pub fn with_retention_hours(mut self, hours: i64) -> Self {
        self.retention_hours = hours;
        self
    }

    pub fn build(self) -> Harness {
        let config = TestConfig {
            retention_hours: self.retention_hours,
            ..Default::default()
        }
        .to_arc();

        let store = InMemoryConsultationStore::new();
        let racing = Arc::new(RacingStore::new(store.clone()));
        let (media, registry): (Arc<dyn MediaSessionAdapter>, Option<RouterRegistry>) =
            match self.media {
                Some(media) => (media, None),
                None => {
                    let registry = RouterRegistry::local();
                    (Arc::new(registry.clone()), Some(registry))
                }
            };
        let events = Arc::new(self.events);
        let reminders = Arc::new(self.reminders);

        let ctx = ConsultationContext::new(
            config,
            racing.clone(),
            media.clone(),
            events.clone(),
            reminders.clone(),
        );

        Harness {
            store,
            racing,
            media,
            registry,
            events,
            reminders,
            ctx,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            media: None,
            events: RecordingEventBus::default(),
            reminders: RecordingReminders::default(),
            retention_hours: 24,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn user(&self, role: UserRole, first: &str, last: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_user(UserProfile {
                id,
                role,
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
                country: Some("FR".to_string()),
            })
            .await;
        id
    }

    pub async fn patient(&self) -> Uuid {
        self.user(UserRole::Patient, "Ada", "Lovelace").await
    }

    pub async fn practitioner(&self) -> Uuid {
        self.user(UserRole::Practitioner, "Grace", "Hopper").await
    }

    pub async fn admin(&self) -> Uuid {
        self.user(UserRole::Admin, "Alan", "Turing").await
    }

    /// Books a SCHEDULED consultation created by the practitioner.
    pub async fn scheduled(
        &self,
        patient_id: Uuid,
        practitioner_id: Uuid,
        scheduled_date: Option<DateTime<Utc>>,
    ) -> Uuid {
        let created = ConsultationLifecycleService::new(&self.ctx)
            .create_consultation(
                CreateConsultationRequest {
                    patient_id,
                    owner_id: Some(practitioner_id),
                    scheduled_date,
                    group_id: None,
                    speciality_id: None,
                    reminder_enabled: None,
                },
                practitioner_id,
            )
            .await
            .unwrap();
        assert_eq!(created.status, ConsultationStatus::Scheduled);
        created.id
    }
}
