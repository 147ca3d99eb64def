mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use uuid::Uuid;

use common::Harness;
use consultation_cell::models::{
    ConsultationStatus, CreateConsultationRequest, EndAction, UserRole,
};
use consultation_cell::services::admission::AdmissionService;
use consultation_cell::services::lifecycle::ConsultationLifecycleService;
use consultation_cell::store::ConsultationRepository;
use consultation_cell::ConsultationError;
use video_conferencing_cell::MediaSessionAdapter;

fn request(patient_id: Uuid, owner_id: Option<Uuid>) -> CreateConsultationRequest {
    CreateConsultationRequest {
        patient_id,
        owner_id,
        scheduled_date: Some(Utc::now() + Duration::days(2)),
        group_id: None,
        speciality_id: None,
        reminder_enabled: None,
    }
}

#[tokio::test]
async fn test_create_with_owner_is_scheduled_at_version_one() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;

    let created = ConsultationLifecycleService::new(&h.ctx)
        .create_consultation(request(patient, Some(practitioner)), practitioner)
        .await
        .unwrap();

    assert_eq!(created.status, ConsultationStatus::Scheduled);
    assert_eq!(created.version, 1);
    assert_eq!(created.owner_id, Some(practitioner));

    let participants = h.store.list_participants(created.id).await.unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].user_id, patient);
    assert_eq!(participants[0].role, UserRole::Patient);
    assert!(!participants[0].is_active);
    assert!(participants[0].is_beneficiary);

    assert_eq!(h.reminders.scheduled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_without_owner_is_draft() {
    let h = Harness::new();
    let patient = h.patient().await;

    let created = ConsultationLifecycleService::new(&h.ctx)
        .create_consultation(request(patient, None), patient)
        .await
        .unwrap();

    assert_eq!(created.status, ConsultationStatus::Draft);
    assert_eq!(created.owner_id, None);
}

#[tokio::test]
async fn test_create_authorization_and_validation() {
    let h = Harness::new();
    let patient = h.patient().await;
    let other_patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let service = ConsultationLifecycleService::new(&h.ctx);

    let err = service
        .create_consultation(request(patient, None), other_patient)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::Forbidden(_));

    let err = service
        .create_consultation(request(patient, None), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::NotFound(_));

    let err = service
        .create_consultation(request(Uuid::new_v4(), None), practitioner)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::NotFound(_));

    let err = service
        .create_consultation(request(practitioner, None), practitioner)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::BadRequest(_));

    let err = service
        .create_consultation(request(patient, Some(other_patient)), practitioner)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::BadRequest(_));

    assert_eq!(h.store.consultation_count().await, 0);
}

#[tokio::test]
async fn test_second_open_consultation_for_patient_conflicts() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    h.scheduled(patient, practitioner, None).await;

    let err = ConsultationLifecycleService::new(&h.ctx)
        .create_consultation(request(patient, Some(practitioner)), practitioner)
        .await
        .unwrap_err();

    assert_matches!(err, ConsultationError::Conflict(_));
}

#[tokio::test]
async fn test_reminder_failure_does_not_fail_create() {
    let h = Harness::builder().with_failing_reminders().build();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;

    let created = ConsultationLifecycleService::new(&h.ctx)
        .create_consultation(request(patient, Some(practitioner)), practitioner)
        .await;

    assert!(created.is_ok());
}

#[tokio::test]
async fn test_assign_practitioner_moves_draft_to_scheduled() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let admin = h.admin().await;
    let service = ConsultationLifecycleService::new(&h.ctx);

    let draft = service
        .create_consultation(request(patient, None), patient)
        .await
        .unwrap();

    let err = service
        .assign_practitioner(draft.id, practitioner, practitioner)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::Forbidden(_));

    let err = service
        .assign_practitioner(draft.id, patient, admin)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::BadRequest(_));

    let assigned = service
        .assign_practitioner(draft.id, practitioner, admin)
        .await
        .unwrap();
    assert_eq!(assigned.status, ConsultationStatus::Scheduled);
    assert_eq!(assigned.owner_id, Some(practitioner));
    assert_eq!(assigned.version, 2);

    let err = service
        .assign_practitioner(draft.id, practitioner, admin)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::BadRequest(_));
}

#[tokio::test]
async fn test_close_completes_and_schedules_deletion() {
    let h = Harness::builder().with_retention_hours(48).build();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let id = h.scheduled(patient, practitioner, None).await;

    AdmissionService::new(&h.ctx)
        .join_as_practitioner(id, practitioner)
        .await
        .unwrap();
    let before = h.store.find_consultation(id).await.unwrap().unwrap();

    let response = ConsultationLifecycleService::new(&h.ctx)
        .end_consultation(id, practitioner, EndAction::Close)
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.status, ConsultationStatus::Completed);
    assert_eq!(response.retention_hours, Some(48));

    let stored = h.store.find_consultation(id).await.unwrap().unwrap();
    assert_eq!(stored.version, before.version + 1);
    let closed_at = stored.closed_at.unwrap();
    assert_eq!(stored.deletion_scheduled_at, Some(closed_at + Duration::hours(48)));
    assert_eq!(response.deletion_scheduled_at, stored.deletion_scheduled_at);

    let participants = h.store.list_participants(id).await.unwrap();
    assert!(participants.iter().all(|p| !p.is_active));

    assert!(h.media.get_router(id).await.unwrap().is_none());
    assert_eq!(h.events.named("consultation_ended").len(), 1);
    assert_eq!(*h.reminders.cancelled.lock().unwrap(), vec![id]);
}

#[tokio::test]
async fn test_keep_open_terminates_without_deletion_deadline() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let id = h.scheduled(patient, practitioner, None).await;

    let response = ConsultationLifecycleService::new(&h.ctx)
        .end_consultation(id, practitioner, EndAction::KeepOpen)
        .await
        .unwrap();

    assert_eq!(response.status, ConsultationStatus::TerminatedOpen);
    assert_eq!(response.deletion_scheduled_at, None);
    assert_eq!(response.retention_hours, None);
}

#[tokio::test]
async fn test_end_preconditions() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let stranger = h.practitioner().await;
    let admin = h.admin().await;
    let id = h.scheduled(patient, practitioner, None).await;
    let service = ConsultationLifecycleService::new(&h.ctx);

    let err = service
        .end_consultation(id, stranger, EndAction::Close)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::Forbidden(_));

    service
        .end_consultation(id, admin, EndAction::TerminateOpen)
        .await
        .unwrap();

    let err = service
        .end_consultation(id, practitioner, EndAction::Close)
        .await
        .unwrap_err();
    assert_matches!(err, ConsultationError::BadRequest(_));
}

#[tokio::test]
async fn test_end_survives_every_side_effect_failing() {
    let h = Harness::builder()
        .with_unavailable_media()
        .with_failing_events()
        .with_failing_reminders()
        .build();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let id = h.scheduled(patient, practitioner, None).await;

    let response = ConsultationLifecycleService::new(&h.ctx)
        .end_consultation(id, practitioner, EndAction::Close)
        .await
        .unwrap();

    assert_eq!(response.status, ConsultationStatus::Completed);
}

#[tokio::test]
async fn test_get_consultation_limited_to_members() {
    let h = Harness::new();
    let patient = h.patient().await;
    let practitioner = h.practitioner().await;
    let stranger = h.patient().await;
    let admin = h.admin().await;
    let id = h.scheduled(patient, practitioner, None).await;
    let service = ConsultationLifecycleService::new(&h.ctx);

    let details = service.get_consultation(id, patient).await.unwrap();
    assert_eq!(details.consultation.id, id);
    assert_eq!(details.participants.len(), 1);

    assert!(service.get_consultation(id, practitioner).await.is_ok());
    assert!(service.get_consultation(id, admin).await.is_ok());
    assert_matches!(
        service.get_consultation(id, stranger).await,
        Err(ConsultationError::Forbidden(_))
    );
}
