// libs/consultation-cell/src/handlers.rs
use std::convert::Infallible;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use realtime_cell::RoomEvent;
use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;

use crate::models::{
    AdmitPatientResponse, AssignPractitionerRequest, ConsultationDetails,
    CreateConsultationRequest, CreateConsultationResponse, EndConsultationRequest,
    EndConsultationResponse, JoinConsultationResponse, PostMessageRequest, WaitingRoomPage,
    WaitingRoomQuery,
};
use crate::services::admission::AdmissionService;
use crate::services::lifecycle::ConsultationLifecycleService;
use crate::services::messages::MessageService;
use crate::services::rooms::RoomAccessService;
use crate::services::waiting_room::WaitingRoomService;
use crate::state::ConsultationState;

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<CreateConsultationResponse>), AppError> {
    let service = ConsultationLifecycleService::new(&state.context);
    let created = service.create_consultation(request, user.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<ConsultationDetails>, AppError> {
    let service = ConsultationLifecycleService::new(&state.context);
    Ok(Json(service.get_consultation(consultation_id, user.id).await?))
}

#[axum::debug_handler]
pub async fn assign_practitioner(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<AssignPractitionerRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationLifecycleService::new(&state.context);
    let consultation = service
        .assign_practitioner(consultation_id, request.practitioner_id, user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation,
        "message": "Practitioner assigned"
    })))
}

#[axum::debug_handler]
pub async fn end_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<EndConsultationRequest>,
) -> Result<Json<EndConsultationResponse>, AppError> {
    let service = ConsultationLifecycleService::new(&state.context);
    Ok(Json(
        service
            .end_consultation(consultation_id, user.id, request.action)
            .await?,
    ))
}

// ==============================================================================
// ADMISSION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn join_as_patient(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<JoinConsultationResponse>, AppError> {
    let service = AdmissionService::new(&state.context);
    Ok(Json(service.join_as_patient(consultation_id, user.id).await?))
}

#[axum::debug_handler]
pub async fn join_as_practitioner(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<JoinConsultationResponse>, AppError> {
    let service = AdmissionService::new(&state.context);
    Ok(Json(
        service
            .join_as_practitioner(consultation_id, user.id)
            .await?,
    ))
}

#[axum::debug_handler]
pub async fn admit_patient(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<AdmitPatientResponse>, AppError> {
    let service = AdmissionService::new(&state.context);
    Ok(Json(service.admit_patient(consultation_id, user.id).await?))
}

#[axum::debug_handler]
pub async fn leave_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AdmissionService::new(&state.context);
    let participant = service.leave(consultation_id, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "consultation_id": consultation_id,
        "participant": participant
    })))
}

// ==============================================================================
// MESSAGE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = MessageService::new(&state.context);
    let messages = service.list_messages(consultation_id, user.id).await?;

    Ok(Json(json!({
        "messages": messages,
        "total": messages.len()
    })))
}

#[axum::debug_handler]
pub async fn post_message(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = MessageService::new(&state.context);
    let message = service
        .post_message(consultation_id, user.id, request.content)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

// ==============================================================================
// WAITING ROOM & REALTIME HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_waiting_room(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<WaitingRoomQuery>,
) -> Result<Json<WaitingRoomPage>, AppError> {
    let service = WaitingRoomService::new(&state.context);
    Ok(Json(
        service
            .list_waiting_room(
                user.id,
                query.page,
                query.page_size,
                query.sort_order.unwrap_or_default(),
            )
            .await?,
    ))
}

/// Streams a room's events as Server-Sent Events.
pub async fn room_events(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(room): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let room = RoomAccessService::new(&state.context)
        .authorize(&room, user.id)
        .await?;
    let room_name = room.to_string();
    let receiver = state.broadcaster.subscribe(&room_name).await;
    debug!("User {} subscribed to {}", user.id, room_name);

    let events = stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let name = serde_json::from_str::<RoomEvent>(&message)
                        .map(|envelope| envelope.event)
                        .unwrap_or_else(|_| "message".to_string());
                    let event = Event::default().event(name).data(message);
                    return Some((Ok(event), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Room subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn health_check(State(state): State<ConsultationState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "consultation-cell",
        "store": state.store_mode.to_string(),
        "media_provider_configured": state.context.config.is_video_conferencing_configured(),
        "retention_hours": state.context.retention_hours(),
    }))
}
