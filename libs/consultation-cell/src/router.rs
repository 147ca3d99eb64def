// libs/consultation-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ConsultationState;

pub fn consultation_routes(state: ConsultationState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_consultation))
        .route("/waiting-room", get(handlers::list_waiting_room))
        .route("/rooms/{room}/events", get(handlers::room_events))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}/assign", post(handlers::assign_practitioner))
        .route("/{consultation_id}/join/patient", post(handlers::join_as_patient))
        .route(
            "/{consultation_id}/join/practitioner",
            post(handlers::join_as_practitioner),
        )
        .route("/{consultation_id}/admit", post(handlers::admit_patient))
        .route("/{consultation_id}/end", post(handlers::end_consultation))
        .route("/{consultation_id}/leave", post(handlers::leave_consultation))
        .route(
            "/{consultation_id}/messages",
            get(handlers::list_messages).post(handlers::post_message),
        )
        .layer(middleware::from_fn_with_state(
            state.context.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
