use axum::{routing::get, Router};

use consultation_cell::{consultation_routes, ConsultationState};

pub fn create_router(state: ConsultationState) -> Router {
    Router::new()
        .route("/", get(|| async { "Consultation API is running!" }))
        .nest("/consultations", consultation_routes(state))
}
