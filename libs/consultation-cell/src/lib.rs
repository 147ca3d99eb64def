// libs/consultation-cell/src/lib.rs
//! # Consultation Cell
//!
//! Orchestrates a telehealth consultation from booking to termination.
//!
//! ```text
//! DRAFT -> SCHEDULED -> WAITING -> ACTIVE -> COMPLETED
//!                                        \-> TERMINATED_OPEN
//! CANCELLED is reachable from the early states.
//! ```
//!
//! - `services::lifecycle` creates, assigns and ends consultations
//! - `services::admission` runs the patient/practitioner join protocol and admission
//! - `services::waiting_room` computes a practitioner's queue
//! - `store` is the repository seam (Supabase or in-memory)
//!
//! Every state change is a compare-and-swap on `version`; a lost race comes
//! back as a Conflict and is never retried here. Media routers are provisioned
//! through `video-conferencing-cell` and room notifications go out through
//! `realtime-cell`, always best-effort.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use error::ConsultationError;
pub use router::consultation_routes;
pub use services::context::ConsultationContext;
pub use state::{ConsultationState, StoreMode};
