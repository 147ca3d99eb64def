// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Binds consultations to media routers on an external WebRTC SFU
//! (Cloudflare Realtime).
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                   Video Cell                        |
//! +-----------------------------------------------------+
//! |  adapter.rs      |  MediaSessionAdapter capability  |
//! |  models.rs       |  Routers, provider DTOs, errors  |
//! |  services/       |                                  |
//! |    cloudflare.rs |  Cloudflare Realtime API client  |
//! |    registry.rs   |  One router per consultation     |
//! +-----------------------------------------------------+
//! ```
//!
//! A router is created lazily the first time anyone enters a consultation and
//! torn down by the termination path. Creation is get-or-create: when two
//! callers race, exactly one of them observes `created == true`.
//!
//! ## Configuration
//!
//! - `CLOUDFLARE_REALTIME_APP_ID` - Cloudflare app identifier
//! - `CLOUDFLARE_REALTIME_API_TOKEN` - API authentication token
//! - `CLOUDFLARE_REALTIME_BASE_URL` - API base URL (optional, defaults to production)
//!
//! Without credentials the registry mints local router ids so the rest of the
//! system keeps working in development.

pub mod adapter;
pub mod models;
pub mod services;

pub use adapter::MediaSessionAdapter;
pub use models::{MediaProvider, MediaRouter, MediaSessionError, RouterProvision};
pub use services::{CloudflareRealtimeClient, RouterRegistry};
