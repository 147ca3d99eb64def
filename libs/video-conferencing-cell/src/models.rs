// libs/video-conferencing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// MEDIA ROUTER MODELS
// ==============================================================================

/// SFU router bound one-to-one with a live consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRouter {
    pub id: String,
    pub consultation_id: Uuid,
    pub provider: MediaProvider,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaProvider {
    Cloudflare,
    Local,
}

#[derive(Debug, Clone)]
pub struct RouterProvision {
    pub router: MediaRouter,
    /// True only for the caller whose request brought the router into existence.
    pub created: bool,
}

// ==============================================================================
// CLOUDFLARE REALTIME API MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareSessionRequest {
    #[serde(rename = "sessionDescription")]
    pub session_description: SessionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "sessionDescription", skip_serializing_if = "Option::is_none")]
    pub session_description: Option<SessionDescription>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "errorDescription", skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: String, // "offer" or "answer"
    pub sdp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

// ==============================================================================
// ERROR HANDLING
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MediaSessionError {
    #[error("Video conferencing not configured")]
    NotConfigured,

    #[error("Cloudflare API error: {message}")]
    CloudflareApiError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<reqwest::Error> for MediaSessionError {
    fn from(err: reqwest::Error) -> Self {
        MediaSessionError::CloudflareApiError {
            message: err.to_string(),
        }
    }
}
