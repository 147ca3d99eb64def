// libs/video-conferencing-cell/src/services/cloudflare.rs
use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{
    CloudflareSessionRequest, CloudflareSessionResponse, IceServer, MediaSessionError,
    SessionDescription,
};

/// Offer used to open a server-side session before any browser has negotiated.
/// Participants attach their own tracks to the session afterwards.
const BOOTSTRAP_OFFER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

/// Cloudflare Realtime API client
/// Based on: https://developers.cloudflare.com/realtime/
pub struct CloudflareRealtimeClient {
    client: Client,
    app_id: String,
    api_token: String,
    base_url: String,
}

impl CloudflareRealtimeClient {
    pub fn new(config: &AppConfig) -> Result<Self, MediaSessionError> {
        if !config.is_video_conferencing_configured() {
            return Err(MediaSessionError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            app_id: config.cloudflare_realtime_app_id.clone(),
            api_token: config.cloudflare_realtime_api_token.clone(),
            base_url: config.cloudflare_realtime_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Opens a new SFU session.
    /// POST /v1/apps/{appId}/sessions/new
    pub async fn create_session(&self) -> Result<CloudflareSessionResponse, MediaSessionError> {
        info!("Creating new Cloudflare Realtime session");

        let url = format!("{}/apps/{}/sessions/new", self.base_url, self.app_id);

        let request_body = CloudflareSessionRequest {
            session_description: SessionDescription {
                sdp_type: "offer".to_string(),
                sdp: BOOTSTRAP_OFFER_SDP.to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Cloudflare session creation response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Cloudflare session creation failed: {} - {}", status, response_text);
            return Err(MediaSessionError::CloudflareApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let session_response: CloudflareSessionResponse = serde_json::from_str(&response_text)
            .map_err(|e| MediaSessionError::CloudflareApiError {
                message: format!("Failed to parse session response: {}", e),
            })?;

        if let Some(error_code) = &session_response.error_code {
            let message = session_response
                .error_description
                .as_deref()
                .unwrap_or("Unknown error");
            error!("Cloudflare session error: {} - {}", error_code, message);
            return Err(MediaSessionError::CloudflareApiError {
                message: format!("{}: {}", error_code, message),
            });
        }

        info!("Created Cloudflare session: {}", session_response.session_id);
        Ok(session_response)
    }

    /// Cloudflare has no explicit session deletion; sessions expire after
    /// inactivity, so this only records the release.
    pub async fn cleanup_session(&self, session_id: &str) -> Result<(), MediaSessionError> {
        info!("Releasing Cloudflare session: {} (automatic expiration)", session_id);
        Ok(())
    }

    pub fn get_ice_servers(&self) -> Vec<IceServer> {
        vec![IceServer {
            urls: vec!["stun:stun.cloudflare.com:3478".to_string()],
            username: None,
            credential: None,
        }]
    }

    pub async fn health_check(&self) -> Result<bool, MediaSessionError> {
        let url = format!("{}/apps/{}", self.base_url, self.app_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        // 404 is expected for the app info endpoint
        let is_healthy = response.status().is_success() || response.status() == 404;

        if !is_healthy {
            warn!("Cloudflare Realtime API health check failed: {}", response.status());
        }

        Ok(is_healthy)
    }
}
