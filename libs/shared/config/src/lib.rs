use std::env;
use tracing::warn;

/// Hours a closed consultation is retained before the external retention job may purge it.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub cloudflare_realtime_app_id: String,
    pub cloudflare_realtime_api_token: String,
    pub cloudflare_realtime_base_url: String,
    pub consultation_retention_hours: i64,
    pub public_app_url: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            cloudflare_realtime_app_id: env::var("CLOUDFLARE_REALTIME_APP_ID")
                .unwrap_or_else(|_| {
                    warn!("CLOUDFLARE_REALTIME_APP_ID not set, using empty value");
                    String::new()
                }),
            cloudflare_realtime_api_token: env::var("CLOUDFLARE_REALTIME_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("CLOUDFLARE_REALTIME_API_TOKEN not set, using empty value");
                    String::new()
                }),
            cloudflare_realtime_base_url: env::var("CLOUDFLARE_REALTIME_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("CLOUDFLARE_REALTIME_BASE_URL not set, using default");
                    "https://rtc.live.cloudflare.com/v1".to_string()
                }),
            consultation_retention_hours: parse_or_default(
                "CONSULTATION_RETENTION_HOURS",
                DEFAULT_RETENTION_HOURS,
            ),
            public_app_url: env::var("PUBLIC_APP_URL")
                .unwrap_or_else(|_| {
                    warn!("PUBLIC_APP_URL not set, using default");
                    "http://localhost:5173".to_string()
                }),
            server_port: parse_or_default("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Supabase not fully configured - consultations will use the in-memory store");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_role_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_video_conferencing_configured(&self) -> bool {
        !self.cloudflare_realtime_app_id.is_empty()
            && !self.cloudflare_realtime_api_token.is_empty()
            && !self.cloudflare_realtime_base_url.is_empty()
    }

    /// Browser URL a practitioner opens to enter the live session.
    pub fn session_url(&self, consultation_id: &str) -> String {
        format!(
            "{}/consultations/{}/session",
            self.public_app_url.trim_end_matches('/'),
            consultation_id
        )
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
