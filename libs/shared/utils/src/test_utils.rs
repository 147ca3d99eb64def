use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::jwt::sign_token;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub retention_hours: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            retention_hours: 24,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            cloudflare_realtime_app_id: String::new(),
            cloudflare_realtime_api_token: String::new(),
            cloudflare_realtime_base_url: "https://test.cloudflare.com/v1".to_string(),
            consultation_retention_hours: self.retention_hours,
            public_app_url: "https://app.test".to_string(),
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user_id: Uuid, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user_id.to_string(),
            "email": format!("{}@example.org", user_id.simple()),
            "role": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp(),
        });

        sign_token(&claims, secret).expect("HMAC can take key of any size")
    }

    pub fn bearer(user_id: Uuid) -> String {
        format!("Bearer {}", Self::create_test_token(user_id, TEST_JWT_SECRET, None))
    }

    pub fn create_expired_token(user_id: Uuid, secret: &str) -> String {
        Self::create_test_token(user_id, secret, Some(-1))
    }
}
