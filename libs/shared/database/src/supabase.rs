use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgREST client authenticated with the service role.
///
/// Row-level security is bypassed, so callers are responsible for every
/// authorization decision before issuing a request.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&config.supabase_anon_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.supabase_service_role_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // PATCH/POST return the affected rows so conditional writes can be checked.
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        Ok(Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(method, path, body, None).await
    }

    /// Inserts `rows`, merging into existing rows that collide on `on_conflict`.
    pub async fn upsert<T>(&self, table: &str, on_conflict: &str, rows: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?on_conflict={}", table, on_conflict);
        self.send(
            Method::POST,
            &path,
            Some(rows),
            Some("resolution=merge-duplicates,return=representation"),
        )
        .await
    }

    async fn send<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&'static str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.headers.clone();
        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_static(prefer));
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Calls a Postgres function exposed under `/rest/v1/rpc`.
    pub async fn rpc<T>(&self, function: &str, args: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(Method::POST, &format!("/rest/v1/rpc/{}", function), Some(args))
            .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: format!("{}/", url),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: "service".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            cloudflare_realtime_app_id: String::new(),
            cloudflare_realtime_api_token: String::new(),
            cloudflare_realtime_base_url: String::new(),
            consultation_retention_hours: 24,
            public_app_url: String::new(),
            server_port: 0,
        }
    }

    #[tokio::test]
    async fn test_request_sends_service_role_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/consultations"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer service"))
            .and(header("prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri())).unwrap();
        let rows: Vec<Value> = client
            .request(Method::GET, "/rest/v1/consultations", None)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such function"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri())).unwrap();
        let err = client.rpc::<Value>("missing", json!({})).await.unwrap_err();

        assert!(err.to_string().contains("Resource not found"));
    }

    #[tokio::test]
    async fn test_upsert_asks_for_merge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/consultation_participants"))
            .and(header(
                "prefer",
                "resolution=merge-duplicates,return=representation",
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri())).unwrap();
        let rows: Vec<Value> = client
            .upsert(
                "consultation_participants",
                "consultation_id,user_id",
                json!([{"user_id": "u"}]),
            )
            .await
            .unwrap();

        assert!(rows.is_empty());
    }
}
