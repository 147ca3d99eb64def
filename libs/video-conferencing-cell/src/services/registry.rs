// libs/video-conferencing-cell/src/services/registry.rs
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::adapter::MediaSessionAdapter;
use crate::models::{MediaProvider, MediaRouter, MediaSessionError, RouterProvision};
use crate::services::cloudflare::CloudflareRealtimeClient;

/// Process-wide map from consultation to its SFU router.
///
/// Provider calls happen outside the map lock. When two callers race on the
/// same consultation, both may provision, but only the first insert wins; the
/// loser releases its session and receives the winner's router.
#[derive(Clone)]
pub struct RouterRegistry {
    routers: Arc<RwLock<HashMap<Uuid, MediaRouter>>>,
    cloudflare: Option<Arc<CloudflareRealtimeClient>>,
}

impl RouterRegistry {
    pub fn new(config: &AppConfig) -> Self {
        let cloudflare = match CloudflareRealtimeClient::new(config) {
            Ok(client) => {
                info!("Cloudflare Realtime client initialized successfully");
                Some(Arc::new(client))
            }
            Err(_) => {
                warn!("Cloudflare Realtime not configured - using local media routers");
                None
            }
        };

        Self {
            routers: Arc::new(RwLock::new(HashMap::new())),
            cloudflare,
        }
    }

    /// Registry that never calls out to a provider.
    pub fn local() -> Self {
        Self {
            routers: Arc::new(RwLock::new(HashMap::new())),
            cloudflare: None,
        }
    }

    pub fn provider(&self) -> MediaProvider {
        if self.cloudflare.is_some() {
            MediaProvider::Cloudflare
        } else {
            MediaProvider::Local
        }
    }

    pub async fn active_router_count(&self) -> usize {
        self.routers.read().await.len()
    }

    async fn provision(&self, consultation_id: Uuid) -> Result<MediaRouter, MediaSessionError> {
        let (id, provider) = match &self.cloudflare {
            Some(client) => (client.create_session().await?.session_id, MediaProvider::Cloudflare),
            None => (format!("router_{}", Uuid::new_v4().simple()), MediaProvider::Local),
        };

        Ok(MediaRouter {
            id,
            consultation_id,
            provider,
            created_at: Utc::now(),
        })
    }

    async fn release(&self, router: &MediaRouter) -> Result<(), MediaSessionError> {
        match (&self.cloudflare, router.provider) {
            (Some(client), MediaProvider::Cloudflare) => client.cleanup_session(&router.id).await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MediaSessionAdapter for RouterRegistry {
    async fn get_router(
        &self,
        consultation_id: Uuid,
    ) -> Result<Option<MediaRouter>, MediaSessionError> {
        Ok(self.routers.read().await.get(&consultation_id).cloned())
    }

    async fn create_router_for_consultation(
        &self,
        consultation_id: Uuid,
    ) -> Result<RouterProvision, MediaSessionError> {
        if let Some(router) = self.get_router(consultation_id).await? {
            return Ok(RouterProvision {
                router,
                created: false,
            });
        }

        let candidate = self.provision(consultation_id).await?;

        let lost_race = {
            let mut routers = self.routers.write().await;
            match routers.entry(consultation_id) {
                Entry::Occupied(existing) => Some(existing.get().clone()),
                Entry::Vacant(slot) => {
                    slot.insert(candidate.clone());
                    None
                }
            }
        };

        match lost_race {
            Some(router) => {
                debug!(
                    "Router for consultation {} created concurrently, releasing {}",
                    consultation_id, candidate.id
                );
                if let Err(e) = self.release(&candidate).await {
                    warn!("Failed to release duplicate router {}: {}", candidate.id, e);
                }
                Ok(RouterProvision {
                    router,
                    created: false,
                })
            }
            None => {
                info!("Created media router {} for consultation {}", candidate.id, consultation_id);
                Ok(RouterProvision {
                    router: candidate,
                    created: true,
                })
            }
        }
    }

    async fn cleanup_router_for_consultation(
        &self,
        consultation_id: Uuid,
    ) -> Result<(), MediaSessionError> {
        let removed = self.routers.write().await.remove(&consultation_id);

        match removed {
            Some(router) => {
                info!("Tearing down media router {} for consultation {}", router.id, consultation_id);
                self.release(&router).await
            }
            None => {
                debug!("No media router to tear down for consultation {}", consultation_id);
                Ok(())
            }
        }
    }
}
