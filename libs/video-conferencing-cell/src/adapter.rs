use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{MediaRouter, MediaSessionError, RouterProvision};

/// Capability to manage the SFU router bound to a consultation.
#[async_trait]
pub trait MediaSessionAdapter: Send + Sync {
    async fn get_router(&self, consultation_id: Uuid)
        -> Result<Option<MediaRouter>, MediaSessionError>;

    /// Creates the consultation's router, or returns the existing one with
    /// `created == false` if another caller got there first.
    async fn create_router_for_consultation(
        &self,
        consultation_id: Uuid,
    ) -> Result<RouterProvision, MediaSessionError>;

    async fn cleanup_router_for_consultation(
        &self,
        consultation_id: Uuid,
    ) -> Result<(), MediaSessionError>;

    /// Get-or-create.
    async fn ensure_router(
        &self,
        consultation_id: Uuid,
    ) -> Result<RouterProvision, MediaSessionError> {
        if let Some(router) = self.get_router(consultation_id).await? {
            return Ok(RouterProvision {
                router,
                created: false,
            });
        }

        self.create_router_for_consultation(consultation_id).await
    }
}
