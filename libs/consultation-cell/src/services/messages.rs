// libs/consultation-cell/src/services/messages.rs
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use realtime_cell::Room;

use crate::error::ConsultationError;
use crate::models::{Consultation, Message};
use crate::services::authorization::can_view;
use crate::services::context::ConsultationContext;

pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Consultation chat. Messages are immutable once written.
pub struct MessageService {
    ctx: ConsultationContext,
}

impl MessageService {
    pub fn new(ctx: &ConsultationContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    #[instrument(skip(self, content))]
    pub async fn post_message(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Message, ConsultationError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ConsultationError::BadRequest("Message cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ConsultationError::BadRequest(format!(
                "Message exceeds {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let consultation = self.authorize_member(consultation_id, user_id).await?;
        if consultation.status.is_closed() {
            return Err(ConsultationError::BadRequest(format!(
                "Consultation is {} and no longer accepts messages",
                consultation.status
            )));
        }

        let message = self
            .ctx
            .repository
            .append_message(consultation_id, user_id, content)
            .await?;
        debug!("Message {} posted to consultation {}", message.id, consultation_id);

        self.ctx
            .notify(
                Room::Consultation(consultation_id),
                "message_created",
                json!(message),
            )
            .await;

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Message>, ConsultationError> {
        self.authorize_member(consultation_id, user_id).await?;
        Ok(self.ctx.repository.list_messages(consultation_id).await?)
    }

    async fn authorize_member(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.ctx.load_consultation(consultation_id).await?;
        let user = self.ctx.load_user(user_id, "User").await?;
        let membership = self
            .ctx
            .repository
            .find_participant(consultation_id, user_id)
            .await?;
        can_view(&user, &consultation, membership.as_ref()).into_result()?;
        Ok(consultation)
    }
}
