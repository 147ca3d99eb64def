// libs/consultation-cell/src/services/rooms.rs
use uuid::Uuid;

use realtime_cell::Room;

use crate::error::ConsultationError;
use crate::services::authorization::can_view;
use crate::services::context::ConsultationContext;

/// Decides who may listen to a room's event stream.
pub struct RoomAccessService {
    ctx: ConsultationContext,
}

impl RoomAccessService {
    pub fn new(ctx: &ConsultationContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    pub async fn authorize(&self, room: &str, user_id: Uuid) -> Result<Room, ConsultationError> {
        let parsed: Room = room.parse().map_err(ConsultationError::BadRequest)?;

        match parsed {
            Room::Practitioner(practitioner_id) if practitioner_id == user_id => Ok(parsed),
            Room::Practitioner(_) => Err(ConsultationError::Forbidden(
                "Practitioner rooms are private".to_string(),
            )),
            Room::Consultation(consultation_id) => {
                let consultation = self.ctx.load_consultation(consultation_id).await?;
                let user = self.ctx.load_user(user_id, "User").await?;
                let membership = self
                    .ctx
                    .repository
                    .find_participant(consultation_id, user_id)
                    .await?;
                can_view(&user, &consultation, membership.as_ref()).into_result()?;
                Ok(parsed)
            }
        }
    }
}
