// libs/consultation-cell/src/services/waiting_room.rs
use std::cmp::Ordering;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::ConsultationError;
use crate::models::{
    Consultation, ConsultationPatch, ConsultationStatus, SortOrder, UserRole, WaitingRoomEntry,
    WaitingRoomPage,
};
use crate::services::context::ConsultationContext;
use crate::services::policy::{
    estimated_wait_minutes, format_wait_time, is_stale, patient_initials,
};
use crate::store::UpdateOutcome;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct WaitingRoomService {
    ctx: ConsultationContext,
}

impl WaitingRoomService {
    pub fn new(ctx: &ConsultationContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    #[instrument(skip(self))]
    pub async fn list_waiting_room(
        &self,
        practitioner_id: Uuid,
        page: Option<u32>,
        page_size: Option<u32>,
        sort_order: SortOrder,
    ) -> Result<WaitingRoomPage, ConsultationError> {
        let practitioner = self.ctx.load_user(practitioner_id, "Practitioner").await?;
        if !practitioner.has_role(UserRole::Practitioner) {
            return Err(ConsultationError::Forbidden(
                "Only practitioners have a waiting room".to_string(),
            ));
        }

        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let waiting = self
            .ctx
            .repository
            .list_owned_consultations(practitioner_id, ConsultationStatus::Waiting)
            .await?;
        let waiting = self.sweep_stale(waiting).await;

        let mut queue = Vec::new();
        for consultation in waiting {
            if let Some(row) = self.queue_row(&consultation).await? {
                queue.push(row);
            }
        }

        queue.sort_by(|a, b| compare_schedule(&a.consultation, &b.consultation, sort_order));

        let total_count = queue.len() as u32;
        let total_pages = total_count.div_ceil(page_size);
        // pages past the end come back empty
        let offset = u64::from(page - 1) * u64::from(page_size);

        let mut waiting_rooms = Vec::new();
        if let Ok(offset) = u32::try_from(offset) {
            for (index, row) in queue
                .into_iter()
                .skip(offset as usize)
                .take(page_size as usize)
                .enumerate()
            {
                // index < page_size and offset + index < total_count
                let queue_position = offset + index as u32 + 1;
                waiting_rooms.push(self.project(row, queue_position).await?);
            }
        }

        debug!(
            "Waiting room for {}: {} of {} entries on page {}",
            practitioner_id,
            waiting_rooms.len(),
            total_count,
            page
        );

        Ok(WaitingRoomPage {
            waiting_rooms,
            total_count,
            current_page: page,
            total_pages,
        })
    }

    /// Terminates consultations left waiting past the timeout. Lost races are
    /// skipped; the row is dropped from the listing either way.
    async fn sweep_stale(&self, consultations: Vec<Consultation>) -> Vec<Consultation> {
        let now = Utc::now();
        let mut fresh = Vec::with_capacity(consultations.len());

        for consultation in consultations {
            if !is_stale(consultation.scheduled_date, now) {
                fresh.push(consultation);
                continue;
            }

            let patch = ConsultationPatch {
                status: Some(ConsultationStatus::TerminatedOpen),
                ..Default::default()
            };
            match self
                .ctx
                .repository
                .conditional_update(consultation.id, consultation.version, patch)
                .await
            {
                Ok(UpdateOutcome::Applied(_)) => {
                    info!("Swept stale waiting consultation {}", consultation.id)
                }
                Ok(other) => debug!(
                    "Skipped sweeping consultation {}: {:?}",
                    consultation.id, other
                ),
                Err(e) => warn!("Failed to sweep consultation {}: {}", consultation.id, e),
            }
        }

        fresh
    }

    async fn queue_row(
        &self,
        consultation: &Consultation,
    ) -> Result<Option<QueueRow>, ConsultationError> {
        let participants = self.ctx.repository.list_participants(consultation.id).await?;

        if participants
            .iter()
            .any(|p| p.is_active && p.role == UserRole::Practitioner)
        {
            return Ok(None);
        }

        let earliest_patient = participants
            .iter()
            .filter(|p| p.is_active && p.role == UserRole::Patient)
            .min_by_key(|p| p.joined_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MAX));

        Ok(earliest_patient.map(|p| QueueRow {
            consultation: consultation.clone(),
            patient_id: p.user_id,
            join_time: p.joined_at,
        }))
    }

    async fn project(
        &self,
        row: QueueRow,
        queue_position: u32,
    ) -> Result<WaitingRoomEntry, ConsultationError> {
        let patient = self.ctx.repository.find_user(row.patient_id).await?;
        let (initials, language) = match &patient {
            Some(p) => (
                patient_initials(p.first_name.as_deref(), p.last_name.as_deref()),
                p.country.clone(),
            ),
            None => (String::new(), None),
        };

        Ok(WaitingRoomEntry {
            id: row.consultation.id,
            patient_initials: initials,
            join_time: row.join_time,
            language,
            queue_position,
            estimated_wait_time: format_wait_time(estimated_wait_minutes(queue_position)),
        })
    }
}

struct QueueRow {
    consultation: Consultation,
    patient_id: Uuid,
    join_time: Option<chrono::DateTime<Utc>>,
}

/// Unscheduled consultations sort first ascending; ties break on id.
fn compare_schedule(a: &Consultation, b: &Consultation, order: SortOrder) -> Ordering {
    let by_date = a.scheduled_date.cmp(&b.scheduled_date).then(a.id.cmp(&b.id));
    match order {
        SortOrder::Asc => by_date,
        SortOrder::Desc => by_date.reverse(),
    }
}
