// libs/consultation-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE CONSULTATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub id: Uuid,
    pub status: ConsultationStatus,
    pub owner_id: Option<Uuid>,
    /// Optimistic-lock token; bumped by exactly one on every state change.
    pub version: i64,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    pub reminder_enabled: bool,
    pub group_id: Option<Uuid>,
    pub speciality_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Draft,
    Scheduled,
    Waiting,
    Active,
    Completed,
    TerminatedOpen,
    Cancelled,
}

impl ConsultationStatus {
    /// Statuses that occupy a patient's single active lane.
    pub const OPEN_LANE: [ConsultationStatus; 3] = [
        ConsultationStatus::Scheduled,
        ConsultationStatus::Waiting,
        ConsultationStatus::Active,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed
                | ConsultationStatus::TerminatedOpen
                | ConsultationStatus::Cancelled
        )
    }

    pub fn is_open_lane(&self) -> bool {
        Self::OPEN_LANE.contains(self)
    }

    /// Statuses nobody may join or write into any more.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConsultationStatus::Completed | ConsultationStatus::Cancelled)
    }

    pub fn valid_transitions(&self) -> &'static [ConsultationStatus] {
        use ConsultationStatus::*;
        match self {
            Draft => &[Scheduled, Cancelled],
            Scheduled => &[Waiting, Active, Completed, TerminatedOpen, Cancelled],
            Waiting => &[Active, Completed, TerminatedOpen, Cancelled],
            Active => &[Completed, TerminatedOpen],
            // the owner may resume a session that was ended without closing it
            TerminatedOpen => &[Active],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ConsultationStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsultationStatus::Draft => "DRAFT",
            ConsultationStatus::Scheduled => "SCHEDULED",
            ConsultationStatus::Waiting => "WAITING",
            ConsultationStatus::Active => "ACTIVE",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::TerminatedOpen => "TERMINATED_OPEN",
            ConsultationStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[serde(alias = "patient")]
    Patient,
    #[serde(alias = "practitioner", alias = "doctor")]
    Practitioner,
    #[serde(alias = "admin")]
    Admin,
    #[serde(other)]
    Other,
}

/// Read-only view of a user owned by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
}

impl UserProfile {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub consultation_id: Uuid,
    pub user_id: Uuid,
    pub role: UserRole,
    /// Currently connected, as opposed to merely assigned.
    pub is_active: bool,
    /// The person the consultation was booked for, as opposed to a plus-one.
    pub is_beneficiary: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub consultation_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// WRITE MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub id: Uuid,
    pub status: ConsultationStatus,
    pub owner_id: Option<Uuid>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub reminder_enabled: bool,
    pub group_id: Option<Uuid>,
    pub speciality_id: Option<Uuid>,
}

/// Fields changed by a conditional write. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsultationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsultationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    /// Deactivate every participant in the same write.
    #[serde(skip)]
    pub deactivate_participants: bool,
}

impl ConsultationPatch {
    pub fn status(status: ConsultationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(&self, consultation: &mut Consultation) {
        if let Some(status) = self.status {
            consultation.status = status;
        }
        if let Some(owner_id) = self.owner_id {
            consultation.owner_id = Some(owner_id);
        }
        if let Some(started_at) = self.started_at {
            consultation.started_at = Some(started_at);
        }
        if let Some(closed_at) = self.closed_at {
            consultation.closed_at = Some(closed_at);
        }
        if let Some(deadline) = self.deletion_scheduled_at {
            consultation.deletion_scheduled_at = Some(deadline);
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsultationRequest {
    pub patient_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub group_id: Option<Uuid>,
    pub speciality_id: Option<Uuid>,
    pub reminder_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsultationResponse {
    pub id: Uuid,
    pub status: ConsultationStatus,
    pub owner_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub group_id: Option<Uuid>,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignPractitionerRequest {
    pub practitioner_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndAction {
    Close,
    KeepOpen,
    TerminateOpen,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndConsultationRequest {
    pub action: EndAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndConsultationResponse {
    pub success: bool,
    pub message: String,
    pub consultation_id: Uuid,
    pub status: ConsultationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaSessionView {
    pub id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConsultationResponse {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub consultation_id: Uuid,
    pub status: ConsultationStatus,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    pub media_session: MediaSessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitPatientResponse {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub consultation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationDetails {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
}

// ==============================================================================
// WAITING ROOM MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitingRoomQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitingRoomEntry {
    pub id: Uuid,
    pub patient_initials: String,
    pub join_time: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub queue_position: u32,
    pub estimated_wait_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingRoomPage {
    pub waiting_rooms: Vec<WaitingRoomEntry>,
    pub total_count: u32,
    pub current_page: u32,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ConsultationStatus::TerminatedOpen).unwrap();
        assert_eq!(json, "\"TERMINATED_OPEN\"");
        assert_eq!(ConsultationStatus::TerminatedOpen.to_string(), "TERMINATED_OPEN");
    }

    #[test]
    fn test_waiting_is_one_way() {
        assert!(ConsultationStatus::Scheduled.can_transition_to(ConsultationStatus::Waiting));
        assert!(!ConsultationStatus::Waiting.can_transition_to(ConsultationStatus::Scheduled));
        assert!(!ConsultationStatus::Active.can_transition_to(ConsultationStatus::Waiting));
    }

    #[test]
    fn test_closed_statuses_have_no_exits() {
        assert!(ConsultationStatus::Completed.valid_transitions().is_empty());
        assert!(ConsultationStatus::Cancelled.valid_transitions().is_empty());
        assert!(ConsultationStatus::TerminatedOpen.is_terminal());
        assert!(!ConsultationStatus::TerminatedOpen.is_closed());
    }

    #[test]
    fn test_unknown_role_deserializes_as_other() {
        let role: UserRole = serde_json::from_str("\"SUPPORT\"").unwrap();
        assert_eq!(role, UserRole::Other);
        let role: UserRole = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(role, UserRole::Practitioner);
    }

    #[test]
    fn test_end_action_wire_names() {
        let action: EndAction = serde_json::from_str("\"terminate_open\"").unwrap();
        assert_eq!(action, EndAction::TerminateOpen);
        let action: EndAction = serde_json::from_str("\"keep_open\"").unwrap();
        assert_eq!(action, EndAction::KeepOpen);
    }

    #[test]
    fn test_patch_leaves_unset_fields() {
        let now = Utc::now();
        let mut consultation = Consultation {
            id: Uuid::new_v4(),
            status: ConsultationStatus::Waiting,
            owner_id: Some(Uuid::new_v4()),
            version: 2,
            scheduled_date: Some(now),
            started_at: None,
            closed_at: None,
            deletion_scheduled_at: None,
            reminder_enabled: true,
            group_id: None,
            speciality_id: None,
            created_at: now,
            updated_at: now,
        };
        let owner = consultation.owner_id;

        ConsultationPatch::status(ConsultationStatus::Active).apply(&mut consultation);

        assert_eq!(consultation.status, ConsultationStatus::Active);
        assert_eq!(consultation.owner_id, owner);
        assert_eq!(consultation.version, 2, "version is owned by the store");
    }
}
