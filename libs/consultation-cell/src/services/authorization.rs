// libs/consultation-cell/src/services/authorization.rs
//! Per-operation access predicates. Role decisions always come from the
//! stored profile, never from token claims.

use uuid::Uuid;

use crate::error::ConsultationError;
use crate::models::{Consultation, Participant, UserProfile, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(&'static str),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), ConsultationError> {
        match self {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(reason) => Err(ConsultationError::Forbidden(reason.to_string())),
        }
    }
}

fn allow_if(condition: bool, reason: &'static str) -> AccessDecision {
    if condition {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny(reason)
    }
}

fn is_owner(user: &UserProfile, consultation: &Consultation) -> bool {
    consultation.owner_id == Some(user.id)
}

pub fn can_create(requester: &UserProfile, patient_id: Uuid) -> AccessDecision {
    allow_if(
        requester.id == patient_id
            || matches!(requester.role, UserRole::Practitioner | UserRole::Admin),
        "Only the patient, a practitioner or an admin can create this consultation",
    )
}

pub fn can_assign(requester: &UserProfile) -> AccessDecision {
    allow_if(
        requester.has_role(UserRole::Admin),
        "Only admins can assign a practitioner",
    )
}

pub fn can_admit(requester: &UserProfile, consultation: &Consultation) -> AccessDecision {
    match requester.role {
        UserRole::Admin => AccessDecision::Allow,
        UserRole::Practitioner => allow_if(
            is_owner(requester, consultation),
            "Only the owning practitioner can admit patients",
        ),
        _ => AccessDecision::Deny("Only practitioners or admins can admit patients"),
    }
}

pub fn can_end(requester: &UserProfile, consultation: &Consultation) -> AccessDecision {
    allow_if(
        requester.has_role(UserRole::Admin) || is_owner(requester, consultation),
        "Only the owning practitioner or an admin can end this consultation",
    )
}

pub fn can_join_as_practitioner(
    requester: &UserProfile,
    consultation: &Consultation,
) -> AccessDecision {
    allow_if(
        is_owner(requester, consultation),
        "Only the owning practitioner can join this consultation",
    )
}

/// Registered participants, the owner and admins may read a consultation.
pub fn can_view(
    requester: &UserProfile,
    consultation: &Consultation,
    membership: Option<&Participant>,
) -> AccessDecision {
    allow_if(
        membership.is_some()
            || is_owner(requester, consultation)
            || requester.has_role(UserRole::Admin),
        "Not a participant of this consultation",
    )
}
