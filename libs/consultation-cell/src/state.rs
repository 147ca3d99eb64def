// libs/consultation-cell/src/state.rs
use std::fmt;

use realtime_cell::RoomBroadcaster;

use crate::services::context::ConsultationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Supabase,
    InMemory,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMode::Supabase => f.write_str("supabase"),
            StoreMode::InMemory => f.write_str("in_memory"),
        }
    }
}

/// Router state. The broadcaster is the same bus the engines publish to.
#[derive(Clone)]
pub struct ConsultationState {
    pub context: ConsultationContext,
    pub broadcaster: RoomBroadcaster,
    pub store_mode: StoreMode,
}

impl ConsultationState {
    pub fn new(
        context: ConsultationContext,
        broadcaster: RoomBroadcaster,
        store_mode: StoreMode,
    ) -> Self {
        Self {
            context,
            broadcaster,
            store_mode,
        }
    }
}
