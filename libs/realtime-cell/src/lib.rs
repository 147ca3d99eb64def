//! # Realtime Cell
//!
//! Room-scoped publish/subscribe used to notify practitioners and session
//! members about consultation events.
//!
//! Rooms are named `practitioner:<id>` for notices aimed at one practitioner
//! and `consultation:<id>` for session-wide broadcasts. Publishing never
//! blocks: events for a room nobody listens to are dropped.

pub mod broadcaster;
pub mod bus;

pub use broadcaster::{RoomBroadcaster, RoomReceiver};
pub use bus::{EventBus, EventBusError, Room, RoomEvent};
