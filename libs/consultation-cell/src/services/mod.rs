pub mod admission;
pub mod authorization;
pub mod context;
pub mod lifecycle;
pub mod messages;
pub mod policy;
pub mod reminders;
pub mod rooms;
pub mod waiting_room;
