use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::bus::{EventBus, EventBusError, RoomEvent};

pub type RoomSender = broadcast::Sender<String>;
pub type RoomReceiver = broadcast::Receiver<String>;

const ROOM_CAPACITY: usize = 100;
const GLOBAL_CAPACITY: usize = 1000;

/// In-process [`EventBus`] backed by one broadcast channel per room.
///
/// Clones share the same rooms.
#[derive(Clone)]
pub struct RoomBroadcaster {
    rooms: Arc<RwLock<HashMap<String, RoomSender>>>,
    global_sender: RoomSender,
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(GLOBAL_CAPACITY);

        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            global_sender,
        }
    }

    /// Subscribes to a room, opening it if needed.
    pub async fn subscribe(&self, room: &str) -> RoomReceiver {
        let mut rooms = self.rooms.write().await;
        let sender = rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0);

        debug!("New subscriber for room {}", room);
        sender.subscribe()
    }

    /// Every event on every room, for audit and monitoring consumers.
    pub fn subscribe_global(&self) -> RoomReceiver {
        self.global_sender.subscribe()
    }

    pub async fn remove_room(&self, room: &str) {
        let mut rooms = self.rooms.write().await;
        rooms.remove(room);
        debug!("Removed room {}", room);
    }

    pub async fn get_active_rooms(&self) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms.keys().cloned().collect()
    }

    /// Drops rooms whose subscribers have all disconnected.
    pub async fn prune_idle_rooms(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for RoomBroadcaster {
    async fn publish(&self, room: &str, event: &str, payload: Value) -> Result<(), EventBusError> {
        let envelope = RoomEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload,
            timestamp: Utc::now(),
        };
        let message = serde_json::to_string(&envelope)?;

        {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(sender) => {
                    if sender.send(message.clone()).is_err() {
                        debug!("No live subscribers in room {}, dropping {}", room, event);
                    }
                }
                None => debug!("Room {} has never been opened, dropping {}", room, event),
            }
        }

        // Not critical; no global listener is the common case.
        let _ = self.global_sender.send(message);

        debug!("Published {} to room {}", event, room);
        Ok(())
    }
}
