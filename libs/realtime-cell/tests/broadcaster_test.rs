use serde_json::json;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use realtime_cell::{EventBus, Room, RoomBroadcaster, RoomEvent};

#[tokio::test]
async fn test_new_broadcaster_has_no_rooms() {
    let broadcaster = RoomBroadcaster::new();
    assert!(broadcaster.get_active_rooms().await.is_empty());

    let default_broadcaster = RoomBroadcaster::default();
    assert!(default_broadcaster.get_active_rooms().await.is_empty());
}

#[tokio::test]
async fn test_subscriber_receives_room_event() {
    let broadcaster = RoomBroadcaster::new();
    let room = Room::Practitioner(Uuid::new_v4()).to_string();
    let mut receiver = broadcaster.subscribe(&room).await;

    broadcaster
        .publish(&room, "patient_waiting", json!({"patient_id": "p-1"}))
        .await
        .unwrap();

    let message = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("should receive within timeout")
        .expect("channel should be open");
    let event: RoomEvent = serde_json::from_str(&message).unwrap();

    assert_eq!(event.room, room);
    assert_eq!(event.event, "patient_waiting");
    assert_eq!(event.payload["patient_id"], "p-1");
}

#[tokio::test]
async fn test_events_do_not_leak_across_rooms() {
    let broadcaster = RoomBroadcaster::new();
    let first = Room::Consultation(Uuid::new_v4()).to_string();
    let second = Room::Consultation(Uuid::new_v4()).to_string();

    let mut first_receiver = broadcaster.subscribe(&first).await;
    let _second_receiver = broadcaster.subscribe(&second).await;

    broadcaster
        .publish(&second, "consultation_ended", json!({}))
        .await
        .unwrap();

    let result = timeout(Duration::from_millis(100), first_receiver.recv()).await;
    assert!(result.is_err(), "first room must not see second room's events");
}

#[tokio::test]
async fn test_publish_without_subscribers_succeeds() {
    let broadcaster = RoomBroadcaster::new();

    let unopened = broadcaster
        .publish("consultation:nobody", "media_session_live", json!({}))
        .await;
    assert!(unopened.is_ok());

    let room = "consultation:abandoned".to_string();
    drop(broadcaster.subscribe(&room).await);
    let abandoned = broadcaster.publish(&room, "practitioner_joined", json!({})).await;
    assert!(abandoned.is_ok());
}

#[tokio::test]
async fn test_global_subscriber_sees_all_rooms() {
    let broadcaster = RoomBroadcaster::new();
    let mut global = broadcaster.subscribe_global();

    broadcaster.publish("consultation:a", "one", json!({})).await.unwrap();
    broadcaster.publish("practitioner:b", "two", json!({})).await.unwrap();

    let first: RoomEvent = serde_json::from_str(&global.recv().await.unwrap()).unwrap();
    let second: RoomEvent = serde_json::from_str(&global.recv().await.unwrap()).unwrap();

    assert_eq!(first.event, "one");
    assert_eq!(second.room, "practitioner:b");
}

#[tokio::test]
async fn test_clones_share_rooms() {
    let broadcaster = RoomBroadcaster::new();
    let clone = broadcaster.clone();
    let mut receiver = broadcaster.subscribe("consultation:shared").await;

    clone
        .publish("consultation:shared", "consultation_status", json!({"status": "ACTIVE"}))
        .await
        .unwrap();

    assert!(receiver.recv().await.is_ok());
    assert_eq!(clone.get_active_rooms().await, vec!["consultation:shared".to_string()]);
}

#[tokio::test]
async fn test_prune_idle_rooms() {
    let broadcaster = RoomBroadcaster::new();
    let _kept = broadcaster.subscribe("consultation:kept").await;
    drop(broadcaster.subscribe("consultation:idle").await);

    assert_eq!(broadcaster.prune_idle_rooms().await, 1);
    assert_eq!(broadcaster.get_active_rooms().await, vec!["consultation:kept".to_string()]);

    broadcaster.remove_room("consultation:kept").await;
    assert!(broadcaster.get_active_rooms().await.is_empty());
}
