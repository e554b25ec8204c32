//! Room registry and event fan-out. One room per listing.
//!
//! Delivery is best-effort to whoever is subscribed right now; a room
//! nobody watches drops the event. Subscribers hand in the sender half of
//! an unbounded channel and keep the receiver.

use crate::domain::Message;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Sender half a subscriber registers with the hub.
pub type RoomSender = mpsc::UnboundedSender<RoomEvent>;

/// Handle identifying one subscription; needed to leave the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Kind tag on system notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    Appointment,
    Reminder,
}

/// Unpersisted notification narrating a state transition to the room.
#[derive(Debug, Clone, Serialize)]
pub struct SystemNote {
    #[serde(rename = "type")]
    pub kind: SystemKind,
    pub content: String,
}

/// Message enriched with resolved display names for delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub receiver_name: String,
}

/// Events delivered to room subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomEvent {
    /// Full chronological history, replayed once to a new subscriber.
    ChatHistory(Vec<ChatMessageView>),
    ChatMessage(ChatMessageView),
    SystemMessage(SystemNote),
}

/// Process-wide room registry: listing id -> current subscribers.
pub struct RoomHub {
    rooms: RwLock<HashMap<String, HashMap<u64, RoomSender>>>,
    next_id: AtomicU64,
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber with a listing's room.
    pub async fn join(&self, post_id: &str, sender: RoomSender) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(post_id.to_string())
            .or_default()
            .insert(id, sender);
        debug!(post_id, subscriber = id, "joined room");
        SubscriberId(id)
    }

    /// Remove a subscriber; the room itself is dropped once empty.
    pub async fn leave(&self, post_id: &str, id: SubscriberId) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(post_id) {
            members.remove(&id.0);
            if members.is_empty() {
                rooms.remove(post_id);
            }
        }
        debug!(post_id, subscriber = id.0, "left room");
    }

    /// Deliver to every current subscriber of the room. Subscribers whose
    /// receiver is gone are pruned on the way.
    pub async fn broadcast(&self, post_id: &str, event: RoomEvent) {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(post_id) else {
            return;
        };
        members.retain(|_, sender| sender.send(event.clone()).is_ok());
        if members.is_empty() {
            rooms.remove(post_id);
        }
    }

    /// Deliver to a single subscriber (history replay on join).
    pub async fn send_to(&self, post_id: &str, id: SubscriberId, event: RoomEvent) {
        let rooms = self.rooms.read().await;
        if let Some(sender) = rooms.get(post_id).and_then(|m| m.get(&id.0)) {
            let _ = sender.send(event);
        }
    }

    /// Broadcast a system notification to the room.
    pub async fn announce_system(&self, post_id: &str, kind: SystemKind, content: impl Into<String>) {
        self.broadcast(
            post_id,
            RoomEvent::SystemMessage(SystemNote {
                kind,
                content: content.into(),
            }),
        )
        .await;
    }

    /// Current subscriber count for a room.
    pub async fn room_size(&self, post_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(post_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = RoomHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.join("post-1", tx1).await;
        hub.join("post-1", tx2).await;

        hub.announce_system("post-1", SystemKind::Reminder, "time to go")
            .await;

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                RoomEvent::SystemMessage(note) => {
                    assert_eq!(note.kind, SystemKind::Reminder);
                    assert_eq!(note.content, "time to go");
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn events_are_scoped_to_the_room() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("post-1", tx).await;

        hub.announce_system("post-2", SystemKind::Appointment, "elsewhere")
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_stops_delivery_and_drops_empty_rooms() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.join("post-1", tx).await;
        assert_eq!(hub.room_size("post-1").await, 1);

        hub.leave("post-1", id).await;
        hub.announce_system("post-1", SystemKind::Appointment, "gone")
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(hub.room_size("post-1").await, 0);
    }

    #[tokio::test]
    async fn closed_receivers_are_pruned_on_broadcast() {
        let hub = RoomHub::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        hub.join("post-1", tx_dead).await;
        hub.join("post-1", tx_live).await;
        drop(rx_dead);

        hub.announce_system("post-1", SystemKind::Reminder, "ping")
            .await;

        assert!(rx_live.recv().await.is_some());
        assert_eq!(hub.room_size("post-1").await, 1);
    }
}
