//! Chat use case: history replay on join, persist-then-broadcast on post.
//!
//! A message is never broadcast unless it was durably appended first.
//! Display names are resolved at delivery time; unknown ids fall back to
//! the raw identifier.

use crate::domain::{DomainError, Message};
use crate::ports::StorePort;
use crate::usecases::room_hub::{ChatMessageView, RoomEvent, RoomHub, RoomSender, SubscriberId};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Chat service. Append-only per-listing message log plus room delivery.
pub struct ChatService {
    store: Arc<dyn StorePort>,
    hub: Arc<RoomHub>,
}

impl ChatService {
    pub fn new(store: Arc<dyn StorePort>, hub: Arc<RoomHub>) -> Self {
        Self { store, hub }
    }

    /// Join a listing's room. The full chronological history goes to the
    /// new subscriber as a single ordered delivery before anything else.
    pub async fn join(
        &self,
        post_id: &str,
        sender: RoomSender,
    ) -> Result<SubscriberId, DomainError> {
        let id = self.hub.join(post_id, sender).await;
        let history = self.enriched_history(post_id).await?;
        self.hub
            .send_to(post_id, id, RoomEvent::ChatHistory(history))
            .await;
        Ok(id)
    }

    pub async fn leave(&self, post_id: &str, id: SubscriberId) {
        self.hub.leave(post_id, id).await;
    }

    /// Post a chat message to a listing's room.
    ///
    /// Whitespace-only content is dropped silently (`Ok(None)`), a missing
    /// listing is `NotFound`. On success the persisted message is returned
    /// and the enriched version broadcast to every subscriber, sender
    /// included.
    pub async fn post_message(
        &self,
        post_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Option<Message>, DomainError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if self.store.get_post(post_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("listing {post_id}")));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.store.append_message(message.clone()).await?;

        let view = self.enrich(&message).await?;
        self.hub
            .broadcast(post_id, RoomEvent::ChatMessage(view))
            .await;
        debug!(post_id, sender_id, "chat message posted");
        Ok(Some(message))
    }

    /// Full message history of a listing with display names resolved.
    pub async fn enriched_history(
        &self,
        post_id: &str,
    ) -> Result<Vec<ChatMessageView>, DomainError> {
        let messages = self.store.list_messages(post_id).await?;
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let view = self.enrich(&message).await?;
            views.push(view);
        }
        Ok(views)
    }

    async fn enrich(&self, message: &Message) -> Result<ChatMessageView, DomainError> {
        Ok(ChatMessageView {
            sender_name: self.display_name(&message.sender_id).await?,
            receiver_name: self.display_name(&message.receiver_id).await?,
            message: message.clone(),
        })
    }

    async fn display_name(&self, user_id: &str) -> Result<String, DomainError> {
        Ok(self
            .store
            .get_user(user_id)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory::MemoryStore;
    use crate::domain::{Post, PostStatus};
    use tokio::sync::mpsc;

    async fn store_with_post() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::seeded());
        store
            .add_post(Post {
                id: "post-1".into(),
                title: "Used bike".into(),
                description: "rides fine".into(),
                price: 120,
                image_url: String::new(),
                seller_id: "user1".into(),
                location: "Mangwon-dong".into(),
                status: PostStatus::Selling,
                appointment_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn service(store: Arc<MemoryStore>) -> (ChatService, Arc<RoomHub>) {
        let hub = Arc::new(RoomHub::new());
        (ChatService::new(store, Arc::clone(&hub)), hub)
    }

    #[tokio::test]
    async fn join_replays_history_in_creation_order() {
        let store = store_with_post().await;
        let (chat, _hub) = service(Arc::clone(&store));
        for content in ["first", "second", "third"] {
            chat.post_message("post-1", "user2", "user1", content)
                .await
                .unwrap();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        chat.join("post-1", tx).await.unwrap();

        match rx.recv().await.unwrap() {
            RoomEvent::ChatHistory(history) => {
                let contents: Vec<_> =
                    history.iter().map(|v| v.message.content.as_str()).collect();
                assert_eq!(contents, ["first", "second", "third"]);
                assert_eq!(history[0].sender_name, "Minseo Kim");
                assert_eq!(history[0].receiver_name, "Jiwoo Han");
            }
            other => panic!("expected history first, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_only_content_is_dropped_silently() {
        let store = store_with_post().await;
        let (chat, hub) = service(Arc::clone(&store));
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("post-1", tx).await;

        let posted = chat
            .post_message("post-1", "user2", "user1", "   \t  ")
            .await
            .unwrap();

        assert!(posted.is_none());
        assert!(store.list_messages("post-1").await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn posting_to_a_missing_listing_is_not_found() {
        let store = store_with_post().await;
        let (chat, _hub) = service(store);
        let err = chat
            .post_message("no-such-post", "user2", "user1", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn message_is_persisted_before_everyone_sees_it() {
        let store = store_with_post().await;
        let (chat, hub) = service(Arc::clone(&store));
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.join("post-1", tx_a).await;
        hub.join("post-1", tx_b).await;

        let posted = chat
            .post_message("post-1", "user2", "user1", "  is it available?  ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(posted.content, "is it available?");
        let stored = store.list_messages("post-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, posted.id);

        // Both subscribers, sender's connection included, get the enriched copy.
        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                RoomEvent::ChatMessage(view) => {
                    assert_eq!(view.message.id, posted.id);
                    assert_eq!(view.sender_name, "Minseo Kim");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unknown_ids_fall_back_to_raw_identifier() {
        let store = store_with_post().await;
        let (chat, hub) = service(store);
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("post-1", tx).await;

        chat.post_message("post-1", "ghost-9", "user1", "hi")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            RoomEvent::ChatMessage(view) => assert_eq!(view.sender_name, "ghost-9"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
