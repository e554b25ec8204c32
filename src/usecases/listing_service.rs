//! Listing glue: creation, browsing, the detail view, AI-drafted copy.
//!
//! Everything here is plain read/write over the store; appointment-coupled
//! mutations (status, deletion) live with the appointment service.

use crate::domain::{
    Appointment, DomainError, ListingCopy, ListingDraft, Post, PostStatus, User,
};
use crate::ports::{AiPort, StorePort};
use crate::usecases::chat_service::ChatService;
use crate::usecases::room_hub::ChatMessageView;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Placeholder shown for listings posted without a photo.
pub const DEFAULT_IMAGE: &str = "images/placeholder.jpg";

/// Fields for creating a listing.
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: u64,
    pub image_url: Option<String>,
    pub seller_id: String,
    /// Falls back to the seller's default address when empty.
    pub location: Option<String>,
}

/// One listing with everything its page shows: enriched chat history and
/// the current appointment snapshot.
#[derive(Debug)]
pub struct ListingDetail {
    pub post: Post,
    pub messages: Vec<ChatMessageView>,
    pub appointment: Option<Appointment>,
}

/// Listing service.
pub struct ListingService {
    store: Arc<dyn StorePort>,
    ai: Arc<dyn AiPort>,
    chat: Arc<ChatService>,
}

impl ListingService {
    pub fn new(store: Arc<dyn StorePort>, ai: Arc<dyn AiPort>, chat: Arc<ChatService>) -> Self {
        Self { store, ai, chat }
    }

    /// Create a listing for a seller. New listings always start `Selling`
    /// with no appointment linkage.
    pub async fn create(&self, new: NewListing) -> Result<Post, DomainError> {
        if new.title.trim().is_empty() {
            return Err(DomainError::Validation("a title is required".into()));
        }
        let seller = self
            .store
            .get_user(&new.seller_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {}", new.seller_id)))?;

        let location = new
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| seller.address.clone());
        let post = Post {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            description: new.description,
            price: new.price,
            image_url: new.image_url.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            seller_id: seller.id.clone(),
            location,
            status: PostStatus::Selling,
            appointment_id: None,
            created_at: Utc::now(),
        };
        self.store.add_post(post.clone()).await?;
        info!(post_id = %post.id, seller_id = %seller.id, "listing created");
        Ok(post)
    }

    /// All listings, newest first.
    pub async fn browse(&self) -> Result<Vec<Post>, DomainError> {
        self.store.list_posts().await
    }

    pub async fn sellers(&self) -> Result<Vec<User>, DomainError> {
        self.store.list_users().await
    }

    /// The detail page of one listing.
    pub async fn detail(&self, post_id: &str) -> Result<ListingDetail, DomainError> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("listing {post_id}")))?;
        let messages = self.chat.enriched_history(post_id).await?;
        let appointment = self.store.get_appointment(post_id).await?;
        Ok(ListingDetail {
            post,
            messages,
            appointment,
        })
    }

    /// Draft sale copy through the AI gateway.
    pub async fn generate_copy(&self, draft: &ListingDraft) -> Result<ListingCopy, DomainError> {
        self.ai.generate_listing(draft).await
    }
}
