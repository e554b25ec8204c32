//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Appointment, DomainError, ListingCopy, ListingDraft, Message, Post, PostStatus, User,
};

/// Durable store for marketplace records. Single source of truth: services
/// read current state through it on every operation instead of caching
/// across calls. All calls are durable on return; failures map to
/// `DomainError::Store` and abort the operation without partial state.
#[async_trait::async_trait]
pub trait StorePort: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, DomainError>;
    async fn list_users(&self) -> Result<Vec<User>, DomainError>;

    async fn add_post(&self, post: Post) -> Result<(), DomainError>;
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, DomainError>;
    async fn get_post(&self, id: &str) -> Result<Option<Post>, DomainError>;

    /// Update one post's status/appointment linkage. Returns the updated
    /// post, or `None` when it does not exist.
    async fn set_post_schedule(
        &self,
        post_id: &str,
        status: PostStatus,
        appointment_id: Option<String>,
    ) -> Result<Option<Post>, DomainError>;

    /// Delete a post, cascading its messages and appointment. Returns
    /// `false` when no such post existed.
    async fn delete_post(&self, post_id: &str) -> Result<bool, DomainError>;

    /// Insert the appointment, replacing any existing one for the same
    /// listing. The old record is discarded, not archived.
    async fn put_appointment(&self, appointment: Appointment) -> Result<(), DomainError>;
    async fn get_appointment(&self, post_id: &str) -> Result<Option<Appointment>, DomainError>;
    /// Remove the appointment for a listing; no-op when none exists.
    async fn remove_appointment(&self, post_id: &str) -> Result<(), DomainError>;
    /// Every live appointment. Used for reminder recovery at startup.
    async fn list_appointments(&self) -> Result<Vec<Appointment>, DomainError>;

    async fn append_message(&self, message: Message) -> Result<(), DomainError>;
    /// Messages of one listing in creation order.
    async fn list_messages(&self, post_id: &str) -> Result<Vec<Message>, DomainError>;
}

/// LLM gateway producing sale copy from a listing draft. Lives outside the
/// per-listing serialization path of the appointment core.
#[async_trait::async_trait]
pub trait AiPort: Send + Sync {
    async fn generate_listing(&self, draft: &ListingDraft) -> Result<ListingCopy, DomainError>;
}
