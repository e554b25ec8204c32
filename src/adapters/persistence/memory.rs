//! In-memory store. Backs tests and throwaway demo runs; nothing survives
//! the process.

use super::StoreData;
use crate::domain::{Appointment, DomainError, Message, Post, PostStatus, User};
use crate::ports::StorePort;
use tokio::sync::RwLock;

/// Volatile `StorePort` implementation.
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    /// Empty store, no users.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
        }
    }

    /// Store with the demo users seeded.
    pub fn seeded() -> Self {
        Self {
            data: RwLock::new(StoreData::seeded()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorePort for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, DomainError> {
        Ok(self.data.read().await.get_user(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        Ok(self.data.read().await.users.clone())
    }

    async fn add_post(&self, post: Post) -> Result<(), DomainError> {
        self.data.write().await.posts.push(post);
        Ok(())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, DomainError> {
        Ok(self.data.read().await.list_posts())
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, DomainError> {
        Ok(self.data.read().await.get_post(id))
    }

    async fn set_post_schedule(
        &self,
        post_id: &str,
        status: PostStatus,
        appointment_id: Option<String>,
    ) -> Result<Option<Post>, DomainError> {
        Ok(self
            .data
            .write()
            .await
            .set_post_schedule(post_id, status, appointment_id))
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, DomainError> {
        Ok(self.data.write().await.delete_post(post_id))
    }

    async fn put_appointment(&self, appointment: Appointment) -> Result<(), DomainError> {
        self.data.write().await.put_appointment(appointment);
        Ok(())
    }

    async fn get_appointment(&self, post_id: &str) -> Result<Option<Appointment>, DomainError> {
        Ok(self.data.read().await.get_appointment(post_id))
    }

    async fn remove_appointment(&self, post_id: &str) -> Result<(), DomainError> {
        self.data.write().await.remove_appointment(post_id);
        Ok(())
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, DomainError> {
        Ok(self.data.read().await.appointments.clone())
    }

    async fn append_message(&self, message: Message) -> Result<(), DomainError> {
        self.data.write().await.messages.push(message);
        Ok(())
    }

    async fn list_messages(&self, post_id: &str) -> Result<Vec<Message>, DomainError> {
        Ok(self.data.read().await.list_messages(post_id))
    }
}
