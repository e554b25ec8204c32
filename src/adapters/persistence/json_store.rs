//! Implements StorePort over a single JSON file.
//!
//! The whole record collection lives in one file; every mutation rewrites
//! it with the write-replace pattern so a crash mid-write can never leave
//! a torn file behind. Matches the storage layout the records were first
//! written with, so an existing `storage.json` loads as-is.

use super::StoreData;
use crate::domain::{Appointment, DomainError, Message, Post, PostStatus, User};
use crate::ports::StorePort;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::warn;

/// JSON file-backed store.
pub struct JsonStore {
    path: std::path::PathBuf,
    cache: RwLock<StoreData>,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(StoreData::default()),
        }
    }

    /// Load state from disk. A missing file starts from the seeded demo
    /// data; an unreadable one is logged and also replaced by seed data.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "store file unreadable, starting from seed data");
                    StoreData::seeded()
                }
            },
            Err(_) => StoreData::seeded(),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    /// Atomic save using the write-replace pattern:
    /// 1. Write to temp file
    /// 2. sync_all() to ensure flush to disk
    /// 3. Atomic rename to target path
    async fn save(&self) -> Result<(), DomainError> {
        let json = {
            let data = self.cache.read().await;
            serde_json::to_string_pretty(&*data).map_err(|e| DomainError::Store(e.to_string()))?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Store(format!("create store dir: {e}")))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Store(format!("create temp file: {e}")))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Store(format!("write temp file: {e}")))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Store(format!("sync temp file: {e}")))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Store(format!("atomic rename failed: {e}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorePort for JsonStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, DomainError> {
        Ok(self.cache.read().await.get_user(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        Ok(self.cache.read().await.users.clone())
    }

    async fn add_post(&self, post: Post) -> Result<(), DomainError> {
        self.cache.write().await.posts.push(post);
        self.save().await
    }

    async fn list_posts(&self) -> Result<Vec<Post>, DomainError> {
        Ok(self.cache.read().await.list_posts())
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, DomainError> {
        Ok(self.cache.read().await.get_post(id))
    }

    async fn set_post_schedule(
        &self,
        post_id: &str,
        status: PostStatus,
        appointment_id: Option<String>,
    ) -> Result<Option<Post>, DomainError> {
        let updated = self
            .cache
            .write()
            .await
            .set_post_schedule(post_id, status, appointment_id);
        if updated.is_some() {
            self.save().await?;
        }
        Ok(updated)
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, DomainError> {
        let deleted = self.cache.write().await.delete_post(post_id);
        if deleted {
            self.save().await?;
        }
        Ok(deleted)
    }

    async fn put_appointment(&self, appointment: Appointment) -> Result<(), DomainError> {
        self.cache.write().await.put_appointment(appointment);
        self.save().await
    }

    async fn get_appointment(&self, post_id: &str) -> Result<Option<Appointment>, DomainError> {
        Ok(self.cache.read().await.get_appointment(post_id))
    }

    async fn remove_appointment(&self, post_id: &str) -> Result<(), DomainError> {
        self.cache.write().await.remove_appointment(post_id);
        self.save().await
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, DomainError> {
        Ok(self.cache.read().await.appointments.clone())
    }

    async fn append_message(&self, message: Message) -> Result<(), DomainError> {
        self.cache.write().await.messages.push(message);
        self.save().await
    }

    async fn list_messages(&self, post_id: &str) -> Result<Vec<Message>, DomainError> {
        Ok(self.cache.read().await.list_messages(post_id))
    }
}
