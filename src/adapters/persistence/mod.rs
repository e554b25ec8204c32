//! Store adapters. Implement `StorePort` over JSON, SQLite, or memory.
//!
//! All three share `StoreData`, the plain record collection that is also
//! the JSON file layout. First-run stores seed the demo users.

use crate::domain::{Appointment, Message, Post, PostStatus, User};
use serde::{Deserialize, Serialize};

pub mod json_store;
pub mod memory;
pub mod sqlite_store;

pub use json_store::JsonStore;
pub use memory::MemoryStore;
pub use sqlite_store::SqliteStore;

/// Demo users present in every fresh store.
pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: "user1".into(),
            name: "Jiwoo Han".into(),
            address: "Mangwon-dong, Mapo-gu, Seoul".into(),
        },
        User {
            id: "user2".into(),
            name: "Minseo Kim".into(),
            address: "Sang-dong, Bucheon, Gyeonggi".into(),
        },
    ]
}

/// Full record collection. Doubles as the JSON file layout.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl StoreData {
    pub fn seeded() -> Self {
        Self {
            users: seed_users(),
            ..Self::default()
        }
    }

    pub fn get_user(&self, id: &str) -> Option<User> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn list_posts(&self) -> Vec<Post> {
        let mut posts = self.posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }

    pub fn get_post(&self, id: &str) -> Option<Post> {
        self.posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn set_post_schedule(
        &mut self,
        post_id: &str,
        status: PostStatus,
        appointment_id: Option<String>,
    ) -> Option<Post> {
        let post = self.posts.iter_mut().find(|p| p.id == post_id)?;
        post.status = status;
        post.appointment_id = appointment_id;
        Some(post.clone())
    }

    /// Cascades messages and the appointment along with the post.
    pub fn delete_post(&mut self, post_id: &str) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != post_id);
        self.messages.retain(|m| m.post_id != post_id);
        self.appointments.retain(|a| a.post_id != post_id);
        self.posts.len() != before
    }

    /// Replaces any existing appointment for the same listing.
    pub fn put_appointment(&mut self, appointment: Appointment) {
        self.appointments.retain(|a| a.post_id != appointment.post_id);
        self.appointments.push(appointment);
    }

    pub fn get_appointment(&self, post_id: &str) -> Option<Appointment> {
        self.appointments
            .iter()
            .find(|a| a.post_id == post_id)
            .cloned()
    }

    pub fn remove_appointment(&mut self, post_id: &str) {
        self.appointments.retain(|a| a.post_id != post_id);
    }

    pub fn list_messages(&self, post_id: &str) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.post_id == post_id)
            .cloned()
            .collect()
    }
}
