//! SQLite-backed store via libsql. Implements StorePort with one database
//! file shared by all record kinds.
//!
//! WAL mode and synchronous=NORMAL, same settings as any concurrent
//! reader/writer workload wants. The appointments table keys on the
//! listing id, so the one-appointment-per-listing rule holds in the
//! schema itself.

use super::seed_users;
use crate::domain::{
    schedule_format, Appointment, DomainError, Message, Post, PostStatus, User,
};
use crate::ports::StorePort;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{params, Database};
use std::path::Path;
use tracing::info;

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT ''
)"#;

const POSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price INTEGER NOT NULL DEFAULT 0,
    image_url TEXT NOT NULL DEFAULT '',
    seller_id TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    appointment_id TEXT,
    created_at TEXT NOT NULL
)"#;
const POSTS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts (created_at DESC)";

/// PRIMARY KEY (post_id): at most one appointment per listing.
const APPOINTMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS appointments (
    post_id TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    buyer_id TEXT NOT NULL,
    seller_id TEXT NOT NULL,
    datetime TEXT NOT NULL,
    place TEXT NOT NULL,
    cancel_requested_by TEXT,
    created_at TEXT NOT NULL
)"#;

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    post_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
)"#;
const MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_post ON messages (post_id)";

/// SQLite store. One database file (market.db) in the given base directory.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Connect to (or create) the database, ensure the schema, and seed the
    /// demo users on first run. Call once at startup; share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Store(e.to_string()))?;
        let db_path = base.join("market.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Store(e.to_string()))?;

        // WAL enables concurrent readers + one writer; the PRAGMA returns a
        // row, so query and drain (execute fails when rows come back).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Store(format!("{pragma} failed: {e}")))?;
            while rows
                .next()
                .await
                .map_err(|e| DomainError::Store(e.to_string()))?
                .is_some()
            {}
        }

        for ddl in [
            USERS_TABLE,
            POSTS_TABLE,
            POSTS_INDEX,
            APPOINTMENTS_TABLE,
            MESSAGES_TABLE,
            MESSAGES_INDEX,
        ] {
            conn.execute(ddl, ())
                .await
                .map_err(|e| DomainError::Store(e.to_string()))?;
        }

        for user in seed_users() {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, name, address) VALUES (?1, ?2, ?3)",
                params![user.id, user.name, user.address],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        }

        info!(path = %db_path.display(), "SQLite store connected (WAL)");
        Ok(Self { db })
    }

    fn conn(&self) -> Result<libsql::Connection, DomainError> {
        self.db.connect().map_err(|e| DomainError::Store(e.to_string()))
    }

    fn status_to_str(status: PostStatus) -> &'static str {
        match status {
            PostStatus::Selling => "selling",
            PostStatus::Reserved => "reserved",
        }
    }

    fn status_from_str(s: &str) -> PostStatus {
        if s == "reserved" {
            PostStatus::Reserved
        } else {
            PostStatus::Selling
        }
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DomainError> {
        DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| DomainError::Store(format!("bad stored timestamp {s:?}: {e}")))
    }

    fn parse_instant(s: &str) -> Result<NaiveDateTime, DomainError> {
        NaiveDateTime::parse_from_str(s, schedule_format::FORMAT)
            .map_err(|e| DomainError::Store(format!("bad stored datetime {s:?}: {e}")))
    }

    fn post_from_row(row: &libsql::Row) -> Result<Post, DomainError> {
        let status: String = row.get(7).map_err(|e| DomainError::Store(e.to_string()))?;
        let created_at: String = row.get(9).map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(Post {
            id: row.get(0).map_err(|e| DomainError::Store(e.to_string()))?,
            title: row.get::<String>(1).unwrap_or_default(),
            description: row.get::<String>(2).unwrap_or_default(),
            price: row.get::<i64>(3).unwrap_or(0).max(0) as u64,
            image_url: row.get::<String>(4).unwrap_or_default(),
            seller_id: row.get(5).map_err(|e| DomainError::Store(e.to_string()))?,
            location: row.get::<String>(6).unwrap_or_default(),
            status: Self::status_from_str(&status),
            appointment_id: row.get(8).ok(),
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn appointment_from_row(row: &libsql::Row) -> Result<Appointment, DomainError> {
        let datetime: String = row.get(4).map_err(|e| DomainError::Store(e.to_string()))?;
        let created_at: String = row.get(7).map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(Appointment {
            post_id: row.get(0).map_err(|e| DomainError::Store(e.to_string()))?,
            id: row.get(1).map_err(|e| DomainError::Store(e.to_string()))?,
            buyer_id: row.get(2).map_err(|e| DomainError::Store(e.to_string()))?,
            seller_id: row.get(3).map_err(|e| DomainError::Store(e.to_string()))?,
            datetime: Self::parse_instant(&datetime)?,
            place: row.get::<String>(5).unwrap_or_default(),
            cancel_requested_by: row.get(6).ok(),
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn message_from_row(row: &libsql::Row) -> Result<Message, DomainError> {
        let created_at: String = row.get(5).map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(Message {
            id: row.get(0).map_err(|e| DomainError::Store(e.to_string()))?,
            post_id: row.get(1).map_err(|e| DomainError::Store(e.to_string()))?,
            sender_id: row.get(2).map_err(|e| DomainError::Store(e.to_string()))?,
            receiver_id: row.get(3).map_err(|e| DomainError::Store(e.to_string()))?,
            content: row.get::<String>(4).unwrap_or_default(),
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }
}

#[async_trait::async_trait]
impl StorePort for SqliteStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT id, name, address FROM users WHERE id = ?1", params![id])
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        else {
            return Ok(None);
        };
        Ok(Some(User {
            id: row.get(0).map_err(|e| DomainError::Store(e.to_string()))?,
            name: row.get::<String>(1).unwrap_or_default(),
            address: row.get::<String>(2).unwrap_or_default(),
        }))
    }

    async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT id, name, address FROM users ORDER BY id", ())
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let mut users = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            users.push(User {
                id: row.get(0).map_err(|e| DomainError::Store(e.to_string()))?,
                name: row.get::<String>(1).unwrap_or_default(),
                address: row.get::<String>(2).unwrap_or_default(),
            });
        }
        Ok(users)
    }

    async fn add_post(&self, post: Post) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO posts (id, title, description, price, image_url, seller_id, location, status, appointment_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                post.id,
                post.title,
                post.description,
                post.price as i64,
                post.image_url,
                post.seller_id,
                post.location,
                Self::status_to_str(post.status),
                post.appointment_id,
                post.created_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, title, description, price, image_url, seller_id, location, status, appointment_id, created_at
                FROM posts ORDER BY created_at DESC
                "#,
                (),
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let mut posts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            posts.push(Self::post_from_row(&row)?);
        }
        Ok(posts)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, title, description, price, image_url, seller_id, location, status, appointment_id, created_at
                FROM posts WHERE id = ?1
                "#,
                params![id],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::post_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_post_schedule(
        &self,
        post_id: &str,
        status: PostStatus,
        appointment_id: Option<String>,
    ) -> Result<Option<Post>, DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE posts SET status = ?1, appointment_id = ?2 WHERE id = ?3",
            params![Self::status_to_str(status), appointment_id, post_id],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        self.get_post(post_id).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        tx.execute("DELETE FROM messages WHERE post_id = ?1", params![post_id])
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        tx.execute(
            "DELETE FROM appointments WHERE post_id = ?1",
            params![post_id],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        let deleted = tx
            .execute("DELETE FROM posts WHERE id = ?1", params![post_id])
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn put_appointment(&self, appointment: Appointment) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO appointments (post_id, id, buyer_id, seller_id, datetime, place, cancel_requested_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                appointment.post_id,
                appointment.id,
                appointment.buyer_id,
                appointment.seller_id,
                appointment
                    .datetime
                    .format(schedule_format::FORMAT)
                    .to_string(),
                appointment.place,
                appointment.cancel_requested_by,
                appointment.created_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_appointment(&self, post_id: &str) -> Result<Option<Appointment>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT post_id, id, buyer_id, seller_id, datetime, place, cancel_requested_by, created_at
                FROM appointments WHERE post_id = ?1
                "#,
                params![post_id],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::appointment_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn remove_appointment(&self, post_id: &str) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM appointments WHERE post_id = ?1",
            params![post_id],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(())
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT post_id, id, buyer_id, seller_id, datetime, place, cancel_requested_by, created_at
                FROM appointments
                "#,
                (),
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let mut appointments = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            appointments.push(Self::appointment_from_row(&row)?);
        }
        Ok(appointments)
    }

    async fn append_message(&self, message: Message) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO messages (id, post_id, sender_id, receiver_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                message.id,
                message.post_id,
                message.sender_id,
                message.receiver_id,
                message.content,
                message.created_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| DomainError::Store(e.to_string()))?;
        Ok(())
    }

    async fn list_messages(&self, post_id: &str) -> Result<Vec<Message>, DomainError> {
        let conn = self.conn()?;
        // rowid keeps append order even for equal timestamps.
        let mut rows = conn
            .query(
                r#"
                SELECT id, post_id, sender_id, receiver_id, content, created_at
                FROM messages WHERE post_id = ?1 ORDER BY rowid
                "#,
                params![post_id],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?
        {
            messages.push(Self::message_from_row(&row)?);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn temp_store() -> SqliteStore {
        let dir = std::env::temp_dir().join(format!("swapmeet-sqlite-test-{}", Uuid::new_v4()));
        SqliteStore::connect(&dir).await.unwrap()
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            title: "test".into(),
            description: "desc".into(),
            price: 42,
            image_url: String::new(),
            seller_id: "user1".into(),
            location: "here".into(),
            status: PostStatus::Selling,
            appointment_id: None,
            created_at: Utc::now(),
        }
    }

    fn appointment(post_id: &str, id: &str) -> Appointment {
        Appointment {
            id: id.into(),
            post_id: post_id.into(),
            buyer_id: "user2".into(),
            seller_id: "user1".into(),
            datetime: crate::domain::parse_schedule_instant("2030-02-02T09:30").unwrap(),
            place: "market".into(),
            cancel_requested_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn connect_seeds_users_once() {
        let store = temp_store().await;
        assert_eq!(store.list_users().await.unwrap().len(), 2);
        let user = store.get_user("user1").await.unwrap().unwrap();
        assert_eq!(user.name, "Jiwoo Han");
    }

    #[tokio::test]
    async fn post_round_trip_and_schedule_update() {
        let store = temp_store().await;
        store.add_post(post("p1")).await.unwrap();

        let updated = store
            .set_post_schedule("p1", PostStatus::Reserved, Some("a1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PostStatus::Reserved);
        assert_eq!(updated.appointment_id.as_deref(), Some("a1"));

        let missing = store
            .set_post_schedule("ghost", PostStatus::Selling, None)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn appointment_replace_and_cancel_field() {
        let store = temp_store().await;
        store.add_post(post("p1")).await.unwrap();
        store.put_appointment(appointment("p1", "a1")).await.unwrap();

        let mut second = appointment("p1", "a2");
        second.cancel_requested_by = Some("user2".into());
        store.put_appointment(second).await.unwrap();

        let all = store.list_appointments().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "a2");
        assert_eq!(all[0].cancel_requested_by.as_deref(), Some("user2"));
        assert_eq!(
            all[0].datetime,
            crate::domain::parse_schedule_instant("2030-02-02T09:30").unwrap()
        );
    }

    #[tokio::test]
    async fn delete_post_cascades_everything() {
        let store = temp_store().await;
        store.add_post(post("p1")).await.unwrap();
        store.put_appointment(appointment("p1", "a1")).await.unwrap();
        store
            .append_message(Message {
                id: "m1".into(),
                post_id: "p1".into(),
                sender_id: "user2".into(),
                receiver_id: "user1".into(),
                content: "hi".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(store.delete_post("p1").await.unwrap());
        assert!(store.get_post("p1").await.unwrap().is_none());
        assert!(store.get_appointment("p1").await.unwrap().is_none());
        assert!(store.list_messages("p1").await.unwrap().is_empty());
        assert!(!store.delete_post("p1").await.unwrap());
    }

    #[tokio::test]
    async fn messages_keep_append_order() {
        let store = temp_store().await;
        store.add_post(post("p1")).await.unwrap();
        for (i, content) in ["one", "two", "three"].iter().enumerate() {
            store
                .append_message(Message {
                    id: format!("m{i}"),
                    post_id: "p1".into(),
                    sender_id: "user2".into(),
                    receiver_id: "user1".into(),
                    content: content.to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let contents: Vec<_> = store
            .list_messages("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["one", "two", "three"]);
    }
}
