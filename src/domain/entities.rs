//! Domain entities. Pure data structures for the marketplace core.
//!
//! No storage/transport types here — these are mapped from adapters.
//! Serialized field names are camelCase so durable state keeps the
//! layout the records were first written with.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketplace member. Seeded at first run; read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Default neighbourhood used when a listing omits its location.
    pub address: String,
}

/// Listing visibility. `Reserved` exactly while a live appointment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Selling,
    Reserved,
}

/// A sale listing. Status and appointment linkage are written only by the
/// appointment lifecycle; everything else is set at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: u64,
    pub image_url: String,
    pub seller_id: String,
    pub location: String,
    pub status: PostStatus,
    #[serde(default)]
    pub appointment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Scheduled meetup between a listing's seller and one buyer.
///
/// At most one exists per listing; re-scheduling replaces the record
/// wholesale. `cancel_requested_by`, when set, must name the buyer or the
/// seller — the appointment is then pending cancellation until the other
/// party confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub post_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Meetup instant, minute precision. Stored as `YYYY-MM-DDTHH:MM`.
    #[serde(with = "schedule_format")]
    pub datetime: NaiveDateTime,
    pub place: String,
    #[serde(default)]
    pub cancel_requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether `user_id` is the buyer or the seller of this meetup.
    pub fn is_participant(&self, user_id: &str) -> bool {
        user_id == self.buyer_id || user_id == self.seller_id
    }

    /// Cancellation negotiation phase, derived from the stored record.
    pub fn cancel_state(&self) -> CancelState {
        match &self.cancel_requested_by {
            Some(user_id) => CancelState::Pending {
                requested_by: user_id.clone(),
            },
            None => CancelState::Live,
        }
    }
}

/// Negotiation phase of a live appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelState {
    /// No cancellation requested.
    Live,
    /// One party asked to cancel; waiting for the other to confirm.
    Pending { requested_by: String },
}

/// Schedule state of one listing as a tagged view. Makes the three phases
/// explicit instead of spreading them over field presence checks.
#[derive(Debug, Clone)]
pub enum ScheduleState {
    /// No appointment; the listing is open for scheduling.
    Open,
    Scheduled(Appointment),
    PendingCancel(Appointment),
}

impl ScheduleState {
    pub fn of(appointment: Option<Appointment>) -> Self {
        match appointment {
            None => Self::Open,
            Some(a) if a.cancel_requested_by.is_some() => Self::PendingCancel(a),
            Some(a) => Self::Scheduled(a),
        }
    }
}

/// One chat message in a listing's room. Append-only; ordering is creation
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub post_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Draft fields a seller fills in before asking the AI gateway for copy.
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub title: String,
    pub price: Option<u64>,
    pub location: String,
    pub extra_description: String,
    /// Optional product photo, base64 without the data-URL prefix.
    pub image_base64: Option<String>,
    pub image_mime: String,
}

/// Generated sale copy: a one-line title and the body text.
#[derive(Debug, Clone)]
pub struct ListingCopy {
    pub title: String,
    pub body: String,
}

/// Serde format for meetup instants: `YYYY-MM-DDTHH:MM`.
pub mod schedule_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M";

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Parse a combined `YYYY-MM-DDTHH:MM` meetup instant.
pub fn parse_schedule_instant(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, schedule_format::FORMAT)
}
