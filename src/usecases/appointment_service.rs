//! Appointment lifecycle: scheduling, two-party cancellation, listing status.
//!
//! One live appointment per listing; scheduling again replaces the old one
//! wholesale (last caller wins). Cancellation needs both parties: one
//! requests, the *other* confirms, and confirmation always ends with the
//! appointment gone — there is no way back to plain Scheduled and no way to
//! withdraw a request.
//!
//! All mutations for a given listing are serialized behind a per-listing
//! gate so discard-then-replace and disarm-then-arm stay atomic with
//! respect to concurrent callers. Listing status is written here and
//! nowhere else: `Reserved` exactly while an appointment exists.

use crate::domain::{
    parse_schedule_instant, Appointment, CancelState, DomainError, PostStatus, ScheduleState,
};
use crate::ports::StorePort;
use crate::usecases::reminder_service::ReminderService;
use crate::usecases::room_hub::{RoomHub, SystemKind};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Fields of a scheduling request. Date and time arrive separately and are
/// combined into the stored `YYYY-MM-DDTHH:MM` instant.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub buyer_id: String,
    pub date: String,
    pub time: String,
    pub place: String,
}

/// Appointment service. Owns appointment records, the listing status that
/// mirrors them, and the ordering of reminder arm/disarm around both.
pub struct AppointmentService {
    store: Arc<dyn StorePort>,
    reminders: Arc<ReminderService>,
    hub: Arc<RoomHub>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn StorePort>,
        reminders: Arc<ReminderService>,
        hub: Arc<RoomHub>,
    ) -> Self {
        Self {
            store,
            reminders,
            hub,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Per-listing serialization point for every mutation below.
    async fn gate(&self, post_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(post_id.to_string()).or_default())
    }

    /// Schedule (or replace) the meetup for a listing. Any existing
    /// appointment is discarded first; overwriting is not an error.
    pub async fn schedule(
        &self,
        post_id: &str,
        request: ScheduleRequest,
    ) -> Result<Appointment, DomainError> {
        let gate = self.gate(post_id).await;
        let _guard = gate.lock().await;

        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("listing {post_id}")))?;

        if request.buyer_id.trim().is_empty()
            || request.date.trim().is_empty()
            || request.time.trim().is_empty()
            || request.place.trim().is_empty()
        {
            return Err(DomainError::Validation(
                "buyer, date, time and place are all required".into(),
            ));
        }
        let datetime = parse_schedule_instant(&format!(
            "{}T{}",
            request.date.trim(),
            request.time.trim()
        ))
        .map_err(|e| DomainError::Validation(format!("bad meetup datetime: {e}")))?;

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            post_id: post.id.clone(),
            buyer_id: request.buyer_id.trim().to_string(),
            seller_id: post.seller_id.clone(),
            datetime,
            place: request.place.trim().to_string(),
            cancel_requested_by: None,
            created_at: Utc::now(),
        };

        self.store.put_appointment(appointment.clone()).await?;
        self.store
            .set_post_schedule(&post.id, PostStatus::Reserved, Some(appointment.id.clone()))
            .await?;
        self.reminders.arm(&appointment).await;

        info!(
            post_id = %post.id,
            appointment_id = %appointment.id,
            at = %appointment.datetime,
            "meetup scheduled"
        );
        self.hub
            .announce_system(
                &post.id,
                SystemKind::Appointment,
                format!(
                    "Meetup scheduled: {} @ {}",
                    appointment.datetime.format("%Y-%m-%d %H:%M"),
                    appointment.place
                ),
            )
            .await;

        Ok(appointment)
    }

    /// Current appointment for a listing, if any.
    pub async fn get(&self, post_id: &str) -> Result<Option<Appointment>, DomainError> {
        self.store.get_appointment(post_id).await
    }

    /// Schedule state of a listing as a tagged view.
    pub async fn state(&self, post_id: &str) -> Result<ScheduleState, DomainError> {
        Ok(ScheduleState::of(self.store.get_appointment(post_id).await?))
    }

    /// Ask to cancel the meetup. Only a participant may ask; one request
    /// may be outstanding at a time. Asking again while your own request
    /// is pending is a no-op success.
    pub async fn request_cancellation(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Appointment, DomainError> {
        let gate = self.gate(post_id).await;
        let _guard = gate.lock().await;

        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("listing {post_id}")))?;
        let mut appointment = self
            .store
            .get_appointment(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("no meetup booked for {post_id}")))?;

        if !appointment.is_participant(user_id) {
            return Err(DomainError::Forbidden(
                "only meetup participants may request cancellation".into(),
            ));
        }
        match appointment.cancel_state() {
            CancelState::Pending { requested_by } if requested_by == user_id => {
                return Ok(appointment);
            }
            CancelState::Pending { .. } => {
                return Err(DomainError::Conflict(
                    "waiting for the other party to agree".into(),
                ));
            }
            CancelState::Live => {}
        }

        appointment.cancel_requested_by = Some(user_id.to_string());
        self.store.put_appointment(appointment.clone()).await?;

        info!(post_id, user_id, "meetup cancellation requested");
        self.hub
            .announce_system(
                post_id,
                SystemKind::Appointment,
                "Cancellation requested. The meetup is dropped once the other party agrees.",
            )
            .await;
        Ok(appointment)
    }

    /// Agree to a pending cancellation. The confirming user must be the
    /// participant who did *not* request it; success deletes the
    /// appointment, reopens the listing and disarms the reminder.
    pub async fn confirm_cancellation(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<(), DomainError> {
        let gate = self.gate(post_id).await;
        let _guard = gate.lock().await;

        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("listing {post_id}")))?;
        let appointment = self
            .store
            .get_appointment(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("no meetup booked for {post_id}")))?;

        if !appointment.is_participant(user_id) {
            return Err(DomainError::Forbidden(
                "only the other meetup participant may confirm".into(),
            ));
        }
        match appointment.cancel_state() {
            CancelState::Live => {
                return Err(DomainError::Conflict(
                    "no cancellation has been requested".into(),
                ));
            }
            CancelState::Pending { requested_by } if requested_by == user_id => {
                return Err(DomainError::Conflict(
                    "the other party has to agree, not the requester".into(),
                ));
            }
            CancelState::Pending { .. } => {}
        }

        self.store.remove_appointment(post_id).await?;
        self.store
            .set_post_schedule(&post.id, PostStatus::Selling, None)
            .await?;
        self.reminders.disarm(post_id).await;

        info!(post_id, user_id, "meetup cancelled by mutual agreement");
        self.hub
            .announce_system(
                post_id,
                SystemKind::Appointment,
                "The meetup was cancelled. Schedule a new one or update the listing.",
            )
            .await;
        Ok(())
    }

    /// Delete a listing. Seller-only, and blocked while a meetup is still
    /// booked — the parties have to cancel it first. Cascades messages and
    /// appointment, then disarms any reminder.
    pub async fn delete_listing(&self, post_id: &str, user_id: &str) -> Result<(), DomainError> {
        let gate = self.gate(post_id).await;
        let _guard = gate.lock().await;

        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("listing {post_id}")))?;
        if post.seller_id != user_id {
            return Err(DomainError::Forbidden(
                "only the seller may delete a listing".into(),
            ));
        }
        if post.status == PostStatus::Reserved
            && self.store.get_appointment(post_id).await?.is_some()
        {
            return Err(DomainError::Conflict(
                "cancel the meetup before deleting the listing".into(),
            ));
        }

        self.store.delete_post(post_id).await?;
        self.reminders.disarm(post_id).await;
        info!(post_id, "listing deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory::MemoryStore;
    use crate::domain::Post;
    use crate::usecases::room_hub::RoomEvent;
    use chrono::{Duration as ChronoDuration, Local};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: AppointmentService,
        hub: Arc<RoomHub>,
        reminders: Arc<ReminderService>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::seeded());
        store
            .add_post(Post {
                id: "post-1".into(),
                title: "Reading lamp".into(),
                description: "warm light".into(),
                price: 15,
                image_url: String::new(),
                seller_id: "user1".into(),
                location: "Sang-dong".into(),
                status: PostStatus::Selling,
                appointment_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let hub = Arc::new(RoomHub::new());
        let reminders = Arc::new(ReminderService::new(Arc::clone(&hub)));
        let service = AppointmentService::new(
            Arc::clone(&store) as Arc<dyn StorePort>,
            Arc::clone(&reminders),
            Arc::clone(&hub),
        );
        Fixture {
            store,
            service,
            hub,
            reminders,
        }
    }

    fn request(buyer: &str) -> ScheduleRequest {
        ScheduleRequest {
            buyer_id: buyer.into(),
            date: "2030-01-01".into(),
            time: "10:00".into(),
            place: "Hongdae Station exit 3".into(),
        }
    }

    #[tokio::test]
    async fn scheduling_reserves_the_listing_and_links_the_appointment() {
        let fx = fixture().await;
        let appointment = fx.service.schedule("post-1", request("user2")).await.unwrap();

        assert_eq!(appointment.seller_id, "user1");
        assert_eq!(
            appointment.datetime,
            parse_schedule_instant("2030-01-01T10:00").unwrap()
        );

        let post = fx.store.get_post("post-1").await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Reserved);
        assert_eq!(post.appointment_id.as_deref(), Some(appointment.id.as_str()));
        assert_eq!(fx.reminders.armed_count().await, 1);
    }

    #[tokio::test]
    async fn scheduling_announces_to_the_room() {
        let fx = fixture().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        fx.hub.join("post-1", tx).await;

        fx.service.schedule("post-1", request("user2")).await.unwrap();

        match rx.recv().await.unwrap() {
            RoomEvent::SystemMessage(note) => {
                assert_eq!(note.kind, SystemKind::Appointment);
                assert!(note.content.contains("2030-01-01 10:00"));
                assert!(note.content.contains("Hongdae Station exit 3"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn rescheduling_fully_supersedes_the_old_appointment() {
        let fx = fixture().await;
        let first = fx.service.schedule("post-1", request("user2")).await.unwrap();
        let second = fx
            .service
            .schedule(
                "post-1",
                ScheduleRequest {
                    time: "18:30".into(),
                    ..request("user2")
                },
            )
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        let stored = fx.store.get_appointment("post-1").await.unwrap().unwrap();
        assert_eq!(stored.id, second.id);
        // The old id is unreachable and only one timer is pending.
        assert_eq!(fx.store.list_appointments().await.unwrap().len(), 1);
        assert_eq!(fx.reminders.armed_count().await, 1);
        let post = fx.store.get_post("post-1").await.unwrap().unwrap();
        assert_eq!(post.appointment_id.as_deref(), Some(second.id.as_str()));
    }

    #[tokio::test]
    async fn rescheduling_clears_a_pending_cancellation() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();
        fx.service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();

        fx.service.schedule("post-1", request("user2")).await.unwrap();

        let state = fx.service.state("post-1").await.unwrap();
        assert!(matches!(state, ScheduleState::Scheduled(_)));
    }

    #[tokio::test]
    async fn scheduling_rejects_missing_fields_and_bad_datetimes() {
        let fx = fixture().await;

        let err = fx
            .service
            .schedule(
                "post-1",
                ScheduleRequest {
                    place: "  ".into(),
                    ..request("user2")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = fx
            .service
            .schedule(
                "post-1",
                ScheduleRequest {
                    date: "2030-13-99".into(),
                    ..request("user2")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Nothing was booked along the way.
        assert!(fx.store.get_appointment("post-1").await.unwrap().is_none());
        let post = fx.store.get_post("post-1").await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Selling);
    }

    #[tokio::test]
    async fn scheduling_on_a_missing_listing_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .schedule("ghost", request("user2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn scheduling_in_the_past_arms_an_immediate_reminder() {
        let fx = fixture().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        fx.hub.join("post-1", tx).await;

        let yesterday = Local::now().naive_local() - ChronoDuration::days(1);
        fx.service
            .schedule(
                "post-1",
                ScheduleRequest {
                    date: yesterday.format("%Y-%m-%d").to_string(),
                    time: yesterday.format("%H:%M").to_string(),
                    ..request("user2")
                },
            )
            .await
            .unwrap();

        // Both the schedule announcement and the zero-delay reminder arrive.
        let mut kinds = Vec::new();
        for _ in 0..2 {
            match timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(RoomEvent::SystemMessage(note))) => kinds.push(note.kind),
                other => panic!("expected system message, got {other:?}"),
            }
        }
        assert!(kinds.contains(&SystemKind::Appointment));
        assert!(kinds.contains(&SystemKind::Reminder));
    }

    #[tokio::test]
    async fn cancellation_negotiation_happy_path() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();

        let pending = fx
            .service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();
        assert_eq!(pending.cancel_requested_by.as_deref(), Some("user2"));

        fx.service
            .confirm_cancellation("post-1", "user1")
            .await
            .unwrap();

        assert!(fx.store.get_appointment("post-1").await.unwrap().is_none());
        let post = fx.store.get_post("post-1").await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Selling);
        assert!(post.appointment_id.is_none());
        assert_eq!(fx.reminders.armed_count().await, 0);
    }

    #[tokio::test]
    async fn only_one_cancellation_request_may_be_outstanding() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();
        fx.service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();

        let err = fx
            .service
            .request_cancellation("post-1", "user1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn re_requesting_by_the_same_user_is_a_noop_success() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();
        let first = fx
            .service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        fx.hub.join("post-1", tx).await;
        let again = fx
            .service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();

        assert_eq!(again.cancel_requested_by, first.cancel_requested_by);
        assert_eq!(again.id, first.id);
        // No second announcement for a request that changed nothing.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outsiders_may_not_touch_the_negotiation() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();

        let err = fx
            .service
            .request_cancellation("post-1", "stranger")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        fx.service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();
        let err = fx
            .service
            .confirm_cancellation("post-1", "stranger")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn the_requester_cannot_confirm_their_own_request() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();
        fx.service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();

        let err = fx
            .service
            .confirm_cancellation("post-1", "user2")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        // Still pending; the other party can still settle it.
        assert!(matches!(
            fx.service.state("post-1").await.unwrap(),
            ScheduleState::PendingCancel(_)
        ));
    }

    #[tokio::test]
    async fn confirming_without_a_request_is_a_conflict() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();

        let err = fx
            .service
            .confirm_cancellation("post-1", "user1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancellation_ops_without_an_appointment_are_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        let err = fx
            .service
            .confirm_cancellation("post-1", "user1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_reserved_listing_is_blocked_until_cancelled() {
        let fx = fixture().await;
        fx.service.schedule("post-1", request("user2")).await.unwrap();

        let err = fx
            .service
            .delete_listing("post-1", "user1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        fx.service
            .request_cancellation("post-1", "user2")
            .await
            .unwrap();
        fx.service
            .confirm_cancellation("post-1", "user1")
            .await
            .unwrap();
        fx.service.delete_listing("post-1", "user1").await.unwrap();

        assert!(fx.store.get_post("post-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_the_seller_may_delete() {
        let fx = fixture().await;
        let err = fx
            .service
            .delete_listing("post-1", "user2")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn deleting_cascades_messages_and_appointment() {
        let fx = fixture().await;
        fx.store
            .append_message(crate::domain::Message {
                id: "m1".into(),
                post_id: "post-1".into(),
                sender_id: "user2".into(),
                receiver_id: "user1".into(),
                content: "still there?".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        fx.service.delete_listing("post-1", "user1").await.unwrap();

        assert!(fx.store.list_messages("post-1").await.unwrap().is_empty());
        assert!(fx.store.get_appointment("post-1").await.unwrap().is_none());
    }
}
