//! Appointment reminder timers. At most one armed timer per listing.
//!
//! Timers are in-process tokio tasks; durable appointments re-arm them at
//! startup via `recover`. Arming unconditionally replaces any previous
//! timer for the listing, so a reschedule can never leave two reminders
//! pending. A disarm that loses the race with an in-flight fire is benign:
//! the fired notification stands.

use crate::domain::{Appointment, DomainError};
use crate::ports::StorePort;
use crate::usecases::room_hub::{RoomHub, SystemKind};
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const REMINDER_TEXT: &str = "Your meetup time has arrived. Meet up and trade safely!";

struct Job {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Reminder scheduler. Owns the listing id -> timer map and nothing else;
/// it only ever reads the appointment snapshot handed to it at arm time.
pub struct ReminderService {
    hub: Arc<RoomHub>,
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    next_seq: AtomicU64,
}

impl ReminderService {
    pub fn new(hub: Arc<RoomHub>) -> Self {
        Self {
            hub,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Arm the reminder for an appointment, replacing any timer already
    /// pending for the same listing. An instant in the past fires as soon
    /// as the runtime gets to it.
    pub async fn arm(&self, appointment: &Appointment) {
        let post_id = appointment.post_id.clone();
        let delay = delay_until(appointment.datetime);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut jobs = self.jobs.lock().await;
        if let Some(old) = jobs.remove(&post_id) {
            old.handle.abort();
        }

        debug!(
            post_id = %post_id,
            at = %appointment.datetime,
            delay_secs = delay.as_secs(),
            "reminder armed"
        );

        let hub = Arc::clone(&self.hub);
        let job_map = Arc::clone(&self.jobs);
        let task_post_id = post_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hub.announce_system(&task_post_id, SystemKind::Reminder, REMINDER_TEXT)
                .await;
            // A reschedule may have replaced the entry while we slept;
            // only remove our own.
            let mut jobs = job_map.lock().await;
            if jobs.get(&task_post_id).is_some_and(|j| j.seq == seq) {
                jobs.remove(&task_post_id);
            }
        });
        jobs.insert(post_id, Job { seq, handle });
    }

    /// Cancel the pending reminder for a listing; no-op when none exists.
    pub async fn disarm(&self, post_id: &str) {
        if let Some(job) = self.jobs.lock().await.remove(post_id) {
            job.handle.abort();
            debug!(post_id, "reminder disarmed");
        }
    }

    /// Number of timers currently armed.
    pub async fn armed_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Re-arm every stored appointment. Run once at startup; a store
    /// failure here must be treated as fatal by the caller, since every
    /// future reminder would otherwise be silently lost.
    pub async fn recover(&self, store: &dyn StorePort) -> Result<usize, DomainError> {
        let appointments = store.list_appointments().await?;
        for appointment in &appointments {
            self.arm(appointment).await;
        }
        if !appointments.is_empty() {
            info!(count = appointments.len(), "re-armed appointment reminders");
        }
        Ok(appointments.len())
    }
}

/// Delay until the meetup instant, clamped at zero for instants already
/// in the past.
fn delay_until(instant: NaiveDateTime) -> Duration {
    let now = Local::now().naive_local();
    (instant - now).to_std().unwrap_or(Duration::ZERO)
}
