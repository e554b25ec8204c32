//! Implements InputPort. Inquire-based interactive prompts.
//!
//! Thin request layer: every state change goes through the services.
//! Recoverable failures are printed and the session continues; only store
//! failures end the run.

use crate::domain::{DomainError, ListingDraft, Post, PostStatus, ScheduleState, User};
use crate::ports::{InputPort, StorePort};
use crate::usecases::room_hub::{ChatMessageView, RoomEvent, SystemKind};
use crate::usecases::{
    AppointmentService, ChatService, ListingService, NewListing, ScheduleRequest,
};
use async_trait::async_trait;
use inquire::{Confirm, Select, Text};
use std::sync::Arc;
use tokio::sync::mpsc;

fn prompt_err(e: inquire::InquireError) -> DomainError {
    DomainError::Input(e.to_string())
}

fn status_tag(status: PostStatus) -> &'static str {
    match status {
        PostStatus::Selling => "selling",
        PostStatus::Reserved => "reserved",
    }
}

fn kind_tag(kind: SystemKind) -> &'static str {
    match kind {
        SystemKind::Appointment => "meetup",
        SystemKind::Reminder => "reminder",
    }
}

fn print_chat_line(view: &ChatMessageView) {
    println!(
        "  {} {} -> {}: {}",
        view.message.created_at.format("%m-%d %H:%M"),
        view.sender_name,
        view.receiver_name,
        view.message.content
    );
}

fn print_room_event(event: &RoomEvent) {
    match event {
        RoomEvent::ChatHistory(history) => {
            for view in history {
                print_chat_line(view);
            }
        }
        RoomEvent::ChatMessage(view) => print_chat_line(view),
        RoomEvent::SystemMessage(note) => println!("  [{}] {}", kind_tag(note.kind), note.content),
    }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    store: Arc<dyn StorePort>,
    listings: Arc<ListingService>,
    appointments: Arc<AppointmentService>,
    chat: Arc<ChatService>,
}

impl TuiInputPort {
    pub fn new(
        store: Arc<dyn StorePort>,
        listings: Arc<ListingService>,
        appointments: Arc<AppointmentService>,
        chat: Arc<ChatService>,
    ) -> Self {
        Self {
            store,
            listings,
            appointments,
            chat,
        }
    }

    async fn select_profile(&self) -> Result<User, DomainError> {
        let users = self.store.list_users().await?;
        if users.is_empty() {
            return Err(DomainError::NotFound("no users in the store".into()));
        }
        let options: Vec<String> = users
            .iter()
            .map(|u| format!("{} ({})", u.name, u.id))
            .collect();
        let selected = Select::new("Who are you?", options.clone())
            .prompt()
            .map_err(prompt_err)?;
        let idx = options.iter().position(|o| *o == selected).unwrap_or(0);
        Ok(users[idx].clone())
    }

    async fn select_counterparty(&self, exclude: &str) -> Result<String, DomainError> {
        let users: Vec<User> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.id != exclude)
            .collect();
        if users.is_empty() {
            return Err(DomainError::NotFound("no other users to trade with".into()));
        }
        let options: Vec<String> = users
            .iter()
            .map(|u| format!("{} ({})", u.name, u.id))
            .collect();
        let selected = Select::new("Trade with whom?", options.clone())
            .prompt()
            .map_err(prompt_err)?;
        let idx = options.iter().position(|o| *o == selected).unwrap_or(0);
        Ok(users[idx].id.clone())
    }

    async fn browse(&self, user: &User) -> Result<(), DomainError> {
        loop {
            let posts = self.listings.browse().await?;
            if posts.is_empty() {
                println!("No listings yet.");
                return Ok(());
            }
            let mut options: Vec<String> = posts
                .iter()
                .map(|p| format!("[{}] {} — {} ({})", status_tag(p.status), p.title, p.price, p.location))
                .collect();
            options.push("(back)".to_string());
            let selected = Select::new("Listings (newest first)", options.clone())
                .prompt()
                .map_err(prompt_err)?;
            let Some(idx) = options.iter().position(|o| *o == selected) else {
                return Ok(());
            };
            if idx >= posts.len() {
                return Ok(());
            }
            self.view_listing(user, &posts[idx].id).await?;
        }
    }

    async fn view_listing(&self, user: &User, post_id: &str) -> Result<(), DomainError> {
        loop {
            let detail = match self.listings.detail(post_id).await {
                Ok(d) => d,
                Err(DomainError::NotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            };
            let post = &detail.post;
            println!();
            println!("== {} [{}] ==", post.title, status_tag(post.status));
            println!("   price {} | area {} | seller {}", post.price, post.location, post.seller_id);
            if !post.description.is_empty() {
                println!("   {}", post.description);
            }
            match ScheduleState::of(detail.appointment.clone()) {
                ScheduleState::Open => println!("   no meetup booked"),
                ScheduleState::Scheduled(a) => println!(
                    "   meetup {} @ {} (buyer {})",
                    a.datetime.format("%Y-%m-%d %H:%M"),
                    a.place,
                    a.buyer_id
                ),
                ScheduleState::PendingCancel(a) => println!(
                    "   meetup {} @ {} — cancellation requested by {}",
                    a.datetime.format("%Y-%m-%d %H:%M"),
                    a.place,
                    a.cancel_requested_by.clone().unwrap_or_default()
                ),
            }

            let action = Select::new(
                "Listing",
                vec![
                    "Open chat room",
                    "Schedule meetup",
                    "Request cancellation",
                    "Agree to cancellation",
                    "Delete listing",
                    "Back",
                ],
            )
            .prompt()
            .map_err(prompt_err)?;

            let result = match action {
                "Open chat room" => self.open_room(user, post).await,
                "Schedule meetup" => self.schedule_meetup(user, post).await,
                "Request cancellation" => self
                    .appointments
                    .request_cancellation(post_id, &user.id)
                    .await
                    .map(|_| println!("Cancellation requested.")),
                "Agree to cancellation" => self
                    .appointments
                    .confirm_cancellation(post_id, &user.id)
                    .await
                    .map(|_| println!("Meetup cancelled.")),
                "Delete listing" => {
                    match self.appointments.delete_listing(post_id, &user.id).await {
                        Ok(()) => {
                            println!("Listing deleted.");
                            return Ok(());
                        }
                        Err(e) => Err(e),
                    }
                }
                _ => return Ok(()),
            };
            if let Err(e) = result {
                if e.is_recoverable() {
                    println!("✗ {e}");
                } else {
                    return Err(e);
                }
            }
        }
    }

    async fn schedule_meetup(&self, user: &User, post: &Post) -> Result<(), DomainError> {
        let buyer_id = if user.id == post.seller_id {
            self.select_counterparty(&post.seller_id).await?
        } else {
            user.id.clone()
        };
        let date = Text::new("Date (YYYY-MM-DD):").prompt().map_err(prompt_err)?;
        let time = Text::new("Time (HH:MM):").prompt().map_err(prompt_err)?;
        let place = Text::new("Place:").prompt().map_err(prompt_err)?;

        let appointment = self
            .appointments
            .schedule(
                &post.id,
                ScheduleRequest {
                    buyer_id,
                    date,
                    time,
                    place,
                },
            )
            .await?;
        println!(
            "Meetup booked for {} @ {}.",
            appointment.datetime.format("%Y-%m-%d %H:%M"),
            appointment.place
        );
        Ok(())
    }

    async fn open_room(&self, user: &User, post: &Post) -> Result<(), DomainError> {
        let receiver_id = if user.id == post.seller_id {
            self.select_counterparty(&post.seller_id).await?
        } else {
            post.seller_id.clone()
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = self.chat.join(&post.id, tx).await?;
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_room_event(&event);
            }
        });
        println!("-- room \"{}\" | empty line or /back to leave --", post.title);

        let outcome = loop {
            let line = match Text::new(">").prompt() {
                Ok(l) => l,
                Err(e) => break Err(prompt_err(e)),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "/back" {
                break Ok(());
            }
            match self
                .chat
                .post_message(&post.id, &user.id, &receiver_id, &line)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => println!("✗ {e}"),
                Err(e) => break Err(e),
            }
        };

        self.chat.leave(&post.id, subscriber).await;
        printer.abort();
        outcome
    }

    async fn create_listing(&self, user: &User) -> Result<(), DomainError> {
        let title = Text::new("Title:").prompt().map_err(prompt_err)?;
        let price: u64 = Text::new("Price:")
            .prompt()
            .map_err(prompt_err)?
            .trim()
            .parse()
            .unwrap_or(0);
        let location = Text::new("Meetup area (blank = your address):")
            .prompt()
            .map_err(prompt_err)?;

        let use_ai = Confirm::new("Let the AI draft the description?")
            .with_default(false)
            .prompt()
            .map_err(prompt_err)?;
        let description = if use_ai {
            let extra = Text::new("Anything the AI should know?")
                .prompt()
                .map_err(prompt_err)?;
            match self
                .listings
                .generate_copy(&ListingDraft {
                    title: title.clone(),
                    price: Some(price),
                    location: location.clone(),
                    extra_description: extra,
                    ..ListingDraft::default()
                })
                .await
            {
                Ok(copy) => {
                    println!("--- {}\n{}\n---", copy.title, copy.body);
                    copy.body
                }
                Err(e) => {
                    println!("✗ {e}; write it yourself");
                    Text::new("Description:").prompt().map_err(prompt_err)?
                }
            }
        } else {
            Text::new("Description:").prompt().map_err(prompt_err)?
        };

        match self
            .listings
            .create(NewListing {
                title,
                description,
                price,
                image_url: None,
                seller_id: user.id.clone(),
                location: Some(location).filter(|l| !l.trim().is_empty()),
            })
            .await
        {
            Ok(post) => println!("Listed \"{}\".", post.title),
            Err(e) if e.is_recoverable() => println!("✗ {e}"),
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        let mut user = self.select_profile().await?;
        loop {
            let choice = Select::new(
                &format!("[{}] Main menu", user.name),
                vec!["Browse listings", "New listing", "Switch profile", "Quit"],
            )
            .prompt()
            .map_err(prompt_err)?;
            match choice {
                "Browse listings" => {
                    if let Err(e) = self.browse(&user).await {
                        if e.is_recoverable() {
                            println!("✗ {e}");
                        } else {
                            return Err(e);
                        }
                    }
                }
                "New listing" => self.create_listing(&user).await?,
                "Switch profile" => user = self.select_profile().await?,
                _ => return Ok(()),
            }
        }
    }
}
