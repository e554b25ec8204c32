//! Application use cases. Orchestrate domain logic via ports.

pub mod appointment_service;
pub mod chat_service;
pub mod listing_service;
pub mod reminder_service;
pub mod room_hub;

pub use appointment_service::{AppointmentService, ScheduleRequest};
pub use chat_service::ChatService;
pub use listing_service::{ListingDetail, ListingService, NewListing};
pub use reminder_service::ReminderService;
pub use room_hub::{
    ChatMessageView, RoomEvent, RoomHub, RoomSender, SubscriberId, SystemKind, SystemNote,
};
