//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;

pub use entities::{
    parse_schedule_instant, schedule_format, Appointment, CancelState, ListingCopy, ListingDraft,
    Message, Post, PostStatus, ScheduleState, User,
};
pub use errors::DomainError;
