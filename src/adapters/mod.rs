//! Infrastructure adapters. Implement outbound ports.
//!
//! Storage, AI gateway, terminal UI. Map errors to DomainError.

pub mod ai;
pub mod persistence;
pub mod ui;
