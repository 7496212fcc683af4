//! # apiary-domain
//!
//! Pure domain model for the apiary automation hub.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, bus messages, notifications
//! - Define **Unit manifests** (what a loaded automation unit declares
//!   about itself: name, description, subscribed topics, callbacks)
//! - Define **Schedules** (day-of-week sets and the weekly alarm
//!   next-occurrence computation)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod message;
pub mod notification;
pub mod schedule;
pub mod unit;
