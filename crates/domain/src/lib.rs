//! # luftuj-domain
//!
//! Pure domain model for the luftuj heat-recovery ventilation controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **device definitions** (register maps and write sequences per HRU model)
//! - Define the **command script** language (assignments, actions, function calls)
//! - Define the **timeline** (weekly events, modes, boost overrides)
//! - Select the applicable timeline event for a given instant
//! - Define **valve snapshots** and the broadcast message contract
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod active_state;
pub mod device;
pub mod hru_state;
pub mod schedule;
pub mod script;
pub mod slug;
pub mod timeline;
pub mod valve;
