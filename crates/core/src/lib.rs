//! Shared domain types for the 2D→3D conversion service.
//!
//! Holds the pieces every other crate agrees on: id/timestamp aliases, the
//! core error type, the provider enumeration, generation options, and the
//! pure status normalizer that reconciles provider status vocabularies.

pub mod error;
pub mod generation;
pub mod job_events;
pub mod provider;
pub mod status;
pub mod types;
