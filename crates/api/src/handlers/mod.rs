//! Request handlers.
//!
//! Handlers authenticate via [`crate::middleware::auth::AuthUser`], delegate to
//! the [`modelforge_pipeline::Orchestrator`] and map errors via
//! [`crate::error::AppError`].

pub mod jobs;
