//! Outbound channel for job changes.
//!
//! Delivery is best effort: a dropped event costs nothing because clients
//! can always re-read the job. Implementations must not block the caller on
//! slow consumers.

use async_trait::async_trait;
use modelforge_core::types::DbId;

use crate::summary::JobSummary;

#[async_trait]
pub trait JobPublisher: Send + Sync {
    /// Deliver `summary` to the sessions of `owner_id` only.
    async fn publish(&self, owner_id: DbId, summary: &JobSummary);
}

/// Publisher that drops every event.
pub struct NoopPublisher;

#[async_trait]
impl JobPublisher for NoopPublisher {
    async fn publish(&self, _owner_id: DbId, _summary: &JobSummary) {}
}
