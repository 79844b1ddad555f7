//! WebSocket message type constants for 3D conversion job events.
//!
//! Used by the live update publisher when pushing job summaries to the
//! owning user's connected sessions.

/// A job summary changed (status, progress, diagnostics, or output).
pub const MSG_TYPE_MODEL_JOB_UPDATED: &str = "model3d_job_updated";
