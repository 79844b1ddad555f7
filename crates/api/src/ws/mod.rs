//! WebSocket push channel.
//!
//! Provides connection management, heartbeat monitoring, the HTTP upgrade
//! handler, and the [`JobPublisher`](modelforge_pipeline::JobPublisher)
//! that fans job updates out to their owner's sessions.

mod handler;
mod heartbeat;
pub mod manager;
pub mod publisher;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use publisher::WsJobPublisher;
