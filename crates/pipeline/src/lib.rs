//! Job lifecycle for 2D→3D conversions.
//!
//! [`orchestrator::Orchestrator`] creates jobs, dispatches them to a provider
//! adapter in the background, and re-synchronizes them with the provider
//! whenever a client reads them. Finished artifacts go through
//! [`materialize::Materializer`]; every observed change is handed to a
//! [`publisher::JobPublisher`].

pub mod config;
pub mod materialize;
pub mod mesh;
pub mod orchestrator;
pub mod publisher;
pub mod single_flight;
pub mod storage;
pub mod summary;

pub use config::PipelineConfig;
pub use materialize::{MaterializeError, Materializer};
pub use orchestrator::{CreatedJob, Orchestrator, OrchestratorError};
pub use publisher::{JobPublisher, NoopPublisher};
pub use storage::LocalStore;
pub use summary::JobSummary;
