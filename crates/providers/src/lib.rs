//! Adapters for the external 3D generation backends.
//!
//! Every backend is wrapped in a [`ProviderAdapter`] that knows how to create
//! a task, fetch its raw status payload, and dig the result URL or failure
//! message out of that payload. Interpretation of status labels and progress
//! lives in `modelforge_core::status`; adapters return provider-native JSON.

pub mod adapter;
pub mod config;
pub mod error;
mod http;
pub mod meshy;
pub mod mock;
pub mod photogrammetry;
pub mod registry;
pub mod replicate;
pub mod scan;

pub use adapter::{ArtifactKind, ProviderAdapter, TaskRef, TaskRequest};
pub use config::ProvidersConfig;
pub use error::ProviderError;
pub use registry::ProviderRegistry;
