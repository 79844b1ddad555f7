//! The fixed set of 3D generation backends a job can be routed to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A 3D generation backend. Chosen when a job is created and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Local placeholder generator for demo and dev environments.
    Mock,
    /// Commercial image-to-3D API (Meshy).
    Meshy,
    /// Wide-baseline photogrammetry reconstruction engine.
    Photogrammetry,
    /// Generic hosted prediction API (Replicate).
    Replicate,
}

impl Provider {
    /// Every provider, in display order.
    pub const ALL: [Provider; 4] = [
        Provider::Mock,
        Provider::Meshy,
        Provider::Photogrammetry,
        Provider::Replicate,
    ];

    /// Stable wire/database name.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Mock => "mock",
            Provider::Meshy => "meshy",
            Provider::Photogrammetry => "photogrammetry",
            Provider::Replicate => "replicate",
        }
    }

    /// Human-readable name used in user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Mock => "Mock generator",
            Provider::Meshy => "Meshy",
            Provider::Photogrammetry => "Photogrammetry engine",
            Provider::Replicate => "Replicate",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Provider::Mock),
            "meshy" => Ok(Provider::Meshy),
            "photogrammetry" => Ok(Provider::Photogrammetry),
            "replicate" => Ok(Provider::Replicate),
            other => Err(CoreError::Validation(format!(
                "Unknown provider '{other}'. Valid providers: {}",
                Provider::ALL.map(Provider::as_str).join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for Provider {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
