//! Texture and geometry options attached to a conversion job.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Lowest target polygon count accepted when remeshing.
pub const MIN_TARGET_POLYCOUNT: i32 = 100;
/// Highest target polygon count accepted when remeshing.
pub const MAX_TARGET_POLYCOUNT: i32 = 300_000;
/// Maximum texture prompt length in characters.
pub const MAX_TEXTURE_PROMPT_CHARS: u64 = 600;

/// Symmetry handling requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymmetryMode {
    Off,
    Auto,
    On,
}

impl SymmetryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SymmetryMode::Off => "off",
            SymmetryMode::Auto => "auto",
            SymmetryMode::On => "on",
        }
    }

    /// Parse a form value; unknown values are a validation error.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(SymmetryMode::Off),
            "auto" => Ok(SymmetryMode::Auto),
            "on" => Ok(SymmetryMode::On),
            other => Err(CoreError::Validation(format!(
                "Invalid symmetry mode '{other}'. Must be one of: off, auto, on"
            ))),
        }
    }
}

/// Options supplied at job creation. Persisted verbatim and echoed back in
/// job summaries.
///
/// `texture_prompt` and `texture_image_url` are mutually exclusive by
/// convention. Both are stored when both are supplied, but only the prompt is
/// forwarded to a provider (see [`GenerationOptions::texture_guidance`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationOptions {
    #[validate(length(max = MAX_TEXTURE_PROMPT_CHARS))]
    pub texture_prompt: Option<String>,
    pub texture_image_url: Option<String>,
    pub should_remesh: bool,
    #[validate(range(min = MIN_TARGET_POLYCOUNT, max = MAX_TARGET_POLYCOUNT))]
    pub target_polycount: Option<i32>,
    pub symmetry_mode: Option<SymmetryMode>,
    pub enable_pbr: bool,
}

/// The single texture hint forwarded to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureGuidance<'a> {
    Prompt(&'a str),
    Image(&'a str),
    None,
}

impl GenerationOptions {
    /// Resolve the texture hint: a non-blank prompt wins over a guide image.
    pub fn texture_guidance(&self) -> TextureGuidance<'_> {
        let prompt = self
            .texture_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(prompt) = prompt {
            return TextureGuidance::Prompt(prompt);
        }
        match self
            .texture_image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            Some(url) => TextureGuidance::Image(url),
            None => TextureGuidance::None,
        }
    }

    /// Run the declarative field checks and map failures to [`CoreError`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(|e| {
            CoreError::Validation(format!("Invalid generation options: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_wins_over_guide_image() {
        let options = GenerationOptions {
            texture_prompt: Some("weathered bronze".into()),
            texture_image_url: Some("https://cdn.example/guide.png".into()),
            ..Default::default()
        };
        assert_eq!(
            options.texture_guidance(),
            TextureGuidance::Prompt("weathered bronze")
        );
    }

    #[test]
    fn blank_prompt_falls_back_to_image() {
        let options = GenerationOptions {
            texture_prompt: Some("   ".into()),
            texture_image_url: Some("https://cdn.example/guide.png".into()),
            ..Default::default()
        };
        assert_eq!(
            options.texture_guidance(),
            TextureGuidance::Image("https://cdn.example/guide.png")
        );
    }

    #[test]
    fn no_guidance_when_both_absent() {
        assert_eq!(
            GenerationOptions::default().texture_guidance(),
            TextureGuidance::None
        );
    }

    #[test]
    fn polycount_out_of_range_is_rejected() {
        let options = GenerationOptions {
            target_polycount: Some(MAX_TARGET_POLYCOUNT + 1),
            ..Default::default()
        };
        assert!(options.check().is_err());

        let options = GenerationOptions {
            target_polycount: Some(MIN_TARGET_POLYCOUNT),
            ..Default::default()
        };
        assert!(options.check().is_ok());
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let options = GenerationOptions {
            texture_prompt: Some("x".repeat(MAX_TEXTURE_PROMPT_CHARS as usize + 1)),
            ..Default::default()
        };
        assert!(options.check().is_err());
    }

    #[test]
    fn limits_are_inclusive_at_the_named_bounds() {
        let at_limits = GenerationOptions {
            texture_prompt: Some("x".repeat(MAX_TEXTURE_PROMPT_CHARS as usize)),
            target_polycount: Some(MAX_TARGET_POLYCOUNT),
            ..Default::default()
        };
        assert!(at_limits.check().is_ok());

        let below = GenerationOptions {
            target_polycount: Some(MIN_TARGET_POLYCOUNT - 1),
            ..Default::default()
        };
        assert!(below.check().is_err());
    }

    #[test]
    fn symmetry_mode_parsing() {
        assert_eq!(SymmetryMode::parse("AUTO").unwrap(), SymmetryMode::Auto);
        assert!(SymmetryMode::parse("mirror").is_err());
    }
}
