use std::time::Duration;

/// Default base URL of the Meshy API.
pub const DEFAULT_MESHY_BASE_URL: &str = "https://api.meshy.ai";
/// Default base URL of the Replicate API.
pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";
/// Default Replicate input field for the primary image.
pub const DEFAULT_REPLICATE_IMAGE_FIELD: &str = "image";
/// Fewest images a wide-baseline reconstruction accepts by default.
pub const DEFAULT_PHOTOGRAMMETRY_MIN_IMAGES: usize = 8;
/// Most images a reconstruction accepts by default.
pub const DEFAULT_PHOTOGRAMMETRY_MAX_IMAGES: usize = 300;

/// Meshy image-to-3D API settings.
#[derive(Debug, Clone)]
pub struct MeshyConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Replicate prediction API settings.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: String,
    /// A version hash, `owner/name`, or `owner/name:version`.
    pub model: String,
    pub base_url: String,
    /// Input field receiving the primary image URL.
    pub image_field: String,
    /// Optional input field receiving the full image list.
    pub images_field: Option<String>,
    /// Optional input field receiving the texture prompt.
    pub prompt_field: Option<String>,
}

/// Photogrammetry engine settings.
#[derive(Debug, Clone)]
pub struct PhotogrammetryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub min_images: usize,
    pub max_images: usize,
}

/// Provider configuration resolved once at startup.
///
/// A provider whose required settings are absent is left unconfigured
/// (`None`). Selecting it for a job fails that job as misconfigured; it does
/// not stop the server from starting.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub meshy: Option<MeshyConfig>,
    pub replicate: Option<ReplicateConfig>,
    pub photogrammetry: Option<PhotogrammetryConfig>,
    /// Timeout applied to every adapter HTTP call (default: 60s).
    pub http_timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            meshy: None,
            replicate: None,
            photogrammetry: None,
            http_timeout: Duration::from_secs(60),
        }
    }
}

impl ProvidersConfig {
    /// Load provider configuration from environment variables.
    ///
    /// | Env Var                      | Default                        |
    /// |------------------------------|--------------------------------|
    /// | `MESHY_API_KEY`              | required for Meshy             |
    /// | `MESHY_BASE_URL`             | `https://api.meshy.ai`         |
    /// | `REPLICATE_API_TOKEN`        | required for Replicate         |
    /// | `REPLICATE_MODEL`            | required for Replicate         |
    /// | `REPLICATE_BASE_URL`         | `https://api.replicate.com/v1` |
    /// | `REPLICATE_IMAGE_FIELD`      | `image`                        |
    /// | `REPLICATE_IMAGES_FIELD`     | unset                          |
    /// | `REPLICATE_PROMPT_FIELD`     | unset                          |
    /// | `PHOTOGRAMMETRY_BASE_URL`    | required for photogrammetry    |
    /// | `PHOTOGRAMMETRY_API_KEY`     | unset                          |
    /// | `PHOTOGRAMMETRY_MIN_IMAGES`  | `8`                            |
    /// | `PHOTOGRAMMETRY_MAX_IMAGES`  | `300`                          |
    /// | `HTTP_TIMEOUT_SECS`          | `60`                           |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ProvidersConfig::from_env`] with an injected variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let meshy = get("MESHY_API_KEY").map(|api_key| MeshyConfig {
            api_key,
            base_url: get("MESHY_BASE_URL").unwrap_or_else(|| DEFAULT_MESHY_BASE_URL.into()),
        });

        let replicate = match (get("REPLICATE_API_TOKEN"), get("REPLICATE_MODEL")) {
            (Some(api_token), Some(model)) => Some(ReplicateConfig {
                api_token,
                model,
                base_url: get("REPLICATE_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_REPLICATE_BASE_URL.into()),
                image_field: get("REPLICATE_IMAGE_FIELD")
                    .unwrap_or_else(|| DEFAULT_REPLICATE_IMAGE_FIELD.into()),
                images_field: get("REPLICATE_IMAGES_FIELD"),
                prompt_field: get("REPLICATE_PROMPT_FIELD"),
            }),
            _ => None,
        };

        let photogrammetry = get("PHOTOGRAMMETRY_BASE_URL").map(|base_url| {
            let min_images: usize = get("PHOTOGRAMMETRY_MIN_IMAGES")
                .map(|v| v.parse().expect("PHOTOGRAMMETRY_MIN_IMAGES must be a valid usize"))
                .unwrap_or(DEFAULT_PHOTOGRAMMETRY_MIN_IMAGES);
            let max_images: usize = get("PHOTOGRAMMETRY_MAX_IMAGES")
                .map(|v| v.parse().expect("PHOTOGRAMMETRY_MAX_IMAGES must be a valid usize"))
                .unwrap_or(DEFAULT_PHOTOGRAMMETRY_MAX_IMAGES);
            assert!(
                min_images <= max_images,
                "PHOTOGRAMMETRY_MIN_IMAGES must not exceed PHOTOGRAMMETRY_MAX_IMAGES"
            );
            PhotogrammetryConfig {
                base_url,
                api_key: get("PHOTOGRAMMETRY_API_KEY"),
                min_images,
                max_images,
            }
        });

        let http_timeout_secs: u64 = get("HTTP_TIMEOUT_SECS")
            .map(|v| v.parse().expect("HTTP_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(60);

        Self {
            meshy,
            replicate,
            photogrammetry,
            http_timeout: Duration::from_secs(http_timeout_secs),
        }
    }
}
