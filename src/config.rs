use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;

/// How the HTML backend should handle images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Fetch remote images and inline them as base64 data URIs, so the
    /// resulting document works offline. Local paths stay as links.
    #[default]
    Embed,
    /// Leave all image references as external links.
    Link,
}

/// Explicit configuration passed into every pipeline component at
/// construction. Replaces the module-level globals the components would
/// otherwise reach for: the cache location, the default-value table, and
/// the retry/backoff knobs all live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the asset cache (`images/` and `diagrams/` subtrees plus
    /// the JSON index live under it).
    pub cache_dir: PathBuf,

    /// Working directory where rendered diagram images are written.
    pub images_dir: PathBuf,

    /// Field -> default value, applied to raw records before layout
    /// inference. Keys use the slide-record field names.
    pub slide_defaults: IndexMap<String, Value>,

    /// Raw layout spelling -> replacement raw spelling, applied to explicit
    /// layout values before canonical resolution.
    pub layout_mappings: IndexMap<String, String>,

    /// Prefer an SVG sibling over the raster file when the deck-markup
    /// backend references a local diagram asset.
    pub prefer_svg: bool,

    /// reveal.js theme name for the HTML backend.
    pub html_theme: String,

    /// Image handling for the HTML backend.
    pub html_images: ImageMode,

    /// Upload local image assets to the external image store and rewrite
    /// slide references to the hosted URLs, for consumers that cannot
    /// read local paths. When unset, remote references are localized into
    /// the cache instead.
    pub publish_images: bool,

    /// Attempt fragment-level JSON recovery when the slide source is not
    /// directly parseable.
    pub force_recovery: bool,

    /// First delay of the exponential backoff used between external-call
    /// attempts. Tests set this to zero.
    #[serde(with = "duration_secs")]
    pub backoff_base: Duration,

    /// Read timeout applied to network calls.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            cache_dir: PathBuf::from(".makeslides/assets"),
            images_dir: PathBuf::from("images"),
            slide_defaults: IndexMap::new(),
            layout_mappings: IndexMap::new(),
            prefer_svg: false,
            html_theme: "black".to_string(),
            html_images: ImageMode::Embed,
            publish_images: false,
            force_recovery: false,
            backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a YAML file (the original tool's
    /// `config.yaml`). Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Serializes `Duration` as whole seconds so the YAML stays readable.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip_keeps_defaults_for_missing_keys() {
        let cfg: PipelineConfig =
            serde_yaml::from_str("html_theme: moon\nbackoff_base: 2\n").unwrap();
        assert_eq!(cfg.html_theme, "moon");
        assert_eq!(cfg.backoff_base, Duration::from_secs(2));
        assert_eq!(cfg.html_images, ImageMode::Embed);
        assert_eq!(cfg.cache_dir, PathBuf::from(".makeslides/assets"));
    }

    #[test]
    fn slide_defaults_preserve_insertion_order() {
        let cfg: PipelineConfig = serde_yaml::from_str(
            "slide_defaults:\n  facilitator_notes: \"\"\n  materials: none\n",
        )
        .unwrap();
        let keys: Vec<&String> = cfg.slide_defaults.keys().collect();
        assert_eq!(keys, ["facilitator_notes", "materials"]);
    }
}
