//! Canonicalizes loosely-typed slide records.
//!
//! Raw records arrive as JSON objects with arbitrary missing fields,
//! display-only ordinals and layout names in any historical spelling. The
//! normalizer produces a [`Deck`] of fully-populated [`SlideRecord`]s, same
//! length and order as the input, or fails atomically.

use indexmap::IndexMap;
use log::{info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::models::{Deck, Layout, SlideRecord};

/// A normalized deck plus the diagnostics collected while producing it.
#[derive(Debug)]
pub struct Normalized {
    pub deck: Deck,
    /// Slides that carried no explicit layout and had one inferred.
    pub inferred_layouts: usize,
    /// Slides whose explicit layout was unknown and fell back to `content`.
    pub fallback_layouts: usize,
}

pub struct Normalizer {
    slide_defaults: IndexMap<String, Value>,
    layout_mappings: IndexMap<String, String>,
    force_recovery: bool,
}

impl Normalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Normalizer {
            slide_defaults: config.slide_defaults.clone(),
            layout_mappings: config.layout_mappings.clone(),
            force_recovery: config.force_recovery,
        }
    }

    /// Canonicalizes a sequence of raw records.
    ///
    /// Either the whole sequence is processed or the call fails; partial
    /// output is never returned. A raw entry that is not a JSON object is
    /// rejected up front.
    pub fn normalize(&self, raw: &[Value]) -> Result<Normalized> {
        for (idx, entry) in raw.iter().enumerate() {
            if !entry.is_object() {
                return Err(PipelineError::InvalidInput(format!(
                    "slide {} is not an object",
                    idx + 1
                )));
            }
        }

        let mut inferred = 0usize;
        let mut fallbacks = 0usize;
        let mut slides = Vec::with_capacity(raw.len());

        for (idx, entry) in raw.iter().enumerate() {
            let position = (idx + 1) as u32;
            let mut map = entry.as_object().cloned().unwrap_or_default();

            // Defaults fill missing fields before layout inference.
            for (key, value) in &self.slide_defaults {
                let missing = map.get(key).map_or(true, Value::is_null);
                if missing {
                    map.insert(key.clone(), value.clone());
                }
            }

            let layout = self.resolve_layout(&map, position, &mut inferred, &mut fallbacks);

            slides.push(SlideRecord {
                slide_number: position,
                title: string_field(&map, "title").unwrap_or_default(),
                content: string_field(&map, "content").unwrap_or_default(),
                layout,
                chart_type: string_field(&map, "chart_type"),
                diagram_type: string_field(&map, "diagram_type"),
                diagram_content: string_field(&map, "diagram_content"),
                image_description: string_field(&map, "image_description"),
                image_url: string_field(&map, "image_url"),
                facilitator_notes: string_field(&map, "facilitator_notes"),
                start_time: value_field(&map, "start_time"),
                end_time: value_field(&map, "end_time"),
                materials: value_field(&map, "materials"),
                worksheet: value_field(&map, "worksheet"),
                improvements: value_field(&map, "improvements"),
                notes: value_field(&map, "notes"),
            });
        }

        Ok(Normalized {
            deck: Deck::new(slides),
            inferred_layouts: inferred,
            fallback_layouts: fallbacks,
        })
    }

    /// Recovers a slide list from serialized text and normalizes it.
    pub fn normalize_text(&self, text: &str) -> Result<Normalized> {
        let raw = recover_slides(text, self.force_recovery)?;
        self.normalize(&raw)
    }

    fn resolve_layout(
        &self,
        map: &Map<String, Value>,
        position: u32,
        inferred: &mut usize,
        fallbacks: &mut usize,
    ) -> Layout {
        match string_field(map, "layout") {
            Some(mut raw) => {
                if let Some(mapped) = self.layout_mappings.get(&raw) {
                    raw = mapped.clone();
                }
                let resolved = Layout::resolve(&raw);
                if resolved.fallback {
                    warn!(
                        "Unknown layout {:?} on slide {}, using content",
                        raw, position
                    );
                    *fallbacks += 1;
                }
                resolved.layout
            }
            None => {
                *inferred += 1;
                if position == 1 {
                    Layout::Title
                } else if has_value(map, "image_url") || has_value(map, "diagram_type") {
                    Layout::TwoColumn
                } else {
                    Layout::Content
                }
            }
        }
    }
}

fn has_value(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).map_or(false, |v| !v.is_null())
}

/// Reads a field as text. Non-string scalars are stringified rather than
/// rejected, since upstream data is loosely typed.
fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn value_field(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|v| !v.is_null()).cloned()
}

/// Locates the slide list inside decoded JSON: a top-level array, an object
/// with a `slides` array, or (last resort, logged) the first member that
/// looks like an array of record objects.
pub fn extract_slides(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("slides") {
                return Ok(items.clone());
            }
            for (key, candidate) in map {
                if let Value::Array(items) = candidate {
                    if items.first().map_or(false, Value::is_object) {
                        info!("Found slides array under key {:?}", key);
                        return Ok(items.clone());
                    }
                }
            }
            Err(PipelineError::InvalidInput(
                "no slides array found in object".to_string(),
            ))
        }
        _ => Err(PipelineError::InvalidInput(
            "expected a slide list or an object containing one".to_string(),
        )),
    }
}

/// Recovers a slide list from possibly-noisy serialized text.
///
/// Order of attempts: direct parse; the substring between the first `[` and
/// the last `]`; and, when `force` is set, individual record fragments with
/// trailing-comma repair, discarding anything unparseable.
pub fn recover_slides(text: &str, force: bool) -> Result<Vec<Value>> {
    let direct = match serde_json::from_str::<Value>(text) {
        Ok(value) => return extract_slides(&value),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return extract_slides(&value);
            }
        }
    }

    if force {
        warn!("Attempting forced recovery of slide records from malformed input");
        let slides = recover_fragments(text);
        if !slides.is_empty() {
            info!("Recovered {} slide records from fragments", slides.len());
            return Ok(slides);
        }
    }

    Err(PipelineError::JsonDecode(direct))
}

fn recover_fragments(text: &str) -> Vec<Value> {
    static FRAGMENT: OnceLock<Regex> = OnceLock::new();
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let fragment = FRAGMENT
        .get_or_init(|| Regex::new(r#"(?s)\{\s*"slide_number"\s*:.*?\}"#).expect("valid regex"));
    let trailing =
        TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*\}").expect("valid regex"));

    fragment
        .find_iter(text)
        .filter_map(|m| {
            let repaired = trailing.replace_all(m.as_str(), "}");
            serde_json::from_str::<Value>(&repaired).ok()
        })
        .collect()
}
