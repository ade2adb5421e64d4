use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::layout::Layout;

/// The canonical representation of one slide.
///
/// Field order is the serialization order; the normalizer guarantees every
/// field is present (null where no source value applied), so downstream
/// consumers never branch on missing keys. The trailing pass-through fields
/// carry whatever JSON the source had and do not affect rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    /// 1-based position within the deck; dense 1..N after normalization.
    pub slide_number: u32,
    #[serde(default)]
    pub title: String,
    /// Body text; may contain newline-delimited `- ` / `* ` bullet markers.
    #[serde(default)]
    pub content: String,
    pub layout: Layout,
    /// Optional chart/diagram kind tag, e.g. "flowchart" or "mindmap".
    pub chart_type: Option<String>,
    pub diagram_type: Option<String>,
    /// Diagram source text to be rendered by the external tool.
    pub diagram_content: Option<String>,
    pub image_description: Option<String>,
    /// URL or local path of "the" image for this slide. The asset resolver
    /// may overwrite this from `diagram_content`, never the reverse.
    pub image_url: Option<String>,
    /// Speaker notes.
    pub facilitator_notes: Option<String>,
    // Pass-through fields, round-tripped unchanged.
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub materials: Option<Value>,
    pub worksheet: Option<Value>,
    pub improvements: Option<Value>,
    pub notes: Option<Value>,
}

impl SlideRecord {
    /// The diagram kind for this slide, preferring the explicit
    /// `diagram_type` over the looser `chart_type` tag.
    pub fn diagram_kind(&self) -> Option<&str> {
        self.diagram_type.as_deref().or(self.chart_type.as_deref())
    }
}

/// Presentation-level metadata derived from the first slide.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckMetadata {
    pub title: String,
    pub subtitle: String,
    pub total_slides: usize,
}

/// The ordered sequence of slides making up one presentation.
///
/// Exclusively owned by a single pipeline run; renderers only ever borrow
/// it immutably.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    pub slides: Vec<SlideRecord>,
}

impl Deck {
    pub fn new(slides: Vec<SlideRecord>) -> Self {
        Deck { slides }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlideRecord> {
        self.slides.iter()
    }

    /// Title/subtitle taken from the first slide, as the exporters have
    /// always done.
    pub fn metadata(&self) -> DeckMetadata {
        let first = self.slides.first();
        DeckMetadata {
            title: first
                .map(|s| s.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled Presentation".to_string()),
            subtitle: first.map(|s| s.content.clone()).unwrap_or_default(),
            total_slides: self.slides.len(),
        }
    }
}

impl<'a> IntoIterator for &'a Deck {
    type Item = &'a SlideRecord;
    type IntoIter = std::slice::Iter<'a, SlideRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.slides.iter()
    }
}
