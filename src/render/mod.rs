//! Format renderers.
//!
//! One dispatcher maps canonical slide records to layout shapes; three
//! backends turn those shapes into documents (deck markup, a presentation
//! package, an HTML slideshow). Backends never interpret raw records; all
//! layout decisions live in [`build_shape`] so the three output formats
//! cannot drift apart.

pub mod html;
pub mod markdown;
pub mod pptx;

pub use html::HtmlBackend;
pub use markdown::MarkdownBackend;
pub use pptx::PptxBackend;

use log::warn;
use thiserror::Error;

use crate::models::{DeckMetadata, Layout, SlideRecord};
use crate::split::split_columns;

/// Errors raised by a renderer backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Could not assemble the output document container.
    #[error("Failed to build output package: {0}")]
    Package(String),

    /// An image referenced by a slide could not be read or fetched.
    #[error("Failed to load image {url}: {reason}")]
    Image { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::fmt::Error> for BackendError {
    fn from(e: std::fmt::Error) -> Self {
        BackendError::Package(e.to_string())
    }
}

impl From<zip::result::ZipError> for BackendError {
    fn from(e: zip::result::ZipError) -> Self {
        BackendError::Package(e.to_string())
    }
}

/// One column of a two-column slide.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(String),
    Image(String),
}

/// The layout-resolved shape of a slide, with every field the backends
/// need already extracted from the record.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideShape {
    Title { heading: String, subheading: String },
    Section { heading: String },
    Content { heading: String, body: String, image: Option<String> },
    TwoColumn { heading: String, left: Column, right: Column },
    Quote { quote: String, attribution: String },
    MainPoint { heading: String, caption: String },
    BigNumber { number: String, caption: String },
    Caption { image: Option<String>, caption: String },
    Blank { image: Option<String> },
}

/// Renders shapes into one output document. Drivers call `begin` once,
/// `slide` per slide in deck order, then `finish` for the final bytes.
pub trait DeckBackend {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str;

    fn begin(&mut self, meta: &DeckMetadata) -> Result<(), BackendError>;

    fn slide(&mut self, record: &SlideRecord, shape: &SlideShape) -> Result<(), BackendError>;

    fn finish(&mut self) -> Result<Vec<u8>, BackendError>;
}

/// An image reference counts as a rendered diagram when its path says so;
/// those stay inline with the body instead of claiming the right column.
fn is_diagram_image(url: &str) -> bool {
    url.to_lowercase().contains("diagram")
}

/// Maps a canonical record to its layout shape.
pub fn build_shape(record: &SlideRecord) -> SlideShape {
    let title = record.title.clone();
    let content = record.content.clone();
    let image = record.image_url.clone();

    match record.layout {
        Layout::Title => SlideShape::Title {
            heading: title,
            subheading: content,
        },
        Layout::Section => SlideShape::Section { heading: title },
        Layout::Content => SlideShape::Content {
            heading: title,
            body: content,
            image,
        },
        Layout::TwoColumn => {
            let (left, right) = split_columns(&content);
            let right = match &image {
                Some(url) if !is_diagram_image(url) => Column::Image(url.clone()),
                _ => Column::Text(right),
            };
            SlideShape::TwoColumn {
                heading: title,
                left: Column::Text(left),
                right,
            }
        }
        Layout::Quote => SlideShape::Quote {
            quote: content,
            attribution: title,
        },
        Layout::MainPoint => SlideShape::MainPoint {
            heading: title,
            caption: content,
        },
        Layout::BigNumber => SlideShape::BigNumber {
            number: title,
            caption: content,
        },
        Layout::Caption => SlideShape::Caption {
            image,
            caption: title,
        },
        Layout::Blank => SlideShape::Blank { image },
    }
}

/// Splits body text into display lines with bullet markers stripped.
/// Non-bullet lines pass through; blank lines are dropped.
pub fn extract_bullets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .unwrap_or(trimmed)
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Drives one backend over a whole deck.
///
/// A backend failure on a single slide degrades that slide to a plain
/// heading-and-body shape and continues; only a failure of the degraded
/// shape, or of the package itself, aborts the deck.
pub fn render_deck(
    deck: &crate::models::Deck,
    backend: &mut dyn DeckBackend,
) -> Result<Vec<u8>, BackendError> {
    backend.begin(&deck.metadata())?;
    for record in deck {
        let shape = build_shape(record);
        if let Err(e) = backend.slide(record, &shape) {
            warn!(
                "Slide {} failed to render, degrading to plain content: {}",
                record.slide_number, e
            );
            let fallback = SlideShape::Content {
                heading: record.title.clone(),
                body: record.content.clone(),
                image: None,
            };
            backend.slide(record, &fallback)?;
        }
    }
    backend.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Deck;

    fn record(layout: Layout) -> SlideRecord {
        SlideRecord {
            slide_number: 1,
            title: "T".to_string(),
            content: "- a\n- b".to_string(),
            layout,
            chart_type: None,
            diagram_type: None,
            diagram_content: None,
            image_description: None,
            image_url: None,
            facilitator_notes: None,
            start_time: None,
            end_time: None,
            materials: None,
            worksheet: None,
            improvements: None,
            notes: None,
        }
    }

    #[test]
    fn two_column_image_replaces_the_right_block_unless_it_is_a_diagram() {
        let mut rec = record(Layout::TwoColumn);
        rec.image_url = Some("images/photo.png".to_string());
        match build_shape(&rec) {
            SlideShape::TwoColumn { right, .. } => {
                assert_eq!(right, Column::Image("images/photo.png".to_string()));
            }
            other => panic!("expected two-column shape, got {other:?}"),
        }

        rec.image_url = Some("images/deck_diagram_slide1.png".to_string());
        match build_shape(&rec) {
            SlideShape::TwoColumn { right, .. } => {
                assert_eq!(right, Column::Text("- b".to_string()));
            }
            other => panic!("expected two-column shape, got {other:?}"),
        }
    }

    #[test]
    fn quote_and_big_number_swap_title_and_content_roles() {
        let mut rec = record(Layout::Quote);
        rec.content = "Less is more".to_string();
        assert_eq!(
            build_shape(&rec),
            SlideShape::Quote {
                quote: "Less is more".to_string(),
                attribution: "T".to_string(),
            }
        );

        let mut rec = record(Layout::BigNumber);
        rec.title = "42%".to_string();
        rec.content = "of attendees".to_string();
        assert_eq!(
            build_shape(&rec),
            SlideShape::BigNumber {
                number: "42%".to_string(),
                caption: "of attendees".to_string(),
            }
        );
    }

    #[test]
    fn bullets_strip_markers_and_keep_plain_lines() {
        let bullets = extract_bullets("Intro\n- one\n* two\n\n  - three");
        assert_eq!(bullets, ["Intro", "one", "two", "three"]);
    }

    struct FlakyBackend {
        rendered: Vec<String>,
        fail_on_two_column: bool,
    }

    impl DeckBackend for FlakyBackend {
        fn extension(&self) -> &'static str {
            "txt"
        }

        fn begin(&mut self, _meta: &DeckMetadata) -> Result<(), BackendError> {
            Ok(())
        }

        fn slide(&mut self, record: &SlideRecord, shape: &SlideShape) -> Result<(), BackendError> {
            if self.fail_on_two_column && matches!(shape, SlideShape::TwoColumn { .. }) {
                return Err(BackendError::Package("no columns today".to_string()));
            }
            self.rendered.push(record.title.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<Vec<u8>, BackendError> {
            Ok(self.rendered.join("\n").into_bytes())
        }
    }

    #[test]
    fn a_failing_slide_degrades_instead_of_aborting_the_deck() {
        let deck = Deck::new(vec![record(Layout::Content), record(Layout::TwoColumn)]);
        let mut backend = FlakyBackend {
            rendered: Vec::new(),
            fail_on_two_column: true,
        };
        let bytes = render_deck(&deck, &mut backend).unwrap();
        // Both slides made it out; the second as plain content.
        assert_eq!(String::from_utf8(bytes).unwrap(), "T\nT");
    }
}
