//! Deck-markup backend (md2gslides-compatible markdown).
//!
//! Emits one `---`-separated block per slide using the md2gslides class
//! annotations (`{.section}`, `{.big}`, `{.column}`, `{.background}`).
//! Images stay as path or URL references; the only inlining this backend
//! does is raw SVG markup, when an SVG sibling of a raster asset exists
//! and is preferred.

use log::debug;
use regex::Regex;
use std::fmt::Write;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::{DeckMetadata, SlideRecord};
use crate::render::{BackendError, Column, DeckBackend, SlideShape};

fn bullet_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[-*]\s+").expect("valid regex"))
}

/// Normalizes bullet markers to the `* ` form md2gslides expects.
fn normalize_bullets(content: &str) -> String {
    bullet_marker().replace_all(content, "* ").into_owned()
}

pub struct MarkdownBackend {
    prefer_svg: bool,
    out: String,
}

impl MarkdownBackend {
    pub fn new(prefer_svg: bool) -> Self {
        MarkdownBackend {
            prefer_svg,
            out: String::new(),
        }
    }

    /// The markup for one image reference: a literal SVG block when an SVG
    /// sibling exists and is preferred, a plain image reference otherwise.
    fn image_block(&self, url: &str) -> String {
        if self.prefer_svg && url.to_lowercase().ends_with(".png") {
            let svg_path = format!("{}.svg", &url[..url.len() - 4]);
            if let Ok(svg) = std::fs::read_to_string(Path::new(&svg_path)) {
                debug!("Inlining SVG asset {}", svg_path);
                return format!("$$$ svg\n{}\n$$$", svg.trim_end());
            }
        }
        format!("![]({url})")
    }

    fn column_block(&self, column: &Column) -> String {
        match column {
            Column::Text(text) => normalize_bullets(text),
            Column::Image(url) => self.image_block(url),
        }
    }
}

impl DeckBackend for MarkdownBackend {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn begin(&mut self, _meta: &DeckMetadata) -> Result<(), BackendError> {
        self.out.clear();
        Ok(())
    }

    fn slide(&mut self, record: &SlideRecord, shape: &SlideShape) -> Result<(), BackendError> {
        writeln!(self.out, "---")?;
        writeln!(self.out)?;

        match shape {
            SlideShape::Title {
                heading,
                subheading,
            } => {
                writeln!(self.out, "# {heading}")?;
                if !subheading.is_empty() {
                    writeln!(self.out, "\n{subheading}")?;
                }
            }
            SlideShape::Section { heading } => {
                writeln!(self.out, "# {heading} {{.section}}")?;
            }
            SlideShape::Content {
                heading,
                body,
                image,
            } => {
                writeln!(self.out, "# {heading}")?;
                if !body.is_empty() {
                    writeln!(self.out, "\n{}", normalize_bullets(body))?;
                }
                if let Some(url) = image {
                    writeln!(self.out, "\n{}", self.image_block(url))?;
                }
            }
            SlideShape::TwoColumn {
                heading,
                left,
                right,
            } => {
                writeln!(self.out, "# {heading}")?;
                writeln!(self.out, "\n{}", self.column_block(left))?;
                writeln!(self.out, "\n{{.column}}")?;
                writeln!(self.out, "\n{}", self.column_block(right))?;
            }
            SlideShape::Quote { quote, attribution } => {
                writeln!(self.out, "# {attribution}")?;
                writeln!(self.out, "\n{quote}")?;
            }
            SlideShape::MainPoint { heading, caption } => {
                writeln!(self.out, "# {heading} {{.big}}")?;
                if !caption.is_empty() {
                    writeln!(self.out, "\n{caption}")?;
                }
            }
            SlideShape::BigNumber { number, caption } => {
                writeln!(self.out, "# {number} {{.big}}")?;
                if !caption.is_empty() {
                    writeln!(self.out, "\n{caption}")?;
                }
            }
            SlideShape::Caption { image, caption } => {
                writeln!(self.out, "# {caption}")?;
                if let Some(url) = image {
                    writeln!(self.out, "\n{}", self.image_block(url))?;
                }
            }
            SlideShape::Blank { image } => {
                if let Some(url) = image {
                    writeln!(self.out, "![]({url}){{.background}}")?;
                }
            }
        }

        if let Some(notes) = record
            .facilitator_notes
            .as_deref()
            .filter(|n| !n.is_empty())
        {
            writeln!(self.out, "\n<!--\n{notes}\n-->")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(std::mem::take(&mut self.out).into_bytes())
    }
}
