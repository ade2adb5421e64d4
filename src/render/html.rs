//! HTML slideshow backend (reveal.js).
//!
//! Produces a single self-contained HTML document pulling reveal.js from a
//! CDN. Remote images are either inlined as base64 data URIs (the default,
//! so the file works offline) or left as external links, per
//! [`ImageMode`]. Local image paths are always left as links, since they
//! sit next to the document.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{info, warn};
use std::fmt::Write;

use crate::assets::ImageStore;
use crate::config::ImageMode;
use crate::models::{DeckMetadata, SlideRecord};
use crate::render::{extract_bullets, BackendError, Column, DeckBackend, SlideShape};

const REVEALJS_VERSION: &str = "4.6.0";

const THEMES: [&str; 10] = [
    "black", "white", "league", "beige", "sky", "night", "serif", "simple", "solarized", "moon",
];

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub struct HtmlBackend<'a> {
    theme: String,
    images: ImageMode,
    store: Option<&'a dyn ImageStore>,
    title: String,
    sections: Vec<String>,
}

impl<'a> HtmlBackend<'a> {
    /// Unknown theme names fall back to `black` rather than producing a
    /// broken stylesheet link.
    pub fn new(theme: &str, images: ImageMode) -> Self {
        let theme = if THEMES.contains(&theme) {
            theme.to_string()
        } else {
            warn!("Unknown reveal.js theme {:?}, using black", theme);
            "black".to_string()
        };
        HtmlBackend {
            theme,
            images,
            store: None,
            title: String::new(),
            sections: Vec::new(),
        }
    }

    /// Enables fetching of remote images for embedding. Without a store,
    /// remote URLs stay as links even in embed mode.
    pub fn with_store(mut self, store: &'a dyn ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Remote URLs become data URIs in embed mode; everything else passes
    /// through. A failed fetch degrades to the original link.
    fn process_image_url(&self, url: &str) -> String {
        if self.images == ImageMode::Link || !url.starts_with("http") {
            return url.to_string();
        }
        let Some(store) = self.store else {
            return url.to_string();
        };
        match store.fetch(url) {
            Ok(bytes) => {
                info!("Embedding image: {}", url);
                let content_type = sniff_content_type(&bytes);
                format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
            }
            Err(e) => {
                warn!("Failed to embed image {}: {}", url, e);
                url.to_string()
            }
        }
    }

    fn image_tag(&self, url: &str, alt: &str) -> String {
        format!(
            r#"<img src="{}" alt="{}">"#,
            self.process_image_url(url),
            escape_html(alt)
        )
    }

    fn bullet_list(&self, text: &str) -> String {
        let mut out = String::from("<ul>\n");
        for bullet in extract_bullets(text) {
            let _ = writeln!(out, "    <li>{}</li>", escape_html(&bullet));
        }
        out.push_str("</ul>");
        out
    }

    fn column_html(&self, column: &Column, alt: &str) -> String {
        match column {
            Column::Text(text) => self.bullet_list(text),
            Column::Image(url) => self.image_tag(url, alt),
        }
    }

    fn notes_html(record: &SlideRecord) -> String {
        match record.facilitator_notes.as_deref().filter(|n| !n.is_empty()) {
            Some(notes) => format!(
                "\n                <aside class=\"notes\">\n                    {}\n                </aside>",
                escape_html(notes)
            ),
            None => String::new(),
        }
    }
}

impl DeckBackend for HtmlBackend<'_> {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn begin(&mut self, meta: &DeckMetadata) -> Result<(), BackendError> {
        self.title = meta.title.clone();
        self.sections.clear();
        Ok(())
    }

    fn slide(&mut self, record: &SlideRecord, shape: &SlideShape) -> Result<(), BackendError> {
        let notes = Self::notes_html(record);
        let section = match shape {
            SlideShape::Title {
                heading,
                subheading,
            } => format!(
                "            <section class=\"title-slide\">\n                <h1>{}</h1>\n                <p>{}</p>{}\n            </section>",
                escape_html(heading),
                escape_html(subheading),
                notes
            ),
            SlideShape::Section { heading } => format!(
                "            <section class=\"section-header\">\n                <h2>{}</h2>{}\n            </section>",
                escape_html(heading),
                notes
            ),
            SlideShape::Content {
                heading,
                body,
                image,
            } => {
                let image_html = image
                    .as_deref()
                    .map(|url| format!("\n                {}", self.image_tag(url, heading)))
                    .unwrap_or_default();
                format!(
                    "            <section>\n                <h2>{}</h2>\n                {}{}{}\n            </section>",
                    escape_html(heading),
                    self.bullet_list(body),
                    image_html,
                    notes
                )
            }
            SlideShape::TwoColumn {
                heading,
                left,
                right,
            } => format!(
                "            <section class=\"two-column\">\n                <h2 style=\"width: 100%\">{}</h2>\n                <div class=\"column\">\n                    {}\n                </div>\n                <div class=\"column\">\n                    {}\n                </div>{}\n            </section>",
                escape_html(heading),
                self.column_html(left, heading),
                self.column_html(right, heading),
                notes
            ),
            SlideShape::Quote { quote, attribution } => format!(
                "            <section class=\"quote\">\n                <blockquote>\n                    \"{}\"\n                </blockquote>\n                <p><em>&mdash; {}</em></p>{}\n            </section>",
                escape_html(quote),
                escape_html(attribution),
                notes
            ),
            SlideShape::MainPoint { heading, caption } => {
                let caption_html = if caption.is_empty() {
                    String::new()
                } else {
                    format!("\n                <p>{}</p>", escape_html(caption))
                };
                format!(
                    "            <section class=\"main-point\">\n                <h2>{}</h2>{}{}\n            </section>",
                    escape_html(heading),
                    caption_html,
                    notes
                )
            }
            SlideShape::BigNumber { number, caption } => format!(
                "            <section class=\"big-number\">\n                <div class=\"number\">{}</div>\n                <div class=\"description\">{}</div>{}\n            </section>",
                escape_html(number),
                escape_html(caption),
                notes
            ),
            SlideShape::Caption { image, caption } => {
                let image_html = image
                    .as_deref()
                    .map(|url| self.image_tag(url, caption))
                    .unwrap_or_default();
                format!(
                    "            <section>\n                {}\n                <p><em>{}</em></p>{}\n            </section>",
                    image_html,
                    escape_html(caption),
                    notes
                )
            }
            SlideShape::Blank { image } => match image {
                Some(url) => format!(
                    "            <section data-background-image=\"{}\" data-background-size=\"cover\">{}\n            </section>",
                    self.process_image_url(url),
                    notes
                ),
                None => format!("            <section>{notes}</section>"),
            },
        };
        self.sections.push(section);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, BackendError> {
        let slides_html = self.sections.join("\n");
        let document = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>

    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@{version}/dist/reset.css">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@{version}/dist/reveal.css">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@{version}/dist/theme/{theme}.css">
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/reveal.js@{version}/plugin/highlight/monokai.css">

    <style>
        .reveal h1 {{ text-transform: none; }}
        .reveal h2 {{ text-transform: none; }}
        .reveal h3 {{ text-transform: none; }}

        .reveal .slides section.title-slide {{
            text-align: center;
        }}

        .reveal .slides section.section-header {{
            text-align: center;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        }}

        .reveal .slides section.section-header h2 {{
            color: white;
            font-size: 3em;
            font-weight: bold;
        }}

        .reveal .slides section.two-column {{
            display: flex;
        }}

        .reveal .slides section.two-column .column {{
            flex: 1;
            padding: 0 1em;
        }}

        .reveal .slides section.quote {{
            text-align: center;
        }}

        .reveal .slides section.quote blockquote {{
            font-size: 1.5em;
            font-style: italic;
            border-left: 5px solid #667eea;
            padding-left: 20px;
        }}

        .reveal .slides section.main-point {{
            text-align: center;
        }}

        .reveal .slides section.main-point h2 {{
            font-size: 4em;
            font-weight: bold;
            color: #667eea;
        }}

        .reveal .slides section.big-number {{
            text-align: center;
        }}

        .reveal .slides section.big-number .number {{
            font-size: 6em;
            font-weight: bold;
            color: #ff6b6b;
        }}

        .reveal .slides section.big-number .description {{
            font-size: 1.5em;
            margin-top: 0.5em;
        }}

        .reveal img {{
            max-width: 100%;
            max-height: 500px;
        }}
    </style>
</head>
<body>
    <div class="reveal">
        <div class="slides">
{slides}
        </div>
    </div>

    <script src="https://cdn.jsdelivr.net/npm/reveal.js@{version}/dist/reveal.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@{version}/plugin/notes/notes.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@{version}/plugin/markdown/markdown.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@{version}/plugin/highlight/highlight.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/reveal.js@{version}/plugin/zoom/zoom.js"></script>

    <script>
        Reveal.initialize({{
            hash: true,
            transition: 'slide',
            slideNumber: true,
            controls: true,
            progress: true,
            center: true,
            overview: true,

            plugins: [ RevealMarkdown, RevealHighlight, RevealNotes, RevealZoom ]
        }});
    </script>
</body>
</html>
"#,
            title = escape_html(&self.title),
            version = REVEALJS_VERSION,
            theme = self.theme,
            slides = slides_html,
        );
        Ok(document.into_bytes())
    }
}

/// Content type from magic bytes; remote servers lie often enough that the
/// bytes are the more reliable source.
fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else if bytes.starts_with(b"\xff\xd8") {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        "image/svg+xml"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::StoreError;
    use crate::models::{Deck, Layout};
    use crate::render::render_deck;

    fn slide(layout: Layout, title: &str, content: &str) -> SlideRecord {
        SlideRecord {
            slide_number: 1,
            title: title.to_string(),
            content: content.to_string(),
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

    struct PngStore;

    impl ImageStore for PngStore {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, StoreError> {
            Ok(b"\x89PNG\r\n\x1a\nrest".to_vec())
        }

        fn store(&self, _bytes: &[u8]) -> Result<String, StoreError> {
            Ok("http://example.test/x.png".to_string())
        }
    }

    #[test]
    fn document_carries_theme_and_escaped_titles() {
        let deck = Deck::new(vec![slide(Layout::Title, "Q&A <Session>", "Welcome")]);
        let mut backend = HtmlBackend::new("moon", ImageMode::Link);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("dist/theme/moon.css"));
        assert!(html.contains("<h1>Q&amp;A &lt;Session&gt;</h1>"));
        assert!(!html.contains("<Session>"));
    }

    #[test]
    fn unknown_theme_falls_back_to_black() {
        let backend = HtmlBackend::new("neon-disco", ImageMode::Link);
        assert_eq!(backend.theme, "black");
    }

    #[test]
    fn embed_mode_inlines_remote_images_as_data_uris() {
        let store = PngStore;
        let mut rec = slide(Layout::Content, "Pic", "");
        rec.image_url = Some("http://example.test/pic.png".to_string());
        let deck = Deck::new(vec![rec]);

        let mut backend = HtmlBackend::new("black", ImageMode::Embed).with_store(&store);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("src=\"data:image/png;base64,"));

        let mut backend = HtmlBackend::new("black", ImageMode::Link).with_store(&store);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("src=\"http://example.test/pic.png\""));
    }

    #[test]
    fn local_paths_stay_links_even_in_embed_mode() {
        let store = PngStore;
        let mut rec = slide(Layout::Content, "Pic", "");
        rec.image_url = Some("images/pic.png".to_string());
        let deck = Deck::new(vec![rec]);
        let mut backend = HtmlBackend::new("black", ImageMode::Embed).with_store(&store);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("src=\"images/pic.png\""));
    }

    #[test]
    fn blank_layout_becomes_a_background_section() {
        let mut rec = slide(Layout::Blank, "", "");
        rec.image_url = Some("images/cover.jpg".to_string());
        let deck = Deck::new(vec![rec]);
        let mut backend = HtmlBackend::new("black", ImageMode::Link);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("data-background-image=\"images/cover.jpg\""));
    }

    #[test]
    fn notes_render_into_aside_elements() {
        let mut rec = slide(Layout::Content, "T", "- a");
        rec.facilitator_notes = Some("watch the clock".to_string());
        let deck = Deck::new(vec![rec]);
        let mut backend = HtmlBackend::new("black", ImageMode::Link);
        let html = String::from_utf8(render_deck(&deck, &mut backend).unwrap()).unwrap();
        assert!(html.contains("<aside class=\"notes\">"));
        assert!(html.contains("watch the clock"));
    }
}
