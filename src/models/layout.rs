use serde::{Deserialize, Serialize};

/// The closed set of slide shapes the renderers understand.
///
/// Raw slide data carries layout names in several historical spellings
/// (upper-snake md2gslides names, lower-kebab names from older guide
/// configs); everything is funneled through [`Layout::resolve`] so the
/// renderers never see a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Large heading plus subheading.
    Title,
    /// Heading only, visually distinct divider.
    Section,
    /// Heading plus bullet list, optional image.
    Content,
    /// Heading plus left/right content blocks.
    TwoColumn,
    /// Body as blockquote, title as attribution.
    Quote,
    /// Title large and centered, optional smaller body beneath.
    MainPoint,
    /// Title rendered very large as the number, body as caption.
    BigNumber,
    /// Full-bleed image with the title as caption text.
    Caption,
    /// Full-bleed image only, or an empty canvas.
    Blank,
}

/// The outcome of resolving a raw layout identifier.
///
/// `fallback` is true only when the identifier was *unknown* and the safe
/// default was substituted; an explicit `"content"` spelling resolves with
/// `fallback == false`, so the two cases stay distinguishable in tests and
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub layout: Layout,
    pub fallback: bool,
}

impl Layout {
    /// Maps a raw layout identifier to its canonical variant.
    ///
    /// Pure many-to-one table covering the upper-snake historical names and
    /// the lower-case / kebab alternates accumulated by earlier configs.
    /// Unknown identifiers resolve to [`Layout::Content`] with the fallback
    /// flag set; callers are expected to log or count that.
    pub fn resolve(raw: &str) -> ResolvedLayout {
        let layout = match raw {
            "TITLE" | "TITLE_SLIDE" | "title" | "title-slide" => Layout::Title,
            "SECTION_HEADER" | "section" => Layout::Section,
            "TITLE_AND_BODY" | "content" | "content-focused" | "logistics" | "discussion"
            | "closing" => Layout::Content,
            "TITLE_AND_TWO_COLUMNS" | "TWO_COLUMNS" | "columns" | "two-column" | "two_column"
            | "comparison" => Layout::TwoColumn,
            "QUOTE" | "quote" => Layout::Quote,
            "MAIN_POINT" | "main_point" | "activity" => Layout::MainPoint,
            "BIG_NUMBER" | "big_number" => Layout::BigNumber,
            "CAPTION" | "caption" | "break" => Layout::Caption,
            "BLANK" | "blank" => Layout::Blank,
            _ => {
                return ResolvedLayout {
                    layout: Layout::Content,
                    fallback: true,
                }
            }
        };
        ResolvedLayout {
            layout,
            fallback: false,
        }
    }

    /// The canonical snake_case spelling, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Title => "title",
            Layout::Section => "section",
            Layout::Content => "content",
            Layout::TwoColumn => "two_column",
            Layout::Quote => "quote",
            Layout::MainPoint => "main_point",
            Layout::BigNumber => "big_number",
            Layout::Caption => "caption",
            Layout::Blank => "blank",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aliases_map_to_documented_variants() {
        let table = [
            ("TITLE", Layout::Title),
            ("TITLE_SLIDE", Layout::Title),
            ("title", Layout::Title),
            ("title-slide", Layout::Title),
            ("SECTION_HEADER", Layout::Section),
            ("section", Layout::Section),
            ("TITLE_AND_BODY", Layout::Content),
            ("content", Layout::Content),
            ("content-focused", Layout::Content),
            ("TITLE_AND_TWO_COLUMNS", Layout::TwoColumn),
            ("TWO_COLUMNS", Layout::TwoColumn),
            ("columns", Layout::TwoColumn),
            ("two-column", Layout::TwoColumn),
            ("two_column", Layout::TwoColumn),
            ("comparison", Layout::TwoColumn),
            ("QUOTE", Layout::Quote),
            ("quote", Layout::Quote),
            ("MAIN_POINT", Layout::MainPoint),
            ("main_point", Layout::MainPoint),
            ("BIG_NUMBER", Layout::BigNumber),
            ("big_number", Layout::BigNumber),
            ("CAPTION", Layout::Caption),
            ("caption", Layout::Caption),
            ("BLANK", Layout::Blank),
            ("blank", Layout::Blank),
        ];
        for (raw, expected) in table {
            let resolved = Layout::resolve(raw);
            assert_eq!(resolved.layout, expected, "alias {raw:?}");
            assert!(!resolved.fallback, "alias {raw:?} is known");
        }
    }

    #[test]
    fn unknown_identifier_falls_back_to_content_with_flag() {
        let resolved = Layout::resolve("Fancy Layout!");
        assert_eq!(resolved.layout, Layout::Content);
        assert!(resolved.fallback);

        // The explicit spelling is not the fallback path.
        assert!(!Layout::resolve("content").fallback);
    }

    #[test]
    fn serde_spelling_matches_as_str() {
        for layout in [
            Layout::Title,
            Layout::Section,
            Layout::Content,
            Layout::TwoColumn,
            Layout::Quote,
            Layout::MainPoint,
            Layout::BigNumber,
            Layout::Caption,
            Layout::Blank,
        ] {
            let json = serde_json::to_string(&layout).unwrap();
            assert_eq!(json, format!("\"{}\"", layout.as_str()));
        }
    }
}
