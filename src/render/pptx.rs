//! Presentation-document backend (Office Open XML).
//!
//! Builds a `.pptx` package from scratch: a minimal master/layout/theme
//! skeleton plus one hand-positioned slide part per record, zipped into the
//! OPC container. Geometry mirrors the long-standing 10 x 7.5 inch canvas
//! and per-layout text box positions. Images are always embedded as package
//! media, fetching remote URLs into memory first, so the document has no
//! external references.

use log::debug;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write as IoWrite};

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::assets::ImageStore;
use crate::models::{DeckMetadata, SlideRecord};
use crate::render::{extract_bullets, BackendError, Column, DeckBackend, SlideShape};

const EMU_PER_INCH: f64 = 914_400.0;
const SLIDE_WIDTH_EMU: i64 = 9_144_000;
const SLIDE_HEIGHT_EMU: i64 = 6_858_000;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH) as i64
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// One paragraph of a text box, with its run formatting.
struct Para {
    text: String,
    size_pt: u32,
    bold: bool,
    italic: bool,
    center: bool,
    bullet: bool,
}

impl Para {
    fn plain(text: &str, size_pt: u32) -> Self {
        Para {
            text: text.to_string(),
            size_pt,
            bold: false,
            italic: false,
            center: false,
            bullet: false,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn centered(mut self) -> Self {
        self.center = true;
        self
    }

    fn bulleted(mut self) -> Self {
        self.bullet = true;
        self
    }

    fn to_xml(&self) -> String {
        let mut ppr = String::new();
        if self.center || self.bullet {
            ppr.push_str("<a:pPr");
            if self.center {
                ppr.push_str(r#" algn="ctr""#);
            }
            ppr.push('>');
            if self.bullet {
                ppr.push_str(r#"<a:buChar char="&#8226;"/>"#);
            }
            ppr.push_str("</a:pPr>");
        }
        let b = if self.bold { r#" b="1""# } else { "" };
        let i = if self.italic { r#" i="1""# } else { "" };
        format!(
            r#"<a:p>{ppr}<a:r><a:rPr lang="en-US" sz="{sz}"{b}{i} dirty="0"/><a:t>{text}</a:t></a:r></a:p>"#,
            sz = self.size_pt * 100,
            text = escape_xml(&self.text),
        )
    }
}

/// A text box shape at an absolute position, sizes in inches.
fn textbox(id: u32, x: f64, y: f64, w: f64, h: f64, paras: &[Para]) -> String {
    let body: String = paras.iter().map(Para::to_xml).collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{w}" cy="{h}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"/><a:lstStyle/>{body}</p:txBody></p:sp>"#,
        x = emu(x),
        y = emu(y),
        w = emu(w),
        h = emu(h),
    )
}

/// A solid accent-colored rectangle (the section divider bar).
fn accent_bar(id: u32, x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Bar {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{w}" cy="{h}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:schemeClr val="accent1"/></a:solidFill></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p/></p:txBody></p:sp>"#,
        x = emu(x),
        y = emu(y),
        w = emu(w),
        h = emu(h),
    )
}

/// An embedded picture shape referencing the slide-local `rId2` image.
fn picture(id: u32, x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{w}" cy="{h}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        x = emu(x),
        y = emu(y),
        w = emu(w),
        h = emu(h),
    )
}

fn bullet_paras(text: &str, size_pt: u32) -> Vec<Para> {
    extract_bullets(text)
        .into_iter()
        .map(|line| Para::plain(&line, size_pt).bulleted())
        .collect()
}

fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\xff\xd8") {
        "jpg"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else {
        "png"
    }
}

struct PendingSlide {
    shapes: String,
    /// Package path of the embedded image, when the slide has one.
    media: Option<String>,
    notes: Option<String>,
}

pub struct PptxBackend<'a> {
    store: Option<&'a dyn ImageStore>,
    slides: Vec<PendingSlide>,
    media: Vec<(String, Vec<u8>)>,
}

impl<'a> PptxBackend<'a> {
    pub fn new() -> Self {
        PptxBackend {
            store: None,
            slides: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Enables fetching of remote image URLs for embedding. Without a
    /// store, only local paths can be embedded.
    pub fn with_store(mut self, store: &'a dyn ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Loads image bytes, registers them as package media, and returns the
    /// media filename for this slide's relationships.
    fn embed_image(&mut self, url: &str) -> Result<String, BackendError> {
        let bytes = if url.starts_with("http") {
            let store = self.store.ok_or_else(|| BackendError::Image {
                url: url.to_string(),
                reason: "no image store configured for remote URLs".to_string(),
            })?;
            store.fetch(url).map_err(|e| BackendError::Image {
                url: url.to_string(),
                reason: e.to_string(),
            })?
        } else {
            std::fs::read(url).map_err(|e| BackendError::Image {
                url: url.to_string(),
                reason: e.to_string(),
            })?
        };
        let name = format!("image{}.{}", self.media.len() + 1, image_extension(&bytes));
        debug!("Embedding {} as ppt/media/{}", url, name);
        self.media.push((name.clone(), bytes));
        Ok(name)
    }

    fn shapes_for(
        &mut self,
        shape: &SlideShape,
    ) -> Result<(String, Option<String>), BackendError> {
        let mut xml = String::new();
        let mut media = None;
        match shape {
            SlideShape::Title {
                heading,
                subheading,
            } => {
                xml.push_str(&textbox(
                    2,
                    0.5,
                    2.5,
                    9.0,
                    1.25,
                    &[Para::plain(heading, 44).bold().centered()],
                ));
                if !subheading.is_empty() {
                    xml.push_str(&textbox(
                        3,
                        0.5,
                        4.0,
                        9.0,
                        1.0,
                        &[Para::plain(subheading, 24).centered()],
                    ));
                }
            }
            SlideShape::Section { heading } => {
                xml.push_str(&textbox(
                    2,
                    0.0,
                    3.0,
                    10.0,
                    1.5,
                    &[Para::plain(heading, 54).bold().centered()],
                ));
                xml.push_str(&accent_bar(3, 0.0, 6.8, 10.0, 0.7));
            }
            SlideShape::Content {
                heading,
                body,
                image,
            } => {
                xml.push_str(&textbox(2, 0.5, 0.3, 9.0, 1.0, &[Para::plain(heading, 32).bold()]));
                let body_width = if image.is_some() { 5.0 } else { 9.0 };
                xml.push_str(&textbox(3, 0.5, 1.5, body_width, 5.5, &bullet_paras(body, 18)));
                if let Some(url) = image {
                    media = Some(self.embed_image(url)?);
                    xml.push_str(&picture(4, 6.0, 1.5, 3.5, 3.5));
                }
            }
            SlideShape::TwoColumn {
                heading,
                left,
                right,
            } => {
                xml.push_str(&textbox(2, 0.5, 0.3, 9.0, 1.0, &[Para::plain(heading, 32).bold()]));
                match left {
                    Column::Text(text) => {
                        xml.push_str(&textbox(3, 0.5, 1.5, 4.5, 5.0, &bullet_paras(text, 16)));
                    }
                    Column::Image(url) => {
                        media = Some(self.embed_image(url)?);
                        xml.push_str(&picture(3, 0.5, 1.5, 4.5, 5.0));
                    }
                }
                match right {
                    Column::Text(text) => {
                        xml.push_str(&textbox(4, 5.2, 1.5, 4.5, 5.0, &bullet_paras(text, 16)));
                    }
                    Column::Image(url) => {
                        media = Some(self.embed_image(url)?);
                        xml.push_str(&picture(4, 5.2, 1.5, 4.5, 5.0));
                    }
                }
            }
            SlideShape::Quote { quote, attribution } => {
                xml.push_str(&textbox(
                    2,
                    1.0,
                    2.5,
                    8.0,
                    2.0,
                    &[Para::plain(&format!("\u{201c}{quote}\u{201d}"), 32)
                        .italic()
                        .centered()],
                ));
                if !attribution.is_empty() {
                    xml.push_str(&textbox(
                        3,
                        1.0,
                        5.0,
                        8.0,
                        1.0,
                        &[Para::plain(&format!("\u{2014} {attribution}"), 18).centered()],
                    ));
                }
            }
            SlideShape::MainPoint { heading, caption } => {
                xml.push_str(&textbox(
                    2,
                    0.5,
                    2.0,
                    9.0,
                    3.0,
                    &[Para::plain(heading, 60).bold().centered()],
                ));
                if !caption.is_empty() {
                    xml.push_str(&textbox(
                        3,
                        0.5,
                        5.5,
                        9.0,
                        1.5,
                        &[Para::plain(caption, 20).centered()],
                    ));
                }
            }
            SlideShape::BigNumber { number, caption } => {
                xml.push_str(&textbox(
                    2,
                    0.5,
                    1.5,
                    9.0,
                    2.5,
                    &[Para::plain(number, 88).bold().centered()],
                ));
                if !caption.is_empty() {
                    xml.push_str(&textbox(
                        3,
                        0.5,
                        4.5,
                        9.0,
                        2.0,
                        &[Para::plain(caption, 24).centered()],
                    ));
                }
            }
            SlideShape::Caption { image, caption } => {
                if let Some(url) = image {
                    media = Some(self.embed_image(url)?);
                    xml.push_str(&picture(2, 1.0, 0.5, 8.0, 5.5));
                }
                xml.push_str(&textbox(
                    3,
                    1.0,
                    6.2,
                    8.0,
                    1.0,
                    &[Para::plain(caption, 20).italic().centered()],
                ));
            }
            SlideShape::Blank { image } => {
                if let Some(url) = image {
                    media = Some(self.embed_image(url)?);
                    xml.push_str(&picture(2, 0.0, 0.0, 10.0, 7.5));
                }
            }
        }
        Ok((xml, media))
    }
}

impl Default for PptxBackend<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckBackend for PptxBackend<'_> {
    fn extension(&self) -> &'static str {
        "pptx"
    }

    fn begin(&mut self, _meta: &DeckMetadata) -> Result<(), BackendError> {
        self.slides.clear();
        self.media.clear();
        Ok(())
    }

    fn slide(&mut self, record: &SlideRecord, shape: &SlideShape) -> Result<(), BackendError> {
        let (shapes, media) = self.shapes_for(shape)?;
        self.slides.push(PendingSlide {
            shapes,
            media,
            notes: record
                .facilitator_notes
                .clone()
                .filter(|n| !n.is_empty()),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, BackendError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        write_part(&mut zip, "[Content_Types].xml", content_types(&self.slides).as_bytes())?;
        write_part(&mut zip, "_rels/.rels", root_rels().as_bytes())?;
        write_part(
            &mut zip,
            "ppt/presentation.xml",
            presentation_xml(self.slides.len()).as_bytes(),
        )?;
        write_part(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            presentation_rels(self.slides.len()).as_bytes(),
        )?;

        write_part(&mut zip, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes())?;
        write_part(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            slide_master_rels().as_bytes(),
        )?;
        write_part(&mut zip, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes())?;
        write_part(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            slide_layout_rels().as_bytes(),
        )?;
        write_part(&mut zip, "ppt/theme/theme1.xml", theme_xml("Deck Theme").as_bytes())?;
        write_part(&mut zip, "ppt/notesMasters/notesMaster1.xml", NOTES_MASTER.as_bytes())?;
        write_part(
            &mut zip,
            "ppt/notesMasters/_rels/notesMaster1.xml.rels",
            notes_master_rels().as_bytes(),
        )?;
        write_part(&mut zip, "ppt/theme/theme2.xml", theme_xml("Notes Theme").as_bytes())?;

        for (idx, slide) in self.slides.iter().enumerate() {
            let n = idx + 1;
            write_part(
                &mut zip,
                &format!("ppt/slides/slide{n}.xml"),
                slide_xml(&slide.shapes).as_bytes(),
            )?;
            write_part(
                &mut zip,
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                slide_rels(slide, n).as_bytes(),
            )?;
            if let Some(notes) = &slide.notes {
                write_part(
                    &mut zip,
                    &format!("ppt/notesSlides/notesSlide{n}.xml"),
                    notes_slide_xml(notes).as_bytes(),
                )?;
                write_part(
                    &mut zip,
                    &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                    notes_slide_rels(n).as_bytes(),
                )?;
            }
        }

        for (name, bytes) in &self.media {
            write_part(&mut zip, &format!("ppt/media/{name}"), bytes)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

fn write_part(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    body: &[u8],
) -> Result<(), BackendError> {
    zip.start_file(name, FileOptions::default())?;
    zip.write_all(body)?;
    Ok(())
}

fn content_types(slides: &[PendingSlide]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Default Extension="png" ContentType="image/png"/>
<Default Extension="jpg" ContentType="image/jpeg"/>
<Default Extension="jpeg" ContentType="image/jpeg"/>
<Default Extension="gif" ContentType="image/gif"/>
<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>
<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>
<Override PartName="/ppt/notesMasters/notesMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml"/>
<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>
<Override PartName="/ppt/theme/theme2.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>
"#,
    );
    for (idx, slide) in slides.iter().enumerate() {
        let n = idx + 1;
        let _ = writeln!(
            out,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
        if slide.notes.is_some() {
            let _ = writeln!(
                out,
                r#"<Override PartName="/ppt/notesSlides/notesSlide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/>"#
            );
        }
    }
    out.push_str("</Types>");
    out
}

fn root_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/officeDocument" Target="ppt/presentation.xml"/>
</Relationships>"#
    )
}

fn presentation_xml(slide_count: usize) -> String {
    let mut sld_ids = String::new();
    for n in 1..=slide_count {
        let _ = write!(
            sld_ids,
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            255 + n,
            n + 2
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS}>
<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>
<p:notesMasterIdLst><p:notesMasterId r:id="rId2"/></p:notesMasterIdLst>
<p:sldIdLst>{sld_ids}</p:sldIdLst>
<p:sldSz cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}"/>
<p:notesSz cx="{SLIDE_HEIGHT_EMU}" cy="{SLIDE_WIDTH_EMU}"/>
</p:presentation>"#
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/>
<Relationship Id="rId2" Type="{REL_TYPE_BASE}/notesMaster" Target="notesMasters/notesMaster1.xml"/>
"#
    );
    for n in 1..=slide_count {
        let _ = writeln!(
            out,
            r#"<Relationship Id="rId{}" Type="{REL_TYPE_BASE}/slide" Target="slides/slide{n}.xml"/>"#,
            n + 2
        );
    }
    out.push_str("</Relationships>");
    out
}

fn slide_xml(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn slide_rels(slide: &PendingSlide, n: usize) -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
"#
    );
    if let Some(media) = &slide.media {
        let _ = writeln!(
            out,
            r#"<Relationship Id="rId2" Type="{REL_TYPE_BASE}/image" Target="../media/{media}"/>"#
        );
    }
    if slide.notes.is_some() {
        let _ = writeln!(
            out,
            r#"<Relationship Id="rId3" Type="{REL_TYPE_BASE}/notesSlide" Target="../notesSlides/notesSlide{n}.xml"/>"#
        );
    }
    out.push_str("</Relationships>");
    out
}

fn notes_slide_xml(notes: &str) -> String {
    let body = textbox(2, 0.75, 4.5, 6.0, 4.0, &[Para::plain(notes, 12)]);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notes {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{body}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
    )
}

fn notes_slide_rels(n: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/notesMaster" Target="../notesMasters/notesMaster1.xml"/>
<Relationship Id="rId2" Type="{REL_TYPE_BASE}/slide" Target="../slides/slide{n}.xml"/>
</Relationships>"#
    )
}

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

const NOTES_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notesMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/></p:notesMaster>"#;

fn slide_master_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
<Relationship Id="rId2" Type="{REL_TYPE_BASE}/theme" Target="../theme/theme1.xml"/>
</Relationships>"#
    )
}

fn slide_layout_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/>
</Relationships>"#
    )
}

fn notes_master_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">
<Relationship Id="rId1" Type="{REL_TYPE_BASE}/theme" Target="../theme/theme2.xml"/>
</Relationships>"#
    )
}

fn theme_xml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{name}"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="667EEA"/></a:accent1><a:accent2><a:srgbClr val="764BA2"/></a:accent2><a:accent3><a:srgbClr val="FF6B6B"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Deck, Layout};
    use crate::render::render_deck;
    use std::io::Read;

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

    fn unzip(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut entry = archive.by_name(name).unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn package_has_the_required_parts_and_slide_text() {
        let deck = Deck::new(vec![
            slide(Layout::Title, "Solar Basics", "An introduction"),
            slide(Layout::Content, "Agenda", "- sunrise\n- sunset"),
        ]);
        let mut backend = PptxBackend::new();
        let bytes = render_deck(&deck, &mut backend).unwrap();
        let mut archive = unzip(bytes);

        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing part {part}");
        }

        let slide1 = read_entry(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide1.contains("Solar Basics"));
        assert!(slide1.contains(r#"sz="4400""#));
        let slide2 = read_entry(&mut archive, "ppt/slides/slide2.xml");
        assert!(slide2.contains("sunrise"));
        assert!(slide2.contains("sunset"));
    }

    #[test]
    fn local_image_is_embedded_as_package_media() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("photo.png");
        std::fs::write(&img, b"\x89PNG\r\n\x1a\nrest").unwrap();

        let mut rec = slide(Layout::Caption, "A caption", "");
        rec.image_url = Some(img.to_string_lossy().into_owned());
        let deck = Deck::new(vec![rec]);
        let mut backend = PptxBackend::new();
        let bytes = render_deck(&deck, &mut backend).unwrap();
        let mut archive = unzip(bytes);

        assert!(archive.by_name("ppt/media/image1.png").is_ok());
        let rels = read_entry(&mut archive, "ppt/slides/_rels/slide1.xml.rels");
        assert!(rels.contains("../media/image1.png"));
        let slide_xml = read_entry(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide_xml.contains(r#"r:embed="rId2""#));
    }

    #[test]
    fn missing_image_degrades_the_slide_not_the_deck() {
        let mut rec = slide(Layout::Content, "Pics", "- body");
        rec.image_url = Some("/definitely/not/here.png".to_string());
        let deck = Deck::new(vec![rec, slide(Layout::Content, "Next", "- more")]);
        let mut backend = PptxBackend::new();
        let bytes = render_deck(&deck, &mut backend).unwrap();
        let mut archive = unzip(bytes);

        // Slide 1 fell back to plain content; slide 2 is untouched.
        let slide1 = read_entry(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide1.contains("Pics"));
        assert!(!slide1.contains("r:embed"));
        let slide2 = read_entry(&mut archive, "ppt/slides/slide2.xml");
        assert!(slide2.contains("Next"));
    }

    #[test]
    fn notes_produce_a_notes_slide_part() {
        let mut rec = slide(Layout::Content, "T", "- a");
        rec.facilitator_notes = Some("keep it short".to_string());
        let deck = Deck::new(vec![rec]);
        let mut backend = PptxBackend::new();
        let bytes = render_deck(&deck, &mut backend).unwrap();
        let mut archive = unzip(bytes);

        let notes = read_entry(&mut archive, "ppt/notesSlides/notesSlide1.xml");
        assert!(notes.contains("keep it short"));
        let types = read_entry(&mut archive, "[Content_Types].xml");
        assert!(types.contains("notesSlide1.xml"));
    }

    #[test]
    fn special_characters_are_escaped_in_slide_xml() {
        let deck = Deck::new(vec![slide(Layout::Content, "Q&A <live>", "- \"quotes\"")]);
        let mut backend = PptxBackend::new();
        let bytes = render_deck(&deck, &mut backend).unwrap();
        let mut archive = unzip(bytes);
        let slide1 = read_entry(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide1.contains("Q&amp;A &lt;live&gt;"));
        assert!(slide1.contains("&quot;quotes&quot;"));
    }
}
