//! Diagram asset resolution.
//!
//! For each slide carrying diagram source text, find or produce a usable
//! local image and write its path into the slide's `image_url` field. The
//! per-diagram state machine is: cache hit -> reuse; miss -> up to three
//! render attempts (as-is after local syntax repair, then with repaired
//! source from the external repairer, then with a minimal fallback diagram
//! of a related kind); all attempts failed -> placeholder image plus an
//! error marker, never a raised error.

use log::{debug, error, info, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::assets::cache::AssetCache;
use crate::assets::external::{DiagramRenderer, ImageStore, SyntaxRepairer};
use crate::assets::{content_key, with_retry, MAX_ATTEMPTS};
use crate::models::Deck;

/// The original 1x1 transparent PNG used when every render attempt fails;
/// downstream renderers always get a real file path.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0xf8, 0xff, 0xbf, 0x06, 0x00, 0x05, 0x00, 0x01, 0xe3, 0x61, 0x72, 0xeb, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Related diagram kinds to try when the requested kind keeps failing.
fn fallback_kinds(kind: &str) -> &'static [&'static str] {
    match kind {
        "flowchart" => &["flowchart TD", "flowchart LR", "flowchart RL", "mindmap"],
        "mindmap" => &["mindmap", "flowchart TD", "flowchart LR"],
        "pie" => &["pie", "flowchart TD"],
        "quadrantChart" => &["quadrantChart", "flowchart"],
        "classDiagram" => &["classDiagram", "flowchart TD"],
        "timeline" => &["timeline", "flowchart TD"],
        _ => &[],
    }
}

fn type_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(flowchart|mindmap|classDiagram|pie|quadrantChart|timeline|sequenceDiagram|stateDiagram-v2|gantt|journey|gitGraph)\s*([A-Z]{2})?",
        )
        .expect("valid regex")
    })
}

/// Checks whether the source plausibly starts with a recognized diagram
/// type, or at least contains edge syntax.
fn looks_like_diagram(source: &str) -> bool {
    if type_token().is_match(source.trim()) {
        return true;
    }
    ["-->", "-.->", "===>", "---|", "-.-|", "===|"]
        .iter()
        .any(|token| source.contains(token))
}

/// Local, renderer-free repair: substitute a minimal diagram for empty
/// source and make sure the source begins with its type token.
fn repair_source(source: &str, kind: &str) -> String {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return minimal_diagram(kind);
    }
    let lower = trimmed.to_lowercase();
    if kind.eq_ignore_ascii_case("flowchart") && !lower.starts_with("flowchart") {
        return format!("flowchart TD\n{source}");
    }
    if !lower.starts_with(&kind.to_lowercase()) {
        return format!("{kind}\n{source}");
    }
    source.to_string()
}

fn minimal_diagram(kind: &str) -> String {
    match kind.to_lowercase().as_str() {
        "flowchart" => "flowchart TD\n    A[Start] --> B[Process]".to_string(),
        "mindmap" => "mindmap\n    root(Main Topic)".to_string(),
        other => format!("{other}\n    A[Item 1]"),
    }
}

/// Resolves diagram descriptors (and remote image URLs) into local files,
/// mutating only the `image_url` field of the slides it touches.
pub struct DiagramResolver<'a> {
    cache: &'a AssetCache,
    renderer: &'a dyn DiagramRenderer,
    repairer: Option<&'a dyn SyntaxRepairer>,
    images_dir: PathBuf,
    backoff_base: Duration,
    /// Base token used in output filenames, typically the source stem.
    source_name: String,
    failures: usize,
}

impl<'a> DiagramResolver<'a> {
    pub fn new(
        cache: &'a AssetCache,
        renderer: &'a dyn DiagramRenderer,
        images_dir: &Path,
        backoff_base: Duration,
        source_name: &str,
    ) -> Self {
        DiagramResolver {
            cache,
            renderer,
            repairer: None,
            images_dir: images_dir.to_path_buf(),
            backoff_base,
            source_name: source_name.to_string(),
            failures: 0,
        }
    }

    pub fn with_repairer(mut self, repairer: &'a dyn SyntaxRepairer) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Slides whose diagrams ended in a placeholder during this run.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Fills `image_url` for every slide carrying diagram source.
    /// Returns the number of slides updated.
    pub fn resolve_deck(&mut self, deck: &mut Deck) -> usize {
        let mut changes = 0;
        for slide in &mut deck.slides {
            let (Some(kind), Some(source)) =
                (slide.diagram_kind().map(str::to_string), slide.diagram_content.clone())
            else {
                continue;
            };
            if source.trim().is_empty() || source == "null" {
                continue;
            }
            match self.resolve_diagram(&kind, &source, slide.slide_number) {
                Some(path) => {
                    info!(
                        "Slide {}: diagram resolved to {}",
                        slide.slide_number,
                        path.display()
                    );
                    slide.image_url = Some(path.to_string_lossy().into_owned());
                    changes += 1;
                }
                None => {
                    error!("Slide {}: failed to produce a diagram image", slide.slide_number);
                }
            }
        }
        changes
    }

    /// Replaces remote `image_url`s with locally cached copies fetched
    /// through the image store. Fetch failures leave the URL untouched.
    pub fn localize_images(&self, deck: &mut Deck, store: &dyn ImageStore) -> usize {
        let mut changes = 0;
        for slide in &mut deck.slides {
            let Some(url) = slide.image_url.clone() else {
                continue;
            };
            if !url.starts_with("http") {
                continue;
            }
            match self.cache.get_image(&url, store, self.backoff_base) {
                Ok(path) => {
                    slide.image_url = Some(path.to_string_lossy().into_owned());
                    changes += 1;
                }
                Err(e) => {
                    warn!("Slide {}: could not localize {}: {}", slide.slide_number, url, e);
                }
            }
        }
        changes
    }

    /// The inverse of [`localize_images`](Self::localize_images): uploads
    /// local image files to the store and rewrites slide references to
    /// the hosted URLs. Upload failures leave the local path in place.
    pub fn publish_images(&self, deck: &mut Deck, store: &dyn ImageStore) -> usize {
        let mut changes = 0;
        for slide in &mut deck.slides {
            let Some(path) = slide.image_url.clone() else {
                continue;
            };
            if path.starts_with("http") {
                continue;
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Slide {}: cannot read {} for upload: {}", slide.slide_number, path, e);
                    continue;
                }
            };
            match with_retry("image upload", self.backoff_base, |_| store.store(&bytes)) {
                Ok(url) => {
                    info!("Slide {}: published {} as {}", slide.slide_number, path, url);
                    slide.image_url = Some(url);
                    changes += 1;
                }
                Err(e) => {
                    warn!("Slide {}: upload of {} failed: {}", slide.slide_number, path, e);
                }
            }
        }
        changes
    }

    /// The per-diagram state machine. Returns a usable local path, or
    /// `None` only when even the placeholder could not be written.
    pub fn resolve_diagram(&mut self, kind: &str, source: &str, slide_num: u32) -> Option<PathBuf> {
        let hash = content_key(source);
        if let Some(path) = self.cache.lookup_diagram(&hash) {
            info!("Slide {}: reusing cached diagram {}", slide_num, hash);
            return Some(path);
        }

        let kind_slug = kind.to_lowercase().replace(' ', "_");
        let output_name = format!("{}_slide{}_{}", self.source_name, slide_num, kind_slug);
        let png = self.images_dir.join(format!("{output_name}.png"));
        let svg = self.images_dir.join(format!("{output_name}.svg"));

        // Degraded path: an earlier run may have left the file behind
        // without a cache entry.
        if png.exists() && file_size(&png) > 0 {
            info!("Slide {}: diagram file already exists, reusing it", slide_num);
            self.record(&hash, &png, kind);
            return Some(png);
        }

        let mut current = if looks_like_diagram(source) {
            source.to_string()
        } else {
            warn!("Slide {}: diagram source looks invalid, repairing locally", slide_num);
            repair_source(source, kind)
        };
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt == 2 {
                if let Some(repairer) = self.repairer {
                    if let Some(fixed) = repairer.repair(&current, &last_error) {
                        info!("Slide {}: applying externally repaired diagram source", slide_num);
                        current = fixed;
                    }
                }
            } else if attempt == 3 {
                if let Some(fallback) = fallback_kinds(kind).first() {
                    info!("Slide {}: trying fallback diagram type {}", slide_num, fallback);
                    current = format!("{fallback}\n    A[Start] --> B[End]");
                }
            }

            debug!(
                "Rendering diagram for slide {} (attempt {}/{})",
                slide_num, attempt, MAX_ATTEMPTS
            );
            match self.renderer.render(&current, &png, Some(&svg)) {
                Ok(()) if file_size(&png) > 0 => {
                    info!("Successfully rendered diagram for slide {}", slide_num);
                    self.record(&hash, &png, kind);
                    return Some(png);
                }
                Ok(()) => {
                    last_error = "empty output file".to_string();
                    warn!("Empty diagram output for slide {}", slide_num);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Diagram render error for slide {} (attempt {}/{}): {}",
                        slide_num, attempt, MAX_ATTEMPTS, last_error
                    );
                }
            }

            if attempt < MAX_ATTEMPTS {
                let delay = self.backoff_base * 2u32.pow(attempt - 1);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }

        error!(
            "Failed to render diagram after {} attempts for slide {}",
            MAX_ATTEMPTS, slide_num
        );
        self.failures += 1;
        self.write_placeholder(&png, kind, slide_num, &last_error)
    }

    fn record(&self, hash: &str, png: &Path, kind: &str) {
        if let Err(e) = self.cache.insert_diagram(hash, png, Some(kind)) {
            warn!("Error saving cache index: {}", e);
        }
    }

    fn write_placeholder(
        &self,
        png: &Path,
        kind: &str,
        slide_num: u32,
        last_error: &str,
    ) -> Option<PathBuf> {
        let marker = format!(
            "Failed to render diagram for slide {}\nOriginal diagram type: {}\nError: {}\n",
            slide_num, kind, last_error
        );
        let marker_path = PathBuf::from(format!("{}.error", png.display()));
        if let Err(e) = std::fs::write(&marker_path, marker) {
            warn!("Error writing diagram error marker: {}", e);
        }
        match std::fs::write(png, PLACEHOLDER_PNG) {
            Ok(()) => {
                info!("Created placeholder image for slide {}", slide_num);
                Some(png.to_path_buf())
            }
            Err(e) => {
                error!("Failed to create placeholder image: {}", e);
                None
            }
        }
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::external::RenderFailure;
    use std::cell::Cell;

    struct CountingRenderer {
        calls: Cell<u32>,
        fail: bool,
    }

    impl DiagramRenderer for CountingRenderer {
        fn render(
            &self,
            _source: &str,
            raster_out: &Path,
            _vector_out: Option<&Path>,
        ) -> Result<(), RenderFailure> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(RenderFailure::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "parse error".to_string(),
                })
            } else {
                std::fs::write(raster_out, b"fake png")?;
                Ok(())
            }
        }
    }

    fn setup(dir: &Path) -> AssetCache {
        AssetCache::open(&dir.join("cache")).unwrap()
    }

    #[test]
    fn identical_source_hits_cache_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let cache = setup(dir.path());
        let renderer = CountingRenderer {
            calls: Cell::new(0),
            fail: false,
        };
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let mut resolver =
            DiagramResolver::new(&cache, &renderer, &images, Duration::ZERO, "deck");

        let source = "flowchart TD\n    A --> B";
        let first = resolver.resolve_diagram("flowchart", source, 3).unwrap();
        let second = resolver.resolve_diagram("flowchart", source, 7).unwrap();
        assert_eq!(first, second);
        assert_eq!(renderer.calls.get(), 1, "second call must be a cache hit");
    }

    #[test]
    fn always_failing_renderer_yields_placeholder_after_three_attempts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let cache = setup(dir.path());
        let renderer = CountingRenderer {
            calls: Cell::new(0),
            fail: true,
        };
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let mut resolver =
            DiagramResolver::new(&cache, &renderer, &images, Duration::ZERO, "deck");

        let path = resolver
            .resolve_diagram("flowchart", "flowchart TD\n    A --> B", 1)
            .expect("placeholder path is non-null");
        assert_eq!(renderer.calls.get(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), PLACEHOLDER_PNG);
        assert!(PathBuf::from(format!("{}.error", path.display())).exists());
        assert_eq!(resolver.failures(), 1);
    }

    #[test]
    fn resolve_deck_overwrites_image_url_from_diagram_source_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = setup(dir.path());
        let renderer = CountingRenderer {
            calls: Cell::new(0),
            fail: false,
        };
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let mut resolver =
            DiagramResolver::new(&cache, &renderer, &images, Duration::ZERO, "deck");

        let raw = vec![
            serde_json::json!({
                "title": "Flow",
                "diagram_type": "flowchart",
                "diagram_content": "flowchart TD\n    A --> B"
            }),
            serde_json::json!({"title": "Plain", "image_url": "photo.png"}),
        ];
        let normalizer = crate::normalize::Normalizer::new(&crate::config::PipelineConfig::default());
        let mut deck = normalizer.normalize(&raw).unwrap().deck;

        let changes = resolver.resolve_deck(&mut deck);
        assert_eq!(changes, 1);
        assert!(deck.slides[0].image_url.as_deref().unwrap().ends_with(".png"));
        // A slide without diagram source keeps its image reference.
        assert_eq!(deck.slides[1].image_url.as_deref(), Some("photo.png"));
    }

    #[test]
    fn empty_source_is_repaired_to_a_minimal_diagram() {
        assert_eq!(
            repair_source("", "flowchart"),
            "flowchart TD\n    A[Start] --> B[Process]"
        );
        assert_eq!(repair_source("", "mindmap"), "mindmap\n    root(Main Topic)");
        assert_eq!(
            repair_source("A --> B", "flowchart"),
            "flowchart TD\nA --> B"
        );
        assert_eq!(
            repair_source("flowchart LR\nA --> B", "flowchart"),
            "flowchart LR\nA --> B"
        );
    }

    #[test]
    fn publish_swaps_local_paths_for_hosted_urls() {
        use crate::assets::external::{ImageStore, StoreError};

        struct HostingStore;

        impl ImageStore for HostingStore {
            fn fetch(&self, _url: &str) -> Result<Vec<u8>, StoreError> {
                Ok(Vec::new())
            }

            fn store(&self, _bytes: &[u8]) -> Result<String, StoreError> {
                Ok("https://host.test/abc.png".to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cache = setup(dir.path());
        let renderer = CountingRenderer {
            calls: Cell::new(0),
            fail: false,
        };
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let local = images.join("photo.png");
        std::fs::write(&local, b"png").unwrap();
        let resolver = DiagramResolver::new(&cache, &renderer, &images, Duration::ZERO, "deck");

        let raw = vec![
            serde_json::json!({"title": "Local", "image_url": local.to_str().unwrap()}),
            serde_json::json!({"title": "Hosted", "image_url": "http://already.test/x.png"}),
        ];
        let normalizer =
            crate::normalize::Normalizer::new(&crate::config::PipelineConfig::default());
        let mut deck = normalizer.normalize(&raw).unwrap().deck;

        assert_eq!(resolver.publish_images(&mut deck, &HostingStore), 1);
        assert_eq!(
            deck.slides[0].image_url.as_deref(),
            Some("https://host.test/abc.png")
        );
        assert_eq!(
            deck.slides[1].image_url.as_deref(),
            Some("http://already.test/x.png")
        );
    }

    #[test]
    fn syntax_sniffing_accepts_type_tokens_and_edges() {
        assert!(looks_like_diagram("flowchart TD\nA --> B"));
        assert!(looks_like_diagram("mindmap\n  root(Topic)"));
        assert!(looks_like_diagram("A --> B"));
        assert!(!looks_like_diagram("just a sentence"));
    }
}
