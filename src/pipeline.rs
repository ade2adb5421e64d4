//! End-to-end deck processing.
//!
//! One [`Pipeline`] run takes a slide-source file through recovery,
//! normalization and asset resolution, then renders every requested output
//! format. Batches run decks independently: one failed deck is reported
//! and the rest continue.

use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::assets::{AssetCache, DiagramRenderer, DiagramResolver, ImageStore, SyntaxRepairer};
use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::models::Deck;
use crate::normalize::Normalizer;
use crate::render::{
    render_deck, DeckBackend, HtmlBackend, MarkdownBackend, PptxBackend,
};

/// The output formats a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// md2gslides deck markup.
    Markdown,
    /// Office Open XML presentation.
    Pptx,
    /// reveal.js HTML slideshow.
    Html,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] =
        [OutputFormat::Markdown, OutputFormat::Pptx, OutputFormat::Html];
}

/// Per-item outcome summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub successes: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, PipelineError)>,
}

impl BatchReport {
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    cache: AssetCache,
    renderer: &'a dyn DiagramRenderer,
    repairer: Option<&'a dyn SyntaxRepairer>,
    store: Option<&'a dyn ImageStore>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, renderer: &'a dyn DiagramRenderer) -> Result<Self> {
        let cache = AssetCache::open(&config.cache_dir)?;
        Ok(Pipeline {
            config,
            cache,
            renderer,
            repairer: None,
            store: None,
        })
    }

    /// Enables LLM-backed repair of broken diagram source.
    pub fn with_repairer(mut self, repairer: &'a dyn SyntaxRepairer) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Enables remote image fetch and embedding.
    pub fn with_store(mut self, store: &'a dyn ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Processes one slide-source file into `output_dir`.
    ///
    /// Returns the paths written, one per requested format plus the
    /// normalized slide JSON. Asset failures degrade per slide; only
    /// unparseable input or an unwritable output fails the deck.
    pub fn run_file(
        &self,
        input: &Path,
        output_dir: &Path,
        formats: &[OutputFormat],
    ) -> Result<Vec<PathBuf>> {
        info!("Processing {}", input.display());
        let text = std::fs::read_to_string(input)?;
        let normalizer = Normalizer::new(&self.config);
        let normalized = normalizer.normalize_text(&text)?;
        if normalized.fallback_layouts > 0 {
            warn!(
                "{} slide(s) used an unknown layout and fell back to content",
                normalized.fallback_layouts
            );
        }
        let mut deck = normalized.deck;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("slides");

        std::fs::create_dir_all(&self.config.images_dir)?;
        let mut resolver = DiagramResolver::new(
            &self.cache,
            self.renderer,
            &self.config.images_dir,
            self.config.backoff_base,
            stem,
        );
        if let Some(repairer) = self.repairer {
            resolver = resolver.with_repairer(repairer);
        }
        let resolved = resolver.resolve_deck(&mut deck);
        if resolved > 0 {
            info!("Resolved {} diagram(s) for {}", resolved, input.display());
        }
        if let Some(store) = self.store {
            if self.config.publish_images {
                resolver.publish_images(&mut deck, store);
            } else {
                resolver.localize_images(&mut deck, store);
            }
        }

        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::new();

        // The canonical records go back out so downstream tools (and the
        // next run) see the resolved image references.
        let json_path = output_dir.join(format!("slides_{stem}.json"));
        let json = serde_json::to_string_pretty(&deck)?;
        write_output(&json_path, json.as_bytes())?;
        written.push(json_path);

        for format in formats {
            let path = output_dir.join(format!("slides_{stem}.{}", extension(*format)));
            let bytes = self.render(&deck, *format)?;
            write_output(&path, &bytes)?;
            info!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    fn render(&self, deck: &Deck, format: OutputFormat) -> Result<Vec<u8>> {
        let mut backend: Box<dyn DeckBackend + '_> = match format {
            OutputFormat::Markdown => Box::new(MarkdownBackend::new(self.config.prefer_svg)),
            OutputFormat::Pptx => {
                let backend = PptxBackend::new();
                Box::new(match self.store {
                    Some(store) => backend.with_store(store),
                    None => backend,
                })
            }
            OutputFormat::Html => {
                let backend =
                    HtmlBackend::new(&self.config.html_theme, self.config.html_images);
                Box::new(match self.store {
                    Some(store) => backend.with_store(store),
                    None => backend,
                })
            }
        };
        render_deck(deck, backend.as_mut()).map_err(|e| PipelineError::Render(e.to_string()))
    }

    /// Runs every input sequentially, collecting per-item outcomes. A
    /// failed deck never halts the remaining ones.
    pub fn run_batch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        formats: &[OutputFormat],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for input in inputs {
            match self.run_file(input, output_dir, formats) {
                Ok(_) => report.successes.push(input.clone()),
                Err(e) => {
                    error!("Failed to process {}: {}", input.display(), e);
                    report.failures.push((input.clone(), e));
                }
            }
        }
        info!(
            "Batch finished: {} succeeded, {} failed",
            report.successes.len(),
            report.failures.len()
        );
        report
    }
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => "md",
        OutputFormat::Pptx => "pptx",
        OutputFormat::Html => "html",
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    })
}
