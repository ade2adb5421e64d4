//! Turn facilitator-guide slide data into presentation decks.
//!
//! The pipeline takes loosely-typed slide records (JSON, possibly noisy),
//! canonicalizes them, renders referenced diagrams through an external
//! tool, and emits the deck as md2gslides markup, a `.pptx` package, or a
//! reveal.js slideshow.

pub mod assets;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod split;

pub use config::{ImageMode, PipelineConfig};
pub use errors::{PipelineError, Result};
pub use models::{Deck, Layout, SlideRecord};
pub use normalize::Normalizer;
pub use pipeline::{BatchReport, OutputFormat, Pipeline};
