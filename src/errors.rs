use std::path::PathBuf;
use thiserror::Error;

/// Structural errors that abort a single deck run.
///
/// Recoverable conditions (a missing optional field, an unknown layout, a
/// single asset that cannot be produced) are absorbed and logged inside the
/// component that hit them; only unparseable input and unwritable output
/// surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The slide source could not be decoded as JSON, even after recovery.
    #[error("Failed to decode slide JSON: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// The input had a shape we do not understand (not a list of records,
    /// no slides array anywhere, a record that is not an object).
    #[error("Invalid slide input: {0}")]
    InvalidInput(String),

    /// Error loading or parsing the YAML pipeline configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Error originating from the underlying HTTP client (`reqwest`).
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// An I/O error while reading slide sources or working files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The final output document for a deck could not be written.
    #[error("Failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A renderer backend failed in a way that could not be degraded
    /// slide-by-slide (e.g. the output package itself is broken).
    #[error("Renderer failed: {0}")]
    Render(String),
}

/// A type alias for `Result<T, PipelineError>` for convenience within the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
