//! Trait seams to the external collaborators: the diagram-rendering CLI,
//! the image host, and the optional LLM-backed syntax repairer.

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Failure modes of the external diagram renderer.
#[derive(Error, Debug)]
pub enum RenderFailure {
    /// The renderer binary could not be launched, or working files could
    /// not be written.
    #[error("Failed to run diagram renderer: {0}")]
    Spawn(#[from] std::io::Error),

    /// The renderer exited unsuccessfully.
    #[error("Diagram renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The renderer claimed success but produced no usable output file.
    #[error("Diagram renderer produced an empty output file")]
    EmptyOutput,
}

/// Renders diagram source text to an image file. Text in, image bytes out;
/// may fail, and failures are recoverable for the pipeline as a whole.
pub trait DiagramRenderer {
    /// Renders `source` to `raster_out`. When `vector_out` is given the
    /// renderer may additionally produce a vector version at that path;
    /// vector failures must not fail the call.
    fn render(
        &self,
        source: &str,
        raster_out: &Path,
        vector_out: Option<&Path>,
    ) -> Result<(), RenderFailure>;
}

/// An external collaborator (an LLM in production) that attempts to repair
/// broken diagram source given the renderer's failure text.
pub trait SyntaxRepairer {
    /// Returns repaired source, or `None` when no repair was produced.
    fn repair(&self, source: &str, failure: &str) -> Option<String>;
}

/// [`DiagramRenderer`] backed by the Mermaid CLI (`mmdc`).
///
/// Writes the diagram source to a `.mmd` sibling of the output path and
/// invokes the CLI once per output format.
pub struct MermaidCli {
    command: PathBuf,
    config: Option<PathBuf>,
}

impl MermaidCli {
    pub fn new() -> Self {
        MermaidCli {
            command: PathBuf::from("mmdc"),
            config: None,
        }
    }

    /// Uses a specific binary path instead of resolving `mmdc` from PATH.
    pub fn with_command(command: PathBuf) -> Self {
        MermaidCli {
            command,
            config: None,
        }
    }

    /// Passes a Mermaid configuration file to every invocation.
    pub fn config(mut self, config: PathBuf) -> Self {
        self.config = Some(config);
        self
    }

    fn invoke(&self, input: &Path, output: &Path) -> Result<(), RenderFailure> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-i").arg(input).arg("-o").arg(output);
        if let Some(config) = &self.config {
            cmd.arg("-c").arg(config);
        }
        let result = cmd.output()?;
        if !result.status.success() {
            return Err(RenderFailure::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

impl Default for MermaidCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramRenderer for MermaidCli {
    fn render(
        &self,
        source: &str,
        raster_out: &Path,
        vector_out: Option<&Path>,
    ) -> Result<(), RenderFailure> {
        let mmd = raster_out.with_extension("mmd");
        std::fs::write(&mmd, source)?;

        self.invoke(&mmd, raster_out)?;
        let size = std::fs::metadata(raster_out).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(RenderFailure::EmptyOutput);
        }

        if let Some(vector) = vector_out {
            // Vector output is best-effort; the raster already succeeded.
            if let Err(e) = self.invoke(&mmd, vector) {
                warn!("SVG generation failed but raster succeeded: {}", e);
            }
        }
        Ok(())
    }
}

/// Failure modes of the external image store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image store returned status {status}: {body}")]
    Status { status: String, body: String },

    #[error("Image store rejected the upload: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The byte-fetch / byte-store collaborator: a URL yields bytes, bytes
/// yield a durable URL.
pub trait ImageStore {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError>;
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    success: bool,
    data: UploadData,
}

#[derive(Deserialize)]
struct UploadData {
    link: Option<String>,
    error: Option<serde_json::Value>,
}

/// [`ImageStore`] over HTTP: plain GET for fetches, an Imgur-style
/// anonymous base64 upload endpoint for stores.
pub struct HttpImageStore {
    client: reqwest::blocking::Client,
    upload_url: String,
    client_id: String,
}

impl HttpImageStore {
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpImageStore {
            client,
            upload_url: "https://api.imgur.com/3/upload".to_string(),
            client_id: "546c25a59c58ad7".to_string(),
        })
    }

    pub fn with_upload_endpoint(mut self, upload_url: String, client_id: String) -> Self {
        self.upload_url = upload_url;
        self.client_id = client_id;
        self
    }
}

impl ImageStore for HttpImageStore {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        info!("Downloading image from {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.to_string(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    fn store(&self, bytes: &[u8]) -> Result<String, StoreError> {
        info!("Uploading {} bytes to image store", bytes.len());
        let response = self
            .client
            .post(&self.upload_url)
            .header("Authorization", format!("Client-ID {}", self.client_id))
            .form(&[("image", BASE64.encode(bytes)), ("type", "base64".to_string())])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.to_string(),
                body: response.text().unwrap_or_default(),
            });
        }
        let upload: UploadResponse = response.json()?;
        if !upload.success {
            let detail = upload
                .data
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(StoreError::Rejected(detail));
        }
        upload
            .data
            .link
            .ok_or_else(|| StoreError::Rejected("response carried no link".to_string()))
    }
}
