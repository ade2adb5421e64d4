//! Asset production and caching.
//!
//! Everything that talks to the outside world (the diagram CLI, the image
//! host, the optional LLM syntax repairer) sits behind the traits in
//! [`external`]; the cache and resolver only see those seams.

pub mod cache;
pub mod diagram;
pub mod external;

pub use cache::{AssetCache, CacheEntry};
pub use diagram::DiagramResolver;
pub use external::{
    DiagramRenderer, HttpImageStore, ImageStore, MermaidCli, RenderFailure, StoreError,
    SyntaxRepairer,
};

use log::warn;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::time::Duration;

/// Uniform attempt limit for all network-like operations.
pub const MAX_ATTEMPTS: u32 = 3;

/// Content-addressed cache key: truncated hex sha256 of the source text.
pub fn content_key(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex::encode(digest)[..10].to_string()
}

/// Runs `op` up to [`MAX_ATTEMPTS`] times with exponential backoff between
/// attempts (base * 2^attempt). Attempt numbers passed to `op` are 1-based.
pub(crate) fn with_retry<T, E: Display>(
    what: &str,
    backoff_base: Duration,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_ATTEMPTS => {
                let delay = backoff_base * 2u32.pow(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    what, attempt, MAX_ATTEMPTS, e, delay
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
