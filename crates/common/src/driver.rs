//! Browser driver seam
//!
//! The engine only ever asks a driver for one thing: write a screenshot of
//! the current page to a path. Page interactions belong to the harness.

use async_trait::async_trait;
use std::path::Path;

use crate::Result;

/// Something that can screenshot the current page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Write a PNG of the current page to `path`.
    ///
    /// Must fail (and not leave a file behind) when the page is closed or
    /// has gone away.
    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

    /// Whether the underlying page can still be reached
    async fn is_alive(&self) -> bool {
        true
    }
}
