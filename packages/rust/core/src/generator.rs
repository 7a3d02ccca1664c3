//! Output generators.

use async_trait::async_trait;

use bindery_shared::{Page, Result};

use crate::output::{BuildOptions, Output};

/// Produces a concrete output format from a prepared build.
///
/// Every callback receives the current state and returns the next one.
/// The default bodies pass the state through unchanged.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short identifier (e.g., `manifest`).
    fn name(&self) -> &str;

    /// Adjust the build options before the build starts.
    fn options(&self, options: BuildOptions) -> Result<BuildOptions> {
        Ok(options)
    }

    async fn on_init(&self, output: Output) -> Result<Output> {
        Ok(output)
    }

    /// Called once per asset, in sorted order.
    async fn on_asset(&self, output: Output, _asset: &str) -> Result<Output> {
        Ok(output)
    }

    /// Called once per page, in reading order.
    async fn on_page(&self, output: Output, _page: &Page) -> Result<Output> {
        Ok(output)
    }

    async fn on_finish(&self, output: Output) -> Result<Output> {
        Ok(output)
    }
}
