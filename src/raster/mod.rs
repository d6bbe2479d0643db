//! Rasterization: markup in, PNG bytes out.

mod script;
pub mod worker;

use async_trait::async_trait;

pub use worker::{PlaywrightWorker, WorkerOptions};

use crate::{Result, Viewport};

/// A headless-browser session shared by every frame of a run.
///
/// `launch` is called once before the first render and `terminate` once at
/// the end of the run, including after fatal errors. `terminate` must be
/// safe to call more than once.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn launch(&self) -> Result<()>;

    /// Render `markup` at exactly `viewport` pixels and return PNG bytes.
    async fn render(&self, markup: &str, viewport: Viewport) -> Result<Vec<u8>>;

    async fn terminate(&self) -> Result<()>;
}
