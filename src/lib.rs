//! Design Coverage (dcov) Library
//!
//! Visual regression for design-to-code conversion: each top-level frame of
//! a design file is converted to HTML/CSS, rasterized in a headless browser,
//! and diffed against the design tool's own export of that frame.
//!
//! # Module Overview
//!
//! - [`manifest`] - Sample manifest loading
//! - [`figma`] - Design sources (Figma REST, local archive, response cache)
//! - [`frames`] - Frame extraction from a design document
//! - [`codegen`] - Conversion and HTML/CSS generation
//! - [`raster`] - Headless browser rasterization worker
//! - [`diff`] - Perceptual image diff
//! - [`reference`] - Reference export materialization
//! - [`report`] - The per-frame `report.json` record
//! - [`store`] - Artifact directory layout
//! - [`pipeline`] - Run orchestration
//! - [`config`] - Configuration file support
//!
//! # Example
//!
//! ```no_run
//! use dcov_lib::{load_manifest, Config, Pipeline};
//!
//! # async fn example() -> dcov_lib::Result<()> {
//! let config = Config::load(None)?;
//! config.validate()?;
//! let samples = load_manifest(config.sample.as_deref().unwrap_or("samples.json".as_ref()))?;
//! let summary = Pipeline::from_config(&config)?.run(&samples).await?;
//! println!("{} frames reported", summary.reported());
//! # Ok(())
//! # }
//! ```

pub mod codegen;
pub mod config;
pub mod diff;
pub mod error;
pub mod figma;
pub mod frames;
pub mod manifest;
pub mod pipeline;
pub mod raster;
pub mod reference;
pub mod report;
pub mod store;
pub mod viewport;

pub use codegen::{
    AssetRepository, HtmlCssGenerator, ImageResolver, MarkupGenerator, SourceImageResolver,
};
pub use config::{Config, LocalArchive};
pub use diff::{DiffResult, PerceptualDiff};
pub use error::{DcovError, ErrorCategory, ErrorPayload, Result};
pub use figma::{
    build_source, CachedSource, DesignSource, ExportSet, FigmaAuth, FigmaFile, FigmaNode,
    FigmaRestSource, LocalArchiveSource,
};
pub use frames::{extract_frames, Frame, FrameSize};
pub use manifest::{load_manifest, Sample};
pub use pipeline::{
    FrameOutcome, FrameStatus, Pipeline, PipelineOptions, RunSummary, SampleOutcome,
    SampleStatus, SkipReason,
};
pub use raster::{PlaywrightWorker, Rasterizer, WorkerOptions};
pub use reference::ReferenceFetcher;
pub use report::{assemble_report, EngineInfo, Report};
pub use store::{ArtifactStore, FrameArtifacts};
pub use viewport::Viewport;
