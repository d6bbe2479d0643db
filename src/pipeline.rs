//! Run orchestration: samples in, per-frame artifacts and reports out.
//!
//! Samples and frames are processed strictly one at a time so reports come
//! out in document order and the single render worker never sees two
//! requests at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::codegen::{
    convert, AssetRepository, HtmlCssGenerator, ImageResolver, MarkupGenerator,
    SourceImageResolver,
};
use crate::config::Config;
use crate::diff::PerceptualDiff;
use crate::error::ErrorCategory;
use crate::figma::{build_source, DesignSource, ExportSet};
use crate::frames::{extract_frames, frame_ids, Frame};
use crate::manifest::Sample;
use crate::raster::{PlaywrightWorker, Rasterizer, WorkerOptions};
use crate::reference::ReferenceFetcher;
use crate::report::{assemble_report, EngineInfo, Report};
use crate::store::{ArtifactStore, FrameArtifacts};
use crate::{DcovError, Result, Viewport};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub skip_if_report_exists: bool,
    pub frame_timeout: Duration,
    pub diff_tolerance: u8,
    pub engine: EngineInfo,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_if_report_exists: false,
            frame_timeout: crate::config::DEFAULT_FRAME_TIMEOUT,
            diff_tolerance: crate::config::DEFAULT_DIFF_TOLERANCE,
            engine: EngineInfo::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            skip_if_report_exists: config.skip_if_report_exists,
            frame_timeout: config.frame_timeout,
            diff_tolerance: config.diff_tolerance,
            engine: config.engine.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SourceNotFound,
    ExportsUnavailable,
    /// Any other failure fetching the document or its exports.
    SourceError,
}

impl SkipReason {
    fn from_error(err: &DcovError) -> Self {
        match err {
            DcovError::SourceNotFound { .. } => SkipReason::SourceNotFound,
            DcovError::ExportsUnavailable { .. } => SkipReason::ExportsUnavailable,
            _ => SkipReason::SourceError,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    Reported { mismatch_percent: f64 },
    /// A report from an earlier run already exists.
    Skipped,
    Failed {
        category: ErrorCategory,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub frame_id: String,
    pub name: String,
    pub status: FrameStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleStatus {
    Processed { frames: Vec<FrameOutcome> },
    Skipped { reason: SkipReason, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub sample_id: String,
    pub status: SampleStatus,
}

impl SampleOutcome {
    pub fn frames(&self) -> &[FrameOutcome] {
        match &self.status {
            SampleStatus::Processed { frames } => frames,
            SampleStatus::Skipped { .. } => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SampleStatus::Skipped { .. })
    }
}

/// Outcomes of one run, in manifest then document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub samples: Vec<SampleOutcome>,
}

impl RunSummary {
    fn frames(&self) -> impl Iterator<Item = &FrameOutcome> {
        self.samples.iter().flat_map(|s| s.frames().iter())
    }

    pub fn reported(&self) -> usize {
        self.frames()
            .filter(|f| matches!(f.status, FrameStatus::Reported { .. }))
            .count()
    }

    pub fn skipped_frames(&self) -> usize {
        self.frames()
            .filter(|f| f.status == FrameStatus::Skipped)
            .count()
    }

    pub fn failed_frames(&self) -> usize {
        self.frames()
            .filter(|f| matches!(f.status, FrameStatus::Failed { .. }))
            .count()
    }

    pub fn skipped_samples(&self) -> usize {
        self.samples.iter().filter(|s| s.is_skipped()).count()
    }

    /// Some sample was skipped or some frame failed.
    pub fn has_gaps(&self) -> bool {
        self.skipped_samples() > 0 || self.failed_frames() > 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.has_gaps() {
            1
        } else {
            0
        }
    }
}

pub struct Pipeline {
    source: Arc<dyn DesignSource>,
    generator: Arc<dyn MarkupGenerator>,
    rasterizer: Arc<dyn Rasterizer>,
    differ: PerceptualDiff,
    fetcher: ReferenceFetcher,
    store: ArtifactStore,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn DesignSource>,
        generator: Arc<dyn MarkupGenerator>,
        rasterizer: Arc<dyn Rasterizer>,
        store: ArtifactStore,
        options: PipelineOptions,
    ) -> Result<Self> {
        Ok(Self {
            source,
            generator,
            rasterizer,
            differ: PerceptualDiff::new(options.diff_tolerance),
            fetcher: ReferenceFetcher::new()?,
            store,
            options,
        })
    }

    /// Wire the production collaborators: configured design source, HTML/CSS
    /// codegen and the Playwright render worker.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = build_source(config)?;
        let rasterizer = PlaywrightWorker::new(WorkerOptions {
            node_command: config.node_command.clone(),
            render_timeout: config.render_timeout,
            ..WorkerOptions::default()
        });
        Self::new(
            source,
            Arc::new(HtmlCssGenerator::new()),
            Arc::new(rasterizer),
            ArtifactStore::new(&config.out_dir),
            PipelineOptions::from_config(config),
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Launch the worker, process every sample, and always terminate the
    /// worker. Only worker lifecycle failures (and other fatal errors)
    /// surface as `Err`.
    pub async fn run(&self, samples: &[Sample]) -> Result<RunSummary> {
        if let Err(err) = self.rasterizer.launch().await {
            if let Err(term) = self.rasterizer.terminate().await {
                warn!(error = %term, "terminate after failed launch also failed");
            }
            return Err(as_lifecycle(err));
        }

        let result = self.process_samples(samples).await;
        let terminated = self.rasterizer.terminate().await.map_err(as_lifecycle);

        let summary = result?;
        terminated?;

        info!(
            samples = summary.samples.len(),
            skipped_samples = summary.skipped_samples(),
            reported = summary.reported(),
            skipped_frames = summary.skipped_frames(),
            failed = summary.failed_frames(),
            "run complete"
        );
        Ok(summary)
    }

    async fn process_samples(&self, samples: &[Sample]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for sample in samples {
            summary.samples.push(self.process_sample(sample).await?);
        }
        Ok(summary)
    }

    pub async fn process_sample(&self, sample: &Sample) -> Result<SampleOutcome> {
        let sample_id = sample.id.as_str();

        let file = match self.source.fetch_file(sample_id).await {
            Ok(file) => file,
            Err(err) => return skip_sample(sample_id, err),
        };
        let frames = extract_frames(&file);
        let ids = frame_ids(&frames);

        let exports = match self.source.fetch_exports(sample_id, &ids).await {
            Ok(exports) => exports,
            Err(err) => return skip_sample(sample_id, err),
        };

        info!(sample = sample_id, frames = frames.len(), "processing sample");

        let assets = AssetRepository::for_sample(sample_id);
        let resolver = SourceImageResolver::new(self.source.as_ref(), sample_id);

        let mut outcomes = Vec::with_capacity(frames.len());
        for frame in &frames {
            let status = self
                .process_frame(sample_id, frame, &exports, &assets, &resolver)
                .await?;
            outcomes.push(FrameOutcome {
                frame_id: frame.id.to_string(),
                name: frame.name.to_string(),
                status,
            });
        }

        Ok(SampleOutcome {
            sample_id: sample_id.to_string(),
            status: SampleStatus::Processed { frames: outcomes },
        })
    }

    async fn process_frame(
        &self,
        sample_id: &str,
        frame: &Frame<'_>,
        exports: &ExportSet,
        assets: &AssetRepository,
        resolver: &dyn ImageResolver,
    ) -> Result<FrameStatus> {
        let artifacts = self.store.frame(sample_id, frame.id);

        if self.options.skip_if_report_exists && self.store.exists(&artifacts.report).await {
            info!(sample = sample_id, frame = frame.id, "skipped: report exists");
            return Ok(FrameStatus::Skipped);
        }

        let attempt = self.render_frame(sample_id, frame, exports, assets, resolver, &artifacts);
        let err = match timeout(self.options.frame_timeout, attempt).await {
            Ok(Ok(report)) => {
                info!(
                    sample = sample_id,
                    frame = frame.id,
                    mismatch = report.mismatch_percent,
                    "reported"
                );
                return Ok(FrameStatus::Reported {
                    mismatch_percent: report.mismatch_percent,
                });
            }
            Ok(Err(err)) if err.is_fatal() => return Err(err),
            Ok(Err(err)) => err,
            Err(_) => DcovError::Timeout(format!(
                "frame {} did not finish within {:?}",
                frame.id, self.options.frame_timeout
            )),
        };

        if err.category() == ErrorCategory::Artifact {
            error!(sample = sample_id, frame = frame.id, error = %err, "failed");
        } else {
            warn!(sample = sample_id, frame = frame.id, error = %err, "failed");
        }
        Ok(FrameStatus::Failed {
            category: err.category(),
            message: err.to_string(),
        })
    }

    async fn render_frame(
        &self,
        sample_id: &str,
        frame: &Frame<'_>,
        exports: &ExportSet,
        assets: &AssetRepository,
        resolver: &dyn ImageResolver,
        artifacts: &FrameArtifacts,
    ) -> Result<Report> {
        let location = exports
            .get(frame.id)
            .ok_or_else(|| DcovError::MissingReference(frame.id.to_string()))?;

        self.store.ensure_dir(&artifacts.dir).await?;
        self.store.clear_frame(artifacts).await?;

        let entry = convert(frame, sample_id)?;
        let markup = self.generator.generate(&entry, assets, resolver).await?;
        self.store.write(&artifacts.index_html, &markup).await?;

        let viewport = Viewport::from_frame_size(frame.size.width, frame.size.height);
        let regenerated = self.rasterizer.render(&markup, viewport).await?;
        self.store.write(&artifacts.image_b, &regenerated).await?;

        let reference = self
            .fetcher
            .materialize(&self.store, location, &artifacts.image_a)
            .await?;

        let diff = self.differ.diff(&reference, &regenerated)?;
        self.store
            .write(&artifacts.diff_image, &diff.diff_image)
            .await?;

        let report = assemble_report(
            sample_id,
            frame.id,
            frame.name,
            viewport,
            diff.mismatch_percent,
            &self.options.engine,
        );
        // Written last: its presence marks the frame complete.
        self.store.write(&artifacts.report, report.to_json()?).await?;
        Ok(report)
    }
}

fn skip_sample(sample_id: &str, err: DcovError) -> Result<SampleOutcome> {
    if err.is_fatal() {
        return Err(err);
    }
    warn!(sample = sample_id, error = %err, "skipping sample");
    Ok(SampleOutcome {
        sample_id: sample_id.to_string(),
        status: SampleStatus::Skipped {
            reason: SkipReason::from_error(&err),
            message: err.to_string(),
        },
    })
}

fn as_lifecycle(err: DcovError) -> DcovError {
    match err {
        DcovError::WorkerLifecycle(_) => err,
        other => DcovError::WorkerLifecycle(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: &str, status: FrameStatus) -> FrameOutcome {
        FrameOutcome {
            frame_id: id.into(),
            name: id.into(),
            status,
        }
    }

    #[test]
    fn clean_run_exits_zero() {
        let summary = RunSummary {
            samples: vec![SampleOutcome {
                sample_id: "S1".into(),
                status: SampleStatus::Processed {
                    frames: vec![
                        frame("F1", FrameStatus::Reported { mismatch_percent: 0.5 }),
                        frame("F2", FrameStatus::Skipped),
                    ],
                },
            }],
        };
        assert!(!summary.has_gaps());
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.reported(), 1);
        assert_eq!(summary.skipped_frames(), 1);
    }

    #[test]
    fn skipped_sample_or_failed_frame_is_a_gap() {
        let skipped = RunSummary {
            samples: vec![SampleOutcome {
                sample_id: "S1".into(),
                status: SampleStatus::Skipped {
                    reason: SkipReason::ExportsUnavailable,
                    message: "pending".into(),
                },
            }],
        };
        assert_eq!(skipped.exit_code(), 1);

        let failed = RunSummary {
            samples: vec![SampleOutcome {
                sample_id: "S1".into(),
                status: SampleStatus::Processed {
                    frames: vec![frame(
                        "F1",
                        FrameStatus::Failed {
                            category: ErrorCategory::Render,
                            message: "boom".into(),
                        },
                    )],
                },
            }],
        };
        assert_eq!(failed.failed_frames(), 1);
        assert_eq!(failed.exit_code(), 1);
    }

    #[test]
    fn skip_reason_follows_error_kind() {
        assert_eq!(
            SkipReason::from_error(&DcovError::SourceNotFound {
                sample_id: "S".into()
            }),
            SkipReason::SourceNotFound
        );
        assert_eq!(
            SkipReason::from_error(&DcovError::source_api(None, "500")),
            SkipReason::SourceError
        );
    }

    #[test]
    fn non_lifecycle_launch_errors_become_lifecycle_errors() {
        let err = as_lifecycle(DcovError::rasterization("no chromium"));
        assert!(matches!(err, DcovError::WorkerLifecycle(msg) if msg.contains("no chromium")));
    }
}
