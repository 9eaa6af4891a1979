//! Transform executor.
//!
//! Runs one planned FFmpeg invocation end to end: existence checks, manifest
//! materialization, process execution, output verification and asset
//! registration with a provenance record. The [`TransformInvoker`] trait is
//! the seam the batch coordinator is tested through.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use vlogkit_media::{get_duration, plan, FfmpegRunner};
use vlogkit_models::{Provenance, Transform, VideoAsset};
use vlogkit_store::Store;

use crate::error::{ApiError, ApiResult};

/// The file a transformation reads from, with its asset id when the file
/// corresponds to a tracked asset.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub asset_id: Option<i64>,
}

impl SourceFile {
    pub fn untracked(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            asset_id: None,
        }
    }
}

/// Result of one successful transformation.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub output_filename: String,
    pub output_path: PathBuf,
    pub file_size: i64,
    /// Probed duration of the output; 0 when the probe failed.
    pub duration: f64,
    /// The registered asset, when a project was attached.
    pub asset: Option<VideoAsset>,
}

/// Seam between the batch coordinator and the engine.
#[async_trait]
pub trait TransformInvoker: Send + Sync {
    async fn invoke(
        &self,
        source: &SourceFile,
        transform: &Transform,
        project_id: Option<i64>,
    ) -> ApiResult<TransformOutcome>;
}

/// Executes transformations against the upload directory.
pub struct TransformEngine {
    store: Arc<Store>,
    workdir: PathBuf,
    timeout_secs: Option<u64>,
}

impl TransformEngine {
    pub fn new(store: Arc<Store>, workdir: PathBuf, timeout_secs: Option<u64>) -> Self {
        Self {
            store,
            workdir,
            timeout_secs,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run one transformation. When `project_id` is set the produced file is
    /// registered as a new asset carrying a provenance record, which also
    /// advances the project's `updated_at`.
    pub async fn execute(
        &self,
        source: &SourceFile,
        transform: &Transform,
        project_id: Option<i64>,
    ) -> ApiResult<TransformOutcome> {
        self.ensure_inputs_exist(source, transform).await?;

        // Compress-to-size needs the source duration to derive a bitrate.
        let source_duration = match transform {
            Transform::Compress {
                target_size_kb: Some(_),
                ..
            } => Some(get_duration(self.workdir.join(&source.filename)).await?),
            _ => None,
        };

        let plan = plan(&self.workdir, &source.filename, transform, source_duration)?;

        if let Some(manifest) = &plan.manifest {
            tokio::fs::write(&manifest.path, &manifest.contents).await?;
        }

        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        let run_result = runner.run(&plan.command).await;

        // The manifest is a scoped artifact, removed on success and failure.
        if let Some(manifest) = &plan.manifest {
            if let Err(e) = tokio::fs::remove_file(&manifest.path).await {
                warn!(path = %manifest.path.display(), error = %e, "failed to remove concat manifest");
            }
        }

        run_result?;

        let metadata = tokio::fs::metadata(&plan.output.path).await.map_err(|_| {
            ApiError::TransformFailed(format!(
                "output file was not produced: {}",
                plan.output.filename
            ))
        })?;
        let file_size = metadata.len() as i64;

        // Best-effort probe; an unreadable output still counts as produced.
        let duration = get_duration(&plan.output.path).await.unwrap_or(0.0);

        info!(
            operation = %transform.operation(),
            source = %source.filename,
            output = %plan.output.filename,
            "transform completed"
        );

        let asset = match project_id {
            Some(project_id) => Some(
                self.register(
                    source,
                    transform,
                    &plan.output.filename,
                    &plan.output.path,
                    duration,
                    file_size,
                    project_id,
                )
                .await?,
            ),
            None => None,
        };

        Ok(TransformOutcome {
            output_filename: plan.output.filename,
            output_path: plan.output.path,
            file_size,
            duration,
            asset,
        })
    }

    async fn ensure_inputs_exist(&self, source: &SourceFile, transform: &Transform) -> ApiResult<()> {
        match transform {
            Transform::Merge { inputs, .. } => {
                for name in inputs {
                    self.ensure_exists(name).await?;
                }
                Ok(())
            }
            Transform::ReplaceAudio { audio_filename } => {
                self.ensure_exists(&source.filename).await?;
                self.ensure_exists(audio_filename).await
            }
            _ => self.ensure_exists(&source.filename).await,
        }
    }

    async fn ensure_exists(&self, filename: &str) -> ApiResult<()> {
        let path = self.workdir.join(filename);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(ApiError::not_found(format!(
                "video file not found: {}",
                filename
            )))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn register(
        &self,
        source: &SourceFile,
        transform: &Transform,
        output_filename: &str,
        output_path: &Path,
        duration: f64,
        file_size: i64,
        project_id: i64,
    ) -> ApiResult<VideoAsset> {
        let provenance = Provenance {
            operation: transform.operation(),
            original_file: source.filename.clone(),
            processed_at: Utc::now(),
            file_size,
            duration,
            source_asset_id: source.asset_id,
        };
        let metadata = serde_json::to_value(&provenance)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let asset = self
            .store
            .add_asset(
                project_id,
                output_filename,
                &output_path.to_string_lossy(),
                duration,
                file_size,
                &metadata,
            )
            .await?;
        Ok(asset)
    }
}

#[async_trait]
impl TransformInvoker for TransformEngine {
    async fn invoke(
        &self,
        source: &SourceFile,
        transform: &Transform,
        project_id: Option<i64>,
    ) -> ApiResult<TransformOutcome> {
        self.execute(source, transform, project_id).await
    }
}
