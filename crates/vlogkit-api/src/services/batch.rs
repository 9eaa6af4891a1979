//! Batch coordinator.
//!
//! Applies an ordered list of transformation requests to every asset in a
//! project. Each (asset, operation) pair is isolated: a failure is recorded
//! in that asset's result list and processing continues.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use vlogkit_models::{SubtitleEntry, Transform};
use vlogkit_store::Store;

use crate::error::{ApiError, ApiResult};
use crate::services::transform::{SourceFile, TransformInvoker};

/// One operation request as it arrives on the wire, target-less: the target
/// is always the asset currently being processed. Merge is excluded since it
/// needs an explicit input list.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchOperationRequest {
    Clip {
        start_time: f64,
        end_time: f64,
    },
    Convert {
        #[serde(default = "default_format")]
        target_format: String,
        #[serde(default = "default_quality")]
        quality: String,
    },
    Filter {
        filter_type: String,
        #[serde(default = "default_intensity")]
        intensity: f64,
    },
    AddWatermark {
        text: String,
        #[serde(default = "default_position")]
        position: String,
    },
    ExtractAudio {
        #[serde(default = "default_audio_format")]
        audio_format: String,
    },
    Compress {
        #[serde(default = "default_quality")]
        quality: String,
        target_size_kb: Option<u64>,
    },
    AddSubtitle {
        text: String,
        start_time: f64,
        #[serde(default = "default_subtitle_duration")]
        duration: f64,
        #[serde(default = "default_font_size")]
        font_size: u32,
        #[serde(default = "default_font_color")]
        font_color: String,
    },
    AddMultipleSubtitles {
        subtitles: Vec<SubtitleEntry>,
    },
    ToGif {
        #[serde(default)]
        start_time: f64,
        #[serde(default = "default_subtitle_duration")]
        duration: f64,
        #[serde(default = "default_gif_width")]
        width: u32,
    },
    Thumbnail {
        #[serde(default)]
        time_point: f64,
        #[serde(default = "default_thumbnail_width")]
        width: u32,
    },
}

fn default_format() -> String {
    "mp4".to_string()
}
fn default_quality() -> String {
    "medium".to_string()
}
fn default_intensity() -> f64 {
    0.1
}
fn default_position() -> String {
    "bottom-right".to_string()
}
fn default_audio_format() -> String {
    "mp3".to_string()
}
fn default_subtitle_duration() -> f64 {
    5.0
}
fn default_font_size() -> u32 {
    24
}
fn default_font_color() -> String {
    "white".to_string()
}
fn default_gif_width() -> u32 {
    480
}
fn default_thumbnail_width() -> u32 {
    320
}

impl BatchOperationRequest {
    /// The wire tag, echoed back in the per-operation result.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchOperationRequest::Clip { .. } => "clip",
            BatchOperationRequest::Convert { .. } => "convert",
            BatchOperationRequest::Filter { .. } => "filter",
            BatchOperationRequest::AddWatermark { .. } => "add_watermark",
            BatchOperationRequest::ExtractAudio { .. } => "extract_audio",
            BatchOperationRequest::Compress { .. } => "compress",
            BatchOperationRequest::AddSubtitle { .. } => "add_subtitle",
            BatchOperationRequest::AddMultipleSubtitles { .. } => "add_multiple_subtitles",
            BatchOperationRequest::ToGif { .. } => "to_gif",
            BatchOperationRequest::Thumbnail { .. } => "thumbnail",
        }
    }
}

impl TryFrom<BatchOperationRequest> for Transform {
    type Error = ApiError;

    fn try_from(request: BatchOperationRequest) -> Result<Self, Self::Error> {
        Ok(match request {
            BatchOperationRequest::Clip {
                start_time,
                end_time,
            } => Transform::Clip {
                start: start_time,
                end: end_time,
            },
            BatchOperationRequest::Convert {
                target_format,
                quality,
            } => Transform::Convert {
                format: target_format.parse()?,
                quality: quality.parse()?,
            },
            BatchOperationRequest::Filter {
                filter_type,
                intensity,
            } => Transform::Filter {
                filter: filter_type.parse()?,
                intensity,
            },
            BatchOperationRequest::AddWatermark { text, position } => Transform::Watermark {
                text,
                position: position.parse()?,
            },
            BatchOperationRequest::ExtractAudio { audio_format } => Transform::ExtractAudio {
                format: audio_format.parse()?,
            },
            BatchOperationRequest::Compress {
                quality,
                target_size_kb,
            } => Transform::Compress {
                quality: quality.parse()?,
                target_size_kb,
            },
            BatchOperationRequest::AddSubtitle {
                text,
                start_time,
                duration,
                font_size,
                font_color,
            } => Transform::Subtitle {
                text,
                start: start_time,
                duration,
                font_size,
                font_color,
            },
            BatchOperationRequest::AddMultipleSubtitles { subtitles } => Transform::Subtitles {
                entries: subtitles,
            },
            BatchOperationRequest::ToGif {
                start_time,
                duration,
                width,
            } => Transform::ToGif {
                start: start_time,
                duration,
                width,
            },
            BatchOperationRequest::Thumbnail { time_point, width } => Transform::Thumbnail {
                time_point,
                width,
            },
        })
    }
}

/// Outcome of one (asset, operation) pair.
#[derive(Debug, Serialize)]
pub struct OperationOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All operation outcomes for one asset, in request order.
#[derive(Debug, Serialize)]
pub struct AssetBatchResult {
    pub filename: String,
    pub operations: Vec<OperationOutcome>,
}

/// Aggregate batch result, in repository asset order.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub processed_files: usize,
    pub results: Vec<AssetBatchResult>,
}

/// Apply every operation to every asset currently in the project.
///
/// The asset list is snapshotted up front, so files produced during the run
/// are not themselves processed. The project is touched once at the end;
/// individual successes already touch it through asset registration.
pub async fn run_batch(
    store: &Store,
    invoker: &dyn TransformInvoker,
    project_id: i64,
    operations: &[(String, Transform)],
) -> ApiResult<BatchReport> {
    let assets = store.list_assets(project_id).await?;

    let mut results = Vec::with_capacity(assets.len());
    for asset in &assets {
        let source = SourceFile {
            filename: asset.filename.clone(),
            asset_id: Some(asset.id),
        };

        let mut outcomes = Vec::with_capacity(operations.len());
        for (kind, transform) in operations {
            match invoker.invoke(&source, transform, Some(project_id)).await {
                Ok(outcome) => outcomes.push(OperationOutcome {
                    kind: kind.clone(),
                    result: Some(json!({
                        "output_file": outcome.output_filename,
                        "status": "success",
                        "video_id": outcome.asset.as_ref().map(|a| a.id),
                    })),
                    error: None,
                }),
                Err(err) => outcomes.push(OperationOutcome {
                    kind: kind.clone(),
                    result: None,
                    error: Some(err.detail()),
                }),
            }
        }

        results.push(AssetBatchResult {
            filename: asset.filename.clone(),
            operations: outcomes,
        });
    }

    store.touch_project(project_id).await?;

    info!(
        project_id,
        assets = results.len(),
        operations = operations.len(),
        "batch processing complete"
    );

    Ok(BatchReport {
        processed_files: results.len(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transform::TransformOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Invoker stub: succeeds unless the (filename, kind) pair is listed.
    struct StubInvoker {
        failing: Vec<(String, String)>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TransformInvoker for StubInvoker {
        async fn invoke(
            &self,
            source: &SourceFile,
            transform: &Transform,
            _project_id: Option<i64>,
        ) -> ApiResult<TransformOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", source.filename, transform.kind()));

            let key = (source.filename.clone(), transform.kind().to_string());
            if self.failing.contains(&key) {
                return Err(ApiError::TransformFailed("simulated failure".to_string()));
            }
            Ok(TransformOutcome {
                output_filename: format!("out_{}", source.filename),
                output_path: format!("/up/out_{}", source.filename).into(),
                file_size: 1,
                duration: 1.0,
                asset: None,
            })
        }
    }

    async fn seeded_project(store: &Store, filenames: &[&str]) -> i64 {
        let user = store.create_user("alice", "a@example.com", "h").await.unwrap();
        let project = store.create_project(user.id, "trip", "").await.unwrap();
        let blob = json!({});
        for name in filenames {
            store
                .add_asset(project.id, name, &format!("/up/{}", name), 10.0, 1, &blob)
                .await
                .unwrap();
        }
        project.id
    }

    fn two_operations() -> Vec<(String, Transform)> {
        vec![
            (
                "compress".to_string(),
                Transform::Compress {
                    quality: vlogkit_models::Quality::Medium,
                    target_size_kb: None,
                },
            ),
            (
                "add_watermark".to_string(),
                Transform::Watermark {
                    text: "vlogkit".to_string(),
                    position: "bottom-right".parse().unwrap(),
                },
            ),
        ]
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let project_id = seeded_project(&store, &["a.mp4", "b.mp4", "c.mp4"]).await;

        // b.mp4's watermark fails; everything else succeeds.
        let invoker = StubInvoker {
            failing: vec![("b.mp4".to_string(), "watermark".to_string())],
            calls: Mutex::new(Vec::new()),
        };

        let report = run_batch(&store, &invoker, project_id, &two_operations())
            .await
            .unwrap();

        assert_eq!(report.processed_files, 3);
        let total: usize = report.results.iter().map(|r| r.operations.len()).sum();
        assert_eq!(total, 6);

        let failed: Vec<_> = report
            .results
            .iter()
            .flat_map(|r| &r.operations)
            .filter(|o| o.error.is_some())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, "add_watermark");
        assert_eq!(
            failed[0].error.as_deref(),
            Some("Transform failed: simulated failure")
        );

        // All 6 combinations were attempted despite the failure.
        assert_eq!(invoker.calls.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn results_follow_repository_and_request_order() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let project_id = seeded_project(&store, &["a.mp4", "b.mp4"]).await;

        let invoker = StubInvoker {
            failing: vec![],
            calls: Mutex::new(Vec::new()),
        };

        let report = run_batch(&store, &invoker, project_id, &two_operations())
            .await
            .unwrap();

        // Repository order is most recently added first.
        assert_eq!(report.results[0].filename, "b.mp4");
        assert_eq!(report.results[1].filename, "a.mp4");
        for result in &report.results {
            assert_eq!(result.operations[0].kind, "compress");
            assert_eq!(result.operations[1].kind, "add_watermark");
        }
    }

    #[tokio::test]
    async fn batch_touches_the_project() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let project_id = seeded_project(&store, &["a.mp4"]).await;
        let before = store.get_project(project_id).await.unwrap().unwrap().updated_at;

        let invoker = StubInvoker {
            failing: vec![],
            calls: Mutex::new(Vec::new()),
        };
        run_batch(&store, &invoker, project_id, &two_operations())
            .await
            .unwrap();

        let after = store.get_project(project_id).await.unwrap().unwrap().updated_at;
        assert!(after > before);
    }

    #[test]
    fn wire_operations_parse_with_defaults() {
        let raw = json!({"type": "compress"});
        let op: BatchOperationRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(op.kind(), "compress");
        let transform = Transform::try_from(op).unwrap();
        assert!(matches!(
            transform,
            Transform::Compress {
                quality: vlogkit_models::Quality::Medium,
                target_size_kb: None,
            }
        ));
    }

    #[test]
    fn unknown_enum_value_is_an_unsupported_option() {
        let raw = json!({"type": "add_watermark", "text": "hi", "position": "middle"});
        let op: BatchOperationRequest = serde_json::from_value(raw).unwrap();
        let err = Transform::try_from(op).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedOption(_)));
    }

    #[test]
    fn unknown_operation_type_fails_to_parse() {
        let raw = json!({"type": "explode"});
        assert!(serde_json::from_value::<BatchOperationRequest>(raw).is_err());
    }
}
