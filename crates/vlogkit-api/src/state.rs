//! Application state.

use std::sync::Arc;

use vlogkit_store::Store;

use crate::config::ApiConfig;
use crate::services::transform::TransformEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<Store>,
    pub engine: Arc<TransformEngine>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;

        let store = Arc::new(Store::connect(&config.database_url).await?);
        let engine = Arc::new(TransformEngine::new(
            Arc::clone(&store),
            config.upload_dir.clone(),
            config.ffmpeg_timeout_secs,
        ));

        Ok(Self {
            config,
            store,
            engine,
        })
    }
}
