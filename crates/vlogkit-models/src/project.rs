//! Project model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An editing project owned by exactly one user.
///
/// `timeline_data` is an opaque blob owned by the editing client; the backend
/// stores and returns it without interpreting its contents. `updated_at`
/// advances whenever an asset is added or the timeline blob changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub timeline_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
