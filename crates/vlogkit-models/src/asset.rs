//! Tracked video assets and provenance records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A video (or derived media) file tracked against a project.
///
/// Assets are immutable after creation. An unknown duration is stored as 0,
/// never as a sentinel error value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub file_path: String,
    /// Duration in seconds; 0 when the probe could not determine it.
    pub duration: f64,
    pub file_size: i64,
    /// Container/codec details for uploaded files, or a [`Provenance`] record
    /// for derived files.
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub added_at: DateTime<Utc>,
}

/// Metadata describing which operation produced a derived asset and from
/// which source file.
///
/// The external contract links derived assets to their source by filename
/// only. `source_asset_id` is carried additionally when the source was a
/// tracked asset, since a filename may later be reused and become ambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub operation: String,
    pub original_file: String,
    pub processed_at: DateTime<Utc>,
    pub file_size: i64,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_asset_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_round_trips_through_json() {
        let prov = Provenance {
            operation: "clip".to_string(),
            original_file: "a.mp4".to_string(),
            processed_at: Utc::now(),
            file_size: 1_000_000,
            duration: 3.0,
            source_asset_id: Some(7),
        };

        let value = serde_json::to_value(&prov).unwrap();
        assert_eq!(value["operation"], "clip");
        assert_eq!(value["original_file"], "a.mp4");

        let back: Provenance = serde_json::from_value(value).unwrap();
        assert_eq!(back.source_asset_id, Some(7));
    }

    #[test]
    fn provenance_omits_missing_source_id() {
        let prov = Provenance {
            operation: "watermark".to_string(),
            original_file: "b.mp4".to_string(),
            processed_at: Utc::now(),
            file_size: 10,
            duration: 0.0,
            source_asset_id: None,
        };

        let value = serde_json::to_value(&prov).unwrap();
        assert!(value.get("source_asset_id").is_none());
    }
}
