//! Shared data models for the vlogkit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Users, projects and tracked video assets
//! - The closed set of video transformations and their parameter enums
//! - Provenance records for derived assets

pub mod asset;
pub mod project;
pub mod transform;
pub mod user;

// Re-export common types
pub use asset::{Provenance, VideoAsset};
pub use project::Project;
pub use transform::{
    AudioFormat, OptionError, Quality, SubtitleEntry, Transform, VideoFilter, VideoFormat,
    WatermarkPosition,
};
pub use user::User;
