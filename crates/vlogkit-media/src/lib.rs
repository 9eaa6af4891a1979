#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (structured argv, no shell)
//! - A pure planner mapping a [`vlogkit_models::Transform`] to one invocation
//! - A runner that captures exit status and diagnostics, with optional timeout
//! - FFprobe-based inspection

pub mod command;
pub mod error;
pub mod planner;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use planner::{ensure_safe_name, plan, ConcatManifest, InvocationPlan, PlannedOutput};
pub use probe::{get_duration, probe_raw, probe_video, VideoInfo};
