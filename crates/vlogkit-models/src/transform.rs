//! Transformation request types.
//!
//! Each supported transformation is one variant of [`Transform`], so the
//! command planner is a single exhaustive match and an unknown operation is
//! unrepresentable. Parameter enums parse from the wire strings via
//! [`FromStr`]; an unknown value fails with [`OptionError`] before anything
//! is invoked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An enum parameter carried a value outside its supported set.
#[derive(Debug, Clone, Error)]
#[error("unsupported {what}: {value}")]
pub struct OptionError {
    pub what: &'static str,
    pub value: String,
}

impl OptionError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

/// Target container format for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Webm,
    Avi,
    Gif,
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Webm => "webm",
            VideoFormat::Avi => "avi",
            VideoFormat::Gif => "gif",
        }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "libx264",
            VideoFormat::Webm => "libvpx",
            VideoFormat::Avi => "mpeg4",
            VideoFormat::Gif => "gif",
        }
    }
}

impl FromStr for VideoFormat {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(VideoFormat::Mp4),
            "webm" => Ok(VideoFormat::Webm),
            "avi" => Ok(VideoFormat::Avi),
            "gif" => Ok(VideoFormat::Gif),
            other => Err(OptionError::new("target format", other)),
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoding quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Quality {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(OptionError::new("quality", other)),
        }
    }
}

/// Visual filter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFilter {
    Brightness,
    Contrast,
    Saturation,
    Vignette,
    Sharpen,
}

impl VideoFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFilter::Brightness => "brightness",
            VideoFilter::Contrast => "contrast",
            VideoFilter::Saturation => "saturation",
            VideoFilter::Vignette => "vignette",
            VideoFilter::Sharpen => "sharpen",
        }
    }
}

impl FromStr for VideoFilter {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brightness" => Ok(VideoFilter::Brightness),
            "contrast" => Ok(VideoFilter::Contrast),
            "saturation" => Ok(VideoFilter::Saturation),
            "vignette" => Ok(VideoFilter::Vignette),
            "sharpen" => Ok(VideoFilter::Sharpen),
            other => Err(OptionError::new("filter type", other)),
        }
    }
}

impl fmt::Display for VideoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watermark anchor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl WatermarkPosition {
    /// drawtext x/y expressions for this anchor.
    pub fn coordinates(&self) -> (&'static str, &'static str) {
        match self {
            WatermarkPosition::TopLeft => ("10", "10"),
            WatermarkPosition::TopRight => ("main_w-text_w-10", "10"),
            WatermarkPosition::BottomLeft => ("10", "main_h-text_h-10"),
            WatermarkPosition::BottomRight => ("main_w-text_w-10", "main_h-text_h-10"),
            WatermarkPosition::Center => ("(main_w-text_w)/2", "(main_h-text_h)/2"),
        }
    }
}

impl FromStr for WatermarkPosition {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(WatermarkPosition::TopLeft),
            "top-right" => Ok(WatermarkPosition::TopRight),
            "bottom-left" => Ok(WatermarkPosition::BottomLeft),
            "bottom-right" => Ok(WatermarkPosition::BottomRight),
            "center" => Ok(WatermarkPosition::Center),
            other => Err(OptionError::new("position", other)),
        }
    }
}

/// Audio container format for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Aac,
    Wav,
    M4a,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" => Ok(AudioFormat::Aac),
            "wav" => Ok(AudioFormat::Wav),
            "m4a" => Ok(AudioFormat::M4a),
            other => Err(OptionError::new("audio format", other)),
        }
    }
}

/// One time-windowed subtitle overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A single non-destructive transformation request.
///
/// The target file is supplied separately; merge is the exception and carries
/// its full ordered input list.
#[derive(Debug, Clone)]
pub enum Transform {
    Clip {
        start: f64,
        end: f64,
    },
    Convert {
        format: VideoFormat,
        quality: Quality,
    },
    Filter {
        filter: VideoFilter,
        intensity: f64,
    },
    Watermark {
        text: String,
        position: WatermarkPosition,
    },
    Merge {
        inputs: Vec<String>,
        output_name: String,
    },
    ExtractAudio {
        format: AudioFormat,
    },
    ReplaceAudio {
        audio_filename: String,
    },
    Compress {
        quality: Quality,
        target_size_kb: Option<u64>,
    },
    Subtitle {
        text: String,
        start: f64,
        duration: f64,
        font_size: u32,
        font_color: String,
    },
    Subtitles {
        entries: Vec<SubtitleEntry>,
    },
    ToGif {
        start: f64,
        duration: f64,
        width: u32,
    },
    Thumbnail {
        time_point: f64,
        width: u32,
    },
}

impl Transform {
    /// Stable tag for batch results and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Clip { .. } => "clip",
            Transform::Convert { .. } => "convert",
            Transform::Filter { .. } => "filter",
            Transform::Watermark { .. } => "watermark",
            Transform::Merge { .. } => "merge",
            Transform::ExtractAudio { .. } => "extract_audio",
            Transform::ReplaceAudio { .. } => "replace_audio",
            Transform::Compress { .. } => "compress",
            Transform::Subtitle { .. } => "subtitle",
            Transform::Subtitles { .. } => "subtitles",
            Transform::ToGif { .. } => "to_gif",
            Transform::Thumbnail { .. } => "thumbnail",
        }
    }

    /// Provenance operation label. Convert and filter keep their
    /// parameter-qualified historical form.
    pub fn operation(&self) -> String {
        match self {
            Transform::Convert { format, .. } => format!("convert_{}", format.extension()),
            Transform::Filter { filter, .. } => format!("filter_{}", filter.as_str()),
            other => other.kind().to_string(),
        }
    }
}
