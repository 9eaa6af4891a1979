//! Pure command planning.
//!
//! [`plan`] maps one [`Transform`] onto a fully resolved FFmpeg invocation:
//! argument vector, derived output name, and (for merge) the concat manifest
//! to materialize. It performs no I/O; the executor checks file existence,
//! writes the manifest and runs the command.

use std::path::{Path, PathBuf};

use vlogkit_models::{AudioFormat, Quality, Transform, VideoFormat};

use crate::command::{format_seconds, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// The derived file a plan is expected to produce.
#[derive(Debug, Clone)]
pub struct PlannedOutput {
    pub filename: String,
    pub path: PathBuf,
}

/// A concat demuxer manifest the executor must write before running the
/// command and remove afterwards, on success and failure alike.
#[derive(Debug, Clone)]
pub struct ConcatManifest {
    pub path: PathBuf,
    pub contents: String,
}

/// A fully resolved description of one external-tool call.
#[derive(Debug, Clone)]
pub struct InvocationPlan {
    pub command: FfmpegCommand,
    pub output: PlannedOutput,
    pub manifest: Option<ConcatManifest>,
}

/// Map a transformation request to an invocation plan.
///
/// `source_duration` is only consulted for compress-to-target-size, where the
/// executor probes the source beforehand.
pub fn plan(
    workdir: &Path,
    source: &str,
    transform: &Transform,
    source_duration: Option<f64>,
) -> MediaResult<InvocationPlan> {
    ensure_safe_name(source)?;
    let input = workdir.join(source);

    match transform {
        Transform::Clip { start, end } => {
            if *end <= *start {
                return Err(MediaError::InvalidRange {
                    start: *start,
                    end: *end,
                });
            }
            let output = derived(
                workdir,
                format!(
                    "clip_{}_{}_{}",
                    format_seconds(*start),
                    format_seconds(*end),
                    source
                ),
            );
            let command = FfmpegCommand::new(&input, &output.path)
                .output_args(["-ss", &format_seconds(*start), "-to", &format_seconds(*end)])
                .codec_copy();
            Ok(simple(command, output))
        }

        Transform::Convert { format, quality } => {
            let output = derived(
                workdir,
                format!("converted_{}.{}", stem(source), format.extension()),
            );
            let mut command =
                FfmpegCommand::new(&input, &output.path).video_codec(format.codec());
            if *format == VideoFormat::Mp4 {
                match quality {
                    Quality::High => command = command.crf(18),
                    Quality::Low => command = command.crf(28),
                    Quality::Medium => {}
                }
            }
            if *format == VideoFormat::Gif {
                command = command.video_filter("fps=10,scale=480:-1:flags=lanczos");
            }
            Ok(simple(command, output))
        }

        Transform::Filter { filter, intensity } => {
            use vlogkit_models::VideoFilter::*;
            // Intensity is passed through unchanged; negative values are a
            // documented looseness of the contract.
            let expr = match filter {
                Brightness => format!("eq=brightness={}", intensity),
                Contrast => format!("eq=contrast={}", 1.0 + intensity),
                Saturation => format!("eq=saturation={}", 1.0 + intensity),
                Vignette => format!("vignette=angle=PI/4:factor={}", intensity),
                Sharpen => format!("unsharp=5:5:{}", intensity),
            };
            let output = derived(workdir, format!("filtered_{}_{}", filter.as_str(), source));
            let command = FfmpegCommand::new(&input, &output.path)
                .video_filter(expr)
                .audio_codec("copy");
            Ok(simple(command, output))
        }

        Transform::Watermark { text, position } => {
            let (x, y) = position.coordinates();
            let expr = format!(
                "drawtext=text='{}':fontcolor=white:fontsize=24:\
                 box=1:boxcolor=black@0.5:boxborderw=5:x={}:y={}",
                escape_drawtext(text),
                x,
                y
            );
            let output = derived(workdir, format!("watermarked_{}", source));
            let command = FfmpegCommand::new(&input, &output.path)
                .video_filter(expr)
                .audio_codec("copy");
            Ok(simple(command, output))
        }

        Transform::Merge {
            inputs,
            output_name,
        } => {
            ensure_safe_name(output_name)?;
            let mut contents = String::new();
            for name in inputs {
                ensure_safe_name(name)?;
                contents.push_str(&format!("file '{}'\n", workdir.join(name).display()));
            }
            let manifest_path = workdir.join(format!("concat_{}.txt", output_name));
            let output = derived(workdir, format!("{}.mp4", output_name));
            let command = FfmpegCommand::new(&manifest_path, &output.path)
                .input_args(["-f", "concat", "-safe", "0"])
                .codec_copy();
            Ok(InvocationPlan {
                command,
                output,
                manifest: Some(ConcatManifest {
                    path: manifest_path,
                    contents,
                }),
            })
        }

        Transform::ExtractAudio { format } => {
            let output = derived(workdir, format!("{}.{}", stem(source), format.extension()));
            let codec = if *format == AudioFormat::Mp3 {
                "libmp3lame"
            } else {
                "copy"
            };
            let command = FfmpegCommand::new(&input, &output.path)
                .output_arg("-vn")
                .output_args(["-acodec", codec]);
            Ok(simple(command, output))
        }

        Transform::ReplaceAudio { audio_filename } => {
            ensure_safe_name(audio_filename)?;
            let output = derived(workdir, format!("with_bgm_{}", source));
            // Video stream copied; the replacement audio fully supplants the
            // original track, trimmed to the shorter stream.
            let command = FfmpegCommand::new(&input, &output.path)
                .add_input(workdir.join(audio_filename))
                .output_args(["-c:v", "copy", "-map", "0:v:0", "-map", "1:a:0", "-shortest"]);
            Ok(simple(command, output))
        }

        Transform::Compress {
            quality,
            target_size_kb,
        } => {
            let output = derived(workdir, format!("compressed_{}", source));
            let crf = match quality {
                Quality::High => 23,
                Quality::Medium => 28,
                Quality::Low => 32,
            };
            let mut command = FfmpegCommand::new(&input, &output.path).crf(crf);
            if let Some(kb) = target_size_kb {
                let duration = source_duration.unwrap_or(0.0);
                if duration <= 0.0 {
                    return Err(MediaError::InvalidVideo(
                        "source duration unknown; cannot compute target bitrate".to_string(),
                    ));
                }
                let bitrate = (*kb as f64 * 8192.0 / duration) as u64;
                command = command.output_args(["-b:v", &format!("{}k", bitrate)]);
            }
            command = command.audio_codec("aac");
            Ok(simple(command, output))
        }

        Transform::Subtitle {
            text,
            start,
            duration,
            font_size,
            font_color,
        } => {
            let expr = subtitle_filter(text, *start, *duration, *font_size, font_color);
            let output = derived(workdir, format!("subtitle_{}", source));
            let command = FfmpegCommand::new(&input, &output.path)
                .video_filter(expr)
                .audio_codec("copy");
            Ok(simple(command, output))
        }

        Transform::Subtitles { entries } => {
            // One drawtext per entry, time-windowed independently, joined
            // into a single -vf pass.
            let chain = entries
                .iter()
                .map(|e| subtitle_filter(&e.text, e.start, e.duration, 24, "white"))
                .collect::<Vec<_>>()
                .join(",");
            let output = derived(workdir, format!("multisub_{}", source));
            let command = FfmpegCommand::new(&input, &output.path)
                .video_filter(chain)
                .audio_codec("copy");
            Ok(simple(command, output))
        }

        Transform::ToGif {
            start,
            duration,
            width,
        } => {
            let output = derived(workdir, format!("{}.gif", stem(source)));
            let palette = format!(
                "fps=10,scale={}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                width
            );
            let command = FfmpegCommand::new(&input, &output.path)
                .seek(*start)
                .read_duration(*duration)
                .video_filter(palette)
                .output_args(["-loop", "0"]);
            Ok(simple(command, output))
        }

        Transform::Thumbnail { time_point, width } => {
            let output = derived(workdir, format!("thumbnail_{}.jpg", stem(source)));
            let command = FfmpegCommand::new(&input, &output.path)
                .seek(*time_point)
                .single_frame()
                .video_filter(format!("scale={}:-1", width))
                .output_args(["-q:v", "2"]);
            Ok(simple(command, output))
        }
    }
}

fn simple(command: FfmpegCommand, output: PlannedOutput) -> InvocationPlan {
    InvocationPlan {
        command,
        output,
        manifest: None,
    }
}

fn derived(workdir: &Path, filename: String) -> PlannedOutput {
    let path = workdir.join(&filename);
    PlannedOutput { filename, path }
}

/// Filename stem without the final extension.
fn stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(filename)
}

/// Reject names that could escape the working directory or break the concat
/// manifest quoting: alphanumerics (any script) plus space, dash, underscore
/// and dot, never a `..` sequence or a path separator. The same set the
/// upload sanitizer produces.
pub fn ensure_safe_name(name: &str) -> MediaResult<()> {
    let ok = !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(MediaError::UnsafeFilename(name.to_string()))
    }
}

fn subtitle_filter(
    text: &str,
    start: f64,
    duration: f64,
    font_size: u32,
    font_color: &str,
) -> String {
    format!(
        "drawtext=text='{}':fontsize={}:fontcolor={}:\
         box=1:boxcolor=black@0.5:boxborderw=5:\
         x=(w-text_w)/2:y=h-text_h-20:\
         enable='between(t,{},{})'",
        escape_drawtext(text),
        font_size,
        escape_drawtext(font_color),
        format_seconds(start),
        format_seconds(start + duration)
    )
}

/// Escape user text for embedding in a drawtext filter value.
///
/// The filter travels as one argv element, so argument boundaries are already
/// safe; this prevents text from terminating the quoted value or smuggling
/// extra filter options. Control characters are dropped.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() {
            continue;
        }
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '=' | '%') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlogkit_models::{SubtitleEntry, VideoFilter, WatermarkPosition};

    fn args(plan: &InvocationPlan) -> Vec<String> {
        plan.command.build_args()
    }

    #[test]
    fn clip_plan_uses_stream_copy_and_wire_naming() {
        let t = Transform::Clip {
            start: 2.0,
            end: 5.0,
        };
        let plan = plan(Path::new("/work"), "a.mp4", &t, None).unwrap();
        assert_eq!(plan.output.filename, "clip_2_5_a.mp4");

        let args = args(&plan);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "2");
        let to = args.iter().position(|a| a == "-to").unwrap();
        assert_eq!(args[to + 1], "5");
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    }

    #[test]
    fn clip_with_inverted_range_is_rejected_before_invocation() {
        let t = Transform::Clip {
            start: 5.0,
            end: 5.0,
        };
        let err = plan(Path::new("/work"), "a.mp4", &t, None).unwrap_err();
        assert!(matches!(err, MediaError::InvalidRange { .. }));
    }

    #[test]
    fn convert_quality_maps_to_crf_for_mp4_only() {
        let high = Transform::Convert {
            format: VideoFormat::Mp4,
            quality: Quality::High,
        };
        let p = plan(Path::new("/w"), "a.mov", &high, None).unwrap();
        assert_eq!(p.output.filename, "converted_a.mp4");
        let a = args(&p);
        let crf = a.iter().position(|x| x == "-crf").unwrap();
        assert_eq!(a[crf + 1], "18");

        let webm = Transform::Convert {
            format: VideoFormat::Webm,
            quality: Quality::High,
        };
        let p = plan(Path::new("/w"), "a.mov", &webm, None).unwrap();
        assert!(!args(&p).contains(&"-crf".to_string()));
        assert!(args(&p).contains(&"libvpx".to_string()));
    }

    #[test]
    fn convert_to_gif_adds_sampling_filter() {
        let t = Transform::Convert {
            format: VideoFormat::Gif,
            quality: Quality::Medium,
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let a = args(&p);
        let vf = a.iter().position(|x| x == "-vf").unwrap();
        assert_eq!(a[vf + 1], "fps=10,scale=480:-1:flags=lanczos");
    }

    #[test]
    fn filter_expressions_match_each_kind() {
        let cases = [
            (VideoFilter::Brightness, "eq=brightness=0.2"),
            (VideoFilter::Contrast, "eq=contrast=1.2"),
            (VideoFilter::Saturation, "eq=saturation=1.2"),
            (VideoFilter::Vignette, "vignette=angle=PI/4:factor=0.2"),
            (VideoFilter::Sharpen, "unsharp=5:5:0.2"),
        ];
        for (filter, expected) in cases {
            let t = Transform::Filter {
                filter,
                intensity: 0.2,
            };
            let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
            let a = args(&p);
            let vf = a.iter().position(|x| x == "-vf").unwrap();
            assert_eq!(a[vf + 1], expected, "filter {}", filter);
        }
    }

    #[test]
    fn watermark_text_cannot_break_the_filter() {
        let t = Transform::Watermark {
            text: "x':y=0,drawtext".to_string(),
            position: WatermarkPosition::BottomRight,
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let a = args(&p);
        let vf = a.iter().position(|x| x == "-vf").unwrap();
        let expr = &a[vf + 1];
        assert!(expr.contains(r"x\'\:y\=0\,drawtext"));
        assert!(expr.contains("x=main_w-text_w-10"));
        assert_eq!(p.output.filename, "watermarked_a.mp4");
    }

    #[test]
    fn merge_plan_carries_manifest_and_concat_args() {
        let t = Transform::Merge {
            inputs: vec!["a.mp4".to_string(), "b.mp4".to_string()],
            output_name: "trip".to_string(),
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let manifest = p.manifest.as_ref().unwrap();
        assert_eq!(manifest.contents, "file '/w/a.mp4'\nfile '/w/b.mp4'\n");
        assert_eq!(p.output.filename, "trip.mp4");

        let a = args(&p);
        assert!(a.contains(&"concat".to_string()));
        assert!(a.contains(&"-safe".to_string()));
    }

    #[test]
    fn extract_audio_codec_depends_on_format() {
        let mp3 = Transform::ExtractAudio {
            format: AudioFormat::Mp3,
        };
        let p = plan(Path::new("/w"), "a.mp4", &mp3, None).unwrap();
        assert_eq!(p.output.filename, "a.mp3");
        assert!(args(&p).contains(&"libmp3lame".to_string()));

        let wav = Transform::ExtractAudio {
            format: AudioFormat::Wav,
        };
        let p = plan(Path::new("/w"), "a.mp4", &wav, None).unwrap();
        let a = args(&p);
        let codec = a.iter().position(|x| x == "-acodec").unwrap();
        assert_eq!(a[codec + 1], "copy");
    }

    #[test]
    fn replace_audio_maps_streams_from_both_inputs() {
        let t = Transform::ReplaceAudio {
            audio_filename: "bgm.mp3".to_string(),
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        assert_eq!(p.output.filename, "with_bgm_a.mp4");
        let a = args(&p);
        assert!(a.contains(&"0:v:0".to_string()));
        assert!(a.contains(&"1:a:0".to_string()));
        assert!(a.contains(&"-shortest".to_string()));
        assert_eq!(a.iter().filter(|x| *x == "-i").count(), 2);
    }

    #[test]
    fn compress_target_size_computes_bitrate_from_duration() {
        let t = Transform::Compress {
            quality: Quality::Medium,
            target_size_kb: Some(1000),
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, Some(10.0)).unwrap();
        let a = args(&p);
        let bv = a.iter().position(|x| x == "-b:v").unwrap();
        // 1000 KB * 8192 / 10 s
        assert_eq!(a[bv + 1], "819200k");

        // Without a known duration the bitrate is incomputable.
        let err = plan(Path::new("/w"), "a.mp4", &t, None).unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[test]
    fn compress_without_target_only_sets_crf() {
        let t = Transform::Compress {
            quality: Quality::Low,
            target_size_kb: None,
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let a = args(&p);
        let crf = a.iter().position(|x| x == "-crf").unwrap();
        assert_eq!(a[crf + 1], "32");
        assert!(!a.contains(&"-b:v".to_string()));
    }

    #[test]
    fn subtitle_renders_only_inside_its_window() {
        let t = Transform::Subtitle {
            text: "hello".to_string(),
            start: 1.5,
            duration: 5.0,
            font_size: 32,
            font_color: "yellow".to_string(),
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let a = args(&p);
        let vf = a.iter().position(|x| x == "-vf").unwrap();
        let expr = &a[vf + 1];
        assert!(expr.contains("enable='between(t,1.5,6.5)'"));
        assert!(expr.contains("fontsize=32"));
        assert!(expr.contains("fontcolor=yellow"));
        assert_eq!(p.output.filename, "subtitle_a.mp4");
    }

    #[test]
    fn multiple_subtitles_join_into_one_pass() {
        let t = Transform::Subtitles {
            entries: vec![
                SubtitleEntry {
                    text: "one".to_string(),
                    start: 0.0,
                    duration: 2.0,
                },
                SubtitleEntry {
                    text: "two".to_string(),
                    start: 3.0,
                    duration: 2.0,
                },
            ],
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        let a = args(&p);
        assert_eq!(a.iter().filter(|x| *x == "-vf").count(), 1);
        let vf = a.iter().position(|x| x == "-vf").unwrap();
        let expr = &a[vf + 1];
        assert!(expr.contains("between(t,0,2)"));
        assert!(expr.contains("between(t,3,5)"));
        assert_eq!(expr.matches("drawtext").count(), 2);
        assert_eq!(p.output.filename, "multisub_a.mp4");
    }

    #[test]
    fn gif_export_seeks_before_input() {
        let t = Transform::ToGif {
            start: 3.0,
            duration: 5.0,
            width: 480,
        };
        let p = plan(Path::new("/w"), "a.mp4", &t, None).unwrap();
        assert_eq!(p.output.filename, "a.gif");
        let a = args(&p);
        let ss = a.iter().position(|x| x == "-ss").unwrap();
        let i = a.iter().position(|x| x == "-i").unwrap();
        assert!(ss < i);
        assert!(a.iter().any(|x| x.contains("palettegen")));
        assert!(a.contains(&"-loop".to_string()));
    }

    #[test]
    fn thumbnail_extracts_a_single_scaled_frame() {
        let t = Transform::Thumbnail {
            time_point: 1.0,
            width: 320,
        };
        let p = plan(Path::new("/w"), "clip.mp4", &t, None).unwrap();
        assert_eq!(p.output.filename, "thumbnail_clip.jpg");
        let a = args(&p);
        assert!(a.windows(2).any(|w| w[0] == "-vframes" && w[1] == "1"));
        assert!(a.contains(&"scale=320:-1".to_string()));
    }

    #[test]
    fn traversal_and_quote_filenames_are_rejected() {
        let t = Transform::Thumbnail {
            time_point: 0.0,
            width: 320,
        };
        for bad in ["../etc/passwd", "a/b.mp4", "it's.mp4", "my..video.mp4", ""] {
            let err = plan(Path::new("/w"), bad, &t, None).unwrap_err();
            assert!(matches!(err, MediaError::UnsafeFilename(_)), "{}", bad);
        }

        let merge = Transform::Merge {
            inputs: vec!["ok.mp4".to_string()],
            output_name: "../evil".to_string(),
        };
        assert!(plan(Path::new("/w"), "ok.mp4", &merge, None).is_err());
    }

    #[test]
    fn non_ascii_filenames_are_accepted() {
        let t = Transform::Thumbnail {
            time_point: 0.0,
            width: 320,
        };
        let p = plan(Path::new("/w"), "视频.mp4", &t, None).unwrap();
        assert_eq!(p.output.filename, "thumbnail_视频.jpg");
    }
}
