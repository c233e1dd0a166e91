/*
 * The contents of this file are subject to the terms of the
 * Common Development and Distribution License, Version 1.0 only
 * (the "License").  You may not use this file except in compliance
 * with the License.
 *
 * See the file LICENSE in this distribution for details.
 * A copy of the CDDL is also available via the Internet at
 * http://www.opensource.org/licenses/cddl1.txt
 *
 * When distributing Covered Code, include this CDDL HEADER in each
 * file and include the contents of the LICENSE file from this
 * distribution.
 */

// Mirror Down Loader
// - ffmpeg.rs file -

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Stdio};

// It makes very little sense to link ffmpeg statically with mirrordl.
// Just use the system's one (or inform the user if there isn't one).

static FFPROBE_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
});

/// Stream details ffprobe reports for a media URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    pub duration: Option<f64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub audio_channels: Option<u64>,
    pub asr: Option<u64>,
}

pub fn ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE
}

pub fn stream_info(url: &str) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json"])
        .args(["-show_format", "-show_streams"])
        .arg(url)
        .output()
        .context("Could not run ffprobe")?;

    if !output.status.success() {
        bail!("ffprobe failed on {}", url);
    }

    let metadata: Value = serde_json::from_slice(&output.stdout)?;
    Ok(stream_info_from_json(&metadata))
}

// ffprobe reports most numbers as strings.
fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str()?.parse().ok())
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str()?.parse().ok())
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub fn stream_info_from_json(metadata: &Value) -> StreamInfo {
    let mut info = StreamInfo {
        duration: as_f64(&metadata["format"]["duration"])
            .filter(|d| *d > 0.0)
            .map(|d| round_to(d, 2)),
        ..Default::default()
    };

    let streams = metadata["streams"].as_array().map(Vec::as_slice).unwrap_or_default();
    for stream in streams {
        let codec = stream["codec_name"].as_str().map(str::to_string);
        match stream["codec_type"].as_str() {
            Some("video") => {
                info.width = as_u64(&stream["width"]);
                info.height = as_u64(&stream["height"]);
                info.vcodec = codec;
                // "25/1", "30000/1001", or "0/0" if unknown.
                info.fps = stream["avg_frame_rate"]
                    .as_str()
                    .and_then(|r| r.split_once('/'))
                    .and_then(|(frames, secs)| Some((frames.parse::<u64>().ok()?, secs.parse::<u64>().ok()?)))
                    .filter(|(frames, secs)| *frames > 0 && *secs > 0)
                    .map(|(frames, secs)| round_to(frames as f64 / secs as f64, 1));
            }
            Some("audio") => {
                info.audio_channels = as_u64(&stream["channels"]);
                info.asr = as_u64(&stream["sample_rate"]);
                info.acodec = codec;
            }
            _ => (),
        }
    }

    info
}

pub fn ts_to_mp4(inputfile: &Path, outputfile: &Path) -> Result<()> {
    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(inputfile)
        .arg("-c")
        .arg("copy") // Remux only.
        .arg("-loglevel")
        .arg("quiet")
        .arg(outputfile)
        .status()
        .context("Could not find ffmpeg - no processing is done.")?;

    if !status.success() {
        bail!("ffmpeg could not convert {}", inputfile.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_ffprobe_output() {
        let metadata = json!({
            "format": { "duration": "2712.345678" },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "avg_frame_rate": "30000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "channels": 2,
                    "sample_rate": "44100"
                }
            ]
        });

        let info = stream_info_from_json(&metadata);
        assert_eq!(info.duration, Some(2712.35));
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.height, Some(1080));
        assert_eq!(info.fps, Some(30.0));
        assert_eq!(info.vcodec.as_deref(), Some("h264"));
        assert_eq!(info.acodec.as_deref(), Some("aac"));
        assert_eq!(info.audio_channels, Some(2));
        assert_eq!(info.asr, Some(44100));
    }

    #[test]
    fn unknown_frame_rate_is_dropped() {
        let metadata = json!({
            "streams": [{ "codec_type": "video", "avg_frame_rate": "0/0" }]
        });
        let info = stream_info_from_json(&metadata);
        assert_eq!(info.fps, None);
        assert_eq!(info.duration, None);
    }
}
