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
// - formats.rs file -

use crate::agent::WebAgent;
use crate::ffmpeg;

use anyhow::{anyhow, Result};
use m3u8_rs::Playlist;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::{debug, warn};
use url::Url;

/// Hosts known to throttle or damage streams. Their streams are read
/// with ffprobe, and `MirrorStyle::Ranked` ranks them below everything else.
const THROTTLED_HOSTS: [&str; 2] = [".bfvvs.com", ".subokk.com"];

static HOST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^/]*?\.?(\w{4,}|[^.]+)[^.]*\.\w+/").unwrap());

static DOMAIN_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^/]*?\.?(\w+)\.\w+/").unwrap());

/// How a site names and ranks the formats found on its mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStyle {
    /// Ids from the most telling part of the host name; throttled hosts
    /// rank below everything else.
    Ranked,
    /// Ids from the name right before the top-level domain; throttled
    /// hosts keep their rank.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Https,
    M3u8,
}

/// One playable rendition of a video on one mirror.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Format {
    pub format_id: String,
    pub url: String,
    pub ext: String,
    pub protocol: Protocol,
    pub note: Option<String>,
    pub preference: i32,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub fps: Option<f64>,
    pub tbr: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub duration: Option<f64>,
    pub audio_channels: Option<u64>,
    pub asr: Option<u64>,
}

impl Format {
    pub fn resolution(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            (None, Some(h)) => format!("{}p", h),
            _ => "unknown".to_string(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        THROTTLED_HOSTS.iter().any(|host| self.url.contains(host))
    }

    /// Copies the ffprobe results into the format.
    pub fn apply_stream_info(&mut self, info: ffmpeg::StreamInfo) {
        self.duration = info.duration.or(self.duration);
        self.width = info.width.or(self.width);
        self.height = info.height.or(self.height);
        self.fps = info.fps.or(self.fps);
        self.vcodec = info.vcodec.or(self.vcodec.take());
        self.acodec = info.acodec.or(self.acodec.take());
        self.audio_channels = info.audio_channels.or(self.audio_channels);
        self.asr = info.asr.or(self.asr);
    }
}

/// A short id for formats hosted on <url>, taken from the host name.
pub fn format_id_from_url(url: &str) -> String {
    HOST_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "id".to_string())
}

// "https://vip.ffzy-play.com/..." gives "play", not "ffzy".
fn domain_id_from_url(url: &str) -> String {
    DOMAIN_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "id".to_string())
}

fn apply_style(formats: &mut [Format], style: MirrorStyle) {
    for format in formats.iter_mut() {
        match style {
            MirrorStyle::Ranked if format.is_throttled() => format.preference = -2,
            MirrorStyle::Ranked => {}
            MirrorStyle::Plain => format.format_id = domain_id_from_url(&format.url),
        }
    }
}

fn split_codecs(codecs: &str) -> (Option<String>, Option<String>) {
    let mut vcodec = None;
    let mut acodec = None;
    for codec in codecs.split(',').map(str::trim) {
        let family = codec.split('.').next().unwrap_or_default();
        match family {
            "avc1" | "avc3" | "hvc1" | "hev1" | "vp8" | "vp9" | "vp09" | "av01" => {
                vcodec = Some(codec.to_string())
            }
            "mp4a" | "ac-3" | "ec-3" | "opus" | "mp3" => acodec = Some(codec.to_string()),
            _ => (),
        }
    }
    (vcodec, acodec)
}

/// Turns the text of an HLS playlist found at <m3u8_url> into formats.
///
/// A master playlist yields one format per (non I-frame) variant, a media
/// playlist yields a single format pointing at itself.
pub fn parse_m3u8_formats(text: &str, m3u8_url: &str, note: &str) -> Result<Vec<Format>> {
    let base = Url::parse(m3u8_url)?;
    let host_id = format_id_from_url(m3u8_url);

    let playlist = m3u8_rs::parse_playlist_res(text.as_bytes())
        .map_err(|e| anyhow!("Could not parse the playlist at {}: {:?}", m3u8_url, e))?;

    let formats = match playlist {
        Playlist::MasterPlaylist(master) => {
            let variants: Vec<_> = master.variants.iter().filter(|v| !v.is_i_frame).collect();
            let single = variants.len() == 1;
            variants
                .into_iter()
                .map(|variant| {
                    let (vcodec, acodec) = variant
                        .codecs
                        .as_deref()
                        .map(split_codecs)
                        .unwrap_or_default();
                    let height = variant.resolution.as_ref().map(|r| r.height);
                    Format {
                        format_id: match height {
                            Some(h) if !single => format!("{}-{}p", host_id, h),
                            _ => host_id.clone(),
                        },
                        url: base
                            .join(&variant.uri)
                            .map(String::from)
                            .unwrap_or_else(|_| variant.uri.clone()),
                        ext: "mp4".to_string(),
                        protocol: Protocol::M3u8,
                        note: Some(note.to_string()),
                        width: variant.resolution.as_ref().map(|r| r.width),
                        height,
                        fps: variant.frame_rate,
                        tbr: Some(variant.bandwidth as f64 / 1000.0),
                        vcodec,
                        acodec,
                        ..Default::default()
                    }
                })
                .collect()
        }
        Playlist::MediaPlaylist(media) => {
            let duration: f64 = media.segments.iter().map(|s| s.duration as f64).sum();
            vec![Format {
                format_id: host_id,
                url: m3u8_url.to_string(),
                ext: "mp4".to_string(),
                protocol: Protocol::M3u8,
                note: Some(note.to_string()),
                duration: (duration > 0.0).then_some(duration),
                ..Default::default()
            }]
        }
    };

    Ok(formats)
}

pub fn extract_m3u8_formats(agent: &WebAgent, m3u8_url: &str, note: &str) -> Result<Vec<Format>> {
    let text = agent.get_text(m3u8_url, None)?;
    parse_m3u8_formats(&text, m3u8_url, note)
}

/// Formats of a player URL found on a mirror page, named and ranked
/// according to <style>.
///
/// Hosts in <skip_hosts> are known to be dead and are not even fetched.
/// Failures are logged and give no formats; one broken mirror must not
/// spoil the others.
pub fn player_formats(
    agent: &WebAgent,
    player_url: &str,
    note: &str,
    skip_hosts: &[&str],
    style: MirrorStyle,
) -> Vec<Format> {
    if let Some(host) = skip_hosts.iter().find(|h| player_url.contains(*h)) {
        debug!("Skipping {} (known dead host {})", player_url, host);
        return Vec::new();
    }

    let mut formats = match extract_m3u8_formats(agent, player_url, note) {
        Ok(formats) => formats,
        Err(e) => {
            warn!("No formats from {}: {}", player_url, e);
            return Vec::new();
        }
    };

    apply_style(&mut formats, style);

    // Throttled hosts often lie about their streams.
    for format in formats.iter_mut().filter(|f| f.is_throttled()) {
        if ffmpeg::ffprobe_available() {
            match ffmpeg::stream_info(&format.url) {
                Ok(info) => format.apply_stream_info(info),
                Err(e) => debug!("ffprobe failed on {}: {}", format.url, e),
            }
        }
    }

    formats
}

fn compare_formats(a: &Format, b: &Format) -> Ordering {
    a.preference
        .cmp(&b.preference)
        .then(a.height.cmp(&b.height))
        .then(a.tbr.partial_cmp(&b.tbr).unwrap_or(Ordering::Equal))
}

/// The format to download: preferred mirrors first, then the highest
/// resolution, then the highest bitrate. On a tie the earliest wins.
pub fn best_format(formats: &[Format]) -> Option<&Format> {
    formats.iter().rev().max_by(|a, b| compare_formats(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"
720p/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXTINF:10.0,
seg0.ts
#EXTINF:8.5,
seg1.ts
#EXT-X-ENDLIST
";

    #[test]
    fn host_ids() {
        assert_eq!(
            format_id_from_url("https://vip.ffzy-play.com/20230709/123/index.m3u8"),
            "ffzy"
        );
        assert_eq!(format_id_from_url("https://cdn.example.com/a/index.m3u8"), "example");
        assert_eq!(format_id_from_url("not a url"), "id");
    }

    #[test]
    fn master_playlist_variants() {
        let formats =
            parse_m3u8_formats(MASTER, "https://v.example.com/play/abc/index.m3u8", "EP1 (A)").unwrap();
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].url, "https://v.example.com/play/abc/360p/index.m3u8");
        assert_eq!(formats[1].height, Some(720));
        assert_eq!(formats[1].format_id, "example-720p");
        assert_eq!(formats[1].vcodec.as_deref(), Some("avc1.4d401f"));
        assert_eq!(formats[1].acodec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(formats[1].tbr, Some(2800.0));
        assert_eq!(formats[1].note.as_deref(), Some("EP1 (A)"));
        assert_eq!(formats[1].protocol, Protocol::M3u8);
    }

    #[test]
    fn media_playlist_is_one_format() {
        let formats =
            parse_m3u8_formats(MEDIA, "https://v.example.com/play/abc/index.m3u8", "EP1 (A)").unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].url, "https://v.example.com/play/abc/index.m3u8");
        assert_eq!(formats[0].duration, Some(18.5));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_m3u8_formats("<html>", "https://v.example.com/x.m3u8", "").is_err());
    }

    #[test]
    fn skip_hosts_are_not_fetched() {
        let agent = WebAgent::new(Default::default());
        let formats = player_formats(
            &agent,
            "https://hn.bfvvs.com/play/index.m3u8",
            "EP1",
            &["hn.bfvvs.com"],
            MirrorStyle::Ranked,
        );
        assert!(formats.is_empty());
    }

    #[test]
    fn mirror_styles() {
        let formats = || {
            vec![
                Format {
                    format_id: "subokk".into(),
                    url: "https://hnzy2.subokk.com/20230709/x/index.m3u8".into(),
                    ..Default::default()
                },
                Format {
                    format_id: "ffzy".into(),
                    url: "https://vip.ffzy-play.com/20230709/y/index.m3u8".into(),
                    ..Default::default()
                },
            ]
        };

        let mut ranked = formats();
        apply_style(&mut ranked, MirrorStyle::Ranked);
        assert_eq!(ranked[0].preference, -2);
        assert_eq!(ranked[1].preference, 0);
        assert_eq!(ranked[1].format_id, "ffzy");

        let mut plain = formats();
        apply_style(&mut plain, MirrorStyle::Plain);
        assert_eq!(plain[0].preference, 0);
        assert_eq!(plain[0].format_id, "subokk");
        assert_eq!(plain[1].format_id, "play");
    }

    #[test]
    fn picks_the_best_format() {
        let throttled = Format {
            format_id: "bfvvs".into(),
            height: Some(1080),
            preference: -2,
            ..Default::default()
        };
        let low = Format {
            format_id: "low".into(),
            height: Some(480),
            ..Default::default()
        };
        let high = Format {
            format_id: "high".into(),
            height: Some(720),
            tbr: Some(1500.0),
            ..Default::default()
        };
        let twin = Format {
            format_id: "twin".into(),
            height: Some(720),
            tbr: Some(1500.0),
            ..Default::default()
        };
        let formats = vec![throttled, low, high, twin];
        assert_eq!(best_format(&formats).unwrap().format_id, "high");
        assert!(best_format(&[]).is_none());
    }
}
