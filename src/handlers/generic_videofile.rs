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
// - single video file handler -

use crate::definitions::{Context, Extraction, Metadata, SiteDefinition, VideoInfo};
use crate::error::ExtractError;
use crate::formats::{extract_m3u8_formats, format_id_from_url, Format};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(mp4|mpg|m3u8)(\?.*)?$").unwrap());

// The last path segment without its extension, e.g. "index" for
// "https://cdn.example.com/v/index.m3u8?t=1".
fn file_stem(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.last()?.to_string();
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&name);
    (!stem.is_empty()).then(|| stem.to_string())
}

// Implement the site definition:
struct GenericFileHandler;
impl SiteDefinition for GenericFileHandler {
    fn can_handle_url(&self, url: &str) -> bool {
        url.starts_with("http") && FILE_RE.is_match(url)
    }

    fn display_name(&self) -> String {
        "(direct)".to_string()
    }

    fn extract(&self, ctx: &Context<'_>, url: &str) -> Result<Extraction> {
        let caps = FILE_RE
            .captures(url)
            .ok_or_else(|| ExtractError::Unsupported(url.to_string()))?;
        let title = file_stem(url).unwrap_or_else(|| format_id_from_url(url));

        let formats = match &caps[1] {
            "m3u8" => extract_m3u8_formats(ctx.agent, url, "direct")?,
            // This time, this is simple.
            ext => vec![Format {
                format_id: format_id_from_url(url),
                url: url.to_string(),
                ext: ext.to_string(),
                ..Default::default()
            }],
        };

        Ok(Extraction::Video(VideoInfo {
            meta: Metadata {
                id: title.clone(),
                title,
                ..Default::default()
            },
            episode: None,
            formats,
        }))
    }
}

// Push the site definition to the list of known handlers:
inventory::submit! {
    &GenericFileHandler as &dyn SiteDefinition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_plain_files() {
        let handler = GenericFileHandler;
        assert!(handler.can_handle_url("https://cdn.example.com/v/file.mp4"));
        assert!(handler.can_handle_url("https://cdn.example.com/v/index.m3u8?t=1"));
        assert!(!handler.can_handle_url("https://cdn.example.com/v/page.html"));
        assert!(!handler.can_handle_url("gimy:100699"));
    }

    #[test]
    fn titles_from_file_names() {
        assert_eq!(
            file_stem("https://cdn.example.com/v/index.m3u8?t=1").as_deref(),
            Some("index")
        );
        assert_eq!(file_stem("https://cdn.example.com/v/clip.mp4").as_deref(), Some("clip"));
        assert_eq!(file_stem("https://cdn.example.com/"), None);
    }
}
