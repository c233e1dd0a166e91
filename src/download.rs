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
// - download.rs file -

use crate::agent::WebAgent;
use crate::error::ExtractError;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use nom::Finish;
use std::{
    fs,
    io::{self, copy, Read},
    path::Path,
};
use tracing::{debug, info};
use url::Url;

struct DownloadProgress<'a, R> {
    inner: R,
    progress_bar: &'a ProgressBar,
}

impl<R: Read> Read for DownloadProgress<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map(|n| {
            self.progress_bar.inc(n as u64);
            n
        })
    }
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.green/blue}] {percent}%",
        )?
        .progress_chars("#>-"),
    );
    Ok(pb)
}

pub fn download_from_playlist(agent: &WebAgent, url: &str, filename: &str) -> Result<()> {
    // Download the playlist file into the temporary directory:
    debug!("Found a playlist. Fetching ...");

    let base = Url::parse(url)?;
    let playlist_text = agent.get_text(base.as_str(), Some(base.as_str()))?;

    debug!("Parsing ...");

    // Parse the playlist:
    let (_, playlist) = m3u8_rs::parse_media_playlist(playlist_text.as_bytes())
        .finish()
        .map_err(|e| anyhow!("Could not parse the playlist at {}: {:?}", url, e.code))?;

    // Grab and concatenate the segments from the playlist:
    let file = Path::new(&filename);
    let mut dest = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file)?;

    // Display a progress bar:
    let pb = progress_bar(playlist.segments.len() as u64)?;

    for segment in &playlist.segments {
        // .m3u8 playlists are usually relative:
        //   playlist URL:  https://foo.bar/play/file.m3u8
        //   playlist item: file1.ts
        //   result:        https://foo.bar/play/file1.ts
        let segment_url = base.join(&segment.uri)?;

        let mut source = agent
            .get(segment_url.as_str(), Some(base.as_str()), None)?
            .into_reader();

        // Segments are written back to back into the same file.
        let _ = copy(&mut source, &mut dest)?;

        // Update the progress bar:
        pb.inc(1);
    }

    pb.finish_and_clear();

    Ok(())
}

fn is_range_not_satisfiable(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<ExtractError>(),
        Some(ExtractError::HttpStatus { code: 416, .. })
    )
}

pub fn download(agent: &WebAgent, url: &str, filename: &str) -> Result<()> {
    let file = Path::new(filename);

    // Continue the file if there is one:
    let resume_from = match file.metadata() {
        Ok(meta) if meta.len() > 0 => Some(meta.len()),
        _ => None,
    };

    let resp = match agent.get(url, Some(url), resume_from) {
        Ok(resp) => resp,
        // Nothing left past the end of the file.
        Err(e) if resume_from.is_some() && is_range_not_satisfiable(&e) => {
            info!("\"{}\" is already complete.", filename);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // Servers that ignore the range send everything again.
    let resumed = resume_from.is_some() && resp.status() == 206;

    // Find the video size:
    let remaining = resp
        .header("Content-Length")
        .and_then(|len| len.parse::<u64>().ok())
        .unwrap_or(0);

    // Display a progress bar:
    let pb = progress_bar(remaining)?;
    if resumed {
        let already = resume_from.unwrap_or(0);
        pb.set_length(remaining + already);
        pb.inc(already);
        debug!("Resuming at byte {}.", already);
    }

    let mut source = DownloadProgress {
        progress_bar: &pb,
        inner: resp.into_reader(),
    };

    let mut dest = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(resumed)
        .truncate(!resumed)
        .open(file)?;

    let _ = copy(&mut source, &mut dest)?;

    pb.finish_and_clear();

    Ok(())
}
