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
// - main.rs file -

use anyhow::Result;
use clap::Parser;
use std::{env, fs, path::Path, str::FromStr, time::Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod agent;
mod definitions;
mod download;
mod episode;
mod error;
mod ffmpeg;
mod formats;
mod handlers;
mod page;
mod reconcile;

use agent::{Settings, WebAgent, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use definitions::{Context, Extraction, PlaylistInfo, Registry, Resolver, VideoInfo};
use error::ExtractError;
use formats::{best_format, Format, Protocol};

// Search URL -> search key is the longest chain the sites build.
const MAX_REDIRECTS: usize = 5;

#[derive(Parser)]
#[clap(version, about = "Mirror Down Loader", long_about = None)]
struct Args {
    #[clap(
        long = "keep-temp-file",
        short = 'k',
        help = "Keeps the downloaded .ts file after remuxing it"
    )]
    keeptempfile: bool,

    #[clap(long, short = 'v', help = "Talks more while the URL is processed")]
    verbose: bool,

    #[clap(long, short = 's', help = "Extracts the URL, but downloads nothing")]
    simulate: bool,

    #[clap(
        long = "list-formats",
        short = 'F',
        help = "Lists the formats found on all mirrors, then stops"
    )]
    listformats: bool,

    #[clap(long = "output", short = 'o', help = "Sets the output file name")]
    outputfile: Option<String>,

    #[clap(long = "playlist-end", help = "Processes at most this many playlist entries")]
    playlistend: Option<usize>,

    #[clap(long = "user-agent", help = "Sets the User-Agent header")]
    useragent: Option<String>,

    #[clap(long, help = "Sets the network timeout in seconds")]
    timeout: Option<u64>,

    #[clap(help = "Sets the input URL to use", index = 1)]
    url: String,
}

// The command line wins over the environment ("MIRRORDL_USER_AGENT",
// "MIRRORDL_TIMEOUT"), which wins over the defaults.
fn settings_from(args: &Args) -> Settings {
    let user_agent = args
        .useragent
        .clone()
        .or_else(|| env::var("MIRRORDL_USER_AGENT").ok())
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let timeout = args
        .timeout
        .or_else(|| {
            env::var("MIRRORDL_TIMEOUT")
                .ok()
                .and_then(|t| u64::from_str(t.trim()).ok())
        })
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Settings {
        user_agent,
        timeout: Duration::from_secs(timeout),
        verbose: args.verbose,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mirrordl={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn sanitize_filename(title: &str) -> String {
    title
        .trim()
        .replace(&['|', '\'', '\"', ':', '\\', '/', '?', '*', '<', '>'][..], "")
}

/// Follows redirects until a site definition returns a video or a playlist.
fn resolve(ctx: &Context<'_>, url: &str) -> Result<Extraction> {
    let mut url = url.to_string();
    for _ in 0..=MAX_REDIRECTS {
        match Registry.resolve(ctx, &url)? {
            Some(Extraction::Redirect(target)) => {
                debug!("{} redirects to {}", url, target);
                url = target;
            }
            Some(extraction) => return Ok(extraction),
            None => return Err(ExtractError::Unsupported(url).into()),
        }
    }
    Err(ExtractError::RedirectLoop(url).into())
}

fn print_formats(formats: &[Format]) {
    println!("{:<24} {:<5} {:<10} {:>8}  NOTE", "ID", "EXT", "RESOLUTION", "TBR");
    for format in formats {
        println!(
            "{:<24} {:<5} {:<10} {:>8}  {}",
            format.format_id,
            format.ext,
            format.resolution(),
            format.tbr.map(|t| format!("{:.0}k", t)).unwrap_or_default(),
            format.note.as_deref().unwrap_or_default()
        );
    }
}

fn process(ctx: &Context<'_>, args: &Args, url: &str, outputfile: Option<&str>) -> Result<()> {
    match resolve(ctx, url)? {
        Extraction::Video(video) => process_video(ctx, args, video, outputfile),
        Extraction::Playlist(playlist) => process_playlist(ctx, args, playlist),
        Extraction::Redirect(target) => Err(ExtractError::RedirectLoop(target).into()),
    }
}

fn process_playlist(ctx: &Context<'_>, args: &Args, playlist: PlaylistInfo) -> Result<()> {
    println!(
        "Playlist \"{}\" [{}]: {} entries",
        playlist.meta.title,
        playlist.meta.id,
        playlist.entries.len()
    );

    let wanted = args.playlistend.unwrap_or(usize::MAX).min(playlist.entries.len());
    for (idx, entry) in playlist.entries.iter().take(wanted).enumerate() {
        info!("Processing entry {} of {}: {}", idx + 1, wanted, entry);

        // One broken entry must not end the playlist.
        if let Err(e) = process(ctx, args, entry, None) {
            warn!("{}: {}", entry, e);
        }
    }

    Ok(())
}

fn process_video(ctx: &Context<'_>, args: &Args, video: VideoInfo, outputfile: Option<&str>) -> Result<()> {
    println!("{} [{}]", video.meta.title, video.meta.id);
    if ctx.settings().verbose {
        if let Some(episode) = &video.episode {
            println!("Episode: {}", episode);
        }
        if let Some(description) = &video.meta.description {
            println!("{}", description);
        }
    }

    if args.listformats {
        print_formats(&video.formats);
        return Ok(());
    }

    let format = best_format(&video.formats).ok_or_else(|| ExtractError::NoFormats(video.meta.id.clone()))?;
    info!("Best format: {} ({})", format.format_id, format.resolution());

    if args.simulate {
        return Ok(());
    }

    // Now let's download it:
    let targetfile = match outputfile {
        Some(name) => name.to_string(),
        None => format!("{}.{}", sanitize_filename(&video.meta.title), format.ext),
    };

    match format.protocol {
        Protocol::M3u8 => {
            // Multi-part download, remuxed afterwards.
            let tempfile = format!("{}.ts", targetfile);
            download::download_from_playlist(ctx.agent, &format.url, &tempfile)?;

            debug!("Post-processing.");
            ffmpeg::ts_to_mp4(Path::new(&tempfile), Path::new(&targetfile))?;

            // Get rid of the evidence.
            if !args.keeptempfile {
                fs::remove_file(&tempfile)?;
            }
        }
        Protocol::Https => {
            // Single-file download.
            download::download(ctx.agent, &format.url, &targetfile)?;
        }
    }

    // Success!
    println!("\"{}\" successfully downloaded.", targetfile);
    Ok(())
}

fn main() -> Result<()> {
    // Argument parsing:
    let args = Args::parse();
    init_logging(args.verbose);

    let agent = WebAgent::new(settings_from(&args));
    debug!("Settings: {:?}", agent.settings());

    let ctx = Context::new(&agent, &Registry);
    process(&ctx, &args, &args.url, args.outputfile.as_deref())
}
