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
// - definitions.rs file -

use crate::agent::{Settings, WebAgent};
use crate::formats::Format;

use anyhow::Result;
use tracing::info;

/// What the sites tell about a video or a show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub upload_date: Option<String>,
    pub release_year: Option<i32>,
    pub average_rating: Option<f64>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cast: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub meta: Metadata,
    /// Only set if the page is one episode of a series.
    pub episode: Option<String>,
    pub formats: Vec<Format>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistInfo {
    pub meta: Metadata,
    /// URLs of the entries, in playing order.
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Video(VideoInfo),
    Playlist(PlaylistInfo),
    /// The URL is only an alias of another one.
    Redirect(String),
}

/// Resolves a URL through whichever site definition handles it.
pub trait Resolver {
    // Ok(None), if no site definition knows <url>.
    fn resolve(&self, ctx: &Context<'_>, url: &str) -> Result<Option<Extraction>>;
}

/// Everything a site definition gets to work with.
pub struct Context<'a> {
    pub agent: &'a WebAgent,
    resolver: &'a dyn Resolver,
}

impl<'a> Context<'a> {
    pub fn new(agent: &'a WebAgent, resolver: &'a dyn Resolver) -> Self {
        Context { agent, resolver }
    }

    pub fn settings(&self) -> &Settings {
        self.agent.settings()
    }

    /// Hands <url> to the site definition responsible for it. Used for
    /// players embedded from other sites.
    pub fn delegate(&self, url: &str) -> Result<Option<Extraction>> {
        self.resolver.resolve(self, url)
    }
}

// Define the public interface for site definitions:
pub trait SiteDefinition: Sync {
    // true, if this site can handle <url>.
    fn can_handle_url(&self, url: &str) -> bool;

    // returns the name of the site (e.g. "gimy").
    fn display_name(&self) -> String;

    // extracts the video, playlist or redirect behind <url>.
    fn extract(&self, ctx: &Context<'_>, url: &str) -> Result<Extraction>;
}

inventory::collect!(&'static dyn SiteDefinition);

/// All site definitions compiled into mirrordl.
pub struct Registry;

impl Registry {
    pub fn find(url: &str) -> Option<&'static dyn SiteDefinition> {
        inventory::iter::<&'static dyn SiteDefinition>
            .into_iter()
            .find(|handler| handler.can_handle_url(url))
            .copied()
    }
}

impl Resolver for Registry {
    fn resolve(&self, ctx: &Context<'_>, url: &str) -> Result<Option<Extraction>> {
        match Registry::find(url) {
            Some(handler) => {
                info!("Fetching from {}.", handler.display_name());
                handler.extract(ctx, url).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl Resolver for Echo {
        fn resolve(&self, _ctx: &Context<'_>, url: &str) -> Result<Option<Extraction>> {
            Ok(Some(Extraction::Redirect(url.to_string())))
        }
    }

    #[test]
    fn delegation_goes_through_the_resolver() {
        let agent = WebAgent::new(Settings::default());
        let ctx = Context::new(&agent, &Echo);
        assert_eq!(
            ctx.delegate("https://ok.ru/videoembed/1").unwrap(),
            Some(Extraction::Redirect("https://ok.ru/videoembed/1".into()))
        );
    }

    #[test]
    fn registry_knows_the_sites() {
        let name = |url| Registry::find(url).map(|h| h.display_name());
        assert_eq!(name("https://gimy.cc/video/190274-1-31.html").as_deref(), Some("gimy"));
        assert_eq!(name("idoltv:552-2-60").as_deref(), Some("IDOLTV"));
        assert_eq!(name("https://cdn.example.com/v/file.mp4").as_deref(), Some("(direct)"));
        assert!(name("https://example.com/page.html").is_none());
    }
}
