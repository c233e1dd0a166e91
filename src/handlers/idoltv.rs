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
// - IDOLTV handler -

use crate::definitions::{Context, Extraction, Metadata, PlaylistInfo, SiteDefinition, VideoInfo};
use crate::error::ExtractError;
use crate::formats::{player_formats, Format, MirrorStyle};
use crate::handlers::{decode_query, link_key, merge_formats, parse_search_key};
use crate::page::{self, absolute_url, html_search, is_http_url, search_meta};
use crate::reconcile::{dedupe_playlist, reconcile, SourceGroup};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, warn};

const BASE: &str = "https://idoltv.tv/";
const SEARCH_KEY: &str = "idoltvsearch";
const MISSING: &str = "<h1>404</h1>";

const SKIP_HOSTS: [&str; 6] = [
    "v8.tlkqc.com",
    ".fsvod1.com",
    "hnzy.bfvvs.com",
    "hnzy3.hnzyww.com",
    "cdn6.shzbgyl.com",
    "cdn7.hbhaoyi.com",
];

static PLAY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:idoltv:|https?://idoltv\.tv/play/)(?P<id>\d+)-(?P<source_id>\d+)-(?P<episode_id>\d+)").unwrap()
});
static VOD_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:idoltv:|https?://idoltv\.tv/vod/)(?P<id>\d+)").unwrap());
static SEARCH_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://idoltv\.tv/vodsearch\.html\?wd=(?P<query>[^&]+)").unwrap());

static GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"當前資源由(.+?)\(?\)?提供([\s\S]+?)展開").unwrap());
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<li.*><a.* href="(.+)">(.+?)</a></li>"#).unwrap());
static PLAYER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"video:\s*\{\s*url:\s*'([^']+)',").unwrap());
static LINK_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)-(\d+)\.html").unwrap());

// play pages
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<h2 class="title margin_0">(.+)</h2>"#).unwrap());
static INFO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p class="nstem data ms_p margin_0">([\s\S]*?)</p>"#).unwrap());
static INTRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="panel play_content[^>]*>\s*<p>([\s\S]+?)</p>"#).unwrap());
static CAST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>主演：(.*)</p>").unwrap());
static SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<li class="tab-play conch-01" title="(.+)"><a href=.*>"#).unwrap());
static SERIES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="[^"].+[上下]集"#).unwrap());

// vod pages
static VOD_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"itemprop="name">(.+)</span>"#).unwrap());
static VOD_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="year">.*>(\d+)</a>"#).unwrap());
static VOD_AREA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="area">.*>(.+)</a>"#).unwrap());
static VOD_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="class">.*>(.+)</a>"#).unwrap());
static VOD_ACTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="actor">(.+)</li>"#).unwrap());
static VOD_DIRECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="director">(.+?)</li>"#).unwrap());
static VOD_INTRO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div class="content_desc full_text clearfix" id="description">([\s\S]+?)</span>"#).unwrap()
});
static VOD_RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span class="star_tips">(\d+\.\d+)</span>"#).unwrap());

// search pages
static MAC_TOTAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\(.\.mac_total.\)\.html\(.(\d+).\);").unwrap());
static SEARCH_BOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="searchlist_titbox">([\s\S]+?)查看詳情"#).unwrap());
static SEARCH_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="vodlist_title"><a href="(.+)" title=""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdoltvUrl {
    Play {
        id: String,
        source_id: String,
        episode_id: String,
    },
    Vod(String),
    Search { limit: usize, query: String },
    SearchPage(String),
}

impl IdoltvUrl {
    fn parse(url: &str) -> Option<IdoltvUrl> {
        if let Some((limit, query)) = parse_search_key(url, SEARCH_KEY) {
            return Some(IdoltvUrl::Search { limit, query });
        }
        if let Some(caps) = SEARCH_URL_RE.captures(url) {
            return Some(IdoltvUrl::SearchPage(decode_query(&caps["query"])));
        }
        if let Some(caps) = PLAY_URL_RE.captures(url) {
            return Some(IdoltvUrl::Play {
                id: caps["id"].to_string(),
                source_id: caps["source_id"].to_string(),
                episode_id: caps["episode_id"].to_string(),
            });
        }
        VOD_URL_RE
            .captures(url)
            .map(|caps| IdoltvUrl::Vod(caps["id"].to_string()))
    }
}

/// What to do with a player URL, depending on the mirror that embeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Player {
    /// The video lives on another site.
    Delegate(String),
    Hls(String),
    Skip,
}

fn classify_player(source: &str, player_url: &str) -> Player {
    match source.to_lowercase().as_str() {
        "bilibili" if player_url.contains("search.bilibili.com") => Player::Skip,
        "bilibili" => Player::Delegate(player_url.to_string()),
        "okru" => Player::Delegate(format!("https://ok.ru/videoembed/{}", player_url)),
        "youtube" if player_url.len() == 11 => {
            Player::Delegate(format!("https://www.youtube.com/watch?v={}", player_url))
        }
        _ if is_http_url(player_url) && !SKIP_HOSTS.iter().any(|h| player_url.contains(h)) => {
            Player::Hls(player_url.to_string())
        }
        _ => Player::Skip,
    }
}

/// What one player gave us.
#[derive(Debug, Clone, PartialEq)]
enum Found {
    Formats(Vec<Format>),
    Entries(Vec<String>),
    Nothing,
}

fn player_result(ctx: &Context<'_>, source: &str, label: &str, player_url: &str) -> Found {
    match classify_player(source, player_url) {
        Player::Skip => Found::Nothing,
        Player::Hls(url) => {
            let note = format!("{} ({})", label, source);
            let formats: Vec<Format> =
                player_formats(ctx.agent, &url, &note, &SKIP_HOSTS, MirrorStyle::Plain)
                    .into_iter()
                    .take(1)
                    .collect();
            if formats.is_empty() {
                Found::Nothing
            } else {
                Found::Formats(formats)
            }
        }
        Player::Delegate(url) => {
            info!("Extracting embedded URL: {}", url);
            match ctx.delegate(&url) {
                Ok(Some(Extraction::Video(video))) => Found::Formats(video.formats),
                Ok(Some(Extraction::Playlist(playlist))) => Found::Entries(playlist.entries),
                Ok(Some(Extraction::Redirect(target))) => Found::Entries(vec![target]),
                // Nobody here knows the site; let the caller see the URL.
                Ok(None) => Found::Entries(vec![url]),
                Err(e) => {
                    warn!("{}: {}", url, e);
                    Found::Nothing
                }
            }
        }
    }
}

/// The mirror tabs of a play or vod page with their episode lists.
fn parse_source_groups(webpage: &str) -> Vec<SourceGroup> {
    GROUP_RE
        .captures_iter(webpage)
        .map(|caps| {
            let mut group = SourceGroup::new(caps[1].trim());
            for link in LINK_RE.captures_iter(&caps[2]) {
                group.push(&link[1], page::clean_html(&link[2]));
            }
            group
        })
        .collect()
}

fn parse_player_urls(webpage: &str) -> Vec<String> {
    PLAYER_RE
        .captures_iter(webpage)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PlayPage {
    meta: Metadata,
    episode: String,
    current_source: String,
    player_urls: Vec<String>,
    groups: Vec<SourceGroup>,
    is_series: bool,
}

fn parse_play_page(video_id: &str, webpage: &str) -> PlayPage {
    let doc = Html::parse_document(webpage);
    let fulltitle = page::extract_title(&doc)
        .or_else(|| search_meta(&doc, &["og:title", "twitter:title"]))
        .unwrap_or_default();
    let mut fulltitle_parts = fulltitle.split(" | ");
    let show = fulltitle_parts.next().unwrap_or_default().to_string();
    let category = fulltitle_parts.next().map(str::to_string);

    let title = html_search(&TITLE_RE, webpage).unwrap_or(show);
    let episode = title
        .split(" | ")
        .nth(1)
        .or_else(|| title.split(' ').last())
        .unwrap_or_default()
        .to_string();

    // "<rating> <tag> <tag> ...", the rating being optional.
    let (rating, tags) = match page::search(&INFO_RE, webpage) {
        Some(info) => match info.find("<a ") {
            Some(at) => (page::clean_html(&info[..at]), page::clean_html(&info[at..])),
            None => (String::new(), page::clean_html(&info)),
        },
        None => (String::new(), String::new()),
    };
    let tags: Vec<String> = tags.split_whitespace().map(str::to_string).collect();

    let description = html_search(&INTRO_RE, webpage).or_else(|| {
        search_meta(&doc, &["description", "og:description", "twitter:description"])
            .and_then(|d| d.rsplit('|').next().map(|s| s.trim().to_string()))
    });

    PlayPage {
        meta: Metadata {
            id: video_id.to_string(),
            release_year: tags.first().and_then(|y| y.parse().ok()),
            average_rating: rating.parse().ok(),
            description,
            thumbnail: search_meta(&doc, &["og:image", "twitter:image"]).filter(|u| is_http_url(u)),
            categories: category.into_iter().collect(),
            cast: html_search(&CAST_RE, webpage)
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            tags,
            title,
            ..Default::default()
        },
        episode,
        current_source: page::search(&SOURCE_RE, webpage).unwrap_or_else(|| "0".to_string()),
        player_urls: parse_player_urls(webpage),
        groups: parse_source_groups(webpage),
        is_series: SERIES_RE.is_match(webpage),
    }
}

fn parse_vod_meta(id: &str, webpage: &str) -> Metadata {
    let doc = Html::parse_document(webpage);
    let fulltitle = page::extract_title(&doc)
        .or_else(|| search_meta(&doc, &["og:title", "twitter:title"]))
        .unwrap_or_default();
    let mut fulltitle_parts = fulltitle.split(" | ");

    let actor = html_search(&VOD_ACTOR_RE, webpage).unwrap_or_default();
    let director = html_search(&VOD_DIRECTOR_RE, webpage).unwrap_or_default();
    let intro = html_search(&VOD_INTRO_RE, webpage)
        .or_else(|| {
            search_meta(&doc, &["description", "og:description", "twitter:description"])
                .and_then(|d| d.rsplit('|').next().map(|s| s.trim().to_string()))
        })
        .unwrap_or_default();

    Metadata {
        id: id.to_string(),
        title: html_search(&VOD_NAME_RE, webpage)
            .or_else(|| fulltitle_parts.next().map(str::to_string))
            .unwrap_or_else(|| id.to_string()),
        categories: html_search(&VOD_CLASS_RE, webpage)
            .or_else(|| fulltitle_parts.next().map(str::to_string))
            .into_iter()
            .collect(),
        description: Some(format!("{} \n{} \n{}", director, actor, intro)),
        thumbnail: search_meta(&doc, &["og:image", "twitter:image"]).filter(|u| is_http_url(u)),
        release_year: html_search(&VOD_YEAR_RE, webpage).and_then(|y| y.parse().ok()),
        average_rating: html_search(&VOD_RATING_RE, webpage).and_then(|r| r.parse().ok()),
        location: html_search(&VOD_AREA_RE, webpage),
        cast: actor
            .replace("主演：", "")
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        ..Default::default()
    }
}

/// The vod page URLs of one search result page, and the total number of
/// results if the page tells.
fn parse_search_page(webpage: &str) -> (Option<usize>, Vec<String>) {
    let total = page::search(&MAC_TOTAL_RE, webpage).and_then(|t| t.parse().ok());
    let results = SEARCH_BOX_RE
        .captures_iter(webpage)
        .filter_map(|caps| page::search(&SEARCH_LINK_RE, &caps[1]))
        .map(|path| absolute_url(BASE, &path))
        .collect();
    (total, results)
}

// Implement the site definition:
struct IdoltvHandler;

impl IdoltvHandler {
    fn extract_play(&self, ctx: &Context<'_>, id: &str, source_id: &str, episode_id: &str) -> Result<Extraction> {
        let video_id = format!("{}-{}-{}", id, source_id, episode_id);
        let url = format!("https://idoltv.tv/play/{}.html", video_id);
        let webpage = ctx.agent.download_webpage(&url)?;
        if webpage.contains(MISSING) {
            return Err(ExtractError::NotFound(url).into());
        }

        let page = parse_play_page(&video_id, &webpage);
        let mut formats = Vec::new();
        let mut entries = Vec::new();

        for player_url in &page.player_urls {
            match player_result(ctx, &page.current_source, &page.episode, player_url) {
                Found::Formats(found) => merge_formats(&mut formats, found),
                Found::Entries(found) => entries = found,
                Found::Nothing => (),
            }
        }

        let mirrors = if page.episode.is_empty() {
            Vec::new()
        } else {
            reconcile(&page.groups, &page.episode, &page.current_source)
        };
        for mirror in mirrors {
            let mirror_url = absolute_url(BASE, &mirror.link);
            info!("Extracting URL: {}", mirror_url);

            let mirror_page = match ctx.agent.download_webpage(&mirror_url) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping mirror {}: {}", mirror.source_name, e);
                    continue;
                }
            };
            for player_url in parse_player_urls(&mirror_page) {
                match player_result(ctx, &mirror.source_name, &mirror.label, &player_url) {
                    Found::Formats(found) => merge_formats(&mut formats, found),
                    // Embedded playlists only stand in for a missing video.
                    Found::Entries(found) if formats.is_empty() => entries = found,
                    _ => (),
                }
            }
        }

        if !formats.is_empty() {
            Ok(Extraction::Video(VideoInfo {
                episode: page.is_series.then_some(page.episode),
                meta: page.meta,
                formats,
            }))
        } else if !entries.is_empty() {
            Ok(Extraction::Playlist(PlaylistInfo {
                meta: page.meta,
                entries,
            }))
        } else {
            Err(ExtractError::NoFormats(video_id).into())
        }
    }

    fn extract_vod(&self, ctx: &Context<'_>, id: &str) -> Result<Extraction> {
        let url = format!("https://idoltv.tv/vod/{}.html", id);
        let webpage = ctx.agent.download_webpage(&url)?;
        if webpage.contains(MISSING) {
            return Err(ExtractError::NotFound(url).into());
        }

        let (bilibili, others): (Vec<SourceGroup>, Vec<SourceGroup>) = parse_source_groups(&webpage)
            .into_iter()
            .partition(|group| group.source_name == "bilibili");

        // bilibili episodes are collections of their own; list what they hold.
        let mut entries = Vec::new();
        for entry in bilibili.iter().flat_map(|group| &group.entries) {
            let play_url = absolute_url(BASE, &entry.link);
            let Some(IdoltvUrl::Play {
                id,
                source_id,
                episode_id,
            }) = IdoltvUrl::parse(&play_url)
            else {
                debug!("Not a play page: {}", play_url);
                continue;
            };

            match self.extract_play(ctx, &id, &source_id, &episode_id) {
                Ok(Extraction::Playlist(playlist)) => entries.extend(playlist.entries),
                Ok(_) => entries.push(play_url),
                Err(e) => warn!("Skipping {}: {}", play_url, e),
            }
        }

        entries.extend(
            dedupe_playlist(&others, |entry| link_key(&LINK_KEY_RE, &entry.link))
                .into_iter()
                .map(|entry| absolute_url(BASE, &entry.link)),
        );

        Ok(Extraction::Playlist(PlaylistInfo {
            meta: parse_vod_meta(id, &webpage),
            entries,
        }))
    }

    fn search(&self, ctx: &Context<'_>, query: &str, limit: usize) -> Result<Extraction> {
        let mut entries = Vec::new();
        let mut total = None;
        let encoded = urlencoding::encode(query);

        'pages: for page_number in 1.. {
            if entries.len() >= limit {
                break;
            }
            let url = format!("https://idoltv.tv/vodsearch/page/{}/wd/{}.html", page_number, encoded);
            debug!("Downloading result page {}", page_number);

            let webpage = ctx.agent.download_webpage(&url)?;
            if webpage.contains(MISSING) {
                return Err(ExtractError::NotFound(url).into());
            }

            let (page_total, results) = parse_search_page(&webpage);
            total = total.or(page_total);
            if total == Some(0) || results.is_empty() {
                break;
            }
            for result in results {
                entries.push(result);
                if entries.len() >= limit {
                    break 'pages;
                }
            }

            if !webpage.contains(&format!("href=\"/vodsearch/page/{}/wd/", page_number + 1)) {
                break;
            }
        }

        Ok(Extraction::Playlist(PlaylistInfo {
            meta: Metadata {
                id: query.to_string(),
                title: query.to_string(),
                ..Default::default()
            },
            entries,
        }))
    }
}

impl SiteDefinition for IdoltvHandler {
    fn can_handle_url(&self, url: &str) -> bool {
        IdoltvUrl::parse(url).is_some()
    }

    fn display_name(&self) -> String {
        "IDOLTV".to_string()
    }

    fn extract(&self, ctx: &Context<'_>, url: &str) -> Result<Extraction> {
        match IdoltvUrl::parse(url) {
            Some(IdoltvUrl::Play {
                id,
                source_id,
                episode_id,
            }) => self.extract_play(ctx, &id, &source_id, &episode_id),
            Some(IdoltvUrl::Vod(id)) => self.extract_vod(ctx, &id),
            Some(IdoltvUrl::Search { limit, query }) => self.search(ctx, &query, limit),
            Some(IdoltvUrl::SearchPage(query)) => {
                info!(
                    "You can use {} to specify the maximum number of results, e.g. {}20:{}",
                    SEARCH_KEY, SEARCH_KEY, query
                );
                Ok(Extraction::Redirect(format!("{}all:{}", SEARCH_KEY, query)))
            }
            None => Err(ExtractError::Unsupported(url.to_string()).into()),
        }
    }
}

// Push the site definition to the list of known handlers:
inventory::submit! {
    &IdoltvHandler as &dyn SiteDefinition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Settings, WebAgent};
    use crate::definitions::Resolver;

    const PLAY: &str = r##"<html><head><title>Running Man | 韓綜 | IDOLTV</title>
<meta property="og:image" content="https://idoltv.tv/upload/552.jpg">
<meta name="description" content="Running Man|劉在錫等人的遊戲綜藝。">
</head><body>
<h2 class="title margin_0">Running Man | E596.220327</h2>
<p class="nstem data ms_p margin_0">
<span class="star"><span class="star_tips">9.5</span></span>
<a href="/s/2010">2010</a> <a href="/s/kr">韓國</a> <a href="/s/fun">搞笑</a></p>
<p>主演：劉在錫 池錫辰 金鍾國</p>
<div class="panel play_content clearfix">
<p>劉在錫等人的遊戲綜藝。</p>
</div>
<ul><li class="tab-play conch-01" title="LINE1"><a href="#">LINE1</a></li></ul>
<script>var player = new Player({ video: { url: 'https://v.example.com/20220327/index.m3u8', type: 'hls' } });</script>
<div>當前資源由LINE1提供
<ul><li class="x"><a class="y" href="/play/552-1-59.html">E595.220320</a></li>
<li class="x"><a class="y" href="/play/552-1-60.html">E596.220327</a></li></ul>展開</div>
<div>當前資源由bilibili()提供
<ul><li class="x"><a class="y" href="/play/552-2-60.html">E596.220327</a></li></ul>展開</div>
<div>當前資源由okru提供
<ul><li class="x"><a class="y" href="/play/552-3-61.html">E596.220328</a></li></ul>展開</div>
<a href="/play/552-1-59.html">上集</a>
播放地址
</body></html>"##;

    const VOD: &str = r#"<html><head><title>第八感 | 韓國網劇 | IDOLTV</title>
<meta name="description" content="第八感|兩個大學生的故事。"></head><body>
<h2 class="title"><span itemprop="name">第八感</span></h2>
<ul><li id="year"><span>年份：</span><a href="/y">2023</a></li>
<li id="area"><span>地區：</span><a href="/a">韓國</a></li>
<li id="class"><span>類型：</span><a href="/c">韓國網劇</a></li>
<li id="actor">主演：임지섭 오준택</li>
<li id="director">導演：김정현</li></ul>
<span class="star_tips">8.2</span>
<div class="content_desc full_text clearfix" id="description"><span>兩個大學生的故事。</span></div>
當前資源由LINE1提供
<ul><li><a href="/play/5811-1-1.html">第01集</a></li>
<li><a href="/play/5811-1-2.html">第02集</a></li></ul>展開
當前資源由LINE2提供
<ul><li><a href="/play/5811-2-2.html">第02集</a></li>
<li><a href="/play/5811-2-3.html">第03集</a></li></ul>展開
</body></html>"#;

    struct FakeResolver;
    impl Resolver for FakeResolver {
        fn resolve(&self, _ctx: &Context<'_>, url: &str) -> Result<Option<Extraction>> {
            if url.contains("bilibili.com") {
                Ok(Some(Extraction::Playlist(PlaylistInfo {
                    entries: vec![format!("{}?p=1", url), format!("{}?p=2", url)],
                    ..Default::default()
                })))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn recognises_urls() {
        assert_eq!(
            IdoltvUrl::parse("https://idoltv.tv/play/552-2-60.html"),
            Some(IdoltvUrl::Play {
                id: "552".into(),
                source_id: "2".into(),
                episode_id: "60".into(),
            })
        );
        assert_eq!(IdoltvUrl::parse("idoltv:5811"), Some(IdoltvUrl::Vod("5811".into())));
        assert_eq!(
            IdoltvUrl::parse("https://idoltv.tv/vod/5811.html"),
            Some(IdoltvUrl::Vod("5811".into()))
        );
        assert_eq!(
            IdoltvUrl::parse("https://idoltv.tv/vodsearch.html?wd=19&submit="),
            Some(IdoltvUrl::SearchPage("19".into()))
        );
        assert_eq!(
            IdoltvUrl::parse("idoltvsearchall:2021"),
            Some(IdoltvUrl::Search {
                limit: usize::MAX,
                query: "2021".into()
            })
        );
        assert_eq!(IdoltvUrl::parse("https://idoltv.tv/about.html"), None);
    }

    #[test]
    fn players_by_source() {
        assert_eq!(
            classify_player("bilibili", "https://www.bilibili.com/video/BV1xx"),
            Player::Delegate("https://www.bilibili.com/video/BV1xx".into())
        );
        assert_eq!(
            classify_player("bilibili", "https://search.bilibili.com/all?keyword=x"),
            Player::Skip
        );
        assert_eq!(
            classify_player("okru", "3591410584187"),
            Player::Delegate("https://ok.ru/videoembed/3591410584187".into())
        );
        assert_eq!(
            classify_player("YouTube", "dQw4w9WgXcQ"),
            Player::Delegate("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into())
        );
        assert_eq!(classify_player("youtube", "short"), Player::Skip);
        assert_eq!(
            classify_player("LINE1", "https://v.example.com/index.m3u8"),
            Player::Hls("https://v.example.com/index.m3u8".into())
        );
        assert_eq!(
            classify_player("LINE1", "https://v8.tlkqc.com/index.m3u8"),
            Player::Skip
        );
    }

    #[test]
    fn delegated_players() {
        let agent = WebAgent::new(Settings::default());
        let ctx = Context::new(&agent, &FakeResolver);

        assert_eq!(
            player_result(&ctx, "bilibili", "E596", "https://www.bilibili.com/video/BV1xx"),
            Found::Entries(vec![
                "https://www.bilibili.com/video/BV1xx?p=1".into(),
                "https://www.bilibili.com/video/BV1xx?p=2".into(),
            ])
        );
        // Unknown sites come back as the URL itself.
        assert_eq!(
            player_result(&ctx, "okru", "E596", "123"),
            Found::Entries(vec!["https://ok.ru/videoembed/123".into()])
        );
        assert_eq!(
            player_result(&ctx, "bilibili", "E596", "https://search.bilibili.com/all"),
            Found::Nothing
        );
    }

    #[test]
    fn parses_play_page() {
        let page = parse_play_page("552-1-60", PLAY);
        assert_eq!(page.meta.title, "Running Man | E596.220327");
        assert_eq!(page.episode, "E596.220327");
        assert_eq!(page.meta.categories, vec!["韓綜"]);
        assert_eq!(page.meta.average_rating, Some(9.5));
        assert_eq!(page.meta.tags, vec!["2010", "韓國", "搞笑"]);
        assert_eq!(page.meta.release_year, Some(2010));
        assert_eq!(page.meta.cast, vec!["劉在錫", "池錫辰", "金鍾國"]);
        assert_eq!(page.meta.description.as_deref(), Some("劉在錫等人的遊戲綜藝。"));
        assert_eq!(page.meta.thumbnail.as_deref(), Some("https://idoltv.tv/upload/552.jpg"));
        assert_eq!(page.current_source, "LINE1");
        assert_eq!(page.player_urls, vec!["https://v.example.com/20220327/index.m3u8"]);
        assert!(page.is_series);

        let names: Vec<_> = page.groups.iter().map(|g| g.source_name.as_str()).collect();
        assert_eq!(names, vec!["LINE1", "bilibili", "okru"]);
        assert_eq!(page.groups[0].entries[1].label, "E596.220327");
    }

    #[test]
    fn finds_the_episode_on_other_mirrors() {
        let page = parse_play_page("552-1-60", PLAY);
        let links: Vec<_> = reconcile(&page.groups, &page.episode, &page.current_source)
            .into_iter()
            .map(|m| m.link)
            .collect();
        // okru lists it a day later.
        assert_eq!(links, vec!["/play/552-2-60.html", "/play/552-3-61.html"]);
    }

    #[test]
    fn parses_vod_page() {
        let meta = parse_vod_meta("5811", VOD);
        assert_eq!(meta.title, "第八感");
        assert_eq!(meta.release_year, Some(2023));
        assert_eq!(meta.location.as_deref(), Some("韓國"));
        assert_eq!(meta.categories, vec!["韓國網劇"]);
        assert_eq!(meta.cast, vec!["임지섭", "오준택"]);
        assert_eq!(meta.average_rating, Some(8.2));
        assert_eq!(
            meta.description.as_deref(),
            Some("導演：김정현 \n主演：임지섭 오준택 \n兩個大學生的故事。")
        );
    }

    #[test]
    fn vod_playlist_lists_each_episode_once() {
        let groups = parse_source_groups(VOD);
        let entries: Vec<_> = dedupe_playlist(&groups, |entry| link_key(&LINK_KEY_RE, &entry.link))
            .into_iter()
            .map(|entry| absolute_url(BASE, &entry.link))
            .collect();
        assert_eq!(
            entries,
            vec![
                "https://idoltv.tv/play/5811-1-1.html",
                "https://idoltv.tv/play/5811-1-2.html",
                "https://idoltv.tv/play/5811-2-3.html",
            ]
        );
    }

    #[test]
    fn search_pages() {
        let webpage = r#"<script>$('.mac_total').html('12');</script>
<div class="searchlist_titbox"><h4 class="vodlist_title"><a href="/vod/5811.html" title="第八感">第八感</a></h4>查看詳情</div>
<div class="searchlist_titbox"><h4 class="vodlist_title"><a href="/vod/552.html" title="Running Man">Running Man</a></h4>查看詳情</div>"#;
        let (total, results) = parse_search_page(webpage);
        assert_eq!(total, Some(12));
        assert_eq!(
            results,
            vec!["https://idoltv.tv/vod/5811.html", "https://idoltv.tv/vod/552.html"]
        );

        let (total, results) = parse_search_page("<script>$('.mac_total').html('0');</script>");
        assert_eq!(total, Some(0));
        assert!(results.is_empty());
    }
}
