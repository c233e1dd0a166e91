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
// - gimy handler -

// gimy comes in two flavours, gimy.cc and gimy.la, with different markup
// but the same catalogue. Both list every episode once per mirror.

use crate::definitions::{Context, Extraction, Metadata, PlaylistInfo, SiteDefinition, VideoInfo};
use crate::error::ExtractError;
use crate::formats::{player_formats, MirrorStyle};
use crate::handlers::{decode_query, link_key, merge_formats, parse_search_key};
use crate::page::{self, absolute_url, html_search, is_http_url, search_meta};
use crate::reconcile::{dedupe_playlist, reconcile, SourceGroup};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

const SEARCH_KEY: &str = "gimysearch";

// Page markers for "no such video".
const CC_MISSING: &str = "aks-404-page";
const LA_MISSING: &str = "親愛的：获取数据失败";

// Dead or broken CDNs, not worth a request.
const SKIP_HOSTS: [&str; 6] = [
    "jmcdn.efangcdn.com",
    "m3u8.hmrvideo.com",
    "hn.bfvvs.com",
    ".youkuplaya.com",
    "v6.pptvlist.com",
    ".fsvod1.com",
];

static PLAY_CC_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:gimy:|https?://gimy\.cc/(?:index\.php/)?video/)(?P<id>\d+)-(?P<source_id>\d+)-(?P<episode_id>\d+)").unwrap()
});
static PLAY_LA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:gimy:|https?://gimy\.la/play/)(?P<id>\d+)/?ep(?P<episode_id>\d+)\??sid=?(?P<source_id>\d+)").unwrap()
});
static DETAIL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:gimy:|https?://gimy\.(?:la|cc)/(?:index\.php/)?detail/)(?P<id>\d+)(?:/|\.html)?$").unwrap()
});
static SEARCH_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://gimy\.(?:la|cc)/search(?:/|\.html)\?wd=(?P<query>[^&]+)").unwrap()
});

// gimy.cc play pages
static CC_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"h1 class="title"><a[^>]+>(.+)</h1>"#).unwrap());
static CC_EPISODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"h1 class="title"><.*</a> - (.*)</h1>"#).unwrap());
static CC_INTRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="col-pd">\s*([\s\S]+)\s*</p>[\s\S]+劇情簡介"#).unwrap());
static CC_CATEGORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"類型：</span><[^>]+>(.+)</a>").unwrap());
static CC_LOCATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"地區：</span><[^>]+>(.+)</a>").unwrap());
static CC_SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ctive" id="tabslist"><a[^>]+>(.+)</a></li>"#).unwrap());
static CC_PLAYER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"video:\s*\{\s*url:\s*'(.+)',\s*type:").unwrap());
static CC_SERIES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"fault" href="[^"].+[上下]一集"#).unwrap());
static CC_LINK_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d+)-(\d+)\.html").unwrap());

// gimy.la play pages
static LA_EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"hide cor4".*>\s+<span>(.*)</span>\s+<em class="play-on"#).unwrap()
});
static LA_INTRO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"card-text">([\s\S]+?)演員"#).unwrap());
static LA_CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"history-set" data-name="(?:\[([^\]]+)\])?[^"]*" data-mid="#).unwrap()
});
static LA_LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"filter/area/[^"]+" title="([^"]+)">"#).unwrap());
static LA_CAST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"h/actor/[^>]+>([^<]+)</a").unwrap());
static LA_SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"wiper-slide on nav-dt.*/i>\s+(.*?)<(?:span|/a)").unwrap());
static LA_SOURCE_NAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"wiper-slide.*/i>\s*(.+?)<(?:span|/a)").unwrap());
static LA_LISTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"y-list-play size"[\s\S]+?</ul>"#).unwrap());
static LA_LINKS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="([^"]+)">\s*(?:<span>)?([\s\S]+?)(?:</span>\s*)?</a"#).unwrap()
});
static LA_PLAYER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Artplayer[\s\S]+?url:\s'(.+)',\s*type:").unwrap());
static LA_LINK_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ep(\d+)\?sid=(\d+)").unwrap());

// detail pages (both layouts)
static DETAIL_TITLE_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"1 class="slide-info-title hide">(.+)</h1>"#).unwrap(),
        Regex::new(r#"1 class="title">(.+)<!--<span class="score"#).unwrap(),
    ]
});
static DETAIL_INTRO_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"_limit" class="text cor3">([\s\S]+?)</div>"#).unwrap(),
        Regex::new(r#"class="col-pd">\s*([\s\S]+)\s*</p>[\s\S]+劇情簡介"#).unwrap(),
    ]
});
static DETAIL_CATEGORY_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"f="/type/.*_blank">(.+)</a>"#).unwrap(),
        Regex::new(r"分類：</span><[^>]+>(.+)</a>").unwrap(),
    ]
});
static DETAIL_LOCATION_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"f="/search/area/.*_blank">(.+)</a>"#).unwrap(),
        Regex::new(r"地區：</span><[^>]+>(.+)</a>").unwrap(),
    ]
});
static DETAIL_YEAR_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"f="/search/year/.*_blank">(.+)</a>"#).unwrap(),
        Regex::new(r"年份：</span><[^>]+>(\d+)</a>").unwrap(),
    ]
});

static SEARCH_RESULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"h3 class="title"><a href="([^"]+)">.*</a></h3>"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Cc,
    La,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GimyUrl {
    Play {
        layout: Layout,
        id: String,
        source_id: String,
        episode_id: String,
    },
    Detail(String),
    Search { limit: usize, query: String },
    SearchPage(String),
}

impl GimyUrl {
    fn parse(url: &str) -> Option<GimyUrl> {
        if let Some((limit, query)) = parse_search_key(url, SEARCH_KEY) {
            return Some(GimyUrl::Search { limit, query });
        }
        if let Some(caps) = SEARCH_URL_RE.captures(url) {
            return Some(GimyUrl::SearchPage(decode_query(&caps["query"])));
        }

        for (layout, re) in [(Layout::Cc, &PLAY_CC_URL_RE), (Layout::La, &PLAY_LA_URL_RE)] {
            if let Some(caps) = re.captures(url) {
                return Some(GimyUrl::Play {
                    layout,
                    id: caps["id"].to_string(),
                    source_id: caps["source_id"].to_string(),
                    episode_id: caps["episode_id"].to_string(),
                });
            }
        }

        DETAIL_URL_RE
            .captures(url)
            .map(|caps| GimyUrl::Detail(caps["id"].to_string()))
    }
}

/// Everything a play page tells about the episode it plays.
#[derive(Debug, Clone, Default, PartialEq)]
struct PlayPage {
    title: Option<String>,
    episode: String,
    description: Option<String>,
    categories: Vec<String>,
    location: Option<String>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    cast: Vec<String>,
    current_source: String,
    player_url: Option<String>,
    groups: Vec<SourceGroup>,
    is_series: bool,
}

impl Layout {
    fn base(self) -> &'static str {
        match self {
            Layout::Cc => "https://gimy.cc/",
            Layout::La => "https://gimy.la/",
        }
    }

    fn is_missing(self, webpage: &str) -> bool {
        match self {
            Layout::Cc => webpage.contains(CC_MISSING),
            Layout::La => webpage.contains(LA_MISSING),
        }
    }

    fn video_id(self, id: &str, source_id: &str, episode_id: &str) -> String {
        match self {
            Layout::Cc => format!("{}-{}-{}", id, source_id, episode_id),
            Layout::La => format!("{}ep{}sid{}", id, episode_id, source_id),
        }
    }

    fn play_url(self, id: &str, source_id: &str, episode_id: &str) -> String {
        match self {
            Layout::Cc => format!(
                "https://gimy.cc/index.php/video/{}.html",
                self.video_id(id, source_id, episode_id)
            ),
            Layout::La => format!("https://gimy.la/play/{}/ep{}?sid={}", id, episode_id, source_id),
        }
    }

    fn link_key_re(self) -> &'static Regex {
        match self {
            Layout::Cc => &CC_LINK_KEY_RE,
            Layout::La => &LA_LINK_KEY_RE,
        }
    }

    fn player_url(self, webpage: &str) -> Option<String> {
        let re = match self {
            Layout::Cc => &CC_PLAYER_RE,
            Layout::La => &LA_PLAYER_RE,
        };
        page::search(re, webpage).filter(|u| is_http_url(u))
    }

    fn source_groups(self, webpage: &str) -> Vec<SourceGroup> {
        match self {
            Layout::Cc => cc_source_groups(webpage),
            Layout::La => la_source_groups(webpage),
        }
    }

    fn parse_play_page(self, webpage: &str, episode_id: &str) -> PlayPage {
        let doc = Html::parse_document(webpage);
        let desc_meta = search_meta(&doc, &["description", "og:description", "twitter:description"]);
        let page_title = page::extract_title(&doc);

        let mut page = PlayPage {
            upload_date: search_meta(&doc, &["og:video:date"]).map(|d| d.replace('-', "")),
            thumbnail: search_meta(&doc, &["image", "og:image", "twitter:image"]),
            player_url: self.player_url(webpage),
            groups: self.source_groups(webpage),
            ..Default::default()
        };

        match self {
            Layout::Cc => {
                page.title = html_search(&CC_TITLE_RE, webpage)
                    .or_else(|| page_title.map(|t| first_part(&t, " - ")));
                page.episode = html_search(&CC_EPISODE_RE, webpage).unwrap_or_default();
                page.description =
                    merge_description(desc_meta, html_search(&CC_INTRO_RE, webpage));
                page.categories = html_search(&CC_CATEGORY_RE, webpage).into_iter().collect();
                page.location = html_search(&CC_LOCATION_RE, webpage);
                page.current_source =
                    html_search(&CC_SOURCE_RE, webpage).unwrap_or_else(|| "0".to_string());
                page.is_series = CC_SERIES_RE.is_match(webpage);
            }
            Layout::La => {
                page.title = page_title.map(|t| first_part(&t, " 線上看"));
                page.episode = html_search(&LA_EPISODE_RE, webpage).unwrap_or_default();
                page.description = merge_description(
                    desc_meta,
                    html_search(&LA_INTRO_RE, webpage).map(|i| i.replace("暫無簡介", "")),
                );
                page.categories = html_search(&LA_CATEGORY_RE, webpage).into_iter().collect();
                page.location = html_search(&LA_LOCATION_RE, webpage);
                page.cast = LA_CAST_RE
                    .captures_iter(webpage)
                    .map(|caps| page::clean_html(&caps[1]))
                    .collect();
                page.current_source =
                    html_search(&LA_SOURCE_RE, webpage).unwrap_or_else(|| "0".to_string());
                page.is_series = webpage.contains("</i>下集</a>")
                    || episode_id.parse::<u32>().map(|n| n > 1).unwrap_or(false);
            }
        }

        page
    }
}

fn first_part(text: &str, separator: &str) -> String {
    text.split(separator).next().unwrap_or(text).trim().to_string()
}

// The meta description is cut short; the page has the full introduction.
// Splice it in where the short version starts to repeat it.
fn merge_description(meta: Option<String>, intro: Option<String>) -> Option<String> {
    let Some(intro) = intro.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()) else {
        return meta;
    };

    let chars: Vec<char> = intro.chars().collect();
    let comma = chars.iter().position(|c| *c == '，' || *c == ',').unwrap_or(0);
    let head: String = chars[..comma.max(4).min(chars.len())].iter().collect();

    match meta {
        Some(meta) => match meta.find(&head) {
            Some(at) => Some(format!("{}{}", &meta[..at], intro)),
            None => Some(intro),
        },
        None => Some(intro),
    }
}

fn cc_source_groups(webpage: &str) -> Vec<SourceGroup> {
    let doc = Html::parse_document(webpage);
    let (Ok(tab_selector), Ok(link_selector), Ok(span_selector)) = (
        Selector::parse(r#"[id="tabslist"] > a[data-toggle="tab"]"#),
        Selector::parse("li a"),
        Selector::parse("span"),
    ) else {
        return Vec::new();
    };

    let mut groups = Vec::new();
    for tab in doc.select(&tab_selector) {
        let Some(list_id) = tab.value().attr("href").and_then(|h| h.strip_prefix('#')) else {
            continue;
        };
        let Ok(list_selector) = Selector::parse(&format!(r#"[id="{}"]"#, list_id)) else {
            continue;
        };

        let mut group = SourceGroup::new(tab.text().collect::<String>().trim());
        for list in doc.select(&list_selector) {
            for link in list.select(&link_selector) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let label = link
                    .select(&span_selector)
                    .next()
                    .map(|span| span.text().collect::<String>())
                    .unwrap_or_else(|| link.text().collect());
                group.push(href, label.trim());
            }
        }
        groups.push(group);
    }
    groups
}

fn la_source_groups(webpage: &str) -> Vec<SourceGroup> {
    let names = LA_SOURCE_NAMES_RE
        .captures_iter(webpage)
        .map(|caps| page::clean_html(&caps[1]));
    let lists = LA_LISTS_RE.find_iter(webpage);

    names
        .zip(lists)
        .map(|(name, list)| {
            let mut group = SourceGroup::new(name);
            for caps in LA_LINKS_RE.captures_iter(list.as_str()) {
                group.push(&caps[1], page::clean_html(&caps[2]));
            }
            group
        })
        .collect()
}

fn playlist_entries(layout: Layout, webpage: &str) -> Vec<String> {
    let groups = layout.source_groups(webpage);
    dedupe_playlist(&groups, |entry| link_key(layout.link_key_re(), &entry.link))
        .into_iter()
        .map(|entry| absolute_url(layout.base(), &entry.link))
        .collect()
}

fn first_match(res: &[Regex], webpage: &str) -> Option<String> {
    res.iter().find_map(|re| html_search(re, webpage))
}

fn parse_detail_meta(id: &str, webpage: &str) -> Metadata {
    let doc = Html::parse_document(webpage);
    let title = first_match(&*DETAIL_TITLE_RES, webpage)
        .or_else(|| page::extract_title(&doc).map(|t| first_part(&t, " - ")))
        .unwrap_or_else(|| id.to_string());
    let intro = first_match(&*DETAIL_INTRO_RES, webpage).map(|i| i.replace("暫無簡介", ""));

    Metadata {
        id: id.to_string(),
        title,
        description: merge_description(
            search_meta(&doc, &["description", "og:description", "twitter:description"]),
            intro,
        ),
        thumbnail: search_meta(&doc, &["image", "og:image", "twitter:image"]),
        release_year: first_match(&*DETAIL_YEAR_RES, webpage).and_then(|y| y.parse().ok()),
        categories: first_match(&*DETAIL_CATEGORY_RES, webpage).into_iter().collect(),
        location: first_match(&*DETAIL_LOCATION_RES, webpage),
        ..Default::default()
    }
}

fn search_results(webpage: &str) -> Vec<String> {
    SEARCH_RESULT_RE
        .captures_iter(webpage)
        .map(|caps| absolute_url(Layout::Cc.base(), &caps[1]))
        .collect()
}

fn note(label: &str, source: &str) -> String {
    format!("{} ({})", label, source)
}

// Implement the site definition:
struct GimyHandler;

impl GimyHandler {
    fn extract_play(
        &self,
        ctx: &Context<'_>,
        layout: Layout,
        id: &str,
        source_id: &str,
        episode_id: &str,
    ) -> Result<Extraction> {
        let video_id = layout.video_id(id, source_id, episode_id);
        let url = layout.play_url(id, source_id, episode_id);
        let webpage = ctx.agent.download_webpage(&url)?;
        if layout.is_missing(&webpage) {
            return Err(ExtractError::NotFound(url).into());
        }

        let page = layout.parse_play_page(&webpage, episode_id);
        let mut formats = Vec::new();

        // The mirror of this very page:
        if let Some(player) = &page.player_url {
            let found = player_formats(
                ctx.agent,
                player,
                &note(&page.episode, &page.current_source),
                &SKIP_HOSTS,
                MirrorStyle::Ranked,
            );
            merge_formats(&mut formats, found);
        }

        // ... and the same episode on all other mirrors.
        let mirrors = if page.episode.is_empty() {
            Vec::new()
        } else {
            reconcile(&page.groups, &page.episode, &page.current_source)
        };
        for mirror in mirrors {
            let mirror_url = absolute_url(layout.base(), &mirror.link);
            info!("Extracting URL: {}", mirror_url);

            let mirror_page = match ctx.agent.download_webpage(&mirror_url) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping mirror {}: {}", mirror.source_name, e);
                    continue;
                }
            };
            if let Some(player) = layout.player_url(&mirror_page) {
                let found = player_formats(
                    ctx.agent,
                    &player,
                    &note(&mirror.label, &mirror.source_name),
                    &SKIP_HOSTS,
                    MirrorStyle::Ranked,
                );
                merge_formats(&mut formats, found);
            }
        }

        if formats.is_empty() {
            return Err(ExtractError::NoFormats(video_id).into());
        }

        Ok(Extraction::Video(VideoInfo {
            episode: page.is_series.then(|| page.episode.clone()),
            meta: Metadata {
                title: page.title.unwrap_or_else(|| video_id.clone()),
                id: video_id,
                description: page.description,
                thumbnail: page.thumbnail,
                upload_date: page.upload_date,
                categories: page.categories,
                cast: page.cast,
                location: page.location,
                ..Default::default()
            },
            formats,
        }))
    }

    fn extract_detail(&self, ctx: &Context<'_>, id: &str) -> Result<Extraction> {
        // gimy.la first, gimy.cc as the fallback.
        let la_url = format!("https://gimy.la/detail/{}/", id);
        let (layout, webpage) = match ctx.agent.download_webpage(&la_url) {
            Ok(webpage) if !Layout::La.is_missing(&webpage) => (Layout::La, webpage),
            _ => {
                debug!("{} is not on gimy.la, trying gimy.cc", id);
                let cc_url = format!("https://gimy.cc/detail/{}/", id);
                let webpage = ctx.agent.download_webpage(&cc_url)?;
                if Layout::Cc.is_missing(&webpage) {
                    return Err(ExtractError::NotFound(cc_url).into());
                }
                (Layout::Cc, webpage)
            }
        };

        Ok(Extraction::Playlist(PlaylistInfo {
            meta: parse_detail_meta(id, &webpage),
            entries: playlist_entries(layout, &webpage),
        }))
    }

    fn search(&self, ctx: &Context<'_>, query: &str, limit: usize) -> Result<Extraction> {
        let mut entries = Vec::new();
        let encoded = urlencoding::encode(query);

        'pages: for page_number in 1.. {
            if entries.len() >= limit {
                break;
            }
            let url = format!("https://gimy.cc/search/page/{}/wd/{}.html", page_number, encoded);
            debug!("Downloading result page {}", page_number);

            let webpage = ctx.agent.download_webpage(&url)?;
            if webpage.contains(CC_MISSING) {
                return Err(ExtractError::NotFound(url).into());
            }

            let results = search_results(&webpage);
            if results.is_empty() {
                break;
            }
            for result in results {
                entries.push(result);
                if entries.len() >= limit {
                    break 'pages;
                }
            }

            if !webpage.contains(&format!("href=\"/search/page/{}/wd/", page_number + 1)) {
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

impl SiteDefinition for GimyHandler {
    fn can_handle_url(&self, url: &str) -> bool {
        GimyUrl::parse(url).is_some()
    }

    fn display_name(&self) -> String {
        "gimy".to_string()
    }

    fn extract(&self, ctx: &Context<'_>, url: &str) -> Result<Extraction> {
        match GimyUrl::parse(url) {
            Some(GimyUrl::Play {
                layout,
                id,
                source_id,
                episode_id,
            }) => self.extract_play(ctx, layout, &id, &source_id, &episode_id),
            Some(GimyUrl::Detail(id)) => self.extract_detail(ctx, &id),
            Some(GimyUrl::Search { limit, query }) => self.search(ctx, &query, limit),
            Some(GimyUrl::SearchPage(query)) => {
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
    &GimyHandler as &dyn SiteDefinition
}
