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
// - page.rs file -

// Small helpers to dig values out of a fetched page.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Text content of an HTML fragment, entities decoded, whitespace collapsed.
pub fn clean_html(fragment: &str) -> String {
    let fragment = fragment.replace("<br>", "\n").replace("<br/>", "\n");
    let text = Html::parse_fragment(&fragment)
        .root_element()
        .text()
        .collect::<String>();
    WHITESPACE_RE.replace_all(text.trim(), " ").to_string()
}

/// First capture group of <re> in <text>, run through `clean_html`.
/// Empty results count as nothing found.
pub fn html_search(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_html(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// First capture group of <re> in <text>, verbatim.
pub fn search(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The content of the first `<meta>` whose name or property is one of <names>.
pub fn search_meta(doc: &Html, names: &[&str]) -> Option<String> {
    for name in names {
        for attr in ["name", "property", "itemprop"] {
            let Ok(selector) = Selector::parse(&format!(r#"meta[{}="{}"]"#, attr, name)) else {
                continue;
            };
            let content = doc
                .select(&selector)
                .filter_map(|elem| elem.value().attr("content"))
                .map(str::trim)
                .find(|c| !c.is_empty());
            if let Some(content) = content {
                return Some(content.to_string());
            }
        }
    }
    None
}

/// The text of the `<title>` element.
pub fn extract_title(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    doc.select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// true, if <url> is an absolute http(s) URL.
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Resolves <link> against <base>. Links that don't resolve are returned as is.
pub fn absolute_url(base: &str, link: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(link))
        .map(String::from)
        .unwrap_or_else(|_| link.to_string())
}
