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
// - site handlers -

pub mod generic_videofile;
pub mod gimy;
pub mod idoltv;

use crate::formats::Format;

use once_cell::sync::Lazy;
use regex::Regex;

static SEARCH_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<key>[a-z]+search)(?P<limit>all|[0-9]+)?:(?P<query>.+)$").unwrap());

/// Parses "<key>:query", "<key>N:query" and "<key>all:query" into the
/// number of wanted results and the query.
pub(crate) fn parse_search_key(url: &str, key: &str) -> Option<(usize, String)> {
    let caps = SEARCH_KEY_RE.captures(url)?;
    if &caps["key"] != key {
        return None;
    }
    let limit = match caps.name("limit").map(|m| m.as_str()) {
        None => 1,
        Some("all") => usize::MAX,
        Some(n) => n.parse().ok()?,
    };
    Some((limit, caps["query"].trim().to_string()))
}

/// Decodes a "wd=" search parameter.
pub(crate) fn decode_query(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    let decoded = urlencoding::decode(&raw).map(|q| q.into_owned());
    decoded.unwrap_or(raw)
}

/// Appends the formats that are not there yet.
pub(crate) fn merge_formats(formats: &mut Vec<Format>, more: Vec<Format>) {
    for format in more {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
}

/// Concatenates all capture groups of <re> in <link> into one number, e.g.
/// "/play/552-2-60.html" with `-(\d+)-(\d+)\.html` gives 260.
pub(crate) fn link_key(re: &Regex, link: &str) -> Option<f64> {
    let caps = re.captures(link)?;
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect::<String>()
        .parse()
        .ok()
}
