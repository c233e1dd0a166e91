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
// - reconcile.rs file -

//! Matching episodes across mirrors.
//!
//! A page lists its episodes once per mirror ("source group"), and every
//! mirror labels them in its own way. Entries are matched token by token
//! (see `episode.rs`); an air date is allowed to be off by one day. When a
//! match is ambiguous, nothing is matched.

use crate::episode::{parse_episode, EpisodeToken, TokenKind};

use std::cmp::Ordering;
use tracing::debug;

/// One mirror's claim to host an episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirrorEntry {
    pub link: String,
    pub label: String,
    pub source_name: String,
}

impl MirrorEntry {
    pub fn new(
        link: impl Into<String>,
        label: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        MirrorEntry {
            link: link.into(),
            label: label.into(),
            source_name: source_name.into(),
        }
    }
}

/// All episodes listed under one mirror tab of a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceGroup {
    pub source_name: String,
    pub entries: Vec<MirrorEntry>,
}

impl SourceGroup {
    pub fn new(source_name: impl Into<String>) -> Self {
        SourceGroup {
            source_name: source_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, link: impl Into<String>, label: impl Into<String>) {
        let entry = MirrorEntry::new(link, label, self.source_name.clone());
        self.entries.push(entry);
    }
}

struct ParsedEntry {
    entry: MirrorEntry,
    tokens: Vec<EpisodeToken>,
}

fn parse_group(group: &SourceGroup) -> Vec<ParsedEntry> {
    group
        .entries
        .iter()
        .map(|entry| ParsedEntry {
            tokens: parse_episode(&entry.label),
            entry: entry.clone(),
        })
        .collect()
}

// true, if <candidate> carries a date of the same part exactly one day
// away from <token>. Only the first such date of the candidate counts.
fn is_one_day_apart(token: &EpisodeToken, candidate: &[EpisodeToken]) -> bool {
    let Some(date) = token.date() else {
        return false;
    };

    candidate
        .iter()
        .find(|t| t.kind() == TokenKind::Date && t.part == token.part)
        .and_then(EpisodeToken::date)
        .map(|other| (date - other).num_days().abs() == 1)
        .unwrap_or(false)
}

// Picks the single candidate matching <token>: the only exact match, or,
// without exact matches, the only date that is one day off.
fn match_token(token: &EpisodeToken, candidates: &[ParsedEntry]) -> Option<usize> {
    let mut exact = Vec::new();
    let mut near = Vec::new();

    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.tokens.contains(token) {
            exact.push(idx);
        }
        if is_one_day_apart(token, &candidate.tokens) {
            near.push(idx);
        }
    }

    match (exact.as_slice(), near.as_slice()) {
        ([only], _) => Some(*only),
        ([], [only]) => Some(*only),
        _ => None,
    }
}

/// Finds the entries of every other mirror that carry the same episode as
/// <reference_label> (as listed by <reference_source>).
///
/// Each token of the reference label may contribute at most one entry per
/// group; an entry is returned once even if several tokens point at it.
pub fn reconcile(
    groups: &[SourceGroup],
    reference_label: &str,
    reference_source: &str,
) -> Vec<MirrorEntry> {
    let reference = parse_episode(reference_label);
    let mut found: Vec<MirrorEntry> = Vec::new();

    for group in groups.iter().filter(|g| g.source_name != reference_source) {
        let parsed = parse_group(group);
        for token in &reference {
            let Some(idx) = match_token(token, &parsed) else {
                continue;
            };

            let entry = &parsed[idx].entry;
            if !found.contains(entry) {
                debug!(
                    "\"{}\" on {} matches \"{}\" via {:?}",
                    entry.label, group.source_name, reference_label, token.value
                );
                found.push(entry.clone());
            }
        }
    }

    found
}

/// Flattens the groups of a show page into one playlist with each episode
/// listed once.
///
/// Groups are walked in order. Each remaining entry is added and its
/// counterpart in every later group (as `reconcile` would pick it) is
/// dropped. The playlist is ordered by the first date or episode number
/// of the label; labels without one are ordered by <fallback_key>, and
/// go last if that has nothing to offer either.
pub fn dedupe_playlist<F>(groups: &[SourceGroup], fallback_key: F) -> Vec<MirrorEntry>
where
    F: Fn(&MirrorEntry) -> Option<f64>,
{
    let mut remaining: Vec<Vec<ParsedEntry>> = groups.iter().map(parse_group).collect();
    let mut playlist: Vec<(MirrorEntry, f64)> = Vec::new();

    for i in 0..remaining.len() {
        let (head, later) = remaining.split_at_mut(i + 1);

        for current in &head[i] {
            let key = current
                .tokens
                .first()
                .and_then(EpisodeToken::sort_key)
                .or_else(|| fallback_key(&current.entry))
                .unwrap_or(f64::MAX);

            if !playlist.iter().any(|(e, _)| e.link == current.entry.link) {
                playlist.push((current.entry.clone(), key));
            }

            for other in later.iter_mut() {
                for token in &current.tokens {
                    if let Some(idx) = match_token(token, other) {
                        let dropped = other.remove(idx);
                        debug!(
                            "dropping duplicate \"{}\" ({}) of \"{}\"",
                            dropped.entry.label, dropped.entry.source_name, current.entry.label
                        );
                    }
                }
            }
        }
    }

    playlist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    playlist.into_iter().map(|(entry, _)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(source: &str, labels: &[&str]) -> SourceGroup {
        let mut g = SourceGroup::new(source);
        for (n, label) in labels.iter().enumerate() {
            g.push(format!("/{}/{}", source, n), *label);
        }
        g
    }

    fn labels(entries: &[MirrorEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn single_exact_match() {
        let groups = vec![group("A", &["第3集", "第4集"]), group("B", &["EP3", "EP4"])];
        let found = reconcile(&groups, "第4集", "A");
        assert_eq!(found, vec![MirrorEntry::new("/B/1", "EP4", "B")]);
    }

    #[test]
    fn ambiguous_exact_match_is_dropped() {
        let groups = vec![group("A", &["第4集"]), group("B", &["EP4", "Ep04 HD"])];
        assert!(reconcile(&groups, "第4集", "A").is_empty());
    }

    #[test]
    fn reference_source_is_skipped() {
        let groups = vec![group("A", &["第4集"]), group("B", &["第5集"])];
        assert!(reconcile(&groups, "第4集", "A").is_empty());
    }

    #[test]
    fn every_other_group_contributes() {
        let groups = vec![
            group("A", &["第4集"]),
            group("B", &["EP4"]),
            group("C", &["04"]),
        ];
        let found = reconcile(&groups, "第4集", "A");
        assert_eq!(labels(&found), vec!["EP4", "04"]);
        assert_eq!(found[1].source_name, "C");
    }

    #[test]
    fn one_day_off_is_tolerated() {
        let groups = vec![group("B", &["20230710"])];
        assert_eq!(labels(&reconcile(&groups, "20230709", "A")), vec!["20230710"]);

        let groups = vec![group("B", &["20230630"])];
        assert_eq!(labels(&reconcile(&groups, "20230701", "A")), vec!["20230630"]);
    }

    #[test]
    fn full_width_labels_match_ascii_ones() {
        let groups = vec![group("A", &["第３集", "第４集"]), group("B", &["EP3", "EP4"])];
        assert_eq!(labels(&reconcile(&groups, "第４集", "A")), vec!["EP4"]);

        let groups = vec![group("B", &["２０２３０７１０"])];
        assert_eq!(labels(&reconcile(&groups, "20230709", "A")), vec!["２０２３０７１０"]);
    }

    #[test]
    fn two_days_off_is_not() {
        let groups = vec![group("B", &["20230711"])];
        assert!(reconcile(&groups, "20230709", "A").is_empty());
    }

    #[test]
    fn exact_date_beats_near_date() {
        let groups = vec![group("B", &["20230708", "20230709", "20230710"])];
        assert_eq!(labels(&reconcile(&groups, "20230709", "A")), vec!["20230709"]);
    }

    #[test]
    fn two_near_dates_are_ambiguous() {
        let groups = vec![group("B", &["20230708", "20230710"])];
        assert!(reconcile(&groups, "20230709", "A").is_empty());
    }

    #[test]
    fn near_dates_must_share_the_part() {
        let groups = vec![group("B", &["20230710-2"])];
        assert!(reconcile(&groups, "20230709", "A").is_empty());
    }

    #[test]
    fn resolution_never_date_matches() {
        let groups = vec![group("B", &["20230710"])];
        assert!(reconcile(&groups, "1080P", "A").is_empty());
        assert!(reconcile(&groups, "HD", "A").is_empty());
    }

    #[test]
    fn entry_found_by_two_tokens_is_returned_once() {
        let groups = vec![group("B", &["E285.250621"])];
        let found = reconcile(&groups, "E285.250621", "A");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn playlist_lists_each_episode_once() {
        let groups = vec![
            group("A", &["第2集", "第1集"]),
            group("B", &["EP1", "EP2", "EP3"]),
            group("C", &["03", "04"]),
        ];
        let playlist = dedupe_playlist(&groups, |_| None);
        assert_eq!(
            playlist.iter().map(|e| e.link.as_str()).collect::<Vec<_>>(),
            vec!["/A/1", "/A/0", "/B/2", "/C/1"]
        );
    }

    #[test]
    fn playlist_uses_fallback_key() {
        let mut a = SourceGroup::new("A");
        a.push("/play/9-1-2.html", "正片");
        a.push("/play/9-1-1.html", "預告");
        let playlist = dedupe_playlist(&[a], |e| {
            e.link
                .trim_start_matches("/play/9-1-")
                .trim_end_matches(".html")
                .parse()
                .ok()
        });
        assert_eq!(labels(&playlist), vec!["預告", "正片"]);
    }

    #[test]
    fn playlist_without_any_key_keeps_page_order() {
        let groups = vec![group("A", &["花絮", "特別篇"])];
        let playlist = dedupe_playlist(&groups, |_| None);
        assert_eq!(labels(&playlist), vec!["花絮", "特別篇"]);
    }
}
