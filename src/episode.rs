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
// - episode.rs file -

//! Episode label tokenizer.
//!
//! Mirror sites label the same episode in wildly different ways
//! ("第4集", "EP04", "E285.250621", "20230813", "12上", ...). A label is
//! broken into typed tokens so that two labels can be compared token by
//! token, see `reconcile.rs`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing part suffix ("-2", "_02集", "-1）").
static PART_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]0?(\d+)[集）]?$").unwrap());

/// Any run of six or more digits is taken as a (yy)yymmdd air date.
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{6,}").unwrap());

/// Explicit episode markers.
static EPISODE_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(第\d+集)|(ep?\s*\d+)|(episode\s*\d+)|（\d+）").unwrap()
});
static EPISODE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:第|ep?\s*|episode\s*|（)+0?(\d+)[集）]?").unwrap()
});

/// A lone 1-4 digit number, e.g. "04" or "第4".
static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\D*\d{1,4}\D*$").unwrap());
static BARE_NUMBER_VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"0?(\d{1,4})").unwrap());

/// "12-3" or "12+3": episode 12, sub-part 3.
static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\D?\d{1,4}[-+]\d{1,4}").unwrap());
static RANGE_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0?(\d{1,4})[-+]0?(\d{1,4})").unwrap());

static RESOLUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(SD|HD|FHD|\d{3,4}P|標清|超清|高清|正片|中字|TC)").unwrap()
});

/// The kind of a token. The declaration order is the canonical sort order
/// of a parsed label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    Date,
    Number,
    Resolution,
    Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Air date as `yymmdd`.
    Date(String),
    /// Episode number; split episodes use a fractional sub-part (12.0003).
    Number(f64),
    /// Quality descriptor such as "1080P" or "HD". Carries no value.
    Resolution,
    /// Anything else, kept verbatim.
    Literal(String),
}

/// Which part of a split episode a label refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Part {
    #[default]
    Whole,
    Numbered(u32),
    Preview,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeToken {
    pub value: TokenValue,
    pub part: Part,
}

impl EpisodeToken {
    pub fn kind(&self) -> TokenKind {
        match self.value {
            TokenValue::Date(_) => TokenKind::Date,
            TokenValue::Number(_) => TokenKind::Number,
            TokenValue::Resolution => TokenKind::Resolution,
            TokenValue::Literal(_) => TokenKind::Literal,
        }
    }

    /// The calendar date of a date token. `None` for other kinds and for
    /// six-digit runs that are not a valid date.
    pub fn date(&self) -> Option<NaiveDate> {
        match &self.value {
            TokenValue::Date(yymmdd) => NaiveDate::parse_from_str(yymmdd, "%y%m%d").ok(),
            _ => None,
        }
    }

    /// Numeric ordering key used when building playlists.
    pub fn sort_key(&self) -> Option<f64> {
        match &self.value {
            TokenValue::Date(yymmdd) => yymmdd.parse().ok(),
            TokenValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

// Labels mix ASCII and full-width digits ("第４集"); numbers are parsed
// from the ASCII form.
fn ascii_digits(digits: &str) -> String {
    digits
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect()
}

fn parse_part(label: &str) -> Part {
    if let Some(caps) = PART_RE.captures(label) {
        return ascii_digits(&caps[1]).parse().map(Part::Numbered).unwrap_or_default();
    }
    if label.contains("預告") {
        return Part::Preview;
    }
    Part::Whole
}

fn parse_number(segment: &str) -> Option<f64> {
    if EPISODE_HINT_RE.is_match(segment) {
        if let Some(caps) = EPISODE_NUMBER_RE.captures(segment) {
            return ascii_digits(&caps[1]).parse().ok();
        }
    }
    if BARE_NUMBER_RE.is_match(segment) {
        return BARE_NUMBER_VALUE_RE
            .captures(segment)
            .and_then(|caps| ascii_digits(&caps[1]).parse().ok());
    }
    if RANGE_RE.is_match(segment) {
        // "12-3" becomes 12.0003 so that sub-parts sort after the episode.
        return RANGE_VALUE_RE
            .captures(segment)
            .and_then(|caps| {
                format!("{}.{:0>4}", ascii_digits(&caps[1]), ascii_digits(&caps[2]))
                    .parse()
                    .ok()
            });
    }
    None
}

fn parse_segment(segment: &str, part: Part, tokens: &mut Vec<EpisodeToken>) {
    let before = tokens.len();
    let mut push = |value| tokens.push(EpisodeToken { value, part });

    if let Some(digits) = DATE_RE.find(segment) {
        let digits: Vec<char> = ascii_digits(digits.as_str()).chars().collect();
        push(TokenValue::Date(digits[digits.len() - 6..].iter().collect()));
    }
    if let Some(number) = parse_number(segment) {
        push(TokenValue::Number(number));
    }
    if RESOLUTION_RE.is_match(segment) {
        push(TokenValue::Resolution);
    }

    if tokens.len() == before {
        tokens.push(EpisodeToken {
            value: TokenValue::Literal(segment.to_string()),
            part,
        });
    }
}

/// Breaks an episode label into its tokens.
///
/// Never fails and never returns an empty list: unrecognised text ends up
/// as a literal token. The result is sorted by `TokenKind`, keeping the
/// label order within a kind.
pub fn parse_episode(label: &str) -> Vec<EpisodeToken> {
    let label = label.replace('上', "-1").replace('下', "-2");
    let part = parse_part(&label);

    let mut tokens = Vec::new();
    for segment in label.split_whitespace() {
        parse_segment(segment, part, &mut tokens);
    }
    if tokens.is_empty() {
        tokens.push(EpisodeToken {
            value: TokenValue::Literal(String::new()),
            part,
        });
    }

    tokens.sort_by_key(EpisodeToken::kind);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(n: f64) -> EpisodeToken {
        EpisodeToken {
            value: TokenValue::Number(n),
            part: Part::Whole,
        }
    }

    fn values(label: &str) -> Vec<TokenValue> {
        parse_episode(label).into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn chinese_and_bare_numbers_agree() {
        assert!(parse_episode("第4集").contains(&number(4.0)));
        assert!(parse_episode("04").contains(&number(4.0)));
        assert!(parse_episode("EP4").contains(&number(4.0)));
        assert!(parse_episode("episode 4").contains(&number(4.0)));
        assert!(parse_episode("（4）").contains(&number(4.0)));
    }

    #[test]
    fn full_width_digits() {
        assert!(parse_episode("第４集").contains(&number(4.0)));
        assert!(parse_episode("ＥＰ０４").contains(&number(4.0)));
        assert_eq!(values("２０２３０７０９"), vec![TokenValue::Date("230709".into())]);
        assert_eq!(
            parse_episode("２０２３０７０９")[0].date(),
            NaiveDate::from_ymd_opt(2023, 7, 9)
        );
        assert_eq!(parse_episode("第12集_０２")[0].part, Part::Numbered(2));
    }

    #[test]
    fn long_digit_runs_are_dates() {
        assert_eq!(values("20230813"), vec![TokenValue::Date("230813".into())]);
        assert_eq!(values("230813"), vec![TokenValue::Date("230813".into())]);
    }

    #[test]
    fn date_and_episode_in_one_segment() {
        assert_eq!(
            values("E285.250621"),
            vec![
                TokenValue::Date("250621".into()),
                TokenValue::Number(285.0)
            ]
        );
    }

    #[test]
    fn range_encodes_sub_part() {
        let tokens = parse_episode("12-3");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, TokenValue::Number(12.0003));
        assert_eq!(tokens[0].part, Part::Numbered(3));
    }

    #[test]
    fn upper_and_lower_halves() {
        let first = parse_episode("第12集上");
        let second = parse_episode("第12集下");
        assert_eq!(first[0].value, TokenValue::Number(12.0));
        assert_eq!(first[0].part, Part::Numbered(1));
        assert_eq!(second[0].part, Part::Numbered(2));
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn preview_part() {
        let tokens = parse_episode("預告");
        assert_eq!(tokens[0].part, Part::Preview);
        assert_eq!(tokens[0].value, TokenValue::Literal("預告".into()));
    }

    #[test]
    fn quality_markers() {
        assert_eq!(values("HD"), vec![TokenValue::Resolution]);
        assert_eq!(values("正片"), vec![TokenValue::Resolution]);
        assert_eq!(
            values("Ep04 HD"),
            vec![TokenValue::Number(4.0), TokenValue::Resolution]
        );
        // A bare four digit number is always read as an episode number.
        assert_eq!(
            values("1080P"),
            vec![TokenValue::Number(1080.0), TokenValue::Resolution]
        );
    }

    #[test]
    fn sorted_by_kind() {
        let kinds: Vec<_> = parse_episode("特別篇 HD 第3集 230101")
            .iter()
            .map(EpisodeToken::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Date,
                TokenKind::Number,
                TokenKind::Resolution,
                TokenKind::Literal
            ]
        );
    }

    #[test]
    fn never_empty() {
        for label in ["", "   ", "special", "??", "第集"] {
            assert!(!parse_episode(label).is_empty(), "{label:?}");
        }
        assert_eq!(values(""), vec![TokenValue::Literal(String::new())]);
    }

    #[test]
    fn deterministic() {
        for label in ["第4集", "E596.220327", "12-3 HD", "預告", "1080P"] {
            assert_eq!(parse_episode(label), parse_episode(label));
        }
    }

    #[test]
    fn date_helpers() {
        let token = &parse_episode("20230709")[0];
        assert_eq!(token.date(), NaiveDate::from_ymd_opt(2023, 7, 9));
        assert_eq!(token.sort_key(), Some(230709.0));
        assert_eq!(parse_episode("999999")[0].date(), None);
        assert_eq!(parse_episode("HD")[0].sort_key(), None);
    }
}
