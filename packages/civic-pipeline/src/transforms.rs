//! Field transform pipeline.
//!
//! Transforms are declared in rule sets as spec strings (`"date_parse"`,
//! `"regex_replace:<pattern>:<replacement>"`) and applied in declared order
//! after raw extraction. A transform that cannot improve a value returns it
//! unchanged; per-item tolerance is the policy everywhere in this engine.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// A parsed transform spec.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    DateParse,
    Trim,
    Lowercase,
    Uppercase,
    StripHtml,
    UrlResolve,
    RegexReplace { pattern: String, replacement: String },
    NameFormat,
}

impl Transform {
    /// Parse a transform spec string. Returns None for unknown names or
    /// malformed arguments.
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, args) = match spec.split_once(':') {
            Some((name, args)) => (name, Some(args)),
            None => (spec, None),
        };

        match (name.trim(), args) {
            ("date_parse", None) => Some(Self::DateParse),
            ("trim", None) => Some(Self::Trim),
            ("lowercase", None) => Some(Self::Lowercase),
            ("uppercase", None) => Some(Self::Uppercase),
            ("strip_html", None) => Some(Self::StripHtml),
            ("url_resolve", None) => Some(Self::UrlResolve),
            ("name_format", None) => Some(Self::NameFormat),
            ("regex_replace", Some(args)) => {
                let (pattern, replacement) = args.split_once(':')?;
                Some(Self::RegexReplace {
                    pattern: pattern.to_string(),
                    replacement: replacement.to_string(),
                })
            }
            _ => None,
        }
    }

    /// Apply the transform to a value. `base_url` is the page URL, used by
    /// `url_resolve` to absolutize relative links.
    pub fn apply(&self, value: &str, base_url: Option<&Url>) -> String {
        match self {
            Self::DateParse => date_only(value)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .or_else(|| parse_datetime(value).map(|dt| dt.to_rfc3339()))
                .unwrap_or_else(|| value.to_string()),
            Self::Trim => value.trim().to_string(),
            Self::Lowercase => value.to_lowercase(),
            Self::Uppercase => value.to_uppercase(),
            Self::StripHtml => strip_html(value),
            Self::UrlResolve => base_url
                .and_then(|base| base.join(value.trim()).ok())
                .map(|url| url.to_string())
                .unwrap_or_else(|| value.to_string()),
            Self::RegexReplace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(re) => re.replace_all(value, replacement.as_str()).into_owned(),
                Err(_) => value.to_string(),
            },
            Self::NameFormat => name_format(value),
        }
    }
}

fn strip_html(value: &str) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let stripped = re.replace_all(value, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace and title-case each word, preserving "Last, First"
/// comma structure. Motivated by all-caps CAL-ACCESS donor names.
fn name_format(value: &str) -> String {
    value
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for ch in word.chars() {
        if at_start && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            at_start = false;
        } else if ch.is_alphabetic() {
            out.extend(ch.to_lowercase());
        } else {
            // hyphens and apostrophes restart capitalization (O'Brien, Smith-Jones)
            out.push(ch);
            at_start = ch == '-' || ch == '\'';
        }
    }
    out
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%b %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
];

/// Parse a date from the formats civic sources actually use.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    date_only(value).or_else(|| parse_datetime(value).map(|dt| dt.date_naive()))
}

fn date_only(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Parse a datetime; naive formats are taken as UTC. Falls back to a bare
/// date at midnight.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    None
}
