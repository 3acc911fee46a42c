//! Turning untrusted feed items into [`Article`]s.
//!
//! [`RawItem`] is the library-independent view of a feed entry: every field
//! is optional and nothing in it has been cleaned. [`normalize`] is total over
//! it and always yields fully populated strings.

use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::Entry;
use feed_rs::parser::{self, Parser};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::article::{parse_pub_date, Article};

const NO_TITLE: &str = "No title";
const NO_LINK: &str = "#";

/// Applied in order, so `&amp;lt;` decodes all the way to `<`.
const ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#039;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&#8216;", "'"),
    ("&#8217;", "'"),
    ("&#8218;", "'"),
    ("&#8220;", "\""),
    ("&#8221;", "\""),
    ("&#8222;", "\""),
    ("&#8211;", "\u{2013}"),
    ("&#8212;", "\u{2014}"),
    ("&#8230;", "..."),
];

static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// A feed parser that keeps unreadable dates distinguishable from missing
/// ones.
pub fn feed_parser() -> Parser {
    parser::Builder::new()
        .timestamp_parser(parse_feed_timestamp)
        .build()
}

/// Blank means absent. Anything else that does not parse becomes the Unix
/// epoch, which sorts after every real date.
pub fn parse_feed_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.trim().is_empty() {
        return None;
    }
    Some(parse_pub_date(text).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<String>,
    pub creator: Option<String>,
    pub content_snippet: Option<String>,
    pub content: Option<String>,
    pub categories: Vec<String>,
}

impl RawItem {
    pub fn from_entry(entry: Entry) -> Self {
        let pub_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true));

        Self {
            title: entry.title.map(|t| t.content),
            link: entry.links.into_iter().next().map(|l| l.href),
            pub_date,
            creator: entry.authors.into_iter().next().map(|p| p.name),
            content_snippet: entry.summary.map(|s| strip_tags(&s.content)),
            content: entry.content.and_then(|c| c.body).map(|b| strip_tags(&b)),
            categories: entry
                .categories
                .into_iter()
                .map(|c| if c.term.trim().is_empty() { c.label.unwrap_or_default() } else { c.term })
                .collect(),
        }
    }
}

pub fn normalize(raw: RawItem, source: &str, now: DateTime<Utc>, snippet_length: usize) -> Article {
    let title = raw
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let link = non_blank(raw.link)
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| NO_LINK.to_string());

    let pub_date = non_blank(raw.pub_date)
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));

    let creator = non_blank(raw.creator)
        .map(|c| c.trim().to_string())
        .unwrap_or_else(|| source.to_string());

    let snippet_source = non_blank(raw.content_snippet)
        .or_else(|| non_blank(raw.content))
        .unwrap_or_default();
    let content_snippet = clean_text(&snippet_source)
        .chars()
        .take(snippet_length)
        .collect();

    Article {
        title,
        link,
        pub_date,
        creator,
        content_snippet,
        source: source.to_string(),
        categories: dedup_categories(raw.categories),
    }
}

/// Decode the known entities, drop markdown emphasis, collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let mut decoded = text.to_string();
    for (entity, replacement) in ENTITIES {
        if decoded.contains(entity) {
            decoded = decoded.replace(entity, replacement);
        }
    }

    let stripped = MARKDOWN_HEADING
        .replace_all(&decoded, "")
        .replace("**", "")
        .replace(['*', '_'], "");

    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn strip_tags(html: &str) -> String {
    HTML_TAG.replace_all(html, " ").into_owned()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn dedup_categories(categories: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let category = category.trim();
        if category.is_empty() || seen.iter().any(|c| c == category) {
            continue;
        }
        seen.push(category.to_string());
    }
    seen
}
