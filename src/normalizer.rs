//! RSS 2.0 / Atom normalization.
//!
//! Rather than detecting the overall format and branching, every article
//! field is resolved through its own ordered list of extraction strategies.
//! Real feeds mix conventions (Atom entries carrying `pubDate`, RSS items
//! carrying `content:encoded`), and a per-field chain absorbs that.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::xml::{XmlDocument, XmlError, XmlNode};

pub const NO_TITLE: &str = "No title";
pub const NO_LINK: &str = "#";

/// One normalized feed item, shaped for the dashboard's JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// RFC 3339 timestamp in UTC, or the source value verbatim when it is
    /// not a date this crate can read.
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unrecognized feed format: no rss/channel or feed root element")]
    UnrecognizedFormat,
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// A named way of pulling a value out of an item element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Text or CDATA of the first child element with this name that has any,
    /// counting text nested in markup inside that element.
    Text(&'static str),
    /// An attribute on a child element. Among several candidates, one with
    /// `rel="alternate"` or no `rel` at all is preferred.
    Attribute {
        element: &'static str,
        attribute: &'static str,
    },
}

impl Strategy {
    pub fn extract<'a>(&self, item: &'a XmlNode) -> Option<&'a str> {
        match *self {
            Strategy::Text(element) => item.children_named(element).find_map(XmlNode::inner_text),
            Strategy::Attribute { element, attribute } => {
                let mut fallback = None;
                for node in item.children_named(element) {
                    let Some(value) = node.attr(attribute).map(str::trim).filter(|v| !v.is_empty())
                    else {
                        continue;
                    };
                    match node.attr("rel") {
                        None | Some("alternate") => return Some(value),
                        Some(_) => {
                            fallback.get_or_insert(value);
                        }
                    }
                }
                fallback
            }
        }
    }
}

pub const TITLE: &[Strategy] = &[Strategy::Text("title")];

pub const LINK: &[Strategy] = &[
    Strategy::Attribute {
        element: "link",
        attribute: "href",
    },
    Strategy::Text("link"),
];

pub const PUB_DATE: &[Strategy] = &[
    Strategy::Text("pubDate"),
    Strategy::Text("published"),
    Strategy::Text("updated"),
    Strategy::Text("dc:date"),
];

pub const CONTENT: &[Strategy] = &[
    Strategy::Text("description"),
    Strategy::Text("content"),
    Strategy::Text("content:encoded"),
    Strategy::Text("summary"),
];

fn resolve<'a>(item: &'a XmlNode, chain: &[Strategy]) -> Option<&'a str> {
    chain.iter().find_map(|strategy| strategy.extract(item))
}

/// Parse a feed timestamp in any of the shapes seen in practice.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Some(dt) = parse_rfc2822_lenient(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f %z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 2822 as feeds actually write it: a `UTC` zone name is accepted, and a
/// weekday that disagrees with the date is dropped rather than failing.
fn parse_rfc2822_lenient(raw: &str) -> Option<DateTime<FixedOffset>> {
    let zoned = match raw.strip_suffix(" UTC") {
        Some(rest) => Cow::Owned(format!("{} +0000", rest)),
        None => Cow::Borrowed(raw),
    };
    if let Ok(dt) = DateTime::parse_from_rfc2822(&zoned) {
        return Some(dt);
    }

    let (weekday, rest) = zoned.split_once(',')?;
    if !weekday.trim().chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    DateTime::parse_from_rfc2822(rest.trim_start()).ok()
}

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The first present date value wins. It is re-emitted as UTC RFC 3339 when
/// it parses and passed through as written when it does not. Only an item
/// with no date field at all gets `now`.
fn resolve_date(item: &XmlNode, now: DateTime<Utc>) -> String {
    let Some(raw) = resolve(item, PUB_DATE) else {
        return format_timestamp(now);
    };

    match parse_date(raw) {
        Some(dt) => format_timestamp(dt),
        None => {
            debug!("Passing through unparseable date: {}", raw);
            raw.to_string()
        }
    }
}

pub fn normalize_item(item: &XmlNode, now: DateTime<Utc>) -> Article {
    Article {
        title: resolve(item, TITLE).unwrap_or(NO_TITLE).to_string(),
        link: resolve(item, LINK).unwrap_or(NO_LINK).to_string(),
        pub_date: resolve_date(item, now),
        content: resolve(item, CONTENT).unwrap_or_default().to_string(),
    }
}

/// The element holding the item list: `rss > channel`, else `feed`.
pub fn feed_root(doc: &XmlDocument) -> Option<&XmlNode> {
    doc.root("rss")
        .and_then(|rss| rss.child("channel"))
        .or_else(|| doc.root("feed"))
}

/// Item elements under the feed root, always as a list.
pub fn feed_items(root: &XmlNode) -> Vec<&XmlNode> {
    let items: Vec<_> = root.children_named("item").collect();
    if !items.is_empty() {
        return items;
    }
    root.children_named("entry").collect()
}

/// Normalize with an explicit clock; `now` fills in items without a date.
pub fn normalize_at(xml: &str, now: DateTime<Utc>) -> Result<Vec<Article>, NormalizeError> {
    let doc = XmlDocument::parse(xml)?;
    let root = feed_root(&doc).ok_or(NormalizeError::UnrecognizedFormat)?;

    Ok(feed_items(root)
        .into_iter()
        .map(|item| normalize_item(item, now))
        .collect())
}

pub fn normalize(xml: &str) -> Result<Vec<Article>, NormalizeError> {
    normalize_at(xml, Utc::now())
}
