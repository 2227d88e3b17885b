//! Field normalization for heterogeneous upstream records.
//!
//! Every canonical field has an ordered table of extraction rules. Each rule
//! is a pure function over the raw record; the first rule that yields a
//! value wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{KiteError, KiteResult};
use crate::identity;
use crate::story::{NormalizedStory, PrimaryImage, RawStory};

const UNTITLED: &str = "Untitled";

/// Naive date-time layouts tried after RFC 3339 and RFC 2822; read as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Epoch values above this are milliseconds rather than seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// A named extraction rule for one canonical field
pub struct Rule<T> {
    pub name: &'static str,
    pub extract: fn(&RawStory) -> Option<T>,
}

/// Run `rules` in order and return the first value produced
pub fn first_match<T>(raw: &RawStory, rules: &[Rule<T>]) -> Option<T> {
    rules.iter().find_map(|rule| {
        let value = (rule.extract)(raw);
        if value.is_some() {
            debug!("Field matched by rule '{}'", rule.name);
        }
        value
    })
}

const TITLE_RULES: &[Rule<String>] = &[
    Rule { name: "title", extract: |r| text_at(r, "title") },
    Rule { name: "headline", extract: |r| text_at(r, "headline") },
    Rule { name: "name", extract: |r| text_at(r, "name") },
];

const SUMMARY_RULES: &[Rule<String>] = &[
    Rule { name: "short_summary", extract: |r| text_at(r, "short_summary") },
    Rule { name: "summary", extract: |r| text_at(r, "summary") },
    Rule { name: "description", extract: |r| text_at(r, "description") },
    Rule { name: "excerpt", extract: |r| text_at(r, "excerpt") },
];

const BODY_RULES: &[Rule<String>] = &[
    Rule { name: "body", extract: |r| text_at(r, "body") },
    Rule { name: "content", extract: |r| text_at(r, "content") },
    Rule { name: "text", extract: |r| text_at(r, "text") },
    Rule { name: "did_you_know", extract: |r| text_at(r, "did_you_know") },
];

const AUTHOR_RULES: &[Rule<String>] = &[
    Rule { name: "author", extract: |r| text_at(r, "author") },
    Rule { name: "byline", extract: |r| text_at(r, "byline") },
    Rule { name: "quote_author", extract: |r| text_at(r, "quote_author") },
    Rule { name: "articles[0].author", extract: |r| first_article(r).and_then(|a| text_at(a, "author")) },
];

const SOURCE_URL_RULES: &[Rule<String>] = &[
    Rule { name: "url", extract: |r| text_at(r, "url") },
    Rule { name: "link", extract: |r| text_at(r, "link") },
    Rule { name: "source_url", extract: |r| text_at(r, "source_url") },
    Rule { name: "articles[0].link", extract: |r| first_article(r).and_then(|a| text_at(a, "link")) },
    Rule { name: "quote_source_url", extract: |r| text_at(r, "quote_source_url") },
    Rule { name: "perspectives[0].sources[0].url", extract: first_perspective_source },
];

const PUBLISHED_RULES: &[Rule<DateTime<Utc>>] = &[
    Rule { name: "published", extract: |r| r.get("published").and_then(parse_timestamp) },
    Rule { name: "published_at", extract: |r| r.get("published_at").and_then(parse_timestamp) },
    Rule { name: "timestamp", extract: |r| r.get("timestamp").and_then(parse_timestamp) },
    Rule { name: "date", extract: |r| r.get("date").and_then(parse_timestamp) },
    Rule { name: "pub_date", extract: |r| r.get("pub_date").and_then(parse_timestamp) },
    Rule { name: "articles[0].date", extract: |r| first_article(r).and_then(|a| a.get("date")).and_then(parse_timestamp) },
];

const IMAGE_RULES: &[Rule<PrimaryImage>] = &[
    Rule { name: "primary_image", extract: |r| r.get("primary_image").and_then(parse_image) },
    Rule { name: "image", extract: |r| r.get("image").and_then(parse_image) },
    Rule { name: "thumbnail", extract: |r| r.get("thumbnail").and_then(parse_image) },
    Rule { name: "image_url", extract: |r| r.get("image_url").and_then(parse_image) },
];

const SCORE_RULES: &[Rule<f64>] = &[
    Rule { name: "score", extract: |r| declared_score(r, "score") },
    Rule { name: "points", extract: |r| declared_score(r, "points") },
    Rule { name: "votes", extract: |r| declared_score(r, "votes") },
    Rule { name: "cluster_number", extract: cluster_rank_score },
];

/// Turns raw records into [`NormalizedStory`] values.
///
/// `now` is captured once per run and stands in for dates that cannot be
/// parsed, which keeps normalization a pure function of its inputs.
pub struct Normalizer {
    now: DateTime<Utc>,
}

impl Normalizer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn normalize(&self, raw: &RawStory, category: &str) -> KiteResult<NormalizedStory> {
        let title = first_match(raw, TITLE_RULES);
        let source_url = first_match(raw, SOURCE_URL_RULES);

        let (identifier, title) = match (source_url.as_deref(), title) {
            (None, None) => {
                return Err(KiteError::malformed(category, "record has neither title nor source URL"));
            }
            (Some(url), title) => (identity::story_id(url), title.unwrap_or_else(|| UNTITLED.to_string())),
            (None, Some(title)) => {
                debug!("No source URL for '{}' in {}, using synthetic identifier", title, category);
                (identity::synthetic_id(category, &title), title)
            }
        };

        let (published, timestamp_estimated) = match first_match(raw, PUBLISHED_RULES) {
            Some(published) => (published, false),
            None => (self.now, true),
        };

        Ok(NormalizedStory {
            identifier,
            title,
            summary: first_match(raw, SUMMARY_RULES).unwrap_or_default(),
            body: first_match(raw, BODY_RULES).unwrap_or_default(),
            author: first_match(raw, AUTHOR_RULES),
            published,
            timestamp_estimated,
            source_urls: collect_source_urls(raw, source_url.as_deref()),
            source_url,
            category: category.to_string(),
            score: first_match(raw, SCORE_RULES).unwrap_or(0.0),
            primary_image: first_match(raw, IMAGE_RULES),
            talking_points: string_list(raw.get("talking_points")),
            quote: text_at(raw, "quote"),
            quote_author: text_at(raw, "quote_author").or_else(|| text_at(raw, "quote_attribution")),
            emoji: text_at(raw, "emoji"),
            location: text_at(raw, "location"),
        })
    }
}

fn text_at(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn first_article(record: &RawStory) -> Option<&Map<String, Value>> {
    record.get("articles")?.as_array()?.first()?.as_object()
}

fn first_perspective_source(record: &RawStory) -> Option<String> {
    let perspective = record.get("perspectives")?.as_array()?.first()?.as_object()?;
    let source = perspective.get("sources")?.as_array()?.first()?.as_object()?;
    text_at(source, "url")
}

/// A present, non-null score key settles the score; unreadable values count as 0
fn declared_score(record: &RawStory, key: &str) -> Option<f64> {
    match record.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_number(value).unwrap_or(0.0)),
    }
}

fn cluster_rank_score(record: &RawStory) -> Option<f64> {
    let rank = record.get("cluster_number").and_then(parse_number)?;
    Some(if rank < 100.0 { 100.0 - rank } else { 0.0 })
}

/// Every article link the record mentions, primary source first, without repeats
fn collect_source_urls(record: &RawStory, primary: Option<&str>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: Option<String>| {
        if let Some(url) = url {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    };

    push(primary.map(str::to_string));

    if let Some(articles) = record.get("articles").and_then(Value::as_array) {
        for article in articles.iter().filter_map(Value::as_object) {
            push(text_at(article, "link"));
        }
    }

    push(text_at(record, "quote_source_url"));

    if let Some(perspectives) = record.get("perspectives").and_then(Value::as_array) {
        for perspective in perspectives.iter().filter_map(Value::as_object) {
            let sources = perspective.get("sources").and_then(Value::as_array);
            for source in sources.into_iter().flatten().filter_map(Value::as_object) {
                push(text_at(source, "url"));
            }
        }
    }

    urls
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Numeric coercion: JSON numbers and numeric strings, finite values only
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn parse_dimension(value: &Value) -> Option<u32> {
    let number = parse_number(value)?;
    (number >= 0.0 && number <= u32::MAX as f64).then(|| number.round() as u32)
}

/// A bare URL string or an object with `url`/`src` and optional dimensions
pub fn parse_image(value: &Value) -> Option<PrimaryImage> {
    match value {
        Value::String(s) => {
            let url = s.trim();
            (!url.is_empty()).then(|| PrimaryImage {
                url: url.to_string(),
                width: None,
                height: None,
            })
        }
        Value::Object(object) => {
            let url = text_at(object, "url").or_else(|| text_at(object, "src"))?;
            Some(PrimaryImage {
                url,
                width: object.get("width").and_then(parse_dimension),
                height: object.get("height").and_then(parse_dimension),
            })
        }
        _ => None,
    }
}

/// Parse any of the upstream date representations into UTC
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(epoch) = s.parse::<f64>() {
        return from_epoch(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.trim_end_matches('Z');
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let seconds = if value > EPOCH_MILLIS_THRESHOLD { value / 1000.0 } else { value };
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    DateTime::<Utc>::from_timestamp(whole, nanos.min(999_999_999))
}
