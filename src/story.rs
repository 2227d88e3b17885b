use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream record exactly as a category feed delivered it
pub type RawStory = serde_json::Map<String, serde_json::Value>;

/// All raw records fetched from one feed, tagged with its category label
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub category: String,
    pub records: Vec<RawStory>,
}

impl FeedBatch {
    pub fn new(category: impl Into<String>, records: Vec<RawStory>) -> Self {
        Self {
            category: category.into(),
            records,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NormalizedStory {
    pub identifier: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub author: Option<String>,
    pub published: DateTime<Utc>,
    /// Set when no upstream date could be parsed and `published` is the run time
    pub timestamp_estimated: bool,
    pub source_url: Option<String>,
    pub source_urls: Vec<String>,
    pub category: String,
    pub score: f64,
    pub primary_image: Option<PrimaryImage>,
    pub talking_points: Vec<String>,
    pub quote: Option<String>,
    pub quote_author: Option<String>,
    pub emoji: Option<String>,
    pub location: Option<String>,
}

/// One story per identifier after merging every feed's records.
///
/// This is the unit written to `processed_stories.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedStory {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    pub categories: BTreeSet<String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_image: Option<PrimaryImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub talking_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl MergedStory {
    pub fn from_normalized(story: NormalizedStory) -> Self {
        let mut categories = BTreeSet::new();
        categories.insert(story.category);

        Self {
            identifier: story.identifier,
            title: story.title,
            summary: story.summary,
            body: story.body,
            author: story.author,
            published: story.published,
            source_url: story.source_url,
            source_urls: story.source_urls,
            categories,
            score: story.score,
            primary_image: story.primary_image,
            talking_points: story.talking_points,
            quote: story.quote,
            quote_author: story.quote_author,
            emoji: story.emoji,
            location: story.location,
        }
    }
}
