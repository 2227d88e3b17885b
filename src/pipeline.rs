use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::filter::{filter_and_limit, limit_per_category, FilterOptions};
use crate::merge::merge_stories;
use crate::normalize::Normalizer;
use crate::story::{FeedBatch, MergedStory, NormalizedStory};

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub filter: FilterOptions,
    /// Per-category limits applied to each feed before merging (0 = unlimited)
    pub category_limits: HashMap<String, usize>,
}

/// Counters describing one processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub feeds: usize,
    pub raw_records: usize,
    pub malformed_dropped: usize,
    pub estimated_dates: usize,
    pub limited_per_category: usize,
    pub merged: usize,
    pub filtered_out: usize,
    pub published: usize,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub stories: Vec<MergedStory>,
    pub diagnostics: Diagnostics,
}

/// Normalize, merge, filter and limit every fetched feed.
///
/// Batches are processed in the order given; that order decides which
/// duplicate's fields survive a score tie.
pub fn process(batches: &[FeedBatch], options: &ProcessOptions, now: DateTime<Utc>) -> ProcessOutcome {
    let normalizer = Normalizer::new(now);
    let mut diagnostics = Diagnostics {
        feeds: batches.len(),
        ..Diagnostics::default()
    };

    let mut normalized: Vec<NormalizedStory> = Vec::new();
    for batch in batches {
        diagnostics.raw_records += batch.records.len();

        let mut stories = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            match normalizer.normalize(record, &batch.category) {
                Ok(story) => {
                    if story.timestamp_estimated {
                        debug!("No usable date for '{}', using run time", story.title);
                        diagnostics.estimated_dates += 1;
                    }
                    stories.push(story);
                }
                Err(e) => {
                    debug!("Dropping record: {}", e);
                    diagnostics.malformed_dropped += 1;
                }
            }
        }

        let limit = options.category_limits.get(&batch.category).copied().unwrap_or(0);
        let before = stories.len();
        let stories = limit_per_category(stories, limit);
        diagnostics.limited_per_category += before - stories.len();

        info!(
            "Normalized {} stories from '{}' ({} records)",
            stories.len(),
            batch.category,
            batch.records.len()
        );
        normalized.extend(stories);
    }

    let merged = merge_stories(normalized);
    diagnostics.merged = merged.len();

    let stories = filter_and_limit(merged, &options.filter);
    diagnostics.published = stories.len();
    diagnostics.filtered_out = diagnostics.merged - diagnostics.published;

    info!(
        "Processed {} records into {} stories ({} malformed, {} merged, {} filtered out)",
        diagnostics.raw_records,
        diagnostics.published,
        diagnostics.malformed_dropped,
        diagnostics.merged,
        diagnostics.filtered_out
    );

    ProcessOutcome {
        stories,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::RawStory;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn records(values: Vec<Value>) -> Vec<RawStory> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_two_feeds_merge_into_one_story() {
        let batches = vec![
            FeedBatch::new("tech", records(vec![json!({"url": "http://a.com/1", "score": 3})])),
            FeedBatch::new(
                "science",
                records(vec![json!({
                    "url": "http://a.com/1/",
                    "score": 8,
                    "image": {"url": "http://img/1.jpg", "width": 100}
                })]),
            ),
        ];

        let outcome = process(&batches, &ProcessOptions::default(), now());

        assert_eq!(outcome.stories.len(), 1);
        let story = &outcome.stories[0];
        assert_eq!(story.score, 8.0);
        assert!(story.categories.contains("tech"));
        assert!(story.categories.contains("science"));
        let image = story.primary_image.as_ref().unwrap();
        assert_eq!(image.url, "http://img/1.jpg");
        assert_eq!(image.width, Some(100));
        assert_eq!(image.height, None);
        assert_eq!(outcome.diagnostics.estimated_dates, 2);
    }

    #[test]
    fn test_malformed_records_counted_not_fatal() {
        let batches = vec![FeedBatch::new(
            "tech",
            records(vec![
                json!({"summary": "no title, no url"}),
                json!({"title": "Fine", "url": "https://a.com/ok"}),
            ]),
        )];

        let outcome = process(&batches, &ProcessOptions::default(), now());

        assert_eq!(outcome.stories.len(), 1);
        assert_eq!(outcome.diagnostics.raw_records, 2);
        assert_eq!(outcome.diagnostics.malformed_dropped, 1);
    }

    #[test]
    fn test_per_category_limit_before_merge() {
        let batches = vec![FeedBatch::new(
            "tech",
            records(vec![
                json!({"title": "low", "url": "https://a.com/1", "score": 1}),
                json!({"title": "high", "url": "https://a.com/2", "score": 9}),
                json!({"title": "mid", "url": "https://a.com/3", "score": 5}),
            ]),
        )];
        let options = ProcessOptions {
            category_limits: HashMap::from([("tech".to_string(), 2)]),
            ..ProcessOptions::default()
        };

        let outcome = process(&batches, &options, now());

        let titles: Vec<&str> = outcome.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "mid"]);
        assert_eq!(outcome.diagnostics.limited_per_category, 1);
    }

    #[test]
    fn test_filter_and_global_limit() {
        let batches = vec![FeedBatch::new(
            "tech",
            records(vec![
                json!({"title": "a", "url": "https://a.com/1", "score": 10}),
                json!({"title": "b", "url": "https://a.com/2", "score": 5}),
                json!({"title": "c", "url": "https://a.com/3", "score": 0}),
            ]),
        )];
        let options = ProcessOptions {
            filter: FilterOptions {
                min_score: 6.0,
                filter_enabled: true,
                top_n: 0,
            },
            ..ProcessOptions::default()
        };

        let outcome = process(&batches, &options, now());

        assert_eq!(outcome.stories.len(), 1);
        assert_eq!(outcome.stories[0].title, "a");
        assert_eq!(outcome.diagnostics.filtered_out, 2);
    }

    #[test]
    fn test_no_batches_is_empty_run() {
        let outcome = process(&[], &ProcessOptions::default(), now());
        assert!(outcome.stories.is_empty());
        assert_eq!(outcome.diagnostics, Diagnostics::default());
    }
}
