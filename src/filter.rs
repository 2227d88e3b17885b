use std::cmp::Ordering;

use crate::story::{MergedStory, NormalizedStory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOptions {
    pub min_score: f64,
    pub filter_enabled: bool,
    /// Maximum number of stories kept (0 = unlimited)
    pub top_n: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            filter_enabled: false,
            top_n: 0,
        }
    }
}

/// Drop low scores when enabled, order by score descending and truncate.
///
/// The sort is stable, so equal scores keep their first-seen order.
pub fn filter_and_limit(mut stories: Vec<MergedStory>, options: &FilterOptions) -> Vec<MergedStory> {
    if options.filter_enabled {
        stories.retain(|story| story.score >= options.min_score);
    }

    stories.sort_by(|a, b| by_score_desc(a.score, b.score));

    if options.top_n > 0 {
        stories.truncate(options.top_n);
    }

    stories
}

/// Keep the `limit` highest-scoring stories of one feed (0 = keep all)
pub fn limit_per_category(mut stories: Vec<NormalizedStory>, limit: usize) -> Vec<NormalizedStory> {
    if limit == 0 {
        return stories;
    }
    stories.sort_by(|a, b| by_score_desc(a.score, b.score));
    stories.truncate(limit);
    stories
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
