//! Cross-feed deduplication.
//!
//! Stories sharing an identifier collapse into one [`MergedStory`]. The
//! category set is the union over all duplicates; scalar fields come from
//! the highest-scoring duplicate, the earliest one winning ties. Scalar
//! selection therefore depends on feed order, the category set does not.

use std::collections::HashMap;

use tracing::debug;

use crate::story::{MergedStory, NormalizedStory};

/// Merge stories in feed order, returning one story per identifier in
/// first-seen order.
pub fn merge_stories<I>(stories: I) -> Vec<MergedStory>
where
    I: IntoIterator<Item = NormalizedStory>,
{
    let mut merged: Vec<MergedStory> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for story in stories {
        match index.get(&story.identifier) {
            Some(&position) => absorb(&mut merged[position], story),
            None => {
                index.insert(story.identifier.clone(), merged.len());
                merged.push(MergedStory::from_normalized(story));
            }
        }
    }

    merged
}

fn absorb(existing: &mut MergedStory, incoming: NormalizedStory) {
    debug!(
        "Merging duplicate '{}' from {} into existing story",
        incoming.identifier, incoming.category
    );

    existing.categories.insert(incoming.category);
    for url in incoming.source_urls {
        if !existing.source_urls.contains(&url) {
            existing.source_urls.push(url);
        }
    }

    if incoming.score > existing.score {
        existing.score = incoming.score;
        existing.title = incoming.title;
        existing.summary = incoming.summary;
        existing.body = incoming.body;
        existing.author = incoming.author;
        existing.published = incoming.published;
        existing.source_url = incoming.source_url;
        existing.primary_image = incoming.primary_image;
        existing.talking_points = incoming.talking_points;
        existing.quote = incoming.quote;
        existing.quote_author = incoming.quote_author;
        existing.emoji = incoming.emoji;
        existing.location = incoming.location;
    }
}
