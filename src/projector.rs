//! Projection of merged stories into the flat records the templates render.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::identity;
use crate::story::MergedStory;

pub const MAX_SLUG_LEN: usize = 80;
const COLLISION_SUFFIX_LEN: usize = 8;

const HTML_DATE_FORMAT: &str = "%Y-%m-%d";
const RSS_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryView {
    pub identifier: String,
    pub slug: String,
    /// Site-relative path of the story page
    pub path: String,
    /// Absolute URL of the story page
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub source_urls: Vec<String>,
    pub title: String,
    pub summary: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
    pub date_html: String,
    pub date_rss: String,
    pub talking_points: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl StoryView {
    pub fn category_label(&self) -> String {
        self.categories.join(", ")
    }
}

pub struct Projector {
    site_url: String,
}

impl Projector {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Project one story using its natural slug
    pub fn project(&self, story: &MergedStory) -> StoryView {
        self.project_with_slug(story, base_slug(story))
    }

    /// Project a list of stories, giving each a unique slug.
    ///
    /// Slugs depend only on the set of stories, not on their order: among
    /// stories sharing a slug the smallest identifier keeps it bare and the
    /// others get a suffix derived from their identifier.
    pub fn project_all(&self, stories: &[MergedStory]) -> Vec<StoryView> {
        assign_slugs(stories)
            .into_iter()
            .zip(stories)
            .map(|(slug, story)| self.project_with_slug(story, slug))
            .collect()
    }

    fn project_with_slug(&self, story: &MergedStory, slug: String) -> StoryView {
        let path = format!("stories/{}.html", slug);
        let image = story.primary_image.as_ref();

        StoryView {
            identifier: story.identifier.clone(),
            url: format!("{}/{}", self.site_url, path),
            path,
            slug,
            source_url: story.source_url.clone(),
            source_urls: story.source_urls.clone(),
            title: story.title.clone(),
            summary: story.summary.clone(),
            body: story.body.clone(),
            author: story.author.clone(),
            categories: story.categories.iter().cloned().collect(),
            score: story.score,
            thumbnail_url: image.map(|i| i.url.clone()),
            thumbnail_width: image.and_then(|i| i.width),
            thumbnail_height: image.and_then(|i| i.height),
            date_html: format_date_html(&story.published),
            date_rss: format_date_rss(&story.published),
            talking_points: story.talking_points.clone(),
            quote: story.quote.clone(),
            quote_author: story.quote_author.clone(),
            emoji: story.emoji.clone(),
            location: story.location.clone(),
        }
    }
}

fn assign_slugs(stories: &[MergedStory]) -> Vec<String> {
    let bases: Vec<String> = stories.iter().map(base_slug).collect();

    let mut order: Vec<usize> = (0..stories.len()).collect();
    order.sort_by(|&a, &b| {
        bases[a]
            .cmp(&bases[b])
            .then_with(|| stories[a].identifier.cmp(&stories[b].identifier))
    });

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for &i in &order {
        owners
            .entry(bases[i].as_str())
            .or_insert(stories[i].identifier.as_str());
    }

    let mut taken: HashSet<String> = owners.keys().map(|slug| slug.to_string()).collect();
    let mut assigned: HashMap<&str, String> = HashMap::new();
    let mut slugs = vec![String::new(); stories.len()];

    for &i in &order {
        let identifier = stories[i].identifier.as_str();
        let base = bases[i].as_str();

        let slug = match assigned.get(identifier) {
            Some(slug) => slug.clone(),
            None if owners.get(base) == Some(&identifier) => base.to_string(),
            None => {
                let slug = suffixed_slug(base, identifier, &taken);
                warn!(
                    "Slug '{}' already used by {}, renaming {} to '{}'",
                    base, owners[base], identifier, slug
                );
                taken.insert(slug.clone());
                slug
            }
        };

        assigned.insert(identifier, slug.clone());
        slugs[i] = slug;
    }

    slugs
}

/// First free `<base>-<hash>` slug, lengthening the hash and finally
/// counting up until nothing issued so far matches
fn suffixed_slug(base: &str, identifier: &str, taken: &HashSet<String>) -> String {
    let hash = identity::short_hash(identifier, 64);

    let mut len = COLLISION_SUFFIX_LEN;
    while len <= hash.len() {
        let candidate = format!("{}-{}", base, &hash[..len]);
        if !taken.contains(&candidate) {
            return candidate;
        }
        len += COLLISION_SUFFIX_LEN;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}-{}", base, hash, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn base_slug(story: &MergedStory) -> String {
    let slug = slugify(&story.title, MAX_SLUG_LEN);
    if slug.is_empty() {
        format!("story-{}", identity::short_hash(&story.identifier, COLLISION_SUFFIX_LEN))
    } else {
        slug
    }
}

/// Lowercase ASCII alphanumerics separated by single hyphens, at most
/// `max_len` characters
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max_len));
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }

    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}

pub fn format_date_html(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(HTML_DATE_FORMAT).to_string()
}

pub fn format_date_rss(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(RSS_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::PrimaryImage;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn merged(identifier: &str, title: &str) -> MergedStory {
        MergedStory {
            identifier: identifier.to_string(),
            title: title.to_string(),
            summary: "Summary".to_string(),
            body: String::new(),
            author: None,
            published: Utc.with_ymd_and_hms(2024, 12, 9, 14, 30, 0).unwrap(),
            source_url: Some(identifier.to_string()),
            source_urls: vec![identifier.to_string()],
            categories: BTreeSet::from(["tech".to_string(), "science".to_string()]),
            score: 8.0,
            primary_image: None,
            talking_points: Vec::new(),
            quote: None,
            quote_author: None,
            emoji: None,
            location: None,
        }
    }

    mod slugify_tests {
        use super::*;

        #[test]
        fn test_basic_slug() {
            assert_eq!(slugify("Hello, World!", 80), "hello-world");
        }

        #[test]
        fn test_repeats_collapsed_and_trimmed() {
            assert_eq!(slugify("  --Rust   &&  Go--  ", 80), "rust-go");
        }

        #[test]
        fn test_non_ascii_becomes_separator() {
            assert_eq!(slugify("Café über 2025", 80), "caf-ber-2025");
        }

        #[test]
        fn test_truncated_without_trailing_hyphen() {
            let slug = slugify("abcde fghij", 6);
            assert_eq!(slug, "abcde");
            assert!(slugify(&"word ".repeat(50), MAX_SLUG_LEN).len() <= MAX_SLUG_LEN);
        }

        #[test]
        fn test_only_symbols_is_empty() {
            assert_eq!(slugify("!!! ???", 80), "");
        }
    }

    #[test]
    fn test_projection_fields() {
        let projector = Projector::new("https://news.example.com/");
        let view = projector.project(&merged("https://a.com/1", "Big News Today"));

        assert_eq!(view.slug, "big-news-today");
        assert_eq!(view.path, "stories/big-news-today.html");
        assert_eq!(view.url, "https://news.example.com/stories/big-news-today.html");
        assert_eq!(view.categories, vec!["science", "tech"]);
        assert_eq!(view.category_label(), "science, tech");
        assert_eq!(view.date_html, "2024-12-09");
        assert_eq!(view.date_rss, "Mon, 09 Dec 2024 14:30:00 +0000");
        assert!(view.thumbnail_url.is_none());
    }

    #[test]
    fn test_slug_is_deterministic() {
        let projector = Projector::new("https://news.example.com");
        let story = merged("https://a.com/1", "Stable Title");

        assert_eq!(projector.project(&story).slug, projector.project(&story).slug);
    }

    #[test]
    fn test_thumbnail_dimensions_independent() {
        let mut story = merged("https://a.com/1", "Pictured");
        story.primary_image = Some(PrimaryImage {
            url: "http://img/1.jpg".to_string(),
            width: Some(100),
            height: None,
        });

        let view = Projector::new("https://x.com").project(&story);
        assert_eq!(view.thumbnail_url.as_deref(), Some("http://img/1.jpg"));
        assert_eq!(view.thumbnail_width, Some(100));
        assert_eq!(view.thumbnail_height, None);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["thumbnail_width"], 100);
        assert!(json.get("thumbnail_height").is_none());
    }

    #[test]
    fn test_slug_collision_gets_suffix() {
        let stories = vec![
            merged("https://b.com/2", "Same Title"),
            merged("https://a.com/1", "Same Title"),
        ];

        let views = Projector::new("https://x.com").project_all(&stories);

        assert_eq!(views[1].slug, "same-title");
        assert_eq!(
            views[0].slug,
            format!("same-title-{}", identity::short_hash("https://b.com/2", 8))
        );
    }

    #[test]
    fn test_slugs_independent_of_story_order() {
        let a = merged("https://a.com/1", "Same Title");
        let b = merged("https://b.com/2", "Same Title");
        let projector = Projector::new("https://x.com");

        let first = projector.project_all(&[a.clone(), b.clone()]);
        let second = projector.project_all(&[b, a]);

        assert_eq!(first[0].slug, second[1].slug);
        assert_eq!(first[1].slug, second[0].slug);
        assert_eq!(first[0].slug, "same-title");
    }

    #[test]
    fn test_suffixed_slug_never_reuses_an_issued_slug() {
        let suffix = identity::short_hash("https://y.com/1", 8);
        let stories = vec![
            merged("https://x.com/1", "Same Title"),
            merged("https://z.com/1", &format!("Same Title {}", suffix)),
            merged("https://y.com/1", "Same Title"),
        ];

        let views = Projector::new("https://x.com").project_all(&stories);
        let slugs: HashSet<&str> = views.iter().map(|v| v.slug.as_str()).collect();

        assert_eq!(slugs.len(), 3);
        assert_eq!(views[0].slug, "same-title");
        assert_eq!(views[1].slug, format!("same-title-{}", suffix));
        assert_eq!(
            views[2].slug,
            format!("same-title-{}", identity::short_hash("https://y.com/1", 16))
        );
    }

    #[test]
    fn test_same_identifier_shares_slug() {
        let story = merged("https://a.com/1", "Repeat");
        let views = Projector::new("https://x.com").project_all(&[story.clone(), story]);

        assert_eq!(views[0].slug, "repeat");
        assert_eq!(views[1].slug, "repeat");
    }

    #[test]
    fn test_empty_title_slug_uses_identifier_hash() {
        let view = Projector::new("https://x.com").project(&merged("https://a.com/1", "???"));
        assert!(view.slug.starts_with("story-"));
    }
}
