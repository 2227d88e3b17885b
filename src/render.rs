use askama::Template;
use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::error::KiteResult;
use crate::projector::{format_date_rss, StoryView};

// Template structs
#[derive(Template)]
#[template(path = "feed.xml", escape = "html")]
pub struct FeedTemplate<'a> {
    pub site: &'a SiteConfig,
    pub site_url: &'a str,
    pub stories: &'a [StoryView],
    pub build_date: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub site: &'a SiteConfig,
    pub stories: &'a [StoryView],
    pub generated: String,
}

#[derive(Template)]
#[template(path = "story.html")]
pub struct StoryTemplate<'a> {
    pub site: &'a SiteConfig,
    pub story: &'a StoryView,
}

/// Everything one run writes, rendered in memory first
#[derive(Debug, Clone)]
pub struct RenderedSite {
    pub feed_xml: String,
    pub index_html: String,
    /// `(site-relative path, html)` for every story page
    pub pages: Vec<(String, String)>,
}

pub fn render_feed(site: &SiteConfig, stories: &[StoryView], now: DateTime<Utc>) -> KiteResult<String> {
    let template = FeedTemplate {
        site,
        site_url: site.base_url.trim_end_matches('/'),
        stories,
        build_date: format_date_rss(&now),
    };
    Ok(template.render()?)
}

pub fn render_index(site: &SiteConfig, stories: &[StoryView], now: DateTime<Utc>) -> KiteResult<String> {
    let template = IndexTemplate {
        site,
        stories,
        generated: now.format("%Y-%m-%d %H:%M UTC").to_string(),
    };
    Ok(template.render()?)
}

pub fn render_story(site: &SiteConfig, story: &StoryView) -> KiteResult<String> {
    Ok(StoryTemplate { site, story }.render()?)
}

pub fn render_site(site: &SiteConfig, stories: &[StoryView], now: DateTime<Utc>) -> KiteResult<RenderedSite> {
    let pages = stories
        .iter()
        .map(|story| Ok((story.path.clone(), render_story(site, story)?)))
        .collect::<KiteResult<Vec<_>>>()?;

    Ok(RenderedSite {
        feed_xml: render_feed(site, stories, now)?,
        index_html: render_index(site, stories, now)?,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::Projector;
    use crate::story::{MergedStory, PrimaryImage};
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn site() -> SiteConfig {
        SiteConfig {
            title: "Test Digest".to_string(),
            base_url: "https://news.example.com".to_string(),
            description: "Testing".to_string(),
            language: "en".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn views(with_image: bool) -> Vec<StoryView> {
        let story = MergedStory {
            identifier: "https://a.com/1".to_string(),
            title: "Rust Ships Release".to_string(),
            summary: "Fish & chips <b>bold</b>".to_string(),
            body: "Body text".to_string(),
            author: Some("Ferris".to_string()),
            published: Utc.with_ymd_and_hms(2024, 12, 9, 14, 30, 0).unwrap(),
            source_url: Some("https://a.com/1".to_string()),
            source_urls: vec!["https://a.com/1".to_string()],
            categories: BTreeSet::from(["tech".to_string()]),
            score: 8.0,
            primary_image: with_image.then(|| PrimaryImage {
                url: "https://img.example.com/1.jpg".to_string(),
                width: Some(100),
                height: None,
            }),
            talking_points: vec!["Point one".to_string()],
            quote: Some("Memory safety".to_string()),
            quote_author: Some("Ferris".to_string()),
            emoji: None,
            location: None,
        };
        Projector::new("https://news.example.com").project_all(&[story])
    }

    #[test]
    fn test_feed_has_media_thumbnail() {
        let xml = render_feed(&site(), &views(true), now()).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("xmlns:media=\"http://search.yahoo.com/mrss/\""));
        assert!(xml.contains("<media:thumbnail"));
        assert!(xml.contains("width=\"100\""));
        assert!(!xml.contains("height="));
        assert!(xml.contains("<pubDate>Mon, 09 Dec 2024 14:30:00 +0000</pubDate>"));
        assert!(xml.contains("<lastBuildDate>Wed, 15 Jan 2025 12:00:00 +0000</lastBuildDate>"));
    }

    #[test]
    fn test_feed_escapes_text() {
        let xml = render_feed(&site(), &views(false), now()).unwrap();

        assert!(xml.contains("Fish &amp; chips &lt;b&gt;bold&lt;"));
        assert!(!xml.contains("<media:thumbnail"));
    }

    #[test]
    fn test_index_lists_stories_with_lazy_thumbnails() {
        let html = render_index(&site(), &views(true), now()).unwrap();

        assert!(html.contains("<title>Test Digest</title>"));
        assert!(html.contains("Rust Ships Release"));
        assert!(html.contains("<figure class=\"story-thumbnail\">"));
        assert!(html.contains("loading=\"lazy\""));
    }

    #[test]
    fn test_index_without_stories() {
        let html = render_index(&site(), &[], now()).unwrap();
        assert!(html.contains("No stories"));
    }

    #[test]
    fn test_story_page() {
        let stories = views(true);
        let html = render_story(&site(), &stories[0]).unwrap();

        assert!(html.contains("<h1>Rust Ships Release</h1>"));
        assert!(html.contains("Point one"));
        assert!(html.contains("Memory safety"));
        assert!(html.contains("loading=\"lazy\""));
    }

    #[test]
    fn test_render_site_has_page_per_story() {
        let rendered = render_site(&site(), &views(false), now()).unwrap();

        assert_eq!(rendered.pages.len(), 1);
        assert_eq!(rendered.pages[0].0, "stories/rust-ships-release.html");
    }
}
