//! Checks on a generated site: the feed parses, its thumbnails are
//! well-formed and every item links to a story page that exists.

use std::fs;
use std::path::Path;

use feed_rs::model::Feed;
use feed_rs::parser;
use tracing::{info, warn};

use crate::error::{KiteError, KiteResult};
use crate::site::{FEED_FILE, INDEX_FILE, STORIES_DIR};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub items: usize,
    pub thumbnails: usize,
    pub thumbnails_with_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteCheck {
    pub feed: FeedReport,
    pub story_pages: usize,
    pub missing_pages: Vec<String>,
}

impl SiteCheck {
    pub fn is_ok(&self) -> bool {
        self.missing_pages.is_empty()
    }
}

/// Parse a generated RSS document and count its items and thumbnails
pub fn inspect_feed(xml: &[u8]) -> KiteResult<FeedReport> {
    report_for(&parse_feed(xml)?)
}

fn parse_feed(xml: &[u8]) -> KiteResult<Feed> {
    parser::parse(xml).map_err(|e| KiteError::Validation(format!("feed does not parse: {}", e)))
}

fn report_for(feed: &Feed) -> KiteResult<FeedReport> {
    let mut report = FeedReport {
        items: feed.entries.len(),
        ..FeedReport::default()
    };

    for entry in &feed.entries {
        for thumbnail in entry.media.iter().flat_map(|m| m.thumbnails.iter()) {
            if thumbnail.image.uri.trim().is_empty() {
                return Err(KiteError::Validation(format!(
                    "thumbnail without url in item '{}'",
                    entry.id
                )));
            }
            report.thumbnails += 1;
            if thumbnail.image.width.is_some() || thumbnail.image.height.is_some() {
                report.thumbnails_with_size += 1;
            }
        }
    }

    Ok(report)
}

/// Validate the feed, index and story pages under `output_dir`
pub fn check_site<P: AsRef<Path>>(output_dir: P) -> KiteResult<SiteCheck> {
    let output_dir = output_dir.as_ref();

    let feed_path = output_dir.join(FEED_FILE);
    let xml = fs::read(&feed_path)
        .map_err(|e| KiteError::Validation(format!("cannot read {}: {}", feed_path.display(), e)))?;
    let parsed = parse_feed(&xml)?;
    let feed = report_for(&parsed)?;

    let index_path = output_dir.join(INDEX_FILE);
    if !index_path.exists() {
        return Err(KiteError::Validation(format!("{} is missing", index_path.display())));
    }

    let mut missing_pages = Vec::new();
    for entry in &parsed.entries {
        let Some(link) = entry.links.first() else {
            missing_pages.push(entry.id.clone());
            continue;
        };
        let page = match link.href.rfind(&format!("/{}/", STORIES_DIR)) {
            Some(pos) => &link.href[pos + 1..],
            None => link.href.as_str(),
        };
        if !output_dir.join(page).exists() {
            warn!("Feed item links to missing page {}", page);
            missing_pages.push(page.to_string());
        }
    }

    let story_pages = match fs::read_dir(output_dir.join(STORIES_DIR)) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
            .count(),
        Err(_) => 0,
    };

    info!(
        "Feed has {} items, {} with thumbnails; {} story pages, {} missing",
        feed.items,
        feed.thumbnails,
        story_pages,
        missing_pages.len()
    );

    Ok(SiteCheck {
        feed,
        story_pages,
        missing_pages,
    })
}
