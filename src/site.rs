use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::SiteConfig;
use crate::error::KiteResult;
use crate::projector::Projector;
use crate::render::{render_site, RenderedSite};
use crate::story::MergedStory;

pub const STORIES_FILE: &str = "processed_stories.json";
pub const FEED_FILE: &str = "feed.xml";
pub const INDEX_FILE: &str = "index.html";
pub const STORIES_DIR: &str = "stories";

/// Summary of one site generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteReport {
    pub stories: usize,
    pub pages: usize,
    pub output_dir: PathBuf,
}

pub fn stories_to_json(stories: &[MergedStory]) -> KiteResult<String> {
    Ok(serde_json::to_string_pretty(stories)?)
}

pub fn write_stories<P: AsRef<Path>>(path: P, stories: &[MergedStory]) -> KiteResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, stories_to_json(stories)?)?;
    info!("Wrote {} stories to {}", stories.len(), path.display());
    Ok(())
}

pub fn read_stories<P: AsRef<Path>>(path: P) -> KiteResult<Vec<MergedStory>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Render feed and pages for `stories` and write them under `output_dir`.
///
/// Everything is rendered before the first file is written, so a
/// rendering failure leaves the directory untouched.
pub fn generate_site<P: AsRef<Path>>(
    output_dir: P,
    site: &SiteConfig,
    stories: &[MergedStory],
    now: DateTime<Utc>,
) -> KiteResult<SiteReport> {
    let output_dir = output_dir.as_ref();
    let views = Projector::new(&site.base_url).project_all(stories);
    let rendered = render_site(site, &views, now)?;

    write_rendered(output_dir, &rendered)?;

    Ok(SiteReport {
        stories: views.len(),
        pages: rendered.pages.len(),
        output_dir: output_dir.to_path_buf(),
    })
}

fn write_rendered(output_dir: &Path, rendered: &RenderedSite) -> KiteResult<()> {
    fs::create_dir_all(output_dir.join(STORIES_DIR))?;

    for (path, html) in &rendered.pages {
        let target = output_dir.join(path);
        debug!("Writing {}", target.display());
        fs::write(&target, html)?;
    }

    fs::write(output_dir.join(FEED_FILE), &rendered.feed_xml)?;
    fs::write(output_dir.join(INDEX_FILE), &rendered.index_html)?;

    info!(
        "Wrote {}, {} and {} story pages to {}",
        FEED_FILE,
        INDEX_FILE,
        rendered.pages.len(),
        output_dir.display()
    );
    Ok(())
}
