use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::error::KiteResult;
use crate::fetcher::Fetcher;
use crate::pipeline::{process, ProcessOutcome};
use crate::site::{generate_site, stories_to_json, SiteReport, STORIES_FILE};

/// Fetch every configured feed and process the results
pub async fn fetch_and_process(config: &Config, now: DateTime<Utc>) -> KiteResult<ProcessOutcome> {
    let fetcher = Fetcher::new(&config.feeds.base_url)?;
    let batches = fetcher.fetch_configured(config).await?;
    Ok(process(&batches, &config.process_options(), now))
}

/// Full run: fetch, process, then write the stories artifact and the site.
///
/// Nothing is written when fetching fails for every feed.
pub async fn run<P: AsRef<Path>>(config: &Config, output_dir: P, now: DateTime<Utc>) -> KiteResult<SiteReport> {
    let output_dir = output_dir.as_ref();
    let outcome = fetch_and_process(config, now).await?;

    let json = stories_to_json(&outcome.stories)?;
    let report = generate_site(output_dir, &config.site, &outcome.stories, now)?;
    std::fs::write(output_dir.join(STORIES_FILE), json)?;

    info!(
        "Run complete: {} stories from {} feeds written to {}",
        report.stories,
        outcome.diagnostics.feeds,
        output_dir.display()
    );
    Ok(report)
}
