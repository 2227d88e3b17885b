use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::{KiteError, KiteResult};
use crate::filter::FilterOptions;
use crate::pipeline::ProcessOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Global story limit after merging and filtering (0 = unlimited)
    #[serde(default)]
    pub top_n: i64,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Category names resolved through the service's kite.json index
    #[serde(default)]
    pub categories: Vec<String>,
    /// Per-category story limit applied before merging (0 = unlimited)
    #[serde(default, alias = "top_n")]
    pub top_n_per_category: i64,
    #[serde(default)]
    pub top_n_by_category: HashMap<String, i64>,
    /// Feeds fetched directly from a URL, bypassing the index
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            categories: Vec::new(),
            top_n_per_category: 0,
            top_n_by_category: HashMap::new(),
            sources: Vec::new(),
        }
    }
}

fn default_base_url() -> String {
    "https://kite.kagi.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub category: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FiltersConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min_score: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub title: String,
    #[serde(default = "default_site_url")]
    pub base_url: String,
    #[serde(default = "default_site_description")]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            base_url: default_site_url(),
            description: default_site_description(),
            language: default_language(),
        }
    }
}

fn default_site_title() -> String {
    "Kite Digest".to_string()
}

fn default_site_url() -> String {
    "https://example.com".to_string()
}

fn default_site_description() -> String {
    "Top stories from Kagi Kite".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> KiteResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KiteError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> KiteResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| KiteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KiteResult<()> {
        if self.top_n < 0 {
            return Err(KiteError::Config(format!(
                "top_n must not be negative (got {})",
                self.top_n
            )));
        }
        if self.feeds.top_n_per_category < 0 {
            return Err(KiteError::Config(format!(
                "feeds.top_n_per_category must not be negative (got {})",
                self.feeds.top_n_per_category
            )));
        }
        for (category, limit) in &self.feeds.top_n_by_category {
            if *limit < 0 {
                return Err(KiteError::Config(format!(
                    "feeds.top_n_by_category.{} must not be negative (got {})",
                    category, limit
                )));
            }
        }
        if !self.filters.min_score.is_finite() {
            return Err(KiteError::Config(
                "filters.min_score must be a finite number".to_string(),
            ));
        }
        if self.feeds.categories.is_empty() && self.feeds.sources.is_empty() {
            return Err(KiteError::Config(
                "no feeds configured: set feeds.categories or feeds.sources".to_string(),
            ));
        }

        check_url("feeds.base_url", &self.feeds.base_url)?;
        check_url("site.base_url", &self.site.base_url)?;
        for source in &self.feeds.sources {
            check_url(&format!("feeds.sources[{}].url", source.category), &source.url)?;
        }

        Ok(())
    }

    /// Story limit applied to one category's feed before merging
    pub fn category_limit(&self, category: &str) -> usize {
        let limit = self
            .feeds
            .top_n_by_category
            .get(category)
            .copied()
            .unwrap_or(self.feeds.top_n_per_category);
        limit.max(0) as usize
    }

    pub fn process_options(&self) -> ProcessOptions {
        let category_limits = self
            .feeds
            .categories
            .iter()
            .chain(self.feeds.sources.iter().map(|s| &s.category))
            .map(|category| (category.clone(), self.category_limit(category)))
            .collect();

        ProcessOptions {
            filter: FilterOptions {
                min_score: self.filters.min_score,
                filter_enabled: self.filters.enabled,
                top_n: self.top_n.max(0) as usize,
            },
            category_limits,
        }
    }
}

fn check_url(field: &str, value: &str) -> KiteResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| KiteError::Config(format!("{} is not a valid URL ({}): {}", field, value, e)))
}
