use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{KiteError, KiteResult};
use crate::story::{FeedBatch, RawStory};

/// Keys that may hold the record list of a category file
const RECORD_LIST_KEYS: &[&str] = &["clusters", "stories", "items"];

/// Entry of the service's `kite.json` category index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KiteIndex {
    #[serde(default)]
    pub categories: Vec<IndexEntry>,
}

impl KiteIndex {
    pub fn file_for(&self, category: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|entry| entry.name == category)
            .map(|entry| entry.file.as_str())
    }
}

/// A feed to download: where from, and the category its stories belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub category: String,
    pub url: String,
}

pub struct Fetcher {
    client: Client,
    base_url: String,
}

impl Fetcher {
    pub fn new(base_url: &str) -> KiteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("KiteDigest/1.0 (Feed Processor)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve and fetch every feed named in the configuration
    pub async fn fetch_configured(&self, config: &Config) -> KiteResult<Vec<FeedBatch>> {
        let mut sources = self.resolve_categories(&config.feeds.categories).await;
        sources.extend(config.feeds.sources.iter().map(|source| FeedSource {
            category: source.category.clone(),
            url: source.url.clone(),
        }));

        self.fetch_all(&sources).await
    }

    /// Map category names to file URLs through the service index.
    ///
    /// An unreachable index or an unknown category falls back to the
    /// conventional `<lowercase_name>.json` file name.
    pub async fn resolve_categories(&self, categories: &[String]) -> Vec<FeedSource> {
        if categories.is_empty() {
            return Vec::new();
        }

        let index = match self.fetch_index().await {
            Ok(index) => index,
            Err(e) => {
                warn!("Could not fetch category index: {}", e);
                KiteIndex::default()
            }
        };

        categories
            .iter()
            .map(|category| {
                let file = match index.file_for(category) {
                    Some(file) => file.to_string(),
                    None => {
                        warn!("Category '{}' not found in index, guessing file name", category);
                        Self::fallback_file_name(category)
                    }
                };
                FeedSource {
                    category: category.clone(),
                    url: format!("{}/{}", self.base_url, file.trim_start_matches('/')),
                }
            })
            .collect()
    }

    pub async fn fetch_index(&self) -> KiteResult<KiteIndex> {
        let url = format!("{}/kite.json", self.base_url);
        info!("Fetching category index from {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetch feeds one after another, skipping the ones that fail.
    ///
    /// Fails only when feeds were requested and none of them could be read.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> KiteResult<Vec<FeedBatch>> {
        let mut batches = Vec::new();

        for source in sources {
            match self.fetch_feed(source).await {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!("Skipping feed '{}': {}", source.category, e),
            }
        }

        if batches.is_empty() && !sources.is_empty() {
            return Err(KiteError::NoFeedsAvailable);
        }

        info!("Fetched {}/{} feeds", batches.len(), sources.len());
        Ok(batches)
    }

    pub async fn fetch_feed(&self, source: &FeedSource) -> KiteResult<FeedBatch> {
        info!("Fetching feed: {} ({})", source.category, source.url);

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| KiteError::fetch(&source.category, e))?;
        let response = response
            .error_for_status()
            .map_err(|e| KiteError::fetch(&source.category, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| KiteError::fetch(&source.category, e))?;

        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| KiteError::fetch(&source.category, format!("invalid JSON: {}", e)))?;
        let records = Self::extract_records(document)
            .ok_or_else(|| KiteError::fetch(&source.category, "no story list in document"))?;

        info!("Found {} records in '{}'", records.len(), source.category);
        Ok(FeedBatch::new(source.category.clone(), records))
    }

    /// Pull the record list out of a category document.
    ///
    /// Accepts a bare array or an object holding the list under one of
    /// [`RECORD_LIST_KEYS`]. A document-level `timestamp` is copied into
    /// records that lack their own. Non-object entries are skipped.
    pub fn extract_records(document: Value) -> Option<Vec<RawStory>> {
        let (list, timestamp) = match document {
            Value::Array(list) => (list, None),
            Value::Object(mut object) => {
                let timestamp = object.get("timestamp").cloned();
                let list = RECORD_LIST_KEYS
                    .iter()
                    .find_map(|key| match object.remove(*key) {
                        Some(Value::Array(list)) => Some(list),
                        _ => None,
                    })?;
                (list, timestamp)
            }
            _ => return None,
        };

        let records = list
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(mut record) => {
                    if let Some(ts) = &timestamp {
                        if !record.contains_key("timestamp") {
                            record.insert("timestamp".to_string(), ts.clone());
                        }
                    }
                    Some(record)
                }
                _ => None,
            })
            .collect();

        Some(records)
    }

    pub fn fallback_file_name(category: &str) -> String {
        format!("{}.json", category.to_lowercase().replace(' ', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod extract_records_tests {
        use super::*;

        #[test]
        fn test_kite_category_document() {
            let document = json!({
                "category": "World",
                "timestamp": 1733754600,
                "clusters": [
                    {"title": "One"},
                    {"title": "Two", "timestamp": "2024-01-01"}
                ]
            });

            let records = Fetcher::extract_records(document).unwrap();

            assert_eq!(records.len(), 2);
            assert_eq!(records[0]["timestamp"], json!(1733754600));
            assert_eq!(records[1]["timestamp"], json!("2024-01-01"));
        }

        #[test]
        fn test_bare_array() {
            let records = Fetcher::extract_records(json!([{"title": "a"}, 5, {"title": "b"}])).unwrap();
            assert_eq!(records.len(), 2);
        }

        #[test]
        fn test_alternative_list_keys() {
            let stories = Fetcher::extract_records(json!({"stories": [{"title": "a"}]})).unwrap();
            assert_eq!(stories.len(), 1);

            let items = Fetcher::extract_records(json!({"items": []})).unwrap();
            assert!(items.is_empty());
        }

        #[test]
        fn test_document_without_list() {
            assert!(Fetcher::extract_records(json!({"category": "World"})).is_none());
            assert!(Fetcher::extract_records(json!("text")).is_none());
        }
    }

    #[test]
    fn test_fallback_file_name() {
        assert_eq!(Fetcher::fallback_file_name("World"), "world.json");
        assert_eq!(Fetcher::fallback_file_name("Science and Tech"), "science_and_tech.json");
    }

    #[test]
    fn test_index_lookup() {
        let index: KiteIndex = serde_json::from_value(json!({
            "categories": [
                {"name": "World", "file": "world.json"},
                {"name": "Technology", "file": "tech.json"}
            ]
        }))
        .unwrap();

        assert_eq!(index.file_for("Technology"), Some("tech.json"));
        assert_eq!(index.file_for("Sports"), None);
    }
}
