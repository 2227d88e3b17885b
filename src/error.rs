use thiserror::Error;

#[derive(Error, Debug)]
pub enum KiteError {
    // Per-record errors (recovered by dropping the record)
    #[error("Malformed record in '{category}': {reason}")]
    MalformedRecord { category: String, reason: String },

    // Per-feed errors (recovered by skipping the feed)
    #[error("Failed to fetch feed '{feed}': {reason}")]
    Fetch { feed: String, reason: String },

    #[error("No feeds could be fetched")]
    NoFeedsAvailable,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Rendering errors
    #[error("Template rendering failed: {0}")]
    Render(#[from] askama::Error),

    #[error("Site validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KiteError {
    pub fn malformed(category: &str, reason: impl Into<String>) -> Self {
        KiteError::MalformedRecord {
            category: category.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fetch(feed: &str, reason: impl std::fmt::Display) -> Self {
        KiteError::Fetch {
            feed: feed.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type KiteResult<T> = Result<T, KiteError>;
