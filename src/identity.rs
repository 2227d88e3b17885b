//! Story identity: canonical source URLs and the identifiers derived from them.
//!
//! Two records describe the same story when their source URLs canonicalize
//! to the same string, whichever category feed produced them.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that only track the click and never select content
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "yclid", "mc_cid", "mc_eid", "ref", "cmpid"];

/// Prefix of identifiers synthesized for records without a source URL
pub const SYNTHETIC_PREFIX: &str = "title:";

/// Canonical form of a source URL.
///
/// Scheme and host are lowercased, default ports and fragments dropped,
/// tracking parameters removed and trailing slashes stripped. Strings the
/// URL parser rejects are only trimmed, keeping their case.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let mut url = match Url::parse(trimmed) {
        Ok(url) if url.has_host() => url,
        _ => return trimmed.trim_end_matches('/').to_string(),
    };

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    let mut canonical = url.to_string();
    // Url re-adds "/" for an empty path on special schemes
    if url.query().is_none() && canonical.ends_with('/') {
        canonical.pop();
    }
    canonical
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Identifier of a story with a known source URL
pub fn story_id(source_url: &str) -> String {
    canonical_url(source_url)
}

/// Identifier for a record that carries no source URL.
///
/// The category is part of the hash, so such stories never merge with
/// stories from other feeds.
pub fn synthetic_id(category: &str, title: &str) -> String {
    format!(
        "{}{}",
        SYNTHETIC_PREFIX,
        short_hash(&format!("{}\n{}", category, title.trim()), 16)
    )
}

pub fn is_synthetic(identifier: &str) -> bool {
    identifier.starts_with(SYNTHETIC_PREFIX)
}

/// First `len` hex characters of the SHA-256 of `input`
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..len.min(hex.len())].to_string()
}
