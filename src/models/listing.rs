//! Listing and snapshot data structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A search result object as returned by the remote API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteListing {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub price: f64,

    #[serde(default)]
    pub description: String,

    /// URL slug; its trailing `-` segment is the stable listing id
    #[serde(default)]
    pub web_slug: String,
}

impl RemoteListing {
    /// Stable identifier derived from the slug, falling back to the raw id.
    pub fn listing_id(&self) -> String {
        match self.web_slug.rsplit('-').next() {
            Some(tail) if !tail.is_empty() => tail.to_string(),
            _ => self.id.clone(),
        }
    }
}

/// A listing that survived the query filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: f64,

    /// Price recorded in the snapshot before this observation, `None` if never seen
    pub previous_price: Option<f64>,

    pub link: String,
    pub observed_at: DateTime<Utc>,
}

impl Listing {
    /// Build a listing from an API object, linking it under `link_base`.
    pub fn from_remote(remote: &RemoteListing, link_base: &str) -> Self {
        let id = remote.listing_id();
        Self {
            link: format!("{}{}", link_base, id),
            id,
            title: remote.title.clone(),
            price: remote.price,
            previous_price: None,
            observed_at: Utc::now(),
        }
    }

    pub fn is_price_drop(&self) -> bool {
        matches!(self.previous_price, Some(prev) if self.price < prev)
    }
}

/// Last known price per listing id for a single job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    prices: BTreeMap<String, f64>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(&self, id: &str) -> Option<f64> {
        self.prices.get(id).copied()
    }

    /// Record a price, returning the previous one.
    pub fn record(&mut self, id: &str, price: f64) -> Option<f64> {
        self.prices.insert(id.to_string(), price)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, f64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_id_from_slug() {
        let remote = RemoteListing {
            id: "raw".into(),
            web_slug: "iphone-12-pro-128gb-917364".into(),
            ..RemoteListing::default()
        };
        assert_eq!(remote.listing_id(), "917364");

        let no_slug = RemoteListing {
            id: "raw".into(),
            ..RemoteListing::default()
        };
        assert_eq!(no_slug.listing_id(), "raw");
    }

    #[test]
    fn test_from_remote_link() {
        let remote = RemoteListing {
            title: "Bike".into(),
            price: 120.0,
            web_slug: "bike-42".into(),
            ..RemoteListing::default()
        };
        let listing = Listing::from_remote(&remote, "http://p.example.com/i/");
        assert_eq!(listing.id, "42");
        assert_eq!(listing.link, "http://p.example.com/i/42");
        assert_eq!(listing.previous_price, None);
    }

    #[test]
    fn test_snapshot_serializes_as_map() {
        let snapshot: Snapshot = vec![("a".to_string(), 10.0)].into_iter().collect();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"a":10.0}"#);

        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.price("a"), Some(10.0));
    }

    #[test]
    fn test_remote_listing_ignores_unknown_fields() {
        let json = r#"{"id":"x","title":"Lamp","price":15.5,"currency":"EUR",
            "description":"desk lamp","distance":1.2,"web_slug":"lamp-77"}"#;
        let remote: RemoteListing = serde_json::from_str(json).unwrap();
        assert_eq!(remote.listing_id(), "77");
        assert_eq!(remote.price, 15.5);
    }
}
