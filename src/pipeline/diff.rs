//! Diff calculation for listing notifications.
//!
//! Compares each freshly fetched listing with the job's snapshot, records
//! the new price and decides whether the operator should hear about it.
//! Only brand-new listings and strict price drops are notifiable; price
//! rises are recorded silently.

use serde::{Deserialize, Serialize};

use crate::models::{Listing, Snapshot};

/// How a listing changed relative to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Never seen by this job before
    New,
    /// Price strictly lower than the recorded one
    PriceDrop,
    /// Price strictly higher than the recorded one
    PriceRise,
    Unchanged,
}

impl ChangeKind {
    pub fn is_notifiable(self) -> bool {
        matches!(self, ChangeKind::New | ChangeKind::PriceDrop)
    }
}

/// Running totals for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub new: usize,
    pub price_drops: usize,
    pub price_rises: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::New => self.new += 1,
            ChangeKind::PriceDrop => self.price_drops += 1,
            ChangeKind::PriceRise => self.price_rises += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
        }
    }

    /// Number of listings that qualified for a notification.
    pub fn notifiable(&self) -> usize {
        self.new + self.price_drops
    }

    pub fn total(&self) -> usize {
        self.new + self.price_drops + self.price_rises + self.unchanged
    }
}

/// Classifies listings against a snapshot and updates it in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Set `listing.previous_price` from the snapshot, store the new price and classify.
    pub fn observe(&self, snapshot: &mut Snapshot, listing: &mut Listing) -> ChangeKind {
        let previous = snapshot.record(&listing.id, listing.price);
        listing.previous_price = previous;

        match previous {
            None => ChangeKind::New,
            Some(prev) if listing.price < prev => ChangeKind::PriceDrop,
            Some(prev) if listing.price > prev => ChangeKind::PriceRise,
            Some(_) => ChangeKind::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_listing(id: &str, price: f64) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("Listing {}", id),
            price,
            previous_price: None,
            link: format!("https://example.com/{}", id),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_listing() {
        let mut snapshot = Snapshot::new();
        let mut listing = make_listing("001", 100.0);

        let kind = DiffEngine::new().observe(&mut snapshot, &mut listing);
        assert_eq!(kind, ChangeKind::New);
        assert!(kind.is_notifiable());
        assert_eq!(listing.previous_price, None);
        assert_eq!(snapshot.price("001"), Some(100.0));
    }

    #[test]
    fn test_price_drop() {
        let mut snapshot: Snapshot = vec![("001".to_string(), 100.0)].into_iter().collect();
        let mut listing = make_listing("001", 80.0);

        let kind = DiffEngine::new().observe(&mut snapshot, &mut listing);
        assert_eq!(kind, ChangeKind::PriceDrop);
        assert!(kind.is_notifiable());
        assert_eq!(listing.previous_price, Some(100.0));
        assert_eq!(snapshot.price("001"), Some(80.0));
    }

    #[test]
    fn test_rise_and_equal_are_silent() {
        let engine = DiffEngine::new();
        let mut snapshot: Snapshot = vec![("001".to_string(), 100.0)].into_iter().collect();

        let mut same = make_listing("001", 100.0);
        let kind = engine.observe(&mut snapshot, &mut same);
        assert_eq!(kind, ChangeKind::Unchanged);
        assert!(!kind.is_notifiable());

        let mut higher = make_listing("001", 120.0);
        let kind = engine.observe(&mut snapshot, &mut higher);
        assert_eq!(kind, ChangeKind::PriceRise);
        assert!(!kind.is_notifiable());
        assert_eq!(snapshot.price("001"), Some(120.0));
    }

    #[test]
    fn test_notifiable_iff_unknown_or_lower() {
        let engine = DiffEngine::new();
        let prices = [50.0, 99.99, 100.0, 100.01, 250.0];

        for &previous in &prices {
            for &current in &prices {
                let mut snapshot: Snapshot =
                    vec![("x".to_string(), previous)].into_iter().collect();
                let mut listing = make_listing("x", current);
                let kind = engine.observe(&mut snapshot, &mut listing);
                assert_eq!(kind.is_notifiable(), current < previous);
            }
        }
    }

    #[test]
    fn test_stats() {
        let mut stats = DiffStats::default();
        stats.record(ChangeKind::New);
        stats.record(ChangeKind::PriceDrop);
        stats.record(ChangeKind::Unchanged);
        stats.record(ChangeKind::PriceRise);

        assert_eq!(stats.notifiable(), 2);
        assert_eq!(stats.total(), 4);
    }
}
