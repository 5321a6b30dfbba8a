//! Notification event emitted for a new listing or a price drop.

use serde::{Deserialize, Serialize};

use super::listing::Listing;
use super::query::ChatRef;

/// A change worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub chat: ChatRef,
    pub listing_id: String,
    pub title: String,
    pub price: f64,
    pub previous_price: Option<f64>,
    pub link: String,
    pub is_price_drop: bool,
}

impl Notification {
    pub fn new(chat: ChatRef, listing: &Listing) -> Self {
        Self {
            chat,
            listing_id: listing.id.clone(),
            title: listing.title.clone(),
            price: listing.price,
            previous_price: listing.previous_price,
            link: listing.link.clone(),
            is_price_drop: listing.is_price_drop(),
        }
    }

    /// Dedup key for this exact price transition in this chat.
    pub fn fingerprint(&self) -> String {
        let before = self
            .previous_price
            .map_or_else(|| "new".to_string(), |p| format!("{p:.2}"));
        format!(
            "{}/{}/{}-{:.2}",
            self.chat, self.listing_id, before, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn listing(price: f64, previous: Option<f64>) -> Listing {
        Listing {
            id: "42".into(),
            title: "Bike".into(),
            price,
            previous_price: previous,
            link: "http://p.example.com/i/42".into(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_includes_transition() {
        let chat = ChatRef::Handle("@deals".into());
        let new = Notification::new(chat.clone(), &listing(100.0, None));
        let drop = Notification::new(chat, &listing(80.0, Some(100.0)));

        assert_eq!(new.fingerprint(), "@deals/42/new-100.00");
        assert_eq!(drop.fingerprint(), "@deals/42/100.00-80.00");
        assert!(!new.is_price_drop);
        assert!(drop.is_price_drop);
    }
}
