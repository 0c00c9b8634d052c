//! Lookup of listed keys by an identifier fragment.
//!
//! A record matches when any of its text fields contains the identifier as a
//! case-sensitive substring. Results keep listing order.

use crate::types::{KeyListing, KeyRecord};

fn matches(identifier: &str, record: &KeyRecord) -> bool {
    record
        .text_fields()
        .iter()
        .any(|field| field.contains(identifier))
}

/// Every record matching `identifier`; empty when nothing matches.
pub fn find_all(identifier: &str, listing: &[KeyRecord]) -> KeyListing {
    listing
        .iter()
        .filter(|record| matches(identifier, record))
        .cloned()
        .collect()
}

/// The first record in listing order matching `identifier`.
pub fn find_first(identifier: &str, listing: &[KeyRecord]) -> Option<KeyRecord> {
    listing
        .iter()
        .find(|record| matches(identifier, record))
        .cloned()
}

/// Like [`find_all`], accepting a listing that may be absent.
pub fn find_all_in(identifier: &str, listing: Option<&[KeyRecord]>) -> KeyListing {
    listing
        .map(|records| find_all(identifier, records))
        .unwrap_or_default()
}

/// Like [`find_first`], accepting a listing that may be absent.
pub fn find_first_in(identifier: &str, listing: Option<&[KeyRecord]>) -> Option<KeyRecord> {
    listing.and_then(|records| find_first(identifier, records))
}

impl KeyListing {
    pub fn find_all(&self, identifier: &str) -> KeyListing {
        find_all(identifier, self)
    }

    pub fn find_first(&self, identifier: &str) -> Option<KeyRecord> {
        find_first(identifier, self)
    }
}
