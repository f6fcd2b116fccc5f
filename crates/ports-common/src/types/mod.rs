//! Common types used across the ingestion pipeline

use serde::{Deserialize, Serialize};

/// A record whose identifier can be carried outside of its payload.
///
/// Keyed JSON documents store the identifier as the object member name rather
/// than inside the value, so sources restore it with [`inject_key`] after
/// decoding. Implementing this trait is what makes a type eligible for keyed
/// sources and keyed stores.
pub trait Keyed {
    /// The record identifier.
    fn key(&self) -> &str;

    /// Replace the record identifier, leaving every other field untouched.
    fn set_key(&mut self, key: String);
}

/// Restore an externally supplied identifier onto a decoded record.
pub fn inject_key<T: Keyed + ?Sized>(record: &mut T, key: impl Into<String>) {
    record.set_key(key.into());
}

/// A port for ships, keyed by its UN/LOCODE.
///
/// Missing fields decode to their empty defaults, so sparse documents such as
/// `{"name": "Ajman", "coordinates": [55.5136, 25.4052]}` are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Port {
    /// Unique identifier (e.g. "AEAJM")
    pub key: String,
    pub name: String,
    pub city: String,
    pub country: String,
    /// Alternative names
    pub alias: Vec<String>,
    pub regions: Vec<String>,
    /// Longitude, latitude
    pub coordinates: Vec<f64>,
    pub province: String,
    pub timezone: String,
    /// UN location codes
    pub unlocs: Vec<String>,
    pub code: String,
}

impl Keyed for Port {
    fn key(&self) -> &str {
        &self.key
    }

    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}
