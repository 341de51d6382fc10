//! Product records and the snapshot they are collected into
//!
//! The serialized field names (`product_title`, `product_price`, `image_url`)
//! are fixed: existing consumers of `products.json` read them by name.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Serialized value of [`ImagePath::Unresolved`]
pub const UNRESOLVED_IMAGE: &str = "";

/// Where a product's image ended up
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImagePath {
    /// Relative path of the locally stored image file
    Stored(String),
    /// The image could not be downloaded or stored
    Unresolved,
}

impl ImagePath {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stored(path) => path,
            Self::Unresolved => UNRESOLVED_IMAGE,
        }
    }
}

impl fmt::Display for ImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(path) => f.write_str(path),
            Self::Unresolved => f.write_str("<unresolved>"),
        }
    }
}

impl Serialize for ImagePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImagePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == UNRESOLVED_IMAGE {
            Ok(Self::Unresolved)
        } else {
            Ok(Self::Stored(raw))
        }
    }
}

/// One scraped product
///
/// Only built once both title and price were extracted; the image may be
/// [`ImagePath::Unresolved`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "product_title")]
    pub title: String,

    /// Normalized amount without currency symbol, serialized as a string
    #[serde(rename = "product_price", with = "rust_decimal::serde::str")]
    pub price: Decimal,

    #[serde(rename = "image_url")]
    pub image_path: ImagePath,
}

/// Ordered records produced by one pipeline run
///
/// Page order first, then document order within each page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub records: Vec<ProductRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProductRecord> {
        self.records.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = ProductRecord;
    type IntoIter = std::vec::IntoIter<ProductRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
