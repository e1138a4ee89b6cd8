use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::CategoryId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only catalog view of a product, as supplied by the external catalog
/// store. A price of zero means "unknown" and is excluded from price
/// comparison. Attribute identity is the attribute *name*; the option sets
/// are carried for display but never compared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub category_ids: BTreeSet<CategoryId>,
    #[serde(default)]
    pub tag_ids: BTreeSet<u64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    pub published: bool,
    /// Visibility may differ from published (e.g. hidden variants).
    pub visible: bool,
}
