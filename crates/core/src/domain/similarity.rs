use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::{Product, ProductId};

/// A stored directed similarity relationship. At most one edge exists per
/// ordered `(product_id, similar_product_id)` pair and the relation is not
/// symmetric. Edges are replaced wholesale per source product, never
/// mutated in place.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub product_id: ProductId,
    pub similar_product_id: ProductId,
    pub score: f64,
}

impl SimilarityEdge {
    pub fn new(product_id: ProductId, similar_product_id: ProductId, score: f64) -> Self {
        Self { product_id, similar_product_id, score }
    }
}

/// Enriched read-path record served to storefront callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarProduct {
    pub product_id: ProductId,
    pub score: f64,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
    pub permalink: Option<String>,
}

/// Display metadata for one processed product, returned by the resumable
/// batch mode so an external progress UI can show what was just handled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub sku: String,
    pub price: Decimal,
    pub thumbnail: Option<String>,
    pub permalink: Option<String>,
}

impl ProductSummary {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.name.clone(),
            sku: product.sku.clone(),
            price: product.price,
            thumbnail: product.image_url.clone(),
            permalink: product.permalink.clone(),
        }
    }
}
