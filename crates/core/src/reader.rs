//! Storefront read path for precomputed similarity edges.
//!
//! The reader never errors: it serves recommendations on a best-effort
//! basis and degrades to an empty (or shorter) list when the store or
//! catalog misbehave. Failures are logged so operators can see the
//! degradation without shoppers ever seeing an error page.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::domain::product::ProductId;
use crate::domain::similarity::SimilarProduct;
use crate::store::SimilarityStore;

/// Served when a similar product has no image of its own.
pub const PLACEHOLDER_IMAGE_URL: &str = "/assets/placeholder-product.png";

pub struct SimilarityReader {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn SimilarityStore>,
}

impl SimilarityReader {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn SimilarityStore>) -> Self {
        Self { catalog, store }
    }

    /// Top `limit` stored neighbours of `product_id`, enriched with display
    /// metadata, in descending score order. Neighbours that no longer
    /// resolve in the catalog or are hidden from listings are dropped,
    /// which can leave fewer than `limit` results.
    pub async fn get_similar(&self, product_id: ProductId, limit: usize) -> Vec<SimilarProduct> {
        let edges = match self.store.top_n(product_id, limit).await {
            Ok(edges) => edges,
            Err(error) => {
                warn!(
                    event_name = "reader.store_unavailable",
                    product_id = product_id.0,
                    error = %error,
                    "serving no recommendations, similarity store read failed"
                );
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(edges.len());
        for edge in edges {
            let product = match self.catalog.get_product(edge.similar_product_id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    debug!(
                        event_name = "reader.stale_edge",
                        product_id = product_id.0,
                        similar_product_id = edge.similar_product_id.0,
                        "dropping edge to a product no longer in the catalog"
                    );
                    continue;
                }
                Err(error) => {
                    warn!(
                        event_name = "reader.catalog_lookup_failed",
                        product_id = product_id.0,
                        similar_product_id = edge.similar_product_id.0,
                        error = %error,
                        "dropping edge after catalog lookup failure"
                    );
                    continue;
                }
            };

            if !product.visible {
                continue;
            }

            results.push(SimilarProduct {
                product_id: product.id,
                score: edge.score,
                name: product.name,
                price: product.price,
                image_url: product
                    .image_url
                    .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
                permalink: product.permalink,
            });
        }
        results
    }
}
