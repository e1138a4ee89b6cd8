use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::category::{CategoryId, CategoryNode};
use crate::domain::product::{Product, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product lookup failed for {id}: {message}")]
    Lookup { id: ProductId, message: String },
    #[error("category lookup failed for {id}: {message}")]
    CategoryLookup { id: CategoryId, message: String },
    #[error("catalog enumeration failed: {0}")]
    Enumeration(String),
}

/// Access seam to the external catalog system of record. The engine only
/// ever reads through this trait; catalog persistence itself is owned by
/// the hosting application.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;

    /// All published product ids in ascending id order. The resumable batch
    /// mode addresses products by offset into this listing, so the order
    /// must be stable across calls for an unchanged catalog.
    async fn list_published_ids(&self) -> Result<Vec<ProductId>, CatalogError>;

    /// Published products carrying the given category.
    async fn list_published_in_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<ProductId>, CatalogError>;

    async fn parent_category(
        &self,
        category: CategoryId,
    ) -> Result<Option<CategoryId>, CatalogError>;

    /// Invalidate any denormalized product caches the host keeps. Called by
    /// the pipeline after meaningful batches of writes so the read path does
    /// not serve stale product data. No-op by default.
    async fn flush_caches(&self) {}
}

/// Serialized catalog snapshot: the shape accepted by
/// [`InMemoryCatalog::from_json_str`] and the CLI `--catalog` flag.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub categories: Vec<CategoryNode>,
}

/// In-memory catalog, used as the test double everywhere and as the CLI's
/// stand-in for a storefront integration (loaded from a JSON export).
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    categories: RwLock<HashMap<CategoryId, CategoryNode>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let products: HashMap<ProductId, Product> =
            snapshot.products.into_iter().map(|product| (product.id, product)).collect();
        let categories: HashMap<CategoryId, CategoryNode> =
            snapshot.categories.into_iter().map(|category| (category.id, category)).collect();
        Self { products: RwLock::new(products), categories: RwLock::new(categories) }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_snapshot(serde_json::from_str(raw)?))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            CatalogError::Enumeration(format!(
                "could not read catalog file `{}`: {error}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw).map_err(|error| {
            CatalogError::Enumeration(format!(
                "could not parse catalog file `{}`: {error}",
                path.display()
            ))
        })
    }

    pub async fn upsert_product(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.id, product);
    }

    pub async fn remove_product(&self, id: ProductId) {
        let mut products = self.products.write().await;
        products.remove(&id);
    }

    pub async fn upsert_category(&self, category: CategoryNode) {
        let mut categories = self.categories.write().await;
        categories.insert(category.id, category);
    }

    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn list_published_ids(&self) -> Result<Vec<ProductId>, CatalogError> {
        let products = self.products.read().await;
        let mut ids: Vec<ProductId> =
            products.values().filter(|product| product.published).map(|product| product.id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_published_in_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<ProductId>, CatalogError> {
        let products = self.products.read().await;
        let mut ids: Vec<ProductId> = products
            .values()
            .filter(|product| product.published && product.category_ids.contains(&category))
            .map(|product| product.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn parent_category(
        &self,
        category: CategoryId,
    ) -> Result<Option<CategoryId>, CatalogError> {
        let categories = self.categories.read().await;
        Ok(categories.get(&category).and_then(|node| node.parent_id))
    }
}
