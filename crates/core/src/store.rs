use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::product::ProductId;
use crate::domain::similarity::SimilarityEdge;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store schema error: {0}")]
    Schema(String),
}

/// Persistent keyed edge table with replace-by-product semantics. Readers
/// must tolerate an empty table (a query before any write, or mid full
/// recompute, returns empty rather than an error).
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Atomically delete all edges for `product_id` and insert the fresh
    /// set. Readers never observe a partial replace.
    async fn replace(
        &self,
        product_id: ProductId,
        edges: &[SimilarityEdge],
    ) -> Result<(), StoreError>;

    /// Drop every edge. Run at the start of a full recompute.
    async fn truncate_all(&self) -> Result<(), StoreError>;

    /// Top edges for a product, score descending with a stable id
    /// tiebreak.
    async fn top_n(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<SimilarityEdge>, StoreError>;

    /// Distinct source product ids currently holding edges.
    async fn source_ids(&self) -> Result<Vec<ProductId>, StoreError>;
}

/// In-memory store used by pipeline unit tests and as a reference
/// implementation of the replace semantics.
#[derive(Default)]
pub struct InMemorySimilarityStore {
    edges: RwLock<HashMap<ProductId, Vec<SimilarityEdge>>>,
}

impl InMemorySimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimilarityStore for InMemorySimilarityStore {
    async fn replace(
        &self,
        product_id: ProductId,
        edges: &[SimilarityEdge],
    ) -> Result<(), StoreError> {
        let mut sorted: Vec<SimilarityEdge> = edges.to_vec();
        sorted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.similar_product_id.cmp(&b.similar_product_id))
        });

        let mut all = self.edges.write().await;
        all.insert(product_id, sorted);
        Ok(())
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        let mut all = self.edges.write().await;
        all.clear();
        Ok(())
    }

    async fn top_n(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<SimilarityEdge>, StoreError> {
        let all = self.edges.read().await;
        Ok(all
            .get(&product_id)
            .map(|edges| edges.iter().take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn source_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        let all = self.edges.read().await;
        let mut ids: Vec<ProductId> =
            all.iter().filter(|(_, edges)| !edges.is_empty()).map(|(id, _)| *id).collect();
        ids.sort();
        Ok(ids)
    }
}
